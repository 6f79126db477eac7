//! Presentation: a native swapchain fed by engine-owned backbuffers.
//!
//! The engine renders into [`SwapChain::current_backbuffer`]. [`SwapChain::swap_buffer`] then
//! acquires a presentable image, blits the backbuffer into it and presents it. Out-of-date and
//! suboptimal swapchains are rebuilt in place; the caller never sees those conditions.

use std::sync::Arc;

use crate::command_queue::UNATTACHED;
use crate::device::DeviceShared;
use crate::error::{ErrorCode, GpuResult};
use crate::hal::{
    AcquireOutcome, Backend, ColorSpace, PresentMode, PresentOutcome, SurfaceCapabilities,
    SurfaceFormat, SwapchainCreateInfo,
};
use crate::resource::Texture;
use crate::types::{Extent2D, SwapChainDesc, TextureDesc, TextureFormat};
use crate::validation;
use crate::window::Window;

const MAX_ACQUIRE_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapChainState {
    Uninitialized,
    Initialized,
    Reinitializing,
    TornDown,
}

/// Exact format in sRGB-nonlinear space, then any format there with the same sRGB encoding,
/// else whatever the surface lists first.
pub fn choose_surface_format(available: &[SurfaceFormat], preferred: TextureFormat) -> Option<SurfaceFormat> {
    let nonlinear = || {
        available
            .iter()
            .filter(|f| f.color_space == ColorSpace::SrgbNonlinear)
    };
    nonlinear()
        .find(|f| f.format == preferred)
        .or_else(|| nonlinear().find(|f| f.format.is_srgb() == preferred.is_srgb()))
        .or_else(|| available.first())
        .copied()
}

/// FIFO with vsync, immediate without, else whatever the surface lists first.
pub fn choose_present_mode(available: &[PresentMode], vsync: bool) -> Option<PresentMode> {
    let wanted = if vsync {
        PresentMode::Fifo
    } else {
        PresentMode::Immediate
    };
    available
        .iter()
        .find(|&&mode| mode == wanted)
        .or_else(|| available.first())
        .copied()
}

fn choose_extent(caps: &SurfaceCapabilities, desc: &SwapChainDesc) -> Extent2D {
    match caps.current_extent {
        Some(current) => current,
        None => Extent2D::new(
            desc.width.clamp(caps.min_extent.width, caps.max_extent.width),
            desc.height.clamp(caps.min_extent.height, caps.max_extent.height),
        ),
    }
}

fn choose_image_count(caps: &SurfaceCapabilities, preferred: u32) -> u32 {
    let max = if caps.max_image_count == 0 {
        u32::MAX
    } else {
        caps.max_image_count
    };
    preferred.clamp(caps.min_image_count, max.max(caps.min_image_count))
}

pub struct SwapChain<B: Backend> {
    device: Arc<DeviceShared<B>>,
    surface: B::Surface,
    swapchain: Option<B::Swapchain>,
    images: Vec<B::PresentImage>,
    backbuffers: Vec<Arc<Texture<B>>>,
    command_pool: Option<B::CommandPool>,
    /// One per presentable image.
    command_buffers: Vec<B::CommandBuffer>,
    /// Per frame slot.
    image_available: Vec<B::Semaphore>,
    render_finished: Vec<B::Semaphore>,
    frame_fences: Vec<B::Fence>,
    /// Frame slot whose fence guards each presentable image.
    images_in_flight: Vec<Option<usize>>,
    surface_format: Option<SurfaceFormat>,
    present_mode: PresentMode,
    /// Format and vsync the current negotiation was made for.
    negotiated_for: Option<(TextureFormat, bool)>,
    desc: SwapChainDesc,
    extent: Extent2D,
    frame_index: usize,
    state: SwapChainState,
    stale: bool,
}

impl<B: Backend> SwapChain<B> {
    pub(crate) fn new(
        device: Arc<DeviceShared<B>>,
        window: &dyn Window,
        desc: &SwapChainDesc,
    ) -> GpuResult<Self> {
        validation::validate_swapchain_desc(desc)?;
        log::debug!("creating surface for {:?} window", window.get_window_type());
        let surface = device.backend.create_surface(window)?;
        let mut swapchain = Self {
            device,
            surface,
            swapchain: None,
            images: Vec::new(),
            backbuffers: Vec::new(),
            command_pool: None,
            command_buffers: Vec::new(),
            image_available: Vec::new(),
            render_finished: Vec::new(),
            frame_fences: Vec::new(),
            images_in_flight: Vec::new(),
            surface_format: None,
            present_mode: PresentMode::Fifo,
            negotiated_for: None,
            desc: *desc,
            extent: Extent2D::default(),
            frame_index: 0,
            state: SwapChainState::Uninitialized,
            stale: false,
        };
        swapchain.initialize()?;
        Ok(swapchain)
    }

    pub fn state(&self) -> SwapChainState {
        self.state
    }

    pub fn desc(&self) -> &SwapChainDesc {
        &self.desc
    }

    /// Extent of the presentable images.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn surface_format(&self) -> Option<SurfaceFormat> {
        self.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn get_swapchain_backbuffer(&self, index: usize) -> Option<&Arc<Texture<B>>> {
        self.backbuffers.get(index)
    }

    /// The backbuffer the next [`swap_buffer`](Self::swap_buffer) presents.
    pub fn current_backbuffer(&self) -> Option<&Arc<Texture<B>>> {
        self.backbuffers.get(self.frame_index)
    }

    /// Builds or rebuilds the native swapchain. Returns false, leaving the swapchain stale,
    /// while the surface has no area.
    fn initialize(&mut self) -> GpuResult<bool> {
        let device = Arc::clone(&self.device);
        let backend = &device.backend;
        let first = self.state == SwapChainState::Uninitialized;
        if !first {
            self.state = SwapChainState::Reinitializing;
            backend.wait_idle()?;
        }

        let caps = backend.surface_capabilities(self.surface)?;
        let extent = choose_extent(&caps, &self.desc);
        if extent.is_empty() {
            log::debug!("surface has zero extent, deferring swapchain creation");
            self.stale = true;
            if !first {
                self.state = SwapChainState::Initialized;
            }
            return Ok(false);
        }

        let wanted = (self.desc.format, self.desc.vsync);
        if self.negotiated_for != Some(wanted) {
            let formats = backend.surface_formats(self.surface)?;
            let format = choose_surface_format(&formats, self.desc.format).ok_or_else(|| {
                log::error!("surface reports no formats");
                ErrorCode::SurfacePresentationNotSupported
            })?;
            if format.format != self.desc.format {
                log::warn!(
                    "surface does not offer {:?} in sRGB space, using {:?}",
                    self.desc.format,
                    format
                );
            }
            let modes = backend.surface_present_modes(self.surface)?;
            self.present_mode = choose_present_mode(&modes, self.desc.vsync).ok_or_else(|| {
                log::error!("surface reports no present modes");
                ErrorCode::SurfacePresentationNotSupported
            })?;
            self.surface_format = Some(format);
            self.negotiated_for = Some(wanted);
        }
        let format = self.surface_format.ok_or(ErrorCode::InternalError)?;

        let info = SwapchainCreateInfo {
            format,
            present_mode: self.present_mode,
            extent,
            image_count: choose_image_count(&caps, self.desc.image_count),
        };
        let created = backend.create_swapchain(self.surface, &info, self.swapchain)?;
        if let Some(old) = self.swapchain.replace(created) {
            backend.destroy_swapchain(old);
        }
        self.images = backend.swapchain_images(created)?;
        self.extent = extent;
        log::debug!(
            "swapchain {}: {}x{}, {} images, {:?}, {:?}",
            if first { "created" } else { "rebuilt" },
            extent.width,
            extent.height,
            self.images.len(),
            format.format,
            self.present_mode
        );

        let count = self.images.len();
        if first || count != self.command_buffers.len() {
            self.destroy_frame_resources();
            self.create_frame_resources(count)?;
            self.recreate_backbuffers()?;
        } else {
            self.images_in_flight.fill(None);
        }

        self.state = SwapChainState::Initialized;
        self.stale = false;
        Ok(true)
    }

    fn create_frame_resources(&mut self, count: usize) -> GpuResult<()> {
        let backend = &self.device.backend;
        let pool = backend.create_command_pool()?;
        self.command_pool = Some(pool);
        self.command_buffers = backend.allocate_command_buffers(pool, count as u32)?;
        for _ in 0..count {
            self.image_available.push(backend.create_semaphore()?);
            self.render_finished.push(backend.create_semaphore()?);
            self.frame_fences.push(backend.create_fence(true)?);
        }
        self.images_in_flight = vec![None; count];
        self.frame_index = 0;
        Ok(())
    }

    fn destroy_frame_resources(&mut self) {
        let backend = &self.device.backend;
        for semaphore in self.image_available.drain(..).chain(self.render_finished.drain(..)) {
            backend.destroy_semaphore(semaphore);
        }
        for fence in self.frame_fences.drain(..) {
            backend.destroy_fence(fence);
        }
        self.command_buffers.clear();
        if let Some(pool) = self.command_pool.take() {
            backend.destroy_command_pool(pool);
        }
        self.images_in_flight.clear();
    }

    /// One backbuffer per presentable image at the size in `desc`.
    fn recreate_backbuffers(&mut self) -> GpuResult<()> {
        let desc = TextureDesc {
            label: Some("backbuffer"),
            ..TextureDesc::render_target(self.desc.width, self.desc.height, self.desc.format)
        };
        validation::validate_texture_desc(&desc, self.device.backend.limits())?;
        self.backbuffers.clear();
        for _ in 0..self.images.len() {
            let raw = self.device.backend.create_texture(&desc)?;
            self.backbuffers
                .push(Arc::new(Texture::new(Arc::clone(&self.device), raw, desc.clone())));
        }
        Ok(())
    }

    /// Recreates the backbuffers at the new size and rebuilds the swapchain before the next
    /// frame.
    pub fn resize(&mut self, width: u32, height: u32) -> GpuResult<()> {
        if self.state == SwapChainState::TornDown {
            log::error!("resize: swapchain is torn down");
            return Err(ErrorCode::InvalidArgs);
        }
        let desc = SwapChainDesc {
            width,
            height,
            ..self.desc
        };
        validation::validate_swapchain_desc(&desc)?;
        self.device.backend.wait_idle()?;
        self.desc = desc;
        self.recreate_backbuffers()?;
        self.stale = true;
        Ok(())
    }

    /// Changes the preferred format and vsync; renegotiated on the next frame.
    pub fn set_present_preferences(&mut self, format: TextureFormat, vsync: bool) -> GpuResult<()> {
        let desc = SwapChainDesc {
            format,
            vsync,
            ..self.desc
        };
        validation::validate_swapchain_desc(&desc)?;
        let format_changed = desc.format != self.desc.format;
        self.desc = desc;
        if format_changed {
            self.device.backend.wait_idle()?;
            self.recreate_backbuffers()?;
        }
        self.stale = true;
        Ok(())
    }

    /// Presents the current backbuffer and advances to the next frame slot.
    pub fn swap_buffer(&mut self) -> GpuResult<()> {
        if self.state == SwapChainState::TornDown {
            log::error!("swap_buffer: swapchain is torn down");
            return Err(ErrorCode::InvalidArgs);
        }
        if (self.stale || self.swapchain.is_none()) && !self.initialize()? {
            log::trace!("swap_buffer: surface has zero extent, skipping frame");
            return Ok(());
        }

        let device = Arc::clone(&self.device);
        let backend = &device.backend;

        let mut attempts = 0;
        let (swapchain, frame, image_index, suboptimal) = loop {
            let swapchain = self.swapchain.ok_or(ErrorCode::InternalError)?;
            let frame = self.frame_index;
            backend.wait_fence(self.frame_fences[frame])?;
            match backend.acquire_next_image(swapchain, self.image_available[frame])? {
                AcquireOutcome::Acquired { index, suboptimal } => {
                    break (swapchain, frame, index as usize, suboptimal);
                }
                AcquireOutcome::OutOfDate => {
                    attempts += 1;
                    if attempts >= MAX_ACQUIRE_ATTEMPTS {
                        log::error!("swapchain still out of date after {attempts} rebuilds");
                        return Err(ErrorCode::InternalError);
                    }
                    log::debug!("acquire: swapchain out of date, rebuilding");
                    if !self.initialize()? {
                        return Ok(());
                    }
                }
            }
        };
        if suboptimal {
            log::debug!("acquire: swapchain suboptimal, rebuilding after this frame");
            self.stale = true;
        }
        if image_index >= self.images.len() {
            log::error!("acquire returned image {image_index} of {}", self.images.len());
            self.recover_frame(frame, image_index);
            return Err(ErrorCode::InternalError);
        }

        let outcome = match self.present_frame(swapchain, frame, image_index) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("swap_buffer: frame {frame} failed: {e}");
                self.recover_frame(frame, image_index);
                return Err(e);
            }
        };
        self.frame_index = (frame + 1) % self.frame_fences.len();
        if outcome == PresentOutcome::Stale || self.stale {
            log::debug!("present: swapchain stale, rebuilding");
            self.initialize()?;
        }
        Ok(())
    }

    /// Blits the frame's backbuffer into `image_index`, submits and presents. The frame fence
    /// is reset only right before the submit that signals it.
    fn present_frame(
        &mut self,
        swapchain: B::Swapchain,
        frame: usize,
        image_index: usize,
    ) -> GpuResult<PresentOutcome> {
        let device = Arc::clone(&self.device);
        let backend = &device.backend;
        if let Some(previous) = self.images_in_flight[image_index] {
            if previous != frame {
                backend.wait_fence(self.frame_fences[previous])?;
            }
        }

        let backbuffer = self
            .backbuffers
            .get(frame)
            .ok_or(ErrorCode::InternalError)?;
        let cmd = self.command_buffers[image_index];
        backend.reset_command_buffer(cmd)?;
        backend.begin_command_buffer(cmd)?;
        backend.cmd_blit_to_present(
            cmd,
            backbuffer.raw(),
            backbuffer.extent(),
            backbuffer.last_submission() != UNATTACHED,
            self.images[image_index],
            self.extent,
        );
        backend.end_command_buffer(cmd)?;

        let fence = self.frame_fences[frame];
        let render_finished = self.render_finished[frame];
        backend.reset_fence(fence)?;
        backend.submit(
            cmd,
            Some(self.image_available[frame]),
            Some(render_finished),
            Some(fence),
        )?;
        self.images_in_flight[image_index] = Some(frame);

        backend.present(swapchain, image_index as u32, render_finished)
    }

    /// After a failed frame the slot's acquire semaphore may hold a signal nobody waits on and
    /// its fence may never be signalled. Both are replaced once the device is idle, and the
    /// swapchain is rebuilt before the next frame so the acquired image is released.
    fn recover_frame(&mut self, frame: usize, image_index: usize) {
        let device = Arc::clone(&self.device);
        let backend = &device.backend;
        if let Err(e) = backend.wait_idle() {
            log::error!("swap_buffer: wait_idle during recovery failed: {e}");
        }
        self.stale = true;
        if self.images_in_flight.get(image_index) == Some(&Some(frame)) {
            self.images_in_flight[image_index] = None;
        }

        match backend.create_fence(true) {
            Ok(fence) => {
                let old = std::mem::replace(&mut self.frame_fences[frame], fence);
                backend.destroy_fence(old);
            }
            Err(e) => log::error!("swap_buffer: could not replace fence of frame {frame}: {e}"),
        }
        for semaphores in [&mut self.image_available, &mut self.render_finished] {
            match backend.create_semaphore() {
                Ok(semaphore) => {
                    let old = std::mem::replace(&mut semaphores[frame], semaphore);
                    backend.destroy_semaphore(old);
                }
                Err(e) => log::error!("swap_buffer: could not replace semaphore of frame {frame}: {e}"),
            }
        }
    }

    fn teardown(&mut self) {
        if self.state == SwapChainState::TornDown {
            return;
        }
        let device = Arc::clone(&self.device);
        let backend = &device.backend;
        if let Err(e) = backend.wait_idle() {
            log::error!("swapchain teardown: wait_idle failed: {e}");
        }
        self.backbuffers.clear();
        self.destroy_frame_resources();
        self.images.clear();
        if let Some(swapchain) = self.swapchain.take() {
            backend.destroy_swapchain(swapchain);
        }
        backend.destroy_surface(self.surface);
        self.state = SwapChainState::TornDown;
    }
}

impl<B: Backend> Drop for SwapChain<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSettings;
    use crate::device::Device;
    use crate::mock::{MockBackend, MockStats, MockWindow};
    use std::rc::Rc;

    fn setup(backend: MockBackend) -> (Device<MockBackend>, SwapChain<MockBackend>, Rc<MockStats>) {
        let stats = backend.stats();
        let device = Device::from_backend(backend, &DeviceSettings::default());
        let swapchain = device
            .create_swapchain(&MockWindow, &SwapChainDesc::default())
            .unwrap();
        (device, swapchain, stats)
    }

    #[test]
    fn negotiation_prefers_exact_format_then_encoding() {
        let formats = [
            SurfaceFormat {
                format: TextureFormat::Rgba8Unorm,
                color_space: ColorSpace::SrgbNonlinear,
            },
            SurfaceFormat {
                format: TextureFormat::Bgra8Srgb,
                color_space: ColorSpace::SrgbNonlinear,
            },
        ];
        assert_eq!(
            choose_surface_format(&formats, TextureFormat::Bgra8Srgb).map(|f| f.format),
            Some(TextureFormat::Bgra8Srgb)
        );
        assert_eq!(
            choose_surface_format(&formats, TextureFormat::Rgba16Float).map(|f| f.format),
            Some(TextureFormat::Rgba8Unorm)
        );
        assert_eq!(
            choose_surface_format(&formats, TextureFormat::Rgba8Srgb).map(|f| f.format),
            Some(TextureFormat::Bgra8Srgb)
        );
        assert_eq!(choose_surface_format(&[], TextureFormat::Bgra8Srgb), None);

        let modes = [PresentMode::Mailbox, PresentMode::Fifo];
        assert_eq!(choose_present_mode(&modes, true), Some(PresentMode::Fifo));
        assert_eq!(choose_present_mode(&modes, false), Some(PresentMode::Mailbox));
    }

    #[test]
    fn creation_builds_one_backbuffer_per_image() {
        let (_device, swapchain, stats) = setup(MockBackend::new());
        assert_eq!(swapchain.state(), SwapChainState::Initialized);
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(stats.created("semaphore"), 6);
        assert_eq!(stats.created("fence"), 3);
        for i in 0..3 {
            let backbuffer = swapchain.get_swapchain_backbuffer(i).unwrap();
            assert_eq!(backbuffer.extent(), Extent2D::new(1280, 720));
        }
        assert!(swapchain.get_swapchain_backbuffer(3).is_none());
    }

    #[test]
    fn swap_after_resize_reports_new_dimensions() {
        let (_device, mut swapchain, stats) = setup(MockBackend::new());
        swapchain.resize(800, 600).unwrap();
        swapchain.swap_buffer().unwrap();

        for i in 0..swapchain.image_count() {
            let backbuffer = swapchain.get_swapchain_backbuffer(i).unwrap();
            assert_eq!(backbuffer.extent(), Extent2D::new(800, 600));
        }
        assert_eq!(swapchain.extent(), Extent2D::new(800, 600));
        assert_eq!(stats.calls("cmd_blit_to_present"), 1);
        assert_eq!(stats.calls("present"), 1);
        assert_eq!(stats.created("swapchain"), 2);
        assert_eq!(stats.destroyed("swapchain"), 1);
    }

    #[test]
    fn out_of_date_acquire_rebuilds_and_retries() {
        let backend = MockBackend::new();
        backend.script_acquire(AcquireOutcome::OutOfDate);
        let (device, mut swapchain, stats) = setup(backend);

        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("acquire_next_image"), 2);
        assert_eq!(stats.calls("present"), 1);
        assert_eq!(stats.created("swapchain"), 2);
        assert_eq!(stats.destroyed("swapchain"), 1);
        assert_eq!(stats.created("semaphore"), 6);

        drop(swapchain);
        drop(device);
        assert_eq!(stats.destroyed("swapchain"), 2);
        assert_eq!(stats.live("semaphore"), 0);
        assert_eq!(stats.live("fence"), 0);
        assert_eq!(stats.live("texture"), 0);
        assert_eq!(stats.live("surface"), 0);
    }

    #[test]
    fn persistent_out_of_date_is_bounded() {
        let backend = MockBackend::new();
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            backend.script_acquire(AcquireOutcome::OutOfDate);
        }
        let (_device, mut swapchain, stats) = setup(backend);
        assert_eq!(swapchain.swap_buffer(), Err(ErrorCode::InternalError));
        assert_eq!(stats.calls("present"), 0);
    }

    #[test]
    fn suboptimal_frame_is_presented_then_rebuilt() {
        let backend = MockBackend::new();
        backend.script_acquire(AcquireOutcome::Acquired {
            index: 0,
            suboptimal: true,
        });
        let (_device, mut swapchain, stats) = setup(backend);
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("present"), 1);
        assert_eq!(stats.created("swapchain"), 2);
        assert_eq!(swapchain.state(), SwapChainState::Initialized);
    }

    #[test]
    fn stale_present_rebuilds_transparently() {
        let backend = MockBackend::new();
        backend.script_present(PresentOutcome::Stale);
        let (_device, mut swapchain, stats) = setup(backend);
        swapchain.swap_buffer().unwrap();
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("present"), 2);
        assert_eq!(stats.created("swapchain"), 2);
        assert_eq!(stats.destroyed("swapchain"), 1);
    }

    #[test]
    fn failed_submit_replaces_frame_sync_objects() {
        let (device, mut swapchain, stats) = setup(MockBackend::new());
        let fences = stats.created("fence");
        let semaphores = stats.created("semaphore");

        device.backend().fail_next("submit");
        assert_eq!(swapchain.swap_buffer(), Err(ErrorCode::InternalError));
        assert_eq!(swapchain.frame_index(), 0);
        assert_eq!(stats.created("fence"), fences + 1);
        assert_eq!(stats.destroyed("fence"), 1);
        assert_eq!(stats.created("semaphore"), semaphores + 2);

        swapchain.swap_buffer().unwrap();
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("present"), 2);
        assert_eq!(stats.created("swapchain"), 2);
        assert_eq!(stats.destroyed("swapchain"), 1);
    }

    #[test]
    fn failed_present_does_not_stall_the_next_frame() {
        let (device, mut swapchain, stats) = setup(MockBackend::new());
        device.backend().fail_next("present");
        assert_eq!(swapchain.swap_buffer(), Err(ErrorCode::InternalError));
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("present"), 2);
        assert_eq!(stats.calls("submit"), 2);
    }

    #[test]
    fn zero_sized_surface_skips_frames() {
        let backend = MockBackend::new();
        let (device, mut swapchain, stats) = setup(backend);
        device.backend().set_surface_extent(Some(Extent2D::new(0, 0)));
        swapchain.resize(640, 480).unwrap();
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("acquire_next_image"), 0);

        device.backend().set_surface_extent(Some(Extent2D::new(640, 480)));
        swapchain.swap_buffer().unwrap();
        assert_eq!(stats.calls("present"), 1);
        assert_eq!(swapchain.extent(), Extent2D::new(640, 480));
    }

    #[test]
    fn frame_index_wraps_with_image_count() {
        let (_device, mut swapchain, stats) = setup(MockBackend::new());
        for _ in 0..4 {
            swapchain.swap_buffer().unwrap();
        }
        assert_eq!(swapchain.frame_index(), 1);
        assert_eq!(stats.calls("present"), 4);
        assert_eq!(stats.created("swapchain"), 1);
    }

    #[test]
    fn vsync_change_renegotiates_present_mode() {
        let (_device, mut swapchain, stats) = setup(MockBackend::new());
        assert_eq!(swapchain.present_mode(), PresentMode::Fifo);
        swapchain.set_present_preferences(TextureFormat::Bgra8Srgb, false).unwrap();
        swapchain.swap_buffer().unwrap();
        assert_eq!(swapchain.present_mode(), PresentMode::Immediate);
        assert_eq!(stats.calls("surface_present_modes"), 2);
    }
}
