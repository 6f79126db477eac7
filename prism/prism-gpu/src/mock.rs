//! In-memory backend for unit tests. Every create/destroy and command call is counted, and
//! acquire/present results can be scripted.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::error::{ErrorCode, GpuResult};
use crate::hal::{
    AcquireOutcome, Backend, ColorSpace, FramebufferTargets, GraphicsPipelineInfo, PresentMode,
    PresentOutcome, SurfaceCapabilities, SurfaceFormat, SwapchainCreateInfo,
};
use crate::reflection::LayoutBinding;
use crate::types::{
    AdapterInfo, BufferCopy, BufferDesc, BufferTextureCopy, BufferViewDesc, ClearValue,
    DeviceLimits, Extent2D, IndexType, Rect2D, RenderPassDesc, SamplerDesc, TextureDesc,
    TextureFormat, Viewport,
};
use crate::window::{RawHandle, Window, WindowType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockHandle(pub u64);

/// Counters shared between a backend and the test that created it, so they stay readable after
/// the owning device is dropped.
#[derive(Debug, Default)]
pub struct MockStats {
    created: RefCell<HashMap<&'static str, usize>>,
    destroyed: RefCell<HashMap<&'static str, usize>>,
    calls: RefCell<HashMap<&'static str, usize>>,
}

impl MockStats {
    fn bump(map: &RefCell<HashMap<&'static str, usize>>, key: &'static str) {
        *map.borrow_mut().entry(key).or_insert(0) += 1;
    }

    pub fn created(&self, kind: &str) -> usize {
        self.created.borrow().get(kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: &str) -> usize {
        self.destroyed.borrow().get(kind).copied().unwrap_or(0)
    }

    pub fn live(&self, kind: &str) -> usize {
        self.created(kind) - self.destroyed(kind)
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }
}

pub struct MockBackend {
    stats: Rc<MockStats>,
    next_handle: Cell<u64>,
    adapter: AdapterInfo,
    limits: DeviceLimits,
    failing: RefCell<HashSet<&'static str>>,
    failing_once: RefCell<HashSet<&'static str>>,
    fences: RefCell<HashMap<u64, bool>>,
    surface_extent: Cell<Option<Extent2D>>,
    surface_formats: Vec<SurfaceFormat>,
    present_modes: Vec<PresentMode>,
    acquire_script: RefCell<VecDeque<AcquireOutcome>>,
    present_script: RefCell<VecDeque<PresentOutcome>>,
    swapchain_images: RefCell<HashMap<u64, u32>>,
    next_image: Cell<u32>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            stats: Rc::new(MockStats::default()),
            next_handle: Cell::new(1),
            adapter: AdapterInfo {
                name: "mock adapter".to_string(),
                vendor_id: 0,
                device_id: 0,
                discrete: false,
            },
            limits: DeviceLimits::default(),
            failing: RefCell::new(HashSet::new()),
            failing_once: RefCell::new(HashSet::new()),
            fences: RefCell::new(HashMap::new()),
            surface_extent: Cell::new(None),
            surface_formats: vec![
                SurfaceFormat {
                    format: TextureFormat::Bgra8Unorm,
                    color_space: ColorSpace::SrgbNonlinear,
                },
                SurfaceFormat {
                    format: TextureFormat::Bgra8Srgb,
                    color_space: ColorSpace::SrgbNonlinear,
                },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Immediate],
            acquire_script: RefCell::new(VecDeque::new()),
            present_script: RefCell::new(VecDeque::new()),
            swapchain_images: RefCell::new(HashMap::new()),
            next_image: Cell::new(0),
        }
    }

    pub fn stats(&self) -> Rc<MockStats> {
        Rc::clone(&self.stats)
    }

    /// Makes every later `create_<kind>` call fail with `OutOfDeviceMemory`.
    pub fn fail_on(&self, kind: &'static str) {
        self.failing.borrow_mut().insert(kind);
    }

    /// Makes the next `name` call (`submit`, `present`, `begin_command_buffer`,
    /// `end_command_buffer`) fail with `InternalError`, as a lost device would.
    pub fn fail_next(&self, name: &'static str) {
        self.failing_once.borrow_mut().insert(name);
    }

    pub fn fence_signaled(&self, fence: MockHandle) -> Option<bool> {
        self.fences.borrow().get(&fence.0).copied()
    }

    /// `None` lets the swapchain pick its own extent.
    pub fn set_surface_extent(&self, extent: Option<Extent2D>) {
        self.surface_extent.set(extent);
    }

    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.acquire_script.borrow_mut().push_back(outcome);
    }

    pub fn script_present(&self, outcome: PresentOutcome) {
        self.present_script.borrow_mut().push_back(outcome);
    }

    fn create(&self, kind: &'static str) -> GpuResult<MockHandle> {
        if self.failing.borrow().contains(kind) {
            return Err(ErrorCode::OutOfDeviceMemory);
        }
        MockStats::bump(&self.stats.created, kind);
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        Ok(MockHandle(id))
    }

    fn destroy(&self, kind: &'static str) {
        MockStats::bump(&self.stats.destroyed, kind);
    }

    fn call(&self, name: &'static str) {
        MockStats::bump(&self.stats.calls, name);
    }

    fn fallible(&self, name: &'static str) -> GpuResult<()> {
        self.call(name);
        if self.failing_once.borrow_mut().remove(name) {
            return Err(ErrorCode::InternalError);
        }
        Ok(())
    }
}

pub struct MockWindow;

impl Window for MockWindow {
    fn get_window_type(&self) -> WindowType {
        WindowType::Headless
    }

    fn get_raw_handle(&self) -> RawHandle {
        use raw_window_handle::{
            RawDisplayHandle, RawWindowHandle, WebDisplayHandle, WebWindowHandle,
        };
        RawHandle {
            display: RawDisplayHandle::Web(WebDisplayHandle::new()),
            window: RawWindowHandle::Web(WebWindowHandle::new(1)),
        }
    }
}

impl Backend for MockBackend {
    type Texture = MockHandle;
    type Buffer = MockHandle;
    type BufferView = MockHandle;
    type RenderPass = MockHandle;
    type Framebuffer = MockHandle;
    type Sampler = MockHandle;
    type PipelineLayout = MockHandle;
    type Pipeline = MockHandle;
    type CommandPool = MockHandle;
    type CommandBuffer = MockHandle;
    type Fence = MockHandle;
    type Semaphore = MockHandle;
    type Surface = MockHandle;
    type Swapchain = MockHandle;
    type PresentImage = MockHandle;

    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_texture(&self, _desc: &TextureDesc) -> GpuResult<MockHandle> {
        self.create("texture")
    }

    fn destroy_texture(&self, _texture: MockHandle) {
        self.destroy("texture")
    }

    fn create_buffer(&self, _desc: &BufferDesc) -> GpuResult<MockHandle> {
        self.create("buffer")
    }

    fn destroy_buffer(&self, _buffer: MockHandle) {
        self.destroy("buffer")
    }

    fn write_buffer(&self, _buffer: &MockHandle, _offset: u64, _data: &[u8]) -> GpuResult<()> {
        self.call("write_buffer");
        Ok(())
    }

    fn create_buffer_view(&self, _buffer: &MockHandle, _desc: &BufferViewDesc) -> GpuResult<MockHandle> {
        self.create("buffer_view")
    }

    fn destroy_buffer_view(&self, _view: MockHandle) {
        self.destroy("buffer_view")
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> GpuResult<MockHandle> {
        self.create("render_pass")
    }

    fn destroy_render_pass(&self, _render_pass: MockHandle) {
        self.destroy("render_pass")
    }

    fn create_framebuffer(
        &self,
        _render_pass: MockHandle,
        _targets: &FramebufferTargets<'_, Self>,
    ) -> GpuResult<MockHandle> {
        self.create("framebuffer")
    }

    fn destroy_framebuffer(&self, _framebuffer: MockHandle) {
        self.destroy("framebuffer")
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> GpuResult<MockHandle> {
        self.create("sampler")
    }

    fn destroy_sampler(&self, _sampler: MockHandle) {
        self.destroy("sampler")
    }

    fn create_pipeline_layout(&self, _bindings: &[LayoutBinding]) -> GpuResult<MockHandle> {
        self.create("pipeline_layout")
    }

    fn destroy_pipeline_layout(&self, _layout: MockHandle) {
        self.destroy("pipeline_layout")
    }

    fn create_graphics_pipeline(&self, _info: &GraphicsPipelineInfo<'_, Self>) -> GpuResult<MockHandle> {
        self.create("pipeline")
    }

    fn destroy_pipeline(&self, _pipeline: MockHandle) {
        self.destroy("pipeline")
    }

    fn create_command_pool(&self) -> GpuResult<MockHandle> {
        self.create("command_pool")
    }

    fn destroy_command_pool(&self, _pool: MockHandle) {
        self.destroy("command_pool")
    }

    fn reset_command_pool(&self, _pool: MockHandle) -> GpuResult<()> {
        self.call("reset_command_pool");
        Ok(())
    }

    fn allocate_command_buffers(&self, _pool: MockHandle, count: u32) -> GpuResult<Vec<MockHandle>> {
        (0..count).map(|_| self.create("command_buffer")).collect()
    }

    fn reset_command_buffer(&self, _cmd: MockHandle) -> GpuResult<()> {
        self.call("reset_command_buffer");
        Ok(())
    }

    fn begin_command_buffer(&self, _cmd: MockHandle) -> GpuResult<()> {
        self.fallible("begin_command_buffer")
    }

    fn end_command_buffer(&self, _cmd: MockHandle) -> GpuResult<()> {
        self.fallible("end_command_buffer")
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<MockHandle> {
        let fence = self.create("fence")?;
        self.fences.borrow_mut().insert(fence.0, signaled);
        Ok(fence)
    }

    /// A real fence that nothing will signal blocks forever; the mock panics instead.
    fn wait_fence(&self, fence: MockHandle) -> GpuResult<()> {
        self.call("wait_fence");
        assert_ne!(
            self.fence_signaled(fence),
            Some(false),
            "waiting on fence {fence:?} that nothing will signal"
        );
        Ok(())
    }

    fn reset_fence(&self, fence: MockHandle) -> GpuResult<()> {
        self.call("reset_fence");
        if let Some(signaled) = self.fences.borrow_mut().get_mut(&fence.0) {
            *signaled = false;
        }
        Ok(())
    }

    fn destroy_fence(&self, fence: MockHandle) {
        self.fences.borrow_mut().remove(&fence.0);
        self.destroy("fence")
    }

    fn create_semaphore(&self) -> GpuResult<MockHandle> {
        self.create("semaphore")
    }

    fn destroy_semaphore(&self, _semaphore: MockHandle) {
        self.destroy("semaphore")
    }

    fn submit(
        &self,
        _cmd: MockHandle,
        _wait: Option<MockHandle>,
        _signal: Option<MockHandle>,
        fence: Option<MockHandle>,
    ) -> GpuResult<()> {
        self.fallible("submit")?;
        if let Some(fence) = fence {
            if let Some(signaled) = self.fences.borrow_mut().get_mut(&fence.0) {
                *signaled = true;
            }
        }
        Ok(())
    }

    fn wait_idle(&self) -> GpuResult<()> {
        self.call("wait_idle");
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _cmd: MockHandle,
        _render_pass: MockHandle,
        _framebuffer: MockHandle,
        _area: Rect2D,
        _clear_values: &[ClearValue],
    ) {
        self.call("cmd_begin_render_pass")
    }

    fn cmd_end_render_pass(&self, _cmd: MockHandle) {
        self.call("cmd_end_render_pass")
    }

    fn cmd_bind_pipeline(&self, _cmd: MockHandle, _pipeline: MockHandle) {
        self.call("cmd_bind_pipeline")
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: MockHandle, _slot: u32, _buffer: &MockHandle, _offset: u64) {
        self.call("cmd_bind_vertex_buffer")
    }

    fn cmd_bind_index_buffer(
        &self,
        _cmd: MockHandle,
        _buffer: &MockHandle,
        _offset: u64,
        _index_type: IndexType,
    ) {
        self.call("cmd_bind_index_buffer")
    }

    fn cmd_set_viewport(&self, _cmd: MockHandle, _viewport: &Viewport) {
        self.call("cmd_set_viewport")
    }

    fn cmd_set_scissor(&self, _cmd: MockHandle, _scissor: &Rect2D) {
        self.call("cmd_set_scissor")
    }

    fn cmd_set_blend_constants(&self, _cmd: MockHandle, _constants: [f32; 4]) {
        self.call("cmd_set_blend_constants")
    }

    fn cmd_set_stencil_reference(&self, _cmd: MockHandle, _reference: u32) {
        self.call("cmd_set_stencil_reference")
    }

    fn cmd_draw(&self, _cmd: MockHandle, _vertices: u32, _instances: u32, _first_vertex: u32, _first_instance: u32) {
        self.call("cmd_draw")
    }

    fn cmd_draw_indexed(
        &self,
        _cmd: MockHandle,
        _indices: u32,
        _instances: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.call("cmd_draw_indexed")
    }

    fn cmd_copy_buffer(&self, _cmd: MockHandle, _src: &MockHandle, _dst: &MockHandle, _region: BufferCopy) {
        self.call("cmd_copy_buffer")
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        _cmd: MockHandle,
        _src: &MockHandle,
        _dst: &MockHandle,
        _region: BufferTextureCopy,
    ) {
        self.call("cmd_copy_buffer_to_texture")
    }

    fn cmd_blit_to_present(
        &self,
        _cmd: MockHandle,
        _src: &MockHandle,
        _src_extent: Extent2D,
        _src_rendered: bool,
        _dst: MockHandle,
        _dst_extent: Extent2D,
    ) {
        self.call("cmd_blit_to_present")
    }

    fn create_surface(&self, _window: &dyn Window) -> GpuResult<MockHandle> {
        self.create("surface")
    }

    fn destroy_surface(&self, _surface: MockHandle) {
        self.destroy("surface")
    }

    fn surface_capabilities(&self, _surface: MockHandle) -> GpuResult<SurfaceCapabilities> {
        self.call("surface_capabilities");
        Ok(SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: self.surface_extent.get(),
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(16384, 16384),
        })
    }

    fn surface_formats(&self, _surface: MockHandle) -> GpuResult<Vec<SurfaceFormat>> {
        self.call("surface_formats");
        Ok(self.surface_formats.clone())
    }

    fn surface_present_modes(&self, _surface: MockHandle) -> GpuResult<Vec<PresentMode>> {
        self.call("surface_present_modes");
        Ok(self.present_modes.clone())
    }

    fn create_swapchain(
        &self,
        _surface: MockHandle,
        info: &SwapchainCreateInfo,
        _old: Option<MockHandle>,
    ) -> GpuResult<MockHandle> {
        let handle = self.create("swapchain")?;
        self.swapchain_images.borrow_mut().insert(handle.0, info.image_count);
        Ok(handle)
    }

    fn destroy_swapchain(&self, swapchain: MockHandle) {
        self.swapchain_images.borrow_mut().remove(&swapchain.0);
        self.destroy("swapchain")
    }

    fn swapchain_images(&self, swapchain: MockHandle) -> GpuResult<Vec<MockHandle>> {
        let count = self
            .swapchain_images
            .borrow()
            .get(&swapchain.0)
            .copied()
            .ok_or(ErrorCode::InternalError)?;
        Ok((0..count).map(|i| MockHandle(1_000_000 + i as u64)).collect())
    }

    fn acquire_next_image(&self, swapchain: MockHandle, _signal: MockHandle) -> GpuResult<AcquireOutcome> {
        self.call("acquire_next_image");
        if let Some(outcome) = self.acquire_script.borrow_mut().pop_front() {
            return Ok(outcome);
        }
        let count = self
            .swapchain_images
            .borrow()
            .get(&swapchain.0)
            .copied()
            .ok_or(ErrorCode::InternalError)?;
        let index = self.next_image.get() % count;
        self.next_image.set(index + 1);
        Ok(AcquireOutcome::Acquired { index, suboptimal: false })
    }

    fn present(&self, _swapchain: MockHandle, _image_index: u32, _wait: MockHandle) -> GpuResult<PresentOutcome> {
        self.fallible("present")?;
        Ok(self
            .present_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }
}
