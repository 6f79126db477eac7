//! Surface queries, swapchain creation, acquire and present.

use ash::vk;

use super::map_vk_result;
use super::texture::{texture_format_from_vk, texture_format_to_vk};
use super::VulkanBackend;
use crate::error::{ErrorCode, GpuResult};
use crate::hal::{
    AcquireOutcome, ColorSpace, PresentMode, PresentOutcome, SurfaceCapabilities, SurfaceFormat,
    SwapchainCreateInfo,
};
use crate::types::Extent2D;
use crate::window::{Window, WindowType};

impl VulkanBackend {
    pub(super) fn create_vk_surface(&self, window: &dyn Window) -> GpuResult<vk::SurfaceKHR> {
        if window.get_window_type() == WindowType::Headless {
            return Err(ErrorCode::SurfacePresentationNotSupported);
        }
        let handle = window.get_raw_handle();
        let surface = unsafe {
            ash_window::create_surface(&self.entry, &self.instance, handle.display, handle.window, None)
        }
        .map_err(|e| {
            log::error!("surface creation failed: {e:?}");
            match e {
                vk::Result::ERROR_EXTENSION_NOT_PRESENT => ErrorCode::SurfacePresentationNotSupported,
                other => map_vk_result(other),
            }
        })?;

        let supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.physical_device,
                self.queue_family_index,
                surface,
            )
        };
        match supported {
            Ok(true) => Ok(surface),
            Ok(false) => {
                log::warn!("queue family {} cannot present to this surface", self.queue_family_index);
                unsafe { self.surface_loader.destroy_surface(surface, None) };
                Err(ErrorCode::SurfacePresentationNotSupported)
            }
            Err(e) => {
                unsafe { self.surface_loader.destroy_surface(surface, None) };
                Err(map_vk_result(e))
            }
        }
    }

    pub(super) fn vk_surface_capabilities(&self, surface: vk::SurfaceKHR) -> GpuResult<SurfaceCapabilities> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, surface)
        }
        .map_err(map_vk_result)?;
        Ok(capabilities_from_vk(&caps))
    }

    pub(super) fn vk_surface_formats(&self, surface: vk::SurfaceKHR) -> GpuResult<Vec<SurfaceFormat>> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.physical_device, surface)
        }
        .map_err(map_vk_result)?;
        Ok(formats.iter().filter_map(surface_format_from_vk).collect())
    }

    pub(super) fn vk_surface_present_modes(&self, surface: vk::SurfaceKHR) -> GpuResult<Vec<PresentMode>> {
        let modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, surface)
        }
        .map_err(map_vk_result)?;
        Ok(modes.into_iter().filter_map(present_mode_from_vk).collect())
    }

    pub(super) fn create_vk_swapchain(
        &self,
        surface: vk::SurfaceKHR,
        info: &SwapchainCreateInfo,
        old: Option<vk::SwapchainKHR>,
    ) -> GpuResult<vk::SwapchainKHR> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, surface)
        }
        .map_err(map_vk_result)?;
        let composite_alpha = [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|flag| caps.supported_composite_alpha.contains(*flag))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(info.image_count)
            .image_format(texture_format_to_vk(info.format.format))
            .image_color_space(color_space_to_vk(info.format.color_space))
            .image_extent(vk::Extent2D {
                width: info.extent.width,
                height: info.extent.height,
            })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode_to_vk(info.present_mode))
            .clipped(true)
            .old_swapchain(old.unwrap_or(vk::SwapchainKHR::null()));

        unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }.map_err(map_vk_result)
    }

    pub(super) fn vk_acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> GpuResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(map_vk_result(e)),
        }
    }

    pub(super) fn vk_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> GpuResult<PresentOutcome> {
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(std::slice::from_ref(&wait))
            .swapchains(std::slice::from_ref(&swapchain))
            .image_indices(&image_indices);
        let queue = self.queue.lock();
        match unsafe { self.swapchain_loader.queue_present(*queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(map_vk_result(e)),
        }
    }
}

fn capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    // u32::MAX means the swapchain decides the surface size.
    let current_extent = (caps.current_extent.width != u32::MAX)
        .then(|| Extent2D::new(caps.current_extent.width, caps.current_extent.height));
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_extent: Extent2D::new(caps.min_image_extent.width, caps.min_image_extent.height),
        max_extent: Extent2D::new(caps.max_image_extent.width, caps.max_image_extent.height),
    }
}

fn surface_format_from_vk(format: &vk::SurfaceFormatKHR) -> Option<SurfaceFormat> {
    Some(SurfaceFormat {
        format: texture_format_from_vk(format.format)?,
        color_space: color_space_from_vk(format.color_space)?,
    })
}

fn color_space_from_vk(space: vk::ColorSpaceKHR) -> Option<ColorSpace> {
    match space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(ColorSpace::SrgbNonlinear),
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => Some(ColorSpace::ExtendedSrgbLinear),
        vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT => Some(ColorSpace::DisplayP3Nonlinear),
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => Some(ColorSpace::Hdr10St2084),
        _ => None,
    }
}

fn color_space_to_vk(space: ColorSpace) -> vk::ColorSpaceKHR {
    match space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::ExtendedSrgbLinear => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ColorSpace::DisplayP3Nonlinear => vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        ColorSpace::Hdr10St2084 => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
    }
}

fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    #[test]
    fn undefined_current_extent_is_none() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            ..Default::default()
        };
        let converted = capabilities_from_vk(&caps);
        assert_eq!(converted.current_extent, None);
        assert_eq!(converted.max_image_count, 0);

        let fixed = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 800, height: 600 },
            ..caps
        };
        assert_eq!(capabilities_from_vk(&fixed).current_extent, Some(Extent2D::new(800, 600)));
    }

    #[test]
    fn unknown_surface_formats_are_skipped() {
        let known = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unknown = vk::SurfaceFormatKHR {
            format: vk::Format::A2B10G10R10_UNORM_PACK32,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(
            surface_format_from_vk(&known),
            Some(SurfaceFormat {
                format: TextureFormat::Bgra8Srgb,
                color_space: ColorSpace::SrgbNonlinear
            })
        );
        assert_eq!(surface_format_from_vk(&unknown), None);
    }

    #[test]
    fn present_modes_round_trip() {
        for mode in [PresentMode::Immediate, PresentMode::Mailbox, PresentMode::Fifo, PresentMode::FifoRelaxed] {
            assert_eq!(present_mode_from_vk(present_mode_to_vk(mode)), Some(mode));
        }
        assert_eq!(present_mode_from_vk(vk::PresentModeKHR::SHARED_DEMAND_REFRESH), None);
    }
}
