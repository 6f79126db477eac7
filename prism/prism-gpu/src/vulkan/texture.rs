//! Vulkan textures: VkImage, its allocation and a full-range VkImageView.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;

use super::{map_allocation_error, map_vk_result};
use crate::error::GpuResult;
use crate::types::{TextureDesc, TextureFormat, TextureType, TextureUsage};

#[derive(Debug)]
pub struct VulkanTexture {
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) aspect: vk::ImageAspectFlags,
}

impl VulkanTexture {
    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

pub(super) fn create_texture(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    allocator: &mut Allocator,
    desc: &TextureDesc,
) -> GpuResult<VulkanTexture> {
    let format = texture_format_to_vk(desc.format);
    let image_type = texture_type_to_image_type(desc.texture_type);
    let usage = texture_usage_to_vk(desc.usage);
    let flags = if desc.texture_type.is_cube() {
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    } else {
        vk::ImageCreateFlags::empty()
    };

    // Reject format/usage pairs the adapter cannot back before creating anything.
    unsafe {
        instance.get_physical_device_image_format_properties(
            physical_device,
            format,
            image_type,
            vk::ImageTiling::OPTIMAL,
            usage,
            flags,
        )
    }
    .map_err(map_vk_result)?;

    let extent = vk::Extent3D {
        width: desc.width.max(1),
        height: desc.height.max(1),
        depth: desc.depth.max(1),
    };
    let create_info = vk::ImageCreateInfo::default()
        .image_type(image_type)
        .format(format)
        .extent(extent)
        .mip_levels(desc.mip_levels.max(1))
        .array_layers(desc.array_layers.max(1))
        .samples(sample_count_to_vk(desc.num_samples))
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .flags(flags);

    let image = unsafe { device.create_image(&create_info, None) }.map_err(map_vk_result)?;

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let allocation = match allocator.allocate(&AllocationCreateDesc {
        name: desc.label.unwrap_or("texture"),
        requirements,
        location: MemoryLocation::GpuOnly,
        linear: false,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(e) => {
            unsafe { device.destroy_image(image, None) };
            return Err(map_allocation_error(e));
        }
    };

    let bind = unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
    if let Err(e) = bind {
        let _ = allocator.free(allocation);
        unsafe { device.destroy_image(image, None) };
        return Err(map_vk_result(e));
    }

    let aspect = view_aspect(desc.format, desc.usage);
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(texture_type_to_view_type(desc.texture_type))
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(desc.mip_levels.max(1))
                .base_array_layer(0)
                .layer_count(desc.array_layers.max(1)),
        );
    let view = match unsafe { device.create_image_view(&view_info, None) } {
        Ok(view) => view,
        Err(e) => {
            let _ = allocator.free(allocation);
            unsafe { device.destroy_image(image, None) };
            return Err(map_vk_result(e));
        }
    };

    Ok(VulkanTexture {
        image,
        view,
        allocation: Some(allocation),
        aspect,
    })
}

pub(super) fn destroy_texture(device: &ash::Device, allocator: &mut Allocator, mut texture: VulkanTexture) {
    unsafe {
        device.destroy_image_view(texture.view, None);
        device.destroy_image(texture.image, None);
    }
    if let Some(allocation) = texture.allocation.take() {
        if let Err(e) = allocator.free(allocation) {
            log::error!("failed to free texture memory: {e}");
        }
    }
}

/// Sampled depth-stencil views expose depth only.
fn view_aspect(format: TextureFormat, usage: TextureUsage) -> vk::ImageAspectFlags {
    if !format.is_depth() {
        vk::ImageAspectFlags::COLOR
    } else if format.has_stencil() && !usage.contains(TextureUsage::SAMPLED) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R16Float => vk::Format::R16_SFLOAT,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::Rgba32Uint => vk::Format::R32G32B32A32_UINT,
        TextureFormat::R32Sint => vk::Format::R32_SINT,
        TextureFormat::Rgba32Sint => vk::Format::R32G32B32A32_SINT,
        TextureFormat::D16Unorm => vk::Format::D16_UNORM,
        TextureFormat::D32Float => vk::Format::D32_SFLOAT,
        TextureFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Inverse of [`texture_format_to_vk`]; formats outside the table are not exposed.
pub fn texture_format_from_vk(format: vk::Format) -> Option<TextureFormat> {
    let format = match format {
        vk::Format::R8_UNORM => TextureFormat::R8Unorm,
        vk::Format::R8G8_UNORM => TextureFormat::Rg8Unorm,
        vk::Format::R8G8B8A8_UNORM => TextureFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::Rgba8Srgb,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::Bgra8Srgb,
        vk::Format::R16_SFLOAT => TextureFormat::R16Float,
        vk::Format::R16G16B16A16_SFLOAT => TextureFormat::Rgba16Float,
        vk::Format::R32_SFLOAT => TextureFormat::R32Float,
        vk::Format::R32G32B32A32_SFLOAT => TextureFormat::Rgba32Float,
        vk::Format::R32_UINT => TextureFormat::R32Uint,
        vk::Format::R32G32B32A32_UINT => TextureFormat::Rgba32Uint,
        vk::Format::R32_SINT => TextureFormat::R32Sint,
        vk::Format::R32G32B32A32_SINT => TextureFormat::Rgba32Sint,
        vk::Format::D16_UNORM => TextureFormat::D16Unorm,
        vk::Format::D32_SFLOAT => TextureFormat::D32Float,
        vk::Format::D24_UNORM_S8_UINT => TextureFormat::D24UnormS8Uint,
        vk::Format::D32_SFLOAT_S8_UINT => TextureFormat::D32FloatS8Uint,
        _ => return None,
    };
    Some(format)
}

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::COPY_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

pub fn sample_count_to_vk(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        32 => vk::SampleCountFlags::TYPE_32,
        64 => vk::SampleCountFlags::TYPE_64,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

fn texture_type_to_image_type(ty: TextureType) -> vk::ImageType {
    match ty {
        TextureType::Texture1D | TextureType::Texture1DArray => vk::ImageType::TYPE_1D,
        TextureType::Texture2D
        | TextureType::Texture2DArray
        | TextureType::TextureCube
        | TextureType::TextureCubeArray => vk::ImageType::TYPE_2D,
        TextureType::Texture3D => vk::ImageType::TYPE_3D,
    }
}

fn texture_type_to_view_type(ty: TextureType) -> vk::ImageViewType {
    match ty {
        TextureType::Texture1D => vk::ImageViewType::TYPE_1D,
        TextureType::Texture1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureType::Texture2D => vk::ImageViewType::TYPE_2D,
        TextureType::Texture2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Texture3D => vk::ImageViewType::TYPE_3D,
        TextureType::TextureCube => vk::ImageViewType::CUBE,
        TextureType::TextureCubeArray => vk::ImageViewType::CUBE_ARRAY,
    }
}
