//! Command pools, synchronization primitives, submission and command recording.

use ash::vk;

use super::buffer::VulkanBuffer;
use super::map_vk_result;
use super::texture::VulkanTexture;
use crate::error::GpuResult;
use crate::types::{BufferCopy, BufferTextureCopy, ClearValue, Extent2D, IndexType, Rect2D, Viewport};

pub(super) fn create_command_pool(device: &ash::Device, queue_family_index: u32) -> GpuResult<vk::CommandPool> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    unsafe { device.create_command_pool(&create_info, None) }.map_err(map_vk_result)
}

pub(super) fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: u32,
) -> GpuResult<Vec<vk::CommandBuffer>> {
    let allocate_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);
    unsafe { device.allocate_command_buffers(&allocate_info) }.map_err(map_vk_result)
}

pub(super) fn begin_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> GpuResult<()> {
    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe { device.begin_command_buffer(cmd, &begin_info) }.map_err(map_vk_result)
}

pub(super) fn create_fence(device: &ash::Device, signaled: bool) -> GpuResult<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let create_info = vk::FenceCreateInfo::default().flags(flags);
    unsafe { device.create_fence(&create_info, None) }.map_err(map_vk_result)
}

pub(super) fn create_semaphore(device: &ash::Device) -> GpuResult<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    unsafe { device.create_semaphore(&create_info, None) }.map_err(map_vk_result)
}

pub(super) fn submit(
    device: &ash::Device,
    queue: vk::Queue,
    cmd: vk::CommandBuffer,
    wait: Option<vk::Semaphore>,
    signal: Option<vk::Semaphore>,
    fence: Option<vk::Fence>,
) -> GpuResult<()> {
    let wait_semas: Vec<vk::Semaphore> = wait.into_iter().collect();
    let signal_semas: Vec<vk::Semaphore> = signal.into_iter().collect();
    // The acquired image is first written by the blit, then by attachment output.
    let wait_stages = vec![
        vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        wait_semas.len()
    ];
    let submit_info = vk::SubmitInfo::default()
        .command_buffers(std::slice::from_ref(&cmd))
        .wait_semaphores(&wait_semas)
        .wait_dst_stage_mask(&wait_stages)
        .signal_semaphores(&signal_semas);
    unsafe { device.queue_submit(queue, &[submit_info], fence.unwrap_or(vk::Fence::null())) }
        .map_err(map_vk_result)
}

fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Float(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::Uint(uint32) => vk::ClearValue {
            color: vk::ClearColorValue { uint32 },
        },
        ClearValue::Int(int32) => vk::ClearValue {
            color: vk::ClearColorValue { int32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

pub(super) fn rect_to_vk(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D {
            width: rect.width,
            height: rect.height,
        },
    }
}

pub(super) fn cmd_begin_render_pass(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    area: Rect2D,
    clear_values: &[ClearValue],
) {
    let clears: Vec<vk::ClearValue> = clear_values.iter().map(clear_value_to_vk).collect();
    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(rect_to_vk(&area))
        .clear_values(&clears);
    unsafe { device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE) };
}

pub(super) fn cmd_set_viewport(device: &ash::Device, cmd: vk::CommandBuffer, viewport: &Viewport) {
    let vk_viewport = vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    };
    unsafe { device.cmd_set_viewport(cmd, 0, &[vk_viewport]) };
}

pub(super) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::Uint16 => vk::IndexType::UINT16,
        IndexType::Uint32 => vk::IndexType::UINT32,
    }
}

pub(super) fn cmd_copy_buffer(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: &VulkanBuffer,
    dst: &VulkanBuffer,
    region: BufferCopy,
) {
    let copy = vk::BufferCopy {
        src_offset: region.src_offset,
        dst_offset: region.dst_offset,
        size: region.size,
    };
    unsafe { device.cmd_copy_buffer(cmd, src.buffer, dst.buffer, &[copy]) };
}

pub(super) fn cmd_copy_buffer_to_texture(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: &VulkanBuffer,
    dst: &VulkanTexture,
    region: BufferTextureCopy,
) {
    let range = vk::ImageSubresourceRange::default()
        .aspect_mask(dst.aspect)
        .base_mip_level(region.mip_level)
        .level_count(1)
        .base_array_layer(region.array_layer)
        .layer_count(1);

    let to_transfer = image_barrier(
        dst.image,
        range,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::AccessFlags::empty(),
        vk::AccessFlags::TRANSFER_WRITE,
    );
    pipeline_barrier(
        device,
        cmd,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::TRANSFER,
        &[to_transfer],
    );

    let (x, y, z) = region.origin;
    let (width, height, depth) = region.extent;
    let copy = vk::BufferImageCopy::default()
        .buffer_offset(region.buffer_offset)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(dst.aspect)
                .mip_level(region.mip_level)
                .base_array_layer(region.array_layer)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        })
        .image_extent(vk::Extent3D { width, height, depth });
    unsafe {
        device.cmd_copy_buffer_to_image(
            cmd,
            src.buffer,
            dst.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[copy],
        )
    };

    let to_shader = image_barrier(
        dst.image,
        range,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::AccessFlags::TRANSFER_WRITE,
        vk::AccessFlags::SHADER_READ,
    );
    pipeline_barrier(
        device,
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        &[to_shader],
    );
}

/// Copies a backbuffer onto an acquired swapchain image and leaves that image presentable.
/// A backbuffer that was never rendered to is skipped and the image is cleared instead.
pub(super) fn cmd_blit_to_present(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: &VulkanTexture,
    src_extent: Extent2D,
    src_rendered: bool,
    dst: vk::Image,
    dst_extent: Extent2D,
) {
    let color_range = vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .level_count(1)
        .layer_count(1);
    let src_old = if src_rendered {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::UNDEFINED
    };

    let to_transfer = [
        image_barrier(
            src.image,
            color_range,
            src_old,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::AccessFlags::TRANSFER_READ,
        ),
        image_barrier(
            dst,
            color_range,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        ),
    ];
    pipeline_barrier(
        device,
        cmd,
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::PipelineStageFlags::TRANSFER,
        &to_transfer,
    );

    if src_rendered {
        let layers = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);
        let blit = vk::ImageBlit::default()
            .src_subresource(layers)
            .src_offsets([vk::Offset3D::default(), far_corner(src_extent)])
            .dst_subresource(layers)
            .dst_offsets([vk::Offset3D::default(), far_corner(dst_extent)]);
        unsafe {
            device.cmd_blit_image(
                cmd,
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            )
        };
    } else {
        let black = vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] };
        unsafe {
            device.cmd_clear_color_image(
                cmd,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &black,
                &[color_range],
            )
        };
    }

    let to_present = [
        image_barrier(
            dst,
            color_range,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::empty(),
        ),
        image_barrier(
            src.image,
            color_range,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
    ];
    pipeline_barrier(
        device,
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        &to_present,
    );
}

fn far_corner(extent: Extent2D) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    }
}

fn image_barrier(
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .image(image)
        .subresource_range(range)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
}

fn pipeline_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
    barriers: &[vk::ImageMemoryBarrier<'_>],
) {
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            barriers,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_clear_uses_depth_stencil_member() {
        let value = clear_value_to_vk(&ClearValue::DepthStencil { depth: 0.5, stencil: 3 });
        // SAFETY: the depth-stencil member was the one written.
        let ds = unsafe { value.depth_stencil };
        assert_eq!(ds.depth, 0.5);
        assert_eq!(ds.stencil, 3);
    }

    #[test]
    fn blit_region_covers_whole_extent() {
        let corner = far_corner(Extent2D::new(640, 480));
        assert_eq!((corner.x, corner.y, corner.z), (640, 480, 1));
        let rect = rect_to_vk(&Rect2D { x: 2, y: 3, width: 10, height: 20 });
        assert_eq!(rect.offset.x, 2);
        assert_eq!(rect.extent.height, 20);
    }
}
