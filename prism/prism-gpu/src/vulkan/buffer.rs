//! Vulkan buffers and texel buffer views.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;

use super::texture::texture_format_to_vk;
use super::{map_allocation_error, map_vk_result};
use crate::error::{ErrorCode, GpuResult};
use crate::types::{BufferDesc, BufferUsage, BufferViewDesc, MemoryUsage};

#[derive(Debug)]
pub struct VulkanBuffer {
    pub(crate) buffer: vk::Buffer,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl VulkanBuffer {
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }
}

pub(super) fn create_buffer(
    device: &ash::Device,
    allocator: &mut Allocator,
    desc: &BufferDesc,
) -> GpuResult<VulkanBuffer> {
    let location = memory_usage_to_location(desc.memory_usage)?;
    let create_info = vk::BufferCreateInfo::default()
        .size(desc.size)
        .usage(buffer_usage_to_vk(desc.usage))
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe { device.create_buffer(&create_info, None) }.map_err(map_vk_result)?;

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let allocation = match allocator.allocate(&AllocationCreateDesc {
        name: desc.label.unwrap_or("buffer"),
        requirements,
        location,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    }) {
        Ok(allocation) => allocation,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(map_allocation_error(e));
        }
    };

    let bind = unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) };
    if let Err(e) = bind {
        let _ = allocator.free(allocation);
        unsafe { device.destroy_buffer(buffer, None) };
        return Err(map_vk_result(e));
    }

    Ok(VulkanBuffer {
        buffer,
        allocation: Some(allocation),
        size: desc.size,
    })
}

pub(super) fn destroy_buffer(device: &ash::Device, allocator: &mut Allocator, mut buffer: VulkanBuffer) {
    unsafe { device.destroy_buffer(buffer.buffer, None) };
    if let Some(allocation) = buffer.allocation.take() {
        if let Err(e) = allocator.free(allocation) {
            log::error!("failed to free buffer memory: {e}");
        }
    }
}

/// Copies through the persistent mapping gpu-allocator keeps for host-visible memory.
pub(super) fn write_buffer(buffer: &VulkanBuffer, offset: u64, data: &[u8]) -> GpuResult<()> {
    let end = offset.checked_add(data.len() as u64).ok_or(ErrorCode::InvalidArgs)?;
    if end > buffer.size {
        return Err(ErrorCode::InvalidArgs);
    }
    let mapped = buffer
        .allocation
        .as_ref()
        .and_then(Allocation::mapped_ptr)
        .ok_or(ErrorCode::MemoryUsageNotSupported)?;
    // SAFETY: the mapping covers the whole allocation and the range was bounds-checked above.
    unsafe {
        std::ptr::copy_nonoverlapping(
            data.as_ptr(),
            mapped.as_ptr().cast::<u8>().add(offset as usize),
            data.len(),
        );
    }
    Ok(())
}

pub(super) fn create_buffer_view(
    device: &ash::Device,
    buffer: &VulkanBuffer,
    desc: &BufferViewDesc,
) -> GpuResult<vk::BufferView> {
    let create_info = vk::BufferViewCreateInfo::default()
        .buffer(buffer.buffer)
        .format(texture_format_to_vk(desc.format))
        .offset(desc.offset)
        .range(desc.range.unwrap_or(vk::WHOLE_SIZE));
    unsafe { device.create_buffer_view(&create_info, None) }.map_err(map_vk_result)
}

/// Lazily allocated memory only backs transient attachments, never buffers.
fn memory_usage_to_location(usage: MemoryUsage) -> GpuResult<MemoryLocation> {
    match usage {
        MemoryUsage::GpuOnly => Ok(MemoryLocation::GpuOnly),
        MemoryUsage::CpuToGpu => Ok(MemoryLocation::CpuToGpu),
        MemoryUsage::GpuToCpu => Ok(MemoryLocation::GpuToCpu),
        MemoryUsage::GpuLazilyAllocated => Err(ErrorCode::MemoryUsageNotSupported),
    }
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::UNIFORM_TEXEL) {
        flags |= vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE_TEXEL) {
        flags |= vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_flags_combine() {
        let flags = buffer_usage_to_vk(BufferUsage::VERTEX | BufferUsage::COPY_DST);
        assert_eq!(
            flags,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn lazily_allocated_buffers_are_refused() {
        assert_eq!(
            memory_usage_to_location(MemoryUsage::GpuLazilyAllocated),
            Err(ErrorCode::MemoryUsageNotSupported)
        );
        assert_eq!(memory_usage_to_location(MemoryUsage::CpuToGpu), Ok(MemoryLocation::CpuToGpu));
    }

    #[test]
    fn unmapped_buffer_write_is_refused() {
        let buffer = VulkanBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size: 16,
        };
        assert_eq!(write_buffer(&buffer, 0, &[0; 4]), Err(ErrorCode::MemoryUsageNotSupported));
        assert_eq!(write_buffer(&buffer, 14, &[0; 4]), Err(ErrorCode::InvalidArgs));
    }
}
