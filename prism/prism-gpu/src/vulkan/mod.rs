//! Vulkan backend.
//!
//! One instance, one logical device and one graphics queue that is also used for presentation.
//! Memory comes from gpu-allocator; surfaces are created through ash-window.

mod buffer;
mod commands;
mod pipeline;
mod render_pass;
mod sampler;
mod swapchain;
mod texture;

use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::AllocationError;
use parking_lot::Mutex;

use crate::config::DeviceSettings;
use crate::error::{ErrorCode, GpuResult};
use crate::hal::{
    AcquireOutcome, Backend, FramebufferTargets, GraphicsPipelineInfo, PresentMode, PresentOutcome,
    SurfaceCapabilities, SurfaceFormat, SwapchainCreateInfo,
};
use crate::reflection::LayoutBinding;
use crate::types::{
    AdapterInfo, BufferCopy, BufferDesc, BufferTextureCopy, BufferViewDesc, ClearValue,
    DeviceLimits, Extent2D, IndexType, Rect2D, RenderPassDesc, SamplerDesc, TextureDesc, Viewport,
};
use crate::window::Window;

pub use buffer::VulkanBuffer;
pub use pipeline::VulkanPipelineLayout;
pub use texture::{texture_format_from_vk, texture_format_to_vk, VulkanTexture};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Every platform surface extension; whichever the loader exposes gets enabled.
const SURFACE_EXTENSIONS: [&CStr; 7] = [
    ash::khr::surface::NAME,
    ash::khr::win32_surface::NAME,
    ash::khr::xlib_surface::NAME,
    ash::khr::xcb_surface::NAME,
    ash::khr::wayland_surface::NAME,
    ash::khr::android_surface::NAME,
    ash::ext::metal_surface::NAME,
];

/// Maps a Vulkan failure onto the public error set.
pub fn map_vk_result(result: vk::Result) -> ErrorCode {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => ErrorCode::OutOfHostMemory,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
            ErrorCode::OutOfDeviceMemory
        }
        vk::Result::ERROR_INITIALIZATION_FAILED => ErrorCode::InitializationFailed,
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => ErrorCode::FormatNotSupported,
        vk::Result::ERROR_LAYER_NOT_PRESENT
        | vk::Result::ERROR_EXTENSION_NOT_PRESENT
        | vk::Result::ERROR_FEATURE_NOT_PRESENT
        | vk::Result::ERROR_INCOMPATIBLE_DRIVER => ErrorCode::BackendNotSupported,
        vk::Result::ERROR_SURFACE_LOST_KHR | vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => {
            ErrorCode::SurfacePresentationNotSupported
        }
        other => {
            log::error!("unexpected Vulkan error: {other:?}");
            ErrorCode::InternalError
        }
    }
}

pub(crate) fn map_allocation_error(error: AllocationError) -> ErrorCode {
    match error {
        AllocationError::OutOfMemory => ErrorCode::OutOfDeviceMemory,
        AllocationError::NoCompatibleMemoryTypeFound => ErrorCode::MemoryUsageNotSupported,
        other => {
            log::error!("allocation failed: {other}");
            ErrorCode::InternalError
        }
    }
}

pub struct VulkanBackend {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    queue: Mutex<vk::Queue>,
    queue_family_index: u32,
    /// Dropped before the device it allocates from.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    anisotropy_enabled: bool,
    limits: DeviceLimits,
    adapter: AdapterInfo,
}

struct Adapter {
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    properties: vk::PhysicalDeviceProperties,
}

impl VulkanBackend {
    pub fn new(settings: &DeviceSettings) -> GpuResult<Self> {
        log::info!("Creating Vulkan device: {}", settings.application_name);

        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            log::error!("failed to load the Vulkan library: {e}");
            ErrorCode::BackendNotSupported
        })?;

        let validation = settings.validation_requested() && validation_layer_available(&entry);
        let instance = create_instance(&entry, &settings.application_name, validation)?;

        let debug_utils = if validation {
            match setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    log::warn!("debug messenger unavailable: {e:?}");
                    None
                }
            }
        } else {
            None
        };

        let adapter = match pick_adapter(&instance, settings.prefer_high_performance) {
            Ok(adapter) => adapter,
            Err(e) => {
                destroy_instance(&instance, debug_utils.as_ref());
                return Err(e);
            }
        };
        let features = unsafe { instance.get_physical_device_features(adapter.physical_device) };
        let anisotropy_enabled = features.sampler_anisotropy == vk::TRUE;

        let (device, queue) = match create_logical_device(&instance, &adapter, &features) {
            Ok(created) => created,
            Err(e) => {
                destroy_instance(&instance, debug_utils.as_ref());
                return Err(e);
            }
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: adapter.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                log::error!("failed to create memory allocator: {e}");
                unsafe { device.destroy_device(None) };
                destroy_instance(&instance, debug_utils.as_ref());
                return Err(ErrorCode::InitializationFailed);
            }
        };

        let props = &adapter.properties;
        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!(
            "Selected GPU: {} ({:?}), API {}.{}.{}",
            name,
            props.device_type,
            vk::api_version_major(props.api_version),
            vk::api_version_minor(props.api_version),
            vk::api_version_patch(props.api_version)
        );

        let limits = DeviceLimits {
            max_texture_dimension_1d: props.limits.max_image_dimension1_d,
            max_texture_dimension_2d: props.limits.max_image_dimension2_d,
            max_texture_dimension_3d: props.limits.max_image_dimension3_d,
            max_texture_dimension_cube: props.limits.max_image_dimension_cube,
            max_texture_array_layers: props.limits.max_image_array_layers,
            max_color_attachments: props.limits.max_color_attachments,
            max_sampler_anisotropy: if anisotropy_enabled {
                props.limits.max_sampler_anisotropy
            } else {
                1.0
            },
        };
        let adapter_info = AdapterInfo {
            name,
            vendor_id: props.vendor_id,
            device_id: props.device_id,
            discrete: props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        Ok(Self {
            entry,
            instance,
            debug_utils,
            surface_loader,
            physical_device: adapter.physical_device,
            device,
            swapchain_loader,
            queue: Mutex::new(queue),
            queue_family_index: adapter.queue_family_index,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            anisotropy_enabled,
            limits,
            adapter: adapter_info,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");
        unsafe {
            let _ = self.device.device_wait_idle();
            // SAFETY: the allocator is never touched again and every allocation was freed by
            // the resources that owned it.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        destroy_instance(&self.instance, self.debug_utils.as_ref());
    }
}

fn destroy_instance(
    instance: &ash::Instance,
    debug_utils: Option<&(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
) {
    unsafe {
        if let Some((loader, messenger)) = debug_utils {
            loader.destroy_debug_utils_messenger(*messenger, None);
        }
        instance.destroy_instance(None);
    }
}

fn validation_layer_available(entry: &ash::Entry) -> bool {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    let found = layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
    if !found {
        log::warn!("validation requested but {VALIDATION_LAYER:?} is not installed");
    }
    found
}

fn create_instance(entry: &ash::Entry, app_name: &str, validation: bool) -> GpuResult<ash::Instance> {
    let app_name = CString::new(app_name).map_err(|_| ErrorCode::InvalidArgs)?;
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"prism")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_2);

    let available = unsafe { entry.enumerate_instance_extension_properties(None) }
        .map_err(map_vk_result)?;
    let is_available = |name: &CStr| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|ext| ext == name))
    };

    let mut extensions: Vec<*const c_char> = SURFACE_EXTENSIONS
        .iter()
        .filter(|&&name| is_available(name))
        .map(|name| name.as_ptr())
        .collect();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    let layers: Vec<*const c_char> = if validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);
    unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        log::error!("failed to create Vulkan instance: {e:?}");
        map_vk_result(e)
    })
}

fn setup_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT), vk::Result> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));
    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;
    Ok((loader, messenger))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("[Vulkan] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("[Vulkan] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::debug!("[Vulkan] {message}"),
        _ => log::trace!("[Vulkan] {message}"),
    }
    vk::FALSE
}

/// First adapter with a graphics queue, or the first discrete one when asked for performance.
fn pick_adapter(instance: &ash::Instance, prefer_high_performance: bool) -> GpuResult<Adapter> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(map_vk_result)?;
    let candidates: Vec<Adapter> = devices
        .into_iter()
        .filter_map(|physical_device| {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let queue_family_index = families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))?
                as u32;
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            Some(Adapter {
                physical_device,
                queue_family_index,
                properties,
            })
        })
        .collect();

    let discrete = candidates
        .iter()
        .position(|a| a.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU);
    let index = match (prefer_high_performance, discrete) {
        (true, Some(index)) => index,
        _ => 0,
    };
    candidates.into_iter().nth(index).ok_or_else(|| {
        log::error!("no Vulkan adapter with a graphics queue");
        ErrorCode::BackendNotSupported
    })
}

fn create_logical_device(
    instance: &ash::Instance,
    adapter: &Adapter,
    supported: &vk::PhysicalDeviceFeatures,
) -> GpuResult<(ash::Device, vk::Queue)> {
    let queue_priorities = [1.0f32];
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(adapter.queue_family_index)
        .queue_priorities(&queue_priorities);
    let extensions = [ash::khr::swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_create_info))
        .enabled_extension_names(&extensions)
        .enabled_features(&features);
    let device = unsafe { instance.create_device(adapter.physical_device, &create_info, None) }
        .map_err(|e| {
            log::error!("failed to create logical device: {e:?}");
            map_vk_result(e)
        })?;
    let queue = unsafe { device.get_device_queue(adapter.queue_family_index, 0) };
    Ok((device, queue))
}

impl Backend for VulkanBackend {
    type Texture = VulkanTexture;
    type Buffer = VulkanBuffer;
    type BufferView = vk::BufferView;
    type RenderPass = vk::RenderPass;
    type Framebuffer = vk::Framebuffer;
    type Sampler = vk::Sampler;
    type PipelineLayout = VulkanPipelineLayout;
    type Pipeline = vk::Pipeline;
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;
    type Fence = vk::Fence;
    type Semaphore = vk::Semaphore;
    type Surface = vk::SurfaceKHR;
    type Swapchain = vk::SwapchainKHR;
    type PresentImage = vk::Image;

    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_texture(&self, desc: &TextureDesc) -> GpuResult<VulkanTexture> {
        let mut allocator = self.allocator.lock();
        texture::create_texture(&self.instance, self.physical_device, &self.device, &mut allocator, desc)
    }

    fn destroy_texture(&self, texture: VulkanTexture) {
        texture::destroy_texture(&self.device, &mut self.allocator.lock(), texture);
    }

    fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<VulkanBuffer> {
        buffer::create_buffer(&self.device, &mut self.allocator.lock(), desc)
    }

    fn destroy_buffer(&self, buffer: VulkanBuffer) {
        buffer::destroy_buffer(&self.device, &mut self.allocator.lock(), buffer);
    }

    fn write_buffer(&self, buffer: &VulkanBuffer, offset: u64, data: &[u8]) -> GpuResult<()> {
        buffer::write_buffer(buffer, offset, data)
    }

    fn create_buffer_view(&self, buffer: &VulkanBuffer, desc: &BufferViewDesc) -> GpuResult<vk::BufferView> {
        buffer::create_buffer_view(&self.device, buffer, desc)
    }

    fn destroy_buffer_view(&self, view: vk::BufferView) {
        unsafe { self.device.destroy_buffer_view(view, None) };
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> GpuResult<vk::RenderPass> {
        render_pass::create_render_pass(&self.device, desc)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        targets: &FramebufferTargets<'_, Self>,
    ) -> GpuResult<vk::Framebuffer> {
        render_pass::create_framebuffer(&self.device, render_pass, targets)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> GpuResult<vk::Sampler> {
        let max_anisotropy = if self.anisotropy_enabled {
            self.limits.max_sampler_anisotropy
        } else {
            0.0
        };
        sampler::create_sampler(&self.device, desc, max_anisotropy)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) };
    }

    fn create_pipeline_layout(&self, bindings: &[LayoutBinding]) -> GpuResult<VulkanPipelineLayout> {
        pipeline::create_pipeline_layout(&self.device, bindings)
    }

    fn destroy_pipeline_layout(&self, layout: VulkanPipelineLayout) {
        pipeline::destroy_pipeline_layout(&self.device, layout);
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo<'_, Self>) -> GpuResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(&self.device, info)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn create_command_pool(&self) -> GpuResult<vk::CommandPool> {
        commands::create_command_pool(&self.device, self.queue_family_index)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> GpuResult<()> {
        unsafe { self.device.reset_command_pool(pool, vk::CommandPoolResetFlags::empty()) }
            .map_err(map_vk_result)
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> GpuResult<Vec<vk::CommandBuffer>> {
        commands::allocate_command_buffers(&self.device, pool, count)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        unsafe { self.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()) }
            .map_err(map_vk_result)
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        commands::begin_command_buffer(&self.device, cmd)
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }.map_err(map_vk_result)
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence> {
        commands::create_fence(&self.device, signaled)
    }

    fn wait_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(map_vk_result)
    }

    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }.map_err(map_vk_result)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn create_semaphore(&self) -> GpuResult<vk::Semaphore> {
        commands::create_semaphore(&self.device)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: Option<vk::Semaphore>,
        signal: Option<vk::Semaphore>,
        fence: Option<vk::Fence>,
    ) -> GpuResult<()> {
        let queue = self.queue.lock();
        commands::submit(&self.device, *queue, cmd, wait, signal, fence)
    }

    fn wait_idle(&self) -> GpuResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(map_vk_result)
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: Rect2D,
        clear_values: &[ClearValue],
    ) {
        commands::cmd_begin_render_pass(&self.device, cmd, render_pass, framebuffer, area, clear_values);
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, slot: u32, buffer: &VulkanBuffer, offset: u64) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(cmd, slot, &[buffer.buffer], &[offset])
        };
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: &VulkanBuffer,
        offset: u64,
        index_type: IndexType,
    ) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                cmd,
                buffer.buffer,
                offset,
                commands::index_type_to_vk(index_type),
            )
        };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: &Viewport) {
        commands::cmd_set_viewport(&self.device, cmd, viewport);
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: &Rect2D) {
        unsafe {
            self.device
                .cmd_set_scissor(cmd, 0, &[commands::rect_to_vk(scissor)])
        };
    }

    fn cmd_set_blend_constants(&self, cmd: vk::CommandBuffer, constants: [f32; 4]) {
        unsafe { self.device.cmd_set_blend_constants(cmd, &constants) };
    }

    fn cmd_set_stencil_reference(&self, cmd: vk::CommandBuffer, reference: u32) {
        unsafe {
            self.device
                .cmd_set_stencil_reference(cmd, vk::StencilFaceFlags::FRONT_AND_BACK, reference)
        };
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device
                .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance)
        };
    }

    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: &VulkanBuffer, dst: &VulkanBuffer, region: BufferCopy) {
        commands::cmd_copy_buffer(&self.device, cmd, src, dst, region);
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: vk::CommandBuffer,
        src: &VulkanBuffer,
        dst: &VulkanTexture,
        region: BufferTextureCopy,
    ) {
        commands::cmd_copy_buffer_to_texture(&self.device, cmd, src, dst, region);
    }

    fn cmd_blit_to_present(
        &self,
        cmd: vk::CommandBuffer,
        src: &VulkanTexture,
        src_extent: Extent2D,
        src_rendered: bool,
        dst: vk::Image,
        dst_extent: Extent2D,
    ) {
        commands::cmd_blit_to_present(&self.device, cmd, src, src_extent, src_rendered, dst, dst_extent);
    }

    fn create_surface(&self, window: &dyn Window) -> GpuResult<vk::SurfaceKHR> {
        self.create_vk_surface(window)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) };
    }

    fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> GpuResult<SurfaceCapabilities> {
        self.vk_surface_capabilities(surface)
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> GpuResult<Vec<SurfaceFormat>> {
        self.vk_surface_formats(surface)
    }

    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> GpuResult<Vec<PresentMode>> {
        self.vk_surface_present_modes(surface)
    }

    fn create_swapchain(
        &self,
        surface: vk::SurfaceKHR,
        info: &SwapchainCreateInfo,
        old: Option<vk::SwapchainKHR>,
    ) -> GpuResult<vk::SwapchainKHR> {
        self.create_vk_swapchain(surface, info, old)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> GpuResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }.map_err(map_vk_result)
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, signal: vk::Semaphore) -> GpuResult<AcquireOutcome> {
        self.vk_acquire_next_image(swapchain, signal)
    }

    fn present(&self, swapchain: vk::SwapchainKHR, image_index: u32, wait: vk::Semaphore) -> GpuResult<PresentOutcome> {
        self.vk_present(swapchain, image_index, wait)
    }
}
