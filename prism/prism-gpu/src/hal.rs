//! The backend seam.
//!
//! [`Backend`] is the one interface a graphics API implementation provides. Everything above it
//! (validation, the submission ring, resource wrappers, the swapchain state machine and the
//! device façade) is written once against this trait.

use std::fmt::Debug;

use crate::error::GpuResult;
use crate::pipeline_state::{PipelineStateDesc, ShaderStageDesc};
use crate::reflection::LayoutBinding;
use crate::types::{
    AdapterInfo, BufferCopy, BufferDesc, BufferTextureCopy, BufferViewDesc, ClearValue,
    DeviceLimits, Extent2D, IndexType, Rect2D, RenderPassDesc, SamplerDesc, TextureDesc,
    TextureFormat, Viewport,
};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    ExtendedSrgbLinear,
    DisplayP3Nonlinear,
    Hdr10St2084,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// Zero means no upper bound.
    pub max_image_count: u32,
    /// `None` when the surface size is decided by the swapchain extent.
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The image is ready once the signal semaphore fires. `suboptimal` images may still be
    /// presented, but the swapchain should be rebuilt afterwards.
    Acquired { index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface; nothing was signalled.
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented (or dropped) but the swapchain must be rebuilt.
    Stale,
}

/// Attachments of a framebuffer in render pass order.
pub struct FramebufferTargets<'a, B: Backend> {
    pub color: Vec<&'a B::Texture>,
    pub resolve: Vec<&'a B::Texture>,
    pub depth_stencil: Option<&'a B::Texture>,
    pub extent: Extent2D,
}

/// Inputs of a native graphics pipeline.
pub struct GraphicsPipelineInfo<'a, B: Backend> {
    pub vertex: &'a ShaderStageDesc,
    pub fragment: Option<&'a ShaderStageDesc>,
    pub state: &'a PipelineStateDesc,
    pub layout: B::PipelineLayout,
    pub render_pass: B::RenderPass,
    pub render_pass_desc: &'a RenderPassDesc,
}

/// A graphics API implementation.
///
/// Handle types are owned values: `destroy_*` consumes them, so a handle can be released at most
/// once. The caller guarantees the GPU has finished with a handle before destroying it.
pub trait Backend: Sized + 'static {
    type Texture: Debug;
    type Buffer: Debug;
    type BufferView: Copy + Debug;
    type RenderPass: Copy + Debug;
    type Framebuffer: Copy + Debug;
    type Sampler: Copy + Debug;
    type PipelineLayout: Copy + Debug;
    type Pipeline: Copy + Debug;
    type CommandPool: Copy + Debug;
    type CommandBuffer: Copy + Debug;
    type Fence: Copy + Debug;
    type Semaphore: Copy + Debug;
    type Surface: Copy + Debug;
    type Swapchain: Copy + Debug;
    type PresentImage: Copy + Debug;

    fn adapter_info(&self) -> &AdapterInfo;
    fn limits(&self) -> &DeviceLimits;

    fn create_texture(&self, desc: &TextureDesc) -> GpuResult<Self::Texture>;
    fn destroy_texture(&self, texture: Self::Texture);
    fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<Self::Buffer>;
    fn destroy_buffer(&self, buffer: Self::Buffer);
    /// Copies `data` into a host-visible buffer.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> GpuResult<()>;
    fn create_buffer_view(
        &self,
        buffer: &Self::Buffer,
        desc: &BufferViewDesc,
    ) -> GpuResult<Self::BufferView>;
    fn destroy_buffer_view(&self, view: Self::BufferView);
    fn create_render_pass(&self, desc: &RenderPassDesc) -> GpuResult<Self::RenderPass>;
    fn destroy_render_pass(&self, render_pass: Self::RenderPass);
    fn create_framebuffer(
        &self,
        render_pass: Self::RenderPass,
        targets: &FramebufferTargets<'_, Self>,
    ) -> GpuResult<Self::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn create_sampler(&self, desc: &SamplerDesc) -> GpuResult<Self::Sampler>;
    fn destroy_sampler(&self, sampler: Self::Sampler);
    /// Creates a descriptor set layout from `bindings` and a pipeline layout around it.
    fn create_pipeline_layout(&self, bindings: &[LayoutBinding]) -> GpuResult<Self::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: Self::PipelineLayout);
    fn create_graphics_pipeline(
        &self,
        info: &GraphicsPipelineInfo<'_, Self>,
    ) -> GpuResult<Self::Pipeline>;
    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    fn create_command_pool(&self) -> GpuResult<Self::CommandPool>;
    /// Also frees every command buffer allocated from the pool.
    fn destroy_command_pool(&self, pool: Self::CommandPool);
    fn reset_command_pool(&self, pool: Self::CommandPool) -> GpuResult<()>;
    fn allocate_command_buffers(
        &self,
        pool: Self::CommandPool,
        count: u32,
    ) -> GpuResult<Vec<Self::CommandBuffer>>;
    fn reset_command_buffer(&self, cmd: Self::CommandBuffer) -> GpuResult<()>;
    fn begin_command_buffer(&self, cmd: Self::CommandBuffer) -> GpuResult<()>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> GpuResult<()>;
    fn create_fence(&self, signaled: bool) -> GpuResult<Self::Fence>;
    /// Blocks without timeout.
    fn wait_fence(&self, fence: Self::Fence) -> GpuResult<()>;
    fn reset_fence(&self, fence: Self::Fence) -> GpuResult<()>;
    fn destroy_fence(&self, fence: Self::Fence);
    fn create_semaphore(&self) -> GpuResult<Self::Semaphore>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);
    fn submit(
        &self,
        cmd: Self::CommandBuffer,
        wait: Option<Self::Semaphore>,
        signal: Option<Self::Semaphore>,
        fence: Option<Self::Fence>,
    ) -> GpuResult<()>;
    fn wait_idle(&self) -> GpuResult<()>;

    fn cmd_begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        render_pass: Self::RenderPass,
        framebuffer: Self::Framebuffer,
        area: Rect2D,
        clear_values: &[ClearValue],
    );
    fn cmd_end_render_pass(&self, cmd: Self::CommandBuffer);
    fn cmd_bind_pipeline(&self, cmd: Self::CommandBuffer, pipeline: Self::Pipeline);
    fn cmd_bind_vertex_buffer(
        &self,
        cmd: Self::CommandBuffer,
        slot: u32,
        buffer: &Self::Buffer,
        offset: u64,
    );
    fn cmd_bind_index_buffer(
        &self,
        cmd: Self::CommandBuffer,
        buffer: &Self::Buffer,
        offset: u64,
        index_type: IndexType,
    );
    fn cmd_set_viewport(&self, cmd: Self::CommandBuffer, viewport: &Viewport);
    fn cmd_set_scissor(&self, cmd: Self::CommandBuffer, scissor: &Rect2D);
    fn cmd_set_blend_constants(&self, cmd: Self::CommandBuffer, constants: [f32; 4]);
    fn cmd_set_stencil_reference(&self, cmd: Self::CommandBuffer, reference: u32);
    fn cmd_draw(
        &self,
        cmd: Self::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_draw_indexed(
        &self,
        cmd: Self::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn cmd_copy_buffer(
        &self,
        cmd: Self::CommandBuffer,
        src: &Self::Buffer,
        dst: &Self::Buffer,
        region: BufferCopy,
    );
    /// Transitions `dst` for the transfer, copies, then leaves it shader-readable.
    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: Self::CommandBuffer,
        src: &Self::Buffer,
        dst: &Self::Texture,
        region: BufferTextureCopy,
    );
    /// Barrier pair (backbuffer to transfer source, image to transfer destination), blit,
    /// then the image to present and the backbuffer back to color attachment.
    /// `src_rendered` is false for a backbuffer that was never written.
    fn cmd_blit_to_present(
        &self,
        cmd: Self::CommandBuffer,
        src: &Self::Texture,
        src_extent: Extent2D,
        src_rendered: bool,
        dst: Self::PresentImage,
        dst_extent: Extent2D,
    );

    fn create_surface(&self, window: &dyn Window) -> GpuResult<Self::Surface>;
    fn destroy_surface(&self, surface: Self::Surface);
    fn surface_capabilities(&self, surface: Self::Surface) -> GpuResult<SurfaceCapabilities>;
    fn surface_formats(&self, surface: Self::Surface) -> GpuResult<Vec<SurfaceFormat>>;
    fn surface_present_modes(&self, surface: Self::Surface) -> GpuResult<Vec<PresentMode>>;
    /// Creates a swapchain, chained from `old` when given. `old` stays valid and must be
    /// destroyed by the caller.
    fn create_swapchain(
        &self,
        surface: Self::Surface,
        info: &SwapchainCreateInfo,
        old: Option<Self::Swapchain>,
    ) -> GpuResult<Self::Swapchain>;
    fn destroy_swapchain(&self, swapchain: Self::Swapchain);
    fn swapchain_images(&self, swapchain: Self::Swapchain) -> GpuResult<Vec<Self::PresentImage>>;
    fn acquire_next_image(
        &self,
        swapchain: Self::Swapchain,
        signal: Self::Semaphore,
    ) -> GpuResult<AcquireOutcome>;
    fn present(
        &self,
        swapchain: Self::Swapchain,
        image_index: u32,
        wait: Self::Semaphore,
    ) -> GpuResult<PresentOutcome>;
}
