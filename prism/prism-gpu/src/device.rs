//! The device façade: the only entry point the engine calls.
//!
//! Every `create_*` validates its descriptor first and touches the backend only when validation
//! passed. Commands are recorded between [`Device::begin_cmd`] and [`Device::end_cmd`] into the
//! submission at the ring's write pointer; every resource a command references is marked with
//! that submission so its destruction waits for the GPU.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::command_queue::CommandQueue;
use crate::config::DeviceSettings;
use crate::error::{ErrorCode, GpuResult};
use crate::hal::{Backend, FramebufferTargets, GraphicsPipelineInfo};
use crate::layout_cache::PipelineLayoutCache;
use crate::pipeline_state::{PipelineStateDesc, ShaderStageDesc};
use crate::reflection::{ShaderResourceTable, ShaderStage, StageReflection};
use crate::resource::{
    Buffer, BufferView, Framebuffer, FramebufferAttachments, GraphicsPipeline, RenderPass, Sampler,
    Texture,
};
use crate::state::DynamicState;
use crate::swapchain::SwapChain;
use crate::types::{
    AdapterInfo, BufferCopy, BufferDesc, BufferTextureCopy, BufferUsage, BufferViewDesc,
    ClearValue, DeviceLimits, Extent2D, IndexType, Rect2D, RenderPassDesc, ResourceId,
    SamplerDesc, SwapChainDesc, TextureDesc, TextureUsage, Viewport,
};
use crate::validation::{self, FramebufferAttachment, FramebufferLayout};
use crate::window::Window;

/// State shared by the device and every resource it created.
pub struct DeviceShared<B: Backend> {
    pub(crate) backend: B,
    pub(crate) ring: Mutex<CommandQueue<B>>,
    pub(crate) layouts: Mutex<PipelineLayoutCache<B>>,
    next_id: AtomicU64,
}

impl<B: Backend> DeviceShared<B> {
    pub(crate) fn next_resource_id(&self) -> ResourceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl<B: Backend> Drop for DeviceShared<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            log::error!("device teardown: wait_idle failed: {e}");
        }
        self.ring.get_mut().destroy_all(&self.backend);
        for layout in self.layouts.get_mut().drain() {
            self.backend.destroy_pipeline_layout(layout);
        }
        log::debug!("device command infrastructure destroyed");
    }
}

/// One color slot of a [`FramebufferDesc`].
pub struct FramebufferColorAttachment<B: Backend> {
    pub texture: Option<Arc<Texture<B>>>,
    /// Required exactly when the render pass resolves this slot.
    pub resolve: Option<Arc<Texture<B>>>,
}

impl<B: Backend> FramebufferColorAttachment<B> {
    pub fn new(texture: Arc<Texture<B>>) -> Self {
        Self {
            texture: Some(texture),
            resolve: None,
        }
    }

    pub fn with_resolve(mut self, resolve: Arc<Texture<B>>) -> Self {
        self.resolve = Some(resolve);
        self
    }
}

pub struct FramebufferDesc<B: Backend> {
    pub render_pass: Arc<RenderPass<B>>,
    pub color_attachments: Vec<FramebufferColorAttachment<B>>,
    pub depth_stencil_attachment: Option<Arc<Texture<B>>>,
    pub width: u32,
    pub height: u32,
}

pub struct GraphicsPipelineDesc<B: Backend> {
    pub label: Option<&'static str>,
    pub vertex: ShaderStageDesc,
    pub fragment: Option<ShaderStageDesc>,
    pub state: PipelineStateDesc,
    pub render_pass: Arc<RenderPass<B>>,
}

struct Recording<B: Backend> {
    submission: u32,
    cmd: B::CommandBuffer,
    render_pass_extent: Option<Extent2D>,
    pipeline_bound: bool,
}

pub struct Device<B: Backend> {
    shared: Arc<DeviceShared<B>>,
    recording: Option<Recording<B>>,
    dynamic_state: DynamicState,
}

#[cfg(feature = "vulkan")]
pub fn create_device(prefer_high_performance: bool) -> GpuResult<Device<crate::vulkan::VulkanBackend>> {
    let settings = DeviceSettings {
        prefer_high_performance,
        ..Default::default()
    };
    let backend = crate::vulkan::VulkanBackend::new(&settings)?;
    Ok(Device::from_backend(backend, &settings))
}

#[cfg(feature = "vulkan")]
pub fn create_device_with_config(
    config: &crate::config::GpuConfig,
) -> GpuResult<Device<crate::vulkan::VulkanBackend>> {
    let backend = crate::vulkan::VulkanBackend::new(&config.device)?;
    Ok(Device::from_backend(backend, &config.device))
}

impl<B: Backend> Device<B> {
    pub fn from_backend(backend: B, settings: &DeviceSettings) -> Self {
        let info = backend.adapter_info();
        log::info!(
            "device ready: {} (vendor {:#06x}, device {:#06x}{})",
            info.name,
            info.vendor_id,
            info.device_id,
            if info.discrete { ", discrete" } else { "" }
        );
        let shared = DeviceShared {
            ring: Mutex::new(CommandQueue::new(settings.ring_capacity())),
            layouts: Mutex::new(PipelineLayoutCache::new(settings.layout_cache_capacity())),
            next_id: AtomicU64::new(1),
            backend,
        };
        Self {
            shared: Arc::new(shared),
            recording: None,
            dynamic_state: DynamicState::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    pub fn limits(&self) -> &DeviceLimits {
        self.shared.backend.limits()
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        self.shared.backend.adapter_info()
    }

    pub fn wait_idle(&self) -> GpuResult<()> {
        self.shared.backend.wait_idle()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> GpuResult<Arc<Texture<B>>> {
        validation::validate_texture_desc(desc, self.limits())?;
        let raw = self.shared.backend.create_texture(desc)?;
        Ok(Arc::new(Texture::new(Arc::clone(&self.shared), raw, desc.clone())))
    }

    pub fn create_buffer(&self, desc: &BufferDesc) -> GpuResult<Arc<Buffer<B>>> {
        validation::validate_buffer_desc(desc)?;
        let raw = self.shared.backend.create_buffer(desc)?;
        Ok(Arc::new(Buffer::new(Arc::clone(&self.shared), raw, desc.clone())))
    }

    pub fn create_buffer_view(
        &self,
        buffer: &Arc<Buffer<B>>,
        desc: &BufferViewDesc,
    ) -> GpuResult<Arc<BufferView<B>>> {
        validation::validate_buffer_view_desc(buffer.desc(), desc)?;
        let raw = self.shared.backend.create_buffer_view(buffer.raw(), desc)?;
        Ok(Arc::new(BufferView::new(Arc::clone(buffer), raw, *desc)))
    }

    pub fn create_render_pass(&self, desc: &RenderPassDesc) -> GpuResult<Arc<RenderPass<B>>> {
        validation::validate_render_pass_desc(desc, self.limits())?;
        let raw = self.shared.backend.create_render_pass(desc)?;
        Ok(Arc::new(RenderPass::new(Arc::clone(&self.shared), raw, desc.clone())))
    }

    pub fn create_framebuffer(&self, desc: FramebufferDesc<B>) -> GpuResult<Arc<Framebuffer<B>>> {
        let pass = desc.render_pass.desc();
        let layout = FramebufferLayout {
            color_attachments: desc
                .color_attachments
                .iter()
                .map(|a| FramebufferAttachment {
                    texture: a.texture.as_deref().map(Texture::desc),
                    resolve: a.resolve.as_deref().map(Texture::desc),
                })
                .collect(),
            depth_stencil: desc.depth_stencil_attachment.as_deref().map(Texture::desc),
            width: desc.width,
            height: desc.height,
        };
        validation::prevalidate_framebuffer_desc(pass, &layout)?;
        for (index, attachment) in layout.color_attachments.iter().enumerate() {
            validation::validate_framebuffer_attachment(index, pass, attachment)?;
            if let Some(texture) = attachment.texture {
                validation::validate_attachment_extent("color attachment", texture, desc.width, desc.height)?;
            }
            if let Some(resolve) = attachment.resolve {
                validation::validate_attachment_extent("resolve target", resolve, desc.width, desc.height)?;
            }
        }

        let mut color = Vec::with_capacity(desc.color_attachments.len());
        let mut resolve = Vec::with_capacity(desc.color_attachments.len());
        for attachment in desc.color_attachments {
            let texture = attachment.texture.ok_or(ErrorCode::InvalidArgs)?;
            color.push(texture);
            resolve.push(attachment.resolve);
        }
        let attachments = FramebufferAttachments {
            color,
            resolve,
            depth_stencil: desc.depth_stencil_attachment,
        };
        let extent = Extent2D::new(desc.width, desc.height);
        let targets = FramebufferTargets::<B> {
            color: attachments.color.iter().map(|t| t.raw()).collect(),
            resolve: attachments.resolve.iter().flatten().map(|t| t.raw()).collect(),
            depth_stencil: attachments.depth_stencil.as_deref().map(Texture::raw),
            extent,
        };
        let raw = self
            .shared
            .backend
            .create_framebuffer(desc.render_pass.raw(), &targets)?;
        Ok(Arc::new(Framebuffer::new(
            Arc::clone(&self.shared),
            raw,
            desc.render_pass,
            attachments,
            extent,
        )))
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> GpuResult<Arc<Sampler<B>>> {
        validation::validate_sampler_desc(desc, self.limits())?;
        let raw = self.shared.backend.create_sampler(desc)?;
        Ok(Arc::new(Sampler::new(Arc::clone(&self.shared), raw, *desc)))
    }

    /// Reflects both stages, merges their bindings, takes the matching layout from the cache
    /// and builds the pipeline against it.
    pub fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<B>,
    ) -> GpuResult<Arc<GraphicsPipeline<B>>> {
        let pass = desc.render_pass.desc();
        validation::validate_pipeline_state(&desc.state, pass)?;

        let vertex = reflect_stage(ShaderStage::Vertex, &desc.vertex)?;
        let fragment = desc
            .fragment
            .as_ref()
            .map(|stage| reflect_stage(ShaderStage::Fragment, stage))
            .transpose()?;
        let resources = ShaderResourceTable::from_stages(&vertex, fragment.as_ref())?;

        let shared = &self.shared;
        let layout = shared
            .layouts
            .lock()
            .create_or_get_pipeline_layout(&shared.backend, &resources.layout_bindings())?;

        let info = GraphicsPipelineInfo::<B> {
            vertex: &desc.vertex,
            fragment: desc.fragment.as_ref(),
            state: &desc.state,
            layout: layout.raw(),
            render_pass: desc.render_pass.raw(),
            render_pass_desc: pass,
        };
        match shared.backend.create_graphics_pipeline(&info) {
            Ok(raw) => {
                log::debug!(
                    "graphics pipeline '{}': {} shader bindings",
                    desc.label.unwrap_or("<unnamed>"),
                    resources.len()
                );
                Ok(Arc::new(GraphicsPipeline::new(
                    Arc::clone(shared),
                    raw,
                    Arc::clone(&desc.render_pass),
                    layout,
                    resources,
                )))
            }
            Err(e) => {
                let last_reference = shared.layouts.lock().release(&layout);
                if last_reference {
                    shared.ring.lock().destroy_pipeline_layout(
                        &shared.backend,
                        layout.last_submission(),
                        layout.raw(),
                    );
                }
                Err(e)
            }
        }
    }

    pub fn create_swapchain(&self, window: &dyn Window, desc: &SwapChainDesc) -> GpuResult<SwapChain<B>> {
        SwapChain::new(Arc::clone(&self.shared), window, desc)
    }

    /// Copies `data` into a host-visible buffer at `offset`.
    pub fn write_buffer(&self, buffer: &Buffer<B>, offset: u64, data: &[u8]) -> GpuResult<()> {
        if !buffer.desc().is_host_visible() {
            log::error!(
                "write_buffer: buffer '{}' is not host visible",
                buffer.desc().label.unwrap_or("<unnamed>")
            );
            return Err(ErrorCode::MemoryUsageNotSupported);
        }
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > buffer.size()) {
            log::error!(
                "write_buffer: {} bytes at offset {offset} exceed buffer size {}",
                data.len(),
                buffer.size()
            );
            return Err(ErrorCode::InvalidArgs);
        }
        self.shared.backend.write_buffer(buffer.raw(), offset, data)
    }

    /// Starts recording into the next submission of the ring. Blocks while that submission is
    /// still executing, then releases everything that was waiting on it.
    pub fn begin_cmd(&mut self) -> GpuResult<u32> {
        if self.recording.is_some() {
            log::error!("begin_cmd: already recording");
            return Err(ErrorCode::InvalidArgs);
        }
        let shared = &self.shared;
        let backend = &shared.backend;
        let mut ring = shared.ring.lock();
        let submission = ring.enqueue_submission(backend)?;
        let prepared = ring
            .submission_mut(submission)
            .ok_or(ErrorCode::InternalError)
            .and_then(|slot| {
                slot.wait(backend)?;
                slot.destroy_pending_resources(backend);
                backend.reset_command_pool(slot.command_pool())?;
                let cmd = slot.command_buffer();
                backend.begin_command_buffer(cmd)?;
                Ok(cmd)
            });
        let cmd = match prepared {
            Ok(cmd) => cmd,
            Err(e) => {
                ring.abandon_submission();
                return Err(e);
            }
        };
        drop(ring);

        self.dynamic_state.invalidate();
        self.recording = Some(Recording {
            submission,
            cmd,
            render_pass_extent: None,
            pipeline_bound: false,
        });
        Ok(submission)
    }

    /// Finishes recording and submits. Returns the submission id.
    pub fn end_cmd(&mut self) -> GpuResult<u32> {
        let Some(recording) = self.recording.take() else {
            log::error!("end_cmd: not recording");
            return Err(ErrorCode::InvalidArgs);
        };
        let backend = &self.shared.backend;
        if recording.render_pass_extent.is_some() {
            log::warn!("end_cmd: render pass left open, ending it");
            backend.cmd_end_render_pass(recording.cmd);
        }
        let mut ring = self.shared.ring.lock();
        let submitted = backend
            .end_command_buffer(recording.cmd)
            .and_then(|()| ring.dequeue_submission(backend));
        if submitted.is_err() {
            ring.abandon_submission();
        }
        submitted
    }

    fn recording(&mut self, what: &str) -> GpuResult<&mut Recording<B>> {
        match self.recording.as_mut() {
            Some(recording) => Ok(recording),
            None => {
                log::error!("{what}: no command buffer is being recorded");
                Err(ErrorCode::InvalidArgs)
            }
        }
    }

    /// Opens `framebuffer`'s render pass. `clear_values` holds one entry per color attachment
    /// followed by one for the depth-stencil attachment; an empty slice clears to the neutral
    /// value of each format. Viewport and scissor are reset to the full framebuffer.
    pub fn cmd_begin_render_pass(
        &mut self,
        framebuffer: &Framebuffer<B>,
        clear_values: &[ClearValue],
    ) -> GpuResult<()> {
        let pass = framebuffer.render_pass().desc();
        let formats: Vec<_> = pass
            .color_attachments
            .iter()
            .map(|a| a.format)
            .chain(pass.depth_stencil_format())
            .collect();
        let clears: Vec<ClearValue> = if clear_values.is_empty() {
            formats.iter().map(|&f| ClearValue::default_for(f)).collect()
        } else {
            if clear_values.len() != formats.len() {
                log::error!(
                    "cmd_begin_render_pass: {} clear values for {} attachments",
                    clear_values.len(),
                    formats.len()
                );
                return Err(ErrorCode::InvalidArgs);
            }
            for (index, (clear, format)) in clear_values.iter().zip(&formats).enumerate() {
                if !clear.matches(*format) {
                    log::error!(
                        "cmd_begin_render_pass: clear value {index} ({clear:?}) does not suit {format:?}"
                    );
                    return Err(ErrorCode::InvalidArgs);
                }
            }
            clear_values.to_vec()
        };

        let recording = self.recording("cmd_begin_render_pass")?;
        if recording.render_pass_extent.is_some() {
            log::error!("cmd_begin_render_pass: a render pass is already open");
            return Err(ErrorCode::InvalidArgs);
        }
        let (submission, cmd) = (recording.submission, recording.cmd);
        let extent = framebuffer.extent();
        recording.render_pass_extent = Some(extent);

        framebuffer.mark_used(submission);
        self.shared.backend.cmd_begin_render_pass(
            cmd,
            framebuffer.render_pass().raw(),
            framebuffer.raw(),
            Rect2D::from_extent(extent),
            &clears,
        );
        self.dynamic_state.set_viewport(Viewport::from_extent(extent));
        self.dynamic_state.set_scissor(Rect2D::from_extent(extent));
        Ok(())
    }

    pub fn cmd_end_render_pass(&mut self) -> GpuResult<()> {
        let recording = self.recording("cmd_end_render_pass")?;
        if recording.render_pass_extent.take().is_none() {
            log::error!("cmd_end_render_pass: no render pass is open");
            return Err(ErrorCode::InvalidArgs);
        }
        let cmd = recording.cmd;
        self.shared.backend.cmd_end_render_pass(cmd);
        Ok(())
    }

    pub fn cmd_bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline<B>) -> GpuResult<()> {
        let recording = self.recording("cmd_bind_graphics_pipeline")?;
        recording.pipeline_bound = true;
        let (submission, cmd) = (recording.submission, recording.cmd);
        pipeline.mark_used(submission);
        self.shared.backend.cmd_bind_pipeline(cmd, pipeline.raw());
        Ok(())
    }

    pub fn cmd_bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer<B>, offset: u64) -> GpuResult<()> {
        require_buffer_usage("cmd_bind_vertex_buffer", buffer, BufferUsage::VERTEX)?;
        let recording = self.recording("cmd_bind_vertex_buffer")?;
        let (submission, cmd) = (recording.submission, recording.cmd);
        buffer.mark_used(submission);
        self.shared.backend.cmd_bind_vertex_buffer(cmd, slot, buffer.raw(), offset);
        Ok(())
    }

    pub fn cmd_bind_index_buffer(
        &mut self,
        buffer: &Buffer<B>,
        offset: u64,
        index_type: IndexType,
    ) -> GpuResult<()> {
        require_buffer_usage("cmd_bind_index_buffer", buffer, BufferUsage::INDEX)?;
        let recording = self.recording("cmd_bind_index_buffer")?;
        let (submission, cmd) = (recording.submission, recording.cmd);
        buffer.mark_used(submission);
        self.shared
            .backend
            .cmd_bind_index_buffer(cmd, buffer.raw(), offset, index_type);
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> GpuResult<()> {
        self.recording("set_viewport")?;
        self.dynamic_state.set_viewport(viewport);
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) -> GpuResult<()> {
        self.recording("set_scissor")?;
        self.dynamic_state.set_scissor(scissor);
        Ok(())
    }

    pub fn set_blend_constants(&mut self, constants: [f32; 4]) -> GpuResult<()> {
        self.recording("set_blend_constants")?;
        self.dynamic_state.set_blend_constants(constants);
        Ok(())
    }

    pub fn set_stencil_reference(&mut self, reference: u32) -> GpuResult<()> {
        self.recording("set_stencil_reference")?;
        self.dynamic_state.set_stencil_reference(reference);
        Ok(())
    }

    /// Checks a draw can be issued and flushes pending dynamic state.
    fn prepare_draw(&mut self, what: &str) -> GpuResult<B::CommandBuffer> {
        let recording = self.recording(what)?;
        if recording.render_pass_extent.is_none() || !recording.pipeline_bound {
            log::error!("{what}: needs an open render pass and a bound pipeline");
            return Err(ErrorCode::InvalidArgs);
        }
        let cmd = recording.cmd;
        self.dynamic_state.flush(&self.shared.backend, cmd);
        Ok(cmd)
    }

    pub fn cmd_draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> GpuResult<()> {
        let cmd = self.prepare_draw("cmd_draw")?;
        self.shared
            .backend
            .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance);
        Ok(())
    }

    pub fn cmd_draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> GpuResult<()> {
        let cmd = self.prepare_draw("cmd_draw_indexed")?;
        self.shared.backend.cmd_draw_indexed(
            cmd,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
        Ok(())
    }

    fn transfer_recording(&mut self, what: &str) -> GpuResult<(u32, B::CommandBuffer)> {
        let recording = self.recording(what)?;
        if recording.render_pass_extent.is_some() {
            log::error!("{what}: transfers are not allowed inside a render pass");
            return Err(ErrorCode::InvalidArgs);
        }
        Ok((recording.submission, recording.cmd))
    }

    pub fn cmd_copy_buffer(&mut self, src: &Buffer<B>, dst: &Buffer<B>, region: BufferCopy) -> GpuResult<()> {
        require_buffer_usage("cmd_copy_buffer", src, BufferUsage::COPY_SRC)?;
        require_buffer_usage("cmd_copy_buffer", dst, BufferUsage::COPY_DST)?;
        let fits = |offset: u64, size: u64| offset.checked_add(region.size).is_some_and(|end| end <= size);
        if region.size == 0 || !fits(region.src_offset, src.size()) || !fits(region.dst_offset, dst.size()) {
            log::error!(
                "cmd_copy_buffer: {} bytes from {} to {} do not fit ({} -> {})",
                region.size,
                region.src_offset,
                region.dst_offset,
                src.size(),
                dst.size()
            );
            return Err(ErrorCode::InvalidArgs);
        }
        let (submission, cmd) = self.transfer_recording("cmd_copy_buffer")?;
        src.mark_used(submission);
        dst.mark_used(submission);
        self.shared.backend.cmd_copy_buffer(cmd, src.raw(), dst.raw(), region);
        Ok(())
    }

    pub fn cmd_copy_buffer_to_texture(
        &mut self,
        src: &Buffer<B>,
        dst: &Texture<B>,
        region: BufferTextureCopy,
    ) -> GpuResult<()> {
        require_buffer_usage("cmd_copy_buffer_to_texture", src, BufferUsage::COPY_SRC)?;
        let desc = dst.desc();
        if !desc.usage.contains(TextureUsage::COPY_DST) {
            log::error!("cmd_copy_buffer_to_texture: destination lacks COPY_DST usage");
            return Err(ErrorCode::IncompatibleResourceUsage);
        }
        let (x, y, z) = region.origin;
        let (w, h, d) = region.extent;
        let mip_extent = |size: u32| size.checked_shr(region.mip_level).unwrap_or(0).max(1);
        let exceeds = |origin: u32, len: u32, size: u32| {
            len == 0 || !origin.checked_add(len).is_some_and(|end| end <= mip_extent(size))
        };
        let bytes = u64::from(w)
            .checked_mul(u64::from(h))
            .and_then(|n| n.checked_mul(u64::from(d)))
            .and_then(|n| n.checked_mul(u64::from(desc.format.bytes_per_texel())));
        let source_fits = bytes
            .and_then(|n| region.buffer_offset.checked_add(n))
            .is_some_and(|end| end <= src.size());
        if region.mip_level >= desc.mip_levels
            || region.array_layer >= desc.array_layers
            || exceeds(x, w, desc.width)
            || exceeds(y, h, desc.height)
            || exceeds(z, d, desc.depth)
            || !source_fits
        {
            log::error!("cmd_copy_buffer_to_texture: region {region:?} outside destination {desc:?}");
            return Err(ErrorCode::InvalidArgs);
        }
        let (submission, cmd) = self.transfer_recording("cmd_copy_buffer_to_texture")?;
        src.mark_used(submission);
        dst.mark_used(submission);
        self.shared
            .backend
            .cmd_copy_buffer_to_texture(cmd, src.raw(), dst.raw(), region);
        Ok(())
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        if self.recording.is_some() {
            log::warn!("device dropped while recording; the open command buffer is discarded");
            self.shared.ring.lock().abandon_submission();
        }
    }
}

fn require_buffer_usage<B: Backend>(what: &str, buffer: &Buffer<B>, usage: BufferUsage) -> GpuResult<()> {
    if !buffer.desc().usage.contains(usage) {
        log::error!(
            "{what}: buffer '{}' lacks {usage:?} usage",
            buffer.desc().label.unwrap_or("<unnamed>")
        );
        return Err(ErrorCode::IncompatibleResourceUsage);
    }
    Ok(())
}

fn reflect_stage(stage: ShaderStage, desc: &ShaderStageDesc) -> GpuResult<StageReflection> {
    match &desc.reflection {
        Some(reflection) if reflection.stage == stage => Ok(reflection.clone()),
        Some(reflection) => {
            log::error!("{stage:?} stage carries reflection for {:?}", reflection.stage);
            Err(ErrorCode::InvalidArgs)
        }
        None => StageReflection::from_spirv(stage, &desc.code),
    }
}
