//! Owning wrappers around backend handles.
//!
//! Each wrapper keeps its device alive through an `Arc` and remembers the last submission that
//! recorded it. Dropping a wrapper hands its handle to the submission ring, which destroys it at
//! once if it was never recorded and otherwise once that submission has retired.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::command_queue::UNATTACHED;
use crate::device::DeviceShared;
use crate::hal::Backend;
use crate::layout_cache::PipelineLayoutItem;
use crate::reflection::{ShaderResourceInfo, ShaderResourceTable};
use crate::types::{BufferDesc, BufferViewDesc, Extent2D, RenderPassDesc, ResourceId, SamplerDesc, TextureDesc};

/// Last-use bookkeeping shared by all wrappers.
#[derive(Debug)]
struct SubmissionTracker(AtomicU32);

impl SubmissionTracker {
    fn new() -> Self {
        Self(AtomicU32::new(UNATTACHED))
    }

    fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, submission: u32) {
        self.0.store(submission, Ordering::Relaxed);
    }
}

pub struct Texture<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: ManuallyDrop<B::Texture>,
    desc: TextureDesc,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> Texture<B> {
    pub(crate) fn new(device: Arc<DeviceShared<B>>, raw: B::Texture, desc: TextureDesc) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw: ManuallyDrop::new(raw),
            desc,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> &B::Texture {
        &self.raw
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.desc.width, self.desc.height)
    }

    /// Submission that last recorded this texture, or [`UNATTACHED`].
    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }

    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.set(submission);
    }
}

impl<B: Backend> Drop for Texture<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is taken exactly once, here, and never read again.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_texture(&device.backend, self.last_submission.get(), raw);
    }
}

impl<B: Backend> std::fmt::Debug for Texture<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .field("raw", &*self.raw)
            .finish()
    }
}

pub struct Buffer<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: ManuallyDrop<B::Buffer>,
    desc: BufferDesc,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> Buffer<B> {
    pub(crate) fn new(device: Arc<DeviceShared<B>>, raw: B::Buffer, desc: BufferDesc) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw: ManuallyDrop::new(raw),
            desc,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> &B::Buffer {
        &self.raw
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }

    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.set(submission);
    }
}

impl<B: Backend> Drop for Buffer<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is taken exactly once, here, and never read again.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_buffer(&device.backend, self.last_submission.get(), raw);
    }
}

impl<B: Backend> std::fmt::Debug for Buffer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

/// Typed texel view. Keeps its buffer alive.
pub struct BufferView<B: Backend> {
    buffer: Arc<Buffer<B>>,
    raw: B::BufferView,
    desc: BufferViewDesc,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> BufferView<B> {
    pub(crate) fn new(buffer: Arc<Buffer<B>>, raw: B::BufferView, desc: BufferViewDesc) -> Self {
        let id = buffer.device.next_resource_id();
        Self {
            buffer,
            raw,
            desc,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> B::BufferView {
        self.raw
    }

    pub fn buffer(&self) -> &Arc<Buffer<B>> {
        &self.buffer
    }

    pub fn desc(&self) -> &BufferViewDesc {
        &self.desc
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }
}

impl<B: Backend> Drop for BufferView<B> {
    fn drop(&mut self) {
        let device = &self.buffer.device;
        device
            .ring
            .lock()
            .destroy_buffer_view(&device.backend, self.last_submission.get(), self.raw);
    }
}

pub struct RenderPass<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: B::RenderPass,
    desc: RenderPassDesc,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> RenderPass<B> {
    pub(crate) fn new(device: Arc<DeviceShared<B>>, raw: B::RenderPass, desc: RenderPassDesc) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw,
            desc,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> B::RenderPass {
        self.raw
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }

    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.set(submission);
    }
}

impl<B: Backend> Drop for RenderPass<B> {
    fn drop(&mut self) {
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_render_pass(&device.backend, self.last_submission.get(), self.raw);
    }
}

/// Attachments of a framebuffer. Color slots follow the render pass order.
pub struct FramebufferAttachments<B: Backend> {
    pub color: Vec<Arc<Texture<B>>>,
    /// One entry per color slot; `Some` exactly where the render pass resolves.
    pub resolve: Vec<Option<Arc<Texture<B>>>>,
    pub depth_stencil: Option<Arc<Texture<B>>>,
}

pub struct Framebuffer<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: B::Framebuffer,
    render_pass: Arc<RenderPass<B>>,
    attachments: FramebufferAttachments<B>,
    extent: Extent2D,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> Framebuffer<B> {
    pub(crate) fn new(
        device: Arc<DeviceShared<B>>,
        raw: B::Framebuffer,
        render_pass: Arc<RenderPass<B>>,
        attachments: FramebufferAttachments<B>,
        extent: Extent2D,
    ) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw,
            render_pass,
            attachments,
            extent,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> B::Framebuffer {
        self.raw
    }

    pub fn render_pass(&self) -> &Arc<RenderPass<B>> {
        &self.render_pass
    }

    pub fn color_attachments(&self) -> &[Arc<Texture<B>>] {
        &self.attachments.color
    }

    pub fn depth_stencil_attachment(&self) -> Option<&Arc<Texture<B>>> {
        self.attachments.depth_stencil.as_ref()
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }

    /// Marks the framebuffer, its render pass and every attachment.
    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.set(submission);
        self.render_pass.mark_used(submission);
        let attachments = &self.attachments;
        attachments
            .color
            .iter()
            .chain(attachments.resolve.iter().flatten())
            .chain(attachments.depth_stencil.iter())
            .for_each(|texture| texture.mark_used(submission));
    }
}

impl<B: Backend> Drop for Framebuffer<B> {
    fn drop(&mut self) {
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_framebuffer(&device.backend, self.last_submission.get(), self.raw);
    }
}

pub struct Sampler<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: B::Sampler,
    desc: SamplerDesc,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> Sampler<B> {
    pub(crate) fn new(device: Arc<DeviceShared<B>>, raw: B::Sampler, desc: SamplerDesc) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw,
            desc,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> B::Sampler {
        self.raw
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }
}

impl<B: Backend> Drop for Sampler<B> {
    fn drop(&mut self) {
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_sampler(&device.backend, self.last_submission.get(), self.raw);
    }
}

/// A graphics pipeline together with its cached layout and merged shader bindings.
pub struct GraphicsPipeline<B: Backend> {
    device: Arc<DeviceShared<B>>,
    raw: B::Pipeline,
    render_pass: Arc<RenderPass<B>>,
    layout: Arc<PipelineLayoutItem<B>>,
    resources: ShaderResourceTable,
    id: ResourceId,
    last_submission: SubmissionTracker,
}

impl<B: Backend> GraphicsPipeline<B> {
    pub(crate) fn new(
        device: Arc<DeviceShared<B>>,
        raw: B::Pipeline,
        render_pass: Arc<RenderPass<B>>,
        layout: Arc<PipelineLayoutItem<B>>,
        resources: ShaderResourceTable,
    ) -> Self {
        let id = device.next_resource_id();
        Self {
            device,
            raw,
            render_pass,
            layout,
            resources,
            id,
            last_submission: SubmissionTracker::new(),
        }
    }

    pub fn raw(&self) -> B::Pipeline {
        self.raw
    }

    pub fn render_pass(&self) -> &Arc<RenderPass<B>> {
        &self.render_pass
    }

    pub fn layout(&self) -> &Arc<PipelineLayoutItem<B>> {
        &self.layout
    }

    pub fn shader_resources(&self) -> &ShaderResourceTable {
        &self.resources
    }

    /// Merged `{type, binding, count}` of the resource called `name`, if any stage declares it.
    pub fn get_shader_resource_info(&self, name: &str) -> Option<ShaderResourceInfo> {
        self.resources.get_shader_resource_info(name)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.get()
    }

    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.set(submission);
        self.layout.mark_used(submission);
    }
}

impl<B: Backend> Drop for GraphicsPipeline<B> {
    fn drop(&mut self) {
        let device = &self.device;
        device
            .ring
            .lock()
            .destroy_graphics_pipeline(&device.backend, self.last_submission.get(), self.raw);

        let last_reference = device.layouts.lock().release(&self.layout);
        if last_reference {
            device.ring.lock().destroy_pipeline_layout(
                &device.backend,
                self.layout.last_submission(),
                self.layout.raw(),
            );
        }
    }
}
