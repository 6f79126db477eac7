//! Bounded ring of command submissions with per-submission deferred destruction.
//!
//! A resource that was recorded into submission `k` must not be destroyed until `k`'s fence
//! has signalled. Destroying such a resource only queues its handle on submission `k`; the
//! queue is drained the next time `k` is waited on. Resources never recorded carry the
//! [`UNATTACHED`] id and are destroyed on the spot.

use std::collections::VecDeque;

use crate::error::{ErrorCode, GpuResult};
use crate::hal::Backend;

/// Submission id of a resource that no command buffer has referenced.
pub const UNATTACHED: u32 = u32::MAX;

pub const MIN_RING_CAPACITY: usize = 3;
pub const MAX_RING_CAPACITY: usize = 4;

pub(crate) enum BufferRelease<B: Backend> {
    Buffer(B::Buffer),
    View(B::BufferView),
}

pub(crate) enum PipelineRelease<B: Backend> {
    Layout(B::PipelineLayout),
    Pipeline(B::Pipeline),
}

struct PendingResources<B: Backend> {
    textures: VecDeque<B::Texture>,
    buffers: VecDeque<BufferRelease<B>>,
    render_passes: VecDeque<B::RenderPass>,
    framebuffers: VecDeque<B::Framebuffer>,
    samplers: VecDeque<B::Sampler>,
    pipelines: VecDeque<PipelineRelease<B>>,
}

impl<B: Backend> Default for PendingResources<B> {
    fn default() -> Self {
        Self {
            textures: VecDeque::new(),
            buffers: VecDeque::new(),
            render_passes: VecDeque::new(),
            framebuffers: VecDeque::new(),
            samplers: VecDeque::new(),
            pipelines: VecDeque::new(),
        }
    }
}

impl<B: Backend> PendingResources<B> {
    fn len(&self) -> usize {
        self.textures.len()
            + self.buffers.len()
            + self.render_passes.len()
            + self.framebuffers.len()
            + self.samplers.len()
            + self.pipelines.len()
    }
}

/// One slot of the ring: a command pool with its primary command buffer, a fence, and the
/// handles waiting for that fence.
pub struct CommandSubmission<B: Backend> {
    pool: B::CommandPool,
    command_buffer: B::CommandBuffer,
    fence: B::Fence,
    in_flight: bool,
    pending: PendingResources<B>,
}

impl<B: Backend> CommandSubmission<B> {
    fn new(backend: &B) -> GpuResult<Self> {
        let pool = backend.create_command_pool()?;
        let command_buffer = match backend.allocate_command_buffers(pool, 1) {
            Ok(buffers) => match buffers.first() {
                Some(&cmd) => cmd,
                None => {
                    backend.destroy_command_pool(pool);
                    return Err(ErrorCode::InternalError);
                }
            },
            Err(e) => {
                backend.destroy_command_pool(pool);
                return Err(e);
            }
        };
        let fence = match backend.create_fence(false) {
            Ok(fence) => fence,
            Err(e) => {
                backend.destroy_command_pool(pool);
                return Err(e);
            }
        };
        Ok(Self {
            pool,
            command_buffer,
            fence,
            in_flight: false,
            pending: PendingResources::default(),
        })
    }

    pub fn command_pool(&self) -> B::CommandPool {
        self.pool
    }

    pub fn command_buffer(&self) -> B::CommandBuffer {
        self.command_buffer
    }

    pub fn fence(&self) -> B::Fence {
        self.fence
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Blocks on this submission's fence, then resets it. Returns at once if the submission
    /// was never dispatched or has already been waited on.
    pub fn wait(&mut self, backend: &B) -> GpuResult<()> {
        if !self.in_flight {
            return Ok(());
        }
        backend.wait_fence(self.fence)?;
        backend.reset_fence(self.fence)?;
        self.in_flight = false;
        Ok(())
    }

    /// Destroys every queued handle. Only valid once [`wait`](Self::wait) has returned.
    pub fn destroy_pending_resources(&mut self, backend: &B) {
        debug_assert!(!self.in_flight, "destroying resources of an in-flight submission");
        let pending = &mut self.pending;
        for texture in pending.textures.drain(..) {
            backend.destroy_texture(texture);
        }
        for release in pending.buffers.drain(..) {
            match release {
                BufferRelease::Buffer(buffer) => backend.destroy_buffer(buffer),
                BufferRelease::View(view) => backend.destroy_buffer_view(view),
            }
        }
        for render_pass in pending.render_passes.drain(..) {
            backend.destroy_render_pass(render_pass);
        }
        for framebuffer in pending.framebuffers.drain(..) {
            backend.destroy_framebuffer(framebuffer);
        }
        for sampler in pending.samplers.drain(..) {
            backend.destroy_sampler(sampler);
        }
        for release in pending.pipelines.drain(..) {
            match release {
                PipelineRelease::Pipeline(pipeline) => backend.destroy_pipeline(pipeline),
                PipelineRelease::Layout(layout) => backend.destroy_pipeline_layout(layout),
            }
        }
    }

    fn destroy(mut self, backend: &B) {
        self.in_flight = false;
        self.destroy_pending_resources(backend);
        backend.destroy_fence(self.fence);
        backend.destroy_command_pool(self.pool);
    }
}

/// The ring itself. `write_pointer` is the next submission to record, `read_pointer` the next
/// to dispatch; at most `capacity` submissions exist.
pub struct CommandQueue<B: Backend> {
    submissions: Vec<CommandSubmission<B>>,
    capacity: usize,
    read_pointer: usize,
    write_pointer: usize,
    queued: usize,
}

impl<B: Backend> CommandQueue<B> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_RING_CAPACITY, MAX_RING_CAPACITY);
        Self {
            submissions: Vec::with_capacity(capacity),
            capacity,
            read_pointer: 0,
            write_pointer: 0,
            queued: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn read_pointer(&self) -> usize {
        self.read_pointer
    }

    pub fn write_pointer(&self) -> usize {
        self.write_pointer
    }

    /// Hands out the submission at `write_pointer`, creating it while the ring is still
    /// growing, and advances `write_pointer`.
    pub fn enqueue_submission(&mut self, backend: &B) -> GpuResult<u32> {
        if self.queued == self.capacity {
            log::error!("command queue: all {} submissions already enqueued", self.capacity);
            return Err(ErrorCode::InternalError);
        }
        let index = self.write_pointer;
        if index == self.submissions.len() {
            self.submissions.push(CommandSubmission::new(backend)?);
            log::debug!("command queue: grew to {} submissions", self.submissions.len());
        }
        self.write_pointer = (self.write_pointer + 1) % self.capacity;
        self.queued += 1;
        Ok(index as u32)
    }

    /// Submits the command buffer at `read_pointer`, signalling its fence, and advances
    /// `read_pointer`. A failed submit leaves the submission queued and the pointers untouched.
    pub fn dequeue_submission(&mut self, backend: &B) -> GpuResult<u32> {
        if self.queued == 0 {
            log::error!("command queue: nothing enqueued to dispatch");
            return Err(ErrorCode::InternalError);
        }
        let index = self.read_pointer;
        let submission = &mut self.submissions[index];
        backend.submit(submission.command_buffer, None, None, Some(submission.fence))?;
        submission.in_flight = true;
        self.read_pointer = (self.read_pointer + 1) % self.capacity;
        self.queued -= 1;
        Ok(index as u32)
    }

    /// Hands the most recently enqueued submission back without dispatching it, after a
    /// recording failed part way.
    pub fn abandon_submission(&mut self) {
        if self.queued == 0 {
            return;
        }
        self.write_pointer = (self.write_pointer + self.capacity - 1) % self.capacity;
        self.queued -= 1;
    }

    pub fn submission(&self, id: u32) -> Option<&CommandSubmission<B>> {
        self.submissions.get(id as usize)
    }

    pub fn submission_mut(&mut self, id: u32) -> Option<&mut CommandSubmission<B>> {
        self.submissions.get_mut(id as usize)
    }

    /// Queues on submission `id`, or yields the item back when it must be destroyed now.
    fn defer<T>(
        &mut self,
        id: u32,
        item: T,
        queue: impl FnOnce(&mut PendingResources<B>) -> &mut VecDeque<T>,
    ) -> Option<T> {
        if id == UNATTACHED {
            return Some(item);
        }
        match self.submissions.get_mut(id as usize) {
            Some(submission) => {
                queue(&mut submission.pending).push_back(item);
                None
            }
            None => {
                log::warn!("command queue: unknown submission {id}, destroying immediately");
                Some(item)
            }
        }
    }

    pub fn destroy_texture(&mut self, backend: &B, submission_id: u32, texture: B::Texture) {
        if let Some(texture) = self.defer(submission_id, texture, |p| &mut p.textures) {
            backend.destroy_texture(texture);
        }
    }

    pub fn destroy_buffer(&mut self, backend: &B, submission_id: u32, buffer: B::Buffer) {
        let release = BufferRelease::Buffer(buffer);
        if let Some(release) = self.defer(submission_id, release, |p| &mut p.buffers) {
            destroy_buffer_release(backend, release);
        }
    }

    pub fn destroy_buffer_view(&mut self, backend: &B, submission_id: u32, view: B::BufferView) {
        let release = BufferRelease::View(view);
        if let Some(release) = self.defer(submission_id, release, |p| &mut p.buffers) {
            destroy_buffer_release(backend, release);
        }
    }

    pub fn destroy_render_pass(&mut self, backend: &B, submission_id: u32, render_pass: B::RenderPass) {
        if let Some(render_pass) = self.defer(submission_id, render_pass, |p| &mut p.render_passes) {
            backend.destroy_render_pass(render_pass);
        }
    }

    pub fn destroy_framebuffer(&mut self, backend: &B, submission_id: u32, framebuffer: B::Framebuffer) {
        if let Some(framebuffer) = self.defer(submission_id, framebuffer, |p| &mut p.framebuffers) {
            backend.destroy_framebuffer(framebuffer);
        }
    }

    pub fn destroy_sampler(&mut self, backend: &B, submission_id: u32, sampler: B::Sampler) {
        if let Some(sampler) = self.defer(submission_id, sampler, |p| &mut p.samplers) {
            backend.destroy_sampler(sampler);
        }
    }

    pub fn destroy_pipeline_layout(&mut self, backend: &B, submission_id: u32, layout: B::PipelineLayout) {
        let release = PipelineRelease::Layout(layout);
        if let Some(release) = self.defer(submission_id, release, |p| &mut p.pipelines) {
            destroy_pipeline_release(backend, release);
        }
    }

    pub fn destroy_graphics_pipeline(&mut self, backend: &B, submission_id: u32, pipeline: B::Pipeline) {
        let release = PipelineRelease::Pipeline(pipeline);
        if let Some(release) = self.defer(submission_id, release, |p| &mut p.pipelines) {
            destroy_pipeline_release(backend, release);
        }
    }

    /// Tears down every submission. The device must be idle.
    pub(crate) fn destroy_all(&mut self, backend: &B) {
        for submission in self.submissions.drain(..) {
            submission.destroy(backend);
        }
        self.read_pointer = 0;
        self.write_pointer = 0;
        self.queued = 0;
    }
}

fn destroy_buffer_release<B: Backend>(backend: &B, release: BufferRelease<B>) {
    match release {
        BufferRelease::Buffer(buffer) => backend.destroy_buffer(buffer),
        BufferRelease::View(view) => backend.destroy_buffer_view(view),
    }
}

fn destroy_pipeline_release<B: Backend>(backend: &B, release: PipelineRelease<B>) {
    match release {
        PipelineRelease::Pipeline(pipeline) => backend.destroy_pipeline(pipeline),
        PipelineRelease::Layout(layout) => backend.destroy_pipeline_layout(layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Backend as _;
    use crate::mock::MockBackend;
    use crate::types::{SamplerDesc, TextureDesc};

    fn texture(backend: &MockBackend) -> <MockBackend as Backend>::Texture {
        backend.create_texture(&TextureDesc::default()).unwrap()
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(CommandQueue::<MockBackend>::new(1).capacity(), MIN_RING_CAPACITY);
        assert_eq!(CommandQueue::<MockBackend>::new(9).capacity(), MAX_RING_CAPACITY);
    }

    #[test]
    fn ring_grows_lazily_then_wraps() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        let mut order = Vec::new();
        for _ in 0..3 {
            let id = queue.enqueue_submission(&backend).unwrap();
            assert_eq!(queue.dequeue_submission(&backend).unwrap(), id);
            order.push(id);
        }
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(backend.stats().created("command_pool"), 3);

        let id = queue.enqueue_submission(&backend).unwrap();
        assert_eq!(id, 0);
        assert_eq!(queue.len(), 3);
        assert_eq!(backend.stats().created("command_pool"), 3);
        assert_eq!(backend.stats().calls("submit"), 3);
    }

    #[test]
    fn enqueue_beyond_capacity_is_refused() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        for _ in 0..3 {
            queue.enqueue_submission(&backend).unwrap();
        }
        assert_eq!(queue.enqueue_submission(&backend), Err(ErrorCode::InternalError));
        assert_eq!(queue.read_pointer(), 0);
        assert_eq!(queue.write_pointer(), 0);
    }

    #[test]
    fn abandoned_submission_is_handed_out_again() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        let id = queue.enqueue_submission(&backend).unwrap();
        queue.abandon_submission();
        assert_eq!(queue.enqueue_submission(&backend).unwrap(), id);
        assert_eq!(backend.stats().created("command_pool"), 1);
    }

    #[test]
    fn failed_submit_leaves_the_slot_queued() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        let id = queue.enqueue_submission(&backend).unwrap();
        backend.fail_next("submit");
        assert_eq!(queue.dequeue_submission(&backend), Err(ErrorCode::InternalError));
        assert_eq!(queue.read_pointer(), 0);
        assert!(!queue.submission(id).unwrap().is_in_flight());

        assert_eq!(queue.dequeue_submission(&backend).unwrap(), id);
        assert_eq!(queue.read_pointer(), 1);
    }

    #[test]
    fn unattached_resources_are_destroyed_immediately() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::<MockBackend>::new(3);
        let tex = texture(&backend);
        queue.destroy_texture(&backend, UNATTACHED, tex);
        assert_eq!(backend.stats().destroyed("texture"), 1);
    }

    #[test]
    fn attached_resources_wait_for_their_submission() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        let id = queue.enqueue_submission(&backend).unwrap();
        queue.dequeue_submission(&backend).unwrap();

        let tex = texture(&backend);
        let sampler = backend.create_sampler(&SamplerDesc::default()).unwrap();
        queue.destroy_texture(&backend, id, tex);
        queue.destroy_sampler(&backend, id, sampler);
        assert_eq!(backend.stats().destroyed("texture"), 0);
        assert_eq!(queue.submission(id).unwrap().pending_count(), 2);

        let submission = queue.submission_mut(id).unwrap();
        submission.wait(&backend).unwrap();
        assert_eq!(backend.stats().calls("wait_fence"), 1);
        submission.destroy_pending_resources(&backend);
        assert_eq!(backend.stats().destroyed("texture"), 1);
        assert_eq!(backend.stats().destroyed("sampler"), 1);
        assert_eq!(submission.pending_count(), 0);
    }

    #[test]
    fn wait_on_idle_submission_does_not_block() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(3);
        let id = queue.enqueue_submission(&backend).unwrap();
        queue.submission_mut(id).unwrap().wait(&backend).unwrap();
        assert_eq!(backend.stats().calls("wait_fence"), 0);
    }

    #[test]
    fn destroy_all_releases_pending_and_infrastructure() {
        let backend = MockBackend::new();
        let mut queue = CommandQueue::new(4);
        let id = queue.enqueue_submission(&backend).unwrap();
        queue.dequeue_submission(&backend).unwrap();
        let tex = texture(&backend);
        queue.destroy_texture(&backend, id, tex);

        queue.destroy_all(&backend);
        assert_eq!(backend.stats().destroyed("texture"), 1);
        assert_eq!(backend.stats().destroyed("fence"), 1);
        assert_eq!(backend.stats().destroyed("command_pool"), 1);
        assert!(queue.is_empty());
    }
}
