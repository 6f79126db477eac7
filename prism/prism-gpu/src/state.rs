//! Dynamic pipeline state tracked per command buffer and flushed lazily before draws.

use crate::hal::Backend;
use crate::types::{Rect2D, Viewport};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyState: u8 {
        const VIEWPORT = 1 << 0;
        const SCISSOR = 1 << 1;
        const BLEND_CONSTANTS = 1 << 2;
        const STENCIL_REFERENCE = 1 << 3;
    }
}

#[derive(Debug, Clone, Default)]
pub struct DynamicState {
    viewport: Option<Viewport>,
    scissor: Option<Rect2D>,
    blend_constants: Option<[f32; 4]>,
    stencil_reference: Option<u32>,
    dirty: DirtyState,
}

impl DynamicState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn scissor(&self) -> Option<Rect2D> {
        self.scissor
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport != Some(viewport) {
            self.viewport = Some(viewport);
            self.dirty |= DirtyState::VIEWPORT;
        }
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) {
        if self.scissor != Some(scissor) {
            self.scissor = Some(scissor);
            self.dirty |= DirtyState::SCISSOR;
        }
    }

    pub fn set_blend_constants(&mut self, constants: [f32; 4]) {
        if self.blend_constants != Some(constants) {
            self.blend_constants = Some(constants);
            self.dirty |= DirtyState::BLEND_CONSTANTS;
        }
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        if self.stencil_reference != Some(reference) {
            self.stencil_reference = Some(reference);
            self.dirty |= DirtyState::STENCIL_REFERENCE;
        }
    }

    /// A fresh command buffer or pipeline bind has no dynamic state; everything known must be
    /// issued again.
    pub fn invalidate(&mut self) {
        let mut dirty = DirtyState::empty();
        dirty.set(DirtyState::VIEWPORT, self.viewport.is_some());
        dirty.set(DirtyState::SCISSOR, self.scissor.is_some());
        dirty.set(DirtyState::BLEND_CONSTANTS, self.blend_constants.is_some());
        dirty.set(DirtyState::STENCIL_REFERENCE, self.stencil_reference.is_some());
        self.dirty = dirty;
    }

    /// Records every dirty field into `cmd` and clears the dirty bits.
    pub fn flush<B: Backend>(&mut self, backend: &B, cmd: B::CommandBuffer) {
        if self.dirty.is_empty() {
            return;
        }
        if self.dirty.contains(DirtyState::VIEWPORT) {
            if let Some(viewport) = &self.viewport {
                backend.cmd_set_viewport(cmd, viewport);
            }
        }
        if self.dirty.contains(DirtyState::SCISSOR) {
            if let Some(scissor) = &self.scissor {
                backend.cmd_set_scissor(cmd, scissor);
            }
        }
        if self.dirty.contains(DirtyState::BLEND_CONSTANTS) {
            if let Some(constants) = self.blend_constants {
                backend.cmd_set_blend_constants(cmd, constants);
            }
        }
        if self.dirty.contains(DirtyState::STENCIL_REFERENCE) {
            if let Some(reference) = self.stencil_reference {
                backend.cmd_set_stencil_reference(cmd, reference);
            }
        }
        self.dirty = DirtyState::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockHandle};
    use crate::types::Extent2D;

    #[test]
    fn unchanged_state_is_flushed_once() {
        let backend = MockBackend::new();
        let cmd = MockHandle(1);
        let mut state = DynamicState::new();
        let viewport = Viewport::from_extent(Extent2D::new(640, 480));

        state.set_viewport(viewport);
        state.flush(&backend, cmd);
        state.set_viewport(viewport);
        state.flush(&backend, cmd);
        assert_eq!(backend.stats().calls("cmd_set_viewport"), 1);

        state.set_viewport(Viewport::from_extent(Extent2D::new(320, 240)));
        state.flush(&backend, cmd);
        assert_eq!(backend.stats().calls("cmd_set_viewport"), 2);
    }

    #[test]
    fn only_dirty_fields_are_issued() {
        let backend = MockBackend::new();
        let cmd = MockHandle(1);
        let mut state = DynamicState::new();
        state.set_scissor(Rect2D::from_extent(Extent2D::new(8, 8)));
        state.set_stencil_reference(3);
        state.flush(&backend, cmd);

        state.set_stencil_reference(4);
        assert_eq!(state.dirty(), DirtyState::STENCIL_REFERENCE);
        state.flush(&backend, cmd);

        let stats = backend.stats();
        assert_eq!(stats.calls("cmd_set_scissor"), 1);
        assert_eq!(stats.calls("cmd_set_stencil_reference"), 2);
        assert_eq!(stats.calls("cmd_set_viewport"), 0);
        assert_eq!(stats.calls("cmd_set_blend_constants"), 0);
    }

    #[test]
    fn invalidate_marks_known_fields_only() {
        let mut state = DynamicState::new();
        state.set_blend_constants([1.0; 4]);
        state.dirty = DirtyState::empty();
        state.invalidate();
        assert_eq!(state.dirty(), DirtyState::BLEND_CONSTANTS);
    }
}
