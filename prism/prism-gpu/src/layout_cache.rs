//! Direct-mapped cache of pipeline layouts keyed by a hash of their bindings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::command_queue::UNATTACHED;
use crate::error::GpuResult;
use crate::hal::Backend;
use crate::reflection::LayoutBinding;

pub const DEFAULT_LAYOUT_CACHE_CAPACITY: usize = 1024;

/// A cached descriptor-set layout plus pipeline layout, shared by every pipeline whose
/// bindings hash to it.
pub struct PipelineLayoutItem<B: Backend> {
    hash: u64,
    bindings: Vec<LayoutBinding>,
    raw: B::PipelineLayout,
    ref_count: AtomicU32,
    last_submission: AtomicU32,
}

impl<B: Backend> PipelineLayoutItem<B> {
    pub fn raw(&self) -> B::PipelineLayout {
        self.raw
    }

    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Relaxed)
    }

    pub fn last_submission(&self) -> u32 {
        self.last_submission.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_used(&self, submission: u32) {
        self.last_submission.store(submission, Ordering::Relaxed);
    }
}

impl<B: Backend> std::fmt::Debug for PipelineLayoutItem<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayoutItem")
            .field("hash", &self.hash)
            .field("bindings", &self.bindings.len())
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}

/// Slots are selected by `hash % capacity`. A slot whose entry has a different hash is
/// overwritten: the newest binding set wins, and the evicted entry lives on only through the
/// pipelines already holding it.
pub struct PipelineLayoutCache<B: Backend> {
    slots: Vec<Option<Arc<PipelineLayoutItem<B>>>>,
}

pub fn hash_bindings(bindings: &[LayoutBinding]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bindings.hash(&mut hasher);
    hasher.finish()
}

impl<B: Backend> PipelineLayoutCache<B> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot_of(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    /// Returns the cached layout for `bindings` with its reference count bumped, creating it on
    /// a miss. Each successful call must be paired with one [`release`](Self::release).
    pub fn create_or_get_pipeline_layout(
        &mut self,
        backend: &B,
        bindings: &[LayoutBinding],
    ) -> GpuResult<Arc<PipelineLayoutItem<B>>> {
        let hash = hash_bindings(bindings);
        let slot = self.slot_of(hash);
        if let Some(item) = &self.slots[slot] {
            if item.hash == hash {
                item.ref_count.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(item));
            }
            log::debug!(
                "pipeline layout slot {slot}: replacing entry {:#018x} with {hash:#018x}",
                item.hash
            );
        }

        let raw = backend.create_pipeline_layout(bindings)?;
        let item = Arc::new(PipelineLayoutItem {
            hash,
            bindings: bindings.to_vec(),
            raw,
            ref_count: AtomicU32::new(1),
            last_submission: AtomicU32::new(UNATTACHED),
        });
        self.slots[slot] = Some(Arc::clone(&item));
        Ok(item)
    }

    /// Drops one reference. Returns true when it was the last one; the entry has then left the
    /// cache and its native layout is the caller's to destroy.
    pub fn release(&mut self, item: &Arc<PipelineLayoutItem<B>>) -> bool {
        if item.ref_count.fetch_sub(1, Ordering::Relaxed) != 1 {
            return false;
        }
        let slot = self.slot_of(item.hash);
        if self.slots[slot]
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, item))
        {
            self.slots[slot] = None;
        }
        true
    }

    /// Empties the cache, yielding the native layouts still held by it.
    pub fn drain(&mut self) -> Vec<B::PipelineLayout> {
        self.slots
            .iter_mut()
            .filter_map(Option::take)
            .map(|item| item.raw)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
