use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::automation::parameter::ParameterKey;
use crate::automation::sequence::SequenceChange;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

/// Model object that raised an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Clip(ClipId),
    Track(TrackId),
    Effect(EffectId),
}

/// Notifications for the UI layer, drained from the owning timeline.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    ParameterChanged {
        owner: ObjectRef,
        key: ParameterKey,
        change: SequenceChange,
    },
    MatrixInvalidated {
        clip: ClipId,
    },
    SpanChanged {
        clip: ClipId,
    },
    StructureChanged,
    EffectsChanged {
        owner: ObjectRef,
    },
}

impl ModelEvent {
    /// Identity of events that carry no payload beyond their subject; repeats add nothing.
    fn coalesce_key(&self) -> Option<CoalesceKey> {
        match *self {
            Self::ParameterChanged { .. } => None,
            Self::MatrixInvalidated { clip } => Some(CoalesceKey::Matrix(clip)),
            Self::SpanChanged { clip } => Some(CoalesceKey::Span(clip)),
            Self::StructureChanged => Some(CoalesceKey::Structure),
            Self::EffectsChanged { owner } => Some(CoalesceKey::Effects(owner)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum CoalesceKey {
    Matrix(ClipId),
    Span(ClipId),
    Structure,
    Effects(ObjectRef),
}

/// Undrained events kept before the oldest are dropped.
pub const MAX_QUEUED_EVENTS: usize = 4096;

#[derive(Default)]
struct EventQueue {
    events: VecDeque<ModelEvent>,
    queued: HashSet<CoalesceKey>,
    dropped: u64,
}

impl EventQueue {
    fn push(&mut self, event: ModelEvent) {
        if let Some(key) = event.coalesce_key()
            && !self.queued.insert(key)
        {
            return;
        }
        if self.events.len() == MAX_QUEUED_EVENTS
            && let Some(oldest) = self.events.pop_front()
        {
            if let Some(key) = oldest.coalesce_key() {
                self.queued.remove(&key);
            }
            if self.dropped == 0 {
                tracing::warn!(cap = MAX_QUEUED_EVENTS, "model events not drained; dropping the oldest");
            }
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    fn drain(&mut self) -> Vec<ModelEvent> {
        if self.dropped > 0 {
            tracing::debug!(dropped = self.dropped, "model events dropped since last drain");
        }
        self.dropped = 0;
        self.queued.clear();
        self.events.drain(..).collect()
    }
}

#[derive(Default)]
struct NotifierInner {
    dirty: AtomicBool,
    generation: AtomicU64,
    suspend_depth: AtomicU32,
    modified: AtomicBool,
    events: Mutex<EventQueue>,
}

/// Render-dirty state and event queue shared by a timeline and everything it owns.
///
/// Many invalidations between two ticks collapse into one pending render.
#[derive(Clone, Default)]
pub struct Notifier(Arc<NotifierInner>);

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the rendered frame stale.
    pub fn invalidate(&self) {
        self.0.generation.fetch_add(1, Ordering::AcqRel);
        self.0.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.load(Ordering::Acquire)
    }

    /// Number of invalidations ever recorded.
    pub fn generation(&self) -> u64 {
        self.0.generation.load(Ordering::Acquire)
    }

    /// Consume the pending invalidation unless rendering is suspended.
    pub fn take_dirty(&self) -> bool {
        if self.is_suspended() {
            return false;
        }
        self.0.dirty.swap(false, Ordering::AcqRel)
    }

    /// Hold back render scheduling until the returned guard is dropped.
    pub fn suspend(&self) -> SuspendGuard {
        self.0.suspend_depth.fetch_add(1, Ordering::AcqRel);
        SuspendGuard {
            notifier: self.clone(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.0.suspend_depth.load(Ordering::Acquire) > 0
    }

    pub fn mark_modified(&self) {
        self.0.modified.store(true, Ordering::Release);
    }

    pub fn is_modified(&self) -> bool {
        self.0.modified.load(Ordering::Acquire)
    }

    pub fn clear_modified(&self) {
        self.0.modified.store(false, Ordering::Release);
    }

    /// Queue `event` for the UI. Repeats of a subject-only event still undrained are merged,
    /// and past [`MAX_QUEUED_EVENTS`] the oldest event is dropped.
    pub fn emit(&self, event: ModelEvent) {
        self.0.events.lock().push(event);
    }

    pub fn drain_events(&self) -> Vec<ModelEvent> {
        self.0.events.lock().drain()
    }

    pub fn queued_events(&self) -> usize {
        self.0.events.lock().events.len()
    }

    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("dirty", &self.is_dirty())
            .field("generation", &self.generation())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

/// Keeps render invalidation suspended while alive.
#[must_use = "rendering resumes as soon as the guard is dropped"]
pub struct SuspendGuard {
    notifier: Notifier,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.notifier.0.suspend_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/notify.rs"]
mod tests;
