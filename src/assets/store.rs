use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::assets::decode::decode_image;
use crate::assets::source::{MediaSource, StillImage};
use crate::foundation::error::MontageResult;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ResourceId(pub u64);

/// Registry of loaded media handles.
///
/// Loaders may register sources from any thread; prepare only clones handles out of it.
#[derive(Default)]
pub struct ResourceStore {
    sources: RwLock<HashMap<ResourceId, Arc<dyn MediaSource>>>,
    next_id: AtomicU64,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: Arc<dyn MediaSource>) -> ResourceId {
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.sources.write().insert(id, source);
        id
    }

    /// Register `source` under a caller-chosen id, returning the previous source.
    pub fn replace(
        &self,
        id: ResourceId,
        source: Arc<dyn MediaSource>,
    ) -> Option<Arc<dyn MediaSource>> {
        self.sources.write().insert(id, source)
    }

    pub fn remove(&self, id: ResourceId) -> Option<Arc<dyn MediaSource>> {
        self.sources.write().remove(&id)
    }

    pub fn resolve(&self, id: ResourceId) -> Option<Arc<dyn MediaSource>> {
        self.sources.read().get(&id).cloned()
    }

    /// Decode encoded image bytes and register them as a still image.
    pub fn load_image(&self, bytes: &[u8]) -> MontageResult<ResourceId> {
        let bitmap = decode_image(bytes)?;
        Ok(self.insert(Arc::new(StillImage::new(bitmap))))
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
