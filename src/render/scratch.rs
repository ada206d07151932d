use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::render::surface::Surface;

/// Retention limits for [`ScratchPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScratchPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained surfaces per (w,h) bucket.
    pub max_buffers_per_bucket: usize,
}

impl Default for ScratchPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_buffers_per_bucket: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey {
    w: u32,
    h: u32,
}

impl BucketKey {
    fn byte_len(self) -> usize {
        (self.w as usize)
            .saturating_mul(self.h as usize)
            .saturating_mul(4)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScratchPoolStats {
    pub retained_buffers: usize,
    pub retained_bytes: usize,
    pub alloc_buffers: u64,
    pub alloc_bytes: u64,
    pub dropped_on_release: u64,
    /// Buffers currently borrowed and not yet returned.
    pub outstanding: usize,
}

/// Bounded pool of intermediate surfaces, keyed by `(width, height)`.
///
/// One pool per render thread; borrow/release happens per layer or per effect, never per pixel.
#[derive(Debug)]
pub struct ScratchPool {
    opts: ScratchPoolOpts,
    stats: ScratchPoolStats,
    buckets: HashMap<BucketKey, Vec<Surface>>,
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(ScratchPoolOpts::default())
    }
}

impl ScratchPool {
    pub fn new(opts: ScratchPoolOpts) -> Self {
        Self {
            opts,
            stats: ScratchPoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub fn stats(&self) -> ScratchPoolStats {
        self.stats.clone()
    }

    /// A cleared surface of `w`x`h`.
    pub fn borrow(&mut self, w: u32, h: u32) -> Surface {
        let key = BucketKey { w, h };
        self.stats.outstanding = self.stats.outstanding.saturating_add(1);
        if let Some(mut s) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            s.clear();
            return s;
        }

        self.stats.alloc_buffers = self.stats.alloc_buffers.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(key.byte_len() as u64);
        Surface::new(w, h)
    }

    pub fn release(&mut self, surface: Surface) {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        if self.opts.max_pool_bytes == 0 || self.opts.max_buffers_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let key = BucketKey {
            w: surface.width,
            h: surface.height,
        };
        let bytes = key.byte_len();
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(key).or_default();
        if bucket.len() >= self.opts.max_buffers_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(surface);
        self.stats.retained_buffers = self.stats.retained_buffers.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }

    /// Borrow a surface that returns itself to this pool when dropped.
    pub fn lease(&mut self, w: u32, h: u32) -> ScratchLease<'_> {
        let surface = self.borrow(w, h);
        ScratchLease {
            pool: self,
            surface,
        }
    }
}

/// A borrowed scratch surface, released back to its pool on drop.
#[derive(Debug)]
pub struct ScratchLease<'a> {
    pool: &'a mut ScratchPool,
    surface: Surface,
}

impl Deref for ScratchLease<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        &self.surface
    }
}

impl DerefMut for ScratchLease<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        let surface = std::mem::replace(&mut self.surface, Surface::new(0, 0));
        self.pool.release(surface);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scratch.rs"]
mod tests;
