//! Plain-data snapshots captured during prepare and consumed by render threads.
//!
//! Nothing here refers back to the editable model; a proxy stays valid however the timeline is
//! edited after it was captured.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::assets::source::MediaSource;
use crate::foundation::core::{Affine, Canvas, FrameIndex, Rect, Rgba8Premul, Vec2};
use crate::timeline::notify::{ClipId, EffectId, TrackId};

/// Everything needed to render one frame of one timeline.
#[derive(Clone, Debug)]
pub struct FrameProxy {
    pub frame: FrameIndex,
    pub resolution: Canvas,
    /// Draw order: bottom track first.
    pub tracks: Vec<TrackProxy>,
    /// Clips that intersected the frame but could not prepare.
    pub skipped_clips: u32,
}

impl FrameProxy {
    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }
}

#[derive(Clone, Debug)]
pub struct TrackProxy {
    pub track: TrackId,
    pub opacity: f64,
    pub matrix: Affine,
    pub effects: SmallVec<[EffectProxy; 2]>,
    /// Clip list order.
    pub clips: Vec<ClipProxy>,
}

#[derive(Clone, Debug)]
pub struct ClipProxy {
    pub clip: ClipId,
    pub opacity: u8,
    /// Local matrix; the track matrix is applied by the enclosing track.
    pub matrix: Affine,
    pub content: ContentProxy,
    pub effects: SmallVec<[EffectProxy; 2]>,
}

#[derive(Clone, Debug)]
pub enum ContentProxy {
    Shape {
        size: Vec2,
        color: Rgba8Premul,
    },
    Media {
        source: Arc<dyn MediaSource>,
        timestamp_secs: f64,
    },
    /// Nested timeline drawn in the clip's local space.
    Composition(Box<FrameProxy>),
}

/// Effect state resolved for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectProxy {
    pub effect: EffectId,
    pub op: EffectOp,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectOp {
    Motion { matrix: Affine },
    Crop { rect: Rect },
    Tint { color: Rgba8Premul, amount: f64 },
    BoxBlur { radius: u32 },
}
