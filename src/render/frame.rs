//! Render phase: turns a [`FrameProxy`] into pixels without touching the model.
//!
//! Every track draws into its own pooled layer and layers composite bottom to top with the
//! track's opacity, so sequential and track-parallel rendering produce identical output.
//!
//! A clip that fails (error or panic) is logged and its track is redrawn without it, leaving the
//! area it would have covered as the clips below painted it.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::assets::source::ResourceFrame;
use crate::effects::process::with_effects;
use crate::foundation::core::IntRect;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::context::{DrawState, RenderContext};
use crate::render::proxy::{ClipProxy, ContentProxy, FrameProxy, TrackProxy};
use crate::render::scratch::{ScratchPool, ScratchPoolOpts};
use crate::render::surface::Surface;
use crate::timeline::notify::{ClipId, TrackId};

/// Cooperative cancellation tied to one request generation.
#[derive(Clone, Debug)]
pub struct CancelToken {
    latest: Arc<AtomicU64>,
    generation: u64,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    pub(crate) fn new(latest: Arc<AtomicU64>, generation: u64) -> Self {
        Self { latest, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer request has been issued.
    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// A finished frame.
#[derive(Debug)]
pub struct RenderOutcome {
    pub surface: Surface,
    /// Union of every device rectangle touched.
    pub dirty: IntRect,
    pub clip_failures: u32,
}

#[derive(Debug)]
enum Interrupt {
    Cancelled,
    ClipFailed { clip: ClipId, reason: String },
    TrackEffectsFailed { track: TrackId, reason: String },
}

/// Per-track draw state.
struct TrackDraw<'a> {
    cancel: &'a CancelToken,
    skip: &'a HashSet<ClipId>,
    /// Tracks drawn without their own effect chain.
    bare: &'a HashSet<TrackId>,
}

/// Executes the render phase, optionally spreading tracks over a rayon pool.
pub struct FrameRenderer {
    pool: Option<rayon::ThreadPool>,
    scratch_opts: ScratchPoolOpts,
    scratch: ScratchPool,
    /// Pools lent to rayon workers, reused across frames.
    worker_scratch: Mutex<Vec<ScratchPool>>,
}

impl FrameRenderer {
    pub fn sequential(scratch_opts: ScratchPoolOpts) -> Self {
        Self {
            pool: None,
            scratch_opts,
            scratch: ScratchPool::new(scratch_opts),
            worker_scratch: Mutex::new(Vec::new()),
        }
    }

    /// Render tracks in parallel on a dedicated pool. `threads: Some(0)` is rejected.
    pub fn parallel(threads: Option<usize>, scratch_opts: ScratchPoolOpts) -> MontageResult<Self> {
        Ok(Self {
            pool: Some(build_thread_pool(threads)?),
            ..Self::sequential(scratch_opts)
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    /// `None` when `cancel` fired before every track was drawn.
    #[tracing::instrument(skip(self, proxy, cancel), fields(frame = proxy.frame.0, tracks = proxy.tracks.len()))]
    pub fn render(&mut self, proxy: &FrameProxy, cancel: &CancelToken) -> Option<RenderOutcome> {
        let (w, h) = (proxy.resolution.width, proxy.resolution.height);
        if cancel.is_cancelled() {
            return None;
        }

        let layers: Vec<Surface> = proxy.tracks.iter().map(|_| self.scratch.borrow(w, h)).collect();
        let drawn: Vec<(Surface, Option<(IntRect, u32)>)> = match &self.pool {
            Some(pool) => {
                let opts = self.scratch_opts;
                let pools = &self.worker_scratch;
                pool.install(|| {
                    proxy
                        .tracks
                        .par_iter()
                        .zip(layers.into_par_iter())
                        .map(|(track, mut layer)| {
                            let mut scratch = pools.lock().pop().unwrap_or_else(|| ScratchPool::new(opts));
                            let out = render_track_layer(track, &mut layer, &mut scratch, cancel);
                            pools.lock().push(scratch);
                            (layer, out)
                        })
                        .collect()
                })
            }
            None => layers
                .into_iter()
                .zip(&proxy.tracks)
                .map(|(mut layer, track)| {
                    let out = if cancel.is_cancelled() {
                        None
                    } else {
                        render_track_layer(track, &mut layer, &mut self.scratch, cancel)
                    };
                    (layer, out)
                })
                .collect(),
        };

        let mut target = Surface::new(w, h);
        let mut dirty = IntRect::EMPTY;
        let mut clip_failures = 0;
        let mut cancelled = false;
        for ((layer, out), track) in drawn.into_iter().zip(&proxy.tracks) {
            match out {
                Some((area, failures)) if !cancelled => {
                    clip_failures += failures;
                    // Equal sizes by construction.
                    if target.composite_from(&layer, track.opacity as f32, area).is_ok() {
                        dirty = dirty.union(area);
                    }
                }
                _ => cancelled = true,
            }
            self.scratch.release(layer);
        }

        if cancelled || cancel.is_cancelled() {
            return None;
        }
        Some(RenderOutcome {
            surface: target,
            dirty,
            clip_failures,
        })
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("parallel", &self.is_parallel())
            .field("scratch", &self.scratch.stats())
            .finish_non_exhaustive()
    }
}

pub(crate) fn build_thread_pool(threads: Option<usize>) -> MontageResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MontageError::validation(
            "render 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| MontageError::render(format!("failed to build rayon thread pool: {e}")))
}

/// Draw one top-level track into `layer`, redrawing without any clip or track effect chain
/// that fails. Returns the touched area and the number of failures, or `None` when cancelled.
fn render_track_layer(
    track: &TrackProxy,
    layer: &mut Surface,
    scratch: &mut ScratchPool,
    cancel: &CancelToken,
) -> Option<(IntRect, u32)> {
    let mut skip = HashSet::new();
    let mut bare = HashSet::new();
    loop {
        let result = {
            let mut ctx = RenderContext::new(layer, scratch);
            let draw = TrackDraw {
                cancel,
                skip: &skip,
                bare: &bare,
            };
            draw.track(&mut ctx, track)
        };
        match result {
            Ok(area) => return Some((area, (skip.len() + bare.len()) as u32)),
            Err(Interrupt::Cancelled) => {
                tracing::debug!("track render cancelled");
                return None;
            }
            Err(Interrupt::ClipFailed { clip, reason }) => {
                tracing::warn!(clip = clip.0, track = track.track.0, %reason, "clip failed to render");
                skip.insert(clip);
                layer.clear();
            }
            Err(Interrupt::TrackEffectsFailed { track: failed, reason }) => {
                tracing::warn!(track = failed.0, %reason, "track effects failed; drawing without them");
                bare.insert(failed);
                layer.clear();
            }
        }
    }
}

impl TrackDraw<'_> {
    fn track(&self, ctx: &mut RenderContext<'_>, track: &TrackProxy) -> Result<IntRect, Interrupt> {
        let depth = ctx.depth();
        ctx.save();
        ctx.concat(track.matrix);
        let clips = |ctx: &mut RenderContext<'_>| {
            let mut area = IntRect::EMPTY;
            for clip in &track.clips {
                if self.cancel.is_cancelled() {
                    return Err(Interrupt::Cancelled);
                }
                area = area.union(self.clip(ctx, clip)?);
            }
            Ok(area)
        };
        let drawn = if self.bare.contains(&track.track) {
            clips(ctx)
        } else {
            catch_unwind(AssertUnwindSafe(|| with_effects(&track.effects, ctx, clips)))
                .unwrap_or_else(|payload| {
                    Err(Interrupt::TrackEffectsFailed {
                        track: track.track,
                        reason: panic_message(payload.as_ref()),
                    })
                })
        };
        while ctx.depth() > depth {
            ctx.restore();
        }
        drawn
    }

    fn clip(&self, ctx: &mut RenderContext<'_>, clip: &ClipProxy) -> Result<IntRect, Interrupt> {
        if self.skip.contains(&clip.clip) {
            return Ok(IntRect::EMPTY);
        }
        let depth = ctx.depth();
        ctx.save();
        ctx.concat(clip.matrix);
        ctx.multiply_opacity(f64::from(clip.opacity) / 255.0);

        let drawn = catch_unwind(AssertUnwindSafe(|| {
            with_effects(&clip.effects, ctx, |ctx| self.content(ctx, clip))
        }));
        while ctx.depth() > depth {
            ctx.restore();
        }
        match drawn {
            Ok(result) => result,
            Err(payload) => Err(Interrupt::ClipFailed {
                clip: clip.clip,
                reason: panic_message(payload.as_ref()),
            }),
        }
    }

    fn content(&self, ctx: &mut RenderContext<'_>, clip: &ClipProxy) -> Result<IntRect, Interrupt> {
        let state = ctx.state();
        match &clip.content {
            ContentProxy::Shape { size, color } => Ok(ctx.surface.fill_quad(
                state.transform,
                *size,
                color.to_array(),
                state.opacity as f32,
                state.clip,
            )),
            ContentProxy::Media {
                source,
                timestamp_secs,
            } => match source.frame_at(*timestamp_secs) {
                ResourceFrame::Ready(bitmap) => Ok(ctx.surface.draw_bitmap(
                    state.transform,
                    &bitmap,
                    state.opacity as f32,
                    state.clip,
                )),
                ResourceFrame::NotReady | ResourceFrame::Invalid => {
                    tracing::debug!(clip = clip.clip.0, t = *timestamp_secs, "media frame unavailable");
                    Ok(IntRect::EMPTY)
                }
            },
            ContentProxy::Composition(nested) => self.composition(ctx, clip.clip, nested, state),
        }
    }

    /// Nested tracks draw under the full accumulated transform and composite with the
    /// accumulated opacity.
    fn composition(
        &self,
        ctx: &mut RenderContext<'_>,
        clip: ClipId,
        nested: &FrameProxy,
        state: DrawState,
    ) -> Result<IntRect, Interrupt> {
        let (w, h) = (ctx.surface.width, ctx.surface.height);
        // Nested content is bounded by its own resolution.
        let bounds = state
            .transform
            .transform_rect_bbox(nested.resolution.bounds().to_rect());
        let base = DrawState {
            clip: state.clip.intersect(IntRect::covering(bounds)),
            opacity: 1.0,
            ..state
        };
        let mut area = IntRect::EMPTY;
        for track in &nested.tracks {
            let mut layer = ctx.scratch.borrow(w, h);
            let drawn = {
                let mut sub = RenderContext::with_state(&mut layer, ctx.scratch, base);
                self.track(&mut sub, track)
            };
            let composited = drawn.and_then(|a| {
                ctx.surface
                    .composite_from(&layer, (state.opacity * track.opacity) as f32, a)
                    .map(|()| a)
                    .map_err(|e| Interrupt::ClipFailed {
                        clip,
                        reason: e.to_string(),
                    })
            });
            ctx.scratch.release(layer);
            area = area.union(composited?);
        }
        Ok(area)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_owned()
    }
}

/// Render `proxy` on the calling thread with a throwaway renderer.
pub fn render_once(proxy: &FrameProxy) -> RenderOutcome {
    let mut renderer = FrameRenderer::sequential(ScratchPoolOpts::default());
    match renderer.render(proxy, &CancelToken::never()) {
        Some(outcome) => outcome,
        // A token that never fires cannot interrupt the render.
        None => RenderOutcome {
            surface: Surface::new(proxy.resolution.width, proxy.resolution.height),
            dirty: IntRect::EMPTY,
            clip_failures: 0,
        },
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
