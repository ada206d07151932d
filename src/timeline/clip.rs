use std::cell::Cell;
use std::sync::Arc;

use crate::assets::store::{ResourceId, ResourceStore};
use crate::automation::data::AutomationData;
use crate::automation::parameter::{OwnerKind, Parameter};
use crate::automation::sequence::SequenceChange;
use crate::automation::standard::StandardParameters;
use crate::effects::effect::Effect;
use crate::effects::kind::EffectOwnerKind;
use crate::effects::list::EffectList;
use crate::foundation::core::{Affine, Fps, FrameIndex, Rgba8Premul, Transform2D, Vec2};
use crate::foundation::error::MontageResult;
use crate::foundation::math::opacity_to_byte;
use crate::render::proxy::{ClipProxy, ContentProxy};
use crate::timeline::automatable::{Automatable, SequenceEdit};
use crate::timeline::matrix::{CachedMatrix, MatrixCache};
use crate::timeline::notify::{ClipId, EffectId, ModelEvent, Notifier, ObjectRef, TrackId, next_object_id};
use crate::timeline::span::FrameSpan;
use crate::timeline::timeline::Timeline;

pub const MIN_SPEED: f64 = 0.01;
pub const MAX_SPEED: f64 = 100.0;

/// What a clip draws.
#[derive(Debug)]
pub enum ClipSource {
    /// Solid rectangle with its top-left at the local origin.
    Shape { size: Vec2, color: Rgba8Premul },
    /// Media sampled at `(relative + frame_offset) * speed / fps` seconds.
    Media {
        resource: ResourceId,
        frame_offset: i64,
    },
    /// Nested timeline drawn in the clip's local space.
    Composition {
        timeline: Box<Timeline>,
        frame_offset: i64,
    },
}

impl ClipSource {
    pub fn shape(size: Vec2, color: Rgba8Premul) -> Self {
        Self::Shape { size, color }
    }

    pub fn media(resource: ResourceId) -> Self {
        Self::Media {
            resource,
            frame_offset: 0,
        }
    }

    pub fn composition(timeline: Timeline) -> Self {
        Self::Composition {
            timeline: Box::new(timeline),
            frame_offset: 0,
        }
    }

    fn duplicate(&self) -> Self {
        match self {
            Self::Shape { size, color } => Self::Shape {
                size: *size,
                color: *color,
            },
            Self::Media {
                resource,
                frame_offset,
            } => Self::Media {
                resource: *resource,
                frame_offset: *frame_offset,
            },
            Self::Composition {
                timeline,
                frame_offset,
            } => Self::Composition {
                timeline: Box::new(timeline.duplicate()),
                frame_offset: *frame_offset,
            },
        }
    }

    fn shift(&mut self, frames: i64) {
        match self {
            Self::Shape { .. } => {}
            Self::Media { frame_offset, .. } | Self::Composition { frame_offset, .. } => {
                *frame_offset = frame_offset.saturating_add(frames);
            }
        }
    }
}

/// Inputs shared by every clip prepared for one frame.
pub(crate) struct PrepareEnv<'a> {
    pub(crate) fps: Fps,
    pub(crate) store: &'a ResourceStore,
}

/// Outcome of preparing one clip.
#[derive(Debug)]
pub(crate) enum ClipPrepare {
    Ready(ClipProxy),
    /// Outside its span, hidden, or fully transparent.
    Hidden,
    /// Could not resolve what it draws; skipped for this frame.
    Unavailable,
}

/// A source placed on a track over a [`FrameSpan`].
///
/// Clip automation and effects use clip-relative frames: frame 0 is the span's begin.
#[derive(Debug)]
pub struct Clip {
    id: ClipId,
    span: FrameSpan,
    /// Duration the span would have at speed 1.
    base_duration: u64,
    speed: f64,
    source: ClipSource,
    automation: AutomationData,
    effects: EffectList,
    params: Arc<StandardParameters>,
    track: Option<TrackId>,
    notifier: Notifier,
    eval_frame: i64,
    media_size: Cell<Option<Vec2>>,
    local: MatrixCache,
    absolute: Cell<Option<AbsoluteMatrix>>,
}

#[derive(Clone, Copy, Debug)]
struct AbsoluteMatrix {
    track: TrackId,
    track_version: u64,
    local_version: u64,
    matrix: Affine,
    inverse: Option<Affine>,
}

impl Clip {
    pub fn new(params: &Arc<StandardParameters>, span: FrameSpan, source: ClipSource) -> Self {
        Self {
            id: ClipId(next_object_id()),
            span,
            base_duration: span.duration(),
            speed: 1.0,
            source,
            automation: AutomationData::new(OwnerKind::Clip),
            effects: EffectList::default(),
            params: Arc::clone(params),
            track: None,
            notifier: Notifier::new(),
            eval_frame: 0,
            media_size: Cell::new(None),
            local: MatrixCache::default(),
            absolute: Cell::new(None),
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn span(&self) -> FrameSpan {
        self.span
    }

    pub fn track(&self) -> Option<TrackId> {
        self.track
    }

    pub fn source(&self) -> &ClipSource {
        &self.source
    }

    pub fn params(&self) -> &StandardParameters {
        &self.params
    }

    /// Nested timeline of a composition clip.
    pub fn composition(&self) -> Option<&Timeline> {
        match &self.source {
            ClipSource::Composition { timeline, .. } => Some(timeline),
            _ => None,
        }
    }

    pub fn composition_mut(&mut self) -> Option<&mut Timeline> {
        match &mut self.source {
            ClipSource::Composition { timeline, .. } => Some(timeline),
            _ => None,
        }
    }

    pub fn playback_speed(&self) -> f64 {
        self.speed
    }

    /// The span this clip has at speed 1.
    pub fn base_span(&self) -> FrameSpan {
        self.span.with_duration(self.base_duration)
    }

    /// Set the speed before the clip is placed on a track.
    pub fn with_playback_speed(mut self, speed: f64) -> Self {
        self.set_playback_speed(speed);
        self
    }

    /// Map a timeline frame into this clip, reporting whether it falls inside the span.
    pub fn timeline_to_relative(&self, frame: FrameIndex) -> (i64, bool) {
        let rel = frame.as_i64() - self.span.begin() as i64;
        (rel, self.span.contains(frame))
    }

    pub fn relative_to_timeline(&self, relative: i64) -> FrameIndex {
        FrameIndex::from_i64_clamped((self.span.begin() as i64).saturating_add(relative))
    }

    /// Clip-relative frame the current values are evaluated at.
    pub fn eval_frame(&self) -> i64 {
        self.eval_frame
    }

    pub fn opacity(&self) -> f64 {
        self.automation
            .value_f64(&self.params.clip.opacity, self.eval_frame)
    }

    pub fn is_visible(&self) -> bool {
        self.automation
            .value_bool(&self.params.clip.visible, self.eval_frame)
    }

    pub fn is_effectively_visible(&self) -> bool {
        self.is_visible() && self.opacity() > 0.0
    }

    /// Local content size: shape size, nested resolution, or the last seen media size.
    pub fn content_size(&self) -> Option<Vec2> {
        match &self.source {
            ClipSource::Shape { size, .. } => Some(*size),
            ClipSource::Media { .. } => self.media_size.get(),
            ClipSource::Composition { timeline, .. } => Some(timeline.resolution().size()),
        }
    }

    pub fn is_matrix_dirty(&self) -> bool {
        !self.local.is_valid_at(self.eval_frame)
    }

    /// Local matrix at the current evaluation frame.
    pub fn local_matrix(&self) -> Affine {
        self.local_at(self.eval_frame).matrix
    }

    pub fn local_inverse(&self) -> Option<Affine> {
        self.local_at(self.eval_frame).inverse
    }

    #[cfg(test)]
    pub(crate) fn matrix_builds(&self) -> u64 {
        self.local.builds()
    }

    pub fn effects(&self) -> &EffectList {
        &self.effects
    }

    pub fn effect_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.effects.get_mut(id)
    }

    pub fn insert_effect(&mut self, index: usize, effect: Effect) -> MontageResult<EffectId> {
        let id = effect.id();
        self.effects.insert(
            index,
            effect,
            ObjectRef::Clip(self.id),
            EffectOwnerKind::Clip,
            &self.notifier,
        )?;
        self.notifier.mark_modified();
        Ok(id)
    }

    pub fn push_effect(&mut self, effect: Effect) -> MontageResult<EffectId> {
        self.insert_effect(self.effects.len(), effect)
    }

    pub fn remove_effect(&mut self, id: EffectId) -> Option<Effect> {
        let removed = self.effects.remove(id, &self.notifier);
        if removed.is_some() {
            self.notifier.mark_modified();
        }
        removed
    }

    pub fn move_effect(&mut self, from: usize, to: usize) -> MontageResult<()> {
        self.effects.move_effect(from, to, &self.notifier)?;
        self.notifier.mark_modified();
        Ok(())
    }

    /// Copy with fresh ids for the clip and its effects, unattached.
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::new(&self.params, self.span, self.source.duplicate());
        copy.base_duration = self.base_duration;
        copy.speed = self.speed;
        copy.automation = self.automation.clone();
        copy.effects = self
            .effects
            .duplicate_for(ObjectRef::Clip(copy.id), &copy.notifier);
        copy.eval_frame = self.eval_frame;
        copy.media_size.set(self.media_size.get());
        copy
    }

    pub(crate) fn attach(&mut self, track: TrackId, notifier: &Notifier) {
        self.set_notifier(notifier);
        if self.track != Some(track) {
            self.track = Some(track);
            self.invalidate_matrix();
        }
    }

    pub(crate) fn detach(&mut self) {
        self.track = None;
        self.set_notifier(&Notifier::new());
        self.absolute.set(None);
    }

    pub(crate) fn set_notifier(&mut self, notifier: &Notifier) {
        self.notifier = notifier.clone();
        self.effects.set_notifier(notifier);
        if let ClipSource::Composition { timeline, .. } = &mut self.source {
            timeline.set_notifier(notifier);
        }
    }

    /// Store a new span. While a speed is applied the base duration moves by the same delta.
    pub(crate) fn set_span(&mut self, span: FrameSpan) -> FrameSpan {
        if span == self.span {
            return span;
        }
        if self.speed == 1.0 {
            self.base_duration = span.duration();
        } else {
            let delta = span.duration() as i64 - self.span.duration() as i64;
            self.base_duration = (self.base_duration as i64).saturating_add(delta).max(1) as u64;
        }
        self.span = span;
        self.span_changed();
        span
    }

    /// Clamp `speed` into `[MIN_SPEED, MAX_SPEED]` and rescale the duration, keeping `begin`.
    /// Returns the stored speed.
    pub(crate) fn set_playback_speed(&mut self, speed: f64) -> f64 {
        let speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        if speed == self.speed {
            return speed;
        }
        self.speed = speed;
        let duration = if speed == 1.0 {
            self.base_duration
        } else {
            ((self.base_duration as f64 / speed).floor() as u64).max(1)
        };
        self.span = self.span.with_duration(duration);
        self.span_changed();
        speed
    }

    /// Cut at `relative` and return the right-hand part as a new clip.
    ///
    /// The caller guarantees `0 < relative < duration`.
    pub(crate) fn split_off(&mut self, relative: u64) -> Self {
        let mut right = self.duplicate();
        let right_duration = self.span.duration() - relative;
        right.span = FrameSpan::new(self.span.begin() + relative, right_duration);
        right.automation.rebase(relative);
        right.effects.rebase_automation(relative);
        right.source.shift(relative as i64);
        right.eval_frame = self.eval_frame - relative as i64;

        self.span = self.span.with_duration(relative);
        if self.speed == 1.0 {
            self.base_duration = relative;
            right.base_duration = right_duration;
        } else {
            self.base_duration = ((relative as f64 * self.speed).round() as u64).max(1);
            right.base_duration = ((right_duration as f64 * self.speed).round() as u64).max(1);
        }
        self.span_changed();
        right
    }

    /// Move the evaluation point to the clip-relative position of `frame`.
    pub(crate) fn update_automation(&mut self, frame: FrameIndex) {
        let (rel, _) = self.timeline_to_relative(frame);
        let speed = self.speed;
        if let ClipSource::Composition {
            timeline,
            frame_offset,
        } = &mut self.source
        {
            timeline.update_automation(nested_frame(rel, *frame_offset, speed));
        }
        if rel == self.eval_frame {
            return;
        }
        self.eval_frame = rel;
        if self.local.is_valid_at(rel) {
            return;
        }
        // Automated matrices change with the evaluation frame.
        self.invalidate_matrix();
    }

    /// Absolute matrix and inverse given the owning track's matrix.
    pub(crate) fn absolute_with(&self, track: TrackId, track_matrix: CachedMatrix) -> (Affine, Option<Affine>) {
        let local = self.local_at(self.eval_frame);
        if let Some(abs) = self.absolute.get()
            && abs.track == track
            && abs.track_version == track_matrix.version
            && abs.local_version == local.version
        {
            return (abs.matrix, abs.inverse);
        }
        let matrix = track_matrix.matrix * local.matrix;
        let inverse = match (local.inverse, track_matrix.inverse) {
            (Some(l), Some(t)) => Some(l * t),
            _ => None,
        };
        self.absolute.set(Some(AbsoluteMatrix {
            track,
            track_version: track_matrix.version,
            local_version: local.version,
            matrix,
            inverse,
        }));
        (matrix, inverse)
    }

    pub(crate) fn prepare(&self, frame: FrameIndex, env: &PrepareEnv<'_>, skipped: &mut u32) -> ClipPrepare {
        let (rel, in_range) = self.timeline_to_relative(frame);
        if !in_range {
            return ClipPrepare::Hidden;
        }
        let p = &self.params.clip;
        let opacity = self.automation.value_f64(&p.opacity, rel);
        if !self.automation.value_bool(&p.visible, rel) || opacity <= 0.0 {
            return ClipPrepare::Hidden;
        }

        let content = match &self.source {
            ClipSource::Shape { size, color } => ContentProxy::Shape {
                size: *size,
                color: *color,
            },
            ClipSource::Media {
                resource,
                frame_offset,
            } => {
                let Some(source) = env.store.resolve(*resource) else {
                    tracing::warn!(clip = self.id.0, resource = resource.0, "media resource missing");
                    return ClipPrepare::Unavailable;
                };
                self.note_media_size(source.size());
                let frames = rel.saturating_add(*frame_offset) as f64 * self.speed;
                ContentProxy::Media {
                    source,
                    timestamp_secs: env.fps.frames_to_secs(frames),
                }
            }
            ClipSource::Composition {
                timeline,
                frame_offset,
            } => {
                let proxy = timeline.prepare_with(
                    nested_frame(rel, *frame_offset, self.speed),
                    env.store,
                    skipped,
                );
                ContentProxy::Composition(Box::new(proxy))
            }
        };

        ClipPrepare::Ready(ClipProxy {
            clip: self.id,
            opacity: opacity_to_byte(opacity),
            matrix: self.local_at(rel).matrix,
            content,
            effects: self.effects.prepare(rel, self.content_size()),
        })
    }

    fn local_at(&self, frame: i64) -> CachedMatrix {
        self.local.get_or_build(frame, || {
            let p = &self.params.clip;
            let a = &self.automation;
            let centre = self.content_size().map(|s| s / 2.0).unwrap_or(Vec2::ZERO);
            let scale_origin = if a.value_bool(&p.auto_scale_origin, frame) {
                centre
            } else {
                a.value_vec2(&p.scale_origin, frame)
            };
            let rotation_origin = if a.value_bool(&p.auto_rotation_origin, frame) {
                centre
            } else {
                a.value_vec2(&p.rotation_origin, frame)
            };
            let t = Transform2D {
                position: a.value_vec2(&p.position, frame),
                scale: a.value_vec2(&p.scale, frame),
                scale_origin,
                rotation_deg: a.value_f64(&p.rotation, frame),
                rotation_origin,
            };
            let varies = [
                &p.position,
                &p.scale,
                &p.scale_origin,
                &p.rotation,
                &p.rotation_origin,
                &p.auto_scale_origin,
                &p.auto_rotation_origin,
            ]
            .into_iter()
            .any(|param| a.is_automated(param));
            (t.to_affine(), varies)
        })
    }

    fn note_media_size(&self, size: Option<(u32, u32)>) {
        let size = size.map(|(w, h)| Vec2::new(f64::from(w), f64::from(h)));
        if self.media_size.get() != size {
            self.media_size.set(size);
            self.invalidate_matrix();
        }
    }

    /// Emits `MatrixInvalidated` only when a cached matrix was actually dropped.
    fn invalidate_matrix(&self) {
        let had_local = self.local.invalidate();
        let had_absolute = self.absolute.take().is_some();
        if had_local || had_absolute {
            self.notifier
                .emit(ModelEvent::MatrixInvalidated { clip: self.id });
        }
    }

    fn span_changed(&mut self) {
        self.notifier.emit(ModelEvent::SpanChanged { clip: self.id });
        self.notifier.mark_modified();
        self.notifier.invalidate();
    }
}

impl Automatable for Clip {
    fn automation(&self) -> &AutomationData {
        &self.automation
    }

    fn edit_sequence(
        &mut self,
        param: &Parameter,
        edit: SequenceEdit<'_>,
    ) -> MontageResult<SequenceChange> {
        let change = edit(self.automation.sequence_mut(param)?)?;
        if !change.is_change() {
            return Ok(change);
        }
        self.notifier.emit(ModelEvent::ParameterChanged {
            owner: ObjectRef::Clip(self.id),
            key: param.key().clone(),
            change,
        });
        if self.params.clip.affects_matrix(param) {
            self.invalidate_matrix();
        }
        let flags = param.flags();
        if flags.modifies_project {
            self.notifier.mark_modified();
        }
        if flags.affects_render {
            self.notifier.invalidate();
        }
        Ok(change)
    }
}

/// Frame of a nested timeline shown at clip-relative frame `rel`.
fn nested_frame(rel: i64, frame_offset: i64, speed: f64) -> FrameIndex {
    let nested = (rel.saturating_add(frame_offset) as f64 * speed).floor();
    FrameIndex::from_i64_clamped(nested as i64)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/clip.rs"]
mod tests;
