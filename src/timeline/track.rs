use std::cell::OnceCell;
use std::sync::Arc;

use crate::automation::data::AutomationData;
use crate::automation::parameter::{OwnerKind, Parameter};
use crate::automation::sequence::SequenceChange;
use crate::automation::standard::StandardParameters;
use crate::effects::effect::Effect;
use crate::effects::kind::EffectOwnerKind;
use crate::effects::list::EffectList;
use crate::foundation::core::{Affine, Canvas, FrameIndex, Transform2D};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::proxy::TrackProxy;
use crate::timeline::automatable::{Automatable, SequenceEdit};
use crate::timeline::clip::{Clip, ClipPrepare, PrepareEnv};
use crate::timeline::matrix::{CachedMatrix, MatrixCache};
use crate::timeline::notify::{
    ClipId, EffectId, ModelEvent, Notifier, ObjectRef, TrackId, next_object_id,
};
use crate::timeline::span::FrameSpan;

/// `(begin, end, clip index)` sorted by begin.
type RangeIndex = Vec<(u64, u64, usize)>;

/// Ordered clips sharing one transform, opacity and effect chain.
///
/// Track automation uses timeline frames.
#[derive(Debug)]
pub struct Track {
    id: TrackId,
    name: String,
    clips: Vec<Clip>,
    automation: AutomationData,
    effects: EffectList,
    params: Arc<StandardParameters>,
    notifier: Notifier,
    resolution: Canvas,
    eval_frame: i64,
    matrix: MatrixCache,
    ranges: OnceCell<RangeIndex>,
}

impl Track {
    pub fn new(params: &Arc<StandardParameters>, name: impl Into<String>) -> Self {
        Self {
            id: TrackId(next_object_id()),
            name: name.into(),
            clips: Vec::new(),
            automation: AutomationData::new(OwnerKind::Track),
            effects: EffectList::default(),
            params: Arc::clone(params),
            notifier: Notifier::new(),
            resolution: Canvas::default(),
            eval_frame: 0,
            matrix: MatrixCache::default(),
            ranges: OnceCell::new(),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.notifier.mark_modified();
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    /// Mutable access for automation and effect edits. Span and speed go through the track.
    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id() == id)
    }

    /// Clips covering `frame`, in clip list order.
    pub fn clips_at(&self, frame: FrameIndex) -> Vec<&Clip> {
        let ranges = self.ranges.get_or_init(|| {
            let mut ranges: RangeIndex = self
                .clips
                .iter()
                .enumerate()
                .map(|(i, c)| (c.span().begin(), c.span().end(), i))
                .collect();
            ranges.sort_unstable();
            ranges
        });
        let upto = ranges.partition_point(|&(begin, _, _)| begin <= frame.0);
        let mut hits: Vec<usize> = ranges[..upto]
            .iter()
            .filter(|&&(_, end, _)| frame.0 < end)
            .map(|&(_, _, i)| i)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.clips[i]).collect()
    }

    /// Exclusive end of the last clip.
    pub fn content_end(&self) -> u64 {
        self.clips.iter().map(|c| c.span().end()).max().unwrap_or(0)
    }

    /// Append `clip`; it draws above every clip already on the track.
    pub fn insert_clip(&mut self, clip: Clip) -> ClipId {
        self.place_clip(self.clips.len(), clip)
    }

    pub fn insert_clip_at(&mut self, index: usize, clip: Clip) -> MontageResult<ClipId> {
        if index > self.clips.len() {
            return Err(MontageError::structural(format!(
                "clip index {index} out of range 0..={}",
                self.clips.len()
            )));
        }
        Ok(self.place_clip(index, clip))
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Option<Clip> {
        let i = self.clips.iter().position(|c| c.id() == id)?;
        let mut clip = self.clips.remove(i);
        clip.detach();
        self.structure_changed();
        Some(clip)
    }

    /// Returns the span actually stored.
    pub fn set_clip_span(&mut self, id: ClipId, span: FrameSpan) -> MontageResult<FrameSpan> {
        let stored = self.clip_entry(id)?.set_span(span);
        self.ranges.take();
        Ok(stored)
    }

    /// Returns the speed actually stored, clamped into `[MIN_SPEED, MAX_SPEED]`.
    pub fn set_clip_speed(&mut self, id: ClipId, speed: f64) -> MontageResult<f64> {
        let stored = self.clip_entry(id)?.set_playback_speed(speed);
        self.ranges.take();
        Ok(stored)
    }

    pub fn reset_clip_speed(&mut self, id: ClipId) -> MontageResult<f64> {
        self.set_clip_speed(id, 1.0)
    }

    /// Split a clip at timeline `frame`; the right-hand part is inserted after it.
    pub fn split_clip(&mut self, id: ClipId, frame: FrameIndex) -> MontageResult<ClipId> {
        let i = self
            .clips
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| self.missing_clip(id))?;
        let span = self.clips[i].span();
        if frame.0 <= span.begin() || frame.0 >= span.end() {
            return Err(MontageError::structural(format!(
                "split frame {} is not strictly inside [{}, {})",
                frame.0,
                span.begin(),
                span.end()
            )));
        }
        let right = self.clips[i].split_off(frame.0 - span.begin());
        Ok(self.place_clip(i + 1, right))
    }

    pub fn clip_absolute_matrix(&self, id: ClipId) -> Option<Affine> {
        let clip = self.clip(id)?;
        Some(clip.absolute_with(self.id, self.current_matrix()).0)
    }

    /// `None` when the clip is unknown or its absolute matrix is singular.
    pub fn clip_absolute_inverse(&self, id: ClipId) -> Option<Affine> {
        let clip = self.clip(id)?;
        clip.absolute_with(self.id, self.current_matrix()).1
    }

    pub fn matrix(&self) -> Affine {
        self.current_matrix().matrix
    }

    pub fn opacity(&self) -> f64 {
        self.automation
            .value_f64(&self.params.track.opacity, self.eval_frame)
    }

    pub fn is_enabled(&self) -> bool {
        self.automation
            .value_bool(&self.params.track.enabled, self.eval_frame)
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
            ObjectRef::Track(self.id),
            EffectOwnerKind::Track,
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

    /// Copy with fresh ids for the track, its clips and effects, unattached.
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::new(&self.params, self.name.clone());
        copy.automation = self.automation.clone();
        copy.effects = self
            .effects
            .duplicate_for(ObjectRef::Track(copy.id), &copy.notifier);
        copy.resolution = self.resolution;
        copy.eval_frame = self.eval_frame;
        for clip in &self.clips {
            let mut c = clip.duplicate();
            c.attach(copy.id, &copy.notifier);
            copy.clips.push(c);
        }
        copy
    }

    pub(crate) fn attach(&mut self, resolution: Canvas, notifier: &Notifier) {
        if self.resolution != resolution {
            self.resolution = resolution;
            self.matrix.invalidate();
        }
        self.set_notifier(notifier);
    }

    pub(crate) fn set_notifier(&mut self, notifier: &Notifier) {
        self.notifier = notifier.clone();
        self.effects.set_notifier(notifier);
        for clip in &mut self.clips {
            clip.set_notifier(notifier);
        }
    }

    pub(crate) fn update_automation(&mut self, frame: FrameIndex) {
        self.eval_frame = frame.as_i64();
        for clip in &mut self.clips {
            clip.update_automation(frame);
        }
    }

    /// Snapshot for `frame`; `None` when the track is disabled or transparent.
    pub(crate) fn prepare(
        &self,
        frame: FrameIndex,
        env: &PrepareEnv<'_>,
        skipped: &mut u32,
    ) -> Option<TrackProxy> {
        let f = frame.as_i64();
        let p = &self.params.track;
        let opacity = self.automation.value_f64(&p.opacity, f);
        if !self.automation.value_bool(&p.enabled, f) || opacity <= 0.0 {
            return None;
        }

        let mut clips = Vec::new();
        for clip in self.clips_at(frame) {
            match clip.prepare(frame, env, skipped) {
                ClipPrepare::Ready(proxy) => clips.push(proxy),
                ClipPrepare::Hidden => {}
                ClipPrepare::Unavailable => *skipped += 1,
            }
        }

        Some(TrackProxy {
            track: self.id,
            opacity,
            matrix: self.matrix_at(f).matrix,
            effects: self.effects.prepare(f, Some(self.resolution.size())),
            clips,
        })
    }

    fn current_matrix(&self) -> CachedMatrix {
        self.matrix_at(self.eval_frame)
    }

    fn matrix_at(&self, frame: i64) -> CachedMatrix {
        self.matrix.get_or_build(frame, || {
            let p = &self.params.track;
            let a = &self.automation;
            let centre = self.resolution.centre();
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

    fn place_clip(&mut self, index: usize, mut clip: Clip) -> ClipId {
        let id = clip.id();
        clip.attach(self.id, &self.notifier);
        self.clips.insert(index, clip);
        self.structure_changed();
        id
    }

    fn clip_entry(&mut self, id: ClipId) -> MontageResult<&mut Clip> {
        let track = self.id;
        self.clips
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| MontageError::structural(format!("clip {id:?} is not on track {track:?}")))
    }

    fn missing_clip(&self, id: ClipId) -> MontageError {
        MontageError::structural(format!("clip {id:?} is not on track {:?}", self.id))
    }

    fn structure_changed(&mut self) {
        self.ranges.take();
        self.notifier.emit(ModelEvent::StructureChanged);
        self.notifier.mark_modified();
        self.notifier.invalidate();
    }
}

impl Automatable for Track {
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
            owner: ObjectRef::Track(self.id),
            key: param.key().clone(),
            change,
        });
        if self.params.track.affects_matrix(param) && self.matrix.invalidate() {
            // Every clip's absolute matrix depends on this one.
            for clip in &self.clips {
                self.notifier
                    .emit(ModelEvent::MatrixInvalidated { clip: clip.id() });
            }
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

#[cfg(test)]
#[path = "../../tests/unit/timeline/track.rs"]
mod tests;
