use std::sync::Arc;

use crate::assets::store::ResourceStore;
use crate::automation::standard::StandardParameters;
use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::proxy::FrameProxy;
use crate::timeline::clip::{Clip, PrepareEnv};
use crate::timeline::notify::{ClipId, ModelEvent, Notifier, SuspendGuard, TrackId};
use crate::timeline::track::Track;

/// Frames a new timeline spans before content extends it.
pub const DEFAULT_MAX_DURATION: u64 = 5000;

/// Root of the composition: ordered tracks, the play head and the shared [`Notifier`].
///
/// Track index 0 is the top track.
#[derive(Debug)]
pub struct Timeline {
    params: Arc<StandardParameters>,
    resolution: Canvas,
    fps: Fps,
    tracks: Vec<Track>,
    play_head: FrameIndex,
    max_duration: u64,
    notifier: Notifier,
}

impl Timeline {
    pub fn new(params: &Arc<StandardParameters>, resolution: Canvas, fps: Fps) -> Self {
        Self {
            params: Arc::clone(params),
            resolution,
            fps,
            tracks: Vec::new(),
            play_head: FrameIndex(0),
            max_duration: DEFAULT_MAX_DURATION,
            notifier: Notifier::new(),
        }
    }

    pub fn params(&self) -> &Arc<StandardParameters> {
        &self.params
    }

    pub fn resolution(&self) -> Canvas {
        self.resolution
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Top track first.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == id)
    }

    /// Add `track` below every existing track.
    pub fn push_track(&mut self, track: Track) -> TrackId {
        self.place_track(self.tracks.len(), track)
    }

    /// Insert at `index`, where 0 is the top.
    pub fn insert_track(&mut self, index: usize, track: Track) -> MontageResult<TrackId> {
        if index > self.tracks.len() {
            return Err(MontageError::structural(format!(
                "track index {index} out of range 0..={}",
                self.tracks.len()
            )));
        }
        Ok(self.place_track(index, track))
    }

    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let i = self.track_index(id)?;
        let mut track = self.tracks.remove(i);
        track.set_notifier(&Notifier::new());
        self.structure_changed();
        Some(track)
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.tracks.iter().find_map(|t| t.clip(id))
    }

    pub fn track_of(&self, id: ClipId) -> Option<TrackId> {
        self.tracks
            .iter()
            .find(|t| t.clip(id).is_some())
            .map(Track::id)
    }

    /// Track matrix then clip matrix. Enclosing composition clips are not included.
    pub fn clip_absolute_matrix(&self, id: ClipId) -> Option<Affine> {
        self.tracks.iter().find_map(|t| t.clip_absolute_matrix(id))
    }

    pub fn play_head(&self) -> FrameIndex {
        self.play_head
    }

    /// Move the play head, clamped to the last frame, and refresh current values there.
    pub fn set_play_head(&mut self, frame: FrameIndex) -> FrameIndex {
        let last = self.max_duration().saturating_sub(1);
        let frame = FrameIndex(frame.0.min(last));
        if frame != self.play_head {
            self.play_head = frame;
            self.notifier.invalidate();
        }
        self.update_automation(frame);
        frame
    }

    /// The larger of the stored duration and the end of the last clip.
    pub fn max_duration(&self) -> u64 {
        self.tracks
            .iter()
            .map(Track::content_end)
            .fold(self.max_duration, u64::max)
    }

    /// Grow the duration to at least `end`. Never shrinks.
    pub fn ensure_duration(&mut self, end: u64) {
        if end > self.max_duration {
            self.max_duration = end;
            self.notifier.mark_modified();
        }
    }

    pub fn update_automation(&mut self, frame: FrameIndex) {
        for track in &mut self.tracks {
            track.update_automation(frame);
        }
    }

    /// Capture everything needed to render `frame`.
    ///
    /// Reads model state only; the returned proxy shares nothing mutable with the timeline.
    #[tracing::instrument(skip(self, store), fields(tracks = self.tracks.len()))]
    pub fn prepare(&self, frame: FrameIndex, store: &ResourceStore) -> FrameProxy {
        let mut skipped = 0;
        let proxy = self.prepare_with(frame, store, &mut skipped);
        if skipped > 0 {
            tracing::warn!(frame = frame.0, skipped, "clips skipped during prepare");
        }
        proxy
    }

    pub(crate) fn prepare_with(
        &self,
        frame: FrameIndex,
        store: &ResourceStore,
        skipped: &mut u32,
    ) -> FrameProxy {
        let env = PrepareEnv {
            fps: self.fps,
            store,
        };
        let before = *skipped;
        let tracks = self
            .tracks
            .iter()
            .rev()
            .filter_map(|t| t.prepare(frame, &env, skipped))
            .collect();
        FrameProxy {
            frame,
            resolution: self.resolution,
            tracks,
            skipped_clips: *skipped - before,
        }
    }

    pub fn drain_events(&self) -> Vec<ModelEvent> {
        self.notifier.drain_events()
    }

    pub fn suspend(&self) -> SuspendGuard {
        self.notifier.suspend()
    }

    pub fn is_modified(&self) -> bool {
        self.notifier.is_modified()
    }

    pub fn clear_modified(&self) {
        self.notifier.clear_modified();
    }

    /// Copy with fresh ids throughout and its own notifier.
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::new(&self.params, self.resolution, self.fps);
        copy.play_head = self.play_head;
        copy.max_duration = self.max_duration;
        for track in &self.tracks {
            let mut t = track.duplicate();
            t.attach(copy.resolution, &copy.notifier);
            copy.tracks.push(t);
        }
        copy
    }

    pub(crate) fn set_notifier(&mut self, notifier: &Notifier) {
        self.notifier = notifier.clone();
        for track in &mut self.tracks {
            track.set_notifier(notifier);
        }
    }

    fn place_track(&mut self, index: usize, mut track: Track) -> TrackId {
        let id = track.id();
        track.attach(self.resolution, &self.notifier);
        track.update_automation(self.play_head);
        self.tracks.insert(index, track);
        self.structure_changed();
        id
    }

    fn structure_changed(&mut self) {
        self.notifier.emit(ModelEvent::StructureChanged);
        self.notifier.mark_modified();
        self.notifier.invalidate();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/timeline.rs"]
mod tests;
