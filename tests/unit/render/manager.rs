use super::*;
use crate::assets::source::{Bitmap, MediaSource, ResourceFrame};
use crate::automation::standard::StandardParameters;
use crate::foundation::core::{Canvas, Fps, Rgba8Premul, Vec2};
use crate::timeline::automatable::Automatable;
use crate::timeline::clip::{Clip, ClipSource};
use crate::timeline::notify::ClipId;
use crate::timeline::span::FrameSpan;
use crate::timeline::track::Track;

const WAIT: Duration = Duration::from_secs(10);

struct Fixture {
    params: Arc<StandardParameters>,
    timeline: Timeline,
    track: crate::timeline::notify::TrackId,
    clip: ClipId,
}

fn fixture() -> Fixture {
    let params = StandardParameters::with_fresh_registry().unwrap().1;
    let mut timeline = Timeline::new(&params, Canvas { width: 32, height: 32 }, Fps::default());
    let mut track = Track::new(&params, "V1");
    let clip = track.insert_clip(Clip::new(
        &params,
        FrameSpan::new(0, 100),
        ClipSource::shape(Vec2::new(8.0, 8.0), Rgba8Premul::from_straight_rgba(255, 0, 0, 255)),
    ));
    let track = timeline.push_track(track);
    Fixture {
        params,
        timeline,
        track,
        clip,
    }
}

fn manager(opts: RenderManagerOpts) -> RenderManager {
    RenderManager::new(opts, ScratchPoolOpts::default(), Arc::new(ResourceStore::new())).unwrap()
}

fn move_clip(fx: &mut Fixture, x: f64) {
    let position = fx.params.clip.position.clone();
    fx.timeline
        .track_mut(fx.track)
        .unwrap()
        .clip_mut(fx.clip)
        .unwrap()
        .set_value(&position, 0, Vec2::new(x, 0.0))
        .unwrap();
}

#[test]
fn frames_outside_the_duration_are_rejected() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts::default());
    let max = fx.timeline.max_duration();
    let err = mgr.request_frame(&mut fx.timeline, FrameIndex(max)).unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
    assert_eq!(mgr.stats().prepared, 0);
}

#[test]
fn many_edits_coalesce_into_one_dispatch() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts::default());
    for x in 0..20 {
        move_clip(&mut fx, f64::from(x));
    }
    let generation = mgr.tick(&mut fx.timeline).unwrap();
    assert_eq!(generation, Some(1));
    assert_eq!(mgr.tick(&mut fx.timeline).unwrap(), None);
    assert_eq!(mgr.stats().dispatched, 1);

    let frame = mgr.recv_frame_timeout(WAIT).unwrap();
    assert_eq!(frame.request, 1);
    assert_eq!(frame.frame, FrameIndex(0));
    // Last edit wins: the square sits at x = 19.
    assert_eq!(frame.surface.pixel(19, 0), [255, 0, 0, 255]);
    assert_eq!(frame.dirty, IntRect::new(19, 0, 27, 8));
}

#[test]
fn suspended_tick_keeps_the_model_dirty() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts::default());
    let guard = fx.timeline.suspend();
    move_clip(&mut fx, 3.0);
    assert_eq!(mgr.tick(&mut fx.timeline).unwrap(), None);
    assert!(fx.timeline.notifier().is_dirty());
    drop(guard);
    assert!(mgr.tick(&mut fx.timeline).unwrap().is_some());
}

#[test]
fn dispatch_interval_defers_without_losing_the_edit() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts {
        min_dispatch_interval_ms: 60_000,
        ..RenderManagerOpts::default()
    });
    assert!(mgr.tick(&mut fx.timeline).unwrap().is_some());
    move_clip(&mut fx, 2.0);
    assert_eq!(mgr.tick(&mut fx.timeline).unwrap(), None);
    assert!(fx.timeline.notifier().is_dirty());
    assert_eq!(mgr.stats().dispatched, 1);
}

#[test]
fn generations_increase_and_cancel_waits_for_idle() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts::default());
    let a = mgr.request_frame(&mut fx.timeline, FrameIndex(0)).unwrap();
    let b = mgr.request_frame(&mut fx.timeline, FrameIndex(1)).unwrap();
    let c = mgr.request_frame(&mut fx.timeline, FrameIndex(2)).unwrap();
    assert!(a < b && b < c);
    assert_eq!(mgr.latest_request(), c);

    mgr.cancel_and_wait();
    assert_eq!(mgr.pending(), 0);
    assert!(mgr.latest_request() > c);

    let stats = mgr.stats();
    assert_eq!(stats.prepared, 3);
    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.published + stats.cancelled, 3);

    // Whatever was published before the cancel is older than every later request.
    let mut last = 0;
    while let Ok(frame) = mgr.frame_rx.try_recv() {
        assert!(frame.request > last);
        last = frame.request;
    }
}

#[test]
fn published_frames_announce_the_latest_request() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts::default());
    let generation = mgr.request_frame(&mut fx.timeline, FrameIndex(5)).unwrap();
    assert!(mgr.wait_idle(WAIT));
    let frame = mgr.try_recv_frame().unwrap();
    assert_eq!(frame.request, generation);
    assert_eq!(frame.frame, FrameIndex(5));
    assert_eq!(mgr.state(), RenderPhase::Published);
    let stats = mgr.stats();
    assert_eq!(stats.published, 1);
    assert!(stats.average_render_ms >= 0.0);
}

#[test]
fn full_channel_does_not_block_a_newer_request() {
    let mut fx = fixture();
    let mut mgr = manager(RenderManagerOpts {
        channel_capacity: 1,
        ..RenderManagerOpts::default()
    });
    mgr.request_frame(&mut fx.timeline, FrameIndex(0)).unwrap();
    assert!(mgr.wait_idle(WAIT));
    // The channel is now full; this frame waits for the UI until superseded.
    mgr.request_frame(&mut fx.timeline, FrameIndex(1)).unwrap();
    let last = mgr.request_frame(&mut fx.timeline, FrameIndex(2)).unwrap();
    let first = mgr.frame_rx.recv_timeout(WAIT).unwrap();
    assert!(first.request < last);
    assert!(mgr.wait_idle(WAIT));
    assert_eq!(mgr.try_recv_frame().unwrap().request, last);
}

#[test]
fn zero_threads_fail_construction() {
    let err = RenderManager::new(
        RenderManagerOpts {
            parallel_tracks: true,
            threads: Some(0),
            ..RenderManagerOpts::default()
        },
        ScratchPoolOpts::default(),
        Arc::new(ResourceStore::new()),
    )
    .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
}

/// Media whose every `frame_at` call blocks until the test hands out a permit.
#[derive(Debug, Default)]
struct Gate {
    state: Mutex<(usize, usize)>,
    changed: Condvar,
}

impl Gate {
    fn entered(&self) -> usize {
        self.state.lock().0
    }

    fn release_one(&self) {
        self.state.lock().1 += 1;
        self.changed.notify_all();
    }

    fn wait_entered(&self, n: usize) {
        let deadline = Instant::now() + WAIT;
        let mut st = self.state.lock();
        while st.0 < n {
            assert!(!self.changed.wait_until(&mut st, deadline).timed_out(), "render never reached the source");
        }
    }
}

impl MediaSource for Gate {
    fn size(&self) -> Option<(u32, u32)> {
        Some((4, 4))
    }

    fn frame_at(&self, _timestamp_secs: f64) -> ResourceFrame {
        let mut st = self.state.lock();
        st.0 += 1;
        self.changed.notify_all();
        while st.1 == 0 {
            self.changed.wait(&mut st);
        }
        st.1 -= 1;
        let green = Rgba8Premul::from_straight_rgba(0, 255, 0, 255);
        ResourceFrame::Ready(Arc::new(Bitmap::solid(4, 4, green)))
    }
}

fn gated() -> (Timeline, Arc<Gate>, RenderManager) {
    let params = StandardParameters::with_fresh_registry().unwrap().1;
    let mut timeline = Timeline::new(&params, Canvas { width: 8, height: 8 }, Fps::default());
    let store = Arc::new(ResourceStore::new());
    let gate = Arc::new(Gate::default());
    let id = store.insert(Arc::clone(&gate) as Arc<dyn MediaSource>);
    let mut track = Track::new(&params, "V1");
    track.insert_clip(Clip::new(&params, FrameSpan::new(0, 100), ClipSource::media(id)));
    timeline.push_track(track);
    let mgr = RenderManager::new(RenderManagerOpts::default(), ScratchPoolOpts::default(), store).unwrap();
    (timeline, gate, mgr)
}

#[test]
fn superseded_render_does_not_overwrite_the_newer_phase() {
    let (mut timeline, gate, mut mgr) = gated();
    mgr.request_frame(&mut timeline, FrameIndex(0)).unwrap();
    gate.wait_entered(1);
    assert_eq!(mgr.state(), RenderPhase::Rendering);

    let newer = mgr.request_frame(&mut timeline, FrameIndex(1)).unwrap();
    // The first render finishes as cancelled while the second one is already current.
    gate.release_one();
    gate.wait_entered(2);
    assert_eq!(mgr.stats().cancelled, 1);
    assert_eq!(mgr.state(), RenderPhase::Rendering);

    gate.release_one();
    assert!(mgr.wait_idle(WAIT));
    assert_eq!(mgr.state(), RenderPhase::Published);
    assert_eq!(mgr.try_recv_frame().unwrap().request, newer);
}

#[test]
fn cancel_moves_a_rendering_request_to_cancelled() {
    let (mut timeline, gate, mut mgr) = gated();
    let request = mgr.request_frame(&mut timeline, FrameIndex(0)).unwrap();
    gate.wait_entered(1);
    assert_eq!(mgr.state(), RenderPhase::Rendering);

    let latest = Arc::clone(&mgr.latest);
    std::thread::scope(|s| {
        s.spawn(|| {
            // Let the render go only once the cancel has been issued.
            while latest.load(Ordering::Acquire) == request {
                std::thread::sleep(Duration::from_millis(1));
            }
            gate.release_one();
        });
        mgr.cancel_and_wait();
    });
    assert_eq!(mgr.state(), RenderPhase::Cancelled);
    assert_eq!(gate.entered(), 1);
    assert!(mgr.try_recv_frame().is_none());
    assert_eq!(mgr.stats().cancelled, 1);
}
