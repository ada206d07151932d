use super::*;
use crate::foundation::core::{Rgba8Premul, Vec2};
use crate::render::proxy::ContentProxy;
use crate::timeline::automatable::Automatable;
use crate::timeline::clip::ClipSource;
use crate::timeline::span::FrameSpan;

fn params() -> Arc<StandardParameters> {
    StandardParameters::with_fresh_registry().unwrap().1
}

fn timeline(p: &Arc<StandardParameters>) -> Timeline {
    Timeline::new(p, Canvas { width: 64, height: 36 }, Fps::default())
}

fn square(p: &Arc<StandardParameters>, begin: u64, duration: u64) -> Clip {
    Clip::new(
        p,
        FrameSpan::new(begin, duration),
        ClipSource::shape(Vec2::new(8.0, 8.0), Rgba8Premul::from_straight_rgba(255, 0, 0, 255)),
    )
}

#[test]
fn play_head_clamps_to_last_frame() {
    let p = params();
    let mut tl = timeline(&p);
    assert_eq!(tl.set_play_head(FrameIndex(10)), FrameIndex(10));
    assert!(tl.notifier().take_dirty());
    assert_eq!(
        tl.set_play_head(FrameIndex(1_000_000)),
        FrameIndex(DEFAULT_MAX_DURATION - 1)
    );

    // Same frame again is not a change.
    tl.notifier().take_dirty();
    tl.set_play_head(FrameIndex(1_000_000));
    assert!(!tl.notifier().is_dirty());
}

#[test]
fn duration_extends_with_content_and_never_shrinks() {
    let p = params();
    let mut tl = timeline(&p);
    let mut track = Track::new(&p, "V1");
    track.insert_clip(square(&p, 4_990, 100));
    tl.push_track(track);
    assert_eq!(tl.max_duration(), 5_090);

    tl.ensure_duration(8_000);
    tl.ensure_duration(10);
    assert_eq!(tl.max_duration(), 8_000);
}

#[test]
fn track_order_and_structure_events() {
    let p = params();
    let mut tl = timeline(&p);
    let bottom = tl.push_track(Track::new(&p, "bottom"));
    let top = tl.insert_track(0, Track::new(&p, "top")).unwrap();
    assert_eq!(tl.track_index(top), Some(0));
    assert_eq!(tl.track_index(bottom), Some(1));
    assert!(tl.insert_track(5, Track::new(&p, "x")).unwrap_err().is_structural());
    assert!(tl.drain_events().contains(&ModelEvent::StructureChanged));
    assert!(tl.is_modified());
    tl.clear_modified();

    let removed = tl.remove_track(top).unwrap();
    assert_eq!(removed.name(), "top");
    assert_eq!(tl.tracks().len(), 1);
    assert!(tl.is_modified());
}

#[test]
fn edits_through_the_tree_share_one_notifier() {
    let p = params();
    let mut tl = timeline(&p);
    let track = tl.push_track(Track::new(&p, "V1"));
    let clip = tl
        .track_mut(track)
        .unwrap()
        .insert_clip(square(&p, 0, 10));
    assert_eq!(tl.track_of(clip), Some(track));
    tl.notifier().take_dirty();
    tl.drain_events();

    let opacity = p.clip.opacity.clone();
    tl.track_mut(track)
        .unwrap()
        .clip_mut(clip)
        .unwrap()
        .set_value(&opacity, 0, 0.25)
        .unwrap();
    assert!(tl.notifier().take_dirty());
    assert!(matches!(
        tl.drain_events().as_slice(),
        [ModelEvent::ParameterChanged { .. }]
    ));
    assert_eq!(tl.clip(clip).unwrap().opacity(), 0.25);
}

#[test]
fn suspension_holds_back_the_dirty_flag() {
    let p = params();
    let mut tl = timeline(&p);
    let guard = tl.suspend();
    tl.push_track(Track::new(&p, "V1"));
    assert!(!tl.notifier().take_dirty());
    drop(guard);
    assert!(tl.notifier().take_dirty());
}

#[test]
fn prepare_orders_tracks_bottom_first() {
    let p = params();
    let mut tl = timeline(&p);
    let mut top = Track::new(&p, "top");
    top.insert_clip(square(&p, 0, 10));
    let mut bottom = Track::new(&p, "bottom");
    bottom.insert_clip(square(&p, 5, 10));
    let top = tl.push_track(top);
    let bottom = tl.push_track(bottom);

    let store = ResourceStore::new();
    let proxy = tl.prepare(FrameIndex(7), &store);
    assert_eq!(proxy.frame, FrameIndex(7));
    let order: Vec<TrackId> = proxy.tracks.iter().map(|t| t.track).collect();
    assert_eq!(order, vec![bottom, top]);
    assert_eq!(proxy.clip_count(), 2);

    let proxy = tl.prepare(FrameIndex(12), &store);
    assert_eq!(proxy.clip_count(), 1);
}

#[test]
fn missing_media_is_counted_as_skipped() {
    let p = params();
    let mut tl = timeline(&p);
    let mut track = Track::new(&p, "V1");
    track.insert_clip(Clip::new(
        &p,
        FrameSpan::new(0, 10),
        ClipSource::media(crate::assets::store::ResourceId(404)),
    ));
    tl.push_track(track);
    let proxy = tl.prepare(FrameIndex(0), &ResourceStore::new());
    assert_eq!(proxy.skipped_clips, 1);
    assert_eq!(proxy.clip_count(), 0);
}

#[test]
fn nested_timeline_prepares_at_scaled_frame() {
    let p = params();
    let mut inner = Timeline::new(&p, Canvas { width: 16, height: 16 }, Fps::default());
    let mut inner_track = Track::new(&p, "inner");
    inner_track.insert_clip(square(&p, 0, 100));
    inner.push_track(inner_track);

    let mut tl = timeline(&p);
    let mut track = Track::new(&p, "V1");
    let comp = Clip::new(&p, FrameSpan::new(10, 40), ClipSource::composition(inner))
        .with_playback_speed(2.0);
    let comp = track.insert_clip(comp);
    tl.push_track(track);

    let proxy = tl.prepare(FrameIndex(13), &ResourceStore::new());
    let clip = &proxy.tracks[0].clips[0];
    assert_eq!(clip.clip, comp);
    let ContentProxy::Composition(nested) = &clip.content else {
        panic!("expected a composition proxy");
    };
    assert_eq!(nested.frame, FrameIndex(6));
    assert_eq!(nested.resolution, Canvas { width: 16, height: 16 });
    assert_eq!(nested.clip_count(), 1);
}

#[test]
fn nested_edits_dirty_the_outer_timeline() {
    let p = params();
    let inner = Timeline::new(&p, Canvas { width: 16, height: 16 }, Fps::default());
    let mut tl = timeline(&p);
    let track = tl.push_track(Track::new(&p, "V1"));
    let comp = tl
        .track_mut(track)
        .unwrap()
        .insert_clip(Clip::new(&p, FrameSpan::new(0, 10), ClipSource::composition(inner)));
    tl.notifier().take_dirty();

    tl.track_mut(track)
        .unwrap()
        .clip_mut(comp)
        .unwrap()
        .composition_mut()
        .unwrap()
        .push_track(Track::new(&p, "inner"));
    assert!(tl.notifier().take_dirty());
}

#[test]
fn proxy_is_unaffected_by_later_edits() {
    let p = params();
    let mut tl = timeline(&p);
    let track = tl.push_track(Track::new(&p, "V1"));
    let clip = tl
        .track_mut(track)
        .unwrap()
        .insert_clip(square(&p, 0, 10));
    let proxy = tl.prepare(FrameIndex(0), &ResourceStore::new());

    let position = p.clip.position.clone();
    tl.track_mut(track)
        .unwrap()
        .clip_mut(clip)
        .unwrap()
        .set_value(&position, 0, Vec2::new(20.0, 0.0))
        .unwrap();
    assert_eq!(proxy.tracks[0].clips[0].matrix, Affine::IDENTITY);
    assert_eq!(
        tl.clip_absolute_matrix(clip),
        Some(Affine::translate((20.0, 0.0)))
    );
}

#[test]
fn duplicate_is_independent() {
    let p = params();
    let mut tl = timeline(&p);
    let mut track = Track::new(&p, "V1");
    let clip = track.insert_clip(square(&p, 0, 10));
    tl.push_track(track);

    let copy = tl.duplicate();
    assert_eq!(copy.tracks().len(), 1);
    assert!(copy.clip(clip).is_none());
    assert_eq!(copy.tracks()[0].clips().len(), 1);
    assert!(!copy.notifier().same_as(tl.notifier()));
}

#[test]
fn playback_over_automated_matrix_keeps_the_event_queue_bounded() {
    let p = params();
    let mut tl = timeline(&p);
    let mut clip = square(&p, 0, 5_000);
    let position = p.clip.position.clone();
    clip.add_key_frame(&position, crate::automation::sequence::KeyFrame::new(0, Vec2::ZERO))
        .unwrap();
    clip.add_key_frame(
        &position,
        crate::automation::sequence::KeyFrame::new(4_000, Vec2::new(40.0, 0.0)),
    )
    .unwrap();
    let mut track = Track::new(&p, "V1");
    let id = track.insert_clip(clip);
    tl.push_track(track);
    tl.drain_events();

    for f in 0..4_000 {
        tl.set_play_head(FrameIndex(f));
        tl.clip_absolute_matrix(id);
    }
    assert!(tl.notifier().queued_events() <= 1);
    assert!(
        tl.drain_events()
            .iter()
            .all(|e| *e == ModelEvent::MatrixInvalidated { clip: id })
    );
}

#[test]
fn play_head_reaches_clips_in_nested_timelines() {
    let p = params();
    let mut inner = Timeline::new(&p, Canvas { width: 16, height: 16 }, Fps::default());
    let mut inner_track = Track::new(&p, "inner");
    let mut fade = square(&p, 0, 100);
    let opacity = p.clip.opacity.clone();
    fade.add_key_frame(&opacity, crate::automation::sequence::KeyFrame::new(0, 0.0))
        .unwrap();
    fade.add_key_frame(&opacity, crate::automation::sequence::KeyFrame::new(10, 1.0))
        .unwrap();
    let fade = inner_track.insert_clip(fade);
    inner.push_track(inner_track);

    let mut tl = timeline(&p);
    let mut track = Track::new(&p, "V1");
    let comp = Clip::new(&p, FrameSpan::new(10, 40), ClipSource::composition(inner))
        .with_playback_speed(2.0);
    let comp = track.insert_clip(comp);
    tl.push_track(track);

    // Outer frame 13 is relative frame 3, shown at nested frame 6.
    tl.set_play_head(FrameIndex(13));
    let nested = tl.clip(comp).unwrap().composition().unwrap();
    let inner_clip = nested.clip(fade).unwrap();
    assert_eq!(inner_clip.eval_frame(), 6);
    assert!((inner_clip.opacity() - 0.6).abs() < 1e-9);
}
