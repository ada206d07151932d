use super::*;
use crate::automation::sequence::KeyFrame;
use crate::effects::kind::EffectKind;

fn params() -> Arc<StandardParameters> {
    StandardParameters::with_fresh_registry().unwrap().1
}

fn red_square(p: &Arc<StandardParameters>, span: FrameSpan) -> Clip {
    Clip::new(
        p,
        span,
        ClipSource::shape(Vec2::new(10.0, 10.0), Rgba8Premul::from_straight_rgba(255, 0, 0, 255)),
    )
}

#[test]
fn frame_conversion_round_trips() {
    let p = params();
    let clip = red_square(&p, FrameSpan::new(100, 50));
    assert_eq!(clip.timeline_to_relative(FrameIndex(100)), (0, true));
    assert_eq!(clip.timeline_to_relative(FrameIndex(149)), (49, true));
    assert_eq!(clip.timeline_to_relative(FrameIndex(150)), (50, false));
    assert_eq!(clip.timeline_to_relative(FrameIndex(90)), (-10, false));
    for f in [100, 120, 149] {
        let (rel, _) = clip.timeline_to_relative(FrameIndex(f));
        assert_eq!(clip.relative_to_timeline(rel), FrameIndex(f));
    }
}

#[test]
fn speed_rescales_duration_and_restores_base() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(10, 100));

    assert_eq!(clip.set_playback_speed(2.0), 2.0);
    assert_eq!(clip.span(), FrameSpan::new(10, 50));
    assert_eq!(clip.base_span(), FrameSpan::new(10, 100));

    // Repeating the same speed changes nothing.
    clip.set_playback_speed(2.0);
    assert_eq!(clip.span().duration(), 50);

    assert_eq!(clip.set_playback_speed(1.0), 1.0);
    assert_eq!(clip.span(), FrameSpan::new(10, 100));
}

#[test]
fn speed_is_clamped_and_duration_never_zero() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 3));
    assert_eq!(clip.set_playback_speed(1_000.0), MAX_SPEED);
    assert_eq!(clip.span().duration(), 1);
    assert_eq!(clip.set_playback_speed(0.0), MIN_SPEED);
    assert!((299..=300).contains(&clip.span().duration()));
    assert_eq!(clip.set_playback_speed(f64::NAN), 1.0);
    assert_eq!(clip.span().duration(), 3);
}

#[test]
fn span_edit_under_speed_moves_base_by_delta() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 100)).with_playback_speed(2.0);
    assert_eq!(clip.span().duration(), 50);
    clip.set_span(FrameSpan::new(0, 60));
    assert_eq!(clip.base_span().duration(), 110);
    clip.set_playback_speed(1.0);
    assert_eq!(clip.span().duration(), 110);
}

#[test]
fn local_matrix_is_cached_until_a_matrix_parameter_changes() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let n = Notifier::new();
    clip.attach(TrackId(1), &n);
    n.drain_events();

    assert_eq!(clip.local_matrix(), Affine::IDENTITY);
    assert_eq!(clip.local_matrix(), Affine::IDENTITY);
    assert_eq!(clip.matrix_builds(), 1);
    assert!(!clip.is_matrix_dirty());

    let position = p.clip.position.clone();
    clip.set_value(&position, 0, Vec2::new(3.0, 4.0)).unwrap();
    assert!(clip.is_matrix_dirty());
    let events = n.drain_events();
    assert!(events.contains(&ModelEvent::MatrixInvalidated { clip: clip.id() }));
    assert!(n.take_dirty());

    assert_eq!(clip.local_matrix(), Affine::translate((3.0, 4.0)));
    assert_eq!(clip.matrix_builds(), 2);
    assert_eq!(clip.local_inverse(), Some(Affine::translate((-3.0, -4.0))));
}

#[test]
fn non_matrix_edit_keeps_the_cache() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let n = Notifier::new();
    clip.attach(TrackId(1), &n);
    clip.local_matrix();
    n.drain_events();

    let opacity = p.clip.opacity.clone();
    clip.set_value(&opacity, 0, 0.5).unwrap();
    assert!(!clip.is_matrix_dirty());
    assert!(
        !n.drain_events()
            .iter()
            .any(|e| matches!(e, ModelEvent::MatrixInvalidated { .. }))
    );
    assert_eq!(clip.matrix_builds(), 1);
}

#[test]
fn automated_position_rebuilds_per_evaluation_frame() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(100, 20));
    let position = p.clip.position.clone();
    clip.add_key_frame(&position, KeyFrame::new(0, Vec2::ZERO)).unwrap();
    clip.add_key_frame(&position, KeyFrame::new(10, Vec2::new(10.0, 0.0)))
        .unwrap();

    clip.update_automation(FrameIndex(105));
    assert_eq!(clip.eval_frame(), 5);
    assert_eq!(clip.local_matrix(), Affine::translate((5.0, 0.0)));

    clip.update_automation(FrameIndex(110));
    assert!(clip.is_matrix_dirty());
    assert_eq!(clip.local_matrix(), Affine::translate((10.0, 0.0)));
}

#[test]
fn absolute_matrix_applies_track_after_local() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let scale = p.clip.scale.clone();
    let auto = p.clip.auto_scale_origin.clone();
    clip.set_value(&auto, 0, false).unwrap();
    clip.set_value(&scale, 0, Vec2::new(2.0, 2.0)).unwrap();

    let cache = MatrixCache::default();
    let track = cache.get_or_build(0, || (Affine::translate((5.0, 0.0)), false));
    let (abs, inv) = clip.absolute_with(TrackId(7), track);
    assert_eq!(abs, Affine::translate((5.0, 0.0)) * Affine::scale(2.0));
    let pt = abs * kurbo::Point::new(1.0, 1.0);
    assert_eq!(pt, kurbo::Point::new(7.0, 2.0));
    assert_eq!(inv.map(|i| i * pt), Some(kurbo::Point::new(1.0, 1.0)));
}

#[test]
fn opacity_follows_automation_at_the_evaluation_frame() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let opacity = p.clip.opacity.clone();
    clip.set_value(&opacity, 0, 0.0).unwrap();
    assert!(clip.is_visible());
    assert!(!clip.is_effectively_visible());
    clip.set_value(&opacity, 0, 2.0).unwrap();
    assert_eq!(clip.opacity(), 1.0);
}

#[test]
fn effect_chain_edits_keep_order() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let motion = clip.push_effect(Effect::new(&p, EffectKind::Motion)).unwrap();
    clip.push_effect(Effect::new(&p, EffectKind::BoxBlur)).unwrap();
    assert_eq!(clip.effects().len(), 2);
    assert_eq!(clip.effects().index_of(motion), Some(0));

    clip.move_effect(0, 1).unwrap();
    assert_eq!(clip.effects().index_of(motion), Some(1));
    assert!(clip.move_effect(0, 5).unwrap_err().is_structural());
    assert!(clip.remove_effect(motion).is_some());
    assert_eq!(clip.effects().len(), 1);
}

#[test]
fn split_off_rebases_automation_and_source() {
    let p = params();
    let mut clip = Clip::new(&p, FrameSpan::new(10, 30), ClipSource::media(ResourceId(1)));
    let position = p.clip.position.clone();
    clip.add_key_frame(&position, KeyFrame::new(0, Vec2::ZERO)).unwrap();
    clip.add_key_frame(&position, KeyFrame::new(20, Vec2::new(20.0, 0.0)))
        .unwrap();

    let right = clip.split_off(10);
    assert_eq!(clip.span(), FrameSpan::new(10, 10));
    assert_eq!(right.span(), FrameSpan::new(20, 20));
    assert_ne!(right.id(), clip.id());
    assert!(matches!(
        right.source(),
        ClipSource::Media {
            frame_offset: 10,
            ..
        }
    ));
    // Relative frame 0 on the right is relative frame 10 on the original.
    assert_eq!(
        right.automation().value_vec2(&position, 0),
        Vec2::new(10.0, 0.0)
    );
    assert_eq!(
        right.automation().value_vec2(&position, 10),
        Vec2::new(20.0, 0.0)
    );
}

#[test]
fn duplicate_gets_fresh_ids() {
    let p = params();
    let mut clip = red_square(&p, FrameSpan::new(0, 10));
    let fx = clip.push_effect(Effect::new(&p, EffectKind::BoxBlur)).unwrap();
    let copy = clip.duplicate();
    assert_ne!(copy.id(), clip.id());
    assert_eq!(copy.span(), clip.span());
    assert_eq!(copy.effects().len(), 1);
    assert!(copy.effects().get(fx).is_none());
    assert_eq!(copy.track(), None);
}
