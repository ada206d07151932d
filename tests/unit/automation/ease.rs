use super::*;

#[test]
fn endpoints_are_fixed_for_every_curve() {
    for e in [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::Bend { curve: 2.5 },
    ] {
        assert!(e.apply(0.0).abs() < 1e-12, "{e:?}");
        assert!((e.apply(1.0) - 1.0).abs() < 1e-12, "{e:?}");
    }
}

#[test]
fn input_is_clamped() {
    assert_eq!(Ease::Linear.apply(-3.0), 0.0);
    assert_eq!(Ease::InQuad.apply(7.0), 1.0);
}

#[test]
fn bend_uses_inverse_power_of_curve() {
    let v = Ease::Bend { curve: 2.0 }.apply(0.25);
    assert!((v - 0.5).abs() < 1e-12);
    let v = Ease::Bend { curve: -2.0 }.apply(0.25);
    assert!((v - 0.5).abs() < 1e-12);
    assert_eq!(Ease::Bend { curve: 0.0 }.apply(0.3), 0.3);
}
