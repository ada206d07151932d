use super::*;

fn key(name: &str) -> ParameterKey {
    ParameterKey::new("Clip", name).unwrap()
}

#[test]
fn key_displays_domain_and_name() {
    assert_eq!(key("Opacity").to_string(), "Clip::Opacity");
    assert!(ParameterKey::new("", "x").is_err());
    assert!(ParameterKey::new("a::b", "x").is_err());
}

#[test]
fn duplicate_registration_is_structural() {
    let mut reg = ParameterRegistry::new();
    reg.register(
        OwnerKind::Clip,
        key("Opacity"),
        ParameterDescriptor::float_range(1.0, 0.0, 1.0),
        ParameterFlags::STANDARD,
    )
    .unwrap();
    let err = reg
        .register(
            OwnerKind::Track,
            key("Opacity"),
            ParameterDescriptor::float(0.0),
            ParameterFlags::STANDARD,
        )
        .unwrap_err();
    assert!(err.is_structural());
    assert_eq!(reg.len(), 1);
}

#[test]
fn global_indices_follow_registration_order() {
    let mut reg = ParameterRegistry::new();
    let a = reg
        .register(
            OwnerKind::Clip,
            key("A"),
            ParameterDescriptor::float(0.0),
            ParameterFlags::STANDARD,
        )
        .unwrap();
    let b = reg
        .register(
            OwnerKind::Track,
            key("B"),
            ParameterDescriptor::boolean(true),
            ParameterFlags::default(),
        )
        .unwrap();
    assert_eq!(a.global_index(), 0);
    assert_eq!(b.global_index(), 1);
    assert_eq!(reg.get(&key("B")), Some(&b));
    assert_eq!(reg.for_owner(OwnerKind::Clip).count(), 1);
}

#[test]
fn bounds_are_validated_and_default_clamped() {
    let mut reg = ParameterRegistry::new();
    let err = reg
        .register(
            OwnerKind::Clip,
            key("Bad"),
            ParameterDescriptor {
                default: ParamValue::Float(0.0),
                min: Some(ParamValue::Long(0)),
                max: None,
            },
            ParameterFlags::STANDARD,
        )
        .unwrap_err();
    assert!(err.is_structural());

    assert!(
        reg.register(
            OwnerKind::Clip,
            key("Inverted"),
            ParameterDescriptor::float_range(0.0, 1.0, -1.0),
            ParameterFlags::STANDARD,
        )
        .is_err()
    );

    let p = reg
        .register(
            OwnerKind::Clip,
            key("Clamped"),
            ParameterDescriptor::float_range(5.0, 0.0, 1.0),
            ParameterFlags::STANDARD,
        )
        .unwrap();
    assert_eq!(p.default_value(), ParamValue::Float(1.0));
}

#[test]
fn non_finite_bounds_are_rejected_at_registration() {
    let mut reg = ParameterRegistry::new();
    let nan_min = ParameterDescriptor {
        default: ParamValue::Float(0.5),
        min: Some(ParamValue::Float(f64::NAN)),
        max: None,
    };
    let err = reg
        .register(OwnerKind::Clip, key("NanMin"), nan_min, ParameterFlags::STANDARD)
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));

    let inf_vec = ParameterDescriptor {
        default: ParamValue::Vector2(Vec2::ZERO),
        min: None,
        max: Some(ParamValue::Vector2(Vec2::new(1.0, f64::INFINITY))),
    };
    assert!(
        reg.register(OwnerKind::Clip, key("InfMax"), inf_vec, ParameterFlags::STANDARD)
            .is_err()
    );
    assert!(
        reg.register(
            OwnerKind::Clip,
            key("NanDefault"),
            ParameterDescriptor::float(f64::NAN),
            ParameterFlags::STANDARD,
        )
        .is_err()
    );
    assert!(reg.is_empty());
}

#[test]
fn descriptor_clamps_vectors_per_component() {
    let d = ParameterDescriptor {
        default: ParamValue::Vector2(Vec2::ZERO),
        min: Some(ParamValue::Vector2(Vec2::new(0.0, -1.0))),
        max: Some(ParamValue::Vector2(Vec2::new(1.0, 1.0))),
    };
    assert_eq!(
        d.clamp(ParamValue::Vector2(Vec2::new(4.0, -4.0))),
        ParamValue::Vector2(Vec2::new(1.0, -1.0))
    );
    assert_eq!(
        d.clamp(ParamValue::Vector2(Vec2::new(f64::NAN, 0.0))),
        ParamValue::Vector2(Vec2::ZERO)
    );
}
