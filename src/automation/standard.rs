use std::sync::Arc;

use crate::automation::parameter::{
    OwnerKind, Parameter, ParameterDescriptor, ParameterFlags, ParameterKey, ParameterRegistry,
};
use crate::effects::kind::{BOX_BLUR, CROP, MOTION, TINT};
use crate::foundation::core::Vec2;
use crate::foundation::error::MontageResult;

#[derive(Clone, Debug)]
pub struct ClipParameters {
    pub opacity: Parameter,
    pub position: Parameter,
    pub scale: Parameter,
    pub scale_origin: Parameter,
    pub rotation: Parameter,
    pub rotation_origin: Parameter,
    pub auto_scale_origin: Parameter,
    pub auto_rotation_origin: Parameter,
    pub visible: Parameter,
}

impl ClipParameters {
    /// Parameters feeding the clip's local transformation matrix.
    pub fn affects_matrix(&self, p: &Parameter) -> bool {
        [
            &self.position,
            &self.scale,
            &self.scale_origin,
            &self.rotation,
            &self.rotation_origin,
            &self.auto_scale_origin,
            &self.auto_rotation_origin,
        ]
        .contains(&p)
    }
}

#[derive(Clone, Debug)]
pub struct TrackParameters {
    pub opacity: Parameter,
    pub enabled: Parameter,
    pub position: Parameter,
    pub scale: Parameter,
    pub scale_origin: Parameter,
    pub rotation: Parameter,
    pub rotation_origin: Parameter,
    pub auto_scale_origin: Parameter,
    pub auto_rotation_origin: Parameter,
}

impl TrackParameters {
    pub fn affects_matrix(&self, p: &Parameter) -> bool {
        [
            &self.position,
            &self.scale,
            &self.scale_origin,
            &self.rotation,
            &self.rotation_origin,
            &self.auto_scale_origin,
            &self.auto_rotation_origin,
        ]
        .contains(&p)
    }
}

#[derive(Clone, Debug)]
pub struct MotionParameters {
    pub offset: Parameter,
    pub scale: Parameter,
    pub rotation: Parameter,
}

#[derive(Clone, Debug)]
pub struct CropParameters {
    pub left: Parameter,
    pub top: Parameter,
    pub right: Parameter,
    pub bottom: Parameter,
}

#[derive(Clone, Debug)]
pub struct TintParameters {
    pub amount: Parameter,
}

#[derive(Clone, Debug)]
pub struct BlurParameters {
    pub radius: Parameter,
}

#[derive(Clone, Debug)]
pub struct EffectParameters {
    pub motion: MotionParameters,
    pub crop: CropParameters,
    pub tint: TintParameters,
    pub blur: BlurParameters,
}

/// Every built-in parameter, registered once per engine and shared by all model objects.
#[derive(Clone, Debug)]
pub struct StandardParameters {
    pub clip: ClipParameters,
    pub track: TrackParameters,
    pub effect: EffectParameters,
}

impl StandardParameters {
    pub fn register(registry: &mut ParameterRegistry) -> MontageResult<Self> {
        let mut r = Registrar { registry };
        let (c, t) = (OwnerKind::Clip, OwnerKind::Track);
        let clip = ClipParameters {
            opacity: r.unit(c, "Opacity", 1.0)?,
            position: r.vec2(c, "MediaPosition", Vec2::ZERO)?,
            scale: r.vec2(c, "MediaScale", Vec2::new(1.0, 1.0))?,
            scale_origin: r.vec2(c, "MediaScaleOrigin", Vec2::ZERO)?,
            rotation: r.float(c, "MediaRotation", 0.0)?,
            rotation_origin: r.vec2(c, "MediaRotationOrigin", Vec2::ZERO)?,
            auto_scale_origin: r.flag(c, "IsMediaScaleOriginAutomatic", true)?,
            auto_rotation_origin: r.flag(c, "IsMediaRotationOriginAutomatic", true)?,
            visible: r.flag(c, "IsVisible", true)?,
        };
        let track = TrackParameters {
            opacity: r.unit(t, "Opacity", 1.0)?,
            enabled: r.flag(t, "IsEnabled", true)?,
            position: r.vec2(t, "MediaPosition", Vec2::ZERO)?,
            scale: r.vec2(t, "MediaScale", Vec2::new(1.0, 1.0))?,
            scale_origin: r.vec2(t, "MediaScaleOrigin", Vec2::ZERO)?,
            rotation: r.float(t, "MediaRotation", 0.0)?,
            rotation_origin: r.vec2(t, "MediaRotationOrigin", Vec2::ZERO)?,
            auto_scale_origin: r.flag(t, "IsMediaScaleOriginAutomatic", true)?,
            auto_rotation_origin: r.flag(t, "IsMediaRotationOriginAutomatic", true)?,
        };
        let (motion, crop) = (OwnerKind::Effect(MOTION), OwnerKind::Effect(CROP));
        let inset = ParameterDescriptor::float_range(0.0, 0.0, f64::MAX);
        let effect = EffectParameters {
            motion: MotionParameters {
                offset: r.vec2(motion, "Offset", Vec2::ZERO)?,
                scale: r.vec2(motion, "Scale", Vec2::new(1.0, 1.0))?,
                rotation: r.float(motion, "Rotation", 0.0)?,
            },
            crop: CropParameters {
                left: r.add(crop, "Left", inset)?,
                top: r.add(crop, "Top", inset)?,
                right: r.add(crop, "Right", inset)?,
                bottom: r.add(crop, "Bottom", inset)?,
            },
            tint: TintParameters {
                amount: r.unit(OwnerKind::Effect(TINT), "Amount", 1.0)?,
            },
            blur: BlurParameters {
                radius: r.add(
                    OwnerKind::Effect(BOX_BLUR),
                    "Radius",
                    ParameterDescriptor::long_range(2, 0, 64),
                )?,
            },
        };
        Ok(Self {
            clip,
            track,
            effect,
        })
    }

    /// Register the standard set into a fresh registry.
    pub fn with_fresh_registry() -> MontageResult<(ParameterRegistry, Arc<Self>)> {
        let mut registry = ParameterRegistry::new();
        let params = Self::register(&mut registry)?;
        Ok((registry, Arc::new(params)))
    }
}

struct Registrar<'a> {
    registry: &'a mut ParameterRegistry,
}

impl Registrar<'_> {
    fn float(&mut self, owner: OwnerKind, name: &str, default: f64) -> MontageResult<Parameter> {
        self.add(owner, name, ParameterDescriptor::float(default))
    }

    fn unit(&mut self, owner: OwnerKind, name: &str, default: f64) -> MontageResult<Parameter> {
        self.add(owner, name, ParameterDescriptor::float_range(default, 0.0, 1.0))
    }

    fn vec2(&mut self, owner: OwnerKind, name: &str, default: Vec2) -> MontageResult<Parameter> {
        self.add(owner, name, ParameterDescriptor::vector2(default))
    }

    fn flag(&mut self, owner: OwnerKind, name: &str, default: bool) -> MontageResult<Parameter> {
        self.add(owner, name, ParameterDescriptor::boolean(default))
    }

    fn add(
        &mut self,
        owner: OwnerKind,
        name: &str,
        descriptor: ParameterDescriptor,
    ) -> MontageResult<Parameter> {
        let domain = match owner {
            OwnerKind::Clip => "VideoClip",
            OwnerKind::Track => "VideoTrack",
            OwnerKind::Effect(kind) => kind,
        };
        self.registry.register(
            owner,
            ParameterKey::new(domain, name)?,
            descriptor,
            ParameterFlags::STANDARD,
        )
    }
}
