use crate::foundation::core::Rgba8Premul;

pub const MOTION: &str = "Motion";
pub const CROP: &str = "Crop";
pub const TINT: &str = "Tint";
pub const BOX_BLUR: &str = "BoxBlur";

/// What an effect is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectOwnerKind {
    Clip,
    Track,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EffectKind {
    /// Extra transform around the owner's draw.
    Motion,
    /// Clip the owner's draw to an inset rectangle of its content bounds.
    Crop,
    /// Blend the touched area toward a colour.
    Tint { color: Rgba8Premul },
    /// Box blur of the touched area.
    BoxBlur,
}

impl EffectKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Motion => MOTION,
            Self::Crop => CROP,
            Self::Tint { .. } => TINT,
            Self::BoxBlur => BOX_BLUR,
        }
    }

    /// Whether an effect of this kind may be attached to `owner`.
    pub fn accepts(self, owner: EffectOwnerKind) -> bool {
        match self {
            Self::Motion | Self::Crop => owner == EffectOwnerKind::Clip,
            Self::Tint { .. } | Self::BoxBlur => true,
        }
    }
}
