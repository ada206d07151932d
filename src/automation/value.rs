use crate::foundation::core::Vec2;
use crate::foundation::math::lerp_f64;

/// Storage type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ValueKind {
    Float,
    Long,
    Bool,
    Vector2,
}

impl ValueKind {
    /// Discrete kinds never interpolate and always hold the previous key frame.
    pub fn is_discrete(self) -> bool {
        matches!(self, Self::Bool)
    }
}

/// A single automatable value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ParamValue {
    Float(f64),
    Long(i64),
    Bool(bool),
    Vector2(Vec2),
}

impl ParamValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Float(_) => ValueKind::Float,
            Self::Long(_) => ValueKind::Long,
            Self::Bool(_) => ValueKind::Bool,
            Self::Vector2(_) => ValueKind::Vector2,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Long(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match *self {
            Self::Vector2(v) => Some(v),
            _ => None,
        }
    }

    /// Blend between two values of the same kind. Mismatched kinds hold `a`.
    pub(crate) fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        match (*a, *b) {
            (Self::Float(x), Self::Float(y)) => Self::Float(<f64 as Lerp>::lerp(&x, &y, t)),
            (Self::Long(x), Self::Long(y)) => Self::Long(<i64 as Lerp>::lerp(&x, &y, t)),
            (Self::Vector2(x), Self::Vector2(y)) => Self::Vector2(<Vec2 as Lerp>::lerp(&x, &y, t)),
            _ => *a,
        }
    }

    /// Clamp into `[min, max]`; vectors clamp per component. Non-finite floats fall back to `fallback`.
    pub(crate) fn clamped(self, min: Option<&Self>, max: Option<&Self>, fallback: &Self) -> Self {
        match self {
            Self::Float(v) => {
                if !v.is_finite() {
                    return *fallback;
                }
                let lo = min.and_then(Self::as_f64).unwrap_or(f64::NEG_INFINITY);
                let hi = max.and_then(Self::as_f64).unwrap_or(f64::INFINITY);
                Self::Float(v.clamp(lo, hi))
            }
            Self::Long(v) => {
                let lo = min.and_then(Self::as_i64).unwrap_or(i64::MIN);
                let hi = max.and_then(Self::as_i64).unwrap_or(i64::MAX);
                Self::Long(v.clamp(lo, hi))
            }
            Self::Vector2(v) => {
                if !(v.x.is_finite() && v.y.is_finite()) {
                    return *fallback;
                }
                let lo = min
                    .and_then(Self::as_vec2)
                    .unwrap_or(Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY));
                let hi = max
                    .and_then(Self::as_vec2)
                    .unwrap_or(Vec2::new(f64::INFINITY, f64::INFINITY));
                Self::Vector2(Vec2::new(v.x.clamp(lo.x, hi.x), v.y.clamp(lo.y, hi.y)))
            }
            Self::Bool(_) => self,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec2> for ParamValue {
    fn from(v: Vec2) -> Self {
        Self::Vector2(v)
    }
}

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        lerp_f64(*a, *b, t)
    }
}

impl Lerp for i64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        lerp_f64(*a as f64, *b as f64, t).round() as i64
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(lerp_f64(a.x, b.x, t), lerp_f64(a.y, b.y, t))
    }
}
