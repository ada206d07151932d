use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::automation::value::{ParamValue, ValueKind};
use crate::foundation::core::Vec2;
use crate::foundation::error::{MontageError, MontageResult};

/// Unique `domain::name` identifier of a parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterKey {
    domain: String,
    name: String,
}

impl ParameterKey {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> MontageResult<Self> {
        let domain = domain.into();
        let name = name.into();
        if domain.is_empty() || name.is_empty() {
            return Err(MontageError::validation(
                "parameter key domain and name must be non-empty",
            ));
        }
        if domain.contains("::") || name.contains("::") {
            return Err(MontageError::validation(
                "parameter key parts must not contain '::'",
            ));
        }
        Ok(Self { domain, name })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.domain, self.name)
    }
}

/// Type of model object a parameter belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnerKind {
    Clip,
    Track,
    /// An effect, identified by its type name.
    Effect(&'static str),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParameterFlags {
    /// Edits invalidate the rendered frame.
    pub affects_render: bool,
    /// Edits mark the owning project as modified.
    pub modifies_project: bool,
}

impl ParameterFlags {
    pub const STANDARD: Self = Self {
        affects_render: true,
        modifies_project: true,
    };
}

/// Default value and optional inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterDescriptor {
    pub default: ParamValue,
    pub min: Option<ParamValue>,
    pub max: Option<ParamValue>,
}

impl ParameterDescriptor {
    pub fn float(default: f64) -> Self {
        Self {
            default: ParamValue::Float(default),
            min: None,
            max: None,
        }
    }

    pub fn float_range(default: f64, min: f64, max: f64) -> Self {
        Self {
            default: ParamValue::Float(default),
            min: Some(ParamValue::Float(min)),
            max: Some(ParamValue::Float(max)),
        }
    }

    pub fn long_range(default: i64, min: i64, max: i64) -> Self {
        Self {
            default: ParamValue::Long(default),
            min: Some(ParamValue::Long(min)),
            max: Some(ParamValue::Long(max)),
        }
    }

    pub fn boolean(default: bool) -> Self {
        Self {
            default: ParamValue::Bool(default),
            min: None,
            max: None,
        }
    }

    pub fn vector2(default: Vec2) -> Self {
        Self {
            default: ParamValue::Vector2(default),
            min: None,
            max: None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    /// Clamp a value of this descriptor's kind into its bounds.
    pub fn clamp(&self, v: ParamValue) -> ParamValue {
        v.clamped(self.min.as_ref(), self.max.as_ref(), &self.default)
    }

    fn validate(&self, key: &ParameterKey) -> MontageResult<()> {
        let kind = self.kind();
        for bound in [self.min, self.max].into_iter().flatten() {
            if bound.kind() != kind {
                return Err(MontageError::structural(format!(
                    "parameter '{key}' bounds must match its {kind:?} value kind"
                )));
            }
        }
        let finite = |v: &ParamValue| match *v {
            ParamValue::Float(x) => x.is_finite(),
            ParamValue::Vector2(p) => p.x.is_finite() && p.y.is_finite(),
            ParamValue::Long(_) | ParamValue::Bool(_) => true,
        };
        if !finite(&self.default) || !self.min.iter().chain(self.max.iter()).all(finite) {
            return Err(MontageError::validation(format!(
                "parameter '{key}' default and bounds must be finite"
            )));
        }
        let out_of_order = match (self.min, self.max) {
            (Some(ParamValue::Float(lo)), Some(ParamValue::Float(hi))) => !(lo <= hi),
            (Some(ParamValue::Long(lo)), Some(ParamValue::Long(hi))) => lo > hi,
            (Some(ParamValue::Vector2(lo)), Some(ParamValue::Vector2(hi))) => {
                !(lo.x <= hi.x && lo.y <= hi.y)
            }
            _ => false,
        };
        if out_of_order {
            return Err(MontageError::validation(format!(
                "parameter '{key}' min must be <= max"
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ParameterInner {
    key: ParameterKey,
    owner: OwnerKind,
    descriptor: ParameterDescriptor,
    flags: ParameterFlags,
    global_index: u32,
}

/// Shared, immutable parameter metadata. Cloning is cheap.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterInner>);

impl Parameter {
    pub fn key(&self) -> &ParameterKey {
        &self.0.key
    }

    pub fn owner(&self) -> OwnerKind {
        self.0.owner
    }

    pub fn descriptor(&self) -> &ParameterDescriptor {
        &self.0.descriptor
    }

    pub fn flags(&self) -> ParameterFlags {
        self.0.flags
    }

    /// Dense index in registration order.
    pub fn global_index(&self) -> u32 {
        self.0.global_index
    }

    pub fn kind(&self) -> ValueKind {
        self.0.descriptor.kind()
    }

    pub fn default_value(&self) -> ParamValue {
        self.0.descriptor.default
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Parameter {}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("key", &self.0.key.to_string())
            .field("owner", &self.0.owner)
            .field("index", &self.0.global_index)
            .finish()
    }
}

/// Registry of every parameter known to one engine instance.
///
/// Built once at startup, then shared read-only.
#[derive(Default)]
pub struct ParameterRegistry {
    params: Vec<Parameter>,
    by_key: HashMap<ParameterKey, usize>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter. Registering the same key twice is a structural error.
    pub fn register(
        &mut self,
        owner: OwnerKind,
        key: ParameterKey,
        descriptor: ParameterDescriptor,
        flags: ParameterFlags,
    ) -> MontageResult<Parameter> {
        if self.by_key.contains_key(&key) {
            return Err(MontageError::structural(format!(
                "parameter key already registered: {key}"
            )));
        }
        descriptor.validate(&key)?;
        let global_index = u32::try_from(self.params.len())
            .map_err(|_| MontageError::structural("parameter registry is full"))?;

        let descriptor = ParameterDescriptor {
            default: descriptor.clamp(descriptor.default),
            ..descriptor
        };
        let param = Parameter(Arc::new(ParameterInner {
            key: key.clone(),
            owner,
            descriptor,
            flags,
            global_index,
        }));
        self.by_key.insert(key, self.params.len());
        self.params.push(param.clone());
        Ok(param)
    }

    pub fn get(&self, key: &ParameterKey) -> Option<&Parameter> {
        self.by_key.get(key).map(|&i| &self.params[i])
    }

    pub fn by_index(&self, index: u32) -> Option<&Parameter> {
        self.params.get(index as usize)
    }

    pub fn for_owner(&self, owner: OwnerKind) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(move |p| p.owner() == owner)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/automation/parameter.rs"]
mod tests;
