use std::collections::BTreeMap;

use crate::automation::parameter::{OwnerKind, Parameter};
use crate::automation::sequence::AutomationSequence;
use crate::automation::value::ParamValue;
use crate::foundation::core::Vec2;
use crate::foundation::error::{MontageError, MontageResult};

/// Per-owner collection of automation sequences, created lazily per parameter.
#[derive(Clone, Debug)]
pub struct AutomationData {
    owner: OwnerKind,
    sequences: BTreeMap<u32, AutomationSequence>,
    active: Option<Parameter>,
}

impl AutomationData {
    pub fn new(owner: OwnerKind) -> Self {
        Self {
            owner,
            sequences: BTreeMap::new(),
            active: None,
        }
    }

    pub fn owner(&self) -> OwnerKind {
        self.owner
    }

    pub fn sequence(&self, param: &Parameter) -> Option<&AutomationSequence> {
        self.sequences
            .get(&param.global_index())
            .filter(|s| s.parameter() == param)
    }

    /// Sequence for `param`, creating it on first access.
    pub fn sequence_mut(&mut self, param: &Parameter) -> MontageResult<&mut AutomationSequence> {
        self.check_owner(param)?;
        let seq = self
            .sequences
            .entry(param.global_index())
            .or_insert_with(|| AutomationSequence::new(param.clone()));
        if seq.parameter() != param {
            return Err(MontageError::structural(format!(
                "parameter '{}' comes from a different registry",
                param.key()
            )));
        }
        Ok(seq)
    }

    /// Value at an owner-relative frame; the parameter default when no sequence exists.
    pub fn value(&self, param: &Parameter, frame: i64) -> ParamValue {
        match self.sequence(param) {
            Some(seq) => seq.get_value(frame),
            None => param.default_value(),
        }
    }

    pub fn value_f64(&self, param: &Parameter, frame: i64) -> f64 {
        self.value(param, frame)
            .as_f64()
            .or_else(|| param.default_value().as_f64())
            .unwrap_or(0.0)
    }

    pub fn value_vec2(&self, param: &Parameter, frame: i64) -> Vec2 {
        self.value(param, frame)
            .as_vec2()
            .or_else(|| param.default_value().as_vec2())
            .unwrap_or(Vec2::ZERO)
    }

    pub fn value_bool(&self, param: &Parameter, frame: i64) -> bool {
        self.value(param, frame)
            .as_bool()
            .or_else(|| param.default_value().as_bool())
            .unwrap_or(false)
    }

    pub fn is_automated(&self, param: &Parameter) -> bool {
        self.sequence(param).is_some_and(AutomationSequence::can_automate)
    }

    pub fn active_parameter(&self) -> Option<&Parameter> {
        self.active.as_ref()
    }

    pub fn set_active_parameter(&mut self, param: Option<&Parameter>) -> MontageResult<()> {
        if let Some(p) = param {
            self.check_owner(p)?;
        }
        self.active = param.cloned();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutomationSequence> {
        self.sequences.values()
    }

    pub(crate) fn rebase(&mut self, offset: u64) {
        for seq in self.sequences.values_mut() {
            seq.rebase(offset);
        }
    }

    fn check_owner(&self, param: &Parameter) -> MontageResult<()> {
        if param.owner() != self.owner {
            return Err(MontageError::structural(format!(
                "parameter '{}' belongs to {:?}, not {:?}",
                param.key(),
                param.owner(),
                self.owner
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/automation/data.rs"]
mod tests;
