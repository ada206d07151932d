use crate::automation::data::AutomationData;
use crate::automation::parameter::Parameter;
use crate::automation::sequence::{AutomationSequence, KeyFrame, SequenceChange};
use crate::automation::value::ParamValue;
use crate::foundation::error::MontageResult;

pub type SequenceEdit<'a> =
    &'a mut dyn FnMut(&mut AutomationSequence) -> MontageResult<SequenceChange>;

/// A model object whose parameters are driven by automation.
///
/// All edits go through [`Automatable::edit_sequence`] so the owner can refresh derived state and
/// publish notifications.
pub trait Automatable {
    fn automation(&self) -> &AutomationData;

    /// Apply `edit` to the sequence of `param`, then react to whatever changed.
    fn edit_sequence(
        &mut self,
        param: &Parameter,
        edit: SequenceEdit<'_>,
    ) -> MontageResult<SequenceChange>;

    fn add_key_frame(&mut self, param: &Parameter, key: KeyFrame) -> MontageResult<SequenceChange> {
        self.edit_sequence(param, &mut |seq| seq.add_key_frame(key))
    }

    fn remove_key_frame(&mut self, param: &Parameter, frame: u64) -> MontageResult<SequenceChange> {
        self.edit_sequence(param, &mut |seq| Ok(seq.remove_key_frame_at(frame)))
    }

    fn set_value(
        &mut self,
        param: &Parameter,
        frame: u64,
        value: impl Into<ParamValue>,
    ) -> MontageResult<SequenceChange>
    where
        Self: Sized,
    {
        let value = value.into();
        self.edit_sequence(param, &mut |seq| seq.set_value(frame, value))
    }

    fn set_override_value(
        &mut self,
        param: &Parameter,
        value: impl Into<ParamValue>,
    ) -> MontageResult<SequenceChange>
    where
        Self: Sized,
    {
        let value = value.into();
        self.edit_sequence(param, &mut |seq| seq.set_override_value(value))
    }

    fn set_override_enabled(
        &mut self,
        param: &Parameter,
        enabled: bool,
    ) -> MontageResult<SequenceChange> {
        self.edit_sequence(param, &mut |seq| Ok(seq.set_override_enabled(enabled)))
    }

    fn clear_key_frames(&mut self, param: &Parameter) -> MontageResult<SequenceChange> {
        self.edit_sequence(param, &mut |seq| Ok(seq.clear()))
    }
}
