use std::sync::Arc;

use crate::automation::ease::Ease;
use crate::automation::parameter::Parameter;
use crate::automation::value::ParamValue;
use crate::foundation::error::{MontageError, MontageResult};

/// How the segment starting at a key frame blends toward the next key frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    Eased(Ease),
    /// Keep this key frame's value until the next key frame.
    Hold,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyFrame {
    /// Owner-relative frame.
    pub frame: u64,
    pub value: ParamValue,
    pub interpolation: Interpolation,
}

impl KeyFrame {
    pub fn new(frame: u64, value: impl Into<ParamValue>) -> Self {
        Self {
            frame,
            value: value.into(),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// What a sequence mutation changed. Owners turn this into notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceChange {
    None,
    KeyFrameAdded { frame: u64 },
    KeyFrameChanged { frame: u64 },
    KeyFrameRemoved { frame: u64 },
    KeyFramesCleared,
    OverrideValueChanged,
    OverrideStateChanged,
}

impl SequenceChange {
    pub fn is_change(self) -> bool {
        self != Self::None
    }
}

/// Time-varying value of one parameter on one owner.
///
/// Key frames are sorted by frame with at most one key frame per frame. The list is shared
/// copy-on-write with any outstanding [`SequenceSnapshot`].
#[derive(Clone, Debug)]
pub struct AutomationSequence {
    parameter: Parameter,
    keys: Arc<Vec<KeyFrame>>,
    override_value: ParamValue,
    override_enabled: bool,
}

impl AutomationSequence {
    pub fn new(parameter: Parameter) -> Self {
        let override_value = parameter.default_value();
        Self {
            parameter,
            keys: Arc::new(Vec::new()),
            override_value,
            override_enabled: false,
        }
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.keys
    }

    pub fn has_key_frames(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn override_value(&self) -> ParamValue {
        self.override_value
    }

    pub fn is_override_enabled(&self) -> bool {
        self.override_enabled
    }

    /// True when evaluation follows key frames rather than the override value.
    pub fn can_automate(&self) -> bool {
        !self.override_enabled && !self.keys.is_empty()
    }

    /// Evaluate at an owner-relative frame. Negative frames sample before the first key frame.
    pub fn get_value(&self, frame: i64) -> ParamValue {
        sample(&self.keys, self.override_value, self.override_enabled, frame)
    }

    /// Cheap immutable view for readers outside the control thread.
    pub fn snapshot(&self) -> SequenceSnapshot {
        SequenceSnapshot {
            keys: Arc::clone(&self.keys),
            override_value: self.override_value,
            override_enabled: self.override_enabled,
        }
    }

    /// Write a value as the user would: into the key frame at `frame` when automated, otherwise
    /// into the override value.
    pub fn set_value(&mut self, frame: u64, value: ParamValue) -> MontageResult<SequenceChange> {
        if !self.can_automate() {
            return self.set_override_value(value);
        }
        let interpolation = self
            .key_index(frame)
            .map(|i| self.keys[i].interpolation)
            .unwrap_or_default();
        self.add_key_frame(KeyFrame {
            frame,
            value,
            interpolation,
        })
    }

    pub fn set_override_value(&mut self, value: ParamValue) -> MontageResult<SequenceChange> {
        let value = self.checked(value)?;
        if value == self.override_value {
            return Ok(SequenceChange::None);
        }
        self.override_value = value;
        Ok(SequenceChange::OverrideValueChanged)
    }

    pub fn set_override_enabled(&mut self, enabled: bool) -> SequenceChange {
        if enabled == self.override_enabled {
            return SequenceChange::None;
        }
        self.override_enabled = enabled;
        SequenceChange::OverrideStateChanged
    }

    /// Insert a key frame, replacing any key frame already at the same frame.
    pub fn add_key_frame(&mut self, key: KeyFrame) -> MontageResult<SequenceChange> {
        let key = KeyFrame {
            value: self.checked(key.value)?,
            ..key
        };
        let idx = self.keys.partition_point(|k| k.frame < key.frame);
        if let Some(existing) = self.keys.get(idx)
            && existing.frame == key.frame
        {
            if *existing == key {
                return Ok(SequenceChange::None);
            }
            Arc::make_mut(&mut self.keys)[idx] = key;
            return Ok(SequenceChange::KeyFrameChanged { frame: key.frame });
        }
        Arc::make_mut(&mut self.keys).insert(idx, key);
        Ok(SequenceChange::KeyFrameAdded { frame: key.frame })
    }

    pub fn remove_key_frame_at(&mut self, frame: u64) -> SequenceChange {
        match self.key_index(frame) {
            Some(i) => {
                Arc::make_mut(&mut self.keys).remove(i);
                SequenceChange::KeyFrameRemoved { frame }
            }
            None => SequenceChange::None,
        }
    }

    /// Key frame at `frame`, inserting one holding the currently evaluated value if missing.
    pub fn get_or_create_key_frame_at(&mut self, frame: u64) -> (KeyFrame, SequenceChange) {
        if let Some(i) = self.key_index(frame) {
            return (self.keys[i], SequenceChange::None);
        }
        let value = self.get_value(i64::try_from(frame).unwrap_or(i64::MAX));
        let key = KeyFrame::new(frame, value);
        let idx = self.keys.partition_point(|k| k.frame < frame);
        Arc::make_mut(&mut self.keys).insert(idx, key);
        (key, SequenceChange::KeyFrameAdded { frame })
    }

    pub fn clear(&mut self) -> SequenceChange {
        if self.keys.is_empty() {
            return SequenceChange::None;
        }
        self.keys = Arc::new(Vec::new());
        SequenceChange::KeyFramesCleared
    }

    /// Move the frame origin to `offset`: the value at `offset` becomes a key frame at 0 and
    /// earlier key frames are dropped.
    pub(crate) fn rebase(&mut self, offset: u64) {
        if self.keys.is_empty() || offset == 0 {
            return;
        }
        let value = self.sample_keys(offset);
        let seg = self.keys.partition_point(|k| k.frame <= offset);
        let interpolation = seg
            .checked_sub(1)
            .map(|i| self.keys[i].interpolation)
            .unwrap_or_default();
        let mut rebased = Vec::with_capacity(self.keys.len());
        rebased.push(KeyFrame {
            frame: 0,
            value,
            interpolation,
        });
        rebased.extend(
            self.keys[seg..]
                .iter()
                .map(|k| KeyFrame {
                    frame: k.frame - offset,
                    ..*k
                }),
        );
        self.keys = Arc::new(rebased);
    }

    fn sample_keys(&self, frame: u64) -> ParamValue {
        sample(
            &self.keys,
            self.override_value,
            false,
            i64::try_from(frame).unwrap_or(i64::MAX),
        )
    }

    fn key_index(&self, frame: u64) -> Option<usize> {
        self.keys.binary_search_by_key(&frame, |k| k.frame).ok()
    }

    fn checked(&self, value: ParamValue) -> MontageResult<ParamValue> {
        if value.kind() != self.parameter.kind() {
            return Err(MontageError::structural(format!(
                "parameter '{}' expects {:?} values, got {:?}",
                self.parameter.key(),
                self.parameter.kind(),
                value.kind()
            )));
        }
        Ok(self.parameter.descriptor().clamp(value))
    }
}

/// Immutable view of a sequence captured at one point in time.
#[derive(Clone, Debug)]
pub struct SequenceSnapshot {
    keys: Arc<Vec<KeyFrame>>,
    override_value: ParamValue,
    override_enabled: bool,
}

impl SequenceSnapshot {
    pub fn get_value(&self, frame: i64) -> ParamValue {
        sample(&self.keys, self.override_value, self.override_enabled, frame)
    }

    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.keys
    }
}

fn sample(
    keys: &[KeyFrame],
    override_value: ParamValue,
    override_enabled: bool,
    frame: i64,
) -> ParamValue {
    if override_enabled || keys.is_empty() {
        return override_value;
    }
    let Ok(f) = u64::try_from(frame) else {
        return keys[0].value;
    };

    let idx = keys.partition_point(|k| k.frame <= f);
    if idx == 0 {
        return keys[0].value;
    }
    let a = &keys[idx - 1];
    if a.frame == f || idx == keys.len() {
        return a.value;
    }
    let b = &keys[idx];
    if a.value.kind().is_discrete() {
        return a.value;
    }

    let span = (b.frame - a.frame) as f64;
    let t = (f - a.frame) as f64 / span;
    let t = match a.interpolation {
        Interpolation::Hold => return a.value,
        Interpolation::Linear => t,
        Interpolation::Eased(e) => e.apply(t),
    };
    ParamValue::interpolate(&a.value, &b.value, t)
}

#[cfg(test)]
#[path = "../../tests/unit/automation/sequence.rs"]
mod tests;
