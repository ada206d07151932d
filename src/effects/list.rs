use smallvec::SmallVec;

use crate::effects::effect::Effect;
use crate::effects::kind::EffectOwnerKind;
use crate::foundation::core::Vec2;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::proxy::EffectProxy;
use crate::timeline::notify::{EffectId, ModelEvent, Notifier, ObjectRef};

/// Ordered effects of one clip or track. Index 0 is the outermost effect.
#[derive(Clone, Debug, Default)]
pub struct EffectList {
    effects: Vec<Effect>,
}

impl EffectList {
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.effects.iter_mut().find(|e| e.id() == id)
    }

    pub fn index_of(&self, id: EffectId) -> Option<usize> {
        self.effects.iter().position(|e| e.id() == id)
    }

    pub(crate) fn insert(
        &mut self,
        index: usize,
        mut effect: Effect,
        owner: ObjectRef,
        owner_kind: EffectOwnerKind,
        notifier: &Notifier,
    ) -> MontageResult<()> {
        if let Some(existing) = effect.owner() {
            return Err(MontageError::structural(format!(
                "effect {:?} is already attached to {existing:?}",
                effect.id()
            )));
        }
        if index > self.effects.len() {
            return Err(MontageError::structural(format!(
                "effect index {index} out of range 0..={}",
                self.effects.len()
            )));
        }
        if !effect.kind().accepts(owner_kind) {
            return Err(MontageError::structural(format!(
                "{} effects cannot be attached to a {owner_kind:?}",
                effect.kind().type_name()
            )));
        }
        if self.index_of(effect.id()).is_some() {
            return Err(MontageError::structural(format!(
                "effect {:?} is already in this list",
                effect.id()
            )));
        }

        effect.attach(owner, notifier);
        self.effects.insert(index, effect);
        notifier.emit(ModelEvent::EffectsChanged { owner });
        notifier.invalidate();
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: EffectId, notifier: &Notifier) -> Option<Effect> {
        let i = self.index_of(id)?;
        let mut effect = self.effects.remove(i);
        if let Some(owner) = effect.owner() {
            notifier.emit(ModelEvent::EffectsChanged { owner });
        }
        effect.detach();
        notifier.invalidate();
        Some(effect)
    }

    pub(crate) fn move_effect(
        &mut self,
        from: usize,
        to: usize,
        notifier: &Notifier,
    ) -> MontageResult<()> {
        let len = self.effects.len();
        if from >= len || to >= len {
            return Err(MontageError::structural(format!(
                "effect move {from} -> {to} out of range for {len} effects"
            )));
        }
        if from == to {
            return Ok(());
        }
        let effect = self.effects.remove(from);
        let owner = effect.owner();
        self.effects.insert(to, effect);
        if let Some(owner) = owner {
            notifier.emit(ModelEvent::EffectsChanged { owner });
        }
        notifier.invalidate();
        Ok(())
    }

    pub(crate) fn set_notifier(&mut self, notifier: &Notifier) {
        for effect in &mut self.effects {
            effect.set_notifier(notifier);
        }
    }

    /// Copies with fresh ids, attached to `owner`.
    pub(crate) fn duplicate_for(&self, owner: ObjectRef, notifier: &Notifier) -> Self {
        let effects = self
            .effects
            .iter()
            .map(|e| {
                let mut copy = e.duplicate();
                copy.attach(owner, notifier);
                copy
            })
            .collect();
        Self { effects }
    }

    pub(crate) fn rebase_automation(&mut self, offset: u64) {
        for effect in &mut self.effects {
            effect.rebase_automation(offset);
        }
    }

    pub(crate) fn prepare(
        &self,
        frame: i64,
        content_size: Option<Vec2>,
    ) -> SmallVec<[EffectProxy; 2]> {
        self.effects
            .iter()
            .map(|e| e.prepare(frame, content_size))
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/list.rs"]
mod tests;
