use std::sync::Arc;

use crate::automation::data::AutomationData;
use crate::automation::parameter::{OwnerKind, Parameter};
use crate::automation::sequence::SequenceChange;
use crate::automation::standard::StandardParameters;
use crate::effects::kind::EffectKind;
use crate::foundation::core::{Rect, Transform2D, Vec2};
use crate::foundation::error::MontageResult;
use crate::render::proxy::{EffectOp, EffectProxy};
use crate::timeline::automatable::{Automatable, SequenceEdit};
use crate::timeline::notify::{EffectId, ModelEvent, Notifier, ObjectRef, next_object_id};

// Bound used for crop edges when the owner's content size is unknown.
const UNBOUNDED: f64 = 1.0e9;

/// A parameter-driven processing step attached to one clip or track.
#[derive(Clone, Debug)]
pub struct Effect {
    id: EffectId,
    kind: EffectKind,
    automation: AutomationData,
    params: Arc<StandardParameters>,
    owner: Option<ObjectRef>,
    notifier: Notifier,
}

impl Effect {
    pub fn new(params: &Arc<StandardParameters>, kind: EffectKind) -> Self {
        Self {
            id: EffectId(next_object_id()),
            kind,
            automation: AutomationData::new(OwnerKind::Effect(kind.type_name())),
            params: Arc::clone(params),
            owner: None,
            notifier: Notifier::new(),
        }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn owner(&self) -> Option<ObjectRef> {
        self.owner
    }

    pub(crate) fn attach(&mut self, owner: ObjectRef, notifier: &Notifier) {
        self.owner = Some(owner);
        self.notifier = notifier.clone();
    }

    pub(crate) fn set_notifier(&mut self, notifier: &Notifier) {
        self.notifier = notifier.clone();
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.notifier = Notifier::new();
    }

    /// Copy with a fresh id and no owner.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: EffectId(next_object_id()),
            owner: None,
            notifier: Notifier::new(),
            ..self.clone()
        }
    }

    pub(crate) fn rebase_automation(&mut self, offset: u64) {
        self.automation.rebase(offset);
    }

    /// Resolve this effect at an owner-relative frame.
    ///
    /// `content_size` is the owner's local content size when known.
    pub(crate) fn prepare(&self, frame: i64, content_size: Option<Vec2>) -> EffectProxy {
        let fx = &self.params.effect;
        let a = &self.automation;
        let op = match self.kind {
            EffectKind::Motion => {
                let centre = content_size.map(|s| s / 2.0).unwrap_or(Vec2::ZERO);
                let t = Transform2D {
                    position: a.value_vec2(&fx.motion.offset, frame),
                    scale: a.value_vec2(&fx.motion.scale, frame),
                    scale_origin: centre,
                    rotation_deg: a.value_f64(&fx.motion.rotation, frame),
                    rotation_origin: centre,
                };
                EffectOp::Motion {
                    matrix: t.to_affine(),
                }
            }
            EffectKind::Crop => {
                let (w, h) = content_size
                    .map(|s| (s.x, s.y))
                    .unwrap_or((UNBOUNDED, UNBOUNDED));
                let left = a.value_f64(&fx.crop.left, frame);
                let top = a.value_f64(&fx.crop.top, frame);
                let right = (w - a.value_f64(&fx.crop.right, frame)).max(left);
                let bottom = (h - a.value_f64(&fx.crop.bottom, frame)).max(top);
                EffectOp::Crop {
                    rect: Rect::new(left, top, right, bottom),
                }
            }
            EffectKind::Tint { color } => EffectOp::Tint {
                color,
                amount: a.value_f64(&fx.tint.amount, frame),
            },
            EffectKind::BoxBlur => EffectOp::BoxBlur {
                radius: a
                    .value(&fx.blur.radius, frame)
                    .as_i64()
                    .and_then(|r| u32::try_from(r).ok())
                    .unwrap_or(0),
            },
        };
        EffectProxy {
            effect: self.id,
            op,
        }
    }
}

impl Automatable for Effect {
    fn automation(&self) -> &AutomationData {
        &self.automation
    }

    fn edit_sequence(
        &mut self,
        param: &Parameter,
        edit: SequenceEdit<'_>,
    ) -> MontageResult<SequenceChange> {
        let change = edit(self.automation.sequence_mut(param)?)?;
        if change.is_change() {
            self.notifier.emit(ModelEvent::ParameterChanged {
                owner: ObjectRef::Effect(self.id),
                key: param.key().clone(),
                change,
            });
            if param.flags().modifies_project {
                self.notifier.mark_modified();
            }
            if param.flags().affects_render {
                self.notifier.invalidate();
            }
        }
        Ok(change)
    }
}
