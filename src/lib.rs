//! Montage is a non-linear video composition engine.
//!
//! The editable model is a [`Timeline`] of [`Track`]s holding [`Clip`]s, every property driven by
//! an [`AutomationSequence`]. Rendering is two-phase:
//!
//! - Prepare walks the model on the control thread and captures a plain-data [`FrameProxy`]
//! - Render turns the proxy into a [`Surface`] on the [`RenderManager`]'s worker thread
//!
//! Neither phase holds a lock on the other, so the model stays editable while a frame renders.
#![forbid(unsafe_code)]

mod assets;
mod automation;
mod config;
mod effects;
mod foundation;
mod render;
mod timeline;

pub use crate::foundation::core::{
    Affine, Canvas, Fps, FrameIndex, IntRect, Point, Rect, Rgba8Premul, Transform2D, Vec2,
    invert_affine,
};
pub use crate::foundation::error::{MontageError, MontageResult};
pub use crate::foundation::math::opacity_to_byte;

pub use crate::automation::data::AutomationData;
pub use crate::automation::ease::Ease;
pub use crate::automation::parameter::{
    OwnerKind, Parameter, ParameterDescriptor, ParameterFlags, ParameterKey, ParameterRegistry,
};
pub use crate::automation::sequence::{
    AutomationSequence, Interpolation, KeyFrame, SequenceChange, SequenceSnapshot,
};
pub use crate::automation::standard::{
    BlurParameters, ClipParameters, CropParameters, EffectParameters, MotionParameters,
    StandardParameters, TintParameters, TrackParameters,
};
pub use crate::automation::value::{Lerp, ParamValue, ValueKind};

pub use crate::timeline::automatable::{Automatable, SequenceEdit};
pub use crate::timeline::clip::{Clip, ClipSource, MAX_SPEED, MIN_SPEED};
pub use crate::timeline::notify::{
    ClipId, EffectId, MAX_QUEUED_EVENTS, ModelEvent, Notifier, ObjectRef, SuspendGuard, TrackId,
};
pub use crate::timeline::span::FrameSpan;
pub use crate::timeline::timeline::{DEFAULT_MAX_DURATION, Timeline};
pub use crate::timeline::track::Track;

pub use crate::effects::effect::Effect;
pub use crate::effects::kind::{EffectKind, EffectOwnerKind};
pub use crate::effects::list::EffectList;

pub use crate::assets::decode::decode_image;
pub use crate::assets::source::{Bitmap, MediaSource, ResourceFrame, SolidSource, StillImage};
pub use crate::assets::store::{ResourceId, ResourceStore};

pub use crate::render::composite::{PremulRgba8, over, tint};
pub use crate::render::context::{DrawState, RenderContext};
pub use crate::render::frame::{CancelToken, FrameRenderer, RenderOutcome, render_once};
pub use crate::render::manager::{
    RenderManager, RenderManagerOpts, RenderPhase, RenderStats, RenderedFrame,
};
pub use crate::render::proxy::{
    ClipProxy, ContentProxy, EffectOp, EffectProxy, FrameProxy, TrackProxy,
};
pub use crate::render::scratch::{ScratchLease, ScratchPool, ScratchPoolOpts, ScratchPoolStats};
pub use crate::render::surface::Surface;

pub use crate::config::EngineConfig;
