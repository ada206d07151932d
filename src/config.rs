use std::sync::Arc;

use crate::assets::store::ResourceStore;
use crate::automation::standard::StandardParameters;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::manager::{RenderManager, RenderManagerOpts};
use crate::render::scratch::ScratchPoolOpts;
use crate::timeline::timeline::Timeline;

/// Engine-wide settings: new timelines' format and render scheduling.
///
/// Every field is optional in JSON; missing ones take their defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub resolution: Canvas,
    pub fps: Fps,
    pub render: RenderManagerOpts,
    pub scratch: ScratchPoolOpts,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> MontageResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MontageError::serde(format!("engine config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> MontageResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MontageError::serde(format!("engine config: {e}")))
    }

    pub fn validate(&self) -> MontageResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(MontageError::validation("resolution must be non-zero"));
        }
        if self.render.threads == Some(0) {
            return Err(MontageError::validation(
                "render 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }

    /// Empty root timeline in this format.
    pub fn new_timeline(&self, params: &Arc<StandardParameters>) -> Timeline {
        Timeline::new(params, self.resolution, self.fps)
    }

    pub fn render_manager(&self, store: Arc<ResourceStore>) -> MontageResult<RenderManager> {
        self.validate()?;
        RenderManager::new(self.render.clone(), self.scratch, store)
    }
}
