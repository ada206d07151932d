use smallvec::SmallVec;

use crate::foundation::core::{Affine, IntRect, Rect};
use crate::render::scratch::ScratchPool;
use crate::render::surface::Surface;

/// Drawing state that effects and content may push and pop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    /// Local to device transform.
    pub transform: Affine,
    /// Device-space clip.
    pub clip: IntRect,
    pub opacity: f64,
}

/// Target surface plus a save/restore stack of [`DrawState`].
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub(crate) surface: &'a mut Surface,
    pub(crate) scratch: &'a mut ScratchPool,
    state: DrawState,
    stack: SmallVec<[DrawState; 8]>,
}

impl<'a> RenderContext<'a> {
    pub fn new(surface: &'a mut Surface, scratch: &'a mut ScratchPool) -> Self {
        let clip = surface.bounds();
        Self {
            surface,
            scratch,
            state: DrawState {
                transform: Affine::IDENTITY,
                clip,
                opacity: 1.0,
            },
            stack: SmallVec::new(),
        }
    }

    /// Start from `state` instead of the identity, clipped to the surface.
    pub fn with_state(
        surface: &'a mut Surface,
        scratch: &'a mut ScratchPool,
        state: DrawState,
    ) -> Self {
        let mut ctx = Self::new(surface, scratch);
        ctx.state = DrawState {
            clip: state.clip.intersect(ctx.state.clip),
            ..state
        };
        ctx
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn transform(&self) -> Affine {
        self.state.transform
    }

    pub fn clip(&self) -> IntRect {
        self.state.clip
    }

    pub fn opacity(&self) -> f64 {
        self.state.opacity
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn save(&mut self) {
        self.stack.push(self.state);
    }

    /// Pop the last saved state. Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        if let Some(s) = self.stack.pop() {
            self.state = s;
        }
    }

    /// Apply `m` in local space: subsequent local coordinates pass through `m` first.
    pub fn concat(&mut self, m: Affine) {
        self.state.transform = self.state.transform * m;
    }

    /// Intersect the clip with `rect` given in local space.
    ///
    /// Device clips are axis-aligned, so a rotated `rect` clips to its bounding box.
    pub fn clip_local(&mut self, rect: Rect) {
        let dev = IntRect::covering(self.state.transform.transform_rect_bbox(rect));
        self.state.clip = self.state.clip.intersect(dev);
    }

    pub fn multiply_opacity(&mut self, factor: f64) {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.state.opacity *= factor;
    }
}
