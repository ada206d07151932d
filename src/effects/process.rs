use crate::foundation::core::IntRect;
use crate::render::composite::tint;
use crate::render::context::RenderContext;
use crate::render::proxy::{EffectOp, EffectProxy};
use crate::render::surface::Surface;

impl EffectProxy {
    /// Runs before the owner's content is drawn.
    pub(crate) fn pre_process(&self, ctx: &mut RenderContext<'_>) {
        match self.op {
            EffectOp::Motion { matrix } => {
                ctx.save();
                ctx.concat(matrix);
            }
            EffectOp::Crop { rect } => {
                ctx.save();
                ctx.clip_local(rect);
            }
            EffectOp::Tint { .. } | EffectOp::BoxBlur { .. } => {}
        }
    }

    /// Runs after the owner's content is drawn. `area` is the device rectangle touched so far
    /// and may grow.
    pub(crate) fn post_process(&self, ctx: &mut RenderContext<'_>, area: &mut IntRect) {
        #[cfg(test)]
        fail::check(self.effect);
        match self.op {
            EffectOp::Motion { .. } | EffectOp::Crop { .. } => ctx.restore(),
            EffectOp::Tint { color, amount } => {
                let region = area.intersect(ctx.clip()).intersect(ctx.surface.bounds());
                let color = color.to_array();
                let amount = amount as f32;
                for y in region.y0..region.y1 {
                    for x in region.x0..region.x1 {
                        let (x, y) = (x as u32, y as u32);
                        let px = tint(ctx.surface.pixel(x, y), color, amount);
                        ctx.surface.set_pixel(x, y, px);
                    }
                }
            }
            EffectOp::BoxBlur { radius } => {
                if radius == 0 || area.is_empty() {
                    return;
                }
                let r = i32::try_from(radius).unwrap_or(i32::MAX);
                let region = area
                    .inflate(r)
                    .intersect(ctx.clip())
                    .intersect(ctx.surface.bounds());
                if region.is_empty() {
                    return;
                }
                let mut tmp = ctx.scratch.lease(region.width(), region.height());
                box_blur_horizontal(ctx.surface, &mut tmp, region, radius);
                box_blur_vertical(&tmp, ctx.surface, region, radius);
                *area = region;
            }
        }
    }
}


/// Wrap `draw` in `effects`: pre-process front to back, post-process back to front.
///
/// The context's save depth is the same on return as on entry, whether or not `draw` fails.
pub(crate) fn with_effects<E>(
    effects: &[EffectProxy],
    ctx: &mut RenderContext<'_>,
    draw: impl FnOnce(&mut RenderContext<'_>) -> Result<IntRect, E>,
) -> Result<IntRect, E> {
    let depth = ctx.depth();
    for fx in effects {
        fx.pre_process(ctx);
    }
    let mut area = match draw(ctx) {
        Ok(area) => area,
        Err(err) => {
            while ctx.depth() > depth {
                ctx.restore();
            }
            return Err(err);
        }
    };
    for fx in effects.iter().rev() {
        fx.post_process(ctx, &mut area);
    }
    Ok(area)
}

// Reads `region` of `src`, writes the region-local result into `dst`.
fn box_blur_horizontal(src: &Surface, dst: &mut Surface, region: IntRect, radius: u32) {
    let w = region.width() as i64;
    let r = i64::from(radius);
    let n = (2 * r + 1) as u32;
    for ly in 0..region.height() {
        let sy = region.y0 as u32 + ly;
        for lx in 0..w {
            let mut sum = [0u32; 4];
            for k in -r..=r {
                let sx = (lx + k).clamp(0, w - 1) as u32 + region.x0 as u32;
                let px = src.pixel(sx, sy);
                for c in 0..4 {
                    sum[c] += u32::from(px[c]);
                }
            }
            dst.set_pixel(lx as u32, ly, average(sum, n));
        }
    }
}

// Reads region-local `src`, writes back into `region` of `dst`.
fn box_blur_vertical(src: &Surface, dst: &mut Surface, region: IntRect, radius: u32) {
    let h = region.height() as i64;
    let r = i64::from(radius);
    let n = (2 * r + 1) as u32;
    for lx in 0..region.width() {
        for ly in 0..h {
            let mut sum = [0u32; 4];
            for k in -r..=r {
                let sy = (ly + k).clamp(0, h - 1) as u32;
                let px = src.pixel(lx, sy);
                for c in 0..4 {
                    sum[c] += u32::from(px[c]);
                }
            }
            let (dx, dy) = (region.x0 as u32 + lx, region.y0 as u32 + ly as u32);
            dst.set_pixel(dx, dy, average(sum, n));
        }
    }
}

fn average(sum: [u32; 4], n: u32) -> [u8; 4] {
    let mut out = [0u8; 4];
    for c in 0..4 {
        out[c] = ((sum[c] + n / 2) / n).min(255) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/effects/process.rs"]
mod tests;
