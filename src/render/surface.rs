use std::fmt;

use crate::assets::source::Bitmap;
use crate::foundation::core::{Affine, Canvas, IntRect, Point, Rect, Vec2, invert_affine};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::composite::{PremulRgba8, over};

/// Premultiplied RGBA8 render target.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn for_canvas(canvas: Canvas) -> Self {
        Self::new(canvas.width, canvas.height)
    }

    pub fn bounds(&self) -> IntRect {
        IntRect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> PremulRgba8 {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, px: PremulRgba8) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Source-over `src` onto `self` within `area`.
    pub fn composite_from(&mut self, src: &Surface, opacity: f32, area: IntRect) -> MontageResult<()> {
        if src.width != self.width || src.height != self.height {
            return Err(MontageError::render(format!(
                "composite expects equal surfaces, got {}x{} onto {}x{}",
                src.width, src.height, self.width, self.height
            )));
        }
        let area = area.intersect(self.bounds());
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let (x, y) = (x as u32, y as u32);
                let out = over(self.pixel(x, y), src.pixel(x, y), opacity);
                self.set_pixel(x, y, out);
            }
        }
        Ok(())
    }

    /// Fill a `size` rectangle in local space mapped through `xf`.
    pub fn fill_quad(
        &mut self,
        xf: Affine,
        size: Vec2,
        color: PremulRgba8,
        opacity: f32,
        clip: IntRect,
    ) -> IntRect {
        self.rasterize(xf, size, opacity, clip, |_, _| Some(color))
    }

    /// Draw `bitmap` with its top-left at the local origin, nearest-neighbour sampled.
    pub fn draw_bitmap(&mut self, xf: Affine, bitmap: &Bitmap, opacity: f32, clip: IntRect) -> IntRect {
        let size = Vec2::new(f64::from(bitmap.width), f64::from(bitmap.height));
        self.rasterize(xf, size, opacity, clip, |lx, ly| {
            let (x, y) = (lx.floor() as u32, ly.floor() as u32);
            if x < bitmap.width && y < bitmap.height {
                Some(bitmap.pixel(x, y))
            } else {
                None
            }
        })
    }

    /// Inverse-map every device pixel centre in the transformed bounds and blend `sample`.
    /// Returns the device rectangle that was visited.
    fn rasterize(
        &mut self,
        xf: Affine,
        size: Vec2,
        opacity: f32,
        clip: IntRect,
        sample: impl Fn(f64, f64) -> Option<PremulRgba8>,
    ) -> IntRect {
        if opacity <= 0.0 || size.x <= 0.0 || size.y <= 0.0 {
            return IntRect::EMPTY;
        }
        let Some(inv) = invert_affine(xf) else {
            return IntRect::EMPTY;
        };
        let local = Rect::new(0.0, 0.0, size.x, size.y);
        let area = IntRect::covering(xf.transform_rect_bbox(local))
            .intersect(clip)
            .intersect(self.bounds());
        if area.is_empty() {
            return IntRect::EMPTY;
        }

        let mut touched = IntRect::EMPTY;
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if p.x < 0.0 || p.y < 0.0 || p.x >= size.x || p.y >= size.y {
                    continue;
                }
                let Some(src) = sample(p.x, p.y) else {
                    continue;
                };
                let (ux, uy) = (x as u32, y as u32);
                let out = over(self.pixel(ux, uy), src, opacity);
                self.set_pixel(ux, uy, out);
                touched = touched.union(IntRect::new(x, y, x + 1, y + 1));
            }
        }
        touched
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
