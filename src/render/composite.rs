use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Move `px` toward `color` by `amount`, keeping the pixel's coverage.
pub fn tint(px: PremulRgba8, color: PremulRgba8, amount: f32) -> PremulRgba8 {
    let amount = amount.clamp(0.0, 1.0);
    if amount <= 0.0 || px[3] == 0 {
        return px;
    }
    let t = ((amount * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - t;
    let a = u16::from(px[3]);

    let mut out = px;
    for i in 0..3 {
        // Target channel scaled to the pixel's own alpha so the result stays premultiplied.
        let target = mul_div255_u8(u16::from(color[i]), a);
        let cur = mul_div255_u8(u16::from(px[i]), it);
        out[i] = add_sat_u8(cur, mul_div255_u8(u16::from(target), t)).min(px[3]);
    }
    out
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
