use crate::raster::Rgba8;

/// Straight-alpha source-over. `opacity` scales the source alpha.
pub fn over(dst: Rgba8, src: Rgba8, opacity: f32) -> Rgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u32;
    let sa = mul_div255(u32::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    let out_a = sa + mul_div255(da, inv);
    if out_a == 0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    out[3] = out_a as u8;
    for i in 0..3 {
        let sc = u32::from(src[i]) * sa;
        let dc = u32::from(dst[i]) * mul_div255(da, inv);
        out[i] = ((sc + dc + out_a / 2) / out_a).min(255) as u8;
    }
    out
}

/// Soft-light blend (W3C separable formula), applied at `opacity` scaled by
/// the source alpha. Destination alpha is preserved.
pub fn soft_light(dst: Rgba8, src: Rgba8, opacity: f32) -> Rgba8 {
    blend_separable(dst, src, opacity, |s, d| {
        if s <= 0.5 {
            d - (1.0 - 2.0 * s) * d * (1.0 - d)
        } else {
            let dd = if d <= 0.25 {
                ((16.0 * d - 12.0) * d + 4.0) * d
            } else {
                d.sqrt()
            };
            d + (2.0 * s - 1.0) * (dd - d)
        }
    })
}

/// Overlay blend, applied at `opacity` scaled by the source alpha.
pub fn overlay(dst: Rgba8, src: Rgba8, opacity: f32) -> Rgba8 {
    blend_separable(dst, src, opacity, |s, d| {
        if d < 0.5 {
            2.0 * s * d
        } else {
            1.0 - 2.0 * (1.0 - s) * (1.0 - d)
        }
    })
}

fn blend_separable(dst: Rgba8, src: Rgba8, opacity: f32, f: impl Fn(f32, f32) -> f32) -> Rgba8 {
    let t = opacity.clamp(0.0, 1.0) * f32::from(src[3]) / 255.0;
    if t <= 0.0 {
        return dst;
    }

    let mut out = dst;
    for i in 0..3 {
        let s = f32::from(src[i]) / 255.0;
        let d = f32::from(dst[i]) / 255.0;
        let b = f(s, d).clamp(0.0, 1.0);
        let mixed = d + (b - d) * t;
        out[i] = (mixed * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn mul_div255(x: u32, y: u32) -> u32 {
    (x * y + 127) / 255
}
