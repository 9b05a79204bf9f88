use crate::raster::RasterImage;

const RADIUS: i64 = 3; // 7x7 neighborhood
const SPATIAL_FALLOFF: f32 = 0.5;
const SMOOTH_MIX: f32 = 0.85;
const BORDER: u32 = 3;

/// Bilateral-style seam smoothing over the inclusive pixel rectangle,
/// excluding a 3 px border. Weights favor spatially close, color-similar
/// neighbors so garment edges survive while blend seams soften. Alpha is
/// left untouched. Degenerate rectangles are a no-op.
pub fn smooth_rect(raster: &mut RasterImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    if x1 >= raster.width() || y1 >= raster.height() || x1 < x0 || y1 < y0 {
        return;
    }
    let (ix0, iy0) = (x0 + BORDER, y0 + BORDER);
    let (ix1, iy1) = (x1.saturating_sub(BORDER), y1.saturating_sub(BORDER));
    if ix1 < ix0 || iy1 < iy0 {
        return;
    }

    let src = raster.clone();
    for y in iy0..=iy1 {
        for x in ix0..=ix1 {
            let center = src.pixel(x, y);
            let mut acc = [0.0f32; 3];
            let mut total = 0.0f32;
            for dy in -RADIUS..=RADIUS {
                for dx in -RADIUS..=RADIUS {
                    let n = src.pixel_clamped(i64::from(x) + dx, i64::from(y) + dy);
                    let color_diff = (i32::from(center[0]).abs_diff(i32::from(n[0]))
                        + i32::from(center[1]).abs_diff(i32::from(n[1]))
                        + i32::from(center[2]).abs_diff(i32::from(n[2])))
                        as f32
                        / 3.0;
                    let spatial = ((dx * dx + dy * dy) as f32).sqrt();
                    let weight = (1.0 - color_diff / 255.0) / (1.0 + spatial * SPATIAL_FALLOFF);
                    if weight <= 0.0 {
                        continue;
                    }
                    for c in 0..3 {
                        acc[c] += weight * f32::from(n[c]);
                    }
                    total += weight;
                }
            }
            if total <= 0.0 {
                continue;
            }

            let mut out = center;
            for c in 0..3 {
                let smoothed = acc[c] / total;
                let mixed = smoothed * SMOOTH_MIX + f32::from(center[c]) * (1.0 - SMOOTH_MIX);
                out[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
            raster.put_pixel(x, y, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_region_is_unchanged() {
        let mut r = RasterImage::filled(20, 20, [120, 90, 60, 255]).unwrap();
        let before = r.clone();
        smooth_rect(&mut r, 0, 0, 19, 19);
        assert_eq!(r, before);
    }

    #[test]
    fn degenerate_rect_is_a_noop() {
        let mut r = RasterImage::filled(10, 10, [120, 90, 60, 255]).unwrap();
        let before = r.clone();
        smooth_rect(&mut r, 8, 8, 2, 2);
        smooth_rect(&mut r, 0, 0, 4, 4); // interior vanishes after border
        assert_eq!(r, before);
    }

    #[test]
    fn border_pixels_are_preserved() {
        let mut r = RasterImage::filled(20, 20, [200, 200, 200, 255]).unwrap();
        r.put_pixel(10, 10, [0, 0, 0, 255]);
        let before = r.clone();
        smooth_rect(&mut r, 0, 0, 19, 19);
        for x in 0..20 {
            assert_eq!(r.pixel(x, 0), before.pixel(x, 0));
            assert_eq!(r.pixel(x, 2), before.pixel(x, 2));
        }
    }

    #[test]
    fn speckle_is_attenuated_more_than_an_edge() {
        // A lone bright speckle on dark ground pulls toward its neighbors;
        // a hard two-tone edge keeps most of its contrast.
        let mut speckled = RasterImage::filled(21, 21, [30, 30, 30, 255]).unwrap();
        speckled.put_pixel(10, 10, [90, 90, 90, 255]);
        smooth_rect(&mut speckled, 0, 0, 20, 20);
        let speckle_after = speckled.pixel(10, 10)[0];
        assert!(speckle_after < 90);

        let mut edged = RasterImage::filled(21, 21, [30, 30, 30, 255]).unwrap();
        for y in 0..21 {
            for x in 11..21 {
                edged.put_pixel(x, y, [220, 220, 220, 255]);
            }
        }
        smooth_rect(&mut edged, 0, 0, 20, 20);
        let bright_side = edged.pixel(14, 10)[0];
        assert!(bright_side > 150, "edge flattened to {bright_side}");
    }

    #[test]
    fn alpha_channel_is_untouched() {
        let mut r = RasterImage::filled(16, 16, [100, 100, 100, 137]).unwrap();
        r.put_pixel(8, 8, [250, 10, 10, 137]);
        smooth_rect(&mut r, 0, 0, 15, 15);
        for px in r.pixels().chunks_exact(4) {
            assert_eq!(px[3], 137);
        }
    }
}
