use crate::{
    model::{Bounds, GarmentSprite},
    raster::{RasterImage, Rgba8, luma, saturation},
    services::{PartLabel, PartSegmenter},
};

const EDGE_THRESHOLD: f32 = 30.0;
const BOX_PAD: u32 = 5;
const CROP_PAD: u32 = 20;
const ALPHA_FLOOR: u8 = 30;
const NEAR_WHITE_LUMA: f32 = 0.85;
const NEAR_WHITE_SAT: f32 = 0.2;
const GARMENT_MIN_SAT: f32 = 0.15;
const CENTER_RADIUS_FRAC: f64 = 0.6;
const NEAR_BLACK_MAX: u8 = 20;

/// Isolate the garment from a product photo into a cropped sprite with an
/// alpha mask. Degrades to the unmodified source when nothing usable is
/// found; never fails.
#[tracing::instrument(skip_all, fields(w = product.width(), h = product.height()))]
pub fn extract(product: &RasterImage, segmenter: Option<&dyn PartSegmenter>) -> GarmentSprite {
    let mask = match segmented_mask(product, segmenter) {
        Some(mask) => {
            tracing::debug!("garment mask from part segmentation");
            mask
        }
        None => heuristic_mask(product),
    };

    let Some(bbox) = mask_bounds(&mask, product.width(), product.height()) else {
        tracing::debug!("no garment pixels, passing source through");
        return GarmentSprite {
            raster: product.clone(),
            bounds: full_bounds(product),
            extracted: false,
        };
    };
    let bbox = bbox.padded(BOX_PAD, product.width(), product.height());

    let mut masked = product.clone();
    apply_mask(&mut masked, &bbox);
    cleanup_alpha(&mut masked);

    let crop = bbox.padded(CROP_PAD, product.width(), product.height());
    let raster = match masked.crop(crop.min_x, crop.min_y, crop.max_x, crop.max_y) {
        Ok(cropped) => cropped,
        // Crop bounds are derived from the mask, so this only trips on a
        // degenerate raster; degrade rather than fail.
        Err(_) => {
            return GarmentSprite {
                raster: product.clone(),
                bounds: full_bounds(product),
                extracted: false,
            };
        }
    };

    GarmentSprite {
        raster,
        bounds: crop,
        extracted: true,
    }
}

fn full_bounds(raster: &RasterImage) -> Bounds {
    Bounds {
        min_x: 0,
        min_y: 0,
        max_x: raster.width().saturating_sub(1),
        max_y: raster.height().saturating_sub(1),
    }
}

/// Torso/arm labels from the external segmenter, when it is present,
/// succeeds, matches the raster and labels at least one pixel.
fn segmented_mask(product: &RasterImage, segmenter: Option<&dyn PartSegmenter>) -> Option<Vec<bool>> {
    let map = match segmenter?.segment_parts(product) {
        Ok(map) => map,
        Err(err) => {
            tracing::debug!(%err, "part segmentation failed, using heuristic mask");
            return None;
        }
    };
    if map.width != product.width() || map.height != product.height() {
        tracing::debug!("part map dimensions mismatch, using heuristic mask");
        return None;
    }

    let mask: Vec<bool> = map
        .labels
        .iter()
        .map(|&l| matches!(l, PartLabel::Torso | PartLabel::LeftArm | PartLabel::RightArm))
        .collect();
    mask.iter().any(|&m| m).then_some(mask)
}

/// Two-pass heuristic classification: edge/skin flags, then a per-pixel
/// garment test combining saturation, luminance and distance from center.
fn heuristic_mask(product: &RasterImage) -> Vec<bool> {
    let (w, h) = (product.width(), product.height());
    let edges = edge_map(product);

    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;
    let half_diag = (cx * cx + cy * cy).sqrt();
    let max_dist = half_diag * CENTER_RADIUS_FRAC;

    let mut mask = vec![false; (w as usize) * (h as usize)];
    for y in 0..h {
        for x in 0..w {
            let idx = (y as usize) * (w as usize) + (x as usize);
            let px = product.pixel(x, y);
            if is_skin(px) {
                continue;
            }
            let lum = luma(px);
            let sat = saturation(px);
            if lum > NEAR_WHITE_LUMA && sat < NEAR_WHITE_SAT {
                continue;
            }
            if sat <= GARMENT_MIN_SAT && !edges[idx] {
                continue;
            }
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            if (dx * dx + dy * dy).sqrt() > max_dist {
                continue;
            }
            if px[0].max(px[1]).max(px[2]) < NEAR_BLACK_MAX {
                continue;
            }
            mask[idx] = true;
        }
    }
    mask
}

/// 3x3 gradient magnitude over luminance, thresholded on the 0-255 scale.
fn edge_map(raster: &RasterImage) -> Vec<bool> {
    let (w, h) = (raster.width() as i64, raster.height() as i64);
    let lum_at = |x: i64, y: i64| luma(raster.pixel_clamped(x, y)) * 255.0;

    let mut edges = vec![false; (w as usize) * (h as usize)];
    for y in 0..h {
        for x in 0..w {
            let gx = (lum_at(x + 1, y - 1) + 2.0 * lum_at(x + 1, y) + lum_at(x + 1, y + 1))
                - (lum_at(x - 1, y - 1) + 2.0 * lum_at(x - 1, y) + lum_at(x - 1, y + 1));
            let gy = (lum_at(x - 1, y + 1) + 2.0 * lum_at(x, y + 1) + lum_at(x + 1, y + 1))
                - (lum_at(x - 1, y - 1) + 2.0 * lum_at(x, y - 1) + lum_at(x + 1, y - 1));
            let mag = (gx * gx + gy * gy).sqrt() / 4.0;
            edges[(y * w + x) as usize] = mag > EDGE_THRESHOLD;
        }
    }
    edges
}

/// RGB skin classifier with normalized-channel bounds.
fn is_skin(px: Rgba8) -> bool {
    let (r, g, b) = (px[0], px[1], px[2]);
    if !(r > 95 && g > 40 && b > 20 && r > g && r > b) {
        return false;
    }
    if i16::from(r) - i16::from(g) <= 15 {
        return false;
    }
    let sum = f32::from(r) + f32::from(g) + f32::from(b);
    let nr = f32::from(r) / sum;
    let ng = f32::from(g) / sum;
    nr > 0.35 && nr < 0.65 && ng > 0.25 && ng < 0.37
}

fn mask_bounds(mask: &[bool], width: u32, height: u32) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;
    for y in 0..height {
        for x in 0..width {
            if !mask[(y as usize) * (width as usize) + (x as usize)] {
                continue;
            }
            bounds = Some(match bounds {
                None => Bounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => Bounds {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }
    }
    bounds
}

/// Zero alpha outside the box or on skin; zero near-white low-saturation
/// pixels inside the box.
fn apply_mask(raster: &mut RasterImage, bbox: &Bounds) {
    let (w, h) = (raster.width(), raster.height());
    for y in 0..h {
        for x in 0..w {
            let mut px = raster.pixel(x, y);
            let inside =
                x >= bbox.min_x && x <= bbox.max_x && y >= bbox.min_y && y <= bbox.max_y;
            let zero = if !inside || is_skin(px) {
                true
            } else {
                luma(px) > NEAR_WHITE_LUMA && saturation(px) < NEAR_WHITE_SAT
            };
            if zero && px[3] != 0 {
                px[3] = 0;
                raster.put_pixel(x, y, px);
            }
        }
    }
}

/// Faint residual alpha reads as haze after compositing; force it to zero.
fn cleanup_alpha(raster: &mut RasterImage) {
    for px in raster.pixels_mut().chunks_exact_mut(4) {
        if px[3] > 0 && px[3] < ALPHA_FLOOR {
            px[3] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{VestureError, VestureResult};
    use crate::services::PartMap;

    fn white_photo(w: u32, h: u32) -> RasterImage {
        RasterImage::filled(w, h, [255, 255, 255, 255]).unwrap()
    }

    /// Saturated red square centered on a white background.
    fn red_shirt_photo(w: u32, h: u32) -> RasterImage {
        let mut r = white_photo(w, h);
        for y in h / 4..3 * h / 4 {
            for x in w / 4..3 * w / 4 {
                r.put_pixel(x, y, [200, 30, 30, 255]);
            }
        }
        r
    }

    #[test]
    fn all_white_photo_degrades_to_source() {
        let photo = white_photo(400, 400);
        let sprite = extract(&photo, None);
        assert!(!sprite.extracted);
        assert_eq!(sprite.raster, photo);
        assert_eq!(sprite.raster.width(), 400);
        assert_eq!(sprite.raster.height(), 400);
    }

    #[test]
    fn saturated_center_is_extracted_and_cropped() {
        let photo = red_shirt_photo(200, 200);
        let sprite = extract(&photo, None);
        assert!(sprite.extracted);
        // Crop = garment box + 5 + 20 padding on each side.
        assert!(sprite.raster.width() < 200);
        assert!(sprite.bounds.min_x >= 25);
        // Background inside the crop is transparent, garment is not.
        let mid = sprite.raster.width() / 2;
        assert_eq!(sprite.raster.pixel(mid, sprite.raster.height() / 2)[3], 255);
        assert_eq!(sprite.raster.pixel(0, 0)[3], 0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let photo = red_shirt_photo(120, 160);
        let a = extract(&photo, None);
        let b = extract(&photo, None);
        assert_eq!(a.raster, b.raster);
        assert_eq!(a.bounds, b.bounds);
    }

    #[test]
    fn no_faint_alpha_survives_cleanup() {
        let mut photo = red_shirt_photo(100, 100);
        for a in [1u8, 15, 29] {
            photo.put_pixel(50, 50, [200, 30, 30, a]);
            let sprite = extract(&photo, None);
            for px in sprite.raster.pixels().chunks_exact(4) {
                assert!(px[3] == 0 || px[3] >= 30, "alpha {} in 1..30", px[3]);
            }
        }
    }

    #[test]
    fn skin_pixels_are_masked_out() {
        let mut photo = red_shirt_photo(100, 100);
        photo.put_pixel(50, 50, [220, 160, 120, 255]); // skin tone inside box
        let sprite = extract(&photo, None);
        assert!(sprite.extracted);
        let x = 50 - sprite.bounds.min_x;
        let y = 50 - sprite.bounds.min_y;
        assert_eq!(sprite.raster.pixel(x, y)[3], 0);
    }

    struct CenterTorso;
    impl PartSegmenter for CenterTorso {
        fn segment_parts(&self, raster: &RasterImage) -> VestureResult<PartMap> {
            let (w, h) = (raster.width(), raster.height());
            let mut labels = vec![PartLabel::Background; (w as usize) * (h as usize)];
            for y in h / 3..2 * h / 3 {
                for x in w / 3..2 * w / 3 {
                    labels[(y as usize) * (w as usize) + (x as usize)] = PartLabel::Torso;
                }
            }
            PartMap::new(w, h, labels)
        }
    }

    #[test]
    fn segmenter_mask_is_preferred_over_heuristic() {
        let photo = red_shirt_photo(90, 90);
        let sprite = extract(&photo, Some(&CenterTorso));
        assert!(sprite.extracted);
        // Torso labels cover rows 30..60; box pad 5 + crop pad 20 puts the
        // crop top at 5 rather than the heuristic box around rows 22..67.
        assert_eq!(sprite.bounds.min_y, 30 - BOX_PAD - CROP_PAD);
    }

    struct FailingSegmenter;
    impl PartSegmenter for FailingSegmenter {
        fn segment_parts(&self, _raster: &RasterImage) -> VestureResult<PartMap> {
            Err(VestureError::validation("offline"))
        }
    }

    #[test]
    fn failing_segmenter_falls_back_to_heuristic() {
        let photo = red_shirt_photo(100, 100);
        let with = extract(&photo, Some(&FailingSegmenter));
        let without = extract(&photo, None);
        assert!(with.extracted);
        assert_eq!(with.bounds, without.bounds);
    }
}
