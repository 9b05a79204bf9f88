use crate::{
    blend,
    error::VestureResult,
    model::{BodyRegion, FitTransform, GarmentSprite},
    raster::{RasterImage, Rgba8},
    smooth::smooth_rect,
};

const SPRITE_OPACITY: f32 = 0.95;
const SOFT_LIGHT_OPACITY: f32 = 0.15;
const OVERLAY_OPACITY: f32 = 0.08;

const SHADOW_BAND_FRAC: f64 = 0.15;
const SHADOW_MAX_OPACITY: f32 = 0.25;
const HIGHLIGHT_BAND_FRAC: f64 = 0.2;
const HIGHLIGHT_MAX_OPACITY: f32 = 0.12;

const SKIN_BLEND: f32 = 0.06;
const RELIGHT_GAIN: f32 = 0.04;
const SKIN_SAMPLE_RADIUS: i64 = 5;
const WARM_DEFAULT: Rgba8 = [224, 172, 140, 255];

// Trapezoid warp limits; the quad is a visual approximation, not a
// homography.
const QUAD_RATIO_MIN: f64 = 0.85;
const QUAD_RATIO_MAX: f64 = 1.15;
const QUAD_SHIFT_FRAC: f64 = 0.1;

const VISIBLE_ALPHA: u8 = 50;
const MIN_KEYPOINT_SCORE: f64 = 0.3;

/// Placement rectangle clipped to the canvas, inclusive pixel coordinates.
#[derive(Clone, Copy, Debug)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    fn from_placement(rect: kurbo::Rect, canvas: &RasterImage) -> Option<PixelRect> {
        let clipped = rect.intersect(kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(canvas.width()),
            f64::from(canvas.height()),
        ));
        if clipped.width() < 1.0 || clipped.height() < 1.0 {
            return None;
        }
        Some(PixelRect {
            x0: clipped.x0.floor() as u32,
            y0: clipped.y0.floor() as u32,
            x1: (clipped.x1.ceil() as u32 - 1).min(canvas.width() - 1),
            y1: (clipped.y1.ceil() as u32 - 1).min(canvas.height() - 1),
        })
    }

    fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }
}

/// Per-row destination geometry: a trapezoid interpolated between a top and
/// bottom edge. The axial case has identical edges.
#[derive(Clone, Copy, Debug)]
struct DestQuad {
    top_cx: f64,
    top_w: f64,
    bot_cx: f64,
    bot_w: f64,
}

#[derive(Clone, Copy, Debug)]
enum BlendKind {
    Normal,
    SoftLight,
    Overlay,
}

/// Composite the fitted sprite onto the user photo with texture re-draws,
/// shadow/highlight bands, skin-tone harmonization and seam smoothing.
/// Every write stays inside the placement rectangle; stages that cannot
/// compute a meaningful value skip themselves.
#[tracing::instrument(skip_all)]
pub fn render(
    user: &RasterImage,
    sprite: &GarmentSprite,
    fit: &FitTransform,
    region: &BodyRegion,
) -> VestureResult<RasterImage> {
    let mut canvas = user.clone();

    let placement = fit.placement(sprite.raster.width(), sprite.raster.height());
    let Some(rect) = PixelRect::from_placement(placement, &canvas) else {
        tracing::debug!("placement missed the canvas, returning base photo");
        return Ok(canvas);
    };

    let quad = dest_quad(&rect, region);
    let mut coverage = vec![0u8; (canvas.width() as usize) * (canvas.height() as usize)];

    draw_sprite(
        &mut canvas,
        sprite,
        &rect,
        &quad,
        BlendKind::Normal,
        SPRITE_OPACITY,
        Some(&mut coverage),
    );
    draw_sprite(
        &mut canvas,
        sprite,
        &rect,
        &quad,
        BlendKind::SoftLight,
        SOFT_LIGHT_OPACITY,
        None,
    );
    draw_sprite(
        &mut canvas,
        sprite,
        &rect,
        &quad,
        BlendKind::Overlay,
        OVERLAY_OPACITY,
        None,
    );

    shade_bands(&mut canvas, &rect);
    harmonize(&mut canvas, &rect, &coverage, user, region);
    smooth_rect(&mut canvas, rect.x0, rect.y0, rect.x1, rect.y1);

    Ok(canvas)
}

/// Destination trapezoid from shoulder/hip geometry when keypoints exist.
/// Not a homography solve: the bottom edge is narrowed or widened by the
/// hip-to-shoulder span ratio and shifted by the hip midline, both clamped.
fn dest_quad(rect: &PixelRect, region: &BodyRegion) -> DestQuad {
    let cx = f64::from(rect.x0) + f64::from(rect.width()) / 2.0;
    let w = f64::from(rect.width());
    let axial = DestQuad {
        top_cx: cx,
        top_w: w,
        bot_cx: cx,
        bot_w: w,
    };

    let find = |name: &str| {
        region
            .keypoint(name)
            .filter(|k| k.score >= MIN_KEYPOINT_SCORE)
    };
    let (Some(ls), Some(rs), Some(lh), Some(rh)) = (
        find("left_shoulder"),
        find("right_shoulder"),
        find("left_hip"),
        find("right_hip"),
    ) else {
        return axial;
    };

    let shoulder_span = (rs.x - ls.x).abs();
    let hip_span = (rh.x - lh.x).abs();
    if shoulder_span <= 0.0 || hip_span <= 0.0 {
        return axial;
    }

    let ratio = (hip_span / shoulder_span).clamp(QUAD_RATIO_MIN, QUAD_RATIO_MAX);
    let lean = ((lh.x + rh.x) / 2.0 - (ls.x + rs.x) / 2.0)
        .clamp(-w * QUAD_SHIFT_FRAC, w * QUAD_SHIFT_FRAC);
    DestQuad {
        top_cx: cx,
        top_w: w,
        bot_cx: cx + lean,
        bot_w: w * ratio,
    }
}

/// Row-interpolated sprite draw. Coverage, when requested, records the
/// sampled sprite alpha per canvas pixel for the harmonization stage.
fn draw_sprite(
    canvas: &mut RasterImage,
    sprite: &GarmentSprite,
    rect: &PixelRect,
    quad: &DestQuad,
    kind: BlendKind,
    opacity: f32,
    mut coverage: Option<&mut Vec<u8>>,
) {
    let (sw, sh) = (sprite.raster.width(), sprite.raster.height());
    if sw == 0 || sh == 0 {
        return;
    }
    let rows = f64::from(rect.height());
    let canvas_w = canvas.width() as usize;

    for y in rect.y0..=rect.y1 {
        let t = if rect.height() > 1 {
            f64::from(y - rect.y0) / (rows - 1.0)
        } else {
            0.0
        };
        let row_cx = quad.top_cx + (quad.bot_cx - quad.top_cx) * t;
        let row_w = quad.top_w + (quad.bot_w - quad.top_w) * t;
        if row_w < 1.0 {
            continue;
        }
        let row_x0 = row_cx - row_w / 2.0;

        let sy = ((t * f64::from(sh - 1)).round() as u32).min(sh - 1);
        for x in rect.x0..=rect.x1 {
            let u = (f64::from(x) + 0.5 - row_x0) / row_w;
            if !(0.0..1.0).contains(&u) {
                continue;
            }
            let sx = ((u * f64::from(sw)).floor() as u32).min(sw - 1);
            let src = sprite.raster.pixel(sx, sy);
            if src[3] == 0 {
                continue;
            }

            let dst = canvas.pixel(x, y);
            let out = match kind {
                BlendKind::Normal => blend::over(dst, src, opacity),
                BlendKind::SoftLight => blend::soft_light(dst, src, opacity),
                BlendKind::Overlay => blend::overlay(dst, src, opacity),
            };
            canvas.put_pixel(x, y, out);

            if let Some(cov) = coverage.as_deref_mut() {
                let idx = (y as usize) * canvas_w + (x as usize);
                cov[idx] = cov[idx].max(src[3]);
            }
        }
    }
}

/// Soft drop shadow over the bottom band and soft highlight over the top
/// band of the placement rectangle, both linear ramps.
fn shade_bands(canvas: &mut RasterImage, rect: &PixelRect) {
    let h = f64::from(rect.height());
    let shadow_rows = (h * SHADOW_BAND_FRAC).round() as u32;
    let highlight_rows = (h * HIGHLIGHT_BAND_FRAC).round() as u32;

    if shadow_rows > 0 {
        let band_y0 = rect.y1 + 1 - shadow_rows.min(rect.height());
        for y in band_y0..=rect.y1 {
            let ramp = ((y - band_y0 + 1) as f32) / (shadow_rows as f32);
            let opacity = ramp * SHADOW_MAX_OPACITY;
            for x in rect.x0..=rect.x1 {
                let dst = canvas.pixel(x, y);
                canvas.put_pixel(x, y, blend::over(dst, [0, 0, 0, 255], opacity));
            }
        }
    }

    if highlight_rows > 0 {
        let band_y1 = rect.y0 + highlight_rows.min(rect.height()) - 1;
        for y in rect.y0..=band_y1 {
            let ramp = 1.0 - ((y - rect.y0) as f32) / (highlight_rows as f32);
            let opacity = ramp * HIGHLIGHT_MAX_OPACITY;
            for x in rect.x0..=rect.x1 {
                let dst = canvas.pixel(x, y);
                canvas.put_pixel(x, y, blend::over(dst, [255, 255, 255, 255], opacity));
            }
        }
    }
}

/// Pull garment pixels toward the wearer's skin tone and relight radially
/// from the rectangle center.
fn harmonize(
    canvas: &mut RasterImage,
    rect: &PixelRect,
    coverage: &[u8],
    user: &RasterImage,
    region: &BodyRegion,
) {
    let skin = skin_reference(user, region);
    let canvas_w = canvas.width() as usize;

    let cx = f64::from(rect.x0) + f64::from(rect.width()) / 2.0;
    let cy = f64::from(rect.y0) + f64::from(rect.height()) / 2.0;
    let half_diag =
        (f64::from(rect.width()).powi(2) + f64::from(rect.height()).powi(2)).sqrt() / 2.0;
    if half_diag <= 0.0 {
        return;
    }

    for y in rect.y0..=rect.y1 {
        for x in rect.x0..=rect.x1 {
            let mut px = canvas.pixel(x, y);

            let covered = coverage[(y as usize) * canvas_w + (x as usize)] > VISIBLE_ALPHA;
            if covered {
                for c in 0..3 {
                    let v = f32::from(px[c]) + (f32::from(skin[c]) - f32::from(px[c])) * SKIN_BLEND;
                    px[c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }

            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let dist = (((dx * dx + dy * dy).sqrt() / half_diag).min(1.0)) as f32;
            let gain = 1.0 + RELIGHT_GAIN * (1.0 - dist);
            for c in 0..3 {
                px[c] = (f32::from(px[c]) * gain).round().clamp(0.0, 255.0) as u8;
            }

            canvas.put_pixel(x, y, px);
        }
    }
}

/// Mean color around a facial keypoint, else a fixed warm default.
fn skin_reference(user: &RasterImage, region: &BodyRegion) -> Rgba8 {
    let face = ["nose", "left_eye", "right_eye", "left_ear", "right_ear"]
        .iter()
        .find_map(|name| {
            region
                .keypoint(name)
                .filter(|k| k.score >= MIN_KEYPOINT_SCORE)
        });
    let Some(kp) = face else {
        return WARM_DEFAULT;
    };

    let (mut acc, mut count) = ([0u64; 3], 0u64);
    let (px0, py0) = (kp.x.round() as i64, kp.y.round() as i64);
    for dy in -SKIN_SAMPLE_RADIUS..=SKIN_SAMPLE_RADIUS {
        for dx in -SKIN_SAMPLE_RADIUS..=SKIN_SAMPLE_RADIUS {
            if !user.contains(px0 + dx, py0 + dy) {
                continue;
            }
            let p = user.pixel((px0 + dx) as u32, (py0 + dy) as u32);
            for c in 0..3 {
                acc[c] += u64::from(p[c]);
            }
            count += 1;
        }
    }
    if count == 0 {
        return WARM_DEFAULT;
    }
    [
        (acc[0] / count) as u8,
        (acc[1] / count) as u8,
        (acc[2] / count) as u8,
        255,
    ]
}
