use crate::model::{BodyRegion, FitTransform, GarmentSprite};

// Scaled sprite bounds relative to the body region.
const MIN_WIDTH_FRAC: f64 = 0.7;
const MAX_WIDTH_FRAC: f64 = 1.1;
const MIN_HEIGHT_FRAC: f64 = 0.7;
const MAX_HEIGHT_FRAC: f64 = 1.2;

// Fraction of the collar overflow shifted above the shoulder line.
const COLLAR_SHIFT: f64 = 0.3;

/// Compute the uniform scale and placement that fits the sprite onto the
/// body region while keeping the whole garment visible.
#[tracing::instrument(skip_all)]
pub fn solve(sprite: &GarmentSprite, region: &BodyRegion) -> FitTransform {
    let sprite_w = f64::from(sprite.raster.width()).max(1.0);
    let sprite_h = f64::from(sprite.raster.height()).max(1.0);

    let target_w = if region.actual_width > 0.0 {
        region.actual_width
    } else {
        region.width
    };
    let target_h = if region.actual_height > 0.0 {
        region.actual_height
    } else {
        region.height
    };

    let width_scale = target_w / sprite_w;
    let height_scale = target_h / sprite_h;
    let mut scale = width_scale.min(height_scale);

    // Width bound first, then height; either may raise or lower the scale.
    let scaled_w = sprite_w * scale;
    if scaled_w < region.width * MIN_WIDTH_FRAC {
        scale = region.width * MIN_WIDTH_FRAC / sprite_w;
    } else if scaled_w > region.width * MAX_WIDTH_FRAC {
        scale = region.width * MAX_WIDTH_FRAC / sprite_w;
    }
    let scaled_h = sprite_h * scale;
    if scaled_h < region.height * MIN_HEIGHT_FRAC {
        scale = region.height * MIN_HEIGHT_FRAC / sprite_h;
    } else if scaled_h > region.height * MAX_HEIGHT_FRAC {
        scale = region.height * MAX_HEIGHT_FRAC / sprite_h;
    }

    let scaled_w = sprite_w * scale;
    let scaled_h = sprite_h * scale;
    let x = region.center_x - scaled_w / 2.0;
    let y = region.origin_y - COLLAR_SHIFT * (scaled_h - target_h);

    FitTransform {
        x,
        y,
        scale_x: scale,
        scale_y: scale,
    }
}
