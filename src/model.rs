use crate::{
    error::{VestureError, VestureResult},
    raster::RasterImage,
};

/// Named body landmark with detector confidence, in user-photo pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// Inclusive pixel rectangle in source-image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Grow by `pad` on every side, clamped into a `width`x`height` image.
    pub fn padded(&self, pad: u32, width: u32, height: u32) -> Bounds {
        Bounds {
            min_x: self.min_x.saturating_sub(pad),
            min_y: self.min_y.saturating_sub(pad),
            max_x: (self.max_x + pad).min(width.saturating_sub(1)),
            max_y: (self.max_y + pad).min(height.saturating_sub(1)),
        }
    }
}

/// Garment isolated from its product photo. `extracted=false` means
/// isolation found nothing usable and `raster` is the unmodified source.
#[derive(Clone, Debug)]
pub struct GarmentSprite {
    pub raster: RasterImage,
    pub bounds: Bounds,
    pub extracted: bool,
}

/// Which locator tier produced a [`BodyRegion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BodyRegionSource {
    Pose,
    Segmentation,
    Heuristic,
}

/// Torso placement estimate inside the user photo. `width`/`height` carry
/// the margin-expanded region; `actual_*` the tight landmark extents.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BodyRegion {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
    pub actual_width: f64,
    pub actual_height: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub shoulder_y: f64,
    pub waist_y: f64,
    pub source: BodyRegionSource,
    pub keypoints: Option<Vec<Keypoint>>,
}

impl BodyRegion {
    pub fn validate(&self) -> VestureResult<()> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(VestureError::validation(
                "body region width/height must be > 0",
            ));
        }
        Ok(())
    }

    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints
            .as_deref()
            .and_then(|kps| kps.iter().find(|k| k.name == name))
    }
}

/// Sprite-space to user-photo-space placement.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FitTransform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl FitTransform {
    /// Destination rectangle for a sprite of the given size.
    pub fn placement(&self, sprite_w: u32, sprite_h: u32) -> kurbo::Rect {
        kurbo::Rect::new(
            self.x,
            self.y,
            self.x + f64::from(sprite_w) * self.scale_x,
            self.y + f64::from(sprite_h) * self.scale_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_padding_clamps_to_image() {
        let b = Bounds {
            min_x: 2,
            min_y: 3,
            max_x: 8,
            max_y: 9,
        };
        let p = b.padded(5, 10, 10);
        assert_eq!(p.min_x, 0);
        assert_eq!(p.min_y, 0);
        assert_eq!(p.max_x, 9);
        assert_eq!(p.max_y, 9);
        assert_eq!(p.width(), 10);
    }

    #[test]
    fn placement_rect_scales_sprite_dims() {
        let fit = FitTransform {
            x: 10.0,
            y: 20.0,
            scale_x: 0.5,
            scale_y: 0.5,
        };
        let rect = fit.placement(100, 200);
        assert_eq!(rect.width(), 50.0);
        assert_eq!(rect.height(), 100.0);
        assert_eq!(rect.x0, 10.0);
        assert_eq!(rect.y0, 20.0);
    }

    #[test]
    fn region_validate_rejects_degenerate() {
        let mut region = BodyRegion {
            origin_x: 0.0,
            origin_y: 0.0,
            width: 10.0,
            height: 10.0,
            actual_width: 10.0,
            actual_height: 10.0,
            center_x: 5.0,
            center_y: 5.0,
            shoulder_y: 0.0,
            waist_y: 10.0,
            source: BodyRegionSource::Heuristic,
            keypoints: None,
        };
        assert!(region.validate().is_ok());
        region.width = 0.0;
        assert!(region.validate().is_err());
    }

    #[test]
    fn json_roundtrip() {
        let region = BodyRegion {
            origin_x: 1.0,
            origin_y: 2.0,
            width: 3.0,
            height: 4.0,
            actual_width: 3.0,
            actual_height: 4.0,
            center_x: 2.5,
            center_y: 4.0,
            shoulder_y: 2.0,
            waist_y: 6.0,
            source: BodyRegionSource::Pose,
            keypoints: Some(vec![Keypoint {
                name: "left_shoulder".to_string(),
                x: 1.0,
                y: 2.0,
                score: 0.9,
            }]),
        };
        let s = serde_json::to_string(&region).unwrap();
        let de: BodyRegion = serde_json::from_str(&s).unwrap();
        assert_eq!(de.source, BodyRegionSource::Pose);
        assert_eq!(de.keypoints.unwrap().len(), 1);
    }
}
