use crate::{
    model::{BodyRegion, BodyRegionSource, Keypoint},
    raster::RasterImage,
    services::{InferenceServices, PartLabel, PartMap},
};

const MIN_KEYPOINT_SCORE: f64 = 0.3;

// Margins expanding the tight landmark extents into the placement region.
const POSE_WIDTH_MARGIN: f64 = 0.1;
const POSE_HEIGHT_MARGIN: f64 = 0.4; // below the shoulder line
const SEG_WIDTH_MARGIN: f64 = 0.15;
const SEG_HEIGHT_MARGIN: f64 = 0.3;

// Fixed torso proportions when no service can see the body.
const HEURISTIC_WIDTH_FRAC: f64 = 0.7;
const HEURISTIC_HEIGHT_FRAC: f64 = 0.45;
const HEURISTIC_TOP_FRAC: f64 = 0.25;

/// Estimate where the torso sits in the user photo. Pose keypoints are
/// tried first, then part segmentation, then fixed proportions; the last
/// tier always succeeds, so this never fails.
#[tracing::instrument(skip_all, fields(w = user.width(), h = user.height()))]
pub fn locate(user: &RasterImage, services: &InferenceServices) -> BodyRegion {
    if let Some(region) = pose_tier(user, services) {
        tracing::debug!("body region from pose keypoints");
        return region;
    }
    if let Some(region) = segmentation_tier(user, services) {
        tracing::debug!("body region from part segmentation");
        return region;
    }
    tracing::debug!("body region from fixed proportions");
    heuristic_tier(user)
}

fn pose_tier(user: &RasterImage, services: &InferenceServices) -> Option<BodyRegion> {
    let pose = services.pose.as_deref()?;
    let keypoints = match pose.estimate_pose(user) {
        Ok(kps) => kps,
        Err(err) => {
            tracing::debug!(%err, "pose estimation failed");
            return None;
        }
    };

    let find = |name: &str| {
        keypoints
            .iter()
            .find(|k| k.name == name && k.score >= MIN_KEYPOINT_SCORE)
    };
    let ls = find("left_shoulder")?;
    let rs = find("right_shoulder")?;
    let lh = find("left_hip")?;
    let rh = find("right_hip")?;

    let shoulder_y = ls.y.min(rs.y);
    let waist_y = lh.y.max(rh.y);
    let xs = [ls.x, rs.x, lh.x, rh.x];
    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let actual_width = max_x - min_x;
    let actual_height = waist_y - shoulder_y;
    if actual_width <= 0.0 || actual_height <= 0.0 {
        tracing::debug!("degenerate keypoint extents");
        return None;
    }

    Some(clamped_region(
        user,
        min_x - actual_width * POSE_WIDTH_MARGIN,
        shoulder_y,
        actual_width * (1.0 + 2.0 * POSE_WIDTH_MARGIN),
        actual_height * (1.0 + POSE_HEIGHT_MARGIN),
        actual_width,
        actual_height,
        shoulder_y,
        waist_y,
        BodyRegionSource::Pose,
        Some(keypoints.clone()),
    ))
}

fn segmentation_tier(user: &RasterImage, services: &InferenceServices) -> Option<BodyRegion> {
    let segmenter = services.segmenter.as_deref()?;
    let map = match segmenter.segment_parts(user) {
        Ok(map) => map,
        Err(err) => {
            tracing::debug!(%err, "part segmentation failed");
            return None;
        }
    };
    if map.width != user.width() || map.height != user.height() {
        tracing::debug!("part map dimensions mismatch");
        return None;
    }

    let torso = label_extents(&map, |l| l == PartLabel::Torso)?;
    let arms = label_extents(&map, |l| {
        matches!(l, PartLabel::LeftArm | PartLabel::RightArm)
    });

    let shoulder_y = f64::from(torso.1);
    let waist_y = f64::from(torso.3);
    let (min_x, max_x) = match arms {
        Some((ax0, _, ax1, _)) => (f64::from(ax0), f64::from(ax1)),
        None => (f64::from(torso.0), f64::from(torso.2)),
    };

    let actual_width = max_x - min_x;
    let actual_height = waist_y - shoulder_y;
    if actual_width <= 0.0 || actual_height <= 0.0 {
        return None;
    }

    Some(clamped_region(
        user,
        min_x - actual_width * SEG_WIDTH_MARGIN,
        shoulder_y,
        actual_width * (1.0 + 2.0 * SEG_WIDTH_MARGIN),
        actual_height * (1.0 + SEG_HEIGHT_MARGIN),
        actual_width,
        actual_height,
        shoulder_y,
        waist_y,
        BodyRegionSource::Segmentation,
        None,
    ))
}

fn heuristic_tier(user: &RasterImage) -> BodyRegion {
    let w = f64::from(user.width());
    let h = f64::from(user.height());
    let width = w * HEURISTIC_WIDTH_FRAC;
    let height = h * HEURISTIC_HEIGHT_FRAC;
    let origin_x = (w - width) / 2.0;
    let origin_y = h * HEURISTIC_TOP_FRAC;
    BodyRegion {
        origin_x,
        origin_y,
        width,
        height,
        actual_width: width,
        actual_height: height,
        center_x: origin_x + width / 2.0,
        center_y: origin_y + height / 2.0,
        shoulder_y: origin_y,
        waist_y: origin_y + height,
        source: BodyRegionSource::Heuristic,
        keypoints: None,
    }
}

/// `(min_x, min_y, max_x, max_y)` of pixels matching the predicate.
fn label_extents(map: &PartMap, pred: impl Fn(PartLabel) -> bool) -> Option<(u32, u32, u32, u32)> {
    let mut extents: Option<(u32, u32, u32, u32)> = None;
    for y in 0..map.height {
        for x in 0..map.width {
            if !pred(map.label(x, y)) {
                continue;
            }
            extents = Some(match extents {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    extents
}

#[allow(clippy::too_many_arguments)]
fn clamped_region(
    user: &RasterImage,
    origin_x: f64,
    origin_y: f64,
    width: f64,
    height: f64,
    actual_width: f64,
    actual_height: f64,
    shoulder_y: f64,
    waist_y: f64,
    source: BodyRegionSource,
    keypoints: Option<Vec<Keypoint>>,
) -> BodyRegion {
    let img_w = f64::from(user.width());
    let img_h = f64::from(user.height());
    let width = width.min(img_w);
    let height = height.min(img_h);
    let origin_x = origin_x.clamp(0.0, img_w - width);
    let origin_y = origin_y.clamp(0.0, img_h - height);
    BodyRegion {
        origin_x,
        origin_y,
        width,
        height,
        actual_width,
        actual_height,
        center_x: origin_x + width / 2.0,
        center_y: origin_y + height / 2.0,
        shoulder_y,
        waist_y,
        source,
        keypoints,
    }
}
