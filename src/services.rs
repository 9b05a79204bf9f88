use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    error::{VestureError, VestureResult},
    model::Keypoint,
    raster::RasterImage,
};

/// Per-pixel label emitted by a part segmenter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PartLabel {
    Background,
    Face,
    Torso,
    LeftArm,
    RightArm,
}

/// Label grid aligned with the raster the segmenter was given.
#[derive(Clone, Debug)]
pub struct PartMap {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<PartLabel>,
}

impl PartMap {
    pub fn new(width: u32, height: u32, labels: Vec<PartLabel>) -> VestureResult<Self> {
        if labels.len() != (width as usize) * (height as usize) {
            return Err(VestureError::validation(
                "part map labels must match width*height",
            ));
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    #[inline]
    pub fn label(&self, x: u32, y: u32) -> PartLabel {
        self.labels[(y as usize) * (self.width as usize) + (x as usize)]
    }
}

/// External pose estimation capability. Implementations wrap a model
/// binding; the pipeline treats failure as "tier unavailable".
pub trait PoseEstimator: Send + Sync {
    fn estimate_pose(&self, raster: &RasterImage) -> VestureResult<Vec<Keypoint>>;
}

/// External body-part segmentation capability.
pub trait PartSegmenter: Send + Sync {
    fn segment_parts(&self, raster: &RasterImage) -> VestureResult<PartMap>;
}

/// Absent pose service; always reports unavailability.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPoseEstimator;

impl PoseEstimator for NullPoseEstimator {
    fn estimate_pose(&self, _raster: &RasterImage) -> VestureResult<Vec<Keypoint>> {
        Err(VestureError::validation("pose estimation unavailable"))
    }
}

/// Absent segmentation service; always reports unavailability.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPartSegmenter;

impl PartSegmenter for NullPartSegmenter {
    fn segment_parts(&self, _raster: &RasterImage) -> VestureResult<PartMap> {
        Err(VestureError::validation("part segmentation unavailable"))
    }
}

/// Optional external services handed to the pipeline. Handles are created
/// once per process and shared read-only across requests.
#[derive(Clone, Default)]
pub struct InferenceServices {
    pub pose: Option<Arc<dyn PoseEstimator>>,
    pub segmenter: Option<Arc<dyn PartSegmenter>>,
}

impl InferenceServices {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Cooperative cancellation flag, checked between stages and inside the
/// long pixel loops. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn bail_if_cancelled(&self) -> VestureResult<()> {
        if self.is_cancelled() {
            Err(VestureError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_map_len_is_validated() {
        assert!(PartMap::new(2, 2, vec![PartLabel::Background; 3]).is_err());
        let map = PartMap::new(2, 2, vec![PartLabel::Torso; 4]).unwrap();
        assert_eq!(map.label(1, 1), PartLabel::Torso);
    }

    #[test]
    fn null_services_report_unavailable() {
        let raster = RasterImage::blank(1, 1).unwrap();
        assert!(NullPoseEstimator.estimate_pose(&raster).is_err());
        assert!(NullPartSegmenter.segment_parts(&raster).is_err());
    }

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.bail_if_cancelled().is_ok());
        other.cancel();
        assert!(matches!(
            token.bail_if_cancelled(),
            Err(VestureError::Cancelled)
        ));
    }
}
