#![forbid(unsafe_code)]

pub mod blend;
pub mod codec;
pub mod error;
pub mod extract;
pub mod fit;
pub mod locate;
pub mod model;
pub mod pipeline;
pub mod raster;
pub mod render;
pub mod services;
pub mod smooth;

pub use error::{VestureError, VestureResult};
pub use model::{BodyRegion, BodyRegionSource, Bounds, FitTransform, GarmentSprite, Keypoint};
pub use pipeline::try_on;
pub use raster::{RasterImage, Rgba8};
pub use services::{
    CancelToken, InferenceServices, NullPartSegmenter, NullPoseEstimator, PartLabel, PartMap,
    PartSegmenter, PoseEstimator,
};
