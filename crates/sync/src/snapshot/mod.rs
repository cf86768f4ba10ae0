mod buffer;
mod interpolator;
pub mod math;
mod pose;

pub use buffer::SnapshotBuffer;
pub use interpolator::{
    Estimate, EstimateKind, InterpolationConfig, InterpolationMethod, InterpolationStats,
    Interpolator,
};
pub use pose::{Pose, TransformSnapshot};
