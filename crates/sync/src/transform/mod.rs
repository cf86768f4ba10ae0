mod config;
mod synchronizer;

pub use config::{ConsumptionMode, SyncConfig, SyncFields};
pub use synchronizer::{SyncRole, Transform, TransformSynchronizer};
