//! Entity-state synchronization over an unreliable transport: buffered pose
//! interpolation for remote entities, rate-limited pose sampling for local
//! ones, and replicated per-player scalar attributes.

pub mod clock;
pub mod error;
pub mod id;
pub mod net;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod transform;

pub use clock::{Clock, ManualClock, SystemClock, server_time_offset};
pub use error::{ConfigError, MessageError, SyncError};
pub use id::{NetworkEntityId, PlayerId};
pub use net::{
    Envelope, FullStateSync, Message, MessageKind, NetworkSimulator, NetworkStats,
    PacketLossSimulation, RecordingTransport, Reliability, SimulatedEndpoint, StateUpdate,
    TransformUpdate, Transport,
};
pub use session::SyncSession;
pub use snapshot::{
    Estimate, EstimateKind, InterpolationConfig, InterpolationMethod, Interpolator, Pose,
    SnapshotBuffer, TransformSnapshot,
};
pub use state::{SendPolicy, StateConfig, StateSynchronizer, StateValue, SubscriptionId};
pub use transform::{ConsumptionMode, SyncConfig, SyncFields, SyncRole, Transform, TransformSynchronizer};
