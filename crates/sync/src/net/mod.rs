mod protocol;
mod simulator;
mod stats;
mod transport;

pub use protocol::{
    ArchivedEnvelope, Envelope, FullStateSync, Message, MessageKind, PlayerState, StateEntry,
    StateUpdate, TransformUpdate, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use simulator::{NetworkSimulator, SimulatedEndpoint};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use transport::{RecordingTransport, Reliability, Transport};
