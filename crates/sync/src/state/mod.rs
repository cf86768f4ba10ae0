mod config;
mod subscription;
mod synchronizer;
mod table;
mod value;

pub use config::{SendPolicy, StateConfig};
pub use subscription::{ChangeCallback, ChangeSubscriptions, SubscriptionId};
pub use synchronizer::StateSynchronizer;
pub use table::{StateMap, StateTable};
pub use value::StateValue;
