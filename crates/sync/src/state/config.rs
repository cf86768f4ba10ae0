use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::StateValue;
use crate::net::Reliability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SendPolicy {
    /// Every `set` is sent on the reliable channel.
    #[default]
    Reliable,
    /// Every `set` is sent, delivery not guaranteed.
    Unreliable,
    /// Sent reliably, but only when the value differs from the last one sent for that key.
    Delta,
}

impl SendPolicy {
    pub fn reliability(self) -> Reliability {
        match self {
            Self::Reliable | Self::Delta => Reliability::Reliable,
            Self::Unreliable => Reliability::Unreliable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub policy: SendPolicy,
    /// Seed values for every row, local or replica, when it is first created.
    pub defaults: BTreeMap<String, StateValue>,
}

impl StateConfig {
    pub fn with_policy(policy: SendPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }
}
