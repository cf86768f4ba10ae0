use rkyv::rancor;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("send rate must be greater than zero")]
    ZeroSendRate,
    #[error("snapshot buffer capacity must be greater than zero")]
    ZeroCapacity,
    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("interpolation speed must be finite and non-negative, got {0}")]
    InvalidSpeed(f32),
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("envelope magic {magic:#x} / version {version} not recognised")]
    InvalidEnvelope { magic: u32, version: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Message(#[from] MessageError),
}

pub(crate) fn check_duration(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}
