use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::snapshot::{InterpolationConfig, InterpolationMethod};

pub const DEFAULT_SEND_RATE: u32 = 20;
pub const DEFAULT_INTERPOLATION_SPEED: f32 = 10.0;

/// Which pose components an entity replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFields {
    pub position: bool,
    pub rotation: bool,
    pub scale: bool,
    /// Sender-derived velocity, consumed by Hermite interpolation.
    pub velocity: bool,
}

impl Default for SyncFields {
    fn default() -> Self {
        Self {
            position: true,
            rotation: true,
            scale: false,
            velocity: false,
        }
    }
}

impl SyncFields {
    pub fn all() -> Self {
        Self {
            position: true,
            rotation: true,
            scale: true,
            velocity: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsumptionMode {
    /// Chase the latest received pose at `interpolation_speed`.
    Direct,
    /// Render from the snapshot buffer, `buffer_time_ms` behind.
    #[default]
    Buffered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub fields: SyncFields,
    /// Outbound samples per second.
    pub send_rate: u32,
    pub mode: ConsumptionMode,
    /// Blend rate per second for direct mode.
    pub interpolation_speed: f32,
    pub interpolation: InterpolationConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fields: SyncFields::default(),
            send_rate: DEFAULT_SEND_RATE,
            mode: ConsumptionMode::default(),
            interpolation_speed: DEFAULT_INTERPOLATION_SPEED,
            interpolation: InterpolationConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn direct() -> Self {
        Self {
            mode: ConsumptionMode::Direct,
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: InterpolationMethod) -> Self {
        self.interpolation.method = method;
        self
    }

    pub fn send_interval_ms(&self) -> f64 {
        1000.0 / self.send_rate.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_rate == 0 {
            return Err(ConfigError::ZeroSendRate);
        }
        if !self.interpolation_speed.is_finite() || self.interpolation_speed < 0.0 {
            return Err(ConfigError::InvalidSpeed(self.interpolation_speed));
        }
        self.interpolation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.send_interval_ms(), 50.0);
    }

    #[test]
    fn rejects_bad_values() {
        let config = SyncConfig {
            send_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroSendRate)));

        let config = SyncConfig {
            interpolation_speed: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSpeed(_))));

        let mut config = SyncConfig::default();
        config.interpolation.max_extrapolation_ms = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { field: "max_extrapolation_ms", .. })
        ));
    }
}
