use std::rc::Rc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::config::{ConsumptionMode, SyncConfig};
use crate::clock::Clock;
use crate::error::ConfigError;
use crate::id::NetworkEntityId;
use crate::net::{Message, Reliability, TransformUpdate, Transport};
use crate::snapshot::{EstimateKind, Interpolator, Pose, math};

/// The rendered pose of an entity, owned by whoever drives the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Copies the components present in `pose`.
    pub fn apply(&mut self, pose: &Pose) {
        if let Some(position) = pose.position {
            self.position = position;
        }
        if let Some(rotation) = pose.rotation {
            self.rotation = rotation;
        }
        if let Some(scale) = pose.scale {
            self.scale = scale;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Authoritative: samples the transform and sends it.
    Local,
    /// Replica: reconstructs the transform from received updates.
    Remote,
}

pub struct TransformSynchronizer {
    network_id: NetworkEntityId,
    role: SyncRole,
    config: SyncConfig,
    transform: Transform,
    interpolator: Interpolator,
    target: Pose,
    last_send_ms: Option<f64>,
    last_sent_position: Option<(f64, Vec3)>,
    clock: Rc<dyn Clock>,
    transport: Rc<dyn Transport>,
}

impl std::fmt::Debug for TransformSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSynchronizer")
            .field("network_id", &self.network_id)
            .field("role", &self.role)
            .field("transform", &self.transform)
            .field("target", &self.target)
            .field("last_send_ms", &self.last_send_ms)
            .finish_non_exhaustive()
    }
}

impl TransformSynchronizer {
    pub fn new(
        network_id: NetworkEntityId,
        role: SyncRole,
        config: SyncConfig,
        clock: Rc<dyn Clock>,
        transport: Rc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let interpolator = Interpolator::new(config.interpolation.clone(), Rc::clone(&clock))?;

        Ok(Self {
            network_id,
            role,
            config,
            transform: Transform::default(),
            interpolator,
            target: Pose::default(),
            last_send_ms: None,
            last_sent_position: None,
            clock,
            transport,
        })
    }

    pub fn network_id(&self) -> NetworkEntityId {
        self.network_id
    }

    pub fn role(&self) -> SyncRole {
        self.role
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn target(&self) -> &Pose {
        &self.target
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    pub fn interpolator_mut(&mut self) -> &mut Interpolator {
        &mut self.interpolator
    }

    /// How the last buffered-mode pose was produced.
    pub fn last_estimate(&self) -> Option<EstimateKind> {
        self.interpolator.stats().last_estimate
    }

    /// Once per frame. `delta` is the elapsed frame time in seconds.
    pub fn update(&mut self, delta: f32) {
        match (self.role, self.config.mode) {
            (SyncRole::Local, _) => self.sample_and_send(),
            (SyncRole::Remote, ConsumptionMode::Direct) => self.approach_target(delta),
            (SyncRole::Remote, ConsumptionMode::Buffered) => self.apply_buffered(),
        }
    }

    // Rate limited, not queued: a missed interval is simply skipped.
    fn sample_and_send(&mut self) {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_send_ms {
            if now - last < self.config.send_interval_ms() {
                return;
            }
        }

        let fields = self.config.fields;
        let mut pose = Pose::default();
        if fields.position {
            pose.position = Some(self.transform.position);
        }
        if fields.rotation {
            pose.rotation = Some(self.transform.rotation);
        }
        if fields.scale {
            pose.scale = Some(self.transform.scale);
        }
        if fields.velocity {
            pose.velocity = Some(match self.last_sent_position {
                Some((sent_at, previous)) if now > sent_at => {
                    (self.transform.position - previous) / ((now - sent_at) / 1000.0) as f32
                }
                _ => Vec3::ZERO,
            });
        }

        // Stamped on the server clock, the same base replicas render against.
        let stamp = self.interpolator.server_now_ms();
        let update = TransformUpdate::from_pose(self.network_id, stamp, &pose);
        self.transport
            .send(Message::TransformUpdate(update), Reliability::Unreliable);

        self.last_send_ms = Some(now);
        self.last_sent_position = Some((now, self.transform.position));
    }

    fn approach_target(&mut self, delta: f32) {
        let blend = (self.config.interpolation_speed * delta).clamp(0.0, 1.0);

        if let Some(position) = self.target.position {
            self.transform.position = self.transform.position.lerp(position, blend);
        }
        if let Some(rotation) = self.target.rotation {
            self.transform.rotation = math::slerp(self.transform.rotation, rotation, blend);
        }
        if let Some(scale) = self.target.scale {
            self.transform.scale = self.transform.scale.lerp(scale, blend);
        }
    }

    fn apply_buffered(&mut self) {
        let now = self.interpolator.server_now_ms();
        if let Some(estimate) = self.interpolator.get_interpolated_state(now) {
            self.transform.apply(&estimate.pose);
        }
    }

    /// Feeds an inbound update. Returns false when the update was not for this
    /// replica and was dropped.
    pub fn receive(&mut self, update: &TransformUpdate) -> bool {
        if self.role == SyncRole::Local {
            log::debug!("{} is locally owned, ignoring inbound update", self.network_id);
            return false;
        }
        if update.network_id != self.network_id {
            log::warn!(
                "update for {} delivered to {}, ignoring",
                update.network_id,
                self.network_id
            );
            return false;
        }

        let pose = update.pose();
        self.interpolator.add_snapshot(Some(update.timestamp), pose);
        self.target.merge(&pose);
        true
    }

    /// Drops buffered history, e.g. on despawn or reconnect.
    pub fn clear(&mut self) {
        self.interpolator.clear();
        self.target = Pose::default();
    }
}
