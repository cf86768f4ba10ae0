use glam::{Quat, Vec3};

/// A partial pose. Each component is independently present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    /// Units per second.
    pub velocity: Option<Vec3>,
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.rotation.is_none()
            && self.scale.is_none()
            && self.velocity.is_none()
    }

    /// Overwrites the components present in `newer`, keeps the rest.
    pub fn merge(&mut self, newer: &Pose) {
        if newer.position.is_some() {
            self.position = newer.position;
        }
        if newer.rotation.is_some() {
            self.rotation = newer.rotation;
        }
        if newer.scale.is_some() {
            self.scale = newer.scale;
        }
        if newer.velocity.is_some() {
            self.velocity = newer.velocity;
        }
    }
}

/// A pose sample stamped in milliseconds. Never mutated once buffered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSnapshot {
    pub timestamp: f64,
    pub pose: Pose,
}

impl TransformSnapshot {
    pub fn new(timestamp: f64, pose: Pose) -> Self {
        Self { timestamp, pose }
    }
}
