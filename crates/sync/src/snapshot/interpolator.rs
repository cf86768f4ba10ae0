use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::buffer::SnapshotBuffer;
use super::math::{catmull_rom, hermite, lerp_option, slerp_option};
use super::pose::{Pose, TransformSnapshot};
use crate::clock::{Clock, server_time_offset};
use crate::error::{ConfigError, check_duration};

pub const DEFAULT_BUFFER_TIME_MS: f64 = 100.0;
pub const DEFAULT_MAX_EXTRAPOLATION_MS: f64 = 200.0;
pub const DEFAULT_MAX_SNAPSHOTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Hermite,
    CatmullRom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationConfig {
    pub method: InterpolationMethod,
    pub buffer_time_ms: f64,
    pub extrapolate: bool,
    pub max_extrapolation_ms: f64,
    pub max_snapshots: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::Linear,
            buffer_time_ms: DEFAULT_BUFFER_TIME_MS,
            extrapolate: true,
            max_extrapolation_ms: DEFAULT_MAX_EXTRAPOLATION_MS,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

impl InterpolationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_snapshots == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        check_duration("buffer_time_ms", self.buffer_time_ms)?;
        check_duration("max_extrapolation_ms", self.max_extrapolation_ms)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateKind {
    /// Blended between two buffered snapshots.
    Interpolated,
    /// Projected forward from the two newest snapshots.
    Extrapolated,
    /// The newest snapshot, unchanged.
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Time the pose is valid for.
    pub timestamp: f64,
    pub pose: Pose,
    pub kind: EstimateKind,
}

#[derive(Debug, Clone)]
pub struct InterpolationStats {
    pub buffer_len: usize,
    pub server_time_offset_ms: f64,
    /// Kind of the most recent query result, `None` if it produced nothing.
    pub last_estimate: Option<EstimateKind>,
}

/// Turns a sparse, jittery stream of snapshots into a continuous pose estimate.
pub struct Interpolator {
    config: InterpolationConfig,
    buffer: SnapshotBuffer,
    server_time_offset_ms: f64,
    last_estimate: Cell<Option<EstimateKind>>,
    clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpolator")
            .field("config", &self.config)
            .field("buffer", &self.buffer)
            .field("server_time_offset_ms", &self.server_time_offset_ms)
            .field("last_estimate", &self.last_estimate.get())
            .finish_non_exhaustive()
    }
}

impl Interpolator {
    pub fn new(config: InterpolationConfig, clock: Rc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            buffer: SnapshotBuffer::new(config.max_snapshots),
            config,
            server_time_offset_ms: 0.0,
            last_estimate: Cell::new(None),
            clock,
        })
    }

    /// Buffers a pose. Untimed poses are stamped with the server-aligned local
    /// time. Returns the timestamp actually stored.
    pub fn add_snapshot(&mut self, timestamp: Option<f64>, pose: Pose) -> f64 {
        let timestamp = timestamp.unwrap_or_else(|| self.server_now_ms());
        self.buffer.push(TransformSnapshot::new(timestamp, pose));
        timestamp
    }

    pub fn get_interpolated_state(&self, current_time: f64) -> Option<Estimate> {
        let estimate = self.estimate(current_time);
        self.last_estimate.set(estimate.map(|estimate| estimate.kind));
        estimate
    }

    fn estimate(&self, current_time: f64) -> Option<Estimate> {
        let render_time = current_time - self.config.buffer_time_ms;

        if let Some(index) = self.buffer.bracket(render_time) {
            if let (Some(before), Some(after)) = (self.buffer.get(index), self.buffer.get(index + 1))
            {
                return Some(self.interpolate(index, before, after, render_time));
            }
        }

        if self.config.extrapolate {
            if let Some(estimate) = self.extrapolate(current_time) {
                return Some(estimate);
            }
        }

        self.buffer.latest().map(|latest| Estimate {
            timestamp: latest.timestamp,
            pose: latest.pose,
            kind: EstimateKind::Held,
        })
    }

    fn interpolate(
        &self,
        index: usize,
        before: &TransformSnapshot,
        after: &TransformSnapshot,
        render_time: f64,
    ) -> Estimate {
        let span = after.timestamp - before.timestamp;
        let t = if span > 0.0 {
            ((render_time - before.timestamp) / span) as f32
        } else {
            0.0
        };

        let position = match self.config.method {
            InterpolationMethod::Linear => lerp_option(before.pose.position, after.pose.position, t),
            InterpolationMethod::Hermite => self.hermite_position(before, after, span, t),
            InterpolationMethod::CatmullRom => self.catmull_rom_position(index, t),
        };

        Estimate {
            timestamp: render_time,
            pose: Pose {
                position,
                rotation: slerp_option(before.pose.rotation, after.pose.rotation, t),
                scale: lerp_option(before.pose.scale, after.pose.scale, t),
                velocity: lerp_option(before.pose.velocity, after.pose.velocity, t),
            },
            kind: EstimateKind::Interpolated,
        }
    }

    // Missing velocities count as zero, which eases in and out of every segment.
    fn hermite_position(
        &self,
        before: &TransformSnapshot,
        after: &TransformSnapshot,
        span_ms: f64,
        t: f32,
    ) -> Option<Vec3> {
        match (before.pose.position, after.pose.position) {
            (Some(p0), Some(p1)) => {
                let v0 = before.pose.velocity.unwrap_or(Vec3::ZERO);
                let v1 = after.pose.velocity.unwrap_or(Vec3::ZERO);
                Some(hermite(p0, p1, v0, v1, (span_ms / 1000.0) as f32, t))
            }
            (p0, p1) => p1.or(p0),
        }
    }

    fn catmull_rom_position(&self, index: usize, t: f32) -> Option<Vec3> {
        if self.buffer.len() < 4 {
            return self.latest_position();
        }

        let position_at = |i: usize| self.buffer.get(i).and_then(|s| s.pose.position);

        let (Some(p1), Some(p2)) = (position_at(index), position_at(index + 1)) else {
            return lerp_option(position_at(index), position_at(index + 1), t);
        };
        let p0 = index
            .checked_sub(1)
            .and_then(&position_at)
            .unwrap_or(p1);
        let p3 = position_at(index + 2).unwrap_or(p2);

        Some(catmull_rom(p0, p1, p2, p3, t))
    }

    fn latest_position(&self) -> Option<Vec3> {
        self.buffer.iter().rev().find_map(|s| s.pose.position)
    }

    fn extrapolate(&self, current_time: f64) -> Option<Estimate> {
        let (previous, latest) = self.buffer.latest_pair()?;

        let time_since_latest = current_time - latest.timestamp;
        if !(time_since_latest > 0.0 && time_since_latest < self.config.max_extrapolation_ms) {
            return None;
        }

        let span_secs = (latest.timestamp - previous.timestamp) / 1000.0;
        if span_secs <= 0.0 {
            return None;
        }

        let from = previous.pose.position?;
        let to = latest.pose.position?;
        let velocity = (to - from) / span_secs as f32;
        let position = to + velocity * (time_since_latest / 1000.0) as f32;

        Some(Estimate {
            timestamp: current_time,
            pose: Pose {
                position: Some(position),
                rotation: latest.pose.rotation,
                scale: latest.pose.scale,
                velocity: Some(velocity),
            },
            kind: EstimateKind::Extrapolated,
        })
    }

    /// Aligns future untimed snapshots with the server clock to within half the RTT.
    pub fn sync_server_time(&mut self, server_time_ms: f64, round_trip_ms: f64) {
        self.server_time_offset_ms =
            server_time_offset(server_time_ms, round_trip_ms, self.clock.now_ms());
        log::debug!(
            "server time offset now {:.1}ms (rtt {:.1}ms)",
            self.server_time_offset_ms,
            round_trip_ms
        );
    }

    pub fn set_server_time_offset(&mut self, offset_ms: f64) {
        self.server_time_offset_ms = offset_ms;
    }

    pub fn server_time_offset_ms(&self) -> f64 {
        self.server_time_offset_ms
    }

    /// Local time shifted onto the server clock.
    pub fn server_now_ms(&self) -> f64 {
        self.clock.now_ms() + self.server_time_offset_ms
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_estimate.set(None);
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn stats(&self) -> InterpolationStats {
        InterpolationStats {
            buffer_len: self.buffer.len(),
            server_time_offset_ms: self.server_time_offset_ms,
            last_estimate: self.last_estimate.get(),
        }
    }
}
