use std::cell::Cell;
use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Millisecond time source shared by the synchronizers of one session.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall-clock milliseconds since the Unix epoch, sampled once at creation and
/// advanced by a monotonic `Instant` so it never runs backwards.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
    epoch_ms: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or_default();
        Self {
            origin: Instant::now(),
            epoch_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.epoch_ms + self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Offset that maps local time onto the server clock, assuming a symmetric round trip.
pub fn server_time_offset(server_time_ms: f64, round_trip_ms: f64, local_now_ms: f64) -> f64 {
    server_time_ms - local_now_ms + round_trip_ms / 2.0
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, delta_ms: f64) {
        self.now_ms.set(self.now_ms.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}
