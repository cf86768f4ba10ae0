use rand::Rng;

/// Conditions applied to every message travelling towards one peer.
#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn latency(min_latency_ms: u32, max_latency_ms: u32) -> Self {
        Self {
            enabled: true,
            min_latency_ms,
            max_latency_ms,
            ..Default::default()
        }
    }

    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0..100.0) < self.loss_percent
    }

    pub fn delay_ms(&self, rng: &mut impl Rng) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let spread = if range > 0 { rng.gen_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        base + spread + jitter
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub bytes_sent: u64,
    pub decode_failures: u64,
}

impl NetworkStats {
    pub fn loss_percent(&self) -> f32 {
        if self.messages_sent == 0 {
            return 0.0;
        }
        self.messages_dropped as f32 / self.messages_sent as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn disabled_simulation_is_transparent() {
        let mut rng = StdRng::seed_from_u64(7);
        let sim = PacketLossSimulation {
            loss_percent: 100.0,
            max_latency_ms: 500,
            ..Default::default()
        };
        assert!(!sim.should_drop(&mut rng));
        assert_eq!(sim.delay_ms(&mut rng), 0);
    }

    #[test]
    fn delay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let sim = PacketLossSimulation {
            enabled: true,
            min_latency_ms: 20,
            max_latency_ms: 60,
            jitter_ms: 10,
            ..Default::default()
        };
        for _ in 0..100 {
            let delay = sim.delay_ms(&mut rng);
            assert!((20..=70).contains(&delay));
        }
    }

    #[test]
    fn total_loss_drops_everything() {
        let mut rng = StdRng::seed_from_u64(1);
        let sim = PacketLossSimulation {
            enabled: true,
            loss_percent: 100.0,
            ..Default::default()
        };
        assert!((0..50).all(|_| sim.should_drop(&mut rng)));
    }
}
