use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::protocol::{Envelope, Message};
use super::stats::{NetworkStats, PacketLossSimulation};
use super::transport::{Reliability, Transport};
use crate::clock::Clock;
use crate::id::PlayerId;

#[derive(Debug)]
struct DelayedMessage {
    release_ms: f64,
    sequence: u64,
    bytes: Vec<u8>,
}

impl PartialEq for DelayedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedMessage {}

impl PartialOrd for DelayedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_ms
            .total_cmp(&self.release_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A lossy, jittery broadcast network between peers sharing one clock.
///
/// Messages are encoded into envelopes on send and decoded on receipt.
/// Unreliable messages may be dropped and reordered by jitter. Reliable ones
/// are never dropped and travel at the link's minimum latency, so they stay
/// in order.
pub struct NetworkSimulator {
    clock: Rc<dyn Clock>,
    rng: StdRng,
    links: HashMap<PlayerId, PacketLossSimulation>,
    in_flight: HashMap<PlayerId, BinaryHeap<DelayedMessage>>,
    next_sequence: u64,
    stats: NetworkStats,
}

impl NetworkSimulator {
    pub fn new(clock: Rc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            rng: StdRng::seed_from_u64(seed),
            links: HashMap::new(),
            in_flight: HashMap::new(),
            next_sequence: 0,
            stats: NetworkStats::default(),
        }
    }

    /// Registers `player` and returns its transport handle.
    pub fn connect(network: &Rc<RefCell<Self>>, player: PlayerId) -> SimulatedEndpoint {
        network.borrow_mut().in_flight.entry(player).or_default();
        SimulatedEndpoint {
            player,
            network: Rc::clone(network),
        }
    }

    pub fn disconnect(&mut self, player: PlayerId) {
        self.in_flight.remove(&player);
        self.links.remove(&player);
    }

    /// Conditions for traffic arriving at `player`.
    pub fn set_config(&mut self, player: PlayerId, config: PacketLossSimulation) {
        if config.enabled {
            self.links.insert(player, config);
        } else {
            self.links.remove(&player);
        }
    }

    pub fn get_config(&self, player: PlayerId) -> Option<&PacketLossSimulation> {
        self.links.get(&player)
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.values().map(BinaryHeap::len).sum()
    }

    fn route(&mut self, from: PlayerId, message: Message, reliability: Reliability) {
        let bytes = match Envelope::new(from, message).encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("{from} produced an unencodable message: {err}");
                return;
            }
        };

        let now = self.clock.now_ms();
        let mut receivers: Vec<PlayerId> =
            self.in_flight.keys().copied().filter(|p| *p != from).collect();
        receivers.sort();

        for to in receivers {
            self.stats.messages_sent += 1;
            self.stats.bytes_sent += bytes.len() as u64;

            let link = self.links.get(&to).cloned().unwrap_or_default();
            let delay_ms = if reliability.is_reliable() {
                if link.enabled { link.min_latency_ms } else { 0 }
            } else {
                if link.should_drop(&mut self.rng) {
                    self.stats.messages_dropped += 1;
                    log::trace!("dropped message {from} -> {to}");
                    continue;
                }
                link.delay_ms(&mut self.rng)
            };

            let sequence = self.next_sequence;
            self.next_sequence += 1;

            if let Some(queue) = self.in_flight.get_mut(&to) {
                queue.push(DelayedMessage {
                    release_ms: now + delay_ms as f64,
                    sequence,
                    bytes: bytes.clone(),
                });
            }
        }
    }

    fn take_for(&mut self, player: PlayerId) -> Vec<Message> {
        let now = self.clock.now_ms();
        let Some(queue) = self.in_flight.get_mut(&player) else {
            return Vec::new();
        };

        let mut messages = Vec::new();
        while queue.peek().is_some_and(|delayed| delayed.release_ms <= now) {
            let Some(delayed) = queue.pop() else {
                break;
            };
            match Envelope::decode(&delayed.bytes) {
                Ok(envelope) => {
                    self.stats.messages_delivered += 1;
                    messages.push(envelope.message);
                }
                Err(err) => {
                    self.stats.decode_failures += 1;
                    log::warn!("discarding undecodable message for {player}: {err}");
                }
            }
        }
        messages
    }
}

/// One peer's view of a [`NetworkSimulator`].
#[derive(Clone)]
pub struct SimulatedEndpoint {
    player: PlayerId,
    network: Rc<RefCell<NetworkSimulator>>,
}

impl SimulatedEndpoint {
    pub fn player(&self) -> PlayerId {
        self.player
    }
}

impl Transport for SimulatedEndpoint {
    fn send(&self, message: Message, reliability: Reliability) {
        self.network
            .borrow_mut()
            .route(self.player, message, reliability);
    }

    fn receive(&self) -> Vec<Message> {
        self.network.borrow_mut().take_for(self.player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn network(clock: &ManualClock) -> Rc<RefCell<NetworkSimulator>> {
        Rc::new(RefCell::new(NetworkSimulator::new(
            Rc::new(clock.clone()),
            42,
        )))
    }

    fn joined(player: u32) -> Message {
        Message::PlayerJoined {
            player_id: PlayerId(player),
        }
    }

    #[test]
    fn broadcasts_to_everyone_but_sender() {
        let clock = ManualClock::new(0.0);
        let net = network(&clock);
        let a = NetworkSimulator::connect(&net, PlayerId(1));
        let b = NetworkSimulator::connect(&net, PlayerId(2));
        let c = NetworkSimulator::connect(&net, PlayerId(3));

        a.send(joined(1), Reliability::Reliable);

        assert!(a.receive().is_empty());
        assert_eq!(b.receive(), vec![joined(1)]);
        assert_eq!(c.receive(), vec![joined(1)]);
        assert_eq!(net.borrow().stats().messages_delivered, 2);
    }

    #[test]
    fn latency_holds_messages_back() {
        let clock = ManualClock::new(0.0);
        let net = network(&clock);
        let a = NetworkSimulator::connect(&net, PlayerId(1));
        let b = NetworkSimulator::connect(&net, PlayerId(2));
        net.borrow_mut()
            .set_config(PlayerId(2), PacketLossSimulation::latency(50, 50));

        a.send(joined(1), Reliability::Unreliable);

        clock.advance(49.0);
        assert!(b.receive().is_empty());
        assert_eq!(net.borrow().in_flight(), 1);

        clock.advance(1.0);
        assert_eq!(b.receive().len(), 1);
        assert_eq!(net.borrow().in_flight(), 0);
    }

    #[test]
    fn loss_spares_reliable_messages() {
        let clock = ManualClock::new(0.0);
        let net = network(&clock);
        let a = NetworkSimulator::connect(&net, PlayerId(1));
        let b = NetworkSimulator::connect(&net, PlayerId(2));
        net.borrow_mut().set_config(
            PlayerId(2),
            PacketLossSimulation {
                enabled: true,
                loss_percent: 100.0,
                ..Default::default()
            },
        );

        for _ in 0..5 {
            a.send(joined(1), Reliability::Unreliable);
        }
        a.send(joined(9), Reliability::Reliable);

        assert_eq!(b.receive(), vec![joined(9)]);
        let stats = net.borrow().stats().clone();
        assert_eq!(stats.messages_dropped, 5);
        assert_eq!(stats.messages_sent, 6);
    }

    #[test]
    fn reliable_messages_keep_order_under_jitter() {
        let clock = ManualClock::new(0.0);
        let net = network(&clock);
        let a = NetworkSimulator::connect(&net, PlayerId(1));
        let b = NetworkSimulator::connect(&net, PlayerId(2));
        net.borrow_mut().set_config(
            PlayerId(2),
            PacketLossSimulation {
                enabled: true,
                min_latency_ms: 10,
                max_latency_ms: 80,
                jitter_ms: 40,
                ..Default::default()
            },
        );

        for player in 0..10 {
            a.send(joined(player), Reliability::Reliable);
            clock.advance(1.0);
        }
        clock.advance(200.0);

        let expected: Vec<Message> = (0..10).map(joined).collect();
        assert_eq!(b.receive(), expected);
    }

    #[test]
    fn disconnected_peer_receives_nothing() {
        let clock = ManualClock::new(0.0);
        let net = network(&clock);
        let a = NetworkSimulator::connect(&net, PlayerId(1));
        let b = NetworkSimulator::connect(&net, PlayerId(2));
        net.borrow_mut().disconnect(PlayerId(2));

        a.send(joined(1), Reliability::Reliable);
        assert!(b.receive().is_empty());
        assert_eq!(net.borrow().stats().messages_sent, 0);
    }
}
