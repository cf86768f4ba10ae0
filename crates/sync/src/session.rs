use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use crate::clock::{Clock, server_time_offset};
use crate::error::ConfigError;
use crate::id::{NetworkEntityId, PlayerId};
use crate::net::{Message, Reliability, TransformUpdate, Transport};
use crate::state::{StateConfig, StateSynchronizer};
use crate::transform::{SyncConfig, SyncRole, TransformSynchronizer};

/// Everything one participant synchronizes, wired to one clock and one transport.
///
/// Owns every [`TransformSynchronizer`] keyed by network id and the single
/// [`StateSynchronizer`], and routes inbound messages to them.
pub struct SyncSession {
    local_player: PlayerId,
    clock: Rc<dyn Clock>,
    transport: Rc<dyn Transport>,
    entities: HashMap<NetworkEntityId, TransformSynchronizer>,
    state: StateSynchronizer,
    server_time_offset_ms: f64,
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("local_player", &self.local_player)
            .field("entities", &self.entities.len())
            .field("state", &self.state)
            .field("server_time_offset_ms", &self.server_time_offset_ms)
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    pub fn new(
        local_player: PlayerId,
        state_config: StateConfig,
        clock: Rc<dyn Clock>,
        transport: Rc<dyn Transport>,
    ) -> Self {
        let state = StateSynchronizer::new(
            local_player,
            state_config,
            Rc::clone(&clock),
            Rc::clone(&transport),
        );

        Self {
            local_player,
            clock,
            transport,
            entities: HashMap::new(),
            state,
            server_time_offset_ms: 0.0,
        }
    }

    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    /// Registers an entity this participant controls and transmits.
    pub fn spawn_local(
        &mut self,
        id: NetworkEntityId,
        config: SyncConfig,
    ) -> Result<&mut TransformSynchronizer, ConfigError> {
        self.spawn(id, SyncRole::Local, config)
    }

    /// Registers an entity reconstructed from another participant's updates.
    pub fn spawn_remote(
        &mut self,
        id: NetworkEntityId,
        config: SyncConfig,
    ) -> Result<&mut TransformSynchronizer, ConfigError> {
        self.spawn(id, SyncRole::Remote, config)
    }

    fn spawn(
        &mut self,
        id: NetworkEntityId,
        role: SyncRole,
        config: SyncConfig,
    ) -> Result<&mut TransformSynchronizer, ConfigError> {
        let mut synchronizer = TransformSynchronizer::new(
            id,
            role,
            config,
            Rc::clone(&self.clock),
            Rc::clone(&self.transport),
        )?;
        synchronizer
            .interpolator_mut()
            .set_server_time_offset(self.server_time_offset_ms);

        match self.entities.entry(id) {
            Entry::Occupied(mut occupied) => {
                log::debug!("respawning {id} as {role:?}");
                occupied.insert(synchronizer);
                Ok(occupied.into_mut())
            }
            Entry::Vacant(vacant) => Ok(vacant.insert(synchronizer)),
        }
    }

    /// Clears and forgets an entity. Returns false if it was not tracked.
    pub fn despawn(&mut self, id: NetworkEntityId) -> bool {
        match self.entities.remove(&id) {
            Some(mut synchronizer) => {
                synchronizer.clear();
                true
            }
            None => false,
        }
    }

    pub fn entity(&self, id: NetworkEntityId) -> Option<&TransformSynchronizer> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: NetworkEntityId) -> Option<&mut TransformSynchronizer> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &TransformSynchronizer> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn state(&self) -> &StateSynchronizer {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateSynchronizer {
        &mut self.state
    }

    /// Once per frame with the elapsed time in seconds.
    pub fn update(&mut self, delta: f32) {
        for synchronizer in self.entities.values_mut() {
            synchronizer.update(delta);
        }
    }

    /// Drains the transport and dispatches everything that arrived. Returns the
    /// number of messages handled.
    pub fn poll(&mut self) -> usize {
        let messages = self.transport.receive();
        let count = messages.len();
        for message in &messages {
            self.handle_message(message);
        }
        count
    }

    pub fn handle_message(&mut self, message: &Message) {
        match message {
            Message::TransformUpdate(update) => self.on_transform_update(update),
            Message::StateUpdate(update) => self.state.on_receive_state(update),
            Message::FullStateSync(sync) => self.state.on_full_state_sync(sync),
            Message::PlayerLeft { player_id } => {
                self.state.on_player_left(*player_id);
            }
            Message::PlayerJoined { player_id } => {
                if *player_id != self.local_player {
                    log::debug!("{player_id} joined, sending full state");
                    self.state.on_player_joined(*player_id);
                    self.state.send_full_state();
                }
            }
            Message::ClockSync {
                server_time_ms,
                round_trip_ms,
            } => self.sync_server_time(*server_time_ms, *round_trip_ms),
        }
    }

    fn on_transform_update(&mut self, update: &TransformUpdate) {
        let Some(synchronizer) = self.entities.get_mut(&update.network_id) else {
            log::warn!("transform update for unknown {}, dropping", update.network_id);
            return;
        };
        synchronizer.receive(update);
    }

    /// Aligns every interpolator, present and future, with the server clock.
    pub fn sync_server_time(&mut self, server_time_ms: f64, round_trip_ms: f64) {
        self.server_time_offset_ms =
            server_time_offset(server_time_ms, round_trip_ms, self.clock.now_ms());
        for synchronizer in self.entities.values_mut() {
            synchronizer
                .interpolator_mut()
                .set_server_time_offset(self.server_time_offset_ms);
        }
        log::debug!(
            "{} server time offset {:.1}ms",
            self.local_player,
            self.server_time_offset_ms
        );
    }

    pub fn server_time_offset_ms(&self) -> f64 {
        self.server_time_offset_ms
    }

    /// Tells peers we are here so they send us their full state.
    pub fn announce_join(&self) {
        self.transport.send(
            Message::PlayerJoined {
                player_id: self.local_player,
            },
            Reliability::Reliable,
        );
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::clock::ManualClock;
    use crate::net::{MessageKind, RecordingTransport};
    use crate::state::StateValue;

    fn session() -> (SyncSession, ManualClock, Rc<RecordingTransport>) {
        let clock = ManualClock::new(0.0);
        let transport = Rc::new(RecordingTransport::new());
        let session = SyncSession::new(
            PlayerId(1),
            StateConfig::default(),
            Rc::new(clock.clone()),
            transport.clone(),
        );
        (session, clock, transport)
    }

    fn transform_update(id: u32, timestamp: f64, x: f32) -> Message {
        let mut update = TransformUpdate::new(NetworkEntityId(id), timestamp);
        update.position = Some([x, 0.0, 0.0]);
        Message::TransformUpdate(update)
    }

    #[test]
    fn routes_updates_to_remote_entities() {
        let (mut session, _, _) = session();
        session
            .spawn_remote(NetworkEntityId(7), SyncConfig::default())
            .unwrap();

        session.handle_message(&transform_update(7, 0.0, 1.0));
        session.handle_message(&transform_update(8, 0.0, 1.0));

        let entity = session.entity(NetworkEntityId(7)).unwrap();
        assert_eq!(entity.interpolator().buffer().len(), 1);
        assert!(session.entity(NetworkEntityId(8)).is_none());
    }

    #[test]
    fn local_entities_do_not_consume_updates() {
        let (mut session, _, _) = session();
        session
            .spawn_local(NetworkEntityId(3), SyncConfig::default())
            .unwrap();

        session.handle_message(&transform_update(3, 0.0, 1.0));

        let entity = session.entity(NetworkEntityId(3)).unwrap();
        assert!(entity.interpolator().buffer().is_empty());
    }

    #[test]
    fn update_ticks_local_entities() {
        let (mut session, _, transport) = session();
        session
            .spawn_local(NetworkEntityId(3), SyncConfig::default())
            .unwrap()
            .transform_mut()
            .position = Vec3::X;

        session.update(0.016);

        assert_eq!(transport.sent_of_kind(MessageKind::TransformUpdate).len(), 1);
    }

    #[test]
    fn peer_join_triggers_full_state() {
        let (mut session, _, transport) = session();
        session.state_mut().set("score", 4);
        transport.take_sent();

        session.handle_message(&Message::PlayerJoined {
            player_id: PlayerId(2),
        });
        session.handle_message(&Message::PlayerJoined {
            player_id: PlayerId(1),
        });

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        let Message::StateUpdate(update) = &sent[0].0 else {
            panic!("expected state update");
        };
        assert!(update.is_full);
        assert_eq!(update.state[0].value, StateValue::Int(4));
    }

    #[test]
    fn clock_sync_reaches_new_and_existing_entities() {
        let (mut session, clock, _) = session();
        session
            .spawn_remote(NetworkEntityId(1), SyncConfig::default())
            .unwrap();
        clock.set(1_000.0);

        session.handle_message(&Message::ClockSync {
            server_time_ms: 3_000.0,
            round_trip_ms: 100.0,
        });
        session
            .spawn_remote(NetworkEntityId(2), SyncConfig::default())
            .unwrap();

        for id in [1, 2] {
            let entity = session.entity(NetworkEntityId(id)).unwrap();
            assert_eq!(entity.interpolator().server_time_offset_ms(), 2_050.0);
        }
    }

    #[test]
    fn despawn_forgets_entity() {
        let (mut session, _, _) = session();
        session
            .spawn_remote(NetworkEntityId(5), SyncConfig::default())
            .unwrap();
        session.handle_message(&transform_update(5, 0.0, 1.0));

        assert!(session.despawn(NetworkEntityId(5)));
        assert!(!session.despawn(NetworkEntityId(5)));
        assert_eq!(session.entity_count(), 0);
    }

    #[test]
    fn poll_drains_transport() {
        let (mut session, _, transport) = session();
        transport.deliver(Message::StateUpdate(crate::net::StateUpdate::single(
            PlayerId(2),
            0.0,
            "score",
            StateValue::Int(1),
        )));
        transport.deliver(Message::PlayerLeft {
            player_id: PlayerId(9),
        });

        assert_eq!(session.poll(), 2);
        assert_eq!(
            session.state().get_remote(PlayerId(2), "score"),
            Some(&StateValue::Int(1))
        );
        assert_eq!(session.poll(), 0);
    }

    #[test]
    fn departed_player_stays_gone_until_rejoin() {
        let (mut session, _, _) = session();
        let score = |value| {
            Message::StateUpdate(crate::net::StateUpdate::single(
                PlayerId(2),
                0.0,
                "score",
                StateValue::Int(value),
            ))
        };

        session.handle_message(&score(10));
        session.handle_message(&Message::PlayerLeft {
            player_id: PlayerId(2),
        });
        session.handle_message(&score(11));
        assert_eq!(session.state().get_remote(PlayerId(2), "score"), None);

        session.handle_message(&Message::PlayerJoined {
            player_id: PlayerId(2),
        });
        session.handle_message(&score(12));
        assert_eq!(
            session.state().get_remote(PlayerId(2), "score"),
            Some(&StateValue::Int(12))
        );
    }

    #[test]
    fn announce_join_is_reliable() {
        let (session, _, transport) = session();
        session.announce_join();
        let sent = transport.take_sent();
        assert_eq!(
            sent,
            vec![(
                Message::PlayerJoined {
                    player_id: PlayerId(1)
                },
                Reliability::Reliable
            )]
        );
    }
}
