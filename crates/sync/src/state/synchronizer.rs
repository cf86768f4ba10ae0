use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::config::{SendPolicy, StateConfig};
use super::subscription::{ChangeCallback, ChangeSubscriptions, SubscriptionId};
use super::table::{StateMap, StateTable};
use super::value::StateValue;
use crate::clock::Clock;
use crate::id::PlayerId;
use crate::net::{FullStateSync, Message, Reliability, StateEntry, StateUpdate, Transport};

/// Replicates named scalar attributes per player.
///
/// The local player's row is authoritative and written with [`set`](Self::set);
/// every other row is a replica fed by inbound `StateUpdate` and
/// `FullStateSync` messages.
pub struct StateSynchronizer {
    local_player: PlayerId,
    config: StateConfig,
    table: StateTable,
    subscriptions: ChangeSubscriptions,
    last_sent: HashMap<String, StateValue>,
    departed: HashSet<PlayerId>,
    clock: Rc<dyn Clock>,
    transport: Rc<dyn Transport>,
}

impl std::fmt::Debug for StateSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSynchronizer")
            .field("local_player", &self.local_player)
            .field("config", &self.config)
            .field("table", &self.table)
            .field("subscriptions", &self.subscriptions)
            .field("departed", &self.departed)
            .finish_non_exhaustive()
    }
}

impl StateSynchronizer {
    pub fn new(
        local_player: PlayerId,
        config: StateConfig,
        clock: Rc<dyn Clock>,
        transport: Rc<dyn Transport>,
    ) -> Self {
        let mut table = StateTable::new(config.defaults.clone());
        table.row_mut(local_player);

        Self {
            local_player,
            config,
            table,
            subscriptions: ChangeSubscriptions::new(),
            last_sent: HashMap::new(),
            departed: HashSet::new(),
            clock,
            transport,
        }
    }

    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    pub fn policy(&self) -> SendPolicy {
        self.config.policy
    }

    /// Writes the local row, notifies on change, then hands the value to [`send_state`](Self::send_state).
    pub fn set(&mut self, key: &str, value: impl Into<StateValue>) {
        let value = value.into();
        let previous = self.table.insert(self.local_player, key, value.clone());

        if previous.as_ref() != Some(&value) {
            self.subscriptions
                .notify(self.local_player, key, &value, previous.as_ref());
        }

        self.send_state(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.table.get(self.local_player, key)
    }

    pub fn get_remote(&self, player: PlayerId, key: &str) -> Option<&StateValue> {
        self.table.get(player, key)
    }

    pub fn local_state(&self) -> Option<&StateMap> {
        self.table.row(self.local_player)
    }

    pub fn remote_state(&self, player: PlayerId) -> Option<&StateMap> {
        if player == self.local_player {
            return None;
        }
        self.table.row(player)
    }

    pub fn table(&self) -> &StateTable {
        &self.table
    }

    /// Sends one attribute according to the configured policy. Returns whether
    /// anything went out.
    pub fn send_state(&mut self, key: &str, value: StateValue) -> bool {
        if self.config.policy == SendPolicy::Delta && self.last_sent.get(key) == Some(&value) {
            log::trace!("suppressed unchanged {key} = {value}");
            return false;
        }

        let update = StateUpdate::single(self.local_player, self.clock.now_ms(), key, value.clone());
        self.transport
            .send(Message::StateUpdate(update), self.config.policy.reliability());
        self.last_sent.insert(key.to_string(), value);
        true
    }

    /// Emits the whole local row flagged as full, for peers that just joined.
    pub fn send_full_state(&mut self) {
        let Some(row) = self.table.row(self.local_player) else {
            return;
        };
        let update = StateUpdate::full(self.local_player, self.clock.now_ms(), row);
        for entry in &update.state {
            self.last_sent.insert(entry.key.clone(), entry.value.clone());
        }
        self.transport
            .send(Message::StateUpdate(update), Reliability::Reliable);
    }

    /// Builds a snapshot of every known row, for a host acting as server.
    pub fn full_state_sync(&self) -> FullStateSync {
        let mut rows: Vec<(PlayerId, &StateMap)> = self.table.rows().collect();
        rows.sort_by_key(|(player, _)| *player);
        FullStateSync::from_table(rows)
    }

    pub fn on_receive_state(&mut self, update: &StateUpdate) {
        if update.player_id == self.local_player {
            log::debug!("ignoring state echo for local {}", update.player_id);
            return;
        }
        if self.departed.contains(&update.player_id) {
            log::debug!("dropping stale state from departed {}", update.player_id);
            return;
        }
        self.apply_remote(update.player_id, &update.state);
    }

    /// Bulk-populates replicas from a join-time dump. The local row is never overwritten.
    pub fn on_full_state_sync(&mut self, sync: &FullStateSync) {
        for player_state in &sync.states {
            if player_state.player_id == self.local_player {
                continue;
            }
            if self.departed.contains(&player_state.player_id) {
                log::debug!("skipping dump row for departed {}", player_state.player_id);
                continue;
            }
            self.apply_remote(player_state.player_id, &player_state.state);
        }
    }

    fn apply_remote(&mut self, player: PlayerId, entries: &[StateEntry]) {
        // Ensure the row exists even for an empty update.
        self.table.row_mut(player);

        for entry in entries {
            let previous = self.table.insert(player, &entry.key, entry.value.clone());
            if previous.as_ref() != Some(&entry.value) {
                self.subscriptions
                    .notify(player, &entry.key, &entry.value, previous.as_ref());
            }
        }
    }

    /// Drops every attribute held for `player` and ignores its updates until it
    /// rejoins. Returns false if nothing was known.
    pub fn on_player_left(&mut self, player: PlayerId) -> bool {
        if player == self.local_player {
            log::warn!("ignoring leave notification for local {player}");
            return false;
        }
        self.departed.insert(player);
        match self.table.remove_player(player) {
            Some(_) => {
                log::debug!("removed state row for {player}");
                true
            }
            None => {
                log::debug!("leave notification for unknown {player}");
                false
            }
        }
    }

    /// Accepts updates from `player` again after a leave.
    pub fn on_player_joined(&mut self, player: PlayerId) {
        if self.departed.remove(&player) {
            log::debug!("{player} rejoined");
        }
    }

    pub fn has_departed(&self, player: PlayerId) -> bool {
        self.departed.contains(&player)
    }

    pub fn subscribe(&mut self, key: impl Into<String>, callback: ChangeCallback) -> SubscriptionId {
        self.subscriptions.subscribe(key, callback)
    }

    pub fn unsubscribe(&mut self, key: &str, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(key, id)
    }

    /// Forgets every replica and delta history; the local row returns to defaults.
    pub fn reset(&mut self) {
        self.table.clear();
        self.table.row_mut(self.local_player);
        self.last_sent.clear();
        self.departed.clear();
    }
}
