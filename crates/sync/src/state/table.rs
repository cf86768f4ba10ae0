use std::collections::{BTreeMap, HashMap};

use super::value::StateValue;
use crate::id::PlayerId;

pub type StateMap = BTreeMap<String, StateValue>;

/// Attribute rows keyed by player. Rows are created lazily from the defaults.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    rows: HashMap<PlayerId, StateMap>,
    defaults: StateMap,
}

impl StateTable {
    pub fn new(defaults: StateMap) -> Self {
        Self {
            rows: HashMap::new(),
            defaults,
        }
    }

    pub fn row(&self, player: PlayerId) -> Option<&StateMap> {
        self.rows.get(&player)
    }

    pub fn row_mut(&mut self, player: PlayerId) -> &mut StateMap {
        self.rows
            .entry(player)
            .or_insert_with(|| self.defaults.clone())
    }

    pub fn get(&self, player: PlayerId, key: &str) -> Option<&StateValue> {
        self.rows.get(&player).and_then(|row| row.get(key))
    }

    /// Stores `value` and returns what it replaced.
    pub fn insert(&mut self, player: PlayerId, key: &str, value: StateValue) -> Option<StateValue> {
        self.row_mut(player).insert(key.to_string(), value)
    }

    pub fn remove_player(&mut self, player: PlayerId) -> Option<StateMap> {
        self.rows.remove(&player)
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.rows.contains_key(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.rows.keys().copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (PlayerId, &StateMap)> {
        self.rows.iter().map(|(player, row)| (*player, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
