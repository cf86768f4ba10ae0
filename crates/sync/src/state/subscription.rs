use std::collections::HashMap;
use std::fmt;

use super::value::StateValue;
use crate::id::PlayerId;

/// `(player, key, new value, old value)`. `old` is `None` for a first write.
pub type ChangeCallback = Box<dyn FnMut(PlayerId, &str, &StateValue, Option<&StateValue>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-key observer lists, invoked in subscription order.
#[derive(Default)]
pub struct ChangeSubscriptions {
    callbacks: HashMap<String, Vec<(SubscriptionId, ChangeCallback)>>,
    next_id: u64,
}

impl fmt::Debug for ChangeSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .callbacks
            .iter()
            .map(|(key, list)| (key.as_str(), list.len()))
            .collect();
        f.debug_struct("ChangeSubscriptions")
            .field("callbacks", &counts)
            .finish()
    }
}

impl ChangeSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, key: impl Into<String>, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks
            .entry(key.into())
            .or_default()
            .push((id, callback));
        id
    }

    /// Returns false if nothing matched.
    pub fn unsubscribe(&mut self, key: &str, id: SubscriptionId) -> bool {
        let Some(list) = self.callbacks.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.callbacks.remove(key);
        }
        removed
    }

    pub fn notify(
        &mut self,
        player: PlayerId,
        key: &str,
        new: &StateValue,
        old: Option<&StateValue>,
    ) {
        if let Some(list) = self.callbacks.get_mut(key) {
            for (_, callback) in list.iter_mut() {
                callback(player, key, new, old);
            }
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.callbacks.get(key).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}
