use std::cell::RefCell;
use std::collections::VecDeque;

use super::protocol::{Message, MessageKind};

/// Delivery class requested from the transport. Retransmission, if any, is the
/// transport's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    Reliable,
}

impl Reliability {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }
}

/// The message plumbing this layer consumes. Best effort, ordered per sender.
pub trait Transport {
    fn send(&self, message: Message, reliability: Reliability);

    /// Drains everything that has arrived since the last call.
    fn receive(&self) -> Vec<Message>;
}

/// In-memory transport: records outbound messages and queues inbound ones.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: RefCell<Vec<(Message, Reliability)>>,
    inbox: RefCell<VecDeque<Message>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message for the next `receive`.
    pub fn deliver(&self, message: Message) {
        self.inbox.borrow_mut().push_back(message);
    }

    pub fn take_sent(&self) -> Vec<(Message, Reliability)> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn sent_of_kind(&self, kind: MessageKind) -> Vec<Message> {
        self.sent
            .borrow()
            .iter()
            .filter(|(message, _)| message.kind() == kind)
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: Message, reliability: Reliability) {
        self.sent.borrow_mut().push((message, reliability));
    }

    fn receive(&self) -> Vec<Message> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}
