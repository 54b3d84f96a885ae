//! Client error events.
//!
//! Failures that have no caller to return to (a subscribe ACK that never
//! came, a frame that could not be parsed) are published on a broadcast
//! channel instead. Subscribe with [`RpcBroker::events`](crate::RpcBroker::events).

use tokio::sync::broadcast;

use crate::Topic;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEventKind {
    /// A SUBSCRIBE or UNSUBSCRIBE was not acknowledged in time.
    AckTimeout,

    /// An inbound frame could not be parsed for its action.
    MessageParseError,
}

/// A reported client-side error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub topic: Topic,
    pub kind: ClientEventKind,
    pub message: String,
}

impl ClientEvent {
    pub fn new(topic: Topic, kind: ClientEventKind, message: impl Into<String>) -> Self {
        Self {
            topic,
            kind,
            message: message.into(),
        }
    }
}

/// Sending half of the event channel. Cloned into every component that
/// reports events.
#[derive(Clone)]
pub(crate) struct EventEmitter {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventEmitter {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Never blocks; without subscribers it is only logged.
    pub(crate) fn emit(&self, event: ClientEvent) {
        // ---
        log_warn!(
            "{} {:?}: {}",
            event.topic.code(),
            event.kind,
            event.message
        );
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_fine() {
        let emitter = EventEmitter::new();
        emitter.emit(ClientEvent::new(
            Topic::Rpc,
            ClientEventKind::AckTimeout,
            "nobody listening",
        ));
    }

    #[test]
    fn subscribers_see_events() {
        // ---
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let event = ClientEvent::new(Topic::Rpc, ClientEventKind::MessageParseError, "bad");
        emitter.emit(event.clone());

        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
