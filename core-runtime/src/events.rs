//! # Event Bus System
//!
//! Broadcasts provider and token lifecycle events to any number of
//! subscribers over `tokio::sync::broadcast`.
//!
//! ```text
//! ┌─────────────────┐   emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ ProviderService ├─────────>│ EventBus ├────────────>│ Subscriber │
//! └─────────────────┘          └──────────┘             └────────────┘
//! ```
//!
//! Emitting with no subscribers returns `Err(SendError)`. Producers ignore
//! that error: events are notifications, not part of any operation's result.
//!
//! Subscribers receive `RecvError::Lagged(n)` when they fall more than the
//! buffer size behind, and `RecvError::Closed` once every sender is dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ProviderEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Provider(ProviderEvent::LinkRemoved {
//!     link_id: "7c1e...".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Provider(_))));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default per-subscriber buffer of the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Provider link and catalog lifecycle
    Provider(ProviderEvent),
    /// Access token renewal
    Auth(AuthEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Provider(e) => e.description(),
            CoreEvent::Auth(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::TokenRefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Provider(ProviderEvent::LinkAdded { .. })
            | CoreEvent::Provider(ProviderEvent::LinkRemoved { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The provider link the event concerns.
    pub fn link_id(&self) -> &str {
        match self {
            CoreEvent::Provider(ProviderEvent::LinkAdded { link_id, .. })
            | CoreEvent::Provider(ProviderEvent::CatalogSynced { link_id, .. })
            | CoreEvent::Provider(ProviderEvent::LinkRemoved { link_id })
            | CoreEvent::Auth(AuthEvent::TokenRefreshed { link_id, .. })
            | CoreEvent::Auth(AuthEvent::TokenRefreshFailed { link_id, .. }) => link_id,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Provider link lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProviderEvent {
    /// A link was created together with its initial catalog.
    LinkAdded {
        link_id: String,
        /// Provider identifier as stored (e.g. "dropbox", "yandex_disk").
        provider: String,
        /// Number of catalog entries written with the link.
        entries: usize,
    },
    /// A link's catalog was reconciled against a fresh listing.
    CatalogSynced {
        link_id: String,
        added: usize,
        removed: usize,
    },
    /// A link and its catalog were deleted.
    LinkRemoved { link_id: String },
}

impl ProviderEvent {
    fn description(&self) -> &str {
        match self {
            ProviderEvent::LinkAdded { .. } => "Provider link added",
            ProviderEvent::CatalogSynced { .. } => "Provider catalog synchronized",
            ProviderEvent::LinkRemoved { .. } => "Provider link removed",
        }
    }
}

/// Token renewal events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    TokenRefreshed {
        link_id: String,
        /// New expiry as Unix epoch seconds.
        expires_at: i64,
    },
    TokenRefreshFailed {
        link_id: String,
        message: String,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::TokenRefreshed { .. } => "Access token refreshed",
            AuthEvent::TokenRefreshFailed { .. } => "Access token refresh failed",
        }
    }
}

/// Broadcast bus shared by every producer and subscriber.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus buffering at most `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. `CoreConfig::validate` rejects a zero
    /// buffer before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers will see it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates an independent receiver. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let auth_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Auth(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Waits for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered event that passes the filter, or `None`
    /// when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(link: &str, added: usize, removed: usize) -> CoreEvent {
        CoreEvent::Provider(ProviderEvent::CatalogSynced {
            link_id: link.to_string(),
            added,
            removed,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(8);
        assert!(bus.emit(synced("l1", 1, 0)).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(synced("l1", 2, 1)).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), synced("l1", 2, 1));
        assert_eq!(second.recv().await.unwrap(), synced("l1", 2, 1));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(synced("l1", i, 0)).ok();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap(), synced("l1", 3, 0));
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_other_events() {
        let bus = EventBus::new(8);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Auth(_)));

        bus.emit(synced("l1", 1, 0)).ok();
        bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
            link_id: "l1".to_string(),
            expires_at: 1_700_003_600,
        }))
        .ok();

        let event = stream.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: 1_700_003_600, .. })
        ));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_closed_after_bus_dropped() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_severity_and_link_id() {
        let failed = CoreEvent::Auth(AuthEvent::TokenRefreshFailed {
            link_id: "l9".to_string(),
            message: "invalid_grant".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.link_id(), "l9");
        assert_eq!(failed.description(), "Access token refresh failed");

        assert_eq!(synced("l2", 0, 0).severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_serialization_shape() {
        let event = CoreEvent::Provider(ProviderEvent::LinkRemoved {
            link_id: "abc".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Provider");
        assert_eq!(json["payload"]["event"], "LinkRemoved");
        assert_eq!(json["payload"]["link_id"], "abc");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
