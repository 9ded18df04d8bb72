//! Route transport abstraction for lobby sessions.
//!
//! The [`RouteTransport`] trait yields lobby events that have already been
//! decoded, each tagged with the route it was published on. Framing,
//! decoding and route subscription belong to the transport; the session only
//! filters routes and interprets events.
//!
//! [`ChannelTransport`] is an in-process implementation backed by a tokio
//! channel. It suits tests and applications whose socket layer already
//! dispatches decoded events on its own task.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use lobby_session::error::LobbySessionError;
//! use lobby_session::transport::{RouteTransport, RoutedEvent};
//!
//! struct MySocket { /* ... */ }
//!
//! #[async_trait]
//! impl RouteTransport for MySocket {
//!     async fn recv(&mut self) -> Option<Result<RoutedEvent, LobbySessionError>> {
//!         // Wait for the next decoded event on a subscribed route.
//!         // Return None when the connection is closed cleanly.
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), LobbySessionError> {
//!         // Drop route subscriptions.
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{LobbySessionError, Result};
use crate::protocol::LobbyEvent;

/// A decoded event together with the route it was published on.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedEvent {
    pub route: String,
    pub event: LobbyEvent,
}

impl RoutedEvent {
    pub fn new(route: impl Into<String>, event: LobbyEvent) -> Self {
        Self {
            route: route.into(),
            event,
        }
    }
}

/// A source of routed lobby events.
///
/// Events must be delivered in publish order per route, exactly once.
///
/// # Cancel Safety
///
/// [`recv`](RouteTransport::recv) **MUST** be cancel-safe: it is polled
/// inside `tokio::select!` and a canceled call must not lose an event.
#[async_trait]
pub trait RouteTransport: Send + 'static {
    /// Receive the next routed event.
    ///
    /// Returns:
    /// - `Some(Ok(event))`: an event arrived
    /// - `Some(Err(e))`: the transport failed
    /// - `None`: the transport closed cleanly
    async fn recv(&mut self) -> Option<Result<RoutedEvent>>;

    /// Release the transport. Subsequent calls to
    /// [`recv`](RouteTransport::recv) may return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails. Implementations should still
    /// release resources.
    async fn close(&mut self) -> Result<()>;
}

/// [`RouteTransport`] fed from an in-process channel.
#[derive(Debug)]
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<RoutedEvent>,
}

/// Sending half of a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct RouteSender {
    tx: mpsc::UnboundedSender<RoutedEvent>,
}

impl RouteSender {
    /// Publish `event` on `route`.
    ///
    /// # Errors
    ///
    /// Returns [`LobbySessionError::TransportClosed`] once the transport has
    /// been closed or dropped.
    pub fn publish(&self, route: impl Into<String>, event: LobbyEvent) -> Result<()> {
        self.tx
            .send(RoutedEvent::new(route, event))
            .map_err(|_| LobbySessionError::TransportClosed)
    }
}

/// Create a connected `(sender, transport)` pair.
pub fn channel_transport() -> (RouteSender, ChannelTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RouteSender { tx }, ChannelTransport { rx })
}

#[async_trait]
impl RouteTransport for ChannelTransport {
    async fn recv(&mut self) -> Option<Result<RoutedEvent>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn channel_transport_preserves_order() {
        let (sender, mut transport) = channel_transport();
        assert_ok!(sender.publish("/lobbies/a", LobbyEvent::StartCountdown));
        assert_ok!(sender.publish("/lobbies/a", LobbyEvent::CancelCountdown));

        let first = transport.recv().await.unwrap().unwrap();
        let second = transport.recv().await.unwrap().unwrap();
        assert_eq!(first.event, LobbyEvent::StartCountdown);
        assert_eq!(second.event, LobbyEvent::CancelCountdown);
    }

    #[tokio::test]
    async fn publish_after_close_fails() {
        let (sender, mut transport) = channel_transport();
        assert_ok!(transport.close().await);
        let err = assert_err!(sender.publish("/lobbies/a", LobbyEvent::GameStarted));
        assert!(matches!(err, LobbySessionError::TransportClosed));
    }

    #[tokio::test]
    async fn dropping_every_sender_closes_cleanly() {
        let (sender, mut transport) = channel_transport();
        drop(sender);
        assert!(transport.recv().await.is_none());
    }
}
