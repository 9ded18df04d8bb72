//! External collaborators a lobby session talks to.
//!
//! The session owns none of these. It reads lobby state from a
//! [`LobbyStore`], asks other services for work it does not wait on, and
//! hands the game process commands through the
//! [`GameLaunchCoordinator`](crate::launch::GameLaunchCoordinator).
//!
//! # Implementing a map store
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use lobby_session::error::Result;
//! use lobby_session::services::MapStore;
//!
//! struct DiskMapStore;
//!
//! #[async_trait]
//! impl MapStore for DiskMapStore {
//!     async fn request_download(
//!         &self,
//!         hash: &str,
//!         format: &str,
//!         url: Option<&str>,
//!     ) -> Result<()> {
//!         // Fetch `url` into the local map cache under `hash.format`.
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::AudioOutput;
use crate::error::Result;
use crate::launch::GameProcess;
use crate::protocol::LobbyInfo;

/// The local participant, as known to the account store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LocalUser {
    pub id: String,
    pub name: String,
}

/// A chat message forwarded to a system notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatNotification {
    pub user: String,
    pub message: String,
}

/// Fetches and prepares map files.
#[async_trait]
pub trait MapStore: Send + Sync + 'static {
    /// Make sure the map with `hash` is available locally.
    ///
    /// # Errors
    ///
    /// Any failure to acquire the map. The session logs it and moves on.
    async fn request_download(&self, hash: &str, format: &str, url: Option<&str>) -> Result<()>;
}

/// Measures latency to the game relay servers.
pub trait NetworkMeasurement: Send + Sync + 'static {
    /// Start a new round of measurements. Returns without waiting for them.
    fn refresh_latencies(&self);
}

/// Read-only view of the lobby and account state.
///
/// The store belongs to the application, which updates it from the
/// [`LobbyTransition`](crate::LobbyTransition)s it receives. The session
/// never waits for that: a read made while executing an action sees only
/// the transitions the consumer has applied so far. A later sub-event of a
/// `diff` may therefore read a snapshot that does not yet include an
/// earlier sub-event.
pub trait LobbyStore: Send + Sync + 'static {
    /// The local participant.
    fn local_user(&self) -> LocalUser;

    /// The current lobby, if one has been loaded.
    fn lobby(&self) -> Option<LobbyInfo>;

    /// Local game settings, handed to the game process verbatim.
    fn settings(&self) -> serde_json::Value;
}

/// Application navigation.
pub trait Navigator: Send + Sync + 'static {
    /// Path currently displayed.
    fn current_path(&self) -> String;

    /// Replace the current location with `path` without adding history.
    fn replace(&self, path: &str);
}

/// Receives chat messages for system notifications. Only present in some
/// deployments.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: ChatNotification);
}

/// Everything a lobby session needs from the outside world.
#[derive(Clone)]
pub struct SessionServices {
    pub audio: Arc<dyn AudioOutput>,
    pub maps: Arc<dyn MapStore>,
    pub network: Arc<dyn NetworkMeasurement>,
    pub store: Arc<dyn LobbyStore>,
    pub navigator: Arc<dyn Navigator>,
    pub game: Arc<dyn GameProcess>,
    pub notifications: Option<Arc<dyn NotificationSink>>,
}

impl SessionServices {
    /// Bundle the required services. No notification sink is attached.
    pub fn new(
        audio: Arc<dyn AudioOutput>,
        maps: Arc<dyn MapStore>,
        network: Arc<dyn NetworkMeasurement>,
        store: Arc<dyn LobbyStore>,
        navigator: Arc<dyn Navigator>,
        game: Arc<dyn GameProcess>,
    ) -> Self {
        Self {
            audio,
            maps,
            network,
            store,
            navigator,
            game,
            notifications: None,
        }
    }

    /// Attach a chat notification sink.
    #[must_use]
    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices")
            .field("notifications", &self.notifications.is_some())
            .finish_non_exhaustive()
    }
}
