//! Error types for lobby sessions.

use thiserror::Error;

/// Errors that can occur while running a lobby session.
///
/// None of these are fatal to the user: the worst outcome of any failure in
/// the session core is a skipped transition or a dropped command.
#[derive(Debug, Error)]
pub enum LobbySessionError {
    /// Failed to receive an event from the route transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The route transport was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// An external collaborator (map store, network measurement, ...) failed.
    #[error("{service} failed: {message}")]
    ExternalService {
        /// Which collaborator produced the failure.
        service: &'static str,
        /// Human-readable failure description.
        message: String,
    },

    /// The external game process rejected or failed a command.
    #[error("game process command failed: {0}")]
    ProcessCommand(String),

    /// Failed to serialize or deserialize an event or launch payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized [`Result`] type for lobby session operations.
pub type Result<T> = std::result::Result<T, LobbySessionError>;
