//! # Lobby Session
//!
//! Keeps a multiplayer game client in sync with a server-hosted lobby and
//! drives the hand-off from the lobby into a running game.
//!
//! A [`LobbySession`] binds the routes of one lobby on a [`RouteTransport`],
//! interprets every event published on them, and turns each into ordered
//! [`LobbyTransition`]s for the application, audio cues, navigation and
//! commands for the external game process.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`RouteTransport`] for whatever
//!   socket layer delivers decoded lobby events
//! - **Serialized**: one task owns all session state, so events, countdown
//!   ticks and process reports are applied strictly in order
//! - **Countdown with cues**: a restartable pre-game countdown whose stale
//!   ticks can never be observed
//! - **Launch handshake**: configure → routes → start-when-ready → started,
//!   with superseded game ids ignored
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let (sender, transport) = channel_transport();
//! let services = SessionServices::new(audio, maps, network, store, navigator, game);
//! let (mut session, mut transitions) = LobbySession::start(
//!     "My Lobby",
//!     transport,
//!     services,
//!     SessionConfig::new("https://lobby.example.com"),
//! );
//!
//! while let Some(transition) = transitions.recv().await {
//!     apply_to_lobby_state(transition);
//! }
//! ```

pub mod audio;
pub mod countdown;
pub mod error;
pub mod identity;
pub mod interpreter;
pub mod launch;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod session;
pub mod transition;
pub mod transport;

// Re-export primary types for ergonomic imports.
pub use error::LobbySessionError;
pub use launch::{GameProcess, LaunchConfig, LaunchPhase};
pub use protocol::{LobbyEvent, LobbyInfo};
pub use services::SessionServices;
pub use session::{LobbySession, SessionConfig};
pub use transition::LobbyTransition;
pub use transport::{channel_transport, RouteTransport};
