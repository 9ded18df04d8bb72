//! Local state transitions emitted by a lobby session.
//!
//! A [`LobbySession`](crate::session::LobbySession) turns server events into
//! [`LobbyTransition`]s delivered on a bounded channel. Each transition maps
//! one-to-one onto a state update the surrounding application applies to its
//! lobby view.

use crate::protocol::{GameId, LobbyInfo, Slot};

/// A state update produced by the lobby session.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyTransition {
    /// Full lobby state replaced.
    InitData { lobby: LobbyInfo },
    /// A slot became occupied.
    SlotCreated {
        team_index: u8,
        slot_index: u8,
        slot: Slot,
    },
    /// A player changed race.
    RaceChanged {
        team_index: u8,
        slot_index: u8,
        new_race: String,
    },
    /// The local player left the lobby.
    LeftSelf,
    /// Another player left the lobby.
    Left { player: Slot },
    /// The local player was kicked.
    KickedSelf,
    /// Another player was kicked.
    Kicked { player: Slot },
    /// The local player was banned.
    BannedSelf,
    /// Another player was banned.
    Banned { player: Slot },
    /// The lobby host changed.
    HostChanged { host: Slot },
    /// A player moved between slots.
    SlotChanged {
        team_index: u8,
        slot_index: u8,
        new_team_index: u8,
        new_slot_index: u8,
    },
    /// A slot was removed.
    SlotDeleted { team_index: u8, slot_index: u8 },
    /// The countdown started at the given value.
    CountdownStarted(u8),
    /// The countdown ticked down to the given value.
    CountdownTick(u8),
    /// The countdown was stopped before reaching zero.
    CountdownCanceled,
    /// The countdown finished and the game is loading.
    LoadingStarted,
    /// Loading was aborted.
    LoadingCanceled,
    /// The game is running. Carries the lobby as it was at start.
    GameStarted { lobby: Option<LobbyInfo> },
    /// A chat message arrived.
    ChatMessage {
        from: String,
        text: String,
        time: Option<u64>,
    },
    /// Opaque status update.
    Status {
        details: serde_json::Map<String, serde_json::Value>,
    },
    /// A one-time message that should be shown to the user.
    Notice { message: String },
    /// The game process was handed a configuration for this launch.
    GameLaunchConfigured { game_id: GameId },
    /// The session ended. Always the last transition on the channel.
    SessionClosed { reason: Option<String> },
}
