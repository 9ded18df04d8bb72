//! Decoded lobby event types.
//!
//! Every type here mirrors the structured data the lobby server pushes on a
//! lobby route. Decoding from the wire is the transport's job; these types
//! carry `serde` derives so a transport (or a test) can build them from JSON
//! using the server's field names:
//!
//! - the event kind lives in a `"type"` tag (`"slotCreate"`, `"diff"`, ...)
//! - fields are camelCase (`teamIndex`, `diffEvents`, `gameId`)
//! - unknown event kinds decode to [`LobbyEvent::Unknown`] instead of failing

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Identifier the server assigns to a single game launch attempt.
pub type GameId = String;

/// Opaque network route descriptor, forwarded verbatim to the game process.
pub type NetworkRoute = serde_json::Value;

// ── Enums ───────────────────────────────────────────────────────────

/// What occupies a lobby slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SlotType {
    /// A connected human player.
    Human,
    /// A computer-controlled player.
    Computer,
    /// A computer player placed by a use-map-settings map.
    UmsComputer,
    /// An empty slot anyone may take.
    #[default]
    Open,
    /// A slot nobody may take.
    Closed,
    /// An open slot controlled by a team leader.
    ControlledOpen,
    /// A closed slot controlled by a team leader.
    ControlledClosed,
}

impl SlotType {
    /// Whether a slot of this type takes part in the game once launched.
    pub fn is_in_game(self) -> bool {
        matches!(self, Self::Human | Self::Computer | Self::UmsComputer)
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A single lobby slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub has_forced_race: bool,
}

impl Slot {
    /// Whether this slot is occupied by a human player.
    pub fn is_human(&self) -> bool {
        self.slot_type == SlotType::Human
    }
}

/// A team of slots. Teams are addressed by index in events and by
/// `team_id` inside the game process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_observer: bool,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

/// Map file details needed to acquire the map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MapData {
    pub format: String,
}

/// The lobby's selected map.
///
/// Unrecognized fields are kept so the full map record reaches the game
/// process unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    pub hash: String,
    pub map_data: MapData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full description of a lobby, as sent with `init` and kept by the lobby
/// store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LobbyInfo {
    pub name: String,
    pub map: MapInfo,
    pub game_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_sub_type: Option<u32>,
    pub host: Slot,
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl LobbyInfo {
    /// Slots that take part in the game, walked team by team, each paired
    /// with the team that contains it.
    pub fn in_game_slots(&self) -> impl Iterator<Item = (&Team, &Slot)> {
        self.teams
            .iter()
            .filter(|team| !team.is_observer)
            .flat_map(|team| team.slots.iter().map(move |slot| (team, slot)))
            .filter(|(_, slot)| slot.slot_type.is_in_game())
    }
}

/// Server-assigned parameters of a game launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameSetupInfo {
    pub game_id: GameId,
    pub seed: u32,
}

// ── Events ──────────────────────────────────────────────────────────

/// An event pushed by the server on a lobby route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum LobbyEvent {
    /// Full lobby state, sent when the client enters the lobby.
    Init { lobby: LobbyInfo },
    /// An ordered batch of events that must be applied as one unit.
    /// Batches never nest.
    Diff { diff_events: Vec<LobbyEvent> },
    /// A slot became occupied.
    SlotCreate {
        team_index: u8,
        slot_index: u8,
        slot: Slot,
    },
    /// A player picked a different race.
    RaceChange {
        team_index: u8,
        slot_index: u8,
        new_race: String,
    },
    /// A player left the lobby.
    Leave { player: Slot },
    /// A player was kicked by the host.
    Kick { player: Slot },
    /// A player was banned by the host.
    Ban { player: Slot },
    /// The lobby host changed.
    HostChange { host: Slot },
    /// A player moved between slots.
    SlotChange {
        team_index: u8,
        slot_index: u8,
        new_team_index: u8,
        new_slot_index: u8,
    },
    /// A slot was removed.
    SlotDeleted { team_index: u8, slot_index: u8 },
    /// The pre-game countdown started.
    StartCountdown,
    /// The pre-game countdown was stopped.
    CancelCountdown,
    /// Launch phase 1: the game process should be configured.
    SetupGame {
        setup: GameSetupInfo,
        #[serde(default)]
        result_code: Option<String>,
    },
    /// Launch phase 2: network routes for the game are ready.
    SetRoutes {
        game_id: GameId,
        routes: Vec<NetworkRoute>,
    },
    /// Launch phase 3: the game process should start once everyone loaded.
    StartWhenReady { game_id: GameId },
    /// Loading was aborted by the server.
    CancelLoading,
    /// Every player finished loading and the game is running.
    GameStarted,
    /// A chat message in the lobby.
    Chat {
        from: String,
        text: String,
        #[serde(default)]
        time: Option<u64>,
    },
    /// Opaque status update.
    Status {
        #[serde(flatten)]
        details: serde_json::Map<String, serde_json::Value>,
    },
    /// Any event kind this client does not know about.
    #[serde(other)]
    Unknown,
}

impl LobbyEvent {
    /// The wire name of this event's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Diff { .. } => "diff",
            Self::SlotCreate { .. } => "slotCreate",
            Self::RaceChange { .. } => "raceChange",
            Self::Leave { .. } => "leave",
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::HostChange { .. } => "hostChange",
            Self::SlotChange { .. } => "slotChange",
            Self::SlotDeleted { .. } => "slotDeleted",
            Self::StartCountdown => "startCountdown",
            Self::CancelCountdown => "cancelCountdown",
            Self::SetupGame { .. } => "setupGame",
            Self::SetRoutes { .. } => "setRoutes",
            Self::StartWhenReady { .. } => "startWhenReady",
            Self::CancelLoading => "cancelLoading",
            Self::GameStarted => "gameStarted",
            Self::Chat { .. } => "chat",
            Self::Status { .. } => "status",
            Self::Unknown => "unknown",
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
