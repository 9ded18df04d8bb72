//! Game launch handshake with the external game process.
//!
//! A launch runs through four server-driven steps: the game process is
//! configured, given its network routes, told to start once every player is
//! ready, and finally reported as started. [`GameLaunchCoordinator`] tracks
//! which step the current attempt is on and forwards each step to the game
//! process as a [`ProcessCommand`].
//!
//! Commands are queued on a channel and executed by a worker task (see
//! [`spawn_process_worker`]) so the coordinator never waits on the process.
//! Failures are logged by the worker and never retried.
//!
//! ```text
//!  Idle ──configure──▶ Configured ──setRoutes──▶ RoutesSet ──startWhenReady──▶ AwaitingStart
//!                                                                                   │ start accepted
//!                               cancel (any in-flight phase) ──▶ Canceled           ▼
//!                                                        Active ◀──markStarted── Loading
//! ```
//!
//! Only one attempt is tracked at a time. Every step after `configure`
//! carries the attempt's game id; a step for any other id is stale and is
//! ignored.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::protocol::{GameId, GameSetupInfo, LobbyInfo, MapInfo, NetworkRoute, Slot};
use crate::services::LocalUser;

// ── Phases ──────────────────────────────────────────────────────────

/// Progress of the current launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchPhase {
    /// No launch attempt.
    #[default]
    Idle,
    /// The game process has been handed its configuration.
    Configured,
    /// The game process knows its network routes.
    RoutesSet,
    /// The game process was told to start when ready.
    AwaitingStart,
    /// The game process accepted the start request and is loading.
    Loading,
    /// The game is running.
    Active,
    /// The attempt was abandoned. A new attempt may be configured.
    Canceled,
}

impl LaunchPhase {
    /// Whether an attempt is underway and may still be canceled.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Configured | Self::RoutesSet | Self::AwaitingStart | Self::Loading
        )
    }
}

// ── Launch configuration ────────────────────────────────────────────

/// A lobby slot as the game process sees it: flat, tagged with its team id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub team_id: u8,
}

/// Game description handed to the game process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSetup {
    pub game_id: GameId,
    pub name: String,
    pub map: MapInfo,
    pub game_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_sub_type: Option<u32>,
    pub slots: Vec<LaunchSlot>,
    pub host: Slot,
    pub seed: u32,
    #[serde(default)]
    pub result_code: Option<String>,
    pub server_url: String,
}

/// Full configuration payload for the setup step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    pub local_user: LocalUser,
    pub settings: serde_json::Value,
    pub setup: GameSetup,
}

impl LaunchConfig {
    /// Build the configuration for a launch of `lobby`.
    ///
    /// The game process does not understand teams, so in-game slots are
    /// flattened and each is tagged with the id of the team containing it.
    pub fn assemble(
        local_user: LocalUser,
        settings: serde_json::Value,
        lobby: &LobbyInfo,
        setup: &GameSetupInfo,
        result_code: Option<String>,
        server_url: &str,
    ) -> Self {
        let slots = lobby
            .in_game_slots()
            .map(|(team, slot)| LaunchSlot {
                slot: slot.clone(),
                team_id: team.team_id,
            })
            .collect();

        Self {
            local_user,
            settings,
            setup: GameSetup {
                game_id: setup.game_id.clone(),
                name: lobby.name.clone(),
                map: lobby.map.clone(),
                game_type: lobby.game_type.clone(),
                game_sub_type: lobby.game_sub_type,
                slots,
                host: lobby.host.clone(),
                seed: setup.seed,
                result_code,
                server_url: server_url.to_string(),
            },
        }
    }
}

// ── Game process ────────────────────────────────────────────────────

/// Command interface of the external game process.
#[async_trait]
pub trait GameProcess: Send + Sync + 'static {
    /// Replace the game configuration. `None` clears it.
    ///
    /// # Errors
    ///
    /// Any failure to deliver the configuration.
    async fn set_config(&self, config: Option<LaunchConfig>) -> Result<()>;

    /// Hand the game its network routes.
    ///
    /// # Errors
    ///
    /// Any failure to deliver the routes.
    async fn set_routes(&self, game_id: &str, routes: &[NetworkRoute]) -> Result<()>;

    /// Start the game once every player has loaded.
    ///
    /// # Errors
    ///
    /// Any failure to deliver the request.
    async fn start_when_ready(&self, game_id: &str) -> Result<()>;
}

/// A command queued for the game process.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessCommand {
    /// Replace the configuration; `None` clears it.
    SetConfig(Option<Box<LaunchConfig>>),
    SetRoutes {
        game_id: GameId,
        routes: Vec<NetworkRoute>,
    },
    StartWhenReady {
        game_id: GameId,
    },
}

/// Feedback from the process worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessReport {
    /// The game process accepted a start-when-ready request.
    StartAccepted { game_id: GameId },
}

/// Spawn the task that feeds queued commands to the game process in order.
///
/// The task exits once every command sender is dropped.
pub fn spawn_process_worker(
    process: Arc<dyn GameProcess>,
    mut commands: mpsc::UnboundedReceiver<ProcessCommand>,
    reports: mpsc::UnboundedSender<ProcessReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            match command {
                ProcessCommand::SetConfig(config) => {
                    if let Err(e) = process.set_config(config.map(|c| *c)).await {
                        error!("failed to set game config: {e}");
                    }
                }
                ProcessCommand::SetRoutes { game_id, routes } => {
                    if let Err(e) = process.set_routes(&game_id, &routes).await {
                        error!(%game_id, "failed to set game routes: {e}");
                    }
                }
                ProcessCommand::StartWhenReady { game_id } => {
                    match process.start_when_ready(&game_id).await {
                        Ok(()) => {
                            if reports
                                .send(ProcessReport::StartAccepted { game_id })
                                .is_err()
                            {
                                debug!("report channel closed, session gone");
                            }
                        }
                        Err(e) => error!(%game_id, "failed to start game: {e}"),
                    }
                }
            }
        }
        debug!("game process worker exited");
    })
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Tracks the current launch attempt and forwards its steps to the game
/// process.
///
/// Every step returns `true` if it advanced the attempt, `false` if it was
/// ignored as stale or out of order.
#[derive(Debug)]
pub struct GameLaunchCoordinator {
    phase: LaunchPhase,
    game_id: Option<GameId>,
    commands: mpsc::UnboundedSender<ProcessCommand>,
}

impl GameLaunchCoordinator {
    /// Create an idle coordinator that queues commands on `commands`.
    pub fn new(commands: mpsc::UnboundedSender<ProcessCommand>) -> Self {
        Self {
            phase: LaunchPhase::Idle,
            game_id: None,
            commands,
        }
    }

    /// Phase of the current attempt.
    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    /// Game id of the current attempt.
    pub fn current_game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    /// Start a new attempt with `config`. Any previous attempt is superseded
    /// and its game id becomes stale.
    pub fn configure(&mut self, config: LaunchConfig) -> bool {
        if self.phase != LaunchPhase::Idle && self.phase != LaunchPhase::Canceled {
            debug!(
                phase = ?self.phase,
                previous = ?self.game_id,
                "new launch supersedes the current attempt"
            );
        }
        self.game_id = Some(config.setup.game_id.clone());
        self.queue(ProcessCommand::SetConfig(Some(Box::new(config))));
        self.phase = LaunchPhase::Configured;
        true
    }

    /// Forward network routes for `game_id`.
    pub fn set_routes(&mut self, game_id: &str, routes: Vec<NetworkRoute>) -> bool {
        if !self.is_current(game_id, "setRoutes") {
            return false;
        }
        if !matches!(self.phase, LaunchPhase::Configured | LaunchPhase::RoutesSet) {
            debug!(phase = ?self.phase, "setRoutes out of order, ignoring");
            return false;
        }
        self.queue(ProcessCommand::SetRoutes {
            game_id: game_id.to_string(),
            routes,
        });
        self.phase = LaunchPhase::RoutesSet;
        true
    }

    /// Tell the game process to start `game_id` once everyone is ready.
    pub fn start_when_ready(&mut self, game_id: &str) -> bool {
        if !self.is_current(game_id, "startWhenReady") {
            return false;
        }
        if self.phase != LaunchPhase::RoutesSet {
            debug!(phase = ?self.phase, "startWhenReady out of order, ignoring");
            return false;
        }
        self.queue(ProcessCommand::StartWhenReady {
            game_id: game_id.to_string(),
        });
        self.phase = LaunchPhase::AwaitingStart;
        true
    }

    /// Record that the game process accepted the start request for `game_id`.
    pub fn mark_loading(&mut self, game_id: &str) -> bool {
        if !self.is_current(game_id, "markLoading") {
            return false;
        }
        if self.phase != LaunchPhase::AwaitingStart {
            return false;
        }
        self.phase = LaunchPhase::Loading;
        true
    }

    /// Record that the game is running.
    pub fn mark_started(&mut self) -> bool {
        if !matches!(self.phase, LaunchPhase::AwaitingStart | LaunchPhase::Loading) {
            debug!(phase = ?self.phase, "game started outside of a launch, ignoring");
            return false;
        }
        self.phase = LaunchPhase::Active;
        true
    }

    /// Abandon the in-flight attempt and clear the game configuration.
    /// Does nothing when no attempt is in flight.
    pub fn cancel(&mut self) -> bool {
        if !self.phase.is_in_flight() {
            return false;
        }
        self.queue(ProcessCommand::SetConfig(None));
        debug!(game_id = ?self.game_id, phase = ?self.phase, "launch canceled");
        self.game_id = None;
        self.phase = LaunchPhase::Canceled;
        true
    }

    fn is_current(&self, game_id: &str, step: &str) -> bool {
        if self.phase == LaunchPhase::Active || self.game_id.as_deref() != Some(game_id) {
            debug!(
                step,
                game_id,
                current = ?self.game_id,
                phase = ?self.phase,
                "ignoring stale launch command"
            );
            return false;
        }
        true
    }

    fn queue(&self, command: ProcessCommand) {
        if self.commands.send(command).is_err() {
            warn!("game process worker is gone, dropping command");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{SlotType, Team};

    fn config(game_id: &str) -> LaunchConfig {
        LaunchConfig {
            local_user: LocalUser {
                id: "1".into(),
                name: "Alice".into(),
            },
            settings: serde_json::json!({}),
            setup: GameSetup {
                game_id: game_id.into(),
                name: "Lobby".into(),
                map: MapInfo::default(),
                game_type: "melee".into(),
                game_sub_type: None,
                slots: vec![],
                host: Slot::default(),
                seed: 7,
                result_code: None,
                server_url: "https://example.test".into(),
            },
        }
    }

    fn coordinator() -> (
        GameLaunchCoordinator,
        mpsc::UnboundedReceiver<ProcessCommand>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GameLaunchCoordinator::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProcessCommand>) -> Vec<ProcessCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[test]
    fn full_handshake_reaches_active() {
        let (mut coord, mut rx) = coordinator();
        assert!(coord.configure(config("g1")));
        assert!(coord.set_routes("g1", vec![serde_json::json!({"id": "r"})]));
        assert!(coord.start_when_ready("g1"));
        assert_eq!(coord.phase(), LaunchPhase::AwaitingStart);
        assert!(coord.mark_loading("g1"));
        assert!(coord.mark_started());
        assert_eq!(coord.phase(), LaunchPhase::Active);

        let commands = drain(&mut rx);
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], ProcessCommand::SetConfig(Some(_))));
        assert!(matches!(commands[1], ProcessCommand::SetRoutes { .. }));
        assert!(matches!(commands[2], ProcessCommand::StartWhenReady { .. }));
    }

    #[test]
    fn reconfigure_makes_previous_game_id_stale() {
        let (mut coord, mut rx) = coordinator();
        coord.configure(config("1"));
        coord.configure(config("2"));

        assert!(!coord.set_routes("1", vec![]));
        assert_eq!(coord.phase(), LaunchPhase::Configured);
        assert_eq!(coord.current_game_id(), Some("2"));
        assert!(!coord.start_when_ready("1"));

        let commands = drain(&mut rx);
        assert_eq!(commands.len(), 2, "stale calls queue nothing");
    }

    #[test]
    fn start_when_ready_requires_routes() {
        let (mut coord, _rx) = coordinator();
        coord.configure(config("g"));
        assert!(!coord.start_when_ready("g"));
        assert_eq!(coord.phase(), LaunchPhase::Configured);
    }

    #[test]
    fn set_routes_may_repeat() {
        let (mut coord, _rx) = coordinator();
        coord.configure(config("g"));
        assert!(coord.set_routes("g", vec![]));
        assert!(coord.set_routes("g", vec![]));
        assert_eq!(coord.phase(), LaunchPhase::RoutesSet);
    }

    #[test]
    fn active_rejects_further_steps() {
        let (mut coord, _rx) = coordinator();
        coord.configure(config("g"));
        coord.set_routes("g", vec![]);
        coord.start_when_ready("g");
        coord.mark_started();

        assert!(!coord.set_routes("g", vec![]));
        assert!(!coord.start_when_ready("g"));
        assert!(!coord.cancel());
        assert_eq!(coord.phase(), LaunchPhase::Active);
    }

    #[test]
    fn cancel_clears_config_and_allows_new_attempt() {
        let (mut coord, mut rx) = coordinator();
        assert!(!coord.cancel(), "idle cancel is a no-op");
        assert!(drain(&mut rx).is_empty());

        coord.configure(config("g"));
        coord.set_routes("g", vec![]);
        assert!(coord.cancel());
        assert_eq!(coord.phase(), LaunchPhase::Canceled);
        assert!(!coord.start_when_ready("g"));

        let commands = drain(&mut rx);
        assert_eq!(commands.last(), Some(&ProcessCommand::SetConfig(None)));

        assert!(coord.configure(config("h")));
        assert_eq!(coord.phase(), LaunchPhase::Configured);
    }

    #[test]
    fn mark_loading_ignores_other_games() {
        let (mut coord, _rx) = coordinator();
        coord.configure(config("g"));
        coord.set_routes("g", vec![]);
        coord.start_when_ready("g");
        assert!(!coord.mark_loading("other"));
        assert_eq!(coord.phase(), LaunchPhase::AwaitingStart);
    }

    #[test]
    fn assemble_tags_slots_with_team_ids() {
        let human = Slot {
            slot_type: SlotType::Human,
            id: "a".into(),
            name: "Alice".into(),
            ..Default::default()
        };
        let computer = Slot {
            slot_type: SlotType::Computer,
            id: "c".into(),
            ..Default::default()
        };
        let lobby = LobbyInfo {
            name: "Lobby".into(),
            game_type: "topVBottom".into(),
            game_sub_type: Some(1),
            host: human.clone(),
            teams: vec![
                Team {
                    team_id: 1,
                    slots: vec![human.clone(), Slot::default()],
                    ..Default::default()
                },
                Team {
                    team_id: 2,
                    slots: vec![computer.clone()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let setup = GameSetupInfo {
            game_id: "g".into(),
            seed: 42,
        };

        let cfg = LaunchConfig::assemble(
            LocalUser::default(),
            serde_json::json!({"volume": 3}),
            &lobby,
            &setup,
            Some("code".into()),
            "https://example.test",
        );

        assert_eq!(
            cfg.setup.slots,
            vec![
                LaunchSlot {
                    slot: human,
                    team_id: 1
                },
                LaunchSlot {
                    slot: computer,
                    team_id: 2
                },
            ]
        );
        assert_eq!(cfg.setup.seed, 42);
        assert_eq!(cfg.setup.result_code.as_deref(), Some("code"));

        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["setup"]["slots"][0]["teamId"], 1);
        assert_eq!(json["setup"]["slots"][0]["type"], "human");
        assert_eq!(json["setup"]["serverUrl"], "https://example.test");
    }
}
