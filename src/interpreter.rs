//! Mapping from lobby events to the actions a session performs.
//!
//! [`EventInterpreter::interpret`] is pure: it looks only at the event, the
//! lobby the event was routed to and the local identity, and returns an
//! ordered list of [`Action`]s. The session executes them in that order.
//! Keeping side effects out of the mapping lets it be tested exhaustively
//! without timers, audio or a game process.

use tracing::{debug, warn};

use crate::identity::{is_self, Removal};
use crate::protocol::{GameId, GameSetupInfo, LobbyEvent, NetworkRoute, Slot};
use crate::routes::{active_game_path, loading_game_path, lobby_path};
use crate::services::ChatNotification;
use crate::transition::LobbyTransition;

/// One step a session takes in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Hand a transition to the application.
    Emit(LobbyTransition),
    /// Start the countdown (canceling any running one) and announce it.
    StartCountdown,
    /// Stop the countdown and fade all of its cues.
    CancelCountdown,
    /// Fade the atmosphere cue that outlived the countdown.
    FadeAtmosphere { slow: bool },
    /// Play the one-shot join alert.
    PlayJoinAlert,
    /// Ask the map store for the lobby's map without waiting on it.
    DownloadMap {
        hash: String,
        format: String,
        url: Option<String>,
    },
    /// Ask for fresh relay latency measurements.
    RefreshLatencies,
    /// Replace the current location with `target`, only if it is `expected`.
    NavigateIfAt { expected: String, target: String },
    /// Build a launch configuration from the lobby store and configure the
    /// game process with it.
    ConfigureLaunch {
        setup: GameSetupInfo,
        result_code: Option<String>,
    },
    /// Forward network routes to the game process.
    SetRoutes {
        game_id: GameId,
        routes: Vec<NetworkRoute>,
    },
    /// Tell the game process to start when ready.
    StartWhenReady { game_id: GameId },
    /// Abandon the current launch and clear the game configuration.
    CancelLaunch,
    /// Record the current launch as running.
    MarkGameStarted,
    /// Emit [`LobbyTransition::GameStarted`] carrying the stored lobby.
    AnnounceGameStarted,
    /// Forward a chat message to the notification sink.
    NotifyChat(ChatNotification),
}

/// Turns lobby events into actions.
#[derive(Debug, Clone, Default)]
pub struct EventInterpreter {
    notify_chat: bool,
}

impl EventInterpreter {
    /// Create an interpreter. Chat messages produce
    /// [`Action::NotifyChat`] only when `notify_chat` is set.
    pub fn new(notify_chat: bool) -> Self {
        Self { notify_chat }
    }

    /// Interpret `event`, routed to `lobby`, for the participant named
    /// `local_identity`.
    ///
    /// A `diff` yields the concatenation of its sub-events' actions, in
    /// order. Unknown event kinds yield nothing.
    pub fn interpret(&self, lobby: &str, event: LobbyEvent, local_identity: &str) -> Vec<Action> {
        match event {
            LobbyEvent::Diff { diff_events } => diff_events
                .into_iter()
                .flat_map(|sub| {
                    if matches!(sub, LobbyEvent::Diff { .. }) {
                        warn!(lobby, "nested diff event, skipping");
                        return Vec::new();
                    }
                    self.interpret(lobby, sub, local_identity)
                })
                .collect(),
            event => self.interpret_single(lobby, event, local_identity),
        }
    }

    /// Actions taken when the countdown reaches zero.
    pub fn countdown_finished(&self, lobby: &str) -> Vec<Action> {
        vec![
            Action::Emit(LobbyTransition::LoadingStarted),
            Action::NavigateIfAt {
                expected: lobby_path(lobby),
                target: loading_game_path(lobby),
            },
        ]
    }

    fn interpret_single(&self, lobby: &str, event: LobbyEvent, local_identity: &str) -> Vec<Action> {
        match event {
            LobbyEvent::Init { lobby: info } => vec![
                Action::CancelCountdown,
                Action::DownloadMap {
                    hash: info.map.hash.clone(),
                    format: info.map.map_data.format.clone(),
                    url: info.map.map_url.clone(),
                },
                Action::RefreshLatencies,
                Action::Emit(LobbyTransition::InitData { lobby: info }),
            ],

            LobbyEvent::SlotCreate {
                team_index,
                slot_index,
                slot,
            } => {
                let mut actions = Vec::with_capacity(2);
                if slot.is_human() {
                    actions.push(Action::PlayJoinAlert);
                }
                actions.push(Action::Emit(LobbyTransition::SlotCreated {
                    team_index,
                    slot_index,
                    slot,
                }));
                actions
            }

            LobbyEvent::Leave { player } => removal(Removal::Leave, player, local_identity),
            LobbyEvent::Kick { player } => removal(Removal::Kick, player, local_identity),
            LobbyEvent::Ban { player } => removal(Removal::Ban, player, local_identity),

            LobbyEvent::RaceChange {
                team_index,
                slot_index,
                new_race,
            } => vec![Action::Emit(LobbyTransition::RaceChanged {
                team_index,
                slot_index,
                new_race,
            })],
            LobbyEvent::HostChange { host } => {
                vec![Action::Emit(LobbyTransition::HostChanged { host })]
            }
            LobbyEvent::SlotChange {
                team_index,
                slot_index,
                new_team_index,
                new_slot_index,
            } => vec![Action::Emit(LobbyTransition::SlotChanged {
                team_index,
                slot_index,
                new_team_index,
                new_slot_index,
            })],
            LobbyEvent::SlotDeleted {
                team_index,
                slot_index,
            } => vec![Action::Emit(LobbyTransition::SlotDeleted {
                team_index,
                slot_index,
            })],

            LobbyEvent::StartCountdown => vec![Action::StartCountdown],
            LobbyEvent::CancelCountdown => vec![
                Action::CancelCountdown,
                Action::Emit(LobbyTransition::CountdownCanceled),
            ],

            LobbyEvent::SetupGame { setup, result_code } => {
                vec![Action::ConfigureLaunch { setup, result_code }]
            }
            LobbyEvent::SetRoutes { game_id, routes } => {
                vec![Action::SetRoutes { game_id, routes }]
            }
            LobbyEvent::StartWhenReady { game_id } => vec![Action::StartWhenReady { game_id }],

            LobbyEvent::CancelLoading => vec![
                Action::FadeAtmosphere { slow: true },
                Action::NavigateIfAt {
                    expected: loading_game_path(lobby),
                    target: lobby_path(lobby),
                },
                Action::CancelLaunch,
                Action::Emit(LobbyTransition::LoadingCanceled),
            ],
            LobbyEvent::GameStarted => vec![
                Action::FadeAtmosphere { slow: true },
                Action::NavigateIfAt {
                    expected: loading_game_path(lobby),
                    target: active_game_path(lobby),
                },
                Action::MarkGameStarted,
                Action::AnnounceGameStarted,
            ],

            LobbyEvent::Chat { from, text, time } => {
                let mut actions = Vec::with_capacity(2);
                if self.notify_chat {
                    actions.push(Action::NotifyChat(ChatNotification {
                        user: from.clone(),
                        message: text.clone(),
                    }));
                }
                actions.push(Action::Emit(LobbyTransition::ChatMessage { from, text, time }));
                actions
            }
            LobbyEvent::Status { details } => {
                vec![Action::Emit(LobbyTransition::Status { details })]
            }

            LobbyEvent::Unknown => {
                debug!(lobby, "ignoring unknown lobby event kind");
                Vec::new()
            }
            LobbyEvent::Diff { diff_events } => {
                self.interpret(lobby, LobbyEvent::Diff { diff_events }, local_identity)
            }
        }
    }
}

fn removal(kind: Removal, player: Slot, local_identity: &str) -> Vec<Action> {
    if !is_self(&player.name, local_identity) {
        return vec![Action::Emit(kind.other_transition(player))];
    }

    let mut actions = vec![Action::CancelCountdown];
    if let Some(message) = kind.self_notice() {
        actions.push(Action::Emit(LobbyTransition::Notice {
            message: message.to_string(),
        }));
    }
    actions.push(Action::Emit(kind.self_transition()));
    actions
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
    use crate::protocol::{LobbyInfo, MapData, MapInfo, SlotType};

    const LOBBY: &str = "Fun Lobby";

    fn player(name: &str, slot_type: SlotType) -> Slot {
        Slot {
            slot_type,
            id: format!("id-{name}"),
            name: name.into(),
            ..Default::default()
        }
    }

    fn interpret(event: LobbyEvent) -> Vec<Action> {
        EventInterpreter::new(false).interpret(LOBBY, event, "Alice")
    }

    #[test]
    fn init_cancels_countdown_then_fetches_map() {
        let info = LobbyInfo {
            name: LOBBY.into(),
            map: MapInfo {
                hash: "abc".into(),
                map_data: MapData {
                    format: "scx".into(),
                },
                map_url: Some("https://maps.test/abc".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let actions = interpret(LobbyEvent::Init {
            lobby: info.clone(),
        });
        assert_eq!(
            actions,
            vec![
                Action::CancelCountdown,
                Action::DownloadMap {
                    hash: "abc".into(),
                    format: "scx".into(),
                    url: Some("https://maps.test/abc".into()),
                },
                Action::RefreshLatencies,
                Action::Emit(LobbyTransition::InitData { lobby: info }),
            ]
        );
    }

    #[test]
    fn human_slot_create_plays_alert_computer_does_not() {
        let human = interpret(LobbyEvent::SlotCreate {
            team_index: 0,
            slot_index: 1,
            slot: player("Bob", SlotType::Human),
        });
        assert_eq!(human.len(), 2);
        assert_eq!(human[0], Action::PlayJoinAlert);

        let computer = interpret(LobbyEvent::SlotCreate {
            team_index: 0,
            slot_index: 2,
            slot: player("cpu", SlotType::Computer),
        });
        assert_eq!(computer.len(), 1);
        assert!(matches!(
            computer[0],
            Action::Emit(LobbyTransition::SlotCreated { .. })
        ));
    }

    #[test]
    fn self_kick_cancels_countdown_and_notifies() {
        let actions = interpret(LobbyEvent::Kick {
            player: player("Alice", SlotType::Human),
        });
        assert_eq!(
            actions,
            vec![
                Action::CancelCountdown,
                Action::Emit(LobbyTransition::Notice {
                    message: "You have been kicked from the lobby.".into()
                }),
                Action::Emit(LobbyTransition::KickedSelf),
            ]
        );
    }

    #[test]
    fn self_leave_has_no_notice() {
        let actions = interpret(LobbyEvent::Leave {
            player: player("Alice", SlotType::Human),
        });
        assert_eq!(
            actions,
            vec![
                Action::CancelCountdown,
                Action::Emit(LobbyTransition::LeftSelf)
            ]
        );
    }

    #[test]
    fn other_removals_touch_nothing_else() {
        let bob = player("Bob", SlotType::Human);
        for (event, expected) in [
            (
                LobbyEvent::Leave {
                    player: bob.clone(),
                },
                LobbyTransition::Left {
                    player: bob.clone(),
                },
            ),
            (
                LobbyEvent::Kick {
                    player: bob.clone(),
                },
                LobbyTransition::Kicked {
                    player: bob.clone(),
                },
            ),
            (
                LobbyEvent::Ban {
                    player: bob.clone(),
                },
                LobbyTransition::Banned {
                    player: bob.clone(),
                },
            ),
        ] {
            assert_eq!(interpret(event), vec![Action::Emit(expected)]);
        }
    }

    #[test]
    fn diff_is_concatenation_of_sub_events() {
        let subs = vec![
            LobbyEvent::SlotCreate {
                team_index: 0,
                slot_index: 0,
                slot: player("Bob", SlotType::Human),
            },
            LobbyEvent::HostChange {
                host: player("Bob", SlotType::Human),
            },
            LobbyEvent::Unknown,
            LobbyEvent::Ban {
                player: player("Alice", SlotType::Human),
            },
        ];
        let expected: Vec<Action> = subs.iter().cloned().flat_map(interpret).collect();
        let actual = interpret(LobbyEvent::Diff { diff_events: subs });
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 6);
    }

    #[test]
    fn nested_diff_is_skipped() {
        let actions = interpret(LobbyEvent::Diff {
            diff_events: vec![
                LobbyEvent::Diff {
                    diff_events: vec![LobbyEvent::StartCountdown],
                },
                LobbyEvent::CancelCountdown,
            ],
        });
        assert_eq!(
            actions,
            vec![
                Action::CancelCountdown,
                Action::Emit(LobbyTransition::CountdownCanceled)
            ]
        );
    }

    #[test]
    fn unknown_event_yields_nothing() {
        assert!(interpret(LobbyEvent::Unknown).is_empty());
    }

    #[test]
    fn launch_steps_produce_no_transitions() {
        let routes = interpret(LobbyEvent::SetRoutes {
            game_id: "g".into(),
            routes: vec![],
        });
        let start = interpret(LobbyEvent::StartWhenReady {
            game_id: "g".into(),
        });
        for action in routes.iter().chain(start.iter()) {
            assert!(!matches!(action, Action::Emit(_)));
        }
    }

    #[test]
    fn cancel_loading_navigates_back_to_lobby() {
        let actions = interpret(LobbyEvent::CancelLoading);
        assert_eq!(
            actions,
            vec![
                Action::FadeAtmosphere { slow: true },
                Action::NavigateIfAt {
                    expected: "/lobbies/Fun%20Lobby/loading-game".into(),
                    target: "/lobbies/Fun%20Lobby".into(),
                },
                Action::CancelLaunch,
                Action::Emit(LobbyTransition::LoadingCanceled),
            ]
        );
    }

    #[test]
    fn game_started_navigates_to_active_game() {
        let actions = interpret(LobbyEvent::GameStarted);
        assert!(actions.contains(&Action::NavigateIfAt {
            expected: "/lobbies/Fun%20Lobby/loading-game".into(),
            target: "/lobbies/Fun%20Lobby/active-game".into(),
        }));
        assert_eq!(actions.last(), Some(&Action::AnnounceGameStarted));
    }

    #[test]
    fn chat_notifies_only_when_enabled() {
        let chat = || LobbyEvent::Chat {
            from: "Bob".into(),
            text: "hi".into(),
            time: Some(1),
        };
        assert_eq!(interpret(chat()).len(), 1);

        let with_sink = EventInterpreter::new(true).interpret(LOBBY, chat(), "Alice");
        assert_eq!(
            with_sink[0],
            Action::NotifyChat(ChatNotification {
                user: "Bob".into(),
                message: "hi".into()
            })
        );
        assert_eq!(with_sink.len(), 2);
    }

    #[test]
    fn countdown_finish_moves_lobby_view_to_loading() {
        let actions = EventInterpreter::default().countdown_finished(LOBBY);
        assert_eq!(
            actions,
            vec![
                Action::Emit(LobbyTransition::LoadingStarted),
                Action::NavigateIfAt {
                    expected: "/lobbies/Fun%20Lobby".into(),
                    target: "/lobbies/Fun%20Lobby/loading-game".into(),
                },
            ]
        );
    }
}
