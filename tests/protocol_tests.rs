#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol decoding tests for lobby events.
//!
//! Decodes JSON fixtures shaped like real lobby server output into
//! [`LobbyEvent`]s, and checks the launch configuration payload the game
//! process receives.

use lobby_session::launch::LaunchConfig;
use lobby_session::protocol::{GameSetupInfo, LobbyEvent, LobbyInfo, Slot, SlotType};
use lobby_session::services::LocalUser;

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

fn decode(json: &str) -> LobbyEvent {
    serde_json::from_str(json).expect("deserialize")
}

const ALICE: &str = r#"{ "type": "human", "id": "u1", "name": "Alice", "race": "p" }"#;

// ════════════════════════════════════════════════════════════════════
// Server JSON fixture tests
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_init_from_server() {
    let json = r#"{
        "type": "init",
        "lobby": {
            "name": "Fun Lobby",
            "map": {
                "hash": "deadbeef",
                "mapData": { "format": "scx" },
                "mapUrl": "https://maps.example.test/deadbeef",
                "name": "Lost Temple",
                "uploadDate": "2020-01-01"
            },
            "gameType": "topVBottom",
            "gameSubType": 2,
            "host": { "type": "human", "id": "u1", "name": "Alice", "race": "p" },
            "teams": [
                {
                    "teamId": 1,
                    "name": "Top",
                    "slots": [
                        { "type": "human", "id": "u1", "name": "Alice", "race": "p" },
                        { "type": "open", "id": "s2" }
                    ]
                },
                {
                    "teamId": 2,
                    "name": "Bottom",
                    "slots": [
                        { "type": "computer", "id": "s3", "race": "z", "hasForcedRace": true }
                    ]
                }
            ]
        }
    }"#;

    let LobbyEvent::Init { lobby } = decode(json) else {
        panic!("expected init");
    };
    assert_eq!(lobby.name, "Fun Lobby");
    assert_eq!(lobby.map.hash, "deadbeef");
    assert_eq!(lobby.map.map_data.format, "scx");
    assert_eq!(
        lobby.map.map_url.as_deref(),
        Some("https://maps.example.test/deadbeef")
    );
    assert_eq!(lobby.map.extra["name"], "Lost Temple");
    assert_eq!(lobby.game_sub_type, Some(2));
    assert_eq!(lobby.teams.len(), 2);
    assert_eq!(lobby.teams[0].slots[1].slot_type, SlotType::Open);
    assert_eq!(lobby.teams[0].slots[1].name, "");
    assert!(lobby.teams[1].slots[0].has_forced_race);
    assert_eq!(lobby.in_game_slots().count(), 2);
}

#[test]
fn fixture_slot_create_from_server() {
    let json = format!(r#"{{"type":"slotCreate","teamIndex":0,"slotIndex":3,"slot":{ALICE}}}"#);
    assert_eq!(
        decode(&json),
        LobbyEvent::SlotCreate {
            team_index: 0,
            slot_index: 3,
            slot: Slot {
                slot_type: SlotType::Human,
                id: "u1".into(),
                name: "Alice".into(),
                race: "p".into(),
                has_forced_race: false,
            },
        }
    );
}

#[test]
fn fixture_race_and_slot_changes() {
    assert_eq!(
        decode(r#"{"type":"raceChange","teamIndex":1,"slotIndex":0,"newRace":"t"}"#),
        LobbyEvent::RaceChange {
            team_index: 1,
            slot_index: 0,
            new_race: "t".into(),
        }
    );
    assert_eq!(
        decode(
            r#"{"type":"slotChange","teamIndex":0,"slotIndex":1,"newTeamIndex":1,"newSlotIndex":2}"#
        ),
        LobbyEvent::SlotChange {
            team_index: 0,
            slot_index: 1,
            new_team_index: 1,
            new_slot_index: 2,
        }
    );
    assert_eq!(
        decode(r#"{"type":"slotDeleted","teamIndex":1,"slotIndex":2}"#),
        LobbyEvent::SlotDeleted {
            team_index: 1,
            slot_index: 2,
        }
    );
}

#[test]
fn fixture_removals_from_server() {
    for kind in ["leave", "kick", "ban"] {
        let json = format!(r#"{{"type":"{kind}","player":{ALICE}}}"#);
        assert_eq!(decode(&json).kind(), kind);
    }

    let json = format!(r#"{{"type":"hostChange","host":{ALICE}}}"#);
    let LobbyEvent::HostChange { host } = decode(&json) else {
        panic!("expected hostChange");
    };
    assert_eq!(host.name, "Alice");
}

#[test]
fn fixture_diff_keeps_sub_event_order() {
    let json = format!(
        r#"{{
            "type": "diff",
            "diffEvents": [
                {{ "type": "leave", "player": {ALICE} }},
                {{ "type": "hostChange", "host": {ALICE} }},
                {{ "type": "somethingNew" }},
                {{ "type": "cancelCountdown" }}
            ]
        }}"#
    );
    let LobbyEvent::Diff { diff_events } = decode(&json) else {
        panic!("expected diff");
    };
    let kinds: Vec<&str> = diff_events.iter().map(LobbyEvent::kind).collect();
    assert_eq!(
        kinds,
        vec!["leave", "hostChange", "unknown", "cancelCountdown"]
    );
}

#[test]
fn fixture_countdown_and_loading_signals() {
    assert_eq!(
        decode(r#"{"type":"startCountdown"}"#),
        LobbyEvent::StartCountdown
    );
    assert_eq!(
        decode(r#"{"type":"cancelCountdown"}"#),
        LobbyEvent::CancelCountdown
    );
    assert_eq!(
        decode(r#"{"type":"cancelLoading"}"#),
        LobbyEvent::CancelLoading
    );
    assert_eq!(
        decode(r#"{"type":"gameStarted"}"#),
        LobbyEvent::GameStarted
    );
}

#[test]
fn fixture_launch_steps_from_server() {
    assert_eq!(
        decode(r#"{"type":"setupGame","setup":{"gameId":"g-1","seed":99},"resultCode":"rc"}"#),
        LobbyEvent::SetupGame {
            setup: GameSetupInfo {
                game_id: "g-1".into(),
                seed: 99,
            },
            result_code: Some("rc".into()),
        }
    );
    assert_eq!(
        decode(r#"{"type":"setupGame","setup":{"gameId":"g-1","seed":99}}"#),
        LobbyEvent::SetupGame {
            setup: GameSetupInfo {
                game_id: "g-1".into(),
                seed: 99,
            },
            result_code: None,
        }
    );

    let LobbyEvent::SetRoutes { game_id, routes } = decode(
        r#"{"type":"setRoutes","gameId":"g-1","routes":[{"for":1,"server":{"id":7}},{"for":2}]}"#,
    ) else {
        panic!("expected setRoutes");
    };
    assert_eq!(game_id, "g-1");
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0]["server"]["id"], 7);

    assert_eq!(
        decode(r#"{"type":"startWhenReady","gameId":"g-1"}"#),
        LobbyEvent::StartWhenReady {
            game_id: "g-1".into()
        }
    );
}

#[test]
fn fixture_chat_with_and_without_time() {
    assert_eq!(
        decode(r#"{"type":"chat","from":"Bob","text":"gl","time":1600000000}"#),
        LobbyEvent::Chat {
            from: "Bob".into(),
            text: "gl".into(),
            time: Some(1_600_000_000),
        }
    );
    assert_eq!(
        decode(r#"{"type":"chat","from":"Bob","text":"hf"}"#),
        LobbyEvent::Chat {
            from: "Bob".into(),
            text: "hf".into(),
            time: None,
        }
    );
}

#[test]
fn fixture_status_keeps_details() {
    let LobbyEvent::Status { details } =
        decode(r#"{"type":"status","lobby":"Fun Lobby","hasFullLobby":true}"#)
    else {
        panic!("expected status");
    };
    assert_eq!(details.len(), 2);
    assert_eq!(details["lobby"], "Fun Lobby");
    assert_eq!(details["hasFullLobby"], true);
    assert!(!details.contains_key("type"));
}

#[test]
fn unknown_event_kind_decodes_without_error() {
    assert_eq!(
        decode(r#"{"type":"lobbyPreferencesChanged","prefs":{}}"#),
        LobbyEvent::Unknown
    );
}

#[test]
fn missing_type_is_an_error() {
    assert!(serde_json::from_str::<LobbyEvent>(r#"{"teamIndex":0}"#).is_err());
}

#[test]
fn slot_types_use_camel_case() {
    for (wire, expected) in [
        ("human", SlotType::Human),
        ("computer", SlotType::Computer),
        ("umsComputer", SlotType::UmsComputer),
        ("open", SlotType::Open),
        ("closed", SlotType::Closed),
        ("controlledOpen", SlotType::ControlledOpen),
        ("controlledClosed", SlotType::ControlledClosed),
    ] {
        let parsed: SlotType = serde_json::from_str(&format!("\"{wire}\"")).expect(wire);
        assert_eq!(parsed, expected);
    }
}

// ════════════════════════════════════════════════════════════════════
// Launch configuration payload
// ════════════════════════════════════════════════════════════════════

#[test]
fn launch_config_matches_game_process_shape() {
    let lobby: LobbyInfo = serde_json::from_value(serde_json::json!({
        "name": "Fun Lobby",
        "map": {
            "hash": "deadbeef",
            "mapData": { "format": "scm" },
            "name": "Lost Temple"
        },
        "gameType": "melee",
        "host": { "type": "human", "id": "u1", "name": "Alice" },
        "teams": [
            {
                "teamId": 0,
                "slots": [
                    { "type": "human", "id": "u1", "name": "Alice", "race": "p" },
                    { "type": "closed", "id": "s2" },
                    { "type": "computer", "id": "s3", "race": "r" }
                ]
            }
        ]
    }))
    .expect("lobby");

    let config = LaunchConfig::assemble(
        LocalUser {
            id: "u1".into(),
            name: "Alice".into(),
        },
        serde_json::json!({ "gameWinWidth": 1280 }),
        &lobby,
        &GameSetupInfo {
            game_id: "g-1".into(),
            seed: 5,
        },
        None,
        "https://lobby.example.test",
    );

    let json = serde_json::to_value(&config).expect("serialize");
    assert_eq!(json["localUser"]["name"], "Alice");
    assert_eq!(json["settings"]["gameWinWidth"], 1280);

    let setup = &json["setup"];
    assert_eq!(setup["gameId"], "g-1");
    assert_eq!(setup["name"], "Fun Lobby");
    assert_eq!(setup["gameType"], "melee");
    assert!(setup.get("gameSubType").is_none());
    assert_eq!(setup["seed"], 5);
    assert_eq!(setup["serverUrl"], "https://lobby.example.test");
    assert_eq!(setup["map"]["name"], "Lost Temple");
    assert_eq!(setup["map"]["mapData"]["format"], "scm");

    let slots = setup["slots"].as_array().expect("slots");
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["name"], "Alice");
    assert_eq!(slots[0]["teamId"], 0);
    assert_eq!(slots[1]["type"], "computer");
    assert_eq!(slots[1]["race"], "r");
}
