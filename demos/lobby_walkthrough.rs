//! # Lobby Walkthrough
//!
//! Drives a [`LobbySession`] through a whole lobby lifetime with an
//! in-process transport and console-logging collaborators: a player joins,
//! the countdown runs to zero, the server sets up the game and the game
//! starts.
//!
//! Server events are written as JSON exactly as the lobby server sends them
//! and decoded with `serde_json` before being published.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example lobby_walkthrough
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lobby_session::audio::{AudioOutput, CueHandle, Sound};
use lobby_session::error::Result;
use lobby_session::launch::{GameProcess, LaunchConfig};
use lobby_session::protocol::{LobbyEvent, LobbyInfo, NetworkRoute};
use lobby_session::routes::lobby_path;
use lobby_session::services::{
    LobbyStore, LocalUser, MapStore, Navigator, NetworkMeasurement, SessionServices,
};
use lobby_session::{channel_transport, LobbySession, LobbyTransition, SessionConfig};
use tokio::time::Instant;
use tracing::info;

const LOBBY: &str = "Walkthrough";

// ─────────────────────────────────────────────────────────────────────
// Step 1: Console collaborators
// ─────────────────────────────────────────────────────────────────────

/// Audio output that logs cues against a wall clock.
struct ConsoleAudio {
    started: Instant,
    next: AtomicU64,
}

impl AudioOutput for ConsoleAudio {
    fn current_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn play_sound(&self, sound: Sound) {
        info!("audio: play {sound:?}");
    }

    fn play_fadeable(&self, sound: Sound) -> CueHandle {
        let cue = CueHandle(self.next.fetch_add(1, Ordering::Relaxed));
        info!("audio: play {sound:?} as {cue:?}");
        cue
    }

    fn ramp_gain(&self, cue: CueHandle, gain: f32, at: f64) {
        info!("audio: ramp {cue:?} to {gain} at {at:.2}s");
    }

    fn stop(&self, cue: CueHandle, at: f64) {
        info!("audio: stop {cue:?} at {at:.2}s");
    }
}

struct ConsoleServices;

#[async_trait]
impl MapStore for ConsoleServices {
    async fn request_download(&self, hash: &str, format: &str, url: Option<&str>) -> Result<()> {
        info!("maps: download {hash}.{format} from {url:?}");
        Ok(())
    }
}

impl NetworkMeasurement for ConsoleServices {
    fn refresh_latencies(&self) {
        info!("network: refreshing relay latencies");
    }
}

#[async_trait]
impl GameProcess for ConsoleServices {
    async fn set_config(&self, config: Option<LaunchConfig>) -> Result<()> {
        match config {
            Some(config) => info!(
                "game: configured {} with {} slots",
                config.setup.game_id,
                config.setup.slots.len()
            ),
            None => info!("game: configuration cleared"),
        }
        Ok(())
    }

    async fn set_routes(&self, game_id: &str, routes: &[NetworkRoute]) -> Result<()> {
        info!("game: {} routes for {game_id}", routes.len());
        Ok(())
    }

    async fn start_when_ready(&self, game_id: &str) -> Result<()> {
        info!("game: {game_id} will start when everyone has loaded");
        Ok(())
    }
}

/// Lobby store updated from the transitions the session emits.
struct DemoStore {
    lobby: Mutex<Option<LobbyInfo>>,
}

impl LobbyStore for DemoStore {
    fn local_user(&self) -> LocalUser {
        LocalUser {
            id: "1".into(),
            name: "Alice".into(),
        }
    }

    fn lobby(&self) -> Option<LobbyInfo> {
        self.lobby.lock().ok().and_then(|lobby| lobby.clone())
    }

    fn settings(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

struct DemoNavigator {
    path: Mutex<String>,
}

impl Navigator for DemoNavigator {
    fn current_path(&self) -> String {
        self.path.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn replace(&self, path: &str) {
        info!("navigate: {path}");
        if let Ok(mut current) = self.path.lock() {
            *current = path.to_string();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Server events in wire format
// ─────────────────────────────────────────────────────────────────────

fn server_events() -> serde_json::Result<Vec<LobbyEvent>> {
    let alice = serde_json::json!({ "type": "human", "id": "1", "name": "Alice", "race": "p" });
    let bob = serde_json::json!({ "type": "human", "id": "2", "name": "Bob", "race": "t" });
    [
        serde_json::json!({
            "type": "init",
            "lobby": {
                "name": LOBBY,
                "map": { "hash": "deadbeef", "mapData": { "format": "scx" } },
                "gameType": "melee",
                "host": alice,
                "teams": [{ "teamId": 0, "slots": [alice, { "type": "open", "id": "s2" }] }]
            }
        }),
        serde_json::json!({
            "type": "diff",
            "diffEvents": [
                { "type": "slotDeleted", "teamIndex": 0, "slotIndex": 1 },
                { "type": "slotCreate", "teamIndex": 0, "slotIndex": 1, "slot": bob }
            ]
        }),
        serde_json::json!({ "type": "chat", "from": "Bob", "text": "gl hf" }),
        serde_json::json!({ "type": "startCountdown" }),
    ]
    .into_iter()
    .map(serde_json::from_value)
    .collect()
}

fn launch_events() -> serde_json::Result<Vec<LobbyEvent>> {
    [
        serde_json::json!({ "type": "setupGame", "setup": { "gameId": "g-1", "seed": 7 } }),
        serde_json::json!({ "type": "setRoutes", "gameId": "g-1", "routes": [{ "for": 2 }] }),
        serde_json::json!({ "type": "startWhenReady", "gameId": "g-1" }),
        serde_json::json!({ "type": "gameStarted" }),
    ]
    .into_iter()
    .map(serde_json::from_value)
    .collect()
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Run the session
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let console = Arc::new(ConsoleServices);
    let store = Arc::new(DemoStore {
        lobby: Mutex::new(None),
    });
    let navigator = Arc::new(DemoNavigator {
        path: Mutex::new(lobby_path(LOBBY)),
    });
    let services = SessionServices::new(
        Arc::new(ConsoleAudio {
            started: Instant::now(),
            next: AtomicU64::new(0),
        }),
        console.clone(),
        console.clone(),
        store.clone(),
        navigator,
        console,
    );

    let (sender, transport) = channel_transport();
    let (mut session, mut transitions) = LobbySession::start(
        LOBBY,
        transport,
        services,
        SessionConfig::new("https://lobby.example.com"),
    );

    for event in server_events()? {
        sender.publish(lobby_path(LOBBY), event)?;
    }

    while let Some(transition) = transitions.recv().await {
        info!("transition: {transition:?}");
        match transition {
            LobbyTransition::InitData { lobby } => {
                if let Ok(mut stored) = store.lobby.lock() {
                    *stored = Some(lobby);
                }
            }
            LobbyTransition::LoadingStarted => {
                for event in launch_events()? {
                    sender.publish(lobby_path(LOBBY), event)?;
                }
            }
            LobbyTransition::GameStarted { .. } => {
                info!("launch phase: {:?}", session.launch_phase().await);
                session.shutdown().await;
            }
            LobbyTransition::SessionClosed { reason } => {
                info!("session closed: {reason:?}");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
