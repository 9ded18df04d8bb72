#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for lobby session integration tests.
//!
//! Provides recording mocks for every collaborator a session talks to, a
//! [`Harness`] that starts a session wired to them, and builders for common
//! lobby events.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use lobby_session::audio::{AudioOutput, CueHandle, Sound};
use lobby_session::error::{LobbySessionError, Result};
use lobby_session::launch::{GameProcess, LaunchConfig};
use lobby_session::protocol::{
    GameSetupInfo, LobbyEvent, LobbyInfo, MapData, MapInfo, NetworkRoute, Slot, SlotType, Team,
};
use lobby_session::services::{
    ChatNotification, LobbyStore, LocalUser, MapStore, Navigator, NetworkMeasurement,
    NotificationSink, SessionServices,
};
use lobby_session::transport::{channel_transport, ChannelTransport, RouteSender, RouteTransport};
use lobby_session::{LobbySession, LobbyTransition, SessionConfig};
use tokio::sync::mpsc;

pub const LOBBY: &str = "Fun Lobby";
pub const LOCAL_NAME: &str = "Alice";
pub const SERVER_URL: &str = "https://lobby.example.test";

// ── Audio ───────────────────────────────────────────────────────────

/// A call made on [`RecordingAudio`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play(Sound),
    Fadeable(Sound, CueHandle),
    Ramp(CueHandle),
    Stop(CueHandle),
}

/// Audio output that records every call. The clock never advances.
#[derive(Default)]
pub struct RecordingAudio {
    pub calls: StdMutex<Vec<AudioCall>>,
    next_cue: AtomicU64,
}

impl RecordingAudio {
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_played(&self, sound: Sound) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AudioCall::Play(s) | AudioCall::Fadeable(s, _) if *s == sound))
            .count()
    }

    /// Handles of started cues of kind `sound`, in start order.
    pub fn cues(&self, sound: Sound) -> Vec<CueHandle> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                AudioCall::Fadeable(s, cue) if *s == sound => Some(*cue),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self, cue: CueHandle) -> bool {
        self.calls().contains(&AudioCall::Stop(cue))
    }
}

impl AudioOutput for RecordingAudio {
    fn current_time(&self) -> f64 {
        0.0
    }

    fn play_sound(&self, sound: Sound) {
        self.calls.lock().unwrap().push(AudioCall::Play(sound));
    }

    fn play_fadeable(&self, sound: Sound) -> CueHandle {
        let cue = CueHandle(self.next_cue.fetch_add(1, Ordering::Relaxed));
        self.calls
            .lock()
            .unwrap()
            .push(AudioCall::Fadeable(sound, cue));
        cue
    }

    fn ramp_gain(&self, cue: CueHandle, _gain: f32, _at: f64) {
        self.calls.lock().unwrap().push(AudioCall::Ramp(cue));
    }

    fn stop(&self, cue: CueHandle, _at: f64) {
        self.calls.lock().unwrap().push(AudioCall::Stop(cue));
    }
}

// ── Maps and network ────────────────────────────────────────────────

/// Map store that records requests and optionally fails them.
#[derive(Default)]
pub struct RecordingMaps {
    pub requests: StdMutex<Vec<(String, String, Option<String>)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl MapStore for RecordingMaps {
    async fn request_download(&self, hash: &str, format: &str, url: Option<&str>) -> Result<()> {
        self.requests.lock().unwrap().push((
            hash.to_string(),
            format.to_string(),
            url.map(str::to_string),
        ));
        if self.fail.load(Ordering::Acquire) {
            return Err(LobbySessionError::ExternalService {
                service: "map store",
                message: "download failed".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingNetwork {
    pub refreshes: AtomicUsize,
}

impl NetworkMeasurement for CountingNetwork {
    fn refresh_latencies(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Lobby store whose contents the test controls.
pub struct TestStore {
    pub user: StdMutex<LocalUser>,
    pub lobby: StdMutex<Option<LobbyInfo>>,
}

impl TestStore {
    pub fn new(name: &str) -> Self {
        Self {
            user: StdMutex::new(LocalUser {
                id: "1".into(),
                name: name.into(),
            }),
            lobby: StdMutex::new(None),
        }
    }

    pub fn set_lobby(&self, lobby: LobbyInfo) {
        *self.lobby.lock().unwrap() = Some(lobby);
    }

    pub fn rename(&self, name: &str) {
        self.user.lock().unwrap().name = name.into();
    }
}

impl LobbyStore for TestStore {
    fn local_user(&self) -> LocalUser {
        self.user.lock().unwrap().clone()
    }

    fn lobby(&self) -> Option<LobbyInfo> {
        self.lobby.lock().unwrap().clone()
    }

    fn settings(&self) -> serde_json::Value {
        serde_json::json!({ "gameWinWidth": 1280 })
    }
}

// ── Navigation ──────────────────────────────────────────────────────

/// Navigator that records every replace.
pub struct RecordingNavigator {
    pub current: StdMutex<String>,
    pub replaced: StdMutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            current: StdMutex::new(path.into()),
            replaced: StdMutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Vec<String> {
        self.replaced.lock().unwrap().clone()
    }

    pub fn go(&self, path: &str) {
        *self.current.lock().unwrap() = path.into();
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.current()
    }

    fn replace(&self, path: &str) {
        self.go(path);
        self.replaced.lock().unwrap().push(path.into());
    }
}

// ── Game process ────────────────────────────────────────────────────

/// A call made on [`RecordingGame`].
#[derive(Debug, Clone, PartialEq)]
pub enum GameCall {
    /// Game id of the configuration, `None` when cleared.
    SetConfig(Option<String>),
    SetRoutes(String, usize),
    StartWhenReady(String),
}

/// Game process that records commands and optionally refuses to start.
#[derive(Default)]
pub struct RecordingGame {
    pub calls: StdMutex<Vec<GameCall>>,
    pub configs: StdMutex<Vec<LaunchConfig>>,
    pub refuse_start: AtomicBool,
}

impl RecordingGame {
    pub fn calls(&self) -> Vec<GameCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameProcess for RecordingGame {
    async fn set_config(&self, config: Option<LaunchConfig>) -> Result<()> {
        let id = config.as_ref().map(|c| c.setup.game_id.clone());
        if let Some(config) = config {
            self.configs.lock().unwrap().push(config);
        }
        self.calls.lock().unwrap().push(GameCall::SetConfig(id));
        Ok(())
    }

    async fn set_routes(&self, game_id: &str, routes: &[NetworkRoute]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(GameCall::SetRoutes(game_id.into(), routes.len()));
        Ok(())
    }

    async fn start_when_ready(&self, game_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(GameCall::StartWhenReady(game_id.into()));
        if self.refuse_start.load(Ordering::Acquire) {
            return Err(LobbySessionError::ProcessCommand("not ready".into()));
        }
        Ok(())
    }
}

// ── Notifications ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifications {
    pub received: StdMutex<Vec<ChatNotification>>,
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, notification: ChatNotification) {
        self.received.lock().unwrap().push(notification);
    }
}

// ── Harness ─────────────────────────────────────────────────────────

/// A running session plus handles to every mock behind it.
pub struct Harness {
    pub session: LobbySession,
    pub transitions: mpsc::Receiver<LobbyTransition>,
    pub sender: RouteSender,
    pub audio: Arc<RecordingAudio>,
    pub maps: Arc<RecordingMaps>,
    pub network: Arc<CountingNetwork>,
    pub store: Arc<TestStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub game: Arc<RecordingGame>,
    pub notifications: Arc<RecordingNotifications>,
}

impl Harness {
    /// Start a session for [`LOBBY`] with default configuration, the user
    /// viewing the lobby page.
    pub fn start() -> Self {
        Self::start_with(SessionConfig::new(SERVER_URL), false)
    }

    /// Start a session with `config`, optionally attaching a chat
    /// notification sink.
    pub fn start_with(config: SessionConfig, with_notifications: bool) -> Self {
        Self::start_wrapped(config, with_notifications, |transport| transport)
    }

    /// Start a session whose channel transport is wrapped by `wrap` before
    /// the session takes it.
    pub fn start_wrapped<T: RouteTransport>(
        config: SessionConfig,
        with_notifications: bool,
        wrap: impl FnOnce(ChannelTransport) -> T,
    ) -> Self {
        let audio = Arc::new(RecordingAudio::default());
        let maps = Arc::new(RecordingMaps::default());
        let network = Arc::new(CountingNetwork::default());
        let store = Arc::new(TestStore::new(LOCAL_NAME));
        let navigator = Arc::new(RecordingNavigator::at(&lobby_session::routes::lobby_path(
            LOBBY,
        )));
        let game = Arc::new(RecordingGame::default());
        let notifications = Arc::new(RecordingNotifications::default());

        let mut services = SessionServices::new(
            audio.clone(),
            maps.clone(),
            network.clone(),
            store.clone(),
            navigator.clone(),
            game.clone(),
        );
        if with_notifications {
            services = services.with_notifications(notifications.clone());
        }

        let (sender, transport) = channel_transport();
        let (session, transitions) = LobbySession::start(LOBBY, wrap(transport), services, config);

        Self {
            session,
            transitions,
            sender,
            audio,
            maps,
            network,
            store,
            navigator,
            game,
            notifications,
        }
    }

    /// Publish `event` on the lobby's main route.
    pub fn publish(&self, event: LobbyEvent) {
        self.sender
            .publish(lobby_session::routes::lobby_path(LOBBY), event)
            .expect("publish");
    }

    /// Publish `event` on an arbitrary route.
    pub fn publish_on(&self, route: &str, event: LobbyEvent) {
        self.sender.publish(route, event).expect("publish");
    }

    /// Receive the next transition, failing the test if none arrives in
    /// time.
    pub async fn next(&mut self) -> LobbyTransition {
        tokio::time::timeout(Duration::from_secs(30), self.transitions.recv())
            .await
            .expect("timed out waiting for a transition")
            .expect("transition channel closed")
    }

    /// Receive exactly `n` transitions.
    pub async fn take(&mut self, n: usize) -> Vec<LobbyTransition> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next().await);
        }
        out
    }

    /// Assert nothing else is emitted within `window`.
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(Some(t)) = tokio::time::timeout(window, self.transitions.recv()).await {
            panic!("unexpected transition: {t:?}");
        }
    }

    /// Let spawned work (process worker, map downloads) catch up.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Services backed by fresh mocks, for tests that bring their own
/// transport and only watch transitions.
pub fn test_services() -> SessionServices {
    SessionServices::new(
        Arc::new(RecordingAudio::default()),
        Arc::new(RecordingMaps::default()),
        Arc::new(CountingNetwork::default()),
        Arc::new(TestStore::new(LOCAL_NAME)),
        Arc::new(RecordingNavigator::at("/")),
        Arc::new(RecordingGame::default()),
    )
}

// ── Event builders ──────────────────────────────────────────────────

pub fn slot(slot_type: SlotType, name: &str) -> Slot {
    Slot {
        slot_type,
        id: format!("id-{name}"),
        name: name.into(),
        race: "r".into(),
        has_forced_race: false,
    }
}

pub fn human(name: &str) -> Slot {
    slot(SlotType::Human, name)
}

pub fn lobby_info() -> LobbyInfo {
    LobbyInfo {
        name: LOBBY.into(),
        map: MapInfo {
            hash: "deadbeef".into(),
            map_data: MapData {
                format: "scx".into(),
            },
            map_url: Some("https://maps.example.test/deadbeef".into()),
            ..Default::default()
        },
        game_type: "melee".into(),
        game_sub_type: None,
        host: human(LOCAL_NAME),
        teams: vec![Team {
            team_id: 0,
            slots: vec![
                human(LOCAL_NAME),
                human("Bob"),
                slot(SlotType::Open, "open"),
            ],
            ..Default::default()
        }],
    }
}

pub fn init_event() -> LobbyEvent {
    LobbyEvent::Init {
        lobby: lobby_info(),
    }
}

pub fn setup_game(game_id: &str) -> LobbyEvent {
    LobbyEvent::SetupGame {
        setup: GameSetupInfo {
            game_id: game_id.into(),
            seed: 1234,
        },
        result_code: Some("result".into()),
    }
}

pub fn set_routes(game_id: &str) -> LobbyEvent {
    LobbyEvent::SetRoutes {
        game_id: game_id.into(),
        routes: vec![serde_json::json!({ "for": 1, "server": { "id": 2 } })],
    }
}

pub fn start_when_ready(game_id: &str) -> LobbyEvent {
    LobbyEvent::StartWhenReady {
        game_id: game_id.into(),
    }
}
