//! Lobby session: binds a lobby's routes and runs its event loop.
//!
//! [`LobbySession`] is a thin handle to a background task that owns every
//! piece of per-lobby state: the [`CountdownSequencer`], the
//! [`GameLaunchCoordinator`] and the route binding. Nothing else mutates
//! them. The task processes one input at a time, whether that is a routed
//! event from the transport, a countdown tick or a report from the game
//! process worker, so all state changes happen in a single, ordered stream.
//! Transitions are delivered on a bounded channel returned from
//! [`LobbySession::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let (sender, transport) = channel_transport();
//! let config = SessionConfig::new("https://lobby.example.com");
//! let (mut session, mut transitions) =
//!     LobbySession::start("My Lobby", transport, services, config);
//!
//! while let Some(transition) = transitions.recv().await {
//!     match transition {
//!         LobbyTransition::CountdownTick(n) => { /* … */ }
//!         LobbyTransition::SessionClosed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::audio::Sound;
use crate::countdown::{CountdownSequencer, CountdownTick, CountdownTiming, TickOutcome};
use crate::interpreter::{Action, EventInterpreter};
use crate::launch::{
    spawn_process_worker, GameLaunchCoordinator, LaunchConfig, LaunchPhase, ProcessReport,
};
use crate::protocol::GameSetupInfo;
use crate::routes::LobbyRouteBinding;
use crate::services::SessionServices;
use crate::transition::LobbyTransition;
use crate::transport::{RouteTransport, RoutedEvent};

/// Default capacity of the bounded transition channel.
const DEFAULT_TRANSITION_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Unique identifier of one lobby session, attached to its log lines.
pub type SessionId = Uuid;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`LobbySession`].
///
/// # Example
///
/// ```
/// use lobby_session::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("https://lobby.example.com")
///     .with_transition_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.countdown.start_value(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base server URL handed to the game process with every launch.
    pub server_url: String,
    /// Capacity of the bounded transition channel.
    ///
    /// The session waits for room rather than dropping transitions, so a
    /// consumer that stops reading stalls the session.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub transition_channel_capacity: usize,
    /// Time [`LobbySession::shutdown`] waits for the session to tear down
    /// before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Countdown and cue fade timing.
    pub countdown: CountdownTiming,
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            transition_channel_capacity: DEFAULT_TRANSITION_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            countdown: CountdownTiming::default(),
        }
    }

    /// Set the capacity of the transition channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_transition_channel_capacity(mut self, capacity: usize) -> Self {
        self.transition_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Replace the countdown timing.
    #[must_use]
    pub fn with_countdown_timing(mut self, timing: CountdownTiming) -> Self {
        self.countdown = timing;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State mirrored from the session task for the handle's accessors.
struct SharedState {
    active: AtomicBool,
    counting: AtomicBool,
    launch_phase: Mutex<LaunchPhase>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            counting: AtomicBool::new(false),
            launch_phase: Mutex::new(LaunchPhase::Idle),
        }
    }
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to a running lobby session.
///
/// Created via [`LobbySession::start`]. Dropping the handle aborts the
/// session task; call [`shutdown`](LobbySession::shutdown) first for an
/// orderly teardown.
pub struct LobbySession {
    id: SessionId,
    lobby: String,
    state: Arc<SharedState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl LobbySession {
    /// Bind `lobby`'s routes on `transport` and start processing events.
    ///
    /// Returns the handle together with the transition receiver. The
    /// receiver yields [`LobbyTransition`]s until the session ends, the
    /// last one always being [`LobbyTransition::SessionClosed`].
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "the transition receiver must be used to receive transitions"]
    pub fn start(
        lobby: impl Into<String>,
        transport: impl RouteTransport,
        services: SessionServices,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<LobbyTransition>) {
        let id = Uuid::new_v4();
        let lobby = lobby.into();
        let capacity = config.transition_channel_capacity.max(1);
        let (transition_tx, transition_rx) = mpsc::channel::<LobbyTransition>(capacity);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel::<CountdownTick>();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel::<ProcessReport>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(SharedState::new());

        spawn_process_worker(Arc::clone(&services.game), command_rx, report_tx);

        let core = SessionCore {
            id,
            binding: LobbyRouteBinding::new(lobby.clone()),
            interpreter: EventInterpreter::new(services.notifications.is_some()),
            sequencer: CountdownSequencer::new(
                Arc::clone(&services.audio),
                config.countdown,
                tick_tx,
            ),
            coordinator: GameLaunchCoordinator::new(command_tx),
            services,
            server_url: config.server_url,
            transitions: transition_tx,
            state: Arc::clone(&state),
        };

        let task = tokio::spawn(session_loop(
            transport,
            core,
            tick_rx,
            report_rx,
            shutdown_rx,
        ));

        let session = Self {
            id,
            lobby,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (session, transition_rx)
    }

    /// Tear the session down: stop the countdown, cancel any launch in
    /// flight, close the transport and emit
    /// [`SessionClosed`](LobbyTransition::SessionClosed).
    pub async fn shutdown(&mut self) {
        debug!(session = %self.id, "LobbySession: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Wait for the loop with a timeout; abort it if it does not finish.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.active.store(false, Ordering::Release);
        self.state.counting.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Identifier of this session.
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Name of the bound lobby.
    pub fn lobby_name(&self) -> &str {
        &self.lobby
    }

    /// Returns `true` until the session has torn down.
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Returns `true` while the pre-game countdown is running.
    pub fn is_counting_down(&self) -> bool {
        self.state.counting.load(Ordering::Acquire)
    }

    /// Phase of the current game launch attempt.
    pub async fn launch_phase(&self) -> LaunchPhase {
        *self.state.launch_phase.lock().await
    }
}

impl std::fmt::Debug for LobbySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbySession")
            .field("id", &self.id)
            .field("lobby", &self.lobby)
            .field("active", &self.is_active())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for LobbySession {
    fn drop(&mut self) {
        // Aborting drops the session core. The sequencer's own drop still
        // stops the countdown timer and fades both cues.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Everything the session task owns.
struct SessionCore {
    id: SessionId,
    binding: LobbyRouteBinding,
    interpreter: EventInterpreter,
    sequencer: CountdownSequencer,
    coordinator: GameLaunchCoordinator,
    services: SessionServices,
    server_url: String,
    transitions: mpsc::Sender<LobbyTransition>,
    state: Arc<SharedState>,
}

/// Background loop multiplexing routed events, countdown ticks and game
/// process reports.
///
/// Exits when:
/// - shutdown is requested (or the handle's shutdown sender is dropped)
/// - the transport returns `None` or an error
async fn session_loop(
    mut transport: impl RouteTransport,
    mut core: SessionCore,
    mut tick_rx: mpsc::UnboundedReceiver<CountdownTick>,
    mut report_rx: mpsc::UnboundedReceiver<ProcessReport>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(session = %core.id, lobby = core.binding.lobby(), "session loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                core.teardown(Some("session shut down".into())).await;
                let _ = transport.close().await;
                break;
            }

            Some(tick) = tick_rx.recv() => {
                core.handle_tick(tick).await;
            }

            Some(report) = report_rx.recv() => {
                core.handle_report(report).await;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(routed)) => core.handle_event(routed).await,
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        core.teardown(Some(format!("transport receive error: {e}"))).await;
                        let _ = transport.close().await;
                        break;
                    }
                    None => {
                        debug!("transport closed");
                        core.teardown(None).await;
                        let _ = transport.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!(session = %core.id, "session loop exited");
}

impl SessionCore {
    async fn handle_event(&mut self, routed: RoutedEvent) {
        let RoutedEvent { route, event } = routed;
        if !self.binding.accepts(&route) {
            debug!(%route, kind = event.kind(), "event on a route this session does not bind");
            return;
        }

        // Identity is read fresh for every inbound event.
        let local = self.services.store.local_user();
        let actions = self
            .interpreter
            .interpret(self.binding.lobby(), event, &local.name);
        self.run(actions).await;
    }

    async fn handle_tick(&mut self, tick: CountdownTick) {
        match self.sequencer.tick(tick) {
            None => {}
            Some(TickOutcome::Ticked(value)) => {
                self.emit(LobbyTransition::CountdownTick(value)).await;
            }
            Some(TickOutcome::Finished) => {
                self.sync_state().await;
                self.emit(LobbyTransition::CountdownTick(0)).await;
                let actions = self.interpreter.countdown_finished(self.binding.lobby());
                self.run(actions).await;
            }
        }
    }

    async fn handle_report(&mut self, report: ProcessReport) {
        match report {
            ProcessReport::StartAccepted { game_id } => {
                if self.coordinator.mark_loading(&game_id) {
                    self.sync_state().await;
                }
            }
        }
    }

    async fn run(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.execute(action).await;
        }
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Emit(transition) => self.emit(transition).await,

            Action::StartCountdown => {
                let start = self.sequencer.start();
                self.sync_state().await;
                self.emit(LobbyTransition::CountdownStarted(start)).await;
            }
            Action::CancelCountdown => {
                self.sequencer.cancel(false);
                self.sync_state().await;
            }
            Action::FadeAtmosphere { slow } => self.sequencer.fade_atmosphere(slow),
            Action::PlayJoinAlert => self.services.audio.play_sound(Sound::JoinAlert),

            Action::DownloadMap { hash, format, url } => self.download_map(hash, format, url),
            Action::RefreshLatencies => self.services.network.refresh_latencies(),

            Action::NavigateIfAt { expected, target } => {
                if self.services.navigator.current_path() == expected {
                    self.services.navigator.replace(&target);
                } else {
                    debug!(%expected, %target, "not navigating, user is elsewhere");
                }
            }

            Action::ConfigureLaunch { setup, result_code } => {
                self.configure_launch(setup, result_code).await;
            }
            Action::SetRoutes { game_id, routes } => {
                if self.coordinator.set_routes(&game_id, routes) {
                    self.sync_state().await;
                }
            }
            Action::StartWhenReady { game_id } => {
                if self.coordinator.start_when_ready(&game_id) {
                    self.sync_state().await;
                }
            }
            Action::CancelLaunch => {
                if self.coordinator.cancel() {
                    self.sync_state().await;
                }
            }
            Action::MarkGameStarted => {
                if self.coordinator.mark_started() {
                    self.sync_state().await;
                }
            }
            Action::AnnounceGameStarted => {
                let lobby = self.services.store.lobby();
                self.emit(LobbyTransition::GameStarted { lobby }).await;
            }

            Action::NotifyChat(notification) => {
                if let Some(sink) = &self.services.notifications {
                    sink.notify(notification);
                }
            }
        }
    }

    /// Request the map without waiting on it. Failures are only logged.
    fn download_map(&self, hash: String, format: String, url: Option<String>) {
        let maps = Arc::clone(&self.services.maps);
        let session = self.id;
        tokio::spawn(async move {
            if let Err(e) = maps.request_download(&hash, &format, url.as_deref()).await {
                error!(%session, %hash, "error downloading map: {e}");
            }
        });
    }

    async fn configure_launch(&mut self, setup: GameSetupInfo, result_code: Option<String>) {
        let Some(lobby) = self.services.store.lobby() else {
            warn!(game_id = %setup.game_id, "setupGame without lobby state, ignoring");
            return;
        };
        let config = LaunchConfig::assemble(
            self.services.store.local_user(),
            self.services.store.settings(),
            &lobby,
            &setup,
            result_code,
            &self.server_url,
        );
        self.coordinator.configure(config);
        self.sync_state().await;
        self.emit(LobbyTransition::GameLaunchConfigured {
            game_id: setup.game_id,
        })
        .await;
    }

    /// Stop every timed or in-flight piece of the session and emit the
    /// final transition.
    async fn teardown(&mut self, reason: Option<String>) {
        self.sequencer.cancel(false);
        self.coordinator.cancel();
        self.sync_state().await;
        self.state.active.store(false, Ordering::Release);

        let event = LobbyTransition::SessionClosed { reason };
        if self.transitions.send(event).await.is_err() {
            debug!("transition channel closed, receiver dropped");
        }
    }

    async fn sync_state(&self) {
        self.state
            .counting
            .store(self.sequencer.is_counting(), Ordering::Release);
        *self.state.launch_phase.lock().await = self.coordinator.phase();
    }

    /// Deliver a transition, waiting for channel room rather than dropping it.
    async fn emit(&self, transition: LobbyTransition) {
        if self.transitions.send(transition).await.is_err() {
            debug!("transition channel closed, receiver dropped");
        }
    }
}
