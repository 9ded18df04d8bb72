//! Pre-game countdown with its paired audio cues.
//!
//! [`CountdownSequencer`] owns the single countdown of a lobby session. It is
//! either idle or counting; starting while counting cancels the running
//! countdown first. Ticks come from a spawned interval task and are delivered
//! as [`CountdownTick`] messages on a channel the session loop drains, so the
//! counter itself is only ever touched by the session.
//!
//! Every countdown gets a fresh generation number. A tick carrying an old
//! generation, or arriving while idle, is discarded. This is what keeps a
//! tick that was already in the channel when the countdown was canceled from
//! being observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::audio::{AudioOutput, CueHandle, FadeOut, Sound};

/// Default countdown starting value.
const DEFAULT_START_VALUE: u8 = 5;

/// Default time between ticks.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ── Timing ──────────────────────────────────────────────────────────

/// Timing of the countdown and of its cue fades.
///
/// Fade windows are in seconds on the audio clock. Fields are set through
/// the `with_*` builders, which clamp out-of-range values.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lobby_session::countdown::CountdownTiming;
///
/// let timing = CountdownTiming::default()
///     .with_start_value(0)
///     .with_tick_interval(Duration::from_millis(500));
/// assert_eq!(timing.start_value(), 1);
/// assert_eq!(timing.tick_interval(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownTiming {
    start_value: u8,
    tick_interval: Duration,
    tick_fade: f64,
    atmosphere_fade: f64,
    atmosphere_slow_fade: f64,
    stop_gap: f64,
    floor_gain: f32,
}

impl Default for CountdownTiming {
    fn default() -> Self {
        Self {
            start_value: DEFAULT_START_VALUE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_fade: 0.5,
            atmosphere_fade: 1.5,
            atmosphere_slow_fade: 3.0,
            stop_gap: 0.1,
            floor_gain: 0.001,
        }
    }
}

impl CountdownTiming {
    /// Value the countdown starts from. Defaults to **5**.
    pub fn start_value(&self) -> u8 {
        self.start_value
    }

    /// Time between ticks. Defaults to **1 second**.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Fade window of the countdown tone. Defaults to **0.5**.
    pub fn tick_fade(&self) -> f64 {
        self.tick_fade
    }

    /// Normal and slow fade windows of the atmosphere cue. Default to
    /// **1.5** and **3.0**.
    pub fn atmosphere_fades(&self) -> (f64, f64) {
        (self.atmosphere_fade, self.atmosphere_slow_fade)
    }

    /// Gap between a fade finishing and its cue being stopped. Defaults to **0.1**.
    pub fn stop_gap(&self) -> f64 {
        self.stop_gap
    }

    /// Gain a fade ramps down to. Defaults to **0.001**.
    pub fn floor_gain(&self) -> f32 {
        self.floor_gain
    }

    /// Set the starting value. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_start_value(mut self, start_value: u8) -> Self {
        self.start_value = start_value.max(1);
        self
    }

    /// Set the time between ticks. Zero is clamped to 1ms.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the fade window of the countdown tone. Negative values are
    /// clamped to zero.
    #[must_use]
    pub fn with_tick_fade(mut self, window: f64) -> Self {
        self.tick_fade = window.max(0.0);
        self
    }

    /// Set the normal and slow atmosphere fade windows. Negative values are
    /// clamped to zero.
    #[must_use]
    pub fn with_atmosphere_fades(mut self, normal: f64, slow: f64) -> Self {
        self.atmosphere_fade = normal.max(0.0);
        self.atmosphere_slow_fade = slow.max(0.0);
        self
    }

    /// Set the gap between a fade ending and the cue stopping.
    /// Values below 10ms are clamped to 10ms.
    #[must_use]
    pub fn with_stop_gap(mut self, stop_gap: f64) -> Self {
        self.stop_gap = stop_gap.max(0.01);
        self
    }

    /// Set the gain fades ramp down to, clamped to `(0, 1]`.
    #[must_use]
    pub fn with_floor_gain(mut self, gain: f32) -> Self {
        self.floor_gain = gain.clamp(f32::MIN_POSITIVE, 1.0);
        self
    }

    fn tick_fade_out(&self) -> FadeOut {
        FadeOut {
            window: self.tick_fade,
            stop_gap: self.stop_gap,
            floor_gain: self.floor_gain,
        }
    }

    fn atmosphere_fade_out(&self, slow: bool) -> FadeOut {
        FadeOut {
            window: if slow {
                self.atmosphere_slow_fade
            } else {
                self.atmosphere_fade
            },
            stop_gap: self.stop_gap,
            floor_gain: self.floor_gain,
        }
    }
}

// ── Ticks ───────────────────────────────────────────────────────────

/// Message sent by the interval task each time the countdown should tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    /// Generation of the countdown that scheduled this tick.
    pub generation: u64,
}

/// Result of applying a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved to the given value and keeps running.
    Ticked(u8),
    /// The countdown reached zero and is now idle. The atmosphere cue is
    /// still playing.
    Finished,
}

// ── Sequencer ───────────────────────────────────────────────────────

/// The running part of a countdown.
#[derive(Debug)]
struct CountdownState {
    remaining: u8,
    timer: JoinHandle<()>,
    tick_cue: Option<CueHandle>,
}

/// Owner of the lobby session's countdown timer and cues.
pub struct CountdownSequencer {
    audio: Arc<dyn AudioOutput>,
    timing: CountdownTiming,
    ticks: mpsc::UnboundedSender<CountdownTick>,
    generation: u64,
    active: Option<CountdownState>,
    /// Outlives the countdown: it keeps playing through loading and is faded
    /// when loading ends.
    atmosphere: Option<CueHandle>,
}

impl CountdownSequencer {
    /// Create an idle sequencer. Ticks will be sent on `ticks`.
    pub fn new(
        audio: Arc<dyn AudioOutput>,
        timing: CountdownTiming,
        ticks: mpsc::UnboundedSender<CountdownTick>,
    ) -> Self {
        Self {
            audio,
            timing,
            ticks,
            generation: 0,
            active: None,
            atmosphere: None,
        }
    }

    /// Returns `true` while a countdown is running.
    pub fn is_counting(&self) -> bool {
        self.active.is_some()
    }

    /// Returns `true` while the atmosphere cue is playing.
    pub fn has_atmosphere(&self) -> bool {
        self.atmosphere.is_some()
    }

    /// Start a countdown, canceling any running one. Returns the starting
    /// value.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> u8 {
        self.cancel(false);

        self.generation = self.generation.wrapping_add(1);
        let tick_cue = self.audio.play_fadeable(Sound::Countdown);
        self.atmosphere = Some(self.audio.play_fadeable(Sound::Atmosphere));

        let timer = spawn_ticker(
            self.ticks.clone(),
            self.timing.tick_interval,
            self.generation,
        );
        let start_value = self.timing.start_value;
        self.active = Some(CountdownState {
            remaining: start_value,
            timer,
            tick_cue: Some(tick_cue),
        });
        debug!(generation = self.generation, "countdown started");
        start_value
    }

    /// Apply a tick. Returns `None` if the tick belongs to a countdown that
    /// is no longer running.
    pub fn tick(&mut self, tick: CountdownTick) -> Option<TickOutcome> {
        if tick.generation != self.generation {
            debug!(
                stale = tick.generation,
                current = self.generation,
                "dropping tick from superseded countdown"
            );
            return None;
        }
        let state = self.active.as_mut()?;
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining > 0 {
            return Some(TickOutcome::Ticked(state.remaining));
        }

        self.cancel(true);
        Some(TickOutcome::Finished)
    }

    /// Stop the countdown and fade its cues. The atmosphere cue is left
    /// playing when `preserve_atmosphere` is set.
    ///
    /// Calling this with nothing running or playing does nothing.
    pub fn cancel(&mut self, preserve_atmosphere: bool) {
        if let Some(state) = self.active.take() {
            state.timer.abort();
            if let Some(cue) = state.tick_cue {
                self.timing.tick_fade_out().schedule(&*self.audio, cue);
            }
            debug!(generation = self.generation, "countdown stopped");
        }
        if !preserve_atmosphere {
            self.fade_atmosphere(false);
        }
    }

    /// Fade out the atmosphere cue if it is playing, over the slow window
    /// when `slow` is set.
    pub fn fade_atmosphere(&mut self, slow: bool) {
        if let Some(cue) = self.atmosphere.take() {
            self.timing
                .atmosphere_fade_out(slow)
                .schedule(&*self.audio, cue);
        }
    }
}

impl std::fmt::Debug for CountdownSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownSequencer")
            .field("generation", &self.generation)
            .field("remaining", &self.active.as_ref().map(|s| s.remaining))
            .field("atmosphere", &self.atmosphere)
            .finish()
    }
}

impl Drop for CountdownSequencer {
    fn drop(&mut self) {
        self.cancel(false);
    }
}

/// Spawn the periodic tick task. The first tick fires one `period` after
/// the call.
fn spawn_ticker(
    ticks: mpsc::UnboundedSender<CountdownTick>,
    period: Duration,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if ticks.send(CountdownTick { generation }).is_err() {
                break;
            }
        }
    })
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
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fadeable(Sound, CueHandle),
        Ramp(CueHandle, f64),
        Stop(CueHandle, f64),
    }

    #[derive(Default)]
    struct RecordingAudio {
        next: Mutex<u64>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingAudio {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AudioOutput for RecordingAudio {
        fn current_time(&self) -> f64 {
            0.0
        }
        fn play_sound(&self, _sound: Sound) {}
        fn play_fadeable(&self, sound: Sound) -> CueHandle {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            let cue = CueHandle(*next);
            self.calls.lock().unwrap().push(Call::Fadeable(sound, cue));
            cue
        }
        fn ramp_gain(&self, cue: CueHandle, _gain: f32, at: f64) {
            self.calls.lock().unwrap().push(Call::Ramp(cue, at));
        }
        fn stop(&self, cue: CueHandle, at: f64) {
            self.calls.lock().unwrap().push(Call::Stop(cue, at));
        }
    }

    fn sequencer() -> (
        CountdownSequencer,
        Arc<RecordingAudio>,
        mpsc::UnboundedReceiver<CountdownTick>,
    ) {
        let audio = Arc::new(RecordingAudio::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let seq = CountdownSequencer::new(audio.clone(), CountdownTiming::default(), tx);
        (seq, audio, rx)
    }

    #[tokio::test]
    async fn cancel_when_idle_issues_nothing() {
        let (mut seq, audio, _rx) = sequencer();
        seq.cancel(false);
        seq.cancel(true);
        assert!(!seq.is_counting());
        assert!(audio.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_finished() {
        let (mut seq, audio, mut rx) = sequencer();
        assert_eq!(seq.start(), 5);

        let mut outcomes = Vec::new();
        while let Some(tick) = rx.recv().await {
            let outcome = seq.tick(tick).unwrap();
            outcomes.push(outcome);
            if outcome == TickOutcome::Finished {
                break;
            }
        }
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Ticked(4),
                TickOutcome::Ticked(3),
                TickOutcome::Ticked(2),
                TickOutcome::Ticked(1),
                TickOutcome::Finished,
            ]
        );
        assert!(!seq.is_counting());
        assert!(seq.has_atmosphere(), "atmosphere carries into loading");

        // Only the countdown tone (cue 1) was faded, then stopped after the ramp.
        let calls = audio.calls();
        assert_eq!(
            &calls[2..],
            &[Call::Ramp(CueHandle(1), 0.5), Call::Stop(CueHandle(1), 0.6)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_discards_ticks_of_previous_countdown() {
        let (mut seq, _audio, mut rx) = sequencer();
        seq.start();
        let first = rx.recv().await.unwrap();
        assert_eq!(seq.tick(first), Some(TickOutcome::Ticked(4)));

        seq.start();
        // A tick still tagged with the first generation is ignored.
        assert_eq!(seq.tick(first), None);

        let next = rx.recv().await.unwrap();
        assert_eq!(next.generation, 2);
        assert_eq!(seq.tick(next), Some(TickOutcome::Ticked(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_fades_both_cues() {
        let (mut seq, audio, mut rx) = sequencer();
        seq.start();
        seq.cancel(false);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert!(!seq.has_atmosphere());

        let calls = audio.calls();
        assert!(calls.contains(&Call::Stop(CueHandle(1), 0.6)));
        assert!(calls.contains(&Call::Ramp(CueHandle(2), 1.5)));
        assert!(calls
            .iter()
            .any(|c| matches!(c, Call::Stop(CueHandle(2), at) if *at > 1.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_running_sequencer_stops_both_cues() {
        let (mut seq, audio, mut rx) = sequencer();
        seq.start();
        drop(seq);

        let calls = audio.calls();
        assert!(calls.contains(&Call::Stop(CueHandle(1), 0.6)));
        assert!(calls
            .iter()
            .any(|c| matches!(c, Call::Stop(CueHandle(2), at) if *at > 1.5)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none(), "ticker is gone");
    }

    #[test]
    fn timing_builders_clamp() {
        let timing = CountdownTiming::default()
            .with_start_value(0)
            .with_tick_interval(Duration::ZERO)
            .with_stop_gap(0.0)
            .with_tick_fade(-1.0)
            .with_atmosphere_fades(-1.0, 2.0)
            .with_floor_gain(0.0);
        assert_eq!(timing.start_value(), 1);
        assert_eq!(timing.tick_interval(), Duration::from_millis(1));
        assert_eq!(timing.stop_gap(), 0.01);
        assert_eq!(timing.tick_fade(), 0.0);
        assert_eq!(timing.atmosphere_fades(), (0.0, 2.0));
        assert!(timing.floor_gain() > 0.0);
    }

    #[tokio::test]
    async fn slow_atmosphere_fade_uses_slow_window() {
        let (mut seq, audio, _rx) = sequencer();
        seq.start();
        seq.cancel(true);
        seq.fade_atmosphere(true);
        seq.fade_atmosphere(true);

        let ramps: Vec<_> = audio
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Ramp(CueHandle(2), _)))
            .collect();
        assert_eq!(ramps, vec![Call::Ramp(CueHandle(2), 3.0)]);
    }
}
