//! Audio cue scheduling.
//!
//! The session never produces sound itself. It asks an [`AudioOutput`] to
//! start cues and schedules gain ramps and stops against the output's clock.
//! Scheduled commands are never revoked once issued.

/// Cues the lobby session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    /// Short one-shot alert when a human joins.
    JoinAlert,
    /// Countdown tone, played while the countdown runs.
    Countdown,
    /// Ambient atmosphere that carries on into the loading screen.
    Atmosphere,
}

/// Handle to a playing, fadeable cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CueHandle(pub u64);

/// Audio output the session schedules cues on.
///
/// Times are in seconds on the output's own clock, as reported by
/// [`current_time`](AudioOutput::current_time).
pub trait AudioOutput: Send + Sync + 'static {
    /// Current time on the audio clock.
    fn current_time(&self) -> f64;

    /// Play a cue to completion. It cannot be faded or stopped.
    fn play_sound(&self, sound: Sound);

    /// Start a cue that can later be faded and stopped.
    fn play_fadeable(&self, sound: Sound) -> CueHandle;

    /// Ramp the cue's gain to `gain`, reaching it at time `at`.
    fn ramp_gain(&self, cue: CueHandle, gain: f32, at: f64);

    /// Stop the cue at time `at`.
    fn stop(&self, cue: CueHandle, at: f64);
}

/// How a cue is faded out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOut {
    /// Seconds until the gain reaches `floor_gain`.
    pub window: f64,
    /// Seconds between the end of the ramp and the stop. Always positive.
    pub stop_gap: f64,
    /// Gain the ramp ends on. Exponential ramps cannot reach zero.
    pub floor_gain: f32,
}

impl FadeOut {
    /// Schedule the ramp and the stop for `cue`, both offset from a single
    /// reading of the audio clock so the stop always lands after the ramp.
    pub fn schedule(&self, audio: &dyn AudioOutput, cue: CueHandle) {
        let now = audio.current_time();
        let ramp_end = now + self.window;
        audio.ramp_gain(cue, self.floor_gain, ramp_end);
        audio.stop(cue, ramp_end + self.stop_gap);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ClockOnly {
        calls: Mutex<Vec<(&'static str, f64)>>,
    }

    impl AudioOutput for ClockOnly {
        fn current_time(&self) -> f64 {
            10.0
        }
        fn play_sound(&self, _sound: Sound) {}
        fn play_fadeable(&self, _sound: Sound) -> CueHandle {
            CueHandle(1)
        }
        fn ramp_gain(&self, _cue: CueHandle, _gain: f32, at: f64) {
            self.calls.lock().unwrap().push(("ramp", at));
        }
        fn stop(&self, _cue: CueHandle, at: f64) {
            self.calls.lock().unwrap().push(("stop", at));
        }
    }

    #[test]
    fn stop_is_scheduled_after_ramp_ends() {
        let audio = ClockOnly::default();
        let fade = FadeOut {
            window: 0.5,
            stop_gap: 0.1,
            floor_gain: 0.001,
        };
        fade.schedule(&audio, CueHandle(1));

        let calls = audio.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "ramp");
        assert!((calls[0].1 - 10.5).abs() < 1e-9);
        assert_eq!(calls[1].0, "stop");
        assert!(calls[1].1 > calls[0].1);
    }
}
