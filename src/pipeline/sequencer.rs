use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pipeline::pattern::{InstrumentId, Pattern};
use crate::pipeline::schedule::{Cancellable, RepeatingTick};
use crate::shared::{DEFAULT_TEMPO, STEPS_PER_PATTERN};

/// Beats per minute, always finite and positive.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Self(bpm))
        } else {
            Err(Error::InvalidTempo(bpm))
        }
    }

    pub fn bpm(self) -> f64 {
        self.0
    }

    // one 16th note: (60000 / bpm) / 4
    pub fn step_interval_ms(self) -> f64 {
        (60_000.0 / self.0) / 4.0
    }

    // a vanishingly slow tempo saturates rather than overflowing `Duration`
    pub fn step_interval(self) -> Duration {
        Duration::try_from_secs_f64(self.step_interval_ms() / 1000.0).unwrap_or(Duration::MAX)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_TEMPO)
    }
}

/// Everything that fires on one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct StepFire {
    pub step: u8,
    pub hits: Vec<InstrumentId>,
}

#[derive(Clone, Debug)]
enum SequencerState {
    Stopped,
    Running { pattern: Arc<Pattern>, step: usize, clock: RepeatingTick },
}

/// Loops one pattern at a time, one step per 16th note.
#[derive(Clone, Debug)]
pub struct StepSequencer {
    tempo: Tempo,
    state: SequencerState,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new(Tempo::default())
    }
}

impl StepSequencer {
    pub fn new(tempo: Tempo) -> Self {
        Self { tempo, state: SequencerState::Stopped }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SequencerState::Running { .. })
    }

    pub fn current_pattern(&self) -> Option<&Arc<Pattern>> {
        match &self.state {
            SequencerState::Running { pattern, .. } => Some(pattern),
            SequencerState::Stopped => None,
        }
    }

    // the step that the next tick will play
    pub fn current_step(&self) -> Option<u8> {
        match &self.state {
            SequencerState::Running { step, .. } => Some(*step as u8),
            SequencerState::Stopped => None,
        }
    }

    pub fn next_due(&self) -> Option<Duration> {
        match &self.state {
            SequencerState::Running { clock, .. } => clock.next_due(),
            SequencerState::Stopped => None,
        }
    }

    pub fn play(&mut self, pattern: Arc<Pattern>, now: Duration) {
        // never two clocks at once
        self.stop();
        info!(pattern = %pattern.name, bpm = self.tempo.bpm(), "pattern started");
        self.state = SequencerState::Running {
            pattern,
            step: 0,
            clock: RepeatingTick::arm(now, self.tempo.step_interval()),
        };
    }

    pub fn stop(&mut self) {
        if let SequencerState::Running { pattern, clock, .. } = &mut self.state {
            clock.cancel_all();
            info!(pattern = %pattern.name, "pattern stopped");
        }
        self.state = SequencerState::Stopped;
    }

    /// Stores the new tempo. A running pattern restarts from step 0 at the new
    /// interval.
    pub fn set_tempo(&mut self, tempo: Tempo, now: Duration) {
        self.tempo = tempo;
        if let Some(pattern) = self.current_pattern().cloned() {
            self.play(pattern, now);
        }
    }

    /// Plays the current step if a tick came due by `now`, advancing the
    /// position. A stalled host gets one step, never a backlog.
    pub fn poll(&mut self, now: Duration) -> Option<StepFire> {
        let SequencerState::Running { pattern, step, clock } = &mut self.state else {
            return None;
        };
        if !clock.poll(now) {
            return None;
        }

        let hits: Vec<InstrumentId> = pattern.hits_at(*step).cloned().collect();
        debug!(pattern = %pattern.name, step = *step, hits = hits.len(), "step");
        let fire = StepFire { step: *step as u8, hits };
        *step = (*step + 1) % STEPS_PER_PATTERN;
        Some(fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pattern::PatternLibrary;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn seq(bpm: f64) -> (StepSequencer, PatternLibrary) {
        (StepSequencer::new(Tempo::new(bpm).unwrap()), PatternLibrary::builtin())
    }

    #[test]
    fn step_interval_is_15000_over_bpm() {
        for bpm in [1.0, 40.0, 80.0, 120.0, 137.5, 240.0, 999.0] {
            let t = Tempo::new(bpm).unwrap();
            assert!((t.step_interval_ms() - 15000.0 / bpm).abs() < 1e-9);
            assert!((t.step_interval().as_secs_f64() * 1000.0 - 15000.0 / bpm).abs() < 1e-5);
        }
    }

    #[test]
    fn step_interval_decreases_with_bpm() {
        let mut last = f64::INFINITY;
        for bpm in (1..=300).map(|b| b as f64) {
            let i = Tempo::new(bpm).unwrap().step_interval_ms();
            assert!(i < last);
            last = i;
        }
    }

    #[test]
    fn rejects_non_positive_tempo() {
        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Tempo::new(bad), Err(Error::InvalidTempo(_))));
        }
    }

    #[test]
    fn first_tick_plays_step_zero() {
        let (mut s, lib) = seq(120.0); // 125ms steps
        s.play(lib.get("rockers").unwrap(), ms(0));
        assert_eq!(s.current_step(), Some(0));
        assert_eq!(s.poll(ms(124)), None);

        let fired = s.poll(ms(125)).unwrap();
        assert_eq!(fired.step, 0);
        let names: Vec<&str> = fired.hits.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["rockers_kick", "rockers_hihat"]);
    }

    #[test]
    fn visits_sixteen_steps_then_wraps() {
        let (mut s, lib) = seq(120.0);
        s.play(lib.get("steppers").unwrap(), ms(0));
        let steps: Vec<u8> = (1..=32).flat_map(|k| s.poll(ms(125 * k))).map(|f| f.step).collect();
        let expected: Vec<u8> = (0..16).chain(0..16).collect();
        assert_eq!(steps, expected);
    }

    #[test]
    fn replaying_keeps_a_single_clock() {
        let (mut s, lib) = seq(120.0);
        s.play(lib.get("one_drop").unwrap(), ms(0));
        s.poll(ms(125));
        s.play(lib.get("dub").unwrap(), ms(130));

        // within one interval of the restart nothing fires, then exactly one step
        assert_eq!(s.poll(ms(254)), None);
        assert_eq!(s.poll(ms(255)).map(|f| f.step), Some(0));
        assert_eq!(s.poll(ms(256)), None);
        assert_eq!(s.current_pattern().unwrap().name, "dub");
    }

    #[test]
    fn tempo_change_while_running_restarts_bar() {
        let (mut s, lib) = seq(120.0);
        s.play(lib.get("roots").unwrap(), ms(0));
        for k in 1..=4 {
            s.poll(ms(125 * k));
        }
        assert_eq!(s.current_step(), Some(4));

        s.set_tempo(Tempo::new(60.0).unwrap(), ms(500)); // 250ms steps
        assert_eq!(s.current_step(), Some(0));
        assert_eq!(s.poll(ms(749)), None);
        assert_eq!(s.poll(ms(750)).map(|f| f.step), Some(0));
    }

    #[test]
    fn tempo_change_while_stopped_only_stores() {
        let (mut s, _) = seq(120.0);
        s.set_tempo(Tempo::new(90.0).unwrap(), ms(0));
        assert!(!s.is_running());
        assert_eq!(s.tempo().bpm(), 90.0);
    }

    #[test]
    fn stop_cancels_pending_ticks() {
        let (mut s, lib) = seq(120.0);
        s.play(lib.get("rockers").unwrap(), ms(0));
        s.stop();
        assert_eq!(s.poll(ms(10_000)), None);
        assert_eq!(s.current_step(), None);
        assert_eq!(s.next_due(), None);
    }

    #[test]
    fn long_stall_plays_one_step_and_keeps_the_grid() {
        let (mut s, lib) = seq(120.0);
        s.play(lib.get("steppers").unwrap(), ms(0));
        assert_eq!(s.poll(ms(60_000)).map(|f| f.step), Some(0));
        assert_eq!(s.poll(ms(60_000)), None);
        assert_eq!(s.current_step(), Some(1));
        assert_eq!(s.next_due(), Some(ms(60_125)));
    }

    #[test]
    fn glacial_tempo_saturates_instead_of_panicking() {
        let t = Tempo::new(1e-20).unwrap();
        assert_eq!(t.step_interval(), Duration::MAX);

        let (mut s, lib) = seq(120.0);
        s.set_tempo(t, ms(0));
        s.play(lib.get("dub").unwrap(), ms(10));
        assert!(s.is_running());
        assert_eq!(s.poll(Duration::from_secs(1_000_000)), None);
        assert_eq!(s.next_due(), Some(Duration::MAX));
    }
}
