use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pipeline::pattern::InstrumentId;
use crate::pipeline::schedule::{Cancellable, OneShotQueue};

/// How long after the last replayed event the replay counts as finished.
pub const REPLAY_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerOptions {
    #[serde(default = "unity")]
    pub volume: f32,
    #[serde(default = "unity")]
    pub pitch: f32,
}

fn unity() -> f32 {
    1.0
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self { volume: 1.0, pitch: 1.0 }
    }
}

/// One captured trigger: what played and how long after recording started.
/// Serialized as `{"time": <ms>, "category": .., "name": .., "options": {..}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(with = "millis")]
    pub time: Duration,
    #[serde(flatten)]
    pub instrument: InstrumentId,
    #[serde(default)]
    pub options: TriggerOptions,
}

// Durations go over the wire as fractional milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_nanos() as f64 / 1e6)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid event time {ms}")));
        }
        Ok(Duration::from_nanos((ms * 1e6).round() as u64))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Replaying,
}

#[derive(Clone, Debug)]
enum ReplayTask {
    Fire(TriggerEvent),
    Complete,
}

/// What came due during one replay poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayPoll {
    pub fires: Vec<TriggerEvent>,
    pub finished: bool,
}

/// Captures live triggers into a timeline and replays timelines.
#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    started: Duration,
    events: Vec<TriggerEvent>,
    pending: OneShotQueue<ReplayTask>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            started: Duration::ZERO,
            events: Vec::new(),
            pending: OneShotQueue::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn is_replaying(&self) -> bool {
        self.state == RecorderState::Replaying
    }

    // events captured so far in the current take
    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    pub fn start(&mut self, now: Duration) -> Result<()> {
        match self.state {
            RecorderState::Idle => {}
            RecorderState::Recording => return Err(Error::RecorderBusy("already recording")),
            RecorderState::Replaying => return Err(Error::RecorderBusy("replay in progress")),
        }
        self.events.clear();
        self.started = now;
        self.state = RecorderState::Recording;
        info!("recording started");
        Ok(())
    }

    pub fn capture(&mut self, now: Duration, instrument: &InstrumentId, options: TriggerOptions) {
        if self.state != RecorderState::Recording {
            return;
        }
        // a clock that reads behind the start still yields a non-decreasing offset
        let floor = self.events.last().map(|e| e.time).unwrap_or(Duration::ZERO);
        let time = now.saturating_sub(self.started).max(floor);
        self.events.push(TriggerEvent { time, instrument: instrument.clone(), options });
    }

    pub fn stop_recording(&mut self) -> Vec<TriggerEvent> {
        if self.state != RecorderState::Recording {
            return Vec::new();
        }
        self.state = RecorderState::Idle;
        info!(events = self.events.len(), "recording stopped");
        std::mem::take(&mut self.events)
    }

    /// Arms every event at its offset from `now` in one go, plus a completion
    /// marker `REPLAY_GRACE` after the last one.
    pub fn play(&mut self, events: &[TriggerEvent], now: Duration) -> Result<()> {
        match self.state {
            RecorderState::Recording => return Err(Error::RecorderBusy("recording in progress")),
            RecorderState::Replaying => self.stop_replay(),
            RecorderState::Idle => {}
        }

        let mut end = Duration::ZERO;
        for e in events {
            self.pending.schedule(now + e.time, ReplayTask::Fire(e.clone()));
            end = end.max(e.time);
        }
        self.pending.schedule(now + end + REPLAY_GRACE, ReplayTask::Complete);
        self.state = RecorderState::Replaying;
        info!(events = events.len(), "replay started");
        Ok(())
    }

    pub fn stop_replay(&mut self) {
        if self.state != RecorderState::Replaying {
            return;
        }
        debug!(pending = self.pending.len(), "replay cancelled");
        self.pending.cancel_all();
        self.state = RecorderState::Idle;
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.next_due()
    }

    pub fn poll(&mut self, now: Duration) -> ReplayPoll {
        let mut out = ReplayPoll::default();
        if self.state != RecorderState::Replaying {
            return out;
        }
        for task in self.pending.drain_due(now) {
            match task {
                ReplayTask::Fire(e) => out.fires.push(e),
                ReplayTask::Complete => out.finished = true,
            }
        }
        if out.finished {
            self.pending.cancel_all();
            self.state = RecorderState::Idle;
            info!("replay finished");
        }
        out
    }
}
