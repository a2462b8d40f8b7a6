// The session is the one object a UI layer talks to. It owns the sample
// store, the pattern library, the sequencer and the recorder, and forwards
// everything audible to the audio sink as `AudioCommand`s.
//
// Recording, pattern playback and replay are mutually exclusive: starting one
// stops the others first.

use std::time::Duration;

use tracing::{info, warn};

use crate::audio_api::{AudioCommand, AudioSink, EffectLevels, VoiceId};
use crate::config::SessionSettings;
use crate::error::Result;
use crate::pipeline::clock::Clock;
use crate::pipeline::effects::{EffectKnob, EffectState};
use crate::pipeline::pattern::{InstrumentId, PatternLibrary};
use crate::pipeline::persistence::{RecordingRecord, RecordingStore};
use crate::pipeline::recorder::{Recorder, TriggerEvent, TriggerOptions};
use crate::pipeline::sample_store::SampleStore;
use crate::pipeline::sequencer::{StepSequencer, Tempo};
use crate::pipeline::trigger::trigger_voice;
use crate::shared::{SessionEvent, SessionState};

pub struct Session<S: AudioSink, C: Clock> {
    store: SampleStore,
    patterns: PatternLibrary,
    sink: S,
    clock: C,
    sequencer: StepSequencer,
    recorder: Recorder,
    effects: EffectState,
    last_recording: Vec<TriggerEvent>,
}

impl<S: AudioSink, C: Clock> Session<S, C> {
    /// Builds a session and pushes the starting effect levels to the sink.
    pub fn new(
        store: SampleStore,
        patterns: PatternLibrary,
        sink: S,
        clock: C,
        settings: SessionSettings,
    ) -> Result<Self> {
        let tempo = settings.tempo()?;
        let effects = settings.effects.clamped();
        sink.send(AudioCommand::SetEffects(effects.levels()));
        info!(samples = store.len(), patterns = patterns.len(), bpm = tempo.bpm(), "session ready");
        Ok(Self {
            store,
            patterns,
            sink,
            clock,
            sequencer: StepSequencer::new(tempo),
            recorder: Recorder::new(),
            effects,
            last_recording: Vec::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        if self.recorder.is_recording() {
            SessionState::Recording
        } else if self.sequencer.is_running() {
            SessionState::PlayingPattern
        } else if self.recorder.is_replaying() {
            SessionState::PlayingRecording
        } else {
            SessionState::Idle
        }
    }

    // -- triggering --

    pub fn trigger(&mut self, category: &str, name: &str) -> Option<VoiceId> {
        self.trigger_with(&InstrumentId::new(category, name), TriggerOptions::default())
    }

    pub fn trigger_with(&mut self, instrument: &InstrumentId, options: TriggerOptions) -> Option<VoiceId> {
        let now = self.clock.now();
        trigger_voice(&self.store, &self.sink, &mut self.recorder, now, instrument, options)
    }

    // -- tempo --

    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        let tempo = Tempo::new(bpm).inspect_err(|e| warn!("{e}"))?;
        let now = self.clock.now();
        self.sequencer.set_tempo(tempo, now);
        Ok(())
    }

    pub fn tempo(&self) -> f64 {
        self.sequencer.tempo().bpm()
    }

    // -- effects --

    pub fn set_master_volume(&mut self, v: f32) {
        self.set_effect(EffectKnob::MasterVolume, v);
    }

    pub fn set_reverb_level(&mut self, v: f32) {
        self.set_effect(EffectKnob::Reverb, v);
    }

    pub fn set_delay_level(&mut self, v: f32) {
        self.set_effect(EffectKnob::Delay, v);
    }

    pub fn set_filter_cutoff(&mut self, v: f32) {
        self.set_effect(EffectKnob::Filter, v);
    }

    fn set_effect(&mut self, knob: EffectKnob, v: f32) {
        if self.effects.set(knob, v) {
            self.sink.send(AudioCommand::SetEffects(self.effects.levels()));
        }
    }

    pub fn effect_levels(&self) -> EffectLevels {
        self.effects.levels()
    }

    // -- recording --

    pub fn start_recording(&mut self) -> Result<()> {
        self.sequencer.stop();
        self.recorder.stop_replay();
        let now = self.clock.now();
        self.recorder.start(now)
    }

    /// Ends the take and returns it; it also stays available as `last_recording`.
    pub fn stop_recording(&mut self) -> Vec<TriggerEvent> {
        if !self.recorder.is_recording() {
            return Vec::new();
        }
        self.last_recording = self.recorder.stop_recording();
        self.last_recording.clone()
    }

    pub fn last_recording(&self) -> &[TriggerEvent] {
        &self.last_recording
    }

    pub fn play_recording(&mut self, events: &[TriggerEvent]) -> Result<()> {
        self.sequencer.stop();
        self.stop_recording();
        let now = self.clock.now();
        self.recorder.play(events, now)
    }

    pub fn replay_last(&mut self) -> Result<()> {
        let events = self.last_recording.clone();
        self.play_recording(&events)
    }

    pub fn stop_playback(&mut self) {
        self.recorder.stop_replay();
    }

    // -- patterns --

    pub fn play_pattern(&mut self, name: &str) -> Result<()> {
        // an unknown name leaves whatever is running alone
        let pattern = self.patterns.get(name).inspect_err(|e| warn!("{e}"))?;
        self.stop_recording();
        self.recorder.stop_replay();
        let now = self.clock.now();
        self.sequencer.play(pattern, now);
        Ok(())
    }

    pub fn stop_pattern(&mut self) {
        self.sequencer.stop();
    }

    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns.names()
    }

    pub fn current_pattern(&self) -> Option<&str> {
        self.sequencer.current_pattern().map(|p| p.name.as_str())
    }

    pub fn current_step(&self) -> Option<u8> {
        self.sequencer.current_step()
    }

    // -- clock --

    /// When the next scheduled thing is due, if anything is.
    pub fn next_due(&self) -> Option<Duration> {
        match (self.sequencer.next_due(), self.recorder.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires everything that came due since the last call. Call this from the
    /// host loop every few milliseconds.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let now = self.clock.now();
        let mut out = Vec::new();

        let pattern = self.sequencer.current_pattern().map(|p| p.name.clone());
        for fire in self.sequencer.poll(now) {
            out.push(SessionEvent::Step {
                pattern: pattern.clone().unwrap_or_default(),
                step: fire.step,
            });
            for hit in &fire.hits {
                if trigger_voice(&self.store, &self.sink, &mut self.recorder, now, hit, TriggerOptions::default())
                    .is_none()
                {
                    out.push(SessionEvent::Missing(hit.clone()));
                }
            }
        }

        let replay = self.recorder.poll(now);
        for event in &replay.fires {
            if trigger_voice(&self.store, &self.sink, &mut self.recorder, now, &event.instrument, event.options)
                .is_none()
            {
                out.push(SessionEvent::Missing(event.instrument.clone()));
            }
        }
        if replay.finished {
            out.push(SessionEvent::ReplayFinished);
        }
        out
    }

    // -- persistence --

    pub fn save_recording<R: RecordingStore + ?Sized>(
        &self,
        store: &R,
        name: &str,
        events: &[TriggerEvent],
    ) -> Result<()> {
        store
            .save(name, &RecordingRecord::new(events.to_vec(), self.tempo()))
            .inspect_err(|e| warn!("{e}"))
    }

    pub fn load_recording<R: RecordingStore + ?Sized>(
        &self,
        store: &R,
        name: &str,
    ) -> Result<Option<RecordingRecord>> {
        store.load(name).inspect_err(|e| warn!("{e}"))
    }
}
