use crate::audio_api::{AudioCommand, TriggerParams};

use super::effect::{EffectLevels, EffectsChain};
use super::frame::StereoFrame;
use super::voice::Voice;

pub const MAX_VOICES: usize = 64; // hard cap so dense patterns can't pile up voices
const MAX_BLOCK: usize = 4096; // scratch is sized up front, callbacks get chunked to this

// Lives inside the audio callback: owns the voices and the effects graph.
pub struct Engine {
    voices: Vec<Voice>,
    effects: EffectsChain,
    bus: Vec<StereoFrame>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_effects(EffectsChain::new(sample_rate))
    }

    pub fn with_effects(effects: EffectsChain) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            effects,
            bus: vec![StereoFrame::zero(); MAX_BLOCK],
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger(t) => self.trigger_voice(t),
            AudioCommand::SetEffects(levels) => self.effects.set_levels(levels),
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn effect_levels(&self) -> EffectLevels {
        self.effects.levels()
    }

    fn trigger_voice(&mut self, t: TriggerParams) {
        let voice = Voice::new(t.voice, t.buffer, t.pitch, t.gain);
        if !voice.active {
            return;
        }

        if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
            return;
        }

        // pool is full: steal the voice furthest through its buffer rather than drop the new hit
        let victim = self
            .voices
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.progress().total_cmp(&b.progress()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.voices[victim] = voice;
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for chunk in out.chunks_mut(MAX_BLOCK) {
            let bus = &mut self.bus[..chunk.len()];
            bus.iter_mut().for_each(|f| *f = StereoFrame::zero());

            for v in &mut self.voices {
                v.render_into(bus);
            }
            self.voices.retain(|v| v.active);

            self.effects.process(bus, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::impulse::ReverbImpulse;
    use crate::audio::{SampleBuffer, VoiceId};
    use std::sync::Arc;

    fn engine() -> Engine {
        let impulse = ReverbImpulse::generate(8000, 0.05, 2.0, &mut fastrand::Rng::with_seed(3));
        Engine::with_effects(EffectsChain::with_impulse(8000, impulse))
    }

    fn trigger(id: u64, len: usize) -> AudioCommand {
        pitched(id, len, 1.0)
    }

    fn pitched(id: u64, len: usize, pitch: f32) -> AudioCommand {
        AudioCommand::Trigger(TriggerParams {
            voice: VoiceId(id),
            buffer: Arc::new(SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); len])),
            gain: 1.0,
            pitch,
        })
    }

    #[test]
    fn voices_are_released_when_finished() {
        let mut e = engine();
        e.handle_cmd(trigger(1, 10));
        assert_eq!(e.active_voices(), 1);
        let mut out = vec![StereoFrame::zero(); 32];
        e.render_block(&mut out);
        assert_eq!(e.active_voices(), 0);
    }

    #[test]
    fn full_pool_steals_instead_of_dropping() {
        let mut e = engine();
        for i in 0..MAX_VOICES as u64 {
            e.handle_cmd(trigger(i, 10_000));
        }
        let mut out = vec![StereoFrame::zero(); 16];
        e.render_block(&mut out);

        e.handle_cmd(trigger(999, 10_000));
        assert_eq!(e.active_voices(), MAX_VOICES);
        assert!(e.voices.iter().any(|v| v.id == VoiceId(999)));
    }

    #[test]
    fn steals_the_voice_furthest_through_its_buffer() {
        let mut e = engine();
        for i in 0..MAX_VOICES as u64 - 1 {
            e.handle_cmd(trigger(i, 10_000));
        }
        // started last, but at double speed it gets furthest in
        e.handle_cmd(pitched(77, 10_000, 2.0));
        let mut out = vec![StereoFrame::zero(); 16];
        e.render_block(&mut out);

        e.handle_cmd(trigger(999, 10_000));
        assert_eq!(e.active_voices(), MAX_VOICES);
        assert!(!e.voices.iter().any(|v| v.id == VoiceId(77)));
        assert!(e.voices.iter().filter(|v| v.id != VoiceId(999)).all(|v| v.pos == 16.0));
    }

    #[test]
    fn set_effects_reaches_the_graph() {
        let mut e = engine();
        let levels = EffectLevels { master: 0.25, ..EffectLevels::default() };
        e.handle_cmd(AudioCommand::SetEffects(levels));
        assert_eq!(e.effect_levels(), levels);
    }

    #[test]
    fn renders_in_chunks_larger_than_scratch() {
        let mut e = engine();
        e.handle_cmd(trigger(1, MAX_BLOCK * 2));
        let mut out = vec![StereoFrame::zero(); MAX_BLOCK + 100];
        e.render_block(&mut out);
        assert!(out[MAX_BLOCK + 50].left.abs() > 0.1);
    }
}
