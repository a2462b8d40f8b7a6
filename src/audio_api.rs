use std::sync::Arc;

pub use crate::audio::{EffectLevels, SampleBuffer, VoiceId};

#[derive(Clone, Debug)]
pub struct TriggerParams {
    pub voice: VoiceId,
    pub buffer: Arc<SampleBuffer>, // shared with the sample store, no copy on trigger
    pub gain: f32,
    pub pitch: f32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Start a new voice through the effects chain
    Trigger(TriggerParams),

    // Replace the routing graph's gains/cutoff; the graph itself is never rebuilt
    SetEffects(EffectLevels),
}

/// Where the session sends its audio commands.
///
/// The real implementation is `audio::AudioHandle`, which forwards to the
/// output stream; tests capture commands instead.
pub trait AudioSink {
    fn send(&self, cmd: AudioCommand);
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn send(&self, cmd: AudioCommand) {
        (**self).send(cmd)
    }
}

impl<S: AudioSink + ?Sized> AudioSink for std::rc::Rc<S> {
    fn send(&self, cmd: AudioCommand) {
        (**self).send(cmd)
    }
}
