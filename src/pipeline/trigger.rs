// Turns "play this instrument" into an audio command, for pads, pattern steps
// and replayed events alike.

use std::time::Duration;

use tracing::{trace, warn};

use crate::audio::next_voice_id;
use crate::audio_api::{AudioCommand, AudioSink, TriggerParams, VoiceId};
use crate::pipeline::pattern::InstrumentId;
use crate::pipeline::recorder::{Recorder, TriggerOptions};
use crate::pipeline::sample_store::SampleStore;

/// Starts a voice for `instrument`. Nothing is sent or captured when the
/// sample isn't loaded.
pub fn trigger_voice<S: AudioSink + ?Sized>(
    store: &SampleStore,
    sink: &S,
    recorder: &mut Recorder,
    now: Duration,
    instrument: &InstrumentId,
    options: TriggerOptions,
) -> Option<VoiceId> {
    let sample = match store.resolve(instrument) {
        Ok(s) => s,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };

    let voice = next_voice_id();
    sink.send(AudioCommand::Trigger(TriggerParams {
        voice,
        buffer: sample.buffer.clone(),
        gain: options.volume,
        pitch: options.pitch,
    }));
    trace!(%instrument, voice = voice.0, "triggered");

    // only hits that actually played end up in a recording
    recorder.capture(now, instrument, options);
    Some(voice)
}
