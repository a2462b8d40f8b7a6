use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::audio_api::{AudioCommand, AudioSink};

pub mod convolver;
pub mod effect;
pub mod engine;
pub mod frame;
pub mod impulse;
pub mod sample_buffer;
pub mod voice;
pub mod voice_id;

pub use effect::{EffectLevels, EffectsChain};
pub use engine::Engine;
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use voice_id::{next_voice_id, VoiceId};

pub const SAMPLE_RATE: u32 = 44100;
const COMMAND_QUEUE: usize = 1024;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSink for AudioHandle {
    fn send(&self, cmd: AudioCommand) {
        // never block the control loop on the audio thread
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping command");
        }
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported sample format (only f32 supported for now)");
    }

    let mut config: cpal::StreamConfig = supported.into();
    config.sample_rate = SAMPLE_RATE; // samples are decoded at this rate
    let channels = config.channels as usize;

    let output_stream = build_output_stream_f32(&device, &config, rx, channels)?;
    output_stream.play().context("failed to play output stream")?;
    info!(sample_rate = SAMPLE_RATE, channels, "audio output started");

    Ok(AudioHandle {
        tx,
        sample_rate: SAMPLE_RATE,
        _output_stream: output_stream,
    })
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(SAMPLE_RATE);
    let mut frames: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() { // set up command handling
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            frames.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut frames);

            // spread the stereo mix over however many channels the device has
            for (out, f) in data.chunks_exact_mut(channels.max(1)).zip(frames.iter()) {
                match out.len() {
                    1 => out[0] = 0.5 * (f.left + f.right),
                    _ => {
                        out[0] = f.left;
                        out[1] = f.right;
                        out[2..].iter_mut().for_each(|s| *s = 0.0);
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
