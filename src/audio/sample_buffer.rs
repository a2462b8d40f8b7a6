use std::io::Read;
use std::path::Path;

use super::frame::StereoFrame;
use crate::error::LoadError;

#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array
}

impl SampleBuffer {
    pub fn from_frames(data: Vec<StereoFrame>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Load a WAV file from disk into the sample buffer
    pub fn load_wav(path: &Path, target_rate: u32) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)?; // missing files surface as Io, not Decode
        Self::read_wav(std::io::BufReader::new(file), target_rate)
    }

    // Same as load_wav but from any reader (in-memory assets, tests)
    pub fn read_wav<R: Read>(source: R, target_rate: u32) -> Result<Self, LoadError> {
        let reader = hound::WavReader::new(source)?;
        Self::decode(reader, target_rate)
    }

    fn decode<R: Read>(mut reader: hound::WavReader<R>, target_rate: u32) -> Result<Self, LoadError> {
        let spec = reader.spec();
        let file_rate = spec.sample_rate;
        let file_channels = spec.channels as usize;

        // Read the samples from the WAV file
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => { // int, convert to float
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let mut frames: Vec<StereoFrame> = match file_channels {
            0 => Vec::new(),
            1 => samples.into_iter().map(StereoFrame::mono).collect(), // mono, duplicate
            n => samples // anything wider than stereo keeps its first two channels
                .chunks_exact(n)
                .map(|c| StereoFrame { left: c[0], right: c[1] })
                .collect(),
        };

        // a header-only file decodes fine but can't be played
        if frames.is_empty() {
            return Err(LoadError::Empty);
        }

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }

        Ok(Self { data: frames })
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        // fractional position in the source buffer
        let src_pos = i as f64 / ratio; // ex. 3.7
        let idx = src_pos.floor() as usize; // ex. 3
        let frac = (src_pos - idx as f64) as f32; // ex. 0.7
        if idx >= frames.len().saturating_sub(1) { // edge case
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            out.push(frames[idx].lerp(frames[idx + 1], frac));
        }
    }
    out
}
