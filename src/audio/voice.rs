use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice_id::VoiceId;

// One fire-and-forget playback of a sample. Renders into the shared voice bus,
// the effects chain takes it from there.
#[derive(Clone, Debug)]
pub struct Voice {
    pub id: VoiceId,
    pub pos: f32,
    pub pitch: f32,
    pub gain: f32,
    pub active: bool,
    buffer: Arc<SampleBuffer>,
}

impl Voice {
    pub fn new(id: VoiceId, buffer: Arc<SampleBuffer>, pitch: f32, gain: f32) -> Self {
        Self {
            id,
            pos: 0.0,
            // a zero or negative rate would never reach the end of the buffer
            pitch: if pitch.is_finite() && pitch > 0.0 { pitch } else { 1.0 },
            gain,
            active: !buffer.is_empty(),
            buffer,
        }
    }

    // how far along this voice is, used to pick a victim when the pool is full
    pub fn progress(&self) -> f32 {
        self.pos
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        // we're at a certain playback position, it's our job to render this voice into the output buffer
        if !self.active {
            return;
        }
        let data = &self.buffer.data;
        let len = data.len();

        for frame in out.iter_mut() {
            if self.pos >= len as f32 {
                self.active = false;
                break;
            }

            // read sample at current position
            let i = self.pos as usize;
            let frac = self.pos - i as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);

            *frame += s0.lerp(s1, frac) * self.gain;

            // advance position
            self.pos += self.pitch;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::from_frames(
            (0..len).map(|i| StereoFrame::mono(i as f32)).collect(),
        ))
    }

    #[test]
    fn plays_to_the_end_then_deactivates() {
        let mut v = Voice::new(VoiceId(0), ramp(4), 1.0, 1.0);
        let mut out = vec![StereoFrame::zero(); 8];
        v.render_into(&mut out);
        assert!(!v.active);
        assert_eq!(out[3].left, 3.0);
        assert_eq!(out[4].left, 0.0);
    }

    #[test]
    fn pitch_scales_playback_rate() {
        let mut v = Voice::new(VoiceId(0), ramp(8), 2.0, 0.5);
        let mut out = vec![StereoFrame::zero(); 8];
        v.render_into(&mut out);
        // every other source frame, at half gain
        assert_eq!(out[1].left, 1.0);
        assert_eq!(out[3].left, 3.0);
        assert!(!v.active);
    }

    #[test]
    fn mixes_onto_existing_content() {
        let mut v = Voice::new(VoiceId(0), ramp(2), 1.0, 1.0);
        let mut out = vec![StereoFrame::mono(1.0); 2];
        v.render_into(&mut out);
        assert_eq!(out[1].right, 2.0);
    }

    #[test]
    fn empty_buffer_never_activates() {
        let v = Voice::new(VoiceId(0), Arc::new(SampleBuffer::default()), 1.0, 1.0);
        assert!(!v.active);
    }
}
