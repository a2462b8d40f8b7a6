use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

use super::convolver::{Convolver, BLOCK_SIZE};
use super::frame::StereoFrame;
use super::impulse::{ReverbImpulse, IMPULSE_DECAY, IMPULSE_SECONDS};

pub const DELAY_SECONDS: f32 = 0.5;

/// Concrete gains and frequencies applied by the routing graph.
///
/// Produced by `pipeline::effects::EffectState`, which owns the mapping from
/// normalized knob positions; the graph just applies what it's given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectLevels {
    pub master: f32,
    pub dry: f32,
    pub reverb_send: f32,
    pub delay_send: f32,
    pub feedback: f32,
    pub cutoff_hz: f32,
}

impl Default for EffectLevels {
    fn default() -> Self {
        Self {
            master: 1.0,
            dry: 1.0,
            reverb_send: 0.0,
            delay_send: 0.0,
            feedback: 0.0,
            cutoff_hz: 20000.0,
        }
    }
}

// Fixed routing graph, built once:
//
//   voices ─┬─ dry ───────────────────────┐
//           ├─ reverb send ─ convolver ───┼─ lowpass ─ master ─ out
//           └─ delay send ─ delay ◄─ fb ──┘
pub struct EffectsChain {
    sample_rate: f32,
    levels: EffectLevels,
    reverb: [Convolver; 2],
    delay: FeedbackDelay,
    filter: [DirectForm2Transposed<f32>; 2],
}

impl EffectsChain {
    pub fn new(sample_rate: u32) -> Self {
        let mut rng = fastrand::Rng::new();
        Self::with_impulse(
            sample_rate,
            ReverbImpulse::generate(sample_rate, IMPULSE_SECONDS, IMPULSE_DECAY, &mut rng),
        )
    }

    pub fn with_impulse(sample_rate: u32, impulse: ReverbImpulse) -> Self {
        let levels = EffectLevels::default();
        let coeffs = lowpass(sample_rate as f32, levels.cutoff_hz);
        Self {
            sample_rate: sample_rate as f32,
            levels,
            reverb: [
                Convolver::new(&impulse.left, BLOCK_SIZE),
                Convolver::new(&impulse.right, BLOCK_SIZE),
            ],
            delay: FeedbackDelay::new((sample_rate as f32 * DELAY_SECONDS) as usize),
            filter: [
                DirectForm2Transposed::<f32>::new(coeffs),
                DirectForm2Transposed::<f32>::new(coeffs),
            ],
        }
    }

    pub fn levels(&self) -> EffectLevels {
        self.levels
    }

    pub fn set_levels(&mut self, levels: EffectLevels) {
        if levels.cutoff_hz != self.levels.cutoff_hz {
            let coeffs = lowpass(self.sample_rate, levels.cutoff_hz);
            for f in &mut self.filter {
                f.update_coefficients(coeffs);
            }
        }
        self.levels = levels;
    }

    // Runs the voice bus through the graph, writing the result into `out`.
    pub fn process(&mut self, bus: &[StereoFrame], out: &mut [StereoFrame]) {
        let l = self.levels;
        for (x, y) in bus.iter().zip(out.iter_mut()) {
            let dry = *x * l.dry;

            let wet_in = *x * l.reverb_send;
            let reverb = StereoFrame {
                left: self.reverb[0].process_sample(wet_in.left),
                right: self.reverb[1].process_sample(wet_in.right),
            };

            let echo = self.delay.process(*x * l.delay_send, l.feedback);

            let mixed = dry + reverb + echo;
            let filtered = StereoFrame {
                left: self.filter[0].run(mixed.left),
                right: self.filter[1].run(mixed.right),
            };
            *y = filtered * l.master;
        }
    }
}

fn lowpass(sample_rate: f32, cutoff_hz: f32) -> Coefficients<f32> {
    // biquad refuses cutoffs at or above nyquist
    let cutoff = cutoff_hz.clamp(10.0, sample_rate * 0.45);
    Coefficients::<f32>::from_params(Type::LowPass, sample_rate.hz(), cutoff.hz(), Q_BUTTERWORTH_F32)
        .unwrap_or(Coefficients {
            a1: 0.0,
            a2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
        })
}

// Delay line whose output is fed back into its own input.
pub struct FeedbackDelay {
    buf: Vec<StereoFrame>,
    pos: usize,
}

impl FeedbackDelay {
    pub fn new(len: usize) -> Self {
        Self { buf: vec![StereoFrame::zero(); len.max(1)], pos: 0 }
    }

    #[inline]
    pub fn process(&mut self, input: StereoFrame, feedback: f32) -> StereoFrame {
        let out = self.buf[self.pos];
        self.buf[self.pos] = input + out * feedback;
        self.pos = (self.pos + 1) % self.buf.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> EffectsChain {
        let impulse = ReverbImpulse::generate(8000, 0.1, IMPULSE_DECAY, &mut fastrand::Rng::with_seed(1));
        EffectsChain::with_impulse(8000, impulse)
    }

    fn impulse_response(chain: &mut EffectsChain, len: usize) -> Vec<StereoFrame> {
        let mut bus = vec![StereoFrame::zero(); len];
        bus[0] = StereoFrame::mono(1.0);
        let mut out = vec![StereoFrame::zero(); len];
        chain.process(&bus, &mut out);
        out
    }

    #[test]
    fn master_scales_linearly() {
        let mut a = chain();
        let mut b = chain();
        b.set_levels(EffectLevels { master: 0.5, ..EffectLevels::default() });
        let ya = impulse_response(&mut a, 64);
        let yb = impulse_response(&mut b, 64);
        for (x, y) in ya.iter().zip(yb.iter()) {
            assert!((x.left * 0.5 - y.left).abs() < 1e-6);
        }
    }

    #[test]
    fn silent_sends_leave_only_the_dry_path() {
        let mut c = chain();
        let y = impulse_response(&mut c, 8000);
        // unity dry through a wide-open lowpass: energy stays near the start
        let early: f32 = y[..64].iter().map(|f| f.left.abs()).sum();
        let late: f32 = y[4000..].iter().map(|f| f.left.abs()).sum();
        assert!(early > 0.5);
        assert!(late < 1e-3);
    }

    #[test]
    fn delay_send_echoes_after_delay_time() {
        let mut c = chain();
        c.set_levels(EffectLevels { dry: 0.0, delay_send: 1.0, feedback: 0.0, ..EffectLevels::default() });
        let y = impulse_response(&mut c, 8000);
        let before: f32 = y[..3900].iter().map(|f| f.left.abs()).sum();
        let around: f32 = y[4000..4100].iter().map(|f| f.left.abs()).sum();
        assert!(before < 1e-4);
        assert!(around > 0.5);
    }

    #[test]
    fn feedback_repeats_decay() {
        let mut d = FeedbackDelay::new(4);
        let mut outs = Vec::new();
        outs.push(d.process(StereoFrame::mono(1.0), 0.6).left);
        for _ in 0..12 {
            outs.push(d.process(StereoFrame::zero(), 0.6).left);
        }
        assert_eq!(outs[4], 1.0);
        assert!((outs[8] - 0.6).abs() < 1e-6);
        assert!((outs[12] - 0.36).abs() < 1e-6);
    }

    #[test]
    fn lowpass_cutoff_is_clamped_below_nyquist() {
        let mut c = chain();
        c.set_levels(EffectLevels { cutoff_hz: 20000.0, ..EffectLevels::default() });
        let y = impulse_response(&mut c, 256);
        assert!(y.iter().all(|f| f.left.is_finite()));
    }

    #[test]
    fn reverb_send_produces_a_tail() {
        let mut c = chain();
        c.set_levels(EffectLevels { dry: 0.0, reverb_send: 1.0, ..EffectLevels::default() });
        let y = impulse_response(&mut c, 2000);
        let tail: f32 = y[BLOCK_SIZE..].iter().map(|f| f.left.abs() + f.right.abs()).sum();
        assert!(tail > 0.1);
    }
}
