// Synthetic room response for the convolution reverb.

pub const IMPULSE_SECONDS: f32 = 2.5;
pub const IMPULSE_DECAY: f32 = 2.0;
// right channel decays as if it were this much further along, decorrelates L/R
const RIGHT_CHANNEL_OFFSET: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct ReverbImpulse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl ReverbImpulse {
    pub fn generate(sample_rate: u32, seconds: f32, decay: f32, rng: &mut fastrand::Rng) -> Self {
        let len = ((sample_rate as f32 * seconds) as usize).max(1);
        let mut left = Vec::with_capacity(len);
        let mut right = Vec::with_capacity(len);

        for i in 0..len {
            let n = i as f32 / len as f32;
            left.push((1.0 - n) * rng.f32() * (-decay * n).exp());
            right.push((1.0 - n) * rng.f32() * (-decay * (n + RIGHT_CHANNEL_OFFSET)).exp());
        }

        let mut impulse = Self { left, right };
        impulse.normalize();
        impulse
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    // scale to unit energy across both channels so the send level means something
    fn normalize(&mut self) {
        let energy: f32 = self.left.iter().chain(self.right.iter()).map(|x| x * x).sum();
        if energy <= f32::EPSILON {
            return;
        }
        let scale = (2.0 / energy).sqrt();
        for x in self.left.iter_mut().chain(self.right.iter_mut()) {
            *x *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse() -> ReverbImpulse {
        ReverbImpulse::generate(8000, IMPULSE_SECONDS, IMPULSE_DECAY, &mut fastrand::Rng::with_seed(7))
    }

    #[test]
    fn length_follows_sample_rate() {
        assert_eq!(impulse().len(), 20000);
    }

    #[test]
    fn tail_decays() {
        let ir = impulse();
        let head: f32 = ir.left[..2000].iter().map(|x| x.abs()).sum();
        let tail: f32 = ir.left[18000..].iter().map(|x| x.abs()).sum();
        assert!(head > tail * 10.0, "head {head} tail {tail}");
        assert!(ir.left.iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn channels_differ() {
        let ir = impulse();
        assert_ne!(ir.left, ir.right);
        let l: f32 = ir.left.iter().map(|x| x * x).sum();
        let r: f32 = ir.right.iter().map(|x| x * x).sum();
        // right uses the steeper envelope
        assert!(r < l);
    }

    #[test]
    fn same_seed_same_impulse() {
        let a = impulse();
        let b = impulse();
        assert_eq!(a.left, b.left);
    }
}
