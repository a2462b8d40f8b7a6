// Uniformly partitioned overlap-add convolution.
//
// The impulse is cut into `block`-sized partitions, each pre-transformed at
// 2*block. Incoming audio is gathered into blocks; every full block is
// transformed once and pushed onto a frequency-domain delay line, and the
// output block is the sum over partitions of delayed-input * partition.
// Latency is one block.

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

pub const BLOCK_SIZE: usize = 512;

pub struct Convolver {
    block: usize,
    fft_size: usize,
    partitions: Vec<Vec<Complex32>>, // impulse spectra
    fdl: Vec<Vec<Complex32>>,        // past input spectra, ring indexed by `head`
    head: usize,

    input: Vec<f32>,
    output: Vec<f32>,
    overlap: Vec<f32>,
    pos: usize,

    time_scratch: Vec<f32>,
    freq_scratch: Vec<Complex32>,
    acc: Vec<Complex32>,

    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
}

impl Convolver {
    pub fn new(impulse: &[f32], block: usize) -> Self {
        let block = block.max(1);
        let fft_size = 2 * block;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let bins = fft_size / 2 + 1;
        let num_partitions = impulse.len().div_ceil(block).max(1);
        let mut partitions = Vec::with_capacity(num_partitions);
        let mut padded = vec![0.0; fft_size];
        for p in 0..num_partitions {
            let start = (p * block).min(impulse.len());
            let end = ((p + 1) * block).min(impulse.len());
            padded.iter_mut().for_each(|x| *x = 0.0);
            padded[..end - start].copy_from_slice(&impulse[start..end]);

            let mut spectrum = vec![Complex32::new(0.0, 0.0); bins];
            // sizes come from the same plan, this can't fail
            let _ = r2c.process(&mut padded, &mut spectrum);
            partitions.push(spectrum);
        }

        Self {
            block,
            fft_size,
            fdl: vec![vec![Complex32::new(0.0, 0.0); bins]; num_partitions],
            partitions,
            head: 0,
            input: vec![0.0; block],
            output: vec![0.0; block],
            overlap: vec![0.0; block],
            pos: 0,
            time_scratch: vec![0.0; fft_size],
            freq_scratch: vec![Complex32::new(0.0, 0.0); bins],
            acc: vec![Complex32::new(0.0, 0.0); bins],
            r2c,
            c2r,
        }
    }

    pub fn latency(&self) -> usize {
        self.block
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.input[self.pos] = x;
        let y = self.output[self.pos];
        self.pos += 1;
        if self.pos == self.block {
            self.pos = 0;
            self.run_block();
        }
        y
    }

    fn run_block(&mut self) {
        let parts = self.partitions.len();

        // newest input spectrum goes in at head
        self.head = (self.head + parts - 1) % parts;
        self.time_scratch[..self.block].copy_from_slice(&self.input);
        self.time_scratch[self.block..].iter_mut().for_each(|x| *x = 0.0);
        let _ = self.r2c.process(&mut self.time_scratch, &mut self.fdl[self.head]);

        self.acc.iter_mut().for_each(|c| *c = Complex32::new(0.0, 0.0));
        for (p, h) in self.partitions.iter().enumerate() {
            let x = &self.fdl[(self.head + p) % parts];
            for ((a, xi), hi) in self.acc.iter_mut().zip(x.iter()).zip(h.iter()) {
                *a += xi * hi;
            }
        }

        self.freq_scratch.copy_from_slice(&self.acc);
        // DC and Nyquist of a real signal are real
        let last = self.freq_scratch.len() - 1;
        self.freq_scratch[0].im = 0.0;
        self.freq_scratch[last].im = 0.0;
        let _ = self.c2r.process(&mut self.freq_scratch, &mut self.time_scratch);

        let scale = 1.0 / self.fft_size as f32;
        for i in 0..self.block {
            self.output[i] = self.time_scratch[i] * scale + self.overlap[i];
            self.overlap[i] = self.time_scratch[self.block + i] * scale;
        }
    }
}
