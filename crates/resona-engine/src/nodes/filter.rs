use resona_dsp::biquad::{bandpass_coefficients, highpass_coefficients, lowpass_coefficients, Biquad};

use crate::atomic::AtomicF32;
use crate::buffer::CHANNELS;
use crate::nodes::ProcessCtx;
use std::sync::atomic::{AtomicI32, Ordering};

/// Per-block smoothing applied to frequency and Q before coefficient
/// derivation, suppressing zipper artifacts on parameter jumps.
const PARAM_SMOOTHING: f32 = 0.2;

/// Biquad filter node. Type tags: 0 lowpass, 1 highpass, 2 bandpass.
pub struct BiquadKernel {
    pub frequency: AtomicF32,
    pub q: AtomicF32,
    /// Reserved for shelving/peaking extensions; schedulable but unused by
    /// the three supported responses.
    pub gain: AtomicF32,
    pub filter_type: AtomicI32,
    smoothed_frequency: f32,
    smoothed_q: f32,
    filters: [Biquad; CHANNELS],
    sample_rate: f32,
}

impl BiquadKernel {
    pub fn new(sample_rate: f64) -> Self {
        let mut kernel = Self {
            frequency: AtomicF32::new(350.0),
            q: AtomicF32::new(1.0),
            gain: AtomicF32::new(0.0),
            filter_type: AtomicI32::new(0),
            smoothed_frequency: 350.0,
            smoothed_q: 1.0,
            filters: [Biquad::new(); CHANNELS],
            sample_rate: sample_rate as f32,
        };
        kernel.prepare();
        kernel
    }

    /// Snaps smoothing to the current targets and clears filter state.
    pub fn prepare(&mut self) {
        self.smoothed_frequency = self.clamped_frequency();
        self.smoothed_q = self.clamped_q();
        self.update_coefficients();
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let target_frequency = self.clamped_frequency();
        let target_q = self.clamped_q();
        self.smoothed_frequency += (target_frequency - self.smoothed_frequency) * PARAM_SMOOTHING;
        self.smoothed_q += (target_q - self.smoothed_q) * PARAM_SMOOTHING;
        self.update_coefficients();

        let frames = ctx.frames;
        for ch in 0..ctx.output.channel_count().min(CHANNELS) {
            let input = ctx.input.channel(ch);
            let output = ctx.output.channel_mut(ch);
            let filter = &mut self.filters[ch];
            for i in 0..frames {
                output[i] = filter.process(input[i]);
            }
        }
    }

    fn clamped_frequency(&self) -> f32 {
        self.frequency.load().clamp(10.0, 0.45 * self.sample_rate)
    }

    fn clamped_q(&self) -> f32 {
        self.q.load().max(1.0e-4)
    }

    fn update_coefficients(&mut self) {
        let coefficients = match self.filter_type.load(Ordering::Relaxed) {
            1 => highpass_coefficients(self.smoothed_frequency, self.smoothed_q, self.sample_rate),
            2 => bandpass_coefficients(self.smoothed_frequency, self.smoothed_q, self.sample_rate),
            _ => lowpass_coefficients(self.smoothed_frequency, self.smoothed_q, self.sample_rate),
        };
        for filter in &mut self.filters {
            filter.set_coefficients(coefficients);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BlockBuffer;

    fn run_dc(kernel: &mut BiquadKernel, blocks: usize) -> f32 {
        let mut input = BlockBuffer::stereo(64);
        input.channel_mut(0).fill(1.0);
        input.channel_mut(1).fill(1.0);
        let mut output = BlockBuffer::stereo(64);
        for _ in 0..blocks {
            let mut ctx = ProcessCtx {
                input: &input,
                output: &mut output,
                frames: 64,
                engine_time: 0.0,
                sample_rate: 48_000.0,
            };
            kernel.process(&mut ctx);
        }
        output.channel(0)[63]
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut kernel = BiquadKernel::new(48_000.0);
        kernel.frequency.store(1_000.0);
        let out = run_dc(&mut kernel, 64);
        assert!((out - 1.0).abs() < 1e-2, "dc gain {out}");
    }

    #[test]
    fn highpass_rejects_dc() {
        let mut kernel = BiquadKernel::new(48_000.0);
        kernel.filter_type.store(1, Ordering::Relaxed);
        kernel.frequency.store(1_000.0);
        kernel.prepare();
        let out = run_dc(&mut kernel, 64);
        assert!(out.abs() < 1e-2, "dc leak {out}");
    }

    #[test]
    fn frequency_changes_are_smoothed() {
        let mut kernel = BiquadKernel::new(48_000.0);
        kernel.frequency.store(100.0);
        kernel.prepare();
        kernel.frequency.store(10_000.0);
        let input = BlockBuffer::stereo(16);
        let mut output = BlockBuffer::stereo(16);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames: 16,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);
        // One block moves 20% of the way toward the target.
        let expected = 100.0 + (10_000.0 - 100.0) * 0.2;
        assert!((kernel.smoothed_frequency - expected).abs() < 1e-3);
    }
}
