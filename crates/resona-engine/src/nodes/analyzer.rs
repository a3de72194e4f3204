use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use resona_dsp::gain::linear_to_db;

use crate::error::EngineError;
use crate::nodes::ProcessCtx;

const DEFAULT_FFT_SIZE: usize = 2048;
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// Shared analyzer state. The audio thread feeds the FIFO; readout getters
/// may run on any thread and see the most recent completed transform.
pub struct AnalyzerTap {
    fft_size: usize,
    fifo: Vec<f32>,
    fifo_index: usize,
    spectrum: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    fft: Arc<dyn Fft<f32>>,
}

impl AnalyzerTap {
    fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft_size,
            fifo: vec![0.0; fft_size],
            fifo_index: 0,
            spectrum: vec![0.0; fft_size / 2],
            scratch: vec![Complex::default(); fft_size],
            fft: planner.plan_fft_forward(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Replaces the transform size. Only powers of two in
    /// `[MIN_FFT_SIZE, MAX_FFT_SIZE]` are accepted.
    pub fn set_fft_size(&mut self, size: usize) -> Result<(), EngineError> {
        if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
            return Err(EngineError::InvalidFftSize(size));
        }
        *self = Self::new(size);
        Ok(())
    }

    fn push_block(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.fifo[self.fifo_index] = sample;
            self.fifo_index += 1;
            if self.fifo_index >= self.fft_size {
                self.run_transform();
                self.fifo_index = 0;
            }
        }
    }

    fn run_transform(&mut self) {
        for (slot, &sample) in self.scratch.iter_mut().zip(self.fifo.iter()) {
            *slot = Complex::new(sample, 0.0);
        }
        self.fft.process(&mut self.scratch);
        for (slot, bin) in self.spectrum.iter_mut().zip(self.scratch.iter()) {
            *slot = bin.norm();
        }
    }

    /// Magnitudes mapped as `dB + 100 → 0..255`.
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        let count = out.len().min(self.spectrum.len());
        for (slot, &magnitude) in out[..count].iter_mut().zip(self.spectrum.iter()) {
            let db = linear_to_db(magnitude);
            *slot = ((db + 100.0) * 2.55).clamp(0.0, 255.0) as u8;
        }
    }

    /// Time-domain FIFO mapped as `[-1, 1] → 0..255`.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        let count = out.len().min(self.fifo.len());
        for (slot, &sample) in out[..count].iter_mut().zip(self.fifo.iter()) {
            *slot = ((sample + 1.0) * 127.5).clamp(0.0, 255.0) as u8;
        }
    }

    pub fn float_frequency_data(&self, out: &mut [f32]) {
        let count = out.len().min(self.spectrum.len());
        out[..count].copy_from_slice(&self.spectrum[..count]);
    }

    pub fn float_time_domain_data(&self, out: &mut [f32]) {
        let count = out.len().min(self.fifo.len());
        out[..count].copy_from_slice(&self.fifo[..count]);
    }
}

/// Pass-through node that taps channel 0 into the shared analyzer state.
pub struct AnalyzerKernel {
    tap: Arc<Mutex<AnalyzerTap>>,
}

impl AnalyzerKernel {
    pub fn new() -> Self {
        Self {
            tap: Arc::new(Mutex::new(AnalyzerTap::new(DEFAULT_FFT_SIZE))),
        }
    }

    pub fn tap(&self) -> Arc<Mutex<AnalyzerTap>> {
        Arc::clone(&self.tap)
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        ctx.output.copy_from(ctx.input, frames);
        // Skip the tap rather than stall the audio thread if a reader is
        // mid-snapshot.
        if let Some(mut tap) = self.tap.try_lock() {
            tap.push_block(&ctx.input.channel(0)[..frames]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BlockBuffer;
    use std::f32::consts::TAU;

    #[test]
    fn rejects_invalid_fft_sizes() {
        let kernel = AnalyzerKernel::new();
        let tap = kernel.tap();
        assert!(tap.lock().set_fft_size(1000).is_err());
        assert!(tap.lock().set_fft_size(16).is_err());
        assert!(tap.lock().set_fft_size(1024).is_ok());
        assert_eq!(tap.lock().fft_size(), 1024);
    }

    #[test]
    fn spectrum_peaks_at_input_frequency() {
        let mut kernel = AnalyzerKernel::new();
        kernel.tap().lock().set_fft_size(256).unwrap();

        // Bin 8 of a 256-point transform.
        let mut input = BlockBuffer::stereo(256);
        for i in 0..256 {
            input.channel_mut(0)[i] = (TAU * 8.0 * i as f32 / 256.0).sin();
        }
        let mut output = BlockBuffer::stereo(256);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames: 256,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);

        let mut spectrum = vec![0.0f32; 128];
        kernel.tap().lock().float_frequency_data(&mut spectrum);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 8);
    }

    #[test]
    fn passes_audio_through() {
        let mut kernel = AnalyzerKernel::new();
        let mut input = BlockBuffer::stereo(16);
        input.channel_mut(0).fill(0.25);
        let mut output = BlockBuffer::stereo(16);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames: 16,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);
        assert!(output.channel(0).iter().all(|v| *v == 0.25));
    }

    #[test]
    fn byte_time_domain_centers_silence() {
        let tap = AnalyzerTap::new(64);
        let mut out = [0u8; 64];
        tap.byte_time_domain_data(&mut out);
        assert!(out.iter().all(|v| *v == 127));
    }
}
