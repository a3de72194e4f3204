use std::f64::consts::TAU;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::atomic::{AtomicF32, AtomicF64};
use crate::nodes::ProcessCtx;
use std::sync::atomic::{AtomicI32, Ordering};

/// Time far enough in the future to mean "never stop".
pub(crate) const NEVER: f64 = 1.0e15;

/// Phase-accumulating oscillator. Waveform tags: 0 sine, 1 square,
/// 2 sawtooth, 3 triangle, 4 custom wavetable.
pub struct OscillatorKernel {
    pub frequency: AtomicF32,
    pub detune: AtomicF32,
    pub wave_type: AtomicI32,
    pub start_time: AtomicF64,
    pub stop_time: AtomicF64,
    wavetable: ArcSwapOption<Vec<f32>>,
    phase: f64,
}

impl OscillatorKernel {
    pub fn new() -> Self {
        Self {
            frequency: AtomicF32::new(440.0),
            detune: AtomicF32::new(0.0),
            wave_type: AtomicI32::new(2),
            start_time: AtomicF64::new(-1.0),
            stop_time: AtomicF64::new(NEVER),
            wavetable: ArcSwapOption::empty(),
            phase: 0.0,
        }
    }

    /// Installs (or clears) the custom wavetable used by type 4. The audio
    /// thread picks the new table up at the next block boundary.
    pub fn set_periodic_wave(&self, table: &[f32]) {
        if table.is_empty() {
            self.wavetable.store(None);
        } else {
            self.wavetable.store(Some(Arc::new(table.to_vec())));
        }
    }

    pub fn start(&self, when: f64) {
        self.start_time.store(when);
    }

    pub fn stop(&self, when: f64) {
        self.stop_time.store(when);
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frequency = self.frequency.load();
        let detune = self.detune.load();
        let actual = frequency * (detune / 1200.0).exp2();
        let phase_inc = actual as f64 / ctx.sample_rate;
        let tag = self.wave_type.load(Ordering::Relaxed);
        let start = self.start_time.load();
        let stop = self.stop_time.load();
        let table = self.wavetable.load_full();

        let frames = ctx.frames;
        let engine_time = ctx.engine_time;
        let sample_rate = ctx.sample_rate;
        let (left, right) = ctx.output.stereo_mut();

        for i in 0..frames {
            let t = engine_time + i as f64 / sample_rate;
            if start < 0.0 || t < start || t >= stop {
                left[i] = 0.0;
                right[i] = 0.0;
                continue;
            }

            let sample = match tag {
                0 => (self.phase * TAU).sin() as f32,
                1 => {
                    if self.phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
                2 => 2.0 * self.phase as f32 - 1.0,
                3 => (4.0 * (self.phase - 0.5).abs() - 1.0) as f32,
                4 => match table.as_deref() {
                    // A custom type without a table is silent.
                    Some(table) if !table.is_empty() => {
                        let position = self.phase * table.len() as f64;
                        let i0 = position as usize % table.len();
                        let i1 = (i0 + 1) % table.len();
                        let frac = (position - position.floor()) as f32;
                        table[i0] + frac * (table[i1] - table[i0])
                    }
                    _ => 0.0,
                },
                _ => 0.0,
            };

            left[i] = sample;
            right[i] = sample;

            self.phase += phase_inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}
