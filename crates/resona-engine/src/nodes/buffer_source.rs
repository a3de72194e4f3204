use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::atomic::{AtomicF32, AtomicF64};
use crate::nodes::oscillator::NEVER;
use crate::nodes::ProcessCtx;
use std::sync::atomic::{AtomicBool, Ordering};

/// PCM data installed on a buffer source. `data` is channel-planar:
/// channel `c` occupies `data[c * frames .. (c + 1) * frames]`.
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
}

/// Plays an installed PCM buffer with linear interpolation, a detunable
/// playback rate, and an exponential decay envelope.
pub struct BufferSourceKernel {
    pub playback_rate: AtomicF32,
    pub detune: AtomicF32,
    pub decay: AtomicF32,
    pub running: AtomicBool,
    pub looping: AtomicBool,
    pub start_time: AtomicF64,
    pub stop_time: AtomicF64,
    buffer: ArcSwapOption<SampleBuffer>,
    read_pos: AtomicF64,
    envelope: AtomicF32,
}

impl BufferSourceKernel {
    pub fn new() -> Self {
        Self {
            playback_rate: AtomicF32::new(1.0),
            detune: AtomicF32::new(0.0),
            decay: AtomicF32::new(0.5),
            running: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            start_time: AtomicF64::new(-1.0),
            stop_time: AtomicF64::new(NEVER),
            buffer: ArcSwapOption::empty(),
            read_pos: AtomicF64::new(0.0),
            envelope: AtomicF32::new(1.0),
        }
    }

    pub fn set_buffer(&self, data: &[f32], frames: usize, channels: usize, sample_rate: u32) {
        let expected = frames.saturating_mul(channels);
        let mut copy = data[..expected.min(data.len())].to_vec();
        copy.resize(expected, 0.0);
        self.buffer.store(Some(Arc::new(SampleBuffer {
            data: copy,
            frames,
            channels,
            sample_rate,
        })));
        self.read_pos.store(0.0);
    }

    pub fn start(&self, when: f64) {
        self.start_time.store(when);
        self.read_pos.store(0.0);
        self.envelope.store(1.0);
        self.running.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self, when: f64) {
        self.stop_time.store(when);
    }

    pub fn set_loop(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        let buffer = self.buffer.load_full();
        let Some(buffer) = buffer.filter(|b| b.frames > 1 && b.channels > 0) else {
            ctx.output.clear();
            return;
        };
        if !self.running.load(Ordering::Relaxed) {
            ctx.output.clear();
            return;
        }

        let start = self.start_time.load();
        let stop = self.stop_time.load();
        let detune = self.detune.load();
        let rate = (detune / 1200.0).exp2() as f64 * self.playback_rate.load() as f64;
        let decay = self.decay.load();
        let decay_coeff = (-1.0 / (decay * ctx.sample_rate as f32)).exp();
        let looping = self.looping.load(Ordering::Relaxed);

        let mut pos = self.read_pos.load();
        let mut envelope = self.envelope.load();
        let engine_time = ctx.engine_time;
        let sample_rate = ctx.sample_rate;
        let out_channels = ctx.output.channel_count();

        for i in 0..frames {
            let t = engine_time + i as f64 / sample_rate;
            if start >= 0.0 && t < start {
                for ch in 0..out_channels {
                    ctx.output.channel_mut(ch)[i] = 0.0;
                }
                continue;
            }
            if t >= stop {
                self.running.store(false, Ordering::Relaxed);
                for ch in 0..out_channels {
                    ctx.output.channel_mut(ch)[i] = 0.0;
                }
                continue;
            }

            if pos >= (buffer.frames - 1) as f64 {
                if looping {
                    pos = 0.0;
                } else {
                    for ch in 0..out_channels {
                        let channel = ctx.output.channel_mut(ch);
                        for slot in channel[i..frames].iter_mut() {
                            *slot = 0.0;
                        }
                    }
                    self.running.store(false, Ordering::Relaxed);
                    self.read_pos.store(pos);
                    self.envelope.store(envelope);
                    return;
                }
            }

            let index = pos as usize;
            let frac = (pos - index as f64) as f32;

            if buffer.channels == 1 {
                let s0 = buffer.data[index];
                let s1 = buffer.data[index + 1];
                let sample = (s0 + frac * (s1 - s0)) * envelope;
                for ch in 0..out_channels {
                    ctx.output.channel_mut(ch)[i] = sample;
                }
            } else {
                let shared = out_channels.min(buffer.channels);
                for ch in 0..shared {
                    let base = ch * buffer.frames;
                    let s0 = buffer.data[base + index];
                    let s1 = buffer.data[base + index + 1];
                    ctx.output.channel_mut(ch)[i] = (s0 + frac * (s1 - s0)) * envelope;
                }
                for ch in shared..out_channels {
                    ctx.output.channel_mut(ch)[i] = 0.0;
                }
            }

            envelope *= decay_coeff;
            pos += rate;
        }

        self.read_pos.store(pos);
        self.envelope.store(envelope);
    }
}
