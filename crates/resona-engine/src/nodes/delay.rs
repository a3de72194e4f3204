use resona_dsp::DelayLine;

use crate::atomic::AtomicF32;
use crate::buffer::CHANNELS;
use crate::nodes::ProcessCtx;

/// Extra delay-line headroom beyond the configured maximum, in samples.
const LINE_PADDING: usize = 1024;

/// Fractional delay with optional internal feedback. Output is 100% wet;
/// dry/wet mixing happens through graph connections.
pub struct DelayKernel {
    pub delay_time: AtomicF32,
    pub feedback: AtomicF32,
    /// Per-sample delay times (seconds) for the current block, staged by the
    /// automation pass.
    pub block_delays: Vec<f32>,
    pub automated: bool,
    lines: [DelayLine; CHANNELS],
    sample_rate: f32,
}

impl DelayKernel {
    pub fn new(max_delay: f32, sample_rate: f64, block_size: usize) -> Self {
        let capacity = (max_delay.max(0.0) as f64 * sample_rate).ceil() as usize + LINE_PADDING;
        Self {
            delay_time: AtomicF32::new(0.3),
            feedback: AtomicF32::new(0.0),
            block_delays: vec![0.3; block_size],
            automated: false,
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            sample_rate: sample_rate as f32,
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        let scalar_delay = self.delay_time.load();
        let feedback = self.feedback.load().clamp(0.0, 0.9995);

        for ch in 0..ctx.output.channel_count().min(CHANNELS) {
            let input = ctx.input.channel(ch);
            let output = ctx.output.channel_mut(ch);
            let line = &mut self.lines[ch];
            for i in 0..frames {
                let delay_seconds = if self.automated {
                    self.block_delays[i]
                } else {
                    scalar_delay
                };
                let delay_samples = delay_seconds.max(0.0) * self.sample_rate;
                output[i] = line.process(input[i], delay_samples, feedback);
            }
        }
    }
}
