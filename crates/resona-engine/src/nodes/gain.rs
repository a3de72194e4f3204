use crate::atomic::AtomicF32;
use crate::nodes::ProcessCtx;

/// Multiplies its input by a scalar gain, or by a per-sample gain curve when
/// the renderer has staged one for this block.
pub struct GainKernel {
    pub gain: AtomicF32,
    /// Per-sample gains for the current block, filled by the automation pass.
    pub block_gains: Vec<f32>,
    /// True only for blocks where `block_gains` is authoritative.
    pub automated: bool,
}

impl GainKernel {
    pub fn new(block_size: usize) -> Self {
        Self {
            gain: AtomicF32::new(1.0),
            block_gains: vec![1.0; block_size],
            automated: false,
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        if self.automated {
            for ch in 0..ctx.output.channel_count() {
                let input = ctx.input.channel(ch);
                let output = ctx.output.channel_mut(ch);
                for i in 0..frames {
                    output[i] = input[i] * self.block_gains[i];
                }
            }
        } else {
            let gain = self.gain.load();
            for ch in 0..ctx.output.channel_count() {
                let input = ctx.input.channel(ch);
                let output = ctx.output.channel_mut(ch);
                for i in 0..frames {
                    output[i] = input[i] * gain;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BlockBuffer;

    #[test]
    fn scalar_gain_scales_input() {
        let mut kernel = GainKernel::new(8);
        kernel.gain.store(0.5);
        let mut input = BlockBuffer::stereo(8);
        input.channel_mut(0).fill(1.0);
        let mut output = BlockBuffer::stereo(8);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames: 8,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);
        assert!(output.channel(0).iter().all(|v| *v == 0.5));
    }

    #[test]
    fn automated_block_overrides_scalar() {
        let mut kernel = GainKernel::new(4);
        kernel.gain.store(0.0);
        kernel.automated = true;
        kernel.block_gains.copy_from_slice(&[1.0, 0.75, 0.5, 0.25]);
        let mut input = BlockBuffer::stereo(4);
        input.channel_mut(0).fill(2.0);
        let mut output = BlockBuffer::stereo(4);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames: 4,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);
        assert_eq!(output.channel(0), &[2.0, 1.5, 1.0, 0.5]);
    }
}
