use resona_dsp::pan::constant_power;

use crate::atomic::AtomicF32;
use crate::nodes::ProcessCtx;

/// Equal-power stereo panner. The pan position ramps linearly across each
/// block from the previous block's final position, so stepwise parameter
/// writes stay click-free.
pub struct PannerKernel {
    pub pan: AtomicF32,
    last_pan: f32,
}

impl PannerKernel {
    pub fn new() -> Self {
        Self {
            pan: AtomicF32::new(0.0),
            last_pan: 0.0,
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        if ctx.output.channel_count() < 2 || frames == 0 {
            ctx.output.copy_from(ctx.input, frames);
            return;
        }

        let target = self.pan.load().clamp(-1.0, 1.0);
        let step = (target - self.last_pan) / frames as f32;
        let mut current = self.last_pan;

        let input_left = ctx.input.channel(0);
        let input_right = ctx.input.channel(1);
        let (left, right) = ctx.output.stereo_mut();
        for i in 0..frames {
            let (gain_left, gain_right) = constant_power(current);
            left[i] = input_left[i] * gain_left;
            right[i] = input_right[i] * gain_right;
            current += step;
        }
        self.last_pan = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BlockBuffer;
    use std::f32::consts::FRAC_PI_4;

    fn run(kernel: &mut PannerKernel, frames: usize) -> BlockBuffer {
        let mut input = BlockBuffer::stereo(frames);
        input.channel_mut(0).fill(1.0);
        input.channel_mut(1).fill(1.0);
        let mut output = BlockBuffer::stereo(frames);
        let mut ctx = ProcessCtx {
            input: &input,
            output: &mut output,
            frames,
            engine_time: 0.0,
            sample_rate: 48_000.0,
        };
        kernel.process(&mut ctx);
        output
    }

    #[test]
    fn center_scales_both_sides_equally() {
        let mut kernel = PannerKernel::new();
        let out = run(&mut kernel, 16);
        let expected = FRAC_PI_4.cos();
        for i in 0..16 {
            assert!((out.channel(0)[i] - expected).abs() < 1e-6);
            assert!((out.channel(1)[i] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn hard_left_mutes_right_after_ramp() {
        let mut kernel = PannerKernel::new();
        kernel.pan.store(-1.0);
        let _ = run(&mut kernel, 64);
        // Second block starts from the settled position.
        let out = run(&mut kernel, 64);
        assert!((out.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!(out.channel(1)[0].abs() < 1e-6);
    }

    #[test]
    fn pan_moves_gradually_within_a_block() {
        let mut kernel = PannerKernel::new();
        kernel.pan.store(1.0);
        let out = run(&mut kernel, 64);
        // First sample still near center, last sample near hard right.
        assert!((out.channel(0)[0] - FRAC_PI_4.cos()).abs() < 0.05);
        assert!(out.channel(0)[63] < 0.1);
    }
}
