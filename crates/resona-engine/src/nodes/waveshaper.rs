use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::nodes::ProcessCtx;

/// Per-sample lookup on a symmetric shaping curve: input `[-1, 1]` maps
/// linearly onto the curve indices.
pub struct WaveShaperKernel {
    curve: ArcSwap<Vec<f32>>,
}

impl WaveShaperKernel {
    pub fn new() -> Self {
        let curve = (0..1024)
            .map(|i| (i as f32 / 512.0 - 1.0).tanh())
            .collect::<Vec<_>>();
        Self {
            curve: ArcSwap::from_pointee(curve),
        }
    }

    /// Installs a replacement curve; callers guarantee it is non-empty.
    pub fn set_curve(&self, curve: &[f32]) {
        self.curve.store(Arc::new(curve.to_vec()));
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let curve = self.curve.load_full();
        let last = curve.len() - 1;
        let frames = ctx.frames;
        for ch in 0..ctx.output.channel_count() {
            let input = ctx.input.channel(ch);
            let output = ctx.output.channel_mut(ch);
            for i in 0..frames {
                let position = (input[i] + 1.0) * last as f32 * 0.5;
                let index = position.clamp(0.0, last as f32) as usize;
                output[i] = curve[index];
            }
        }
    }
}
