use std::sync::Arc;

use crate::buffer::CHANNELS;
use crate::nodes::ProcessCtx;
use crate::ring::MultiChannelRing;

/// Ring capacity per channel for each direction of the worklet bridge.
pub const WORKLET_RING_CAPACITY: usize = 8192;

/// Exchange point between the graph and an external processor: the node's
/// input streams out through `to_external`, and its output is fed from
/// `from_external`. Both rings are exposed to the host so the external side
/// can produce and consume without copies through the engine.
pub struct WorkletBridgeKernel {
    to_external: Arc<MultiChannelRing>,
    from_external: Arc<MultiChannelRing>,
}

impl WorkletBridgeKernel {
    pub fn new() -> Self {
        Self {
            to_external: Arc::new(MultiChannelRing::new(CHANNELS, WORKLET_RING_CAPACITY)),
            from_external: Arc::new(MultiChannelRing::new(CHANNELS, WORKLET_RING_CAPACITY)),
        }
    }

    /// Handles for the external side: `(engine → external, external → engine)`.
    pub fn rings(&self) -> (Arc<MultiChannelRing>, Arc<MultiChannelRing>) {
        (Arc::clone(&self.to_external), Arc::clone(&self.from_external))
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        for ch in 0..ctx.output.channel_count().min(CHANNELS) {
            if let Some(ring) = self.to_external.channel(ch) {
                ring.write(&ctx.input.channel(ch)[..frames]);
            }
        }
        ctx.output.clear();
        for ch in 0..ctx.output.channel_count().min(CHANNELS) {
            if let Some(ring) = self.from_external.channel(ch) {
                ring.read(&mut ctx.output.channel_mut(ch)[..frames]);
            }
        }
    }
}
