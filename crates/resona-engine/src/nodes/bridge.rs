use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BlockBuffer;
use crate::nodes::ProcessCtx;

/// Shared storage for one feedback bridge. Both endpoints run on the audio
/// thread within the same block, so the lock is never contended; it exists to
/// give the pair shared mutable ownership.
pub type BridgeBuffer = Arc<Mutex<BlockBuffer>>;

/// Sink half of a feedback bridge: copies its input into the shared buffer
/// and produces no output of its own.
pub struct BridgeTxKernel {
    buffer: BridgeBuffer,
}

impl BridgeTxKernel {
    pub fn new(buffer: BridgeBuffer) -> Self {
        Self { buffer }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        self.buffer.lock().copy_from(ctx.input, frames);
        ctx.output.clear();
    }
}

/// Source half of a feedback bridge: emits whatever the sender stored in the
/// previous block. The schedule places receivers before senders, which is
/// what realizes the one-block delay.
pub struct BridgeRxKernel {
    buffer: BridgeBuffer,
}

impl BridgeRxKernel {
    pub fn new(buffer: BridgeBuffer) -> Self {
        Self { buffer }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let frames = ctx.frames;
        ctx.output.copy_from(&self.buffer.lock(), frames);
    }
}
