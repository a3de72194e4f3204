mod analyzer;
mod bridge;
mod buffer_source;
mod compressor;
mod delay;
mod filter;
mod gain;
mod oscillator;
mod panner;
mod waveshaper;
mod worklet;

pub use analyzer::{AnalyzerKernel, AnalyzerTap};
pub use bridge::{BridgeRxKernel, BridgeTxKernel};
pub use buffer_source::{BufferSourceKernel, SampleBuffer};
pub use compressor::CompressorKernel;
pub use delay::DelayKernel;
pub use filter::BiquadKernel;
pub use gain::GainKernel;
pub use oscillator::OscillatorKernel;
pub use panner::PannerKernel;
pub use waveshaper::WaveShaperKernel;
pub use worklet::{WorkletBridgeKernel, WORKLET_RING_CAPACITY};

use crate::buffer::BlockBuffer;

/// Per-block processing context handed to every kernel: the summed input,
/// the node's own output buffer, and the engine clock at block start.
pub struct ProcessCtx<'a> {
    pub input: &'a BlockBuffer,
    pub output: &'a mut BlockBuffer,
    pub frames: usize,
    pub engine_time: f64,
    pub sample_rate: f64,
}

/// Kind-tagged kernel state. Parameter routing and typed access go through a
/// `match` on this tag instead of downcasting.
pub enum Kernel {
    /// Sink whose input becomes the device output.
    Destination,
    /// Source standing in for the hardware input; renders silence here, the
    /// device driver owns real capture.
    HardwareInput,
    Gain(GainKernel),
    Oscillator(OscillatorKernel),
    Biquad(BiquadKernel),
    Panner(PannerKernel),
    Delay(DelayKernel),
    BufferSource(BufferSourceKernel),
    Analyzer(AnalyzerKernel),
    Compressor(CompressorKernel),
    WaveShaper(WaveShaperKernel),
    BridgeTx(BridgeTxKernel),
    BridgeRx(BridgeRxKernel),
    WorkletBridge(WorkletBridgeKernel),
}

impl Kernel {
    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        match self {
            Kernel::Destination => {
                let frames = ctx.frames;
                ctx.output.copy_from(ctx.input, frames);
            }
            Kernel::HardwareInput => ctx.output.clear(),
            Kernel::Gain(kernel) => kernel.process(ctx),
            Kernel::Oscillator(kernel) => kernel.process(ctx),
            Kernel::Biquad(kernel) => kernel.process(ctx),
            Kernel::Panner(kernel) => kernel.process(ctx),
            Kernel::Delay(kernel) => kernel.process(ctx),
            Kernel::BufferSource(kernel) => kernel.process(ctx),
            Kernel::Analyzer(kernel) => kernel.process(ctx),
            Kernel::Compressor(kernel) => kernel.process(ctx),
            Kernel::WaveShaper(kernel) => kernel.process(ctx),
            Kernel::BridgeTx(kernel) => kernel.process(ctx),
            Kernel::BridgeRx(kernel) => kernel.process(ctx),
            Kernel::WorkletBridge(kernel) => kernel.process(ctx),
        }
    }
}
