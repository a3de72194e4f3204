//! Resona Engine
//! =================
//! Realtime audio node-graph engine in the Web Audio mold: clients build a
//! directed graph of DSP nodes terminated at a destination, schedule
//! time-stamped parameter automation, and drive the whole thing from a
//! device callback that pulls one block at a time. Cycles are legal and are
//! realized through one-block feedback bridges; automation is evaluated with
//! sample accuracy on the paths where it matters.

pub mod atomic;
pub mod automation;
pub mod buffer;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod registry;
pub mod ring;

pub use automation::{AutomationEvent, EventKind, ParamTimeline};
pub use buffer::{BlockBuffer, CHANNELS};
pub use engine::{AudioEngine, EngineConfig, STATE_CLOSED, STATE_RUNNING, STATE_SUSPENDED};
pub use error::EngineError;
pub use registry::{NodeId, DESTINATION_ID};
pub use ring::{MultiChannelRing, RingRawParts, SpscRing};

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48_000.0;
    const BLOCK: usize = 128;

    fn running_engine() -> AudioEngine {
        let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");
        engine.resume();
        engine
    }

    #[test]
    fn renders_silence_unless_running() {
        let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");
        let osc = engine.create_oscillator();
        engine.oscillator_start(osc, 0.0);
        engine.connect(osc, DESTINATION_ID, 0, 0);

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        assert!(out.channel(0).iter().all(|v| *v == 0.0));
        // Time does not advance while suspended.
        assert_eq!(engine.current_time(), 0.0);

        engine.close();
        engine.render(&mut out);
        assert!(out.channel(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn oscillator_reaches_the_destination() {
        let engine = running_engine();
        let osc = engine.create_oscillator();
        engine.oscillator_start(osc, 0.0);
        engine.connect(osc, DESTINATION_ID, 0, 0);

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        assert!(out.channel(0).iter().any(|v| v.abs() > 0.1));
        assert!(out.channel(1).iter().any(|v| v.abs() > 0.1));
    }

    #[test]
    fn engine_time_advances_per_block() {
        let engine = running_engine();
        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        engine.render(&mut out);
        let expected = 2.0 * BLOCK as f64 / SR;
        assert!((engine.current_time() - expected).abs() < 1e-12);
    }

    #[test]
    fn gain_scales_between_nodes() {
        let engine = running_engine();
        let osc = engine.create_oscillator();
        engine.oscillator_set_type(osc, 1);
        engine.oscillator_start(osc, 0.0);
        let gain = engine.create_gain();
        engine.param_set(gain, "gain", 0.25);
        engine.connect(osc, gain, 0, 0);
        engine.connect(gain, DESTINATION_ID, 0, 0);

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        assert!(out.channel(0).iter().all(|v| v.abs() <= 0.25 + 1e-6));
        assert!(out.channel(0).iter().any(|v| (v.abs() - 0.25).abs() < 1e-6));
    }

    #[test]
    fn fan_in_sums_at_the_destination() {
        let engine = running_engine();
        for _ in 0..2 {
            let osc = engine.create_oscillator();
            engine.oscillator_set_type(osc, 1);
            engine.oscillator_start(osc, 0.0);
            engine.connect(osc, DESTINATION_ID, 0, 0);
        }

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        // Two phase-locked square waves sum to ±2.
        assert!(out.channel(0).iter().any(|v| (v.abs() - 2.0).abs() < 1e-6));
    }

    #[test]
    fn removed_node_goes_quiet() {
        let engine = running_engine();
        let osc = engine.create_oscillator();
        engine.oscillator_start(osc, 0.0);
        engine.connect(osc, DESTINATION_ID, 0, 0);

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        assert!(out.channel(0).iter().any(|v| v.abs() > 0.1));

        engine.remove_node(osc);
        engine.render(&mut out);
        assert!(out.channel(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn worklet_bridge_injects_external_audio() {
        let engine = running_engine();
        let bridge = engine.create_worklet_bridge();
        engine.connect(bridge, DESTINATION_ID, 0, 0);
        let (_to, from) = engine.worklet_bridge_rings(bridge).expect("rings");

        let samples: Vec<f32> = (0..BLOCK).map(|i| i as f32 / BLOCK as f32).collect();
        from.channel(0).expect("channel").write(&samples);

        let mut out = BlockBuffer::stereo(BLOCK);
        engine.render(&mut out);
        assert_eq!(out.channel(0), samples.as_slice());
    }
}
