//! Process-wide context store and the flat control surface the export layer
//! wraps. Contexts are engines addressed by integer id; node-scoped calls
//! resolve their engine through the node id alone, which stays unambiguous
//! because node ids are allocated process-wide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::engine::{AudioEngine, EngineConfig, STATE_CLOSED};
use crate::error::EngineError;
use crate::registry::{NodeId, DESTINATION_ID};

pub type ContextId = i32;

static CONTEXTS: Lazy<Mutex<HashMap<ContextId, Arc<AudioEngine>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_CONTEXT_ID: AtomicI32 = AtomicI32::new(1);

/// Creates an engine and registers it in the process-wide store.
pub fn create_context(sample_rate: f64, block_size: usize) -> anyhow::Result<ContextId> {
    let engine = Arc::new(AudioEngine::new(EngineConfig::new(sample_rate, block_size))?);
    let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
    CONTEXTS.lock().insert(id, engine);
    Ok(id)
}

/// Drops the store's reference; the engine is freed once outstanding handles
/// (including a driver mid-render) release theirs.
pub fn destroy_context(id: ContextId) {
    CONTEXTS.lock().remove(&id);
}

pub fn context(id: ContextId) -> Option<Arc<AudioEngine>> {
    CONTEXTS.lock().get(&id).cloned()
}

/// Engine owning `node`, if any context contains it.
pub fn engine_for_node(node: NodeId) -> Option<Arc<AudioEngine>> {
    let contexts = CONTEXTS.lock();
    contexts
        .values()
        .find(|engine| engine.has_node(node))
        .cloned()
}

pub fn resume(id: ContextId) {
    if let Some(engine) = context(id) {
        engine.resume();
    }
}

pub fn suspend(id: ContextId) {
    if let Some(engine) = context(id) {
        engine.suspend();
    }
}

pub fn close(id: ContextId) {
    if let Some(engine) = context(id) {
        engine.close();
    }
}

/// 0 = suspended, 1 = running, 2 = closed; unknown contexts read closed.
pub fn state(id: ContextId) -> u32 {
    context(id).map(|engine| engine.state()).unwrap_or(STATE_CLOSED)
}

pub fn current_time(id: ContextId) -> f64 {
    context(id).map(|engine| engine.current_time()).unwrap_or(0.0)
}

pub fn sample_rate(id: ContextId) -> f64 {
    context(id)
        .map(|engine| engine.sample_rate())
        .unwrap_or(44_100.0)
}

pub fn destination_id(_id: ContextId) -> NodeId {
    DESTINATION_ID
}

// ----------------------------------------------------------------------
// Node factory (−1 signals failure to id-based callers)
// ----------------------------------------------------------------------

pub fn create_gain(ctx: ContextId) -> NodeId {
    context(ctx).map(|engine| engine.create_gain()).unwrap_or(-1)
}

pub fn create_oscillator(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_oscillator())
        .unwrap_or(-1)
}

pub fn create_biquad_filter(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_biquad_filter())
        .unwrap_or(-1)
}

pub fn create_stereo_panner(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_stereo_panner())
        .unwrap_or(-1)
}

pub fn create_delay(ctx: ContextId, max_delay: f32) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_delay(max_delay))
        .unwrap_or(-1)
}

pub fn create_buffer_source(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_buffer_source())
        .unwrap_or(-1)
}

pub fn create_analyzer(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_analyzer())
        .unwrap_or(-1)
}

pub fn create_compressor(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_compressor())
        .unwrap_or(-1)
}

pub fn create_wave_shaper(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_wave_shaper())
        .unwrap_or(-1)
}

pub fn create_worklet_bridge(ctx: ContextId) -> NodeId {
    context(ctx)
        .map(|engine| engine.create_worklet_bridge())
        .unwrap_or(-1)
}

pub fn remove_node(ctx: ContextId, node: NodeId) {
    if let Some(engine) = context(ctx) {
        engine.remove_node(node);
    }
}

// ----------------------------------------------------------------------
// Graph
// ----------------------------------------------------------------------

pub fn connect(ctx: ContextId, src: NodeId, dst: NodeId, out_ch: usize, in_ch: usize) {
    if let Some(engine) = context(ctx) {
        engine.connect(src, dst, out_ch, in_ch);
    }
}

pub fn disconnect(ctx: ContextId, src: NodeId, dst: NodeId) {
    if let Some(engine) = context(ctx) {
        engine.disconnect(src, dst);
    }
}

pub fn disconnect_all(ctx: ContextId, src: NodeId) {
    if let Some(engine) = context(ctx) {
        engine.disconnect_all(src);
    }
}

// ----------------------------------------------------------------------
// Parameters (addressed by node id alone)
// ----------------------------------------------------------------------

pub fn param_set(node: NodeId, name: &str, value: f32) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_set(node, name, value);
    }
}

pub fn param_set_at(node: NodeId, name: &str, value: f32, time: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_set_at(node, name, value, time);
    }
}

pub fn param_linear_ramp(node: NodeId, name: &str, value: f32, end_time: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_linear_ramp(node, name, value, end_time);
    }
}

pub fn param_exp_ramp(node: NodeId, name: &str, value: f32, end_time: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_exp_ramp(node, name, value, end_time);
    }
}

pub fn param_set_target(node: NodeId, name: &str, target: f32, start_time: f64, time_constant: f32) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_set_target(node, name, target, start_time, time_constant);
    }
}

pub fn param_cancel(node: NodeId, name: &str, cancel_time: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_cancel(node, name, cancel_time);
    }
}

pub fn param_cancel_and_hold(node: NodeId, name: &str, cancel_time: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.param_cancel_and_hold(node, name, cancel_time);
    }
}

// ----------------------------------------------------------------------
// Kernel-specific controls
// ----------------------------------------------------------------------

pub fn oscillator_set_type(node: NodeId, wave_type: i32) {
    if let Some(engine) = engine_for_node(node) {
        engine.oscillator_set_type(node, wave_type);
    }
}

pub fn oscillator_set_periodic_wave(node: NodeId, table: &[f32]) {
    if let Some(engine) = engine_for_node(node) {
        engine.oscillator_set_periodic_wave(node, table);
    }
}

pub fn oscillator_start(node: NodeId, when: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.oscillator_start(node, when);
    }
}

pub fn oscillator_stop(node: NodeId, when: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.oscillator_stop(node, when);
    }
}

pub fn filter_set_type(node: NodeId, filter_type: i32) {
    if let Some(engine) = engine_for_node(node) {
        engine.filter_set_type(node, filter_type);
    }
}

pub fn buffer_source_set_buffer(
    node: NodeId,
    data: &[f32],
    frames: usize,
    channels: usize,
    sample_rate: u32,
) {
    if let Some(engine) = engine_for_node(node) {
        engine.buffer_source_set_buffer(node, data, frames, channels, sample_rate);
    }
}

pub fn buffer_source_start(node: NodeId, when: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.buffer_source_start(node, when);
    }
}

pub fn buffer_source_stop(node: NodeId, when: f64) {
    if let Some(engine) = engine_for_node(node) {
        engine.buffer_source_stop(node, when);
    }
}

pub fn buffer_source_set_loop(node: NodeId, looping: bool) {
    if let Some(engine) = engine_for_node(node) {
        engine.buffer_source_set_loop(node, looping);
    }
}

pub fn analyzer_set_fft_size(node: NodeId, size: usize) -> Result<(), EngineError> {
    match engine_for_node(node) {
        Some(engine) => engine.analyzer_set_fft_size(node, size),
        None => Ok(()),
    }
}

pub fn analyzer_byte_frequency_data(node: NodeId, out: &mut [u8]) {
    if let Some(engine) = engine_for_node(node) {
        engine.analyzer_byte_frequency_data(node, out);
    }
}

pub fn analyzer_byte_time_domain_data(node: NodeId, out: &mut [u8]) {
    if let Some(engine) = engine_for_node(node) {
        engine.analyzer_byte_time_domain_data(node, out);
    }
}

pub fn analyzer_float_frequency_data(node: NodeId, out: &mut [f32]) {
    if let Some(engine) = engine_for_node(node) {
        engine.analyzer_float_frequency_data(node, out);
    }
}

pub fn analyzer_float_time_domain_data(node: NodeId, out: &mut [f32]) {
    if let Some(engine) = engine_for_node(node) {
        engine.analyzer_float_time_domain_data(node, out);
    }
}

pub fn wave_shaper_set_curve(node: NodeId, curve: &[f32]) -> Result<(), EngineError> {
    match engine_for_node(node) {
        Some(engine) => engine.wave_shaper_set_curve(node, curve),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trip() {
        let ctx = create_context(48_000.0, 128).unwrap();
        assert_eq!(state(ctx), 0);
        resume(ctx);
        assert_eq!(state(ctx), 1);
        suspend(ctx);
        assert_eq!(state(ctx), 0);
        close(ctx);
        assert_eq!(state(ctx), 2);
        assert_eq!(destination_id(ctx), 0);
        destroy_context(ctx);
        assert_eq!(state(ctx), 2);
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(create_context(0.0, 128).is_err());
        assert!(create_context(48_000.0, 0).is_err());
    }

    #[test]
    fn node_calls_resolve_their_context() {
        let a = create_context(48_000.0, 128).unwrap();
        let b = create_context(44_100.0, 64).unwrap();
        let gain_a = create_gain(a);
        let gain_b = create_gain(b);
        assert!(gain_a > 0 && gain_b > 0 && gain_a != gain_b);

        param_set(gain_b, "gain", 0.5);
        let engine = engine_for_node(gain_b).unwrap();
        assert_eq!(engine.sample_rate(), 44_100.0);

        destroy_context(a);
        destroy_context(b);
        assert!(engine_for_node(gain_a).is_none());
    }

    #[test]
    fn unknown_context_defaults() {
        assert_eq!(create_gain(-5), -1);
        assert_eq!(sample_rate(-5), 44_100.0);
        assert_eq!(current_time(-5), 0.0);
    }
}
