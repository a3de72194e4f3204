use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::atomic::AtomicF64;
use crate::automation::ParamTimeline;
use crate::buffer::BlockBuffer;
use crate::error::EngineError;
use crate::graph::AudioGraph;
use crate::nodes::{
    AnalyzerKernel, AnalyzerTap, BiquadKernel, BufferSourceKernel, CompressorKernel, DelayKernel,
    GainKernel, Kernel, OscillatorKernel, PannerKernel, WaveShaperKernel, WorkletBridgeKernel,
};
use crate::registry::{NodeId, DESTINATION_ID};
use crate::ring::MultiChannelRing;

pub const STATE_SUSPENDED: u32 = 0;
pub const STATE_RUNNING: u32 = 1;
pub const STATE_CLOSED: u32 = 2;

/// Immutable engine configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub block_size: usize,
}

impl EngineConfig {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
        }
    }
}

/// One audio context: a node graph, its clock, and the control surface.
///
/// The device driver calls [`render`](Self::render) from exactly one audio
/// thread; everything else may be called from any number of control threads.
/// Structural state lives behind one graph lock that the audio thread holds
/// for the duration of a block, so control mutations must stay short. Event
/// timelines have their own per-timeline locks which the audio thread only
/// try-locks.
pub struct AudioEngine {
    config: EngineConfig,
    graph: Mutex<AudioGraph>,
    state: AtomicU32,
    engine_time: AtomicF64,
    samples_processed: AtomicU64,
}

impl AudioEngine {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        if !(config.sample_rate > 0.0) {
            anyhow::bail!(EngineError::InvalidConfig("sample rate must be positive"));
        }
        if config.block_size == 0 {
            anyhow::bail!(EngineError::InvalidConfig("block size must be positive"));
        }

        log::info!(
            "engine created: sr={} block={}",
            config.sample_rate,
            config.block_size
        );
        Ok(Self {
            graph: Mutex::new(AudioGraph::new(config.sample_rate, config.block_size)),
            config,
            state: AtomicU32::new(STATE_SUSPENDED),
            engine_time: AtomicF64::new(0.0),
            samples_processed: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Monotonic seconds since creation, advanced per rendered block.
    pub fn current_time(&self) -> f64 {
        self.engine_time.load()
    }

    pub fn state(&self) -> u32 {
        self.state.load(Ordering::Relaxed)
    }

    pub fn resume(&self) {
        self.state.store(STATE_RUNNING, Ordering::Relaxed);
    }

    pub fn suspend(&self) {
        self.state.store(STATE_SUSPENDED, Ordering::Relaxed);
    }

    /// Terminal state: the engine keeps rendering silence until dropped.
    pub fn close(&self) {
        self.state.store(STATE_CLOSED, Ordering::Relaxed);
    }

    pub fn destination_id(&self) -> NodeId {
        DESTINATION_ID
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Renders one block into `out`. Emits silence unless running.
    ///
    /// Called by the device driver at period intervals; `out` provides the
    /// block length (clamped to the configured block size).
    pub fn render(&self, out: &mut BlockBuffer) {
        if self.state() != STATE_RUNNING {
            out.clear();
            return;
        }

        let frames = out.frames().min(self.config.block_size);
        let now = self.engine_time.load();

        {
            let mut graph = self.graph.lock();
            graph.process_automation(now, frames);
            graph.process_block(frames, now);
            out.copy_from(graph.destination_output(), frames);
        }

        let total = self.samples_processed.fetch_add(frames as u64, Ordering::Relaxed)
            + frames as u64;
        self.engine_time
            .store(total as f64 / self.config.sample_rate);
    }

    // ------------------------------------------------------------------
    // Node factory
    // ------------------------------------------------------------------

    pub fn create_gain(&self) -> NodeId {
        self.add_kernel(Kernel::Gain(GainKernel::new(self.config.block_size)))
    }

    pub fn create_oscillator(&self) -> NodeId {
        self.add_kernel(Kernel::Oscillator(OscillatorKernel::new()))
    }

    pub fn create_biquad_filter(&self) -> NodeId {
        self.add_kernel(Kernel::Biquad(BiquadKernel::new(self.config.sample_rate)))
    }

    pub fn create_stereo_panner(&self) -> NodeId {
        self.add_kernel(Kernel::Panner(PannerKernel::new()))
    }

    pub fn create_delay(&self, max_delay: f32) -> NodeId {
        self.add_kernel(Kernel::Delay(DelayKernel::new(
            max_delay,
            self.config.sample_rate,
            self.config.block_size,
        )))
    }

    pub fn create_buffer_source(&self) -> NodeId {
        self.add_kernel(Kernel::BufferSource(BufferSourceKernel::new()))
    }

    pub fn create_analyzer(&self) -> NodeId {
        self.add_kernel(Kernel::Analyzer(AnalyzerKernel::new()))
    }

    pub fn create_compressor(&self) -> NodeId {
        self.add_kernel(Kernel::Compressor(CompressorKernel::new(
            self.config.sample_rate,
        )))
    }

    pub fn create_wave_shaper(&self) -> NodeId {
        self.add_kernel(Kernel::WaveShaper(WaveShaperKernel::new()))
    }

    pub fn create_worklet_bridge(&self) -> NodeId {
        self.add_kernel(Kernel::WorkletBridge(WorkletBridgeKernel::new()))
    }

    pub fn remove_node(&self, id: NodeId) {
        self.graph.lock().remove_node(id);
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.graph.lock().contains(id)
    }

    fn add_kernel(&self, kernel: Kernel) -> NodeId {
        self.graph.lock().add_kernel(kernel)
    }

    // ------------------------------------------------------------------
    // Graph
    // ------------------------------------------------------------------

    pub fn connect(&self, src: NodeId, dst: NodeId, out_ch: usize, in_ch: usize) {
        self.graph.lock().connect(src, dst, out_ch, in_ch);
    }

    pub fn disconnect(&self, src: NodeId, dst: NodeId) {
        self.graph.lock().disconnect(src, dst);
    }

    pub fn disconnect_all(&self, src: NodeId) {
        self.graph.lock().disconnect_all(src);
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Immediate scalar write; also seeds the parameter's timeline baseline
    /// so subsequent ramps anchor at this value.
    pub fn param_set(&self, node: NodeId, name: &str, value: f32) {
        let mut graph = self.graph.lock();
        if let Some(entry) = graph.entry_mut(node) {
            let timeline = entry.timeline(name);
            timeline.set_last_value(value);
            entry.set_scalar_param(name, value);
        }
    }

    pub fn param_set_at(&self, node: NodeId, name: &str, value: f32, time: f64) {
        self.param_set(node, name, value);
        if let Some(timeline) = self.timeline(node, name) {
            timeline.set_value_at(value, time);
        }
    }

    pub fn param_linear_ramp(&self, node: NodeId, name: &str, value: f32, end_time: f64) {
        if let Some(timeline) = self.timeline(node, name) {
            timeline.linear_ramp_to(value, end_time);
        }
    }

    pub fn param_exp_ramp(&self, node: NodeId, name: &str, value: f32, end_time: f64) {
        if let Some(timeline) = self.timeline(node, name) {
            timeline.exp_ramp_to(value, end_time);
        }
    }

    pub fn param_set_target(
        &self,
        node: NodeId,
        name: &str,
        target: f32,
        start_time: f64,
        time_constant: f32,
    ) {
        if let Some(timeline) = self.timeline(node, name) {
            timeline.set_target_at(target, start_time, time_constant);
        }
    }

    pub fn param_cancel(&self, node: NodeId, name: &str, cancel_time: f64) {
        if let Some(timeline) = self.timeline(node, name) {
            timeline.cancel_scheduled(cancel_time);
        }
    }

    pub fn param_cancel_and_hold(&self, node: NodeId, name: &str, cancel_time: f64) {
        if let Some(timeline) = self.timeline(node, name) {
            timeline.cancel_and_hold(cancel_time);
        }
    }

    /// Timeline handle for `(node, name)`, created on demand. Events are
    /// pushed outside the graph lock; the renderer's try-lock covers the
    /// race.
    fn timeline(&self, node: NodeId, name: &str) -> Option<Arc<ParamTimeline>> {
        let mut graph = self.graph.lock();
        graph.entry_mut(node).map(|entry| entry.timeline(name))
    }

    // ------------------------------------------------------------------
    // Kernel-specific controls
    // ------------------------------------------------------------------

    pub fn oscillator_set_type(&self, node: NodeId, wave_type: i32) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_oscillator()) {
            kernel.wave_type.store(wave_type, Ordering::Relaxed);
        }
    }

    pub fn oscillator_set_periodic_wave(&self, node: NodeId, table: &[f32]) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_oscillator()) {
            kernel.set_periodic_wave(table);
        }
    }

    pub fn oscillator_start(&self, node: NodeId, when: f64) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_oscillator()) {
            kernel.start(when);
        }
    }

    pub fn oscillator_stop(&self, node: NodeId, when: f64) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_oscillator()) {
            kernel.stop(when);
        }
    }

    pub fn filter_set_type(&self, node: NodeId, filter_type: i32) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_filter()) {
            kernel.filter_type.store(filter_type, Ordering::Relaxed);
        }
    }

    /// Installs channel-planar PCM data on a buffer source.
    pub fn buffer_source_set_buffer(
        &self,
        node: NodeId,
        data: &[f32],
        frames: usize,
        channels: usize,
        sample_rate: u32,
    ) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_buffer_source()) {
            kernel.set_buffer(data, frames, channels, sample_rate);
        }
    }

    pub fn buffer_source_start(&self, node: NodeId, when: f64) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_buffer_source()) {
            kernel.start(when);
        }
    }

    pub fn buffer_source_stop(&self, node: NodeId, when: f64) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_buffer_source()) {
            kernel.stop(when);
        }
    }

    pub fn buffer_source_set_loop(&self, node: NodeId, looping: bool) {
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_buffer_source()) {
            kernel.set_loop(looping);
        }
    }

    pub fn analyzer_set_fft_size(&self, node: NodeId, size: usize) -> Result<(), EngineError> {
        match self.analyzer_tap(node) {
            Some(tap) => tap.lock().set_fft_size(size),
            None => Ok(()),
        }
    }

    pub fn analyzer_byte_frequency_data(&self, node: NodeId, out: &mut [u8]) {
        if let Some(tap) = self.analyzer_tap(node) {
            tap.lock().byte_frequency_data(out);
        }
    }

    pub fn analyzer_byte_time_domain_data(&self, node: NodeId, out: &mut [u8]) {
        if let Some(tap) = self.analyzer_tap(node) {
            tap.lock().byte_time_domain_data(out);
        }
    }

    pub fn analyzer_float_frequency_data(&self, node: NodeId, out: &mut [f32]) {
        if let Some(tap) = self.analyzer_tap(node) {
            tap.lock().float_frequency_data(out);
        }
    }

    pub fn analyzer_float_time_domain_data(&self, node: NodeId, out: &mut [f32]) {
        if let Some(tap) = self.analyzer_tap(node) {
            tap.lock().float_time_domain_data(out);
        }
    }

    pub fn wave_shaper_set_curve(&self, node: NodeId, curve: &[f32]) -> Result<(), EngineError> {
        if curve.is_empty() {
            return Err(EngineError::EmptyCurve);
        }
        let mut graph = self.graph.lock();
        if let Some(kernel) = graph.entry_mut(node).and_then(|entry| entry.as_wave_shaper()) {
            kernel.set_curve(curve);
        }
        Ok(())
    }

    /// Ring handles of a worklet bridge:
    /// `(engine → external, external → engine)`.
    pub fn worklet_bridge_rings(
        &self,
        node: NodeId,
    ) -> Option<(Arc<MultiChannelRing>, Arc<MultiChannelRing>)> {
        let mut graph = self.graph.lock();
        graph
            .entry_mut(node)
            .and_then(|entry| entry.as_worklet_bridge())
            .map(|kernel| kernel.rings())
    }

    /// Snapshot handle shared with analyzer readers; taken under the graph
    /// lock, read outside it.
    fn analyzer_tap(&self, node: NodeId) -> Option<Arc<parking_lot::Mutex<AnalyzerTap>>> {
        let mut graph = self.graph.lock();
        graph
            .entry_mut(node)
            .and_then(|entry| entry.as_analyzer())
            .map(|kernel| kernel.tap())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        log::info!("engine dropped at t={:.3}", self.current_time());
    }
}
