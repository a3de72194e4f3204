use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use petgraph::stable_graph::NodeIndex;

use crate::automation::ParamTimeline;
use crate::buffer::BlockBuffer;
use crate::nodes::{
    AnalyzerKernel, BiquadKernel, BufferSourceKernel, CompressorKernel, DelayKernel, GainKernel,
    Kernel, OscillatorKernel, PannerKernel, WaveShaperKernel, WorkletBridgeKernel,
};

pub type NodeId = i32;

/// The destination is addressable as node 0 in every context.
pub const DESTINATION_ID: NodeId = 0;

/// Ids are allocated process-wide so a node id alone identifies its engine.
static NEXT_NODE_ID: AtomicI32 = AtomicI32::new(1);

pub fn allocate_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// One graph node: its kernel state, its output buffer for the current
/// block, and the automation timelines addressed by parameter name.
pub struct NodeEntry {
    pub kernel: Kernel,
    pub output: BlockBuffer,
    pub timelines: HashMap<String, Arc<ParamTimeline>>,
    /// Position in the connection topology.
    pub index: NodeIndex,
}

impl NodeEntry {
    pub fn new(kernel: Kernel, block_size: usize, index: NodeIndex) -> Self {
        Self {
            kernel,
            output: BlockBuffer::stereo(block_size),
            timelines: HashMap::new(),
            index,
        }
    }

    pub fn as_gain(&mut self) -> Option<&mut GainKernel> {
        match &mut self.kernel {
            Kernel::Gain(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_oscillator(&mut self) -> Option<&mut OscillatorKernel> {
        match &mut self.kernel {
            Kernel::Oscillator(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_filter(&mut self) -> Option<&mut BiquadKernel> {
        match &mut self.kernel {
            Kernel::Biquad(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_panner(&mut self) -> Option<&mut PannerKernel> {
        match &mut self.kernel {
            Kernel::Panner(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_delay(&mut self) -> Option<&mut DelayKernel> {
        match &mut self.kernel {
            Kernel::Delay(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_buffer_source(&mut self) -> Option<&mut BufferSourceKernel> {
        match &mut self.kernel {
            Kernel::BufferSource(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_analyzer(&mut self) -> Option<&mut AnalyzerKernel> {
        match &mut self.kernel {
            Kernel::Analyzer(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_compressor(&mut self) -> Option<&mut CompressorKernel> {
        match &mut self.kernel {
            Kernel::Compressor(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_wave_shaper(&mut self) -> Option<&mut WaveShaperKernel> {
        match &mut self.kernel {
            Kernel::WaveShaper(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn as_worklet_bridge(&mut self) -> Option<&mut WorkletBridgeKernel> {
        match &mut self.kernel {
            Kernel::WorkletBridge(kernel) => Some(kernel),
            _ => None,
        }
    }

    /// Current scalar value for a named parameter; unknown names read as 0.
    pub fn scalar_param(&self, name: &str) -> f32 {
        match (&self.kernel, name) {
            (Kernel::Gain(k), "gain") => k.gain.load(),
            (Kernel::Oscillator(k), "frequency") => k.frequency.load(),
            (Kernel::Oscillator(k), "detune") => k.detune.load(),
            (Kernel::Biquad(k), "frequency") => k.frequency.load(),
            (Kernel::Biquad(k), "Q") => k.q.load(),
            (Kernel::Biquad(k), "gain") => k.gain.load(),
            (Kernel::Panner(k), "pan") => k.pan.load(),
            (Kernel::Delay(k), "delayTime") => k.delay_time.load(),
            (Kernel::Delay(k), "feedback") => k.feedback.load(),
            (Kernel::BufferSource(k), "playbackRate") => k.playback_rate.load(),
            (Kernel::BufferSource(k), "detune") => k.detune.load(),
            (Kernel::BufferSource(k), "decay") => k.decay.load(),
            (Kernel::Compressor(k), "threshold") => k.threshold.load(),
            (Kernel::Compressor(k), "knee") => k.knee.load(),
            (Kernel::Compressor(k), "ratio") => k.ratio.load(),
            (Kernel::Compressor(k), "attack") => k.attack.load(),
            (Kernel::Compressor(k), "release") => k.release.load(),
            _ => 0.0,
        }
    }

    /// Writes a scalar immediately; unknown names are ignored.
    pub fn set_scalar_param(&self, name: &str, value: f32) {
        match (&self.kernel, name) {
            (Kernel::Gain(k), "gain") => k.gain.store(value),
            (Kernel::Oscillator(k), "frequency") => k.frequency.store(value),
            (Kernel::Oscillator(k), "detune") => k.detune.store(value),
            (Kernel::Biquad(k), "frequency") => k.frequency.store(value),
            (Kernel::Biquad(k), "Q") => k.q.store(value),
            (Kernel::Biquad(k), "gain") => k.gain.store(value),
            (Kernel::Panner(k), "pan") => k.pan.store(value),
            (Kernel::Delay(k), "delayTime") => k.delay_time.store(value),
            (Kernel::Delay(k), "feedback") => k.feedback.store(value),
            (Kernel::BufferSource(k), "playbackRate") => k.playback_rate.store(value),
            (Kernel::BufferSource(k), "detune") => k.detune.store(value),
            (Kernel::BufferSource(k), "decay") => k.decay.store(value),
            (Kernel::Compressor(k), "threshold") => k.threshold.store(value),
            (Kernel::Compressor(k), "knee") => k.knee.store(value),
            (Kernel::Compressor(k), "ratio") => k.ratio.store(value),
            (Kernel::Compressor(k), "attack") => k.attack.store(value),
            (Kernel::Compressor(k), "release") => k.release.store(value),
            _ => {}
        }
    }

    /// Timeline for a parameter name, created on demand and seeded with the
    /// current scalar so it holds steady until events arrive. Scheduling an
    /// unknown name still creates a timeline; no kernel reads its values.
    pub fn timeline(&mut self, name: &str) -> Arc<ParamTimeline> {
        let initial = self.scalar_param(name);
        match self.timelines.entry(name.to_owned()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(ParamTimeline::new(initial)))),
        }
    }
}

/// Id-keyed node storage shared by the graph and the control surface.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NodeEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, entry: NodeEntry) {
        self.nodes.insert(id, entry);
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeEntry> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut NodeEntry)> {
        self.nodes.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_positive() {
        let a = allocate_node_id();
        let b = allocate_node_id();
        assert!(a > DESTINATION_ID);
        assert!(b > a);
    }

    #[test]
    fn timeline_is_seeded_with_current_scalar() {
        let mut entry = NodeEntry::new(
            Kernel::Gain(GainKernel::new(64)),
            64,
            NodeIndex::new(0),
        );
        entry.set_scalar_param("gain", 0.25);
        let timeline = entry.timeline("gain");
        assert_eq!(timeline.last_value(), 0.25);
        // Repeated lookups return the same timeline.
        assert!(Arc::ptr_eq(&timeline, &entry.timeline("gain")));
    }

    #[test]
    fn unknown_parameter_names_read_zero_but_schedule() {
        let mut entry = NodeEntry::new(
            Kernel::Gain(GainKernel::new(64)),
            64,
            NodeIndex::new(0),
        );
        assert_eq!(entry.scalar_param("bogus"), 0.0);
        entry.set_scalar_param("bogus", 3.0);
        assert_eq!(entry.scalar_param("bogus"), 0.0);
        let timeline = entry.timeline("bogus");
        assert_eq!(timeline.last_value(), 0.0);
        assert_eq!(entry.timelines.len(), 1);
    }
}
