use std::sync::Arc;

use parking_lot::Mutex;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::buffer::{BlockBuffer, CHANNELS};
use crate::nodes::{BridgeRxKernel, BridgeTxKernel, Kernel, ProcessCtx};
use crate::registry::{allocate_node_id, NodeEntry, NodeId, NodeRegistry, DESTINATION_ID};

/// Channel ports carried by one connection edge.
#[derive(Debug, Clone, Copy)]
struct EdgePorts {
    src_ch: usize,
    dst_ch: usize,
}

/// Bookkeeping for one cycle-breaking sender/receiver pair.
struct FeedbackBridge {
    src: NodeId,
    dst: NodeId,
    sender: NodeId,
    receiver: NodeId,
}

/// Connection topology plus the node registry it routes between.
///
/// The graph stays acyclic by construction: a connect that would close a
/// cycle is realized as a bridge pair instead (the sender is a sink and the
/// receiver a source, so neither edge can close a cycle). The execution
/// order is a cached topological sort, recomputed lazily after mutations.
pub struct AudioGraph {
    registry: NodeRegistry,
    topology: StableDiGraph<NodeId, EdgePorts>,
    bridges: Vec<FeedbackBridge>,
    schedule: Vec<NodeId>,
    schedule_dirty: bool,
    scratch: BlockBuffer,
    input_id: NodeId,
    sample_rate: f64,
    block_size: usize,
}

impl AudioGraph {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        let mut graph = Self {
            registry: NodeRegistry::new(),
            topology: StableDiGraph::new(),
            bridges: Vec::new(),
            schedule: Vec::new(),
            schedule_dirty: true,
            scratch: BlockBuffer::stereo(block_size),
            input_id: 0,
            sample_rate,
            block_size,
        };

        let destination_index = graph.topology.add_node(DESTINATION_ID);
        graph.registry.insert(
            DESTINATION_ID,
            NodeEntry::new(Kernel::Destination, block_size, destination_index),
        );

        let input_id = allocate_node_id();
        let input_index = graph.topology.add_node(input_id);
        graph.registry.insert(
            input_id,
            NodeEntry::new(Kernel::HardwareInput, block_size, input_index),
        );
        graph.input_id = input_id;
        graph
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Adds a kernel as a new node and returns its id.
    pub fn add_kernel(&mut self, kernel: Kernel) -> NodeId {
        let id = allocate_node_id();
        let index = self.topology.add_node(id);
        self.registry
            .insert(id, NodeEntry::new(kernel, self.block_size, index));
        self.schedule_dirty = true;
        id
    }

    pub fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.registry.get(id)
    }

    pub fn entry_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.registry.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.registry.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Connects `src:out_ch → dst:in_ch`, summing with existing edges into
    /// the same port. Id 0 aliases the hardware input when used as a source
    /// and the destination when used as a target. A cycle-closing request is
    /// realized through a feedback bridge instead of being rejected. After a
    /// `(0, 0)` request the mirrored `(1, 1)` edge is attempted as implicit
    /// stereo linking; its failure is ignored.
    pub fn connect(&mut self, src: NodeId, dst: NodeId, out_ch: usize, in_ch: usize) {
        let src = self.resolve_source(src);
        if !self.registry.contains(src) || !self.registry.contains(dst) {
            return;
        }
        if out_ch >= CHANNELS || in_ch >= CHANNELS {
            return;
        }

        self.attempt_connect(src, dst, out_ch, in_ch);
        if out_ch == 0 && in_ch == 0 {
            self.attempt_connect(src, dst, 1, 1);
        }
    }

    /// Removes every edge between `src` and `dst`, plus any feedback bridge
    /// realizing such an edge.
    pub fn disconnect(&mut self, src: NodeId, dst: NodeId) {
        let src = self.resolve_source(src);
        let (Some(src_index), Some(dst_index)) = (self.index_of(src), self.index_of(dst)) else {
            return;
        };

        let edges: Vec<_> = self
            .topology
            .edges_connecting(src_index, dst_index)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.topology.remove_edge(edge);
        }

        self.remove_bridges_matching(|bridge| bridge.src == src && bridge.dst == dst);
        self.schedule_dirty = true;
    }

    /// Removes every outgoing edge and bridge originating at `src`.
    pub fn disconnect_all(&mut self, src: NodeId) {
        let src = self.resolve_source(src);
        let Some(src_index) = self.index_of(src) else {
            return;
        };

        let edges: Vec<_> = self
            .topology
            .edges_directed(src_index, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.topology.remove_edge(edge);
        }

        self.remove_bridges_matching(|bridge| bridge.src == src);
        self.schedule_dirty = true;
    }

    /// Removes a node together with its edges and any bridge that references
    /// it. The destination and the hardware input are not removable.
    pub fn remove_node(&mut self, id: NodeId) {
        if id == DESTINATION_ID || id == self.input_id {
            return;
        }
        let Some(entry) = self.registry.remove(id) else {
            return;
        };
        self.topology.remove_node(entry.index);
        self.remove_bridges_matching(|bridge| bridge.src == id || bridge.dst == id);
        self.schedule_dirty = true;
    }

    /// Runs the automation pass for every node's timelines: scalars get their
    /// end-of-block value written back, while gain and delay-time additionally
    /// receive per-sample arrays and have their automated flag raised.
    pub fn process_automation(&mut self, start_time: f64, frames: usize) {
        let sample_rate = self.sample_rate;
        for (_, entry) in self.registry.iter_mut() {
            match &mut entry.kernel {
                Kernel::Gain(kernel) => kernel.automated = false,
                Kernel::Delay(kernel) => kernel.automated = false,
                _ => {}
            }

            let NodeEntry {
                kernel, timelines, ..
            } = entry;
            for (name, timeline) in timelines.iter() {
                match (&mut *kernel, name.as_str()) {
                    (Kernel::Gain(k), "gain") => {
                        k.block_gains[..frames].fill(k.gain.load());
                        let end = timeline.process_block(
                            start_time,
                            sample_rate,
                            frames,
                            Some(&mut k.block_gains[..frames]),
                        );
                        k.gain.store(end);
                        k.automated = true;
                    }
                    (Kernel::Delay(k), "delayTime") => {
                        k.block_delays[..frames].fill(k.delay_time.load());
                        let end = timeline.process_block(
                            start_time,
                            sample_rate,
                            frames,
                            Some(&mut k.block_delays[..frames]),
                        );
                        k.delay_time.store(end);
                        k.automated = true;
                    }
                    (Kernel::Delay(k), "feedback") => {
                        k.feedback
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Oscillator(k), "frequency") => {
                        k.frequency
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Oscillator(k), "detune") => {
                        k.detune
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Biquad(k), "frequency") => {
                        k.frequency
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Biquad(k), "Q") => {
                        k.q.store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Biquad(k), "gain") => {
                        k.gain
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Panner(k), "pan") => {
                        k.pan
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::BufferSource(k), "playbackRate") => {
                        k.playback_rate
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::BufferSource(k), "detune") => {
                        k.detune
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::BufferSource(k), "decay") => {
                        k.decay
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Compressor(k), "threshold") => {
                        k.threshold
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Compressor(k), "knee") => {
                        k.knee
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Compressor(k), "ratio") => {
                        k.ratio
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Compressor(k), "attack") => {
                        k.attack
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    (Kernel::Compressor(k), "release") => {
                        k.release
                            .store(timeline.process_block(start_time, sample_rate, frames, None));
                    }
                    _ => {
                        // Unknown pairings still advance so last_value tracks
                        // the schedule.
                        timeline.process_block(start_time, sample_rate, frames, None);
                    }
                }
            }
        }
    }

    /// Executes one block: walks the cached order, sums each node's inputs
    /// into the scratch buffer, and runs the kernel into the node's output.
    pub fn process_block(&mut self, frames: usize, engine_time: f64) {
        self.refresh_schedule();
        let frames = frames.min(self.block_size);

        for position in 0..self.schedule.len() {
            let id = self.schedule[position];
            let Some(index) = self.registry.get(id).map(|entry| entry.index) else {
                continue;
            };

            self.scratch.clear();
            for edge in self.topology.edges_directed(index, Direction::Incoming) {
                let src_id = self.topology[edge.source()];
                let ports = *edge.weight();
                if let Some(src) = self.registry.get(src_id) {
                    self.scratch
                        .mix_from(ports.dst_ch, &src.output, ports.src_ch, frames);
                }
            }

            let Some(entry) = self.registry.get_mut(id) else {
                continue;
            };
            let NodeEntry { kernel, output, .. } = entry;
            let mut ctx = ProcessCtx {
                input: &self.scratch,
                output,
                frames,
                engine_time,
                sample_rate: self.sample_rate,
            };
            kernel.process(&mut ctx);
        }
    }

    /// Output of the destination node for the current block.
    pub fn destination_output(&self) -> &BlockBuffer {
        &self.registry.get(DESTINATION_ID).expect("destination").output
    }

    fn resolve_source(&self, id: NodeId) -> NodeId {
        if id == DESTINATION_ID {
            self.input_id
        } else {
            id
        }
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.registry.get(id).map(|entry| entry.index)
    }

    fn attempt_connect(&mut self, src: NodeId, dst: NodeId, out_ch: usize, in_ch: usize) -> bool {
        let (Some(src_index), Some(dst_index)) = (self.index_of(src), self.index_of(dst)) else {
            return false;
        };

        if !has_path_connecting(&self.topology, dst_index, src_index, None) {
            self.topology
                .add_edge(src_index, dst_index, EdgePorts { src_ch: out_ch, dst_ch: in_ch });
            self.schedule_dirty = true;
            return true;
        }

        // The direct edge would close a cycle; realize it as a one-block
        // feedback bridge instead.
        log::warn!(
            "connect {src}:{out_ch} -> {dst}:{in_ch} closes a cycle; inserting feedback bridge"
        );

        let shared = Arc::new(Mutex::new(BlockBuffer::stereo(self.block_size)));
        let sender = self.add_kernel(Kernel::BridgeTx(BridgeTxKernel::new(Arc::clone(&shared))));
        let receiver = self.add_kernel(Kernel::BridgeRx(BridgeRxKernel::new(shared)));
        let (Some(sender_index), Some(receiver_index)) =
            (self.index_of(sender), self.index_of(receiver))
        else {
            return false;
        };

        self.topology.add_edge(
            src_index,
            sender_index,
            EdgePorts { src_ch: out_ch, dst_ch: out_ch % CHANNELS },
        );
        self.topology.add_edge(
            receiver_index,
            dst_index,
            EdgePorts { src_ch: in_ch % CHANNELS, dst_ch: in_ch },
        );
        self.bridges.push(FeedbackBridge {
            src,
            dst,
            sender,
            receiver,
        });
        self.schedule_dirty = true;
        true
    }

    fn remove_bridges_matching(&mut self, predicate: impl Fn(&FeedbackBridge) -> bool) {
        let mut index = 0;
        while index < self.bridges.len() {
            if predicate(&self.bridges[index]) {
                let bridge = self.bridges.swap_remove(index);
                for endpoint in [bridge.sender, bridge.receiver] {
                    if let Some(entry) = self.registry.remove(endpoint) {
                        self.topology.remove_node(entry.index);
                    }
                }
                self.schedule_dirty = true;
            } else {
                index += 1;
            }
        }
    }

    fn refresh_schedule(&mut self) {
        if !self.schedule_dirty {
            return;
        }
        match toposort(&self.topology, None) {
            Ok(order) => {
                self.schedule.clear();
                self.schedule
                    .extend(order.into_iter().map(|index| self.topology[index]));
            }
            Err(_) => {
                // Bridges cut every cycle at insertion, so this indicates a
                // bookkeeping bug; keep the previous order rather than stop.
                log::error!("topology unexpectedly cyclic; keeping previous schedule");
            }
        }
        self.schedule_dirty = false;
    }
}
