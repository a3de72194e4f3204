/// Channel count rendered by the engine. Node ports address channels below
/// this limit; wider material is truncated at the edges of the graph.
pub const CHANNELS: usize = 2;

/// Non-interleaved audio buffer used for node inputs and outputs.
#[derive(Debug, Clone)]
pub struct BlockBuffer {
    channels: Vec<Vec<f32>>,
}

impl BlockBuffer {
    pub fn new(num_channels: usize, frames: usize) -> Self {
        let channels = (0..num_channels).map(|_| vec![0.0; frames]).collect();
        Self { channels }
    }

    pub fn stereo(frames: usize) -> Self {
        Self::new(CHANNELS, frames)
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn frames(&self) -> usize {
        self.channels
            .first()
            .map(|channel| channel.len())
            .unwrap_or_default()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Mutable left/right pair for stereo kernels.
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let (left, rest) = self.channels.split_at_mut(1);
        (left[0].as_mut_slice(), rest[0].as_mut_slice())
    }

    pub fn channels(&self) -> impl Iterator<Item = &Vec<f32>> {
        self.channels.iter()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Vec<f32>> {
        self.channels.iter_mut()
    }

    /// Adds `frames` samples of `src`'s channel into one of ours.
    pub fn mix_from(&mut self, dst_channel: usize, src: &BlockBuffer, src_channel: usize, frames: usize) {
        if dst_channel >= self.channels.len() || src_channel >= src.channels.len() {
            return;
        }
        let dst = &mut self.channels[dst_channel];
        let src = &src.channels[src_channel];
        for (d, s) in dst.iter_mut().zip(src.iter()).take(frames) {
            *d += *s;
        }
    }

    /// Overwrites the first `frames` samples of every channel from `src`,
    /// zero-filling channels `src` does not have.
    pub fn copy_from(&mut self, src: &BlockBuffer, frames: usize) {
        for (index, dst) in self.channels.iter_mut().enumerate() {
            if index < src.channels.len() {
                let src = &src.channels[index];
                for (d, s) in dst.iter_mut().zip(src.iter()).take(frames) {
                    *d = *s;
                }
            } else {
                for d in dst.iter_mut().take(frames) {
                    *d = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_sums_into_destination() {
        let mut dst = BlockBuffer::stereo(4);
        let mut src = BlockBuffer::stereo(4);
        src.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        dst.mix_from(0, &src, 0, 4);
        dst.mix_from(0, &src, 0, 2);
        assert_eq!(dst.channel(0), &[2.0, 4.0, 3.0, 4.0]);
        assert_eq!(dst.channel(1), &[0.0; 4]);
    }

    #[test]
    fn copy_zero_fills_missing_channels() {
        let mut dst = BlockBuffer::stereo(2);
        dst.channel_mut(1).fill(5.0);
        let src = BlockBuffer::new(1, 2);
        dst.copy_from(&src, 2);
        assert_eq!(dst.channel(1), &[0.0, 0.0]);
    }
}
