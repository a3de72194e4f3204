use resona_dsp::gain::{db_to_linear, linear_to_db};
use resona_dsp::EnvelopeFollower;

use crate::atomic::AtomicF32;
use crate::buffer::CHANNELS;
use crate::nodes::ProcessCtx;

/// Feed-forward dynamics compressor: envelope follower into a soft-knee gain
/// computer, applied in-place per channel.
pub struct CompressorKernel {
    pub threshold: AtomicF32,
    pub knee: AtomicF32,
    pub ratio: AtomicF32,
    pub attack: AtomicF32,
    pub release: AtomicF32,
    followers: [EnvelopeFollower; CHANNELS],
    attack_ms: f32,
    release_ms: f32,
}

impl CompressorKernel {
    pub fn new(sample_rate: f64) -> Self {
        let mut follower = EnvelopeFollower::new(sample_rate as f32);
        follower.set_attack_ms(5.0);
        follower.set_release_ms(50.0);
        Self {
            threshold: AtomicF32::new(-20.0),
            knee: AtomicF32::new(0.0),
            ratio: AtomicF32::new(4.0),
            attack: AtomicF32::new(5.0),
            release: AtomicF32::new(50.0),
            followers: [follower; CHANNELS],
            attack_ms: 5.0,
            release_ms: 50.0,
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessCtx<'_>) {
        let threshold = self.threshold.load();
        let knee = self.knee.load().max(0.0);
        let ratio = self.ratio.load().max(1.0);
        let attack = self.attack.load().max(0.01);
        let release = self.release.load().max(0.1);

        if attack != self.attack_ms {
            self.attack_ms = attack;
            for follower in &mut self.followers {
                follower.set_attack_ms(attack);
            }
        }
        if release != self.release_ms {
            self.release_ms = release;
            for follower in &mut self.followers {
                follower.set_release_ms(release);
            }
        }

        let frames = ctx.frames;
        for ch in 0..ctx.output.channel_count().min(CHANNELS) {
            let input = ctx.input.channel(ch);
            let output = ctx.output.channel_mut(ch);
            let follower = &mut self.followers[ch];
            for i in 0..frames {
                let sample = input[i];
                let level_db = linear_to_db(follower.process(sample));
                let reduction_db = gain_reduction_db(level_db, threshold, ratio, knee);
                output[i] = sample * db_to_linear(reduction_db);
            }
        }
    }
}

/// Gain reduction (non-positive dB) for a detected level.
#[inline]
fn gain_reduction_db(level_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
    let overshoot = level_db - threshold_db;
    if overshoot <= -knee_db * 0.5 {
        0.0
    } else if overshoot > knee_db * 0.5 {
        -(overshoot * (1.0 - 1.0 / ratio))
    } else {
        let knee_factor = (overshoot + knee_db * 0.5) / knee_db.max(1.0e-6);
        -(knee_factor * knee_factor * overshoot * (1.0 - 1.0 / ratio))
    }
}
