//! Peak envelope follower with instant attack and exponential release.

/// One-pole rectified peak follower
///
/// Rises immediately to any louder sample and otherwise decays by a fixed
/// factor per sample.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    level: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Create a follower with the given release time constant (samples)
    pub fn new(release_samples: f32) -> Self {
        let mut follower = Self {
            level: 0.0,
            release_coeff: 0.0,
        };
        follower.set_release(release_samples);
        follower
    }

    /// Set the release time constant (samples). Zero or less releases instantly.
    pub fn set_release(&mut self, release_samples: f32) {
        self.release_coeff = if release_samples > 0.0 {
            (-1.0 / release_samples).exp()
        } else {
            0.0
        };
    }

    /// Feed one sample and return the updated estimate
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let rectified = sample.abs();
        if rectified > self.level {
            self.level = rectified;
        } else {
            self.level *= self.release_coeff;
        }
        self.level
    }

    /// Feed a block and return the estimate after its last sample
    #[inline]
    pub fn process_block(&mut self, samples: &[f32]) -> f32 {
        for &sample in samples {
            self.process(sample);
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_attack() {
        let mut follower = EnvelopeFollower::new(100.0);
        assert_eq!(follower.process(-0.8), 0.8);
        let decayed = follower.process(0.3);
        assert!((decayed - 0.8 * (-0.01f32).exp()).abs() < 1e-7);
    }

    #[test]
    fn test_release_reaches_one_over_e_after_time_constant() {
        let mut follower = EnvelopeFollower::new(480.0);
        follower.process(1.0);
        let level = follower.process_block(&[0.0; 480]);
        assert!((level - (-1.0f32).exp()).abs() < 1e-3, "level = {level}");
    }

    #[test]
    fn test_silence_decays_toward_zero() {
        let mut follower = EnvelopeFollower::new(2400.0);
        follower.process(1.0);
        let level = follower.process_block(&vec![0.0; 48000]);
        assert!(level < 1e-4);
    }
}
