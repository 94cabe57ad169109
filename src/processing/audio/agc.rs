//! Adaptive gain control
//!
//! Tracks loudness with a peak-envelope estimator: the per-frame peak
//! magnitude feeds an exponential moving average, and the gain needed to
//! bring that average to the target peak is approached with asymmetric
//! steps. The attack step is large so a sudden loudness spike is tamed
//! within a few frames; the release step is small so the gain drifts back
//! up slowly instead of pumping audibly. The controller only ever returns
//! a gain hint; applying it to samples is the caller's job.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::Sample;

/// Configuration options for the gain controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgcConfig {
    /// Peak magnitude the controller steers toward
    pub target_peak: f32,

    /// EMA retain factor for the loudness estimate [0.0-1.0)
    pub level_smoothing: f32,

    /// Lower bound on the loudness estimate, keeps the gain finite at silence
    pub level_floor: f32,

    /// Step toward a higher desired gain (0.0-1.0]
    pub attack_step: f32,

    /// Step toward a lower desired gain (0.0-1.0]
    pub release_step: f32,

    /// Minimum gain multiplier
    pub min_gain: f32,

    /// Maximum gain multiplier
    pub max_gain: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            target_peak: 12000.0,  // Comfortable headroom below full scale
            level_smoothing: 0.9,  // 90% history, 10% current frame
            level_floor: 1.0,
            attack_step: 0.5,
            release_step: 0.05,
            min_gain: 0.25,
            max_gain: 4.0,
        }
    }
}

/// Adaptive gain controller
#[derive(Debug)]
pub struct AdaptiveGainController {
    config: AgcConfig,
    /// Smoothed peak-envelope estimate
    smoothed_level: f32,
    /// Gain returned by the last call
    gain: f32,
}

impl AdaptiveGainController {
    /// Create a new controller with the given configuration
    pub fn new(config: AgcConfig) -> Result<Self> {
        if !(0.0..1.0).contains(&config.level_smoothing) {
            return Err(Error::InvalidParameter(
                "AGC level smoothing must be in [0.0, 1.0)".to_string(),
            ));
        }
        if config.target_peak <= 0.0 || config.level_floor <= 0.0 {
            return Err(Error::InvalidParameter(
                "AGC target peak and level floor must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.attack_step)
            || !(0.0..=1.0).contains(&config.release_step)
            || config.attack_step == 0.0
            || config.release_step == 0.0
        {
            return Err(Error::InvalidParameter(
                "AGC attack and release steps must be in (0.0, 1.0]".to_string(),
            ));
        }
        if config.min_gain <= 0.0 || config.min_gain > config.max_gain {
            return Err(Error::InvalidParameter(
                "AGC gain band must satisfy 0 < min <= max".to_string(),
            ));
        }

        // Estimate starts at the target: initial gain is exactly unity
        let smoothed_level = config.target_peak;
        Ok(Self {
            config,
            smoothed_level,
            gain: 1.0,
        })
    }

    /// Create a new controller with default configuration
    pub fn new_default() -> Self {
        Self::new(AgcConfig::default()).expect("default AGC config is valid")
    }

    /// Update the loudness estimate from a frame and return the gain hint
    ///
    /// An absent or empty frame returns the last-known gain unchanged.
    pub fn process(&mut self, frame: Option<&[Sample]>) -> f32 {
        let Some(samples) = frame else {
            return self.gain;
        };
        if samples.is_empty() {
            return self.gain;
        }

        let peak = instantaneous_level(samples);

        let retain = self.config.level_smoothing;
        self.smoothed_level = retain * self.smoothed_level + (1.0 - retain) * peak;
        if self.smoothed_level < self.config.level_floor {
            self.smoothed_level = self.config.level_floor;
        }

        let desired = (self.config.target_peak / self.smoothed_level)
            .clamp(self.config.min_gain, self.config.max_gain);

        let step = if desired > self.gain {
            self.config.attack_step
        } else {
            self.config.release_step
        };
        self.gain += step * (desired - self.gain);
        self.gain = self.gain.clamp(self.config.min_gain, self.config.max_gain);

        trace!(
            "AGC: peak={:.0} level={:.0} desired={:.3} gain={:.3}",
            peak,
            self.smoothed_level,
            desired,
            self.gain
        );

        self.gain
    }

    /// Gain returned by the last `process` call
    pub fn current_gain(&self) -> f32 {
        self.gain
    }

    /// Current smoothed loudness estimate
    pub fn current_level(&self) -> f32 {
        self.smoothed_level
    }
}

/// Peak magnitude of the frame
///
/// The historical alternative is an RMS power estimate; swapping the
/// estimator only means changing this function.
fn instantaneous_level(samples: &[Sample]) -> f32 {
    samples
        .iter()
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configs() {
        let bad_smoothing = AgcConfig {
            level_smoothing: 1.0,
            ..AgcConfig::default()
        };
        assert!(AdaptiveGainController::new(bad_smoothing).is_err());

        let bad_band = AgcConfig {
            min_gain: 2.0,
            max_gain: 1.0,
            ..AgcConfig::default()
        };
        assert!(AdaptiveGainController::new(bad_band).is_err());

        let bad_step = AgcConfig {
            attack_step: 0.0,
            ..AgcConfig::default()
        };
        assert!(AdaptiveGainController::new(bad_step).is_err());
    }

    #[test]
    fn test_absent_frame_keeps_gain() {
        let mut agc = AdaptiveGainController::new_default();
        let before = agc.process(Some(&[8000; 160]));
        assert_eq!(agc.process(None), before);
        assert_eq!(agc.process(Some(&[])), before);
    }

    #[test]
    fn test_loud_input_releases_gain_monotonically() {
        let mut agc = AdaptiveGainController::new_default();
        let frame = [i16::MAX; 160];

        let mut last = agc.current_gain();
        for _ in 0..50 {
            let gain = agc.process(Some(&frame));
            assert!(gain <= last + 1e-6, "gain rose on loud input");
            last = gain;
        }
        // Settled well below unity, still inside the band
        assert!(last < 0.5);
        assert!(last >= 0.25);
    }

    #[test]
    fn test_quiet_input_attacks_gain_monotonically() {
        let mut agc = AdaptiveGainController::new_default();
        let frame = [10i16; 160];

        let mut last = agc.current_gain();
        for _ in 0..50 {
            let gain = agc.process(Some(&frame));
            assert!(gain >= last - 1e-6, "gain fell on quiet input");
            last = gain;
        }
        assert!((last - 4.0).abs() < 0.05);
    }

    #[test]
    fn test_gain_stays_in_band() {
        let mut agc = AdaptiveGainController::new_default();
        for i in 0..200 {
            let level = if i % 2 == 0 { i16::MAX } else { 5 };
            let gain = agc.process(Some(&[level; 160]));
            assert!((0.25..=4.0).contains(&gain));
        }
    }

    #[test]
    fn test_attack_faster_than_release() {
        let config = AgcConfig::default();

        let mut rising = AdaptiveGainController::new(config.clone()).unwrap();
        // Drive the level down so the desired gain sits at the ceiling
        let first_attack = {
            let before = rising.current_gain();
            let after = rising.process(Some(&[10; 160]));
            after - before
        };

        let mut falling = AdaptiveGainController::new(config).unwrap();
        let first_release = {
            let before = falling.current_gain();
            let after = falling.process(Some(&[i16::MAX; 160]));
            before - after
        };

        assert!(first_attack > 0.0);
        assert!(first_release > 0.0);
        assert!(first_attack > first_release);
    }
}
