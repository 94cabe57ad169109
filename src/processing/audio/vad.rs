//! Voice Activity Detection (VAD)
//!
//! Classifies frames as voice or silence from their RMS level, with a
//! hangover counter that keeps the voice flag up for a configured number
//! of frames after the level drops. The flag is transmit-gating metadata
//! only; dropping silent frames is the caller's decision, since removing
//! them here would break sequence continuity downstream.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::Sample;

/// Configuration for voice activity detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// RMS level above which a frame counts as voice
    pub rms_threshold: f32,
    /// Frames to keep reporting voice after the level drops
    pub hangover_frames: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 35.0,
            hangover_frames: 20, // 400ms at 20ms frames
        }
    }
}

/// Result of analyzing one frame
#[derive(Debug, Clone, Copy)]
pub struct VadReport {
    /// Whether the frame should be marked as voice
    pub is_voice: bool,
    /// RMS level of the frame
    pub rms: f32,
}

/// Voice activity detector
#[derive(Debug)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    hangover: u32,
}

impl VoiceActivityDetector {
    /// Create a new detector with the given configuration
    pub fn new(config: VadConfig) -> Result<Self> {
        if config.rms_threshold <= 0.0 {
            return Err(Error::InvalidParameter(
                "VAD RMS threshold must be positive".to_string(),
            ));
        }

        Ok(Self {
            config,
            hangover: 0,
        })
    }

    /// Create a new detector with default configuration
    pub fn new_default() -> Self {
        Self::new(VadConfig::default()).expect("default VAD config is valid")
    }

    /// Classify one frame
    pub fn process(&mut self, frame: &[Sample]) -> VadReport {
        if frame.is_empty() {
            let is_voice = self.consume_hangover();
            return VadReport { is_voice, rms: 0.0 };
        }

        let rms = frame_rms(frame);
        let is_voice = if rms > self.config.rms_threshold {
            self.hangover = self.config.hangover_frames;
            true
        } else {
            self.consume_hangover()
        };

        trace!("VAD: rms={:.1} voice={}", rms, is_voice);
        VadReport { is_voice, rms }
    }

    fn consume_hangover(&mut self) -> bool {
        if self.hangover > 0 {
            self.hangover -= 1;
            true
        } else {
            false
        }
    }
}

/// RMS level of the frame
fn frame_rms(samples: &[Sample]) -> f32 {
    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}
