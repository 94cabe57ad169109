//! Multi-stream audio mixer
//!
//! Accumulates per-stream frames, each scaled by its own gain, into a
//! wider integer buffer and collapses the sum into one saturated 16-bit
//! output frame. Accumulating in `i32` keeps intermediate sums exact;
//! saturation happens exactly once, at the output boundary. When more than
//! one stream is active the sum is divided by the active count so
//! concurrent talkers cannot clip the mix.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::Sample;

/// Mixer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Samples per frame
    pub frame_size: usize,
    /// Gain applied to the final mix (unity leaves the mix untouched)
    pub base_gain: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            frame_size: 320, // 20ms at 16kHz
            base_gain: 1.0,
        }
    }
}

/// Statistics for the mixer
#[derive(Debug, Clone, Copy, Default)]
pub struct MixerStats {
    /// Number of completed mix cycles
    pub mix_cycles: u64,
    /// Number of frames folded into the accumulator
    pub streams_mixed: u64,
    /// Number of absent streams passed to `add_stream`
    pub silent_streams: u64,
    /// Number of frames rejected for a wrong length
    pub frames_rejected: u64,
}

/// Audio mixer combining multiple streams into one output frame
pub struct StreamMixer {
    config: MixerConfig,
    accumulator: Vec<i32>,
    stats: MixerStats,
}

impl StreamMixer {
    /// Create a new mixer for frames of the configured size
    pub fn new(config: MixerConfig) -> Result<Self> {
        if config.frame_size == 0 {
            return Err(Error::InvalidParameter(
                "Mixer frame size must be non-zero".to_string(),
            ));
        }

        let accumulator = vec![0i32; config.frame_size];
        Ok(Self {
            config,
            accumulator,
            stats: MixerStats::default(),
        })
    }

    /// Create a new mixer with default configuration
    pub fn new_default() -> Self {
        Self::new(MixerConfig::default()).expect("default mixer config is valid")
    }

    /// Zero the accumulator; must precede the `add_stream` calls of a cycle
    pub fn reset(&mut self) {
        self.accumulator.fill(0);
    }

    /// Fold one stream's frame into the accumulator at the given gain
    ///
    /// An absent stream contributes silence. Frames of the wrong length
    /// are dropped and counted.
    pub fn add_stream(&mut self, frame: Option<&[Sample]>, gain: f32) {
        let Some(samples) = frame else {
            self.stats.silent_streams += 1;
            return;
        };

        if samples.len() != self.config.frame_size {
            warn!(
                "Rejecting mix input: {} samples, expected {}",
                samples.len(),
                self.config.frame_size
            );
            self.stats.frames_rejected += 1;
            return;
        }

        for (cell, &sample) in self.accumulator.iter_mut().zip(samples) {
            *cell += (sample as f32 * gain).round() as i32;
        }
        self.stats.streams_mixed += 1;
    }

    /// Collapse the accumulated streams into `out`
    ///
    /// With more than one active stream the sum is divided by the stream
    /// count before saturation. Fully overwrites `out`; a wrong-length
    /// buffer is left untouched.
    pub fn mix(&mut self, out: &mut [Sample], active_streams: usize) {
        if out.len() != self.config.frame_size {
            warn!(
                "Rejecting mix output: {} samples, expected {}",
                out.len(),
                self.config.frame_size
            );
            return;
        }

        let divisor = if active_streams > 1 {
            active_streams as i32
        } else {
            1
        };

        for (dst, &acc) in out.iter_mut().zip(&self.accumulator) {
            let scaled = ((acc / divisor) as f32 * self.config.base_gain).round() as i32;
            *dst = saturate(scaled);
        }

        self.stats.mix_cycles += 1;
        trace!("Mixed {} active streams", active_streams);
    }

    /// Samples per frame
    pub fn frame_size(&self) -> usize {
        self.config.frame_size
    }

    /// Current mixer statistics
    pub fn stats(&self) -> &MixerStats {
        &self.stats
    }
}

/// Saturate a widened sample into the signed 16-bit range
fn saturate(value: i32) -> Sample {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as Sample
}
