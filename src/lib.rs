//! # Media core library for the Talkwire voice pipeline
//!
//! `talkwire-media-core` provides the real-time audio frame processing core
//! for voice chat sessions. It handles out-of-order frame buffering,
//! multi-stream mixing, adaptive gain control, and acoustic echo
//! cancellation orchestration.
//!
//! This crate provides:
//!
//! - Sequence-indexed frame storage for absorbing network jitter
//! - Playout cursors that recover from packet loss gaps
//! - Multi-stream audio mixing with clipping protection
//! - Adaptive gain control for consistent loudness
//! - Voice activity detection for transmit gating metadata
//! - Echo cancellation orchestration over a pluggable engine
//!
//! Every operation is synchronous and allocation-free after construction;
//! the caller owns the real-time thread and composes the components once
//! per frame period. Components never call each other.
//!
//! ## Quick Start
//!
//! ```rust
//! use talkwire_media_core::prelude::*;
//!
//! # fn main() -> talkwire_media_core::Result<()> {
//! // Buffer frames arriving out of order, keyed by sequence number
//! let mut store = SequencedFrameStore::new(64, 320)?;
//! store.push(7, &[100i16; 320]);
//!
//! let mut frame = vec![0i16; 320];
//! assert!(store.pop(7, &mut frame));
//!
//! // Mix the active streams into one output frame
//! let mut mixer = StreamMixer::new(MixerConfig::default())?;
//! mixer.reset();
//! mixer.add_stream(Some(&frame), 1.0);
//!
//! let mut out = vec![0i16; 320];
//! mixer.mix(&mut out, 1);
//! assert_eq!(out, frame);
//! # Ok(())
//! # }
//! ```

// Error handling
pub mod error;

// Common frame types
pub mod types;

// Working modules
pub mod buffer;
pub mod engine;
pub mod processing;

// Re-export common types
pub use error::{Error, Result};
pub use types::AudioFrame;

/// Media sample type (raw 16-bit PCM)
pub type Sample = i16;

/// PCM sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SampleRate {
    /// 8kHz (narrowband telephony)
    Rate8000 = 8000,
    /// 16kHz (wideband)
    Rate16000 = 16000,
    /// 32kHz
    Rate32000 = 32000,
    /// 44.1kHz (CD quality)
    Rate44100 = 44100,
    /// 48kHz
    Rate48000 = 48000,
}

impl SampleRate {
    /// Get the sample rate in Hz
    pub fn as_hz(&self) -> u32 {
        *self as u32
    }

    /// Create from a raw Hz value, defaulting to 16kHz if not recognized
    pub fn from_hz(hz: u32) -> Self {
        match hz {
            8000 => Self::Rate8000,
            16000 => Self::Rate16000,
            32000 => Self::Rate32000,
            44100 => Self::Rate44100,
            48000 => Self::Rate48000,
            _ => Self::Rate16000,
        }
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Rate16000 // Wideband voice, the pipeline's native rate
    }
}

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{AudioFrame, Error, Result, Sample, SampleRate};

    pub use crate::buffer::{FrameStoreStats, PlayoutCursor, SequencedFrameStore};
    pub use crate::engine::audio::{MixerConfig, MixerStats, StreamMixer};
    pub use crate::processing::audio::{
        AdaptiveGainController, AgcConfig, EchoCancellationAdapter, EchoCancellerConfig,
        EchoEngine, EchoMetrics, NoOpEchoEngine, VadConfig, VadReport, VoiceActivityDetector,
    };
}
