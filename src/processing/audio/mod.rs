//! Audio processing components
//!
//! This module contains the per-frame audio processors: adaptive gain
//! control, voice activity detection, and the echo cancellation adapter
//! that orchestrates a pluggable engine.

pub mod aec;
pub mod agc;
pub mod engine;
pub mod vad;

// Re-export main types
pub use aec::{EchoCancellationAdapter, EchoCancellerConfig};
pub use agc::{AdaptiveGainController, AgcConfig};
pub use engine::{EchoEngine, EchoMetrics, NoOpEchoEngine};
pub use vad::{VadConfig, VadReport, VoiceActivityDetector};
