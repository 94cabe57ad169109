//! Audio engine components
//!
//! Currently home to the multi-stream mixer that folds every active
//! participant's frame into the single playout frame.

pub mod mixer;

pub use mixer::{MixerConfig, MixerStats, StreamMixer};
