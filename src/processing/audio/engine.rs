//! Echo cancellation engine capability
//!
//! The adapter in [`super::aec`] is engine-agnostic: anything implementing
//! [`EchoEngine`] can sit behind it. An engine operates on a fixed
//! analysis window (its sub-frame) regardless of the caller's frame size;
//! the adapter owns all chunking and locking, so implementations here can
//! assume exact-width sub-frames and single-threaded access.

use crate::error::{Error, Result};
use crate::{Sample, SampleRate};

/// Echo suppression metrics reported by an engine
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct EchoMetrics {
    /// Echo return loss in dB
    pub erl_db: f32,
    /// Echo return loss enhancement in dB
    pub erle_db: f32,
    /// Current delay estimate in milliseconds
    pub delay_ms: u32,
}

/// Capability contract for a wrapped echo cancellation engine
///
/// Cross-call mutable state inside an engine is not safe for concurrent
/// access; the adapter serializes every call through one critical section.
pub trait EchoEngine: Send {
    /// The engine's native analysis window in samples
    fn subframe_len(&self) -> usize;

    /// Forward a render-to-capture delay hint without resetting adaptation
    fn set_delay_hint(&mut self, delay_ms: u32);

    /// Analyze one render (far-end) sub-frame
    fn analyze_render(&mut self, subframe: &[Sample]) -> Result<()>;

    /// Process one capture (near-end) sub-frame in place
    fn process_capture(&mut self, subframe: &mut [Sample]) -> Result<()>;

    /// Current suppression metrics
    fn metrics(&self) -> EchoMetrics;
}

/// Null engine for platforms without a real canceller
///
/// Capture processing is the identity and the metrics are all zero, but
/// construction enforces the same contract a real engine would: only
/// sample rates the band-splitting analysis supports are accepted.
#[derive(Debug)]
pub struct NoOpEchoEngine {
    subframe_len: usize,
    delay_ms: u32,
}

impl NoOpEchoEngine {
    /// Create a null engine for the given stream parameters
    pub fn new(sample_rate: SampleRate, channels: u8) -> Result<Self> {
        let hz = sample_rate.as_hz();
        if channels == 0 {
            return Err(Error::EngineInit("Channel count must be non-zero".to_string()));
        }
        // Whole-band analysis needs a multiple of 8kHz; this also keeps the
        // 10ms sub-frame an integral sample count. 44.1kHz is out.
        if hz % 8000 != 0 {
            return Err(Error::EngineInit(format!(
                "Unsupported sample rate {} Hz",
                hz
            )));
        }

        Ok(Self {
            subframe_len: (hz / 100) as usize,
            delay_ms: 0,
        })
    }

    /// Boxed factory in the shape the adapter expects
    pub fn factory(
        sample_rate: SampleRate,
        channels: u8,
    ) -> Result<Box<dyn EchoEngine>> {
        Ok(Box::new(Self::new(sample_rate, channels)?))
    }
}

impl EchoEngine for NoOpEchoEngine {
    fn subframe_len(&self) -> usize {
        self.subframe_len
    }

    fn set_delay_hint(&mut self, delay_ms: u32) {
        self.delay_ms = delay_ms;
    }

    fn analyze_render(&mut self, _subframe: &[Sample]) -> Result<()> {
        Ok(())
    }

    fn process_capture(&mut self, _subframe: &mut [Sample]) -> Result<()> {
        Ok(())
    }

    fn metrics(&self) -> EchoMetrics {
        EchoMetrics {
            delay_ms: self.delay_ms,
            ..EchoMetrics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subframe_is_ten_ms() {
        let engine = NoOpEchoEngine::new(SampleRate::Rate16000, 1).unwrap();
        assert_eq!(engine.subframe_len(), 160);

        let engine = NoOpEchoEngine::new(SampleRate::Rate48000, 1).unwrap();
        assert_eq!(engine.subframe_len(), 480);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(NoOpEchoEngine::new(SampleRate::Rate44100, 1).is_err());
        assert!(NoOpEchoEngine::new(SampleRate::Rate16000, 0).is_err());
    }

    #[test]
    fn test_identity_processing() {
        let mut engine = NoOpEchoEngine::new(SampleRate::Rate16000, 1).unwrap();
        let mut frame = [123i16; 160];
        engine.analyze_render(&[500; 160]).unwrap();
        engine.process_capture(&mut frame).unwrap();
        assert_eq!(frame, [123; 160]);
    }

    #[test]
    fn test_delay_hint_reflected_in_metrics() {
        let mut engine = NoOpEchoEngine::new(SampleRate::Rate16000, 1).unwrap();
        engine.set_delay_hint(80);
        assert_eq!(engine.metrics().delay_ms, 80);
    }
}
