//! Acoustic echo cancellation orchestration
//!
//! [`EchoCancellationAdapter`] sits between caller-sized PCM frames and an
//! injected [`EchoEngine`] that only understands its own fixed analysis
//! window. The adapter chunks render and capture frames into engine
//! sub-frames (zero-padding a short final remainder and truncating the
//! result back to the caller's length), serializes every engine entry
//! through one critical section, and contains engine failures at its
//! boundary.
//!
//! An adapter whose engine could not be constructed runs as a permanent
//! passthrough: capture frames come back verbatim and metrics are
//! unavailable, but no call ever fails louder than a `false`. Disabling
//! cancellation at runtime merely skips the engine per call; its
//! adaptation state stays warm for re-enabling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::processing::audio::engine::{EchoEngine, EchoMetrics};
use crate::{Sample, SampleRate};

/// Configuration for the echo cancellation adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoCancellerConfig {
    /// Sample rate of both render and capture signals
    pub sample_rate: SampleRate,
    /// Number of channels
    pub channels: u8,
    /// Initial render-to-capture delay hint in milliseconds
    pub initial_delay_ms: u32,
    /// Run capture frames through the engine
    pub enable_cancellation: bool,
    /// Feature flag forwarded to hosts that bundle a noise suppressor
    pub enable_noise_suppression: bool,
    /// Feature flag forwarded to hosts that bundle engine-side gain control
    pub enable_auto_gain: bool,
    /// Feature flag forwarded to hosts that bundle engine-side VAD
    pub enable_voice_activity: bool,
}

impl Default for EchoCancellerConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::default(),
            channels: 1,
            initial_delay_ms: 60, // Typical speaker-to-mic path on consumer hardware
            enable_cancellation: true,
            enable_noise_suppression: true,
            enable_auto_gain: false,
            enable_voice_activity: false,
        }
    }
}

/// Mutable engine state behind the adapter's single critical section
struct EchoSession {
    engine: Box<dyn EchoEngine>,
    subframe_len: usize,
    render_scratch: Vec<Sample>,
    capture_scratch: Vec<Sample>,
    delay_ms: u32,
}

impl EchoSession {
    /// Feed a render frame to the engine, one sub-frame at a time
    fn feed_render_chunks(&mut self, frame: &[Sample]) -> Result<()> {
        let width = self.subframe_len;
        let mut offset = 0;
        while offset < frame.len() {
            let remaining = frame.len() - offset;
            if remaining >= width {
                self.engine.analyze_render(&frame[offset..offset + width])?;
            } else {
                self.render_scratch.fill(0);
                self.render_scratch[..remaining].copy_from_slice(&frame[offset..]);
                self.engine.analyze_render(&self.render_scratch)?;
            }
            offset += width;
        }
        Ok(())
    }

    /// Run a capture frame through the engine in place, one sub-frame at a
    /// time; the zero-padded tail of a short remainder never reaches the
    /// caller
    fn process_capture_chunks(&mut self, frame: &mut [Sample]) -> Result<()> {
        let width = self.subframe_len;
        let len = frame.len();
        let mut offset = 0;
        while offset < len {
            let remaining = len - offset;
            if remaining >= width {
                self.engine.process_capture(&mut frame[offset..offset + width])?;
            } else {
                self.capture_scratch.fill(0);
                self.capture_scratch[..remaining].copy_from_slice(&frame[offset..]);
                self.engine.process_capture(&mut self.capture_scratch)?;
                frame[offset..].copy_from_slice(&self.capture_scratch[..remaining]);
            }
            offset += width;
        }
        Ok(())
    }
}

/// Adapter orchestrating echo cancellation over an injected engine
pub struct EchoCancellationAdapter {
    /// `None` marks the permanent passthrough downgrade
    session: Option<Mutex<EchoSession>>,
    cancellation_enabled: AtomicBool,
    noise_suppression_enabled: AtomicBool,
    auto_gain_enabled: AtomicBool,
    voice_activity_enabled: AtomicBool,
}

impl EchoCancellationAdapter {
    /// Create an adapter, attempting engine construction via `build_engine`
    ///
    /// Factory failure (unsupported sample rate, allocation failure, ...)
    /// downgrades the instance to passthrough for its whole lifetime; the
    /// error is logged, never surfaced.
    pub fn new<F>(config: EchoCancellerConfig, build_engine: F) -> Self
    where
        F: FnOnce(SampleRate, u8) -> Result<Box<dyn EchoEngine>>,
    {
        let session = match build_engine(config.sample_rate, config.channels) {
            Ok(mut engine) => {
                let subframe_len = engine.subframe_len().max(1);
                engine.set_delay_hint(config.initial_delay_ms);
                debug!(
                    "Echo engine active: subframe={} samples, initial delay {}ms",
                    subframe_len, config.initial_delay_ms
                );
                Some(Mutex::new(EchoSession {
                    engine,
                    subframe_len,
                    render_scratch: vec![0; subframe_len],
                    capture_scratch: vec![0; subframe_len],
                    delay_ms: config.initial_delay_ms,
                }))
            }
            Err(e) => {
                warn!("Echo engine unavailable, running passthrough: {}", e);
                None
            }
        };

        Self {
            session,
            cancellation_enabled: AtomicBool::new(config.enable_cancellation),
            noise_suppression_enabled: AtomicBool::new(config.enable_noise_suppression),
            auto_gain_enabled: AtomicBool::new(config.enable_auto_gain),
            voice_activity_enabled: AtomicBool::new(config.enable_voice_activity),
        }
    }

    /// Whether an engine is present behind the adapter
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Store the feature flags; never re-initializes the engine
    pub fn configure(
        &self,
        cancellation: bool,
        noise_suppression: bool,
        auto_gain: bool,
        voice_activity: bool,
    ) -> bool {
        self.cancellation_enabled.store(cancellation, Ordering::Relaxed);
        self.noise_suppression_enabled
            .store(noise_suppression, Ordering::Relaxed);
        self.auto_gain_enabled.store(auto_gain, Ordering::Relaxed);
        self.voice_activity_enabled
            .store(voice_activity, Ordering::Relaxed);
        true
    }

    /// Update the render-to-capture delay hint
    ///
    /// Negative values clamp to zero. The hint reaches the engine without
    /// resetting its adaptation state.
    pub fn set_delay_ms(&self, delay_ms: i32) -> bool {
        let clamped = delay_ms.max(0) as u32;
        if let Some(session) = &self.session {
            if let Ok(mut s) = session.lock() {
                s.delay_ms = clamped;
                s.engine.set_delay_hint(clamped);
            }
        }
        true
    }

    /// Feed a render (far-end) frame of any length to the engine
    ///
    /// Render sub-frames should arrive at or before the matching capture
    /// window; late delivery only degrades suppression quality. Returns
    /// `false` only for an empty frame.
    pub fn process_reverse(&self, far: &[Sample]) -> bool {
        if far.is_empty() {
            return false;
        }
        if !self.cancellation_enabled.load(Ordering::Relaxed) {
            return true;
        }
        let Some(session) = &self.session else {
            return true;
        };
        let Ok(mut s) = session.lock() else {
            return true;
        };
        if let Err(e) = s.feed_render_chunks(far) {
            warn!("Echo engine render analysis failed, frame dropped: {}", e);
        }
        true
    }

    /// Process a capture (near-end) frame, writing the result into `out`
    ///
    /// The input is copied to `out` verbatim first, so a passthrough or
    /// disabled adapter is transparent and any engine failure leaves the
    /// call without audio effect. `out` always carries exactly the input
    /// length of audio. Returns `false` for an empty frame or a length
    /// mismatch between `near` and `out`.
    pub fn process_capture(&self, near: &[Sample], out: &mut [Sample]) -> bool {
        if near.is_empty() || out.len() != near.len() {
            let n = near.len().min(out.len());
            out[..n].copy_from_slice(&near[..n]);
            return false;
        }
        out.copy_from_slice(near);

        if !self.cancellation_enabled.load(Ordering::Relaxed) {
            return true;
        }
        let Some(session) = &self.session else {
            return true;
        };
        let Ok(mut s) = session.lock() else {
            return true;
        };
        if let Err(e) = s.process_capture_chunks(out) {
            warn!(
                "Echo engine capture processing failed, passing frame through: {}",
                e
            );
            out.copy_from_slice(near);
        }
        true
    }

    /// Engine metrics, available only while an engine is present
    pub fn metrics(&self) -> Option<EchoMetrics> {
        let session = self.session.as_ref()?;
        let s = session.lock().ok()?;
        Some(s.engine.metrics())
    }

    /// Whether capture frames are currently run through the engine
    pub fn cancellation_enabled(&self) -> bool {
        self.cancellation_enabled.load(Ordering::Relaxed)
    }

    /// Noise suppression feature flag
    pub fn noise_suppression_enabled(&self) -> bool {
        self.noise_suppression_enabled.load(Ordering::Relaxed)
    }

    /// Engine-side gain control feature flag
    pub fn auto_gain_enabled(&self) -> bool {
        self.auto_gain_enabled.load(Ordering::Relaxed)
    }

    /// Engine-side voice activity feature flag
    pub fn voice_activity_enabled(&self) -> bool {
        self.voice_activity_enabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::processing::audio::engine::NoOpEchoEngine;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Test engine that halves every capture sample and records activity
    struct HalvingEngine {
        subframe_len: usize,
        delay_ms: u32,
        render_frames: Arc<Mutex<Vec<Vec<Sample>>>>,
        capture_calls: Arc<AtomicUsize>,
    }

    impl EchoEngine for HalvingEngine {
        fn subframe_len(&self) -> usize {
            self.subframe_len
        }

        fn set_delay_hint(&mut self, delay_ms: u32) {
            self.delay_ms = delay_ms;
        }

        fn analyze_render(&mut self, subframe: &[Sample]) -> Result<()> {
            self.render_frames.lock().unwrap().push(subframe.to_vec());
            Ok(())
        }

        fn process_capture(&mut self, subframe: &mut [Sample]) -> Result<()> {
            self.capture_calls.fetch_add(1, Ordering::Relaxed);
            for s in subframe.iter_mut() {
                *s /= 2;
            }
            Ok(())
        }

        fn metrics(&self) -> EchoMetrics {
            EchoMetrics {
                erl_db: 12.0,
                erle_db: 6.0,
                delay_ms: self.delay_ms,
            }
        }
    }

    /// Test engine whose processing always fails
    struct FailingEngine;

    impl EchoEngine for FailingEngine {
        fn subframe_len(&self) -> usize {
            160
        }

        fn set_delay_hint(&mut self, _delay_ms: u32) {}

        fn analyze_render(&mut self, _subframe: &[Sample]) -> Result<()> {
            Err(Error::EngineProcessing("render blew up".to_string()))
        }

        fn process_capture(&mut self, _subframe: &mut [Sample]) -> Result<()> {
            Err(Error::EngineProcessing("capture blew up".to_string()))
        }

        fn metrics(&self) -> EchoMetrics {
            EchoMetrics::default()
        }
    }

    fn halving_adapter(
        subframe_len: usize,
    ) -> (
        EchoCancellationAdapter,
        Arc<Mutex<Vec<Vec<Sample>>>>,
        Arc<AtomicUsize>,
    ) {
        let render_frames = Arc::new(Mutex::new(Vec::new()));
        let capture_calls = Arc::new(AtomicUsize::new(0));
        let rf = render_frames.clone();
        let cc = capture_calls.clone();
        let adapter = EchoCancellationAdapter::new(EchoCancellerConfig::default(), move |_, _| {
            Ok(Box::new(HalvingEngine {
                subframe_len,
                delay_ms: 0,
                render_frames: rf,
                capture_calls: cc,
            }))
        });
        (adapter, render_frames, capture_calls)
    }

    #[test]
    fn test_factory_failure_means_passthrough_forever() {
        let adapter = EchoCancellationAdapter::new(EchoCancellerConfig::default(), |_, _| {
            Err(Error::EngineInit("unsupported sample rate".to_string()))
        });

        assert!(!adapter.is_active());
        assert!(adapter.metrics().is_none());

        for len in [1usize, 100, 160, 250, 480] {
            let near: Vec<Sample> = (0..len as i16).map(|i| i * 3 - 100).collect();
            let mut out = vec![0; len];
            assert!(adapter.process_capture(&near, &mut out));
            assert_eq!(out, near);
        }
    }

    #[test]
    fn test_unsupported_rate_with_real_factory() {
        let config = EchoCancellerConfig {
            sample_rate: SampleRate::Rate44100,
            ..EchoCancellerConfig::default()
        };
        let adapter = EchoCancellationAdapter::new(config, NoOpEchoEngine::factory);
        assert!(!adapter.is_active());

        let near = [500i16; 441];
        let mut out = [0i16; 441];
        assert!(adapter.process_capture(&near, &mut out));
        assert_eq!(out, near);
    }

    #[test]
    fn test_noop_engine_is_transparent() {
        let adapter =
            EchoCancellationAdapter::new(EchoCancellerConfig::default(), NoOpEchoEngine::factory);
        assert!(adapter.is_active());

        // Lengths off the sub-frame grid still come back bit-exact
        for len in [1usize, 100, 160, 250, 320, 479] {
            let near: Vec<Sample> = (0..len).map(|i| (i as i16).wrapping_mul(7)).collect();
            let mut out = vec![0; len];
            assert!(adapter.process_reverse(&near));
            assert!(adapter.process_capture(&near, &mut out));
            assert_eq!(out, near);
        }
    }

    #[test]
    fn test_capture_chunking_applies_engine() {
        let (adapter, _, capture_calls) = halving_adapter(100);

        // 250 samples: two full sub-frames plus a padded 50-sample tail
        let near = [1000i16; 250];
        let mut out = [0i16; 250];
        assert!(adapter.process_capture(&near, &mut out));
        assert_eq!(out, [500i16; 250]);
        assert_eq!(capture_calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_render_chunking_pads_remainder() {
        let (adapter, render_frames, _) = halving_adapter(100);

        let far = [7i16; 250];
        assert!(adapter.process_reverse(&far));

        let frames = render_frames.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![7; 100]);
        assert_eq!(frames[1], vec![7; 100]);
        let mut padded = vec![7; 50];
        padded.extend_from_slice(&[0; 50]);
        assert_eq!(frames[2], padded);
    }

    #[test]
    fn test_engine_failure_is_contained() {
        let adapter = EchoCancellationAdapter::new(EchoCancellerConfig::default(), |_, _| {
            Ok(Box::new(FailingEngine))
        });
        assert!(adapter.is_active());

        let near: Vec<Sample> = (0..320).map(|i| i as i16 - 160).collect();
        let mut out = vec![0; 320];

        // Both paths swallow the failure; capture output stays verbatim
        assert!(adapter.process_reverse(&near));
        assert!(adapter.process_capture(&near, &mut out));
        assert_eq!(out, near);
    }

    #[test]
    fn test_disable_skips_engine_and_reenable_resumes() {
        let (adapter, _, capture_calls) = halving_adapter(100);

        let near = [1000i16; 200];
        let mut out = [0i16; 200];

        adapter.process_capture(&near, &mut out);
        assert_eq!(out, [500i16; 200]);
        assert_eq!(capture_calls.load(Ordering::Relaxed), 2);

        // Disabled: verbatim output, engine untouched
        assert!(adapter.configure(false, true, false, false));
        adapter.process_capture(&near, &mut out);
        assert_eq!(out, near);
        assert_eq!(capture_calls.load(Ordering::Relaxed), 2);

        // Re-enabled: the same warmed engine picks back up
        assert!(adapter.configure(true, true, false, false));
        adapter.process_capture(&near, &mut out);
        assert_eq!(out, [500i16; 200]);
        assert_eq!(capture_calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_delay_hint_clamps_and_forwards() {
        let (adapter, _, _) = halving_adapter(160);

        // Initial hint from the config default
        assert_eq!(adapter.metrics().unwrap().delay_ms, 60);

        assert!(adapter.set_delay_ms(120));
        assert_eq!(adapter.metrics().unwrap().delay_ms, 120);

        assert!(adapter.set_delay_ms(-5));
        assert_eq!(adapter.metrics().unwrap().delay_ms, 0);
    }

    #[test]
    fn test_invalid_arguments() {
        let (adapter, _, _) = halving_adapter(160);

        assert!(!adapter.process_reverse(&[]));

        let mut out = [0i16; 4];
        assert!(!adapter.process_capture(&[], &mut out));

        // Length mismatch: overlapping prefix is still a faithful copy
        let near = [9i16; 8];
        assert!(!adapter.process_capture(&near, &mut out));
        assert_eq!(out, [9i16; 4]);
    }

    #[test]
    fn test_feature_flags_stored() {
        let (adapter, _, _) = halving_adapter(160);
        assert!(adapter.cancellation_enabled());
        assert!(adapter.noise_suppression_enabled());
        assert!(!adapter.auto_gain_enabled());
        assert!(!adapter.voice_activity_enabled());

        adapter.configure(false, false, true, true);
        assert!(!adapter.cancellation_enabled());
        assert!(!adapter.noise_suppression_enabled());
        assert!(adapter.auto_gain_enabled());
        assert!(adapter.voice_activity_enabled());
    }
}
