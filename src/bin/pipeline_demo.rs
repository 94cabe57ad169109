//! Frame pipeline demo
//!
//! Simulates a small conference: per-participant streams arrive out of
//! order with loss, get buffered by sequence number, mixed into one playout
//! frame, measured by the AGC, and run through the echo cancellation
//! adapter with the null engine. Prints per-component statistics at the
//! end, optionally as JSON.

use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;

use talkwire_media_core::prelude::*;

/// Demo for the Talkwire frame processing pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of simultaneous streams to mix
    #[arg(short, long, default_value = "3")]
    streams: usize,

    /// Number of frame periods to simulate
    #[arg(short, long, default_value = "500")]
    frames: u32,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value = "16000")]
    sample_rate: u32,

    /// Samples per frame
    #[arg(long, default_value = "320")]
    frame_size: usize,

    /// Frame store capacity per stream
    #[arg(short, long, default_value = "128")]
    capacity: usize,

    /// Packet loss probability percentage (0-100)
    #[arg(short, long, default_value = "2")]
    loss_pct: u32,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut rng = rand::thread_rng();

    println!(
        "Simulating {} streams for {} frames ({} samples @ {} Hz, {}% loss)",
        args.streams, args.frames, args.frame_size, args.sample_rate, args.loss_pct
    );

    let sample_rate = SampleRate::from_hz(args.sample_rate);

    // One store + cursor per stream; everything else is shared
    let mut stores = Vec::with_capacity(args.streams);
    let mut cursors = Vec::with_capacity(args.streams);
    for _ in 0..args.streams {
        stores.push(SequencedFrameStore::new(args.capacity, args.frame_size)?);
        cursors.push(PlayoutCursor::default());
    }

    let mut mixer = StreamMixer::new(MixerConfig {
        frame_size: args.frame_size,
        ..MixerConfig::default()
    })?;
    let mut agc = AdaptiveGainController::new_default();
    let mut vad = VoiceActivityDetector::new_default();

    let echo_config = EchoCancellerConfig {
        sample_rate,
        ..EchoCancellerConfig::default()
    };
    let echo = EchoCancellationAdapter::new(echo_config, NoOpEchoEngine::factory);
    println!(
        "Echo canceller: {}",
        if echo.is_active() { "active (null engine)" } else { "passthrough" }
    );

    let mut playout = vec![0i16; args.frame_size];
    let mut captured = vec![0i16; args.frame_size];
    let mut scratch = vec![0i16; args.frame_size];
    let mut gain = 1.0f32;
    let mut voice_frames = 0u64;

    for period in 0..args.frames {
        // Deliver this period's packets in shuffled order with loss
        let mut arrivals: Vec<usize> = (0..args.streams).collect();
        arrivals.shuffle(&mut rng);
        for &stream in &arrivals {
            if rng.gen_range(0..100u32) < args.loss_pct {
                continue;
            }
            synth_tone(&mut scratch, 200.0 + 90.0 * stream as f32, args.sample_rate, period, &mut rng);
            let packet = AudioFrame::new(scratch.clone(), args.sample_rate, 1, period * args.frame_size as u32)
                .with_sequence(period as u16);
            cursors[stream].observe(packet.sequence);
            stores[stream].push(packet.sequence, &packet.samples);
        }

        // Playout side: pop whatever is ready and mix it
        mixer.reset();
        let mut active = 0;
        for stream in 0..args.streams {
            if cursors[stream].pop_next(&mut stores[stream], &mut scratch) {
                mixer.add_stream(Some(&scratch), 1.0);
                active += 1;
            } else {
                mixer.add_stream(None, 1.0);
            }
        }
        mixer.mix(&mut playout, active);

        gain = agc.process(Some(&playout));

        // Capture side: the playout frame is the render reference
        echo.process_reverse(&playout);
        synth_tone(&mut scratch, 310.0, args.sample_rate, period, &mut rng);
        echo.process_capture(&scratch, &mut captured);
        if vad.process(&captured).is_voice {
            voice_frames += 1;
        }
    }

    println!("Final AGC gain hint: {:.3}", gain);
    println!("Voice frames on capture path: {}/{}", voice_frames, args.frames);

    if args.json {
        let store_stats: Vec<serde_json::Value> = stores
            .iter()
            .map(|s| {
                let st = s.stats();
                serde_json::json!({
                    "stored": st.frames_stored,
                    "popped": st.frames_popped,
                    "overwritten": st.frames_overwritten,
                    "pop_misses": st.pop_misses
                })
            })
            .collect();
        let report = serde_json::json!({
            "store": store_stats,
            "mixer": {
                "cycles": mixer.stats().mix_cycles,
                "streams_mixed": mixer.stats().streams_mixed,
                "silent_streams": mixer.stats().silent_streams
            },
            "agc_gain": gain,
            "echo_metrics": echo.metrics()
        });
        println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
    } else {
        for (i, store) in stores.iter().enumerate() {
            let st = store.stats();
            println!(
                "Stream {}: stored={} popped={} overwritten={} misses={}",
                i, st.frames_stored, st.frames_popped, st.frames_overwritten, st.pop_misses
            );
        }
        let ms = mixer.stats();
        println!(
            "Mixer: cycles={} mixed={} silent={}",
            ms.mix_cycles, ms.streams_mixed, ms.silent_streams
        );
        if let Some(m) = echo.metrics() {
            println!(
                "Echo: erl={:.1}dB erle={:.1}dB delay={}ms",
                m.erl_db, m.erle_db, m.delay_ms
            );
        }
    }

    Ok(())
}

/// Fill `frame` with a tone plus a little noise so the VAD and AGC have
/// something realistic to chew on
fn synth_tone(frame: &mut [i16], freq: f32, sample_rate: u32, period: u32, rng: &mut impl Rng) {
    let base = period as usize * frame.len();
    for (i, sample) in frame.iter_mut().enumerate() {
        let t = (base + i) as f32 / sample_rate as f32;
        let tone = (t * 2.0 * std::f32::consts::PI * freq).sin() * 8000.0;
        let noise = rng.gen_range(-200.0..200.0);
        *sample = (tone + noise) as i16;
    }
}
