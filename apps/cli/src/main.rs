//! Live captions from a local audio source.
//!
//! Captures audio (microphone or a system loopback device), streams it to
//! the realtime transcription service through a session, and prints
//! incremental and final captions to stdout.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use livecap_audio::{CaptureSource, CaptureStream};
use livecap_caption::{CaptionSink, CaptionUpdate};
use livecap_session::{RealtimeSession, SessionConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livecap", about = "Stream live audio to realtime English captions")]
struct Args {
    /// Token backend base URL.
    #[arg(long, default_value = "http://localhost:3000")]
    backend_url: String,

    /// Capture device name; defaults to the default input device.
    #[arg(long)]
    device: Option<String>,

    /// Capture system audio via an installed loopback device instead of
    /// a microphone.
    #[arg(long)]
    system_audio: bool,

    /// Realtime session model.
    #[arg(long, default_value = livecap_protocol::DEFAULT_REALTIME_MODEL)]
    model: String,

    /// Transcription model.
    #[arg(long, default_value = livecap_protocol::DEFAULT_TRANSCRIPTION_MODEL)]
    transcription_model: String,

    /// Voice activity detection sensitivity (lower detects speech faster).
    #[arg(long, default_value_t = 0.3)]
    vad_threshold: f32,

    /// Audio retained before a detected speech start, in milliseconds.
    #[arg(long, default_value_t = 200)]
    vad_prefix_padding_ms: u32,

    /// Silence required before speech counts as stopped, in milliseconds.
    #[arg(long, default_value_t = 160)]
    vad_silence_duration_ms: u32,

    /// List capture devices and exit.
    #[arg(long)]
    list_devices: bool,
}

/// Prints captions to stdout: incremental updates redraw the current
/// line, finals commit it.
struct StdoutCaptionSink;

impl CaptionSink for StdoutCaptionSink {
    fn publish(&self, update: CaptionUpdate) {
        let mut out = std::io::stdout().lock();
        if update.should_clear {
            let _ = writeln!(out);
        } else if update.is_final {
            let _ = writeln!(out, "\r{}", update.english);
        } else {
            let _ = write!(out, "\r{}", update.english);
            let _ = out.flush();
        }
    }

    fn report_error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if args.list_devices {
        for device in livecap_audio::list_devices()? {
            println!(
                "{}{}{}",
                device.name,
                if device.is_default { " (default)" } else { "" },
                if device.is_loopback() { " [loopback]" } else { "" },
            );
        }
        return Ok(());
    }

    let source = if args.system_audio {
        CaptureSource::SystemLoopback
    } else {
        CaptureSource::Input {
            device_id: args.device.clone(),
        }
    };
    let mut capture = CaptureStream::new(source).context("failed to open capture source")?;
    let frames = capture
        .take_receiver()
        .context("capture receiver already taken")?;

    let config = SessionConfig {
        backend_url: args.backend_url,
        realtime_model: args.model,
        transcription_model: args.transcription_model,
        turn_detection: livecap_protocol::TurnDetection {
            threshold: args.vad_threshold,
            prefix_padding_ms: args.vad_prefix_padding_ms,
            silence_duration_ms: args.vad_silence_duration_ms,
            ..Default::default()
        },
    };

    let session = RealtimeSession::start(config, std::sync::Arc::new(StdoutCaptionSink))
        .await
        .context("failed to start realtime session")?;
    tracing::info!("session started; speak (or play audio) to see captions");

    // Bridge the blocking capture channel into the session loop without
    // ever blocking the audio callback itself.
    let frame_tx = session.frame_sender();
    let bridge = std::thread::spawn(move || {
        for frame in frames.iter() {
            if frame_tx.blocking_send(frame).is_err() {
                break;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("stopping");
    session.stop().await;
    drop(capture);
    let _ = bridge.join();

    Ok(())
}
