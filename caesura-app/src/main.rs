//! Caesura console host.
//!
//! Wraps [`caesura_core::RecordingSession`] in a small stdin command loop:
//! `start` opens the microphone and spawns the consumer worker, `stop` ends
//! the recording, prints session totals and saves the full capture as a
//! timestamped WAV, `exit` does the same and quits. Segment and status
//! output goes through `tracing`; prompts and totals go to stdout.

mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use caesura_core::audio::device::list_input_devices;
use caesura_core::{RecordingSession, RecordingSink, SessionConfig};
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use worker::SegmentWorker;

/// How long `stop` waits for the consumer worker to drain the queue.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "caesura")]
#[command(version, about = "Real-time audio segmentation console", long_about = None)]
struct Cli {
    /// Input device name; the default input is used when omitted
    #[arg(long)]
    device: Option<String>,

    /// List available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Directory recordings are saved into
    #[arg(long, default_value = "recordings")]
    output_dir: PathBuf,

    /// Cycle duration in milliseconds
    #[arg(long)]
    cycle_ms: Option<u64>,

    /// Relative silence threshold as a fraction of the cycle RMS
    #[arg(long)]
    split_ratio: Option<f32>,

    /// Absolute RMS floor in raw i16 units
    #[arg(long)]
    energy_floor: Option<f32>,

    /// Minimum emitted segment duration in milliseconds
    #[arg(long)]
    min_segment_ms: Option<u64>,

    /// Forced-cut cap for continuous speech, in milliseconds
    #[arg(long)]
    max_segment_ms: Option<u64>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(cycle_ms) = self.cycle_ms {
            config.segmenter.cycle_ms = cycle_ms;
        }
        if let Some(split_ratio) = self.split_ratio {
            config.segmenter.split_ratio = split_ratio;
        }
        if let Some(energy_floor) = self.energy_floor {
            config.segmenter.energy_floor = energy_floor;
        }
        if let Some(min_segment_ms) = self.min_segment_ms {
            config.segmenter.min_segment_ms = min_segment_ms;
        }
        if let Some(max_segment_ms) = self.max_segment_ms {
            config.segmenter.max_segment_ms = max_segment_ms;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caesura=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        for device in list_input_devices() {
            let marker = if device.is_default { "  (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    info!("caesura starting");
    let session = Arc::new(RecordingSession::new(cli.session_config()));
    spawn_event_forwarders(&session);

    println!("commands: start | stop | exit");
    let mut worker: Option<SegmentWorker> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "start" => {
                if worker.is_some() {
                    println!("already recording");
                    continue;
                }
                let session_for_start = Arc::clone(&session);
                let device = cli.device.clone();
                match tokio::task::spawn_blocking(move || {
                    session_for_start.start_with_device(device)
                })
                .await?
                {
                    Ok(segments) => {
                        worker = Some(worker::spawn(segments));
                        println!("recording; pause naturally to split segments");
                    }
                    Err(e) => println!("could not start recording: {e}"),
                }
            }
            "stop" => match worker.take() {
                Some(w) => stop_recording(&session, w, &cli.output_dir).await?,
                None => println!("not recording"),
            },
            "exit" => break,
            other => println!("unknown command {other:?}; expected start, stop or exit"),
        }
    }

    // Reached on `exit` or stdin EOF; close out an active recording first.
    if let Some(w) = worker.take() {
        stop_recording(&session, w, &cli.output_dir).await?;
    }
    info!("caesura exiting");
    Ok(())
}

/// Stop the session, wait for the worker, print totals and save the WAV.
async fn stop_recording(
    session: &Arc<RecordingSession>,
    worker: SegmentWorker,
    output_dir: &Path,
) -> Result<()> {
    let session_for_stop = Arc::clone(session);
    tokio::task::spawn_blocking(move || session_for_stop.stop()).await??;

    if let Some(report) = worker.join(WORKER_JOIN_TIMEOUT) {
        println!(
            "{} segments ({} speech-bearing), {:.1} s of segmented audio",
            report.segments,
            report.speech_bearing,
            report.audio_ms as f64 / 1000.0
        );
    }

    let summary = session.diagnostics_snapshot();
    println!(
        "cycles {} | splits {} | forced cuts {} | rejected {} short, {} quiet",
        summary.cycles_processed,
        summary.splits_found,
        summary.forced_cuts,
        summary.rejected_short,
        summary.rejected_quiet,
    );

    let sink = session.recording();
    if sink.is_empty() {
        println!("no audio captured, nothing saved");
    } else {
        // The loop keeps accepting commands after a failed save.
        match save_recording(&sink, output_dir) {
            Ok(path) => println!("recording saved to {}", path.display()),
            Err(e) => println!("could not save recording: {e:#}"),
        }
    }
    Ok(())
}

/// Persist the full capture under `<output_dir>/<YYYY-MM-DD_HHMMSS>.wav`.
fn save_recording(sink: &RecordingSink, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let stamp = Local::now().format("%Y-%m-%d_%H%M%S");
    let path = output_dir.join(format!("{stamp}.wav"));
    sink.save_wav(&path)?;
    Ok(path)
}

/// Forward session events to the log output.
fn spawn_event_forwarders(session: &Arc<RecordingSession>) {
    let mut status_rx = session.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => match event.detail {
                    Some(detail) => {
                        info!(status = ?event.status, detail = %detail, "session status")
                    }
                    None => info!(status = ?event.status, "session status"),
                },
                Err(RecvError::Lagged(n)) => {
                    warn!("status receiver lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut activity_rx = session.subscribe_activity();
    tokio::spawn(async move {
        loop {
            match activity_rx.recv().await {
                Ok(event) => {
                    // The pipeline emits tens of these per second; sample them.
                    if event.seq % 25 == 0 {
                        debug!(
                            seq = event.seq,
                            rms = format_args!("{:.1}", event.rms),
                            above_floor = event.above_floor,
                            "level"
                        );
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("activity receiver lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
