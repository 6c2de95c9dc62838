//! Demo driver: records a short synthetic note, previews it, and either
//! sends it through the chat composer or deletes it.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use notecap::config::{CaptureConfig, Config};
use notecap::controller::{CaptureController, SessionPhase};
use notecap::device::CaptureMode;
use notecap::submit::{ChatComposer, SubmissionMetadata};

#[derive(Parser, Debug)]
#[command(name = "notecap", about = "Media capture and preview engine demo")]
struct Args {
    /// Config file (without extension)
    #[arg(long, default_value = "config/notecap")]
    config: String,

    /// Capture mode: audio or video
    #[arg(long, default_value = "audio")]
    mode: String,

    /// Seconds to record before stopping
    #[arg(long, default_value_t = 3)]
    record_secs: u64,

    /// Send the finished note instead of deleting it
    #[arg(long)]
    send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let mode = match args.mode.as_str() {
        "audio" => CaptureMode::Audio,
        "video" => CaptureMode::Video,
        other => anyhow::bail!("unknown capture mode: {}", other),
    };

    let capture = CaptureConfig::from_config(&config, "demo-composer", mode);
    let mut controller = CaptureController::new(capture);

    controller.start(mode)?;

    match controller.next_transition().await? {
        SessionPhase::Recording => {}
        SessionPhase::Error => {
            eprintln!("{}", serde_json::to_string_pretty(&controller.stats())?);
            controller.acknowledge_error()?;
            return Ok(());
        }
        phase => anyhow::bail!("unexpected phase after start: {:?}", phase),
    }

    info!("recording for {}s", args.record_secs);
    tokio::time::sleep(Duration::from_secs(args.record_secs)).await;

    let phase = controller.stop().await?;
    if phase != SessionPhase::Preview {
        anyhow::bail!("capture produced no artifact (phase {:?})", phase);
    }

    // Play a slice of the preview and show what the visualizer sees
    controller.toggle_playback().await?;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let frame = controller.visualizer().sample();
    info!("visualization bars: {:?}", frame.bars);
    controller.toggle_playback().await?;

    if args.send {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);
        let composer = ChatComposer::new(outbound_tx);

        controller
            .send(&composer, SubmissionMetadata::default())
            .await?;

        if let Some(message) = outbound_rx.recv().await {
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
    } else {
        controller.delete().await?;
    }

    println!("{}", serde_json::to_string_pretty(&controller.stats())?);

    Ok(())
}
