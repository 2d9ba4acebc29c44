//! ambiplayer - Main entry point
//!
//! Command-line front end for the playback engine: load a file, attach
//! an output device, pick a decode strategy, and stream until the track
//! ends or the user interrupts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ambiplayer::audio::AudioOutput;
use ambiplayer::{
    ChannelFormat, DecoderVariant, EventBus, PlaybackEngine, PlayerConfig, PlayerEvent,
};

/// Command-line arguments for ambiplayer
#[derive(Parser, Debug)]
#[command(name = "ambiplayer")]
#[command(about = "Ambisonic audio file player")]
#[command(version)]
struct Args {
    /// Audio file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Output device name (default device if omitted)
    #[arg(short, long, env = "AMBIPLAYER_DEVICE")]
    device: Option<String>,

    /// Decode strategy
    #[arg(long, value_enum, default_value_t = DecoderArg::Raw)]
    decoder: DecoderArg,

    /// Ambisonic channel convention of the source
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Master volume, 0.0 to 1.0
    #[arg(short, long)]
    volume: Option<f32>,

    /// List available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Config file path
    #[arg(short, long, env = "AMBIPLAYER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum DecoderArg {
    Raw,
    Uhj,
    Ambisonics,
}

impl From<DecoderArg> for DecoderVariant {
    fn from(arg: DecoderArg) -> Self {
        match arg {
            DecoderArg::Raw => DecoderVariant::Raw,
            DecoderArg::Uhj => DecoderVariant::StereoUhj,
            DecoderArg::Ambisonics => DecoderVariant::Ambisonics,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Acn,
    Fuma,
}

impl From<FormatArg> for ChannelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Acn => ChannelFormat::Acn,
            FormatArg::Fuma => ChannelFormat::FuMa,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ambiplayer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to enumerate devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = PlayerConfig::load(args.config.as_deref()).context("Failed to load config")?;

    let events = EventBus::new(config.event_capacity);
    let mut engine = PlaybackEngine::new(events.clone());

    engine.set_channel_format(args.format.map(Into::into).unwrap_or(config.channel_format));
    engine.set_volume(args.volume.unwrap_or(config.volume));

    // Print events as JSON lines, the machine-readable side of the CLI.
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        }
    });

    let file = args
        .file
        .context("no audio file given (see --help)")?;
    engine
        .open(&file)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    engine
        .set_decoder(args.decoder.into())
        .context("Decoder rejected the source channel layout")?;

    let device = args.device.as_deref().or(config.device.as_deref());
    engine
        .set_device(device)
        .context("Failed to open output device")?;

    info!(
        "Playing {} on {}",
        file.display(),
        engine.device_name().unwrap_or_else(|| "default".into())
    );
    engine.play();

    wait_for_end(&events).await;

    engine.stop();
    info!("Playback finished");
    Ok(())
}

/// Run until the track ends or the user interrupts.
async fn wait_for_end(events: &EventBus) {
    let mut rx = events.subscribe();
    let end_of_file = async {
        while let Ok(event) = rx.recv().await {
            if matches!(event, PlayerEvent::EndOfFile { .. }) {
                break;
            }
        }
    };

    tokio::select! {
        _ = end_of_file => {
            info!("End of file reached");
        },
        _ = shutdown_signal() => {},
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
