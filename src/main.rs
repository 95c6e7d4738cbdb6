use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use snapcam::{
    CameraSession, PictureOutput, RecordingOptions, RecordingState, SnapcamConfig,
    SyntheticProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "snapcam")]
#[command(about = "Camera capture pipeline demo with a synthetic sensor")]
#[command(version)]
#[command(long_about = "Interactive demo of the snapcam capture pipeline. Drives a \
synthetic in-memory sensor through the same session, capture, and recording code a \
real driver backend would use. Keys: p picture, s snapshot, r record toggle, \
f switch facing, z zoom in, q quit.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "snapcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Override the configured sensor facing
    #[arg(short, long, value_name = "FACING", help = "Start with this facing: back or front")]
    facing: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Command {
    TakePicture,
    TakeSnapshot,
    ToggleRecording,
    SwitchFacing,
    ZoomIn,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting snapcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match SnapcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(facing) = args.facing.as_deref() {
        config.camera.facing = match facing {
            "back" => snapcam::Facing::Back,
            "front" => snapcam::Facing::Front,
            other => anyhow::bail!("unknown facing '{}', expected back or front", other),
        };
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let session = Arc::new(CameraSession::new(
        config.clone(),
        Arc::new(SyntheticProvider::new()),
    ));
    session.resume().await?;

    // Print every pipeline outcome as it happens.
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("event: {}", event.description());
        }
    });

    println!("snapcam demo: p picture, s snapshot, r record toggle, f switch facing, z zoom, q quit");
    run_key_loop(session.clone(), config).await?;

    session.pause().await?;
    info!("snapcam exited");
    Ok(())
}

/// Raw-mode key reader on a blocking task, feeding commands to the
/// async dispatch loop until quit.
async fn run_key_loop(session: Arc<CameraSession>, config: SnapcamConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let key_cancel = cancel.clone();

    let reader = task::spawn_blocking(move || {
        if let Err(e) = enable_raw_mode() {
            error!("Failed to enable raw mode: {}", e);
            return;
        }
        loop {
            if key_cancel.is_cancelled() {
                break;
            }
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        let command = match key.code {
                            KeyCode::Char('p') => Some(Command::TakePicture),
                            KeyCode::Char('s') => Some(Command::TakeSnapshot),
                            KeyCode::Char('r') => Some(Command::ToggleRecording),
                            KeyCode::Char('f') => Some(Command::SwitchFacing),
                            KeyCode::Char('z') => Some(Command::ZoomIn),
                            KeyCode::Char('q') | KeyCode::Esc => {
                                key_cancel.cancel();
                                break;
                            }
                            _ => None,
                        };
                        if let Some(command) = command {
                            if tx.send(command).is_err() {
                                break;
                            }
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Keyboard poll failed: {}", e);
                    break;
                }
            }
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            command = rx.recv() => {
                let Some(command) = command else { break };
                dispatch(&session, &config, command).await;
            }
        }
    }

    reader.await?;
    Ok(())
}

async fn dispatch(session: &CameraSession, config: &SnapcamConfig, command: Command) {
    match command {
        Command::TakePicture => match session.take_picture(session.default_capture_request()) {
            Ok(ticket) => {
                match ticket.wait().await {
                    Ok(PictureOutput::Bytes(bytes)) => info!("Picture: {} bytes", bytes.len()),
                    Ok(PictureOutput::File(path)) => info!("Picture: {}", path.display()),
                    Err(e) => error!("Picture failed: {}", e),
                }
            }
            Err(e) => error!("Picture rejected: {}", e),
        },
        Command::TakeSnapshot => match session.take_snapshot(config.capture.quality) {
            Ok(ticket) => match ticket.wait().await {
                Ok(jpeg) => info!("Snapshot: {} bytes", jpeg.len()),
                Err(e) => error!("Snapshot failed: {}", e),
            },
            Err(e) => error!("Snapshot rejected: {}", e),
        },
        Command::ToggleRecording => match session.recording_state() {
            RecordingState::Idle => {
                if let Err(e) = tokio::fs::create_dir_all(&config.capture.cache_dir).await {
                    error!("Cache directory unavailable: {}", e);
                    return;
                }
                let name = format!("clip_{}.mp4", chrono::Local::now().format("%Y%m%d_%H%M%S"));
                let max_duration = (config.recording.max_duration_seconds > 0)
                    .then(|| Duration::from_secs(config.recording.max_duration_seconds as u64));
                let options = RecordingOptions {
                    output_path: PathBuf::from(&config.capture.cache_dir).join(name),
                    size: None,
                    quality: config.capture.quality,
                    with_flash: false,
                    max_duration,
                };
                if let Err(e) = session.start_recording(options).await {
                    error!("Recording start failed: {}", e);
                }
            }
            RecordingState::Started => {
                match session.stop_recording().await {
                    Ok(path) => info!("Clip written to {}", path.display()),
                    Err(e) => error!("Recording stop failed: {}", e),
                }
            }
        },
        Command::SwitchFacing => match session.switch_facing().await {
            Ok(facing) => info!("Now using the {} sensor", facing),
            Err(e) => error!("Facing switch failed: {}", e),
        },
        Command::ZoomIn => {
            // Synthesize the pinch the host would deliver on real hardware.
            let pinch_in = snapcam::TouchEvent::new(
                snapcam::TouchAction::PointerDown,
                vec![(100.0, 100.0), (200.0, 100.0)],
                (100.0, 100.0),
            );
            let widen = snapcam::TouchEvent::new(
                snapcam::TouchAction::Move,
                vec![(100.0, 100.0), (250.0, 100.0)],
                (100.0, 100.0),
            );
            if let Err(e) = session.handle_touch(pinch_in).await {
                error!("Zoom failed: {}", e);
                return;
            }
            if let Err(e) = session.handle_touch(widen).await {
                error!("Zoom failed: {}", e);
            }
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some(other) => {
            anyhow::bail!("unknown log format '{}', expected json, pretty, or compact", other)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn print_default_config() {
    let config = SnapcamConfig::default();
    match toml::to_string_pretty(&config) {
        Ok(toml) => println!("{}", toml),
        Err(e) => eprintln!("Failed to serialize default configuration: {}", e),
    }
}
