use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mirror_core::config::{CadencePolicy, CaptureMode, MirrorConfig};
use mirror_core::controller::MirrorController;
use mirror_core::host::{HostHandle, MirrorHost, Notice};
use mirror_sim::SimBackend;

mod commands;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "display-mirror")]
#[command(about = "Mirror the main display onto an attached external display")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "MIRROR_CONFIG_PATH", global = true)]
    config: Option<PathBuf>,

    /// Capture cadence in frames per second
    #[arg(long, global = true)]
    fps: Option<u16>,

    /// How frames are captured
    #[arg(long, value_enum, global = true)]
    capture: Option<CaptureArg>,

    /// Where the capture timer runs
    #[arg(long, value_enum, global = true)]
    cadence: Option<CadenceArg>,

    /// Start in TV-safe mode
    #[arg(long, global = true)]
    safe_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MIRROR_LOG_LEVEL", global = true)]
    log_level: String,

    /// Run these `;`-separated commands instead of reading stdin
    #[arg(long)]
    script: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save the effective configuration and exit
    WriteConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CaptureArg {
    FullScreen,
    Window,
}

impl From<CaptureArg> for CaptureMode {
    fn from(arg: CaptureArg) -> Self {
        match arg {
            CaptureArg::FullScreen => CaptureMode::FullScreen,
            CaptureArg::Window => CaptureMode::Window,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CadenceArg {
    BackgroundThread,
    UiTimer,
}

impl From<CadenceArg> for CadencePolicy {
    fn from(arg: CadenceArg) -> Self {
        match arg {
            CadenceArg::BackgroundThread => CadencePolicy::BackgroundThread,
            CadenceArg::UiTimer => CadencePolicy::UiTimer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("display-mirror v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(MirrorConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        MirrorConfig::load(&config_path)?
    } else {
        info!("no config found, using defaults");
        MirrorConfig::default()
    };

    // CLI args override config file
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    if let Some(capture) = cli.capture {
        config.capture_mode = capture.into();
    }
    if let Some(cadence) = cli.cadence {
        config.cadence = cadence.into();
    }
    if cli.safe_mode {
        config.safe_mode = true;
    }

    if let Some(Commands::WriteConfig) = cli.command {
        config.save(&config_path)?;
        info!("config saved to {}", config_path.display());
        return Ok(());
    }

    run_mirror(config, cli.script).await
}

async fn run_mirror(config: MirrorConfig, script: Option<String>) -> Result<()> {
    info!(
        "{} fps, {:?} capture, {:?} cadence, safe mode {}",
        config.fps, config.capture_mode, config.cadence, config.safe_mode
    );

    let backend = SimBackend::new(&config);
    let controller = MirrorController::new(backend.collaborators(&config), config.clone());
    let (host, handle, notices) =
        MirrorHost::new(controller, backend.bus.clone(), config.auto_start_on_connect);
    let host_task = tokio::spawn(host.run());
    tokio::spawn(report_notices(notices));

    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    match script {
        Some(script) => {
            tokio::spawn(async move {
                for line in commands::split_script(&script) {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }
        None => {
            println!("{}", commands::HELP);
            tokio::spawn(read_stdin(line_tx));
        }
    }

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else {
                    info!("end of commands, shutting down");
                    break;
                };
                match Command::parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = execute(command, &backend, &handle).await {
                            warn!("{:#}", e);
                        }
                    }
                    Err(e) => warn!("{:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!("{}", e);
    }
    match host_task.await {
        Ok(result) => result?,
        Err(e) => error!("mirror host task failed: {}", e),
    }
    Ok(())
}

async fn execute(command: Command, backend: &SimBackend, handle: &HostHandle) -> Result<()> {
    match command {
        Command::Connect(modes) => {
            backend.registry.connect(modes)?;
        }
        Command::Disconnect => {
            if !backend.registry.disconnect() {
                warn!("no external display connected");
            }
        }
        Command::Modes(modes) => backend.registry.change_modes(modes)?,
        Command::Rotate(orientation) => {
            backend.orientation.set(orientation);
        }
        Command::Mirror(enabled) => handle.set_mirroring(enabled).await?,
        Command::Safe(enabled) => handle.set_safe_mode(enabled).await?,
        Command::Alert(visible) => backend.screen.set_alert(visible),
        Command::FailEvery(n) => backend.screen.set_fail_every(n),
        Command::Status => {
            let status = handle.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Snapshot(path) => {
            // let queued work reach the surface first
            handle.status().await?;
            backend
                .surfaces
                .save_snapshot(&path)
                .context("snapshot failed")?;
        }
        Command::Wait(duration) => tokio::time::sleep(duration).await,
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
    Ok(())
}

async fn read_stdin(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("failed to read stdin: {}", e);
                break;
            }
        }
    }
}

async fn report_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            Notice::DisplayConnected => info!("external display connected"),
            Notice::DisplayDisconnected => info!("external display disconnected"),
            Notice::DisplayModeChanged => info!("external display changed modes"),
            Notice::MirroringStarted { display: target, mode } => {
                info!("mirroring onto {} at {}", target, mode)
            }
            Notice::MirroringStopped => info!("mirroring stopped"),
            Notice::StartFailed(reason) => warn!("could not start mirroring: {}", reason),
        }
    }
}
