//! diagen - dialogue generation proxy and spectrum renderer
//!
//! Subcommands:
//! - `diagen serve` - Run the HTTP proxy and UI
//! - `diagen config` - Print the effective configuration
//! - `diagen scope <wav>` - Render visualizer frames for a WAV file as PNGs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diaconf::DiaConfig;
use diagen::{inference, router, telemetry, AppState};
use scope::native::{render_wav, RenderMode, RenderOptions};

#[derive(Parser)]
#[command(name = "diagen")]
#[command(about = "Text-to-dialogue proxy with a spectral visualizer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP proxy
    Serve {
        /// Config file, replacing ./diagen.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// HTTP port, overriding [bind] http_port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration and where it came from
    Config {
        /// Config file, replacing ./diagen.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render visualizer frames for a WAV file
    Scope {
        /// WAV file to play through the analyser
        wav: PathBuf,

        /// Directory for frame_NNNNN.png files
        #[arg(short, long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value = "60")]
        frames: usize,

        /// Frames per second of playback
        #[arg(long, default_value = "30")]
        fps: f64,

        #[arg(long, default_value = "720")]
        width: u32,

        #[arg(long, default_value = "120")]
        height: u32,

        /// Draw the procedural shimmer instead of the spectrum
        #[arg(long)]
        shimmer: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => serve(config, port).await,
        Commands::Config { config } => {
            let (config, sources) = DiaConfig::load_with_sources_from(config.as_deref())
                .context("Failed to load configuration")?;
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml());
            Ok(())
        }
        Commands::Scope {
            wav,
            out,
            frames,
            fps,
            width,
            height,
            shimmer,
        } => {
            tracing_subscriber::fmt().with_env_filter("info").init();
            let options = RenderOptions {
                wav,
                out_dir: out,
                frames,
                fps,
                width,
                height,
                mode: if shimmer {
                    RenderMode::Shimmer
                } else {
                    RenderMode::Spectrum
                },
            };
            let written = render_wav(&options).context("Failed to render frames")?;
            tracing::info!("🖼️  Wrote {} frames to {}", written, options.out_dir.display());
            Ok(())
        }
    }
}

async fn serve(config_path: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let (mut config, sources) = DiaConfig::load_with_sources_from(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = port {
        config.infra.bind.http_port = port;
    }

    let telemetry =
        telemetry::init(&config.infra.telemetry).context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::info!("📄 Loaded config: {}", file.display());
    }

    let (client, model) = inference::from_config(&config.infra.remote);
    tracing::info!("🎙️  Backend: {} ({})", client.name(), model);

    let state = AppState::new(
        client,
        model,
        config.infra.proxy.clone(),
        config.defaults.clone(),
    );
    let app = router(state);

    let addr = config.infra.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("🚀 diagen listening on http://{}", addr);
    tracing::info!("   UI:       GET  http://{}/", addr);
    tracing::info!("   Generate: POST http://{}/api/generate-audio", addr);
    tracing::info!("   Health:   GET  http://{}/health", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    tracing::info!("👋 Server stopped");
    if let Err(e) = telemetry.shutdown() {
        tracing::error!("{:#}", e);
    }
    served
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
