//! DeskShare screen-sharing client: entry point.
//!
//! Captures the local display, joins a room on the signaling server, and
//! shares the screen with the other member of the room over WebRTC.
//!
//! # Usage
//!
//! ```text
//! deskshare-client [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Config file [default: platform config dir]
//!   --server <URL>    Signaling server WebSocket URL
//!   --room <ROOM>     Room to join
//!   --no-audio        Do not capture system audio
//!   --no-video        Do not capture the display
//!   --log-level <F>   Log filter used when RUST_LOG is unset
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Overrides        |
//! |--------------------|------------------|
//! | `DESKSHARE_SERVER` | `[signaling] url`  |
//! | `DESKSHARE_ROOM`   | `[signaling] room` |
//! | `RUST_LOG`         | `log_level`        |
//!
//! CLI flags take precedence over environment variables, which take
//! precedence over the config file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load ClientConfig (TOML) + CLI overrides
//!  └─ SessionController::new(...)
//!       ├─ WsSignalChannel    (tokio-tungstenite)
//!       ├─ WebRtcConnector    (webrtc)
//!       ├─ SyntheticCapture
//!       └─ TracingPresentation
//!  └─ controller.run()  on its own task, fed by SessionHandle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deskshare_client::application::media_capture::CaptureSource;
use deskshare_client::application::peer_manager::PeerConnector;
use deskshare_client::application::presentation::PresentationSink;
use deskshare_client::application::session_controller::SessionController;
use deskshare_client::application::signal_channel::SignalChannel;
use deskshare_client::infrastructure::capture::SyntheticCapture;
use deskshare_client::infrastructure::peer::WebRtcConnector;
use deskshare_client::infrastructure::presentation::TracingPresentation;
use deskshare_client::infrastructure::signaling::WsSignalChannel;
use deskshare_client::infrastructure::storage::config::{
    load_config, load_config_from, ClientConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// DeskShare screen-sharing client.
#[derive(Debug, Parser)]
#[command(
    name = "deskshare-client",
    about = "Share this screen with the other member of a signaling room",
    version
)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long)]
    config: Option<PathBuf>,

    /// WebSocket URL of the signaling server (`ws://` or `wss://`).
    #[arg(long, env = "DESKSHARE_SERVER")]
    server: Option<String>,

    /// Room to join.  Two members make a call.
    #[arg(long, env = "DESKSHARE_ROOM")]
    room: Option<String>,

    /// Do not capture system audio.
    #[arg(long)]
    no_audio: bool,

    /// Do not capture the display.
    #[arg(long)]
    no_video: bool,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Applies the CLI overrides on top of `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting server URL is not a WebSocket URL or
    /// the room name is empty.
    fn into_client_config(self, mut base: ClientConfig) -> anyhow::Result<ClientConfig> {
        if let Some(server) = self.server {
            base.signaling.url = server;
        }
        if let Some(room) = self.room {
            base.signaling.room = room;
        }
        if let Some(level) = self.log_level {
            base.log_level = level;
        }
        if self.no_audio {
            base.capture.audio = false;
        }
        if self.no_video {
            base.capture.video = false;
        }

        let url = &base.signaling.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            anyhow::bail!("signaling server URL must start with ws:// or wss://, got '{url}'");
        }
        if base.signaling.room.trim().is_empty() {
            anyhow::bail!("room name must not be empty");
        }
        Ok(base)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file_config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading config")?,
    };
    let config = cli.into_client_config(file_config)?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "DeskShare client starting: server={}, room={}",
        config.signaling.url, config.signaling.room
    );

    let session = config.session_config();
    session
        .ice
        .validate()
        .context("invalid ICE server configuration")?;

    let connector = WebRtcConnector::new().context("initialising WebRTC")?;
    let presentation = Arc::new(TracingPresentation::new());
    let (controller, rx) = SessionController::new(
        session,
        Arc::new(WsSignalChannel::new(config.signaling.url.clone())) as Arc<dyn SignalChannel>,
        Arc::new(connector) as Arc<dyn PeerConnector>,
        Arc::new(SyntheticCapture::default()) as Arc<dyn CaptureSource>,
        Arc::clone(&presentation) as Arc<dyn PresentationSink>,
    );
    let handle = controller.handle();
    let session_task = tokio::spawn(controller.run(rx));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C; leaving the room"),
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
        shutdown_handle.leave();
        shutdown_handle.shutdown();
    });

    handle.connect();
    info!("DeskShare client ready.  Press Ctrl-C to exit.");

    session_task.await.context("session controller task failed")?;

    info!("DeskShare client stopped: {:?}", presentation.snapshot());
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
