//! ReDroid VNC server entry point.
//!
//! Mirrors the device display to VNC viewers and injects their pointer and
//! keyboard input back into the device.
//!
//! # Usage
//!
//! ```text
//! redroid-vnc [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Config file [default: platform config dir]
//!   --port   <PORT>   RFB listener port [default: from config, 5900]
//!   --width  <PX>     Framebuffer width, 0 = native
//!   --height <PX>     Framebuffer height, 0 = native
//!   --rotate          Rotate the projected image by 90 degrees
//! ```
//!
//! CLI flags override `config.toml`; `RUST_LOG` overrides the configured log
//! level.
//!
//! # Architecture overview
//!
//! ```text
//! SyntheticDisplay thread ──on_frame_available──▶ FrameCapturePipeline
//!                                                        │ (publish loop, blocking thread)
//!                                                        ▼
//!                                              SharedFramebuffer + generation
//!                                                        │
//! VNC viewers ◀──────── RFB sessions (tokio) ◀───────────┘
//!      │
//!      └── pointer/key ──▶ RemoteDisplayServer ──▶ InputInjectionClient ──▶ input service
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vnc_core::{DisplayProjection, Orientation};

use vnc_server::application::frame_capture::{frame_channel, FrameCapturePipeline, SharedFramebuffer};
use vnc_server::application::inject_input::InputInjectionClient;
use vnc_server::application::publish_loop::PublishLoop;
use vnc_server::application::remote_display::RemoteDisplayServer;
use vnc_server::infrastructure::display::{DisplayProjector, LoggingProjector, SyntheticDisplay, TestPatternRenderer};
use vnc_server::infrastructure::input_service::{InMemoryInputManager, InMemoryServiceManager};
use vnc_server::infrastructure::rfb::{bind_listener, serve};
use vnc_server::infrastructure::storage::config::{load_config, load_config_from, ConfigError, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ReDroid VNC server.
#[derive(Debug, Parser)]
#[command(
    name = "redroid-vnc",
    about = "Mirrors the device display over VNC and injects remote input",
    version
)]
struct Cli {
    /// Path to `config.toml`.  Defaults to the platform config directory.
    #[arg(long, env = "REDROID_VNC_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port for the RFB listener.
    #[arg(long, env = "REDROID_VNC_PORT")]
    port: Option<u16>,

    /// Framebuffer width in pixels; 0 keeps the display's native width.
    #[arg(long)]
    width: Option<u32>,

    /// Framebuffer height in pixels; 0 keeps the display's native height.
    #[arg(long)]
    height: Option<u32>,

    /// Rotate the projected image by 90 degrees.
    #[arg(long)]
    rotate: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn resolve_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Ok(config) => config,
                Err(ConfigError::NoPlatformConfigDir) => ServerConfig::default(),
                Err(e) => return Err(e).context("failed to load config"),
            },
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if self.rotate {
            config.display.rotate = true;
        }
    }
}

/// Framebuffer dimensions as RFB's 16-bit sizes.
fn framebuffer_size(projection: &DisplayProjection) -> anyhow::Result<(u16, u16)> {
    let width = u16::try_from(projection.framebuffer_width)
        .with_context(|| format!("framebuffer width {} exceeds 65535", projection.framebuffer_width))?;
    let height = u16::try_from(projection.framebuffer_height)
        .with_context(|| format!("framebuffer height {} exceeds 65535", projection.framebuffer_height))?;
    Ok((width, height))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("redroid-vnc {} starting", env!("CARGO_PKG_VERSION"));

    // ── Display projection ────────────────────────────────────────────────────
    let orientation = Orientation::from_degrees(config.synthetic.orientation)
        .context("invalid [synthetic] orientation")?;
    let source = SyntheticDisplay::new(
        config.synthetic.width,
        config.synthetic.height,
        orientation,
        config.synthetic.fps,
    );
    let projection = DisplayProjection::compute(
        &source.info(),
        config.display.width,
        config.display.height,
        config.display.rotate,
    )
    .context("cannot project display")?;
    let (width, height) = framebuffer_size(&projection)?;

    let projector = LoggingProjector::new();
    projector
        .create_virtual_display(&config.server.desktop_name, &projection)
        .context("failed to create virtual display")?;

    // ── Input service ─────────────────────────────────────────────────────────
    let services = Arc::new(InMemoryServiceManager::new());
    services.register(
        &config.input.service_name,
        Arc::new(InMemoryInputManager::with_default_devices()),
    );
    let injector = InputInjectionClient::new(
        services,
        config.input.service_name.clone(),
        config.input.inject_mode,
    );
    if !injector.connect() {
        warn!("input service unavailable at startup; will retry when viewers send input");
    }

    // ── Capture pipeline ──────────────────────────────────────────────────────
    let framebuffer = SharedFramebuffer::new(width, height);
    let display = Arc::new(RemoteDisplayServer::new(
        config.server.desktop_name.clone(),
        Arc::clone(&framebuffer),
        injector,
    ));
    let (notifier, receiver) = frame_channel();
    let pipeline = FrameCapturePipeline::new(
        receiver,
        Box::new(TestPatternRenderer::new(&projection)),
        framebuffer,
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::SeqCst);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let producer = source
        .start(notifier, Arc::clone(&running))
        .context("failed to start display producer")?;

    // ── RFB listener ──────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = bind_listener(&addr).await?;
    let server = tokio::spawn(serve(listener, Arc::clone(&display), Arc::clone(&running)));

    // ── Publish loop ──────────────────────────────────────────────────────────
    let mut publish = PublishLoop::new(pipeline, Arc::clone(&display), config.display.frame_timeout());
    let loop_running = Arc::clone(&running);
    let outcome = tokio::task::spawn_blocking(move || publish.run(&loop_running))
        .await
        .context("publish loop panicked")?;

    // ── Teardown ──────────────────────────────────────────────────────────────
    running.store(false, Ordering::SeqCst);
    match tokio::task::spawn_blocking(move || producer.join()).await {
        Ok(Ok(frames)) => info!(frames, "display producer stopped"),
        _ => warn!("display producer did not stop cleanly"),
    }
    projector.destroy_virtual_display();
    server.await.context("RFB server task failed")??;

    let input = display.stats();
    info!(
        injected = input.injected,
        dropped = input.dropped,
        untranslated = input.untranslated,
        "input totals"
    );

    let stats = outcome.context("frame capture failed")?;
    info!(
        frames = stats.frames_published,
        timeouts = stats.timeouts,
        "redroid-vnc stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
