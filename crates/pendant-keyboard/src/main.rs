//! cncjs-pendant-keyboard entry point.
//!
//! Turns a USB keyboard (typically a wireless numeric keypad) into a jog
//! pendant for a CNCjs server.
//!
//! # Usage
//!
//! ```text
//! cncjs-pendant-keyboard --device by-id/usb-Telink_Wireless_Receiver-if01-event-kbd \
//!                        --port /dev/ttyUSB0 --bindings numpad
//! ```
//!
//! Every option can also be set in the settings file (see
//! `infrastructure::storage::config`) or through the environment variable
//! named in `--help`.  Command-line values win over the file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ settings file + CLI overrides
//!  ├─ ConfigLoader        -- binding table, validated before anything starts
//!  ├─ CncjsConnection     (Tokio task, reconnect loop)
//!  ├─ EvdevInputSource    (Tokio task, one device)
//!  └─ dispatch loop       -- one transition at a time through DispatchCore
//! ```

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pendant_core::KeyTransition;
use pendant_keyboard::application::bindings::BindingTable;
use pendant_keyboard::application::configs::{ConfigLoader, ConfigSource};
use pendant_keyboard::application::dispatch::{
    format_binding_line, CommandChannel, DispatchCore, DispatchOptions,
};
use pendant_keyboard::infrastructure::auth::{mint_token, parse_lifetime, resolve_secret};
use pendant_keyboard::infrastructure::channel::{
    CncjsConnection, CncjsConnectionConfig, ConnectionEvent,
};
use pendant_keyboard::infrastructure::input_capture::{CaptureError, KeyInputSource};
use pendant_keyboard::infrastructure::storage::config::{
    config_file_path, load_config_from, AppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Keyboard pendant for CNCjs.
///
/// Reads key events from an input device and sends the bound commands to a
/// CNCjs server.
#[derive(Debug, Parser)]
#[command(
    name = "cncjs-pendant-keyboard",
    about = "Use a USB keyboard as a jog pendant for CNCjs",
    version
)]
struct Cli {
    /// Settings file to read instead of the platform default.
    #[arg(long, env = "PENDANT_CONFIG")]
    config: Option<PathBuf>,

    /// Input device: a name under /dev/input (e.g. `event3` or
    /// `by-id/...-event-kbd`) or an absolute path.
    #[arg(short = 'd', long, env = "PENDANT_DEVICE")]
    device: Option<String>,

    /// Binding configuration: a built-in name, a name looked up in the
    /// bindings directory, or a path to a `.toml` file.
    #[arg(short = 'c', long, env = "PENDANT_BINDINGS")]
    bindings: Option<String>,

    /// Serial port of the controller, as known to CNCjs.
    #[arg(short = 'p', long, env = "CNCJS_PORT")]
    port: Option<String>,

    /// Baud rate of the serial port.
    #[arg(short = 'b', long, env = "CNCJS_BAUDRATE")]
    baudrate: Option<u32>,

    /// Controller firmware.
    #[arg(long, env = "CNCJS_CONTROLLER_TYPE",
          value_parser = ["Grbl", "Marlin", "Smoothie", "TinyG"])]
    controller_type: Option<String>,

    /// Host name or IP address of the CNCjs server.
    #[arg(short = 's', long, env = "CNCJS_SOCKET_ADDRESS")]
    socket_address: Option<String>,

    /// TCP port of the CNCjs server.
    #[arg(long, env = "CNCJS_SOCKET_PORT")]
    socket_port: Option<u16>,

    /// Secret used to sign the access token.  Read from `~/.cncrc` when
    /// not given.
    #[arg(long, env = "CNCJS_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Access token lifetime, e.g. `30d` or `12h`.
    #[arg(long, env = "CNCJS_ACCESS_TOKEN_LIFETIME")]
    access_token_lifetime: Option<String>,

    /// Seconds between reconnect attempts.
    #[arg(long)]
    reconnect_interval: Option<u64>,

    /// Do not grab the device; its keys also reach the desktop.
    #[arg(long)]
    no_grab: bool,

    /// Log every key transition, bound or not.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "PENDANT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Validate the bindings, list them and exit.
    #[arg(long)]
    check: bool,
}

impl Cli {
    /// Overrides settings with every option given on the command line.
    fn apply(&self, settings: &mut AppConfig) {
        let conn = &mut settings.connection;
        if let Some(v) = &self.port {
            conn.port = v.clone();
        }
        if let Some(v) = self.baudrate {
            conn.baudrate = v;
        }
        if let Some(v) = &self.controller_type {
            conn.controller_type = v.clone();
        }
        if let Some(v) = &self.socket_address {
            conn.socket_address = v.clone();
        }
        if let Some(v) = self.socket_port {
            conn.socket_port = v;
        }
        if let Some(v) = &self.secret {
            conn.secret = Some(v.clone());
        }
        if let Some(v) = &self.access_token_lifetime {
            conn.access_token_lifetime = v.clone();
        }
        if let Some(v) = self.reconnect_interval {
            conn.reconnect_interval_secs = v;
        }

        let kbd = &mut settings.keyboard;
        if let Some(v) = &self.device {
            kbd.device = Some(v.clone());
        }
        if let Some(v) = &self.bindings {
            kbd.bindings = v.clone();
        }
        if let Some(v) = &self.log_level {
            kbd.log_level = v.clone();
        }
        if self.no_grab {
            kbd.exclusive = false;
        }
        if self.verbose {
            kbd.verbose = true;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let mut settings = load_config_from(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    // `RUST_LOG` wins; otherwise the configured level, falling back to `info`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.keyboard.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("cncjs-pendant-keyboard starting");

    // ── Bindings ──────────────────────────────────────────────────────────────
    let loader = ConfigLoader::new(search_dirs(&settings_path));
    let configuration = loader
        .load(ConfigSource::Named(settings.keyboard.bindings.clone()))
        .with_context(|| format!("failed to load bindings \"{}\"", settings.keyboard.bindings))?;
    log_bindings(&configuration.bindings);

    if cli.check {
        info!("{} binding(s) valid", configuration.bindings.len());
        return Ok(());
    }

    let device = settings
        .keyboard
        .device
        .clone()
        .context("no input device configured: pass --device or set keyboard.device")?;

    // ── Connection ────────────────────────────────────────────────────────────
    let secret = resolve_secret(settings.connection.secret.as_deref())?;
    let lifetime = parse_lifetime(&settings.connection.access_token_lifetime)?;
    let token = mint_token(&secret, lifetime)?;

    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(CncjsConnection::new(CncjsConnectionConfig::from_settings(
        &settings.connection,
        token,
    )));
    info!(
        "connecting to CNCjs at {}:{} (port {})",
        settings.connection.socket_address, settings.connection.socket_port, settings.connection.port
    );
    let mut events = Arc::clone(&connection).start(Arc::clone(&running));

    // ── Input ─────────────────────────────────────────────────────────────────
    let source = open_input_source(&device, settings.keyboard.exclusive)?;
    let mut transitions = source
        .start()
        .with_context(|| format!("failed to start reading {}", source.device_path().display()))?;
    info!("listening on {}", source.device_path().display());

    let channel: Arc<dyn CommandChannel> = connection;
    let mut core = DispatchCore::new(
        configuration,
        channel,
        settings.connection.port.clone(),
        DispatchOptions {
            verbose: settings.keyboard.verbose,
        },
    );

    let result = run(&mut core, &mut transitions, &mut events, source.device_path()).await;

    running.store(false, Ordering::Relaxed);
    source.stop();
    info!("cncjs-pendant-keyboard stopped");
    result
}

/// Runs the dispatch loop until Ctrl-C or until the device goes away.
async fn run(
    core: &mut DispatchCore,
    transitions: &mut mpsc::UnboundedReceiver<KeyTransition>,
    events: &mut mpsc::Receiver<ConnectionEvent>,
    device: &Path,
) -> anyhow::Result<()> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            transition = transitions.recv() => match transition {
                Some(transition) => {
                    core.on_raw_transition(&transition);
                }
                None => anyhow::bail!("input device {} closed", device.display()),
            },
            Some(event) = events.recv() => log_connection_event(event),
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

/// Directories searched for `<name>.toml` binding files.
fn search_dirs(settings_path: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = settings_path.parent() {
        dirs.push(dir.join("bindings"));
    }
    dirs.push(PathBuf::from("bindings"));
    dirs
}

fn log_bindings(bindings: &BindingTable) {
    info!("{} binding(s) loaded", bindings.len());
    for binding in bindings.bindings() {
        info!("{}", format_binding_line(&binding.pattern, &binding.description));
    }
}

fn log_connection_event(event: ConnectionEvent) {
    match event {
        ConnectionEvent::Connected => info!("session established"),
        ConnectionEvent::PortOpened { port, baudrate } => {
            info!("Connected to port \"{port}\" (Baud rate: {baudrate})")
        }
        ConnectionEvent::PortError { port } => error!("Error opening serial port \"{port}\""),
        ConnectionEvent::SerialRead(line) if line.is_empty() => {}
        ConnectionEvent::SerialRead(line) => info!("{line}"),
        ConnectionEvent::Disconnected => warn!("connection to CNCjs lost; commands are dropped until it is back"),
    }
}

#[cfg(target_os = "linux")]
fn open_input_source(device: &str, exclusive: bool) -> Result<Box<dyn KeyInputSource>, CaptureError> {
    use pendant_keyboard::infrastructure::input_capture::{linux::EvdevInputSource, resolve_device_path};

    Ok(Box::new(EvdevInputSource::new(resolve_device_path(device), exclusive)))
}

#[cfg(not(target_os = "linux"))]
fn open_input_source(_device: &str, _exclusive: bool) -> Result<Box<dyn KeyInputSource>, CaptureError> {
    Err(CaptureError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
