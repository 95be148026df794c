//! vanilla-pipe: Wi-Fi broker between a Vanilla frontend and the Wii U.
//!
//! The frontend usually runs unprivileged.  It starts this process (often
//! through `pkexec` or `sudo`), waits for the line `READY` on its stderr, and
//! then sends commands to the broker's socket.
//!
//! # Usage
//!
//! ```text
//! vanilla-pipe (--local | --udp) [OPTIONS] [INTERFACE]
//!
//! Arguments:
//!   [INTERFACE]               Wireless interface to use [default: first Wi-Fi device]
//!
//! Options:
//!   --local                   Listen on /tmp/vanilla-pipe-<port>
//!   --udp                     Listen on UDP 0.0.0.0:<port>
//!   --port <PORT>             Command port [default: 51000]
//!   --socket-dir <DIR>        Directory for the local socket [default: /tmp]
//!   --config <FILE>           TOML configuration file
//!   --wifi-backend <BACKEND>  nmcli | mock [default: nmcli]
//!   --scan-timeout <SECS>     SYNC scan timeout [default: 5]
//! ```
//!
//! The single-dash forms `-local` and `-udp` are also accepted.
//!
//! # Environment variable overrides
//!
//! | Variable                  | Description                   |
//! |---------------------------|-------------------------------|
//! | `VANILLA_PIPE_PORT`       | Command port                  |
//! | `VANILLA_PIPE_SOCKET_DIR` | Directory for the local socket |
//! | `VANILLA_PIPE_CONFIG`     | TOML configuration file       |
//! | `RUST_LOG`                | `tracing` filter              |
//!
//! Command-line values win over the configuration file, which wins over the
//! built-in defaults.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use pipe_core::TransportMode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pipe_broker::application::{Broker, EventLoop};
use pipe_broker::domain::{BrokerConfig, WifiBackendKind};
use pipe_broker::infrastructure::storage::config::PipeConfigFile;
use pipe_broker::infrastructure::transport::DatagramListener;
use pipe_broker::infrastructure::wifi::build_backend;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Brokers the Wi-Fi link between a Vanilla frontend and a Wii U console.
#[derive(Debug, Parser)]
#[command(
    name = "vanilla-pipe",
    about = "Wi-Fi broker between a Vanilla frontend and the Wii U",
    version,
    group(ArgGroup::new("transport").required(true).args(["local", "udp"]))
)]
struct Cli {
    /// Listen on a local-domain datagram socket.
    #[arg(long)]
    local: bool,

    /// Listen on UDP, reachable from the network.
    #[arg(long)]
    udp: bool,

    /// Wireless interface to use.  Omit to let the backend pick one.
    interface: Option<String>,

    /// Command port; also names the local socket file.
    #[arg(long, env = "VANILLA_PIPE_PORT")]
    port: Option<u16>,

    /// Directory that holds the local socket file.
    #[arg(long, env = "VANILLA_PIPE_SOCKET_DIR")]
    socket_dir: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, env = "VANILLA_PIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Wi-Fi backend: `nmcli` or `mock`.
    #[arg(long)]
    wifi_backend: Option<WifiBackendKind>,

    /// Seconds a SYNC scan may search for the console.
    #[arg(long)]
    scan_timeout: Option<u64>,
}

impl Cli {
    fn mode(&self) -> TransportMode {
        if self.local {
            TransportMode::Local
        } else {
            TransportMode::Remote
        }
    }

    /// Merges these arguments over `file` (or the defaults when there is none).
    fn into_broker_config(self, file: Option<PipeConfigFile>) -> BrokerConfig {
        let mode = self.mode();
        let mut config = match file {
            Some(file) => file.into_broker_config(mode),
            None => BrokerConfig::with_mode(mode),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.socket_dir {
            config.socket_dir = dir;
        }
        if let Some(interface) = self.interface {
            config.interface = Some(interface);
        }
        if let Some(backend) = self.wifi_backend {
            config.wifi_backend = backend;
        }
        if let Some(secs) = self.scan_timeout {
            config.scan_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Rewrites the single-dash transport flags older frontends pass.
///
/// Works on `OsString` so a non-UTF-8 argument reaches clap, which reports
/// it as a usage error.
fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-local") => OsString::from("--local"),
            Some("-udp") => OsString::from("--udp"),
            _ => arg,
        })
        .collect()
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed; the configuration file, if any, is loaded.
/// 2. `tracing_subscriber` is initialised (stderr, `RUST_LOG` or the
///    configured level).
/// 3. SIGINT and SIGTERM are wired to a shared shutdown flag.
/// 4. The Wi-Fi capability is initialised, then the listener is bound.
/// 5. `READY` is written to stderr and the event loop runs until QUIT or a
///    signal.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args_os()));

    let file = cli
        .config
        .as_deref()
        .map(|path| {
            PipeConfigFile::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))
        })
        .transpose()?;
    let config = cli.into_broker_config(file);

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "vanilla-pipe {} starting: mode={}, port={}, backend={}",
        env!("CARGO_PKG_VERSION"),
        config.mode,
        config.port,
        config.wifi_backend
    );
    warn_if_not_root();

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    register_signals(&shutdown)?;

    // ── Wi-Fi capability ──────────────────────────────────────────────────────
    let wifi = build_backend(config.wifi_backend, &config.target_ssid_prefix)
        .context("failed to create Wi-Fi backend")?;
    if let Err(e) = wifi.init(config.interface.as_deref()) {
        error!("Wi-Fi initialization failed: {e}");
        return Err(e).context("failed to initialize Wi-Fi");
    }

    // ── Listener ──────────────────────────────────────────────────────────────
    let listener = match DatagramListener::bind(
        config.mode,
        config.port,
        &config.socket_dir,
        config.receive_timeout,
    ) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind listener: {e}");
            wifi.cleanup();
            return Err(e).context("failed to bind listener");
        }
    };

    signal_ready()?;

    let broker = Broker::new(Arc::clone(&wifi), config.scan_timeout);
    let reason = EventLoop::new(listener, broker, wifi, shutdown).run();

    info!(?reason, "vanilla-pipe stopped");
    Ok(())
}

/// Writes the readiness marker the parent process waits for.
fn signal_ready() -> anyhow::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "READY").context("failed to write readiness marker")?;
    stderr.flush().context("failed to flush readiness marker")?;
    Ok(())
}

#[cfg(unix)]
fn register_signals(shutdown: &Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::flag;

    flag::register(SIGINT, Arc::clone(shutdown)).context("failed to register SIGINT")?;
    flag::register(SIGTERM, Arc::clone(shutdown)).context("failed to register SIGTERM")?;
    Ok(())
}

#[cfg(not(unix))]
fn register_signals(shutdown: &Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::signal::SIGINT;

    signal_hook::flag::register(SIGINT, Arc::clone(shutdown))
        .context("failed to register SIGINT")?;
    Ok(())
}

#[cfg(unix)]
fn warn_if_not_root() {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } != 0 {
        tracing::warn!("not running as root; Wi-Fi control may fail without privileges");
    }
}

#[cfg(not(unix))]
fn warn_if_not_root() {}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let args = args.iter().map(OsString::from);
        Cli::parse_from(normalize_legacy_args(
            std::iter::once(OsString::from("vanilla-pipe")).chain(args),
        ))
    }

    #[test]
    fn test_local_flag_selects_local_mode() {
        // Arrange / Act
        let cli = parse(&["--local"]);

        // Assert
        assert_eq!(cli.mode(), TransportMode::Local);
    }

    #[test]
    fn test_udp_flag_selects_remote_mode() {
        let cli = parse(&["--udp"]);
        assert_eq!(cli.mode(), TransportMode::Remote);
    }

    #[test]
    fn test_legacy_single_dash_flags_are_accepted() {
        assert_eq!(parse(&["-local"]).mode(), TransportMode::Local);
        assert_eq!(parse(&["-udp", "wlan0"]).mode(), TransportMode::Remote);
    }

    #[test]
    fn test_transport_flag_is_required() {
        let result = Cli::try_parse_from(["vanilla-pipe", "wlan0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_local_and_udp_are_exclusive() {
        let result = Cli::try_parse_from(["vanilla-pipe", "--local", "--udp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = Cli::try_parse_from(["vanilla-pipe", "--udp", "--wifi-backend", "iwd"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_positional_interface_is_captured() {
        let cli = parse(&["--local", "wlan1"]);
        assert_eq!(cli.interface.as_deref(), Some("wlan1"));
    }

    #[test]
    fn test_normalize_leaves_other_args_alone() {
        let args = normalize_legacy_args(
            ["vanilla-pipe", "-udp", "--port", "9", "wlan0"].map(OsString::from),
        );
        assert_eq!(
            args,
            ["vanilla-pipe", "--udp", "--port", "9", "wlan0"].map(OsString::from)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_interface_is_a_usage_error_not_a_panic() {
        use std::os::unix::ffi::OsStringExt;

        // Arrange
        let interface = OsString::from_vec(vec![b'w', b'l', 0xFF, b'0']);
        let argv = vec![
            OsString::from("vanilla-pipe"),
            OsString::from("-local"),
            interface.clone(),
        ];

        // Act
        let normalized = normalize_legacy_args(argv);
        let result = Cli::try_parse_from(normalized.clone());

        // Assert
        assert_eq!(normalized[1], OsString::from("--local"));
        assert_eq!(normalized[2], interface);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_broker_config_uses_defaults_without_file() {
        // Arrange
        let cli = Cli {
            local: true,
            udp: false,
            interface: None,
            port: None,
            socket_dir: None,
            config: None,
            wifi_backend: None,
            scan_timeout: None,
        };

        // Act
        let config = cli.into_broker_config(None);

        // Assert
        assert_eq!(config, BrokerConfig::with_mode(TransportMode::Local));
    }

    #[test]
    fn test_cli_values_override_file_values() {
        // Arrange
        let file = PipeConfigFile::from_toml_str(
            "[network]\nport = 52000\nsocket_dir = \"/run/pipe\"\n[wifi]\ninterface = \"wlan9\"\n",
        )
        .unwrap();
        let cli = Cli {
            local: false,
            udp: true,
            interface: Some("wlan1".into()),
            port: Some(53000),
            socket_dir: None,
            config: None,
            wifi_backend: Some(WifiBackendKind::Mock),
            scan_timeout: Some(2),
        };

        // Act
        let config = cli.into_broker_config(Some(file));

        // Assert
        assert_eq!(config.mode, TransportMode::Remote);
        assert_eq!(config.port, 53000);
        assert_eq!(config.socket_dir, PathBuf::from("/run/pipe"));
        assert_eq!(config.interface.as_deref(), Some("wlan1"));
        assert_eq!(config.wifi_backend, WifiBackendKind::Mock);
        assert_eq!(config.scan_timeout, Duration::from_secs(2));
    }
}
