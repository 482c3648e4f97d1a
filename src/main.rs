//! Fleet relay server binary
//!
//! Run with: fleet-relay [--port PORT]
//!
//! Every option can also come from the environment (or a `.env` file), e.g.
//! `PORT=8080 fleet-relay`.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::Layer;

use fleet_relay::{FleetServer, HubConfig, ProducerPolicy, RelayConfig, ServerConfig};

/// Device fleet control server with a live camera relay
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Maximum concurrent relay sockets (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Per-viewer frame buffer; a full buffer drops frames
    #[arg(long, env = "VIEWER_BUFFER", default_value_t = 64)]
    viewer_buffer: usize,

    /// What to do when a second camera connects for a streaming device
    #[arg(long, env = "PRODUCER_POLICY", value_enum, default_value_t = PolicyArg::Reject)]
    producer_policy: PolicyArg,

    /// Seconds between pings on relay sockets
    #[arg(long, env = "PING_INTERVAL_SECS", default_value_t = 15)]
    ping_interval_secs: u64,

    /// Seconds of silence before a relay socket is dropped
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 45)]
    idle_timeout_secs: u64,

    /// Refresh a device's last contact whenever it polls for commands
    #[arg(long, env = "REFRESH_ON_POLL")]
    refresh_on_poll: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Reject,
    Replace,
}

impl From<PolicyArg> for ProducerPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Reject => ProducerPolicy::Reject,
            PolicyArg::Replace => ProducerPolicy::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .bind(SocketAddr::new(self.host, self.port))
            .max_connections(self.max_connections)
            .ping_interval(Duration::from_secs(self.ping_interval_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .relay(
                RelayConfig::default()
                    .viewer_buffer(self.viewer_buffer)
                    .producer_policy(self.producer_policy.into()),
            )
            .hub(HubConfig::default().refresh_on_poll(self.refresh_on_poll))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Fleet relay starting");

    let server = FleetServer::new(cli.server_config());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    server
        .run_until(shutdown)
        .await
        .with_context(|| format!("server on {} failed", server.bind_addr()))
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = match cli.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["fleet-relay"]).unwrap();
        let config = cli.server_config();

        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.relay.producer_policy, ProducerPolicy::Reject);
        assert!(!config.hub.refresh_on_poll);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "fleet-relay",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--producer-policy",
            "replace",
            "--refresh-on-poll",
            "-vv",
        ])
        .unwrap();
        let config = cli.server_config();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.relay.producer_policy, ProducerPolicy::Replace);
        assert!(config.hub.refresh_on_poll);
        assert_eq!(cli.verbose, 2);
    }
}
