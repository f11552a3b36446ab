//! Command line and environment configuration.

use std::time::Duration;

use clap::Parser;
use parley_client::ws::WsConnectorConfig;
use parley_core::{ConnectionConfig, ReconnectPolicy};

/// Parley terminal chat client
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(about = "Terminal client for Parley chat rooms")]
#[command(version)]
pub struct Args {
    /// Socket base URL; the room id is appended as a path segment
    #[arg(long, env = "PARLEY_SERVER", default_value = "ws://localhost:8000/ws/chat")]
    pub server: String,

    /// REST API base URL for history, read receipts and room listing
    #[arg(long, env = "PARLEY_API", default_value = "http://localhost:8000/api")]
    pub api: String,

    /// Access token
    #[arg(long, env = "PARLEY_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Local user id, used to tell own messages apart
    #[arg(short, long, env = "PARLEY_USER")]
    pub user: String,

    /// Room to join. Without it the visible rooms are listed.
    #[arg(short, long, env = "PARLEY_ROOM")]
    pub room: Option<String>,

    /// Seconds between heartbeat pings
    #[arg(long, default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Close the socket after this many unanswered pings
    #[arg(long)]
    pub missed_pongs: Option<u32>,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds; attempt n waits n units
    #[arg(long, default_value_t = 3000)]
    pub backoff_ms: u64,

    /// Seconds to wait for the socket handshake
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PARLEY_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Session tuning derived from the flags.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            missed_pong_limit: self.missed_pongs,
            reconnect: ReconnectPolicy {
                max_attempts: self.max_attempts,
                base_interval: Duration::from_millis(self.backoff_ms),
            },
        }
    }

    /// Socket connector tuning derived from the flags.
    pub fn connector_config(&self) -> WsConnectorConfig {
        WsConnectorConfig { connect_timeout: Duration::from_secs(self.connect_timeout_secs) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["parley", "--token", "t", "--user", "7"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_session_defaults() {
        let args = parse(&[]);
        assert_eq!(args.connection_config(), ConnectionConfig::default());
        assert_eq!(args.connector_config(), WsConnectorConfig::default());
        assert!(args.room.is_none());
    }

    #[test]
    fn flags_override_tuning() {
        let args = parse(&[
            "--room",
            "12",
            "--max-attempts",
            "2",
            "--backoff-ms",
            "500",
            "--missed-pongs",
            "3",
        ]);
        let config = args.connection_config();

        assert_eq!(args.room.as_deref(), Some("12"));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.delay_for(2), Duration::from_secs(1));
        assert_eq!(config.missed_pong_limit, Some(3));
    }
}
