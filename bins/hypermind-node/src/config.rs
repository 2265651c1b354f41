//! Environment-driven node configuration.
//!
//! Every knob has a default suitable for a vanilla deployment; environment
//! variables override individually. Unparseable values fall back to the
//! default with a warning rather than aborting startup.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use hypermind_gossip::DEFAULT_MAX_PEERS;
use hypermind_transport::TransportConfig;

use crate::DEFAULT_HTTP_PORT;

/// Complete configuration for one node process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Dashboard port. Environment variable: `PORT`.
    pub http_port: u16,

    /// Registry ceiling. Environment variable: `MAX_PEERS`.
    pub max_peers: usize,

    /// Share coordinates from startup. Environment variable:
    /// `LOCATION_OPTIN`.
    pub location_optin: bool,

    /// Where to append the count time-series; unset disables it.
    /// Environment variable: `HISTORY_PATH`.
    pub history_path: Option<PathBuf>,

    /// Sampling interval for the time-series, in seconds.
    /// Environment variable: `HISTORY_INTERVAL`.
    pub history_interval: Duration,

    /// Swarm and bootstrap settings.
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            max_peers: DEFAULT_MAX_PEERS,
            location_optin: false,
            history_path: None,
            history_interval: Duration::from_secs(60),
            transport: TransportConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("PORT") {
            config.http_port = port;
        }
        if let Some(max) = env_parse::<usize>("MAX_PEERS") {
            config.max_peers = max;
        }
        config.location_optin = env_flag("LOCATION_OPTIN").unwrap_or(config.location_optin);
        config.history_path = std::env::var("HISTORY_PATH").ok().map(PathBuf::from);
        if let Some(secs) = env_parse::<u64>("HISTORY_INTERVAL") {
            config.history_interval = Duration::from_secs(secs);
        }

        let t = &mut config.transport;
        if let Some(enabled) = env_flag("ENABLE_IPV4_SCAN") {
            t.scan_enabled = enabled;
        }
        if let Some(port) = env_parse::<u16>("SCAN_PORT") {
            t.scan_port = port;
        }
        if let Some(ms) = env_parse::<u64>("BOOTSTRAP_TIMEOUT") {
            t.bootstrap_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = env_flag("PEER_CACHE_ENABLED") {
            t.cache_enabled = enabled;
        }
        if let Ok(path) = std::env::var("PEER_CACHE_PATH") {
            t.cache_path = PathBuf::from(path);
        }
        if let Some(secs) = env_parse::<u64>("PEER_CACHE_MAX_AGE") {
            t.cache_max_age = Duration::from_secs(secs);
        }
        if let Some(ip) = env_parse::<Ipv4Addr>("BOOTSTRAP_PEER_IP") {
            t.bootstrap_peer_ip = Some(ip);
        }

        config
    }
}

/// Parse an environment variable, warning (not failing) on bad values.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}

/// Boolean environment flag: `1`/`true`/`yes` (any case) mean on.
fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    Some(matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = NodeConfig::default();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.max_peers, 1_000_000);
        assert!(!config.location_optin);
        assert!(config.history_path.is_none());
        assert!(!config.transport.scan_enabled);
        assert!(config.transport.cache_enabled);
    }

    #[test]
    fn env_flag_parses_truthy_values() {
        // Env-var tests mutate process state; keep them to pure helpers
        // by going through a scoped variable.
        std::env::set_var("HYPERMIND_TEST_FLAG", "TRUE");
        assert_eq!(env_flag("HYPERMIND_TEST_FLAG"), Some(true));
        std::env::set_var("HYPERMIND_TEST_FLAG", "0");
        assert_eq!(env_flag("HYPERMIND_TEST_FLAG"), Some(false));
        std::env::remove_var("HYPERMIND_TEST_FLAG");
        assert_eq!(env_flag("HYPERMIND_TEST_FLAG"), None);
    }

    #[test]
    fn env_parse_rejects_garbage() {
        std::env::set_var("HYPERMIND_TEST_PORT", "not-a-port");
        assert_eq!(env_parse::<u16>("HYPERMIND_TEST_PORT"), None);
        std::env::set_var("HYPERMIND_TEST_PORT", "8080");
        assert_eq!(env_parse::<u16>("HYPERMIND_TEST_PORT"), Some(8080));
        std::env::remove_var("HYPERMIND_TEST_PORT");
    }
}
