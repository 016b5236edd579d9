use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Server configuration, loadable from a TOML file. Every section and field
/// is optional; CLI flags override whatever the file provides.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub pool: PoolConfig,
    pub limits: LimitsConfig,
    pub idle: IdleConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            bind_address: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

/// The connection worker pool: a fixed number of workers pulling accepted
/// connections from a bounded queue. When every worker is busy and the queue
/// is full, the acceptor waits; it never serves a connection itself.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: 4,
            queue_depth: 16,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_nickname_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_nickname_length: 32,
        }
    }
}

/// Inactivity-driven shutdown: once zero clients have been connected for
/// `shutdown_after_secs`, the server shuts itself down. The window is
/// sampled every `poll_interval_secs` against a monotonic last-activity
/// timestamp rather than rearming a timer.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdleConfig {
    pub shutdown_after_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        IdleConfig {
            shutdown_after_secs: 180,
            poll_interval_secs: 5,
        }
    }
}

impl IdleConfig {
    pub fn shutdown_after(&self) -> Duration {
        Duration::from_secs(self.shutdown_after_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Loads and parses a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_contract() {
        let config = Config::default();
        assert_eq!(config.network.port, 8080);
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.limits.max_nickname_length, 32);
        assert_eq!(config.idle.shutdown_after(), Duration::from_secs(180));
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config: Config = toml::from_str(
            r#"
            [network]
            port = 9000

            [idle]
            shutdown_after_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.idle.shutdown_after_secs, 30);
    }
}
