//! Client settings: an optional JSON file, then command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ultimate_mirror::pacing::DEFAULT_TARGET_NANOS_PER_TICK;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub username: String,
    /// `host:port` of the server.
    pub server_address: String,
    /// View distance requested in client information.
    pub view_distance: u32,
    pub tick_interval_ms: u64,
    pub target_nanos_per_tick: f64,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub brand: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "Player".into(),
            server_address: "127.0.0.1:25565".into(),
            view_distance: 8,
            tick_interval_ms: 50,
            target_nanos_per_tick: DEFAULT_TARGET_NANOS_PER_TICK,
            log_filter: "info".into(),
            brand: "ultimate".into(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, then `--config <file>` if given, then individual flags.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = match flag(args, "--config") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(name) = flag(args, "--username") {
            self.username = name;
        }
        if let Some(address) = flag(args, "--server") {
            self.server_address = address;
        }
        if let Some(distance) = flag(args, "--view-distance") {
            self.view_distance = distance
                .parse()
                .with_context(|| format!("invalid --view-distance {:?}", distance))?;
        }
        if let Some(interval) = flag(args, "--tick-ms") {
            self.tick_interval_ms = interval
                .parse()
                .with_context(|| format!("invalid --tick-ms {:?}", interval))?;
        }
        if let Some(filter) = flag(args, "--log") {
            self.log_filter = filter;
        }
        Ok(())
    }

    /// `(host, port)` split out of `server_address`; the port defaults to 25565.
    pub fn host_and_port(&self) -> (String, u16) {
        match self.server_address.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (self.server_address.clone(), 25565),
            },
            None => (self.server_address.clone(), 25565),
        }
    }
}

/// Value following `name` on the command line.
fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter().skip_while(|a| *a != name).nth(1).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_override_defaults() {
        let config = ClientConfig::from_args(&args(&[
            "ultimate-client",
            "--username",
            "Alex",
            "--view-distance",
            "12",
            "--server",
            "mc.example.net:25570",
        ]))
        .unwrap();
        assert_eq!(config.username, "Alex");
        assert_eq!(config.view_distance, 12);
        assert_eq!(config.host_and_port(), ("mc.example.net".to_string(), 25570));
        assert_eq!(config.tick_interval_ms, 50);
    }

    #[test]
    fn bad_number_is_an_error() {
        assert!(ClientConfig::from_args(&args(&["x", "--tick-ms", "soon"])).is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{ "username": "Steve", "brand": "custom" }"#).unwrap();
        assert_eq!(config.username, "Steve");
        assert_eq!(config.brand, "custom");
        assert_eq!(config.target_nanos_per_tick, DEFAULT_TARGET_NANOS_PER_TICK);
    }

    #[test]
    fn address_without_port_uses_default() {
        let config = ClientConfig {
            server_address: "localhost".into(),
            ..ClientConfig::default()
        };
        assert_eq!(config.host_and_port(), ("localhost".to_string(), 25565));
    }
}
