//! Daemon configuration, loaded from a JSON file.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use mrp_core::TimerConfig;

/// Per-protocol daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Enable the protocol globally at startup.
    pub enabled: bool,
    /// Ports to enable the protocol on.
    pub ports: Vec<u32>,
    /// Enable periodic re-declaration on those ports.
    pub periodic: bool,
    /// Protocol timers applied to every configured port.
    pub timers: TimerConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ports: Vec::new(),
            periodic: false,
            timers: TimerConfig::default(),
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Number of bridge ports.
    pub max_ports: usize,
    /// Idle poll interval when the engine reports no pending timer.
    pub tick_interval_ms: u64,
    pub mvrp: ProtocolConfig,
    pub gvrp: ProtocolConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_ports: 32,
            tick_interval_ms: 100,
            mvrp: ProtocolConfig {
                enabled: true,
                ..ProtocolConfig::default()
            },
            gvrp: ProtocolConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_ports == 0 {
            anyhow::bail!("max_ports must be at least 1");
        }
        for proto in [&self.mvrp, &self.gvrp] {
            proto
                .timers
                .validate()
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            if let Some(port) = proto.ports.iter().find(|p| **p as usize >= self.max_ports) {
                anyhow::bail!("port {} outside 0..{}", port, self.max_ports);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.max_ports, 32);
        assert!(config.mvrp.enabled);
        assert!(!config.gvrp.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let raw = r#"{
            "max_ports": 8,
            "mvrp": { "enabled": true, "ports": [0, 1, 2], "periodic": true }
        }"#;
        let config: DaemonConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.max_ports, 8);
        assert_eq!(config.mvrp.ports, vec![0, 1, 2]);
        assert!(config.mvrp.periodic);
        // Omitted sections keep their defaults.
        assert_eq!(config.mvrp.timers, TimerConfig::default());
        assert_eq!(config.tick_interval_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_port() {
        let raw = r#"{ "max_ports": 4, "mvrp": { "ports": [7] } }"#;
        let config: DaemonConfig = serde_json::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_timers() {
        let raw = r#"{ "mvrp": { "timers": { "join_ms": 1, "leave_ms": 600, "leaveall_ms": 10000 } } }"#;
        let config: DaemonConfig = serde_json::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}
