//! mrpd - MRP registration daemon.
//!
//! Wires the [`mrp_core`] engine to a runtime: configuration file, logging,
//! the timer task and the transport/bridge-table seams.

pub mod config;
pub mod transport;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use mrp_core::{Gvrp, GvrpCallbacks, MrpEngine, Mvrp, NormalAdminStatus, Protocol, StpPortState};

use crate::config::DaemonConfig;
use crate::transport::{LoggingTransport, VlanTable};

/// Group table backend for GVRP; the placeholder logs only.
#[derive(Debug, Default)]
struct LoggingGroupTable;

impl GvrpCallbacks for LoggingGroupTable {
    fn group_add(&self, port: u32, index: u16) -> Result<(), String> {
        info!(port, index, "group registered");
        Ok(())
    }
    fn group_remove(&self, port: u32, index: u16) {
        info!(port, index, "group deregistered");
    }
}

/// Builds the engine from the daemon configuration: registers the
/// applications, applies global/port enables and timer settings, and marks
/// the configured ports forwarding on instance 0 until a spanning-tree
/// feed is wired up.
pub fn build_engine(config: &DaemonConfig) -> anyhow::Result<(Arc<MrpEngine>, Arc<VlanTable>)> {
    let engine = Arc::new(MrpEngine::new(config.max_ports));
    let vlan_table = Arc::new(VlanTable::default());
    let transport = Arc::new(LoggingTransport::default());

    engine
        .register_application(
            Arc::new(Mvrp::new(vlan_table.clone())),
            transport.clone(),
            Arc::new(NormalAdminStatus),
        )
        .context("registering MVRP")?;
    engine
        .register_application(
            Arc::new(Gvrp::new(Arc::new(LoggingGroupTable))),
            transport,
            Arc::new(NormalAdminStatus),
        )
        .context("registering GVRP")?;

    for (protocol, proto_config) in [
        (Protocol::Mvrp, &config.mvrp),
        (Protocol::Gvrp, &config.gvrp),
    ] {
        if !proto_config.enabled {
            continue;
        }
        engine.global_enable(protocol, true)?;
        for port in &proto_config.ports {
            engine.stp_port_state_change(*port, 0, StpPortState::Forwarding)?;
            engine.port_enable(protocol, *port, true)?;
            engine.timer_config_set(protocol, *port, proto_config.timers)?;
            if proto_config.periodic {
                engine.periodic_enable_set(protocol, *port, true)?;
            }
        }
        info!(
            protocol = protocol.as_str(),
            ports = proto_config.ports.len(),
            "protocol brought up"
        );
    }

    Ok((engine, vlan_table))
}
