//! Wiring validation.

use std::collections::HashSet;

use crate::builder::{Connection, ModelPorts};
use crate::error::{NetError, NetResult};
use crate::port::{Endpoint, PortKind};

fn port_kind(models: &[ModelPorts], endpoint: &Endpoint) -> NetResult<PortKind> {
    let model = models
        .iter()
        .find(|m| m.name == endpoint.model)
        .ok_or_else(|| NetError::UnknownModel {
            name: endpoint.model.clone(),
        })?;
    model
        .specs
        .iter()
        .find(|s| s.name == endpoint.port)
        .map(|s| s.kind)
        .ok_or_else(|| NetError::UnknownPort {
            model: endpoint.model.clone(),
            port: endpoint.port.clone(),
        })
}

fn expect_kind(endpoint: &Endpoint, actual: PortKind, expected: PortKind) -> NetResult<()> {
    if actual != expected {
        return Err(NetError::WrongDirection {
            model: endpoint.model.clone(),
            port: endpoint.port.clone(),
            expected: expected.as_str(),
            actual: actual.as_str(),
        });
    }
    Ok(())
}

/// Every connection runs from an existing outlet to an existing inlet of a
/// different model, and no port is used twice.
pub(crate) fn validate_connections(models: &[ModelPorts], connections: &[Connection]) -> NetResult<()> {
    let mut used: HashSet<&Endpoint> = HashSet::new();

    for conn in connections {
        expect_kind(&conn.from, port_kind(models, &conn.from)?, PortKind::Outlet)?;
        expect_kind(&conn.to, port_kind(models, &conn.to)?, PortKind::Inlet)?;

        if conn.from.model == conn.to.model {
            return Err(NetError::SelfLoop {
                model: conn.from.model.clone(),
            });
        }

        for endpoint in [&conn.from, &conn.to] {
            if !used.insert(endpoint) {
                return Err(NetError::AlreadyConnected {
                    model: endpoint.model.clone(),
                    port: endpoint.port.clone(),
                });
            }
        }
    }

    Ok(())
}
