//! Incremental network wiring.

use std::collections::HashMap;

use sf_core::PortId;

use crate::error::{NetError, NetResult};
use crate::port::{Endpoint, Port, PortKind, PortSpec};
use crate::table::PortTable;
use crate::validate;

#[derive(Debug, Clone)]
pub(crate) struct ModelPorts {
    pub(crate) name: String,
    pub(crate) specs: Vec<PortSpec>,
}

#[derive(Debug, Clone)]
pub(crate) struct Connection {
    pub(crate) from: Endpoint,
    pub(crate) to: Endpoint,
}

/// Builder for wiring model ports together.
///
/// Declare every model's ports with `add_model`, record outlet→inlet links
/// with `connect`, then call `build()` to validate and allocate the port
/// table. Declared ports left unconnected become network-edge ports.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    models: Vec<ModelPorts>,
    connections: Vec<Connection>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a model and its ports.
    pub fn add_model(&mut self, name: impl Into<String>, specs: &[PortSpec]) -> NetResult<()> {
        let name = name.into();
        if self.models.iter().any(|m| m.name == name) {
            return Err(NetError::DuplicateModel { name });
        }
        self.models.push(ModelPorts {
            name,
            specs: specs.to_vec(),
        });
        Ok(())
    }

    /// Connect `from_model.from_port` (an outlet) to `to_model.to_port` (an inlet).
    ///
    /// Checked in `build()`.
    pub fn connect(&mut self, from_model: &str, from_port: &str, to_model: &str, to_port: &str) {
        self.connections.push(Connection {
            from: Endpoint::new(from_model, from_port),
            to: Endpoint::new(to_model, to_port),
        });
    }

    /// Validate the wiring and allocate ports.
    ///
    /// Connected pairs share one port, in connection order; unconnected
    /// declared ports follow in model declaration order.
    pub fn build(self) -> NetResult<Network> {
        validate::validate_connections(&self.models, &self.connections)?;

        let mut ports = Vec::new();
        let mut bindings = HashMap::new();

        for conn in &self.connections {
            let id = PortId::from_index(ports.len() as u32);
            bindings.insert(conn.from.clone(), id);
            bindings.insert(conn.to.clone(), id);
            ports.push(Port::new(id, Some(conn.from.clone()), Some(conn.to.clone())));
        }

        for model in &self.models {
            for spec in &model.specs {
                let endpoint = Endpoint::new(model.name.clone(), spec.name);
                if bindings.contains_key(&endpoint) {
                    continue;
                }
                let id = PortId::from_index(ports.len() as u32);
                tracing::debug!(port = %endpoint, "unconnected port becomes network edge");
                bindings.insert(endpoint.clone(), id);
                let port = match spec.kind {
                    PortKind::Outlet => Port::new(id, Some(endpoint), None),
                    PortKind::Inlet => Port::new(id, None, Some(endpoint)),
                };
                ports.push(port);
            }
        }

        Ok(Network {
            ports: PortTable::new(ports),
            bindings,
        })
    }
}

/// Wired network: the port table plus the endpoint→port lookup.
#[derive(Debug, Clone)]
pub struct Network {
    pub ports: PortTable,
    bindings: HashMap<Endpoint, PortId>,
}

impl Network {
    /// Port bound to `model.port`.
    pub fn port_of(&self, model: &str, port: &str) -> NetResult<PortId> {
        self.bindings
            .get(&Endpoint::new(model, port))
            .copied()
            .ok_or_else(|| NetError::UnknownPort {
                model: model.to_string(),
                port: port.to_string(),
            })
    }

    /// Ports with a missing endpoint (the edges of the simulated network).
    pub fn boundary_ports(&self) -> Vec<PortId> {
        self.ports
            .iter()
            .filter(|p| p.is_network_edge())
            .map(|p| p.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_inlet_builder() -> NetworkBuilder {
        let mut b = NetworkBuilder::new();
        b.add_model("a", &[PortSpec::outlet("out")]).unwrap();
        b.add_model("b", &[PortSpec::outlet("out")]).unwrap();
        b.add_model(
            "mix",
            &[
                PortSpec::inlet("in1"),
                PortSpec::inlet("in2"),
                PortSpec::outlet("out"),
            ],
        )
        .unwrap();
        b
    }

    #[test]
    fn shared_ports_and_edges() {
        let mut b = two_inlet_builder();
        b.connect("a", "out", "mix", "in1");
        b.connect("b", "out", "mix", "in2");
        let net = b.build().unwrap();

        assert_eq!(net.ports.len(), 3);
        assert_eq!(net.port_of("a", "out").unwrap(), net.port_of("mix", "in1").unwrap());
        assert_eq!(net.port_of("a", "out").unwrap(), PortId::from_index(0));

        let edges = net.boundary_ports();
        assert_eq!(edges, vec![net.port_of("mix", "out").unwrap()]);
        let edge = net.ports.get(edges[0]).unwrap();
        assert_eq!(edge.upstream, Some(Endpoint::new("mix", "out")));
        assert_eq!(edge.downstream, None);
    }

    #[test]
    fn duplicate_model_rejected() {
        let mut b = two_inlet_builder();
        assert_eq!(
            b.add_model("a", &[]),
            Err(NetError::DuplicateModel { name: "a".into() })
        );
    }

    #[test]
    fn unknown_port_lookup() {
        let net = two_inlet_builder().build().unwrap();
        assert!(matches!(
            net.port_of("mix", "in3"),
            Err(NetError::UnknownPort { .. })
        ));
    }
}
