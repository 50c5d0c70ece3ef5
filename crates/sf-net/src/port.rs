//! Port data: forward flow state and backward boundary requests.

use sf_core::units::{MassRate, Pressure, Temperature, constants, k, kgps, pa};
use sf_core::PortId;
use std::fmt;
use std::str::FromStr;

/// Reserved value meaning "no boundary request" in a pressure, temperature
/// or mass-flow slot of a `BoundaryRequest`.
pub const NO_REQUEST: f64 = -999_999.99;

/// Identity of the fluid carried through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FluidKind {
    #[default]
    Unknown,
    Air,
    Nitrogen,
    Oxygen,
    Hydrogen,
    Helium,
    Water,
}

impl fmt::Display for FluidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FluidKind::Unknown => "unknown",
            FluidKind::Air => "air",
            FluidKind::Nitrogen => "n2",
            FluidKind::Oxygen => "o2",
            FluidKind::Hydrogen => "h2",
            FluidKind::Helium => "he",
            FluidKind::Water => "water",
        };
        f.write_str(name)
    }
}

impl FromStr for FluidKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "air" => Ok(FluidKind::Air),
            "n2" | "nitrogen" => Ok(FluidKind::Nitrogen),
            "o2" | "oxygen" => Ok(FluidKind::Oxygen),
            "h2" | "hydrogen" => Ok(FluidKind::Hydrogen),
            "he" | "helium" => Ok(FluidKind::Helium),
            "water" | "h2o" => Ok(FluidKind::Water),
            "unknown" => Ok(FluidKind::Unknown),
            other => Err(format!("unknown fluid '{other}'")),
        }
    }
}

/// Direction of a port relative to the model that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Flow enters the model here.
    Inlet,
    /// Flow leaves the model here.
    Outlet,
}

impl PortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PortKind::Inlet => "inlet",
            PortKind::Outlet => "outlet",
        }
    }
}

/// A named port a model type declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub kind: PortKind,
}

impl PortSpec {
    pub const fn inlet(name: &'static str) -> Self {
        Self {
            name,
            kind: PortKind::Inlet,
        }
    }

    pub const fn outlet(name: &'static str) -> Self {
        Self {
            name,
            kind: PortKind::Outlet,
        }
    }
}

/// Forward state written by the producing model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowState {
    pub fluid: FluidKind,
    pub p: Pressure,
    pub t: Temperature,
    pub mdot: MassRate,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            fluid: FluidKind::Unknown,
            p: pa(constants::P_ATM_PA),
            t: k(293.15),
            mdot: kgps(0.0),
        }
    }
}

impl FlowState {
    pub fn new(fluid: FluidKind, p: Pressure, t: Temperature, mdot: MassRate) -> Self {
        Self { fluid, p, t, mdot }
    }
}

/// Boundary request written by the consuming model during a backward pass.
///
/// Slots holding `NO_REQUEST` carry no constraint; read them through the
/// `Option` accessors rather than the raw fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryRequest {
    pub fluid: FluidKind,
    pub p: Pressure,
    pub t: Temperature,
    pub mdot: MassRate,
}

impl Default for BoundaryRequest {
    fn default() -> Self {
        Self::none()
    }
}

fn requested(value: f64) -> bool {
    value != NO_REQUEST
}

impl BoundaryRequest {
    /// A request that constrains nothing.
    pub fn none() -> Self {
        Self {
            fluid: FluidKind::Unknown,
            p: pa(NO_REQUEST),
            t: k(NO_REQUEST),
            mdot: kgps(NO_REQUEST),
        }
    }

    /// Request a mass flow and nothing else.
    pub fn mass_flow(mdot: MassRate) -> Self {
        Self {
            mdot,
            ..Self::none()
        }
    }

    pub fn with_pressure(mut self, p: Pressure) -> Self {
        self.p = p;
        self
    }

    pub fn pressure(&self) -> Option<Pressure> {
        requested(self.p.value).then_some(self.p)
    }

    pub fn temperature(&self) -> Option<Temperature> {
        requested(self.t.value).then_some(self.t)
    }

    pub fn mass_flow_rate(&self) -> Option<MassRate> {
        requested(self.mdot.value).then_some(self.mdot)
    }

    pub fn is_empty(&self) -> bool {
        self.pressure().is_none() && self.temperature().is_none() && self.mass_flow_rate().is_none()
    }
}

/// One side of a port: which model and which of its declared ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub model: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(model: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.port)
    }
}

/// A connection between a producing and a consuming model.
///
/// A missing endpoint marks the edge of the simulated network.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: PortId,
    pub upstream: Option<Endpoint>,
    pub downstream: Option<Endpoint>,
    pub(crate) forward: FlowState,
    pub(crate) boundary: BoundaryRequest,
}

impl Port {
    pub fn new(id: PortId, upstream: Option<Endpoint>, downstream: Option<Endpoint>) -> Self {
        Self {
            id,
            upstream,
            downstream,
            forward: FlowState::default(),
            boundary: BoundaryRequest::none(),
        }
    }

    pub fn forward(&self) -> &FlowState {
        &self.forward
    }

    pub fn boundary(&self) -> &BoundaryRequest {
        &self.boundary
    }

    /// True when one side is not attached to any model.
    pub fn is_network_edge(&self) -> bool {
        self.upstream.is_none() || self.downstream.is_none()
    }
}
