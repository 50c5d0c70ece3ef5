//! sf-net: port layer for seqflow.
//!
//! Provides:
//! - Ports carrying forward flow state and backward boundary requests
//! - A port table with phase-restricted views (`ForwardPorts`, `BackwardPorts`)
//! - A wiring builder that connects model outlets to model inlets
//!
//! # Example
//!
//! ```
//! use sf_net::{NetworkBuilder, PortSpec};
//!
//! let mut builder = NetworkBuilder::new();
//! builder.add_model("source", &[PortSpec::outlet("out")]).unwrap();
//! builder.add_model("pipe", &[PortSpec::inlet("in"), PortSpec::outlet("out")]).unwrap();
//! builder.connect("source", "out", "pipe", "in");
//! let network = builder.build().unwrap();
//!
//! // source.out/pipe.in share one port, pipe.out is a network edge.
//! assert_eq!(network.ports.len(), 2);
//! assert_eq!(network.boundary_ports().len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod port;
pub mod table;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::{Network, NetworkBuilder};
pub use error::{NetError, NetResult};
pub use port::{BoundaryRequest, Endpoint, FlowState, FluidKind, NO_REQUEST, Port, PortKind, PortSpec};
pub use table::{BackwardPorts, ForwardPorts, PortTable};
