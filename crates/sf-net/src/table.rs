//! Port storage and the phase-restricted views models write through.
//!
//! Forward values may only be written through `ForwardPorts`, boundary
//! requests only through `BackwardPorts`. The kernel hands out exactly one
//! view at a time, so the single-writer-per-phase rule needs no locking.

use crate::error::{NetError, NetResult};
use crate::port::{BoundaryRequest, FlowState, Port};
use sf_core::PortId;

/// All ports of a network, indexed by `PortId`.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    ports: Vec<Port>,
}

impl PortTable {
    pub fn new(ports: Vec<Port>) -> Self {
        Self { ports }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub fn get(&self, id: PortId) -> NetResult<&Port> {
        self.ports.get(id.slot()).ok_or(NetError::PortOutOfRange {
            id,
            len: self.ports.len(),
        })
    }

    fn get_mut(&mut self, id: PortId) -> NetResult<&mut Port> {
        let len = self.ports.len();
        self.ports
            .get_mut(id.slot())
            .ok_or(NetError::PortOutOfRange { id, len })
    }

    pub fn forward(&self, id: PortId) -> NetResult<FlowState> {
        Ok(self.get(id)?.forward)
    }

    pub fn boundary(&self, id: PortId) -> NetResult<BoundaryRequest> {
        Ok(self.get(id)?.boundary)
    }

    /// View for time-step, regulation and iteration (forward) passes.
    pub fn forward_view(&mut self) -> ForwardPorts<'_> {
        ForwardPorts { table: self }
    }

    /// View for back-iteration passes.
    pub fn backward_view(&mut self) -> BackwardPorts<'_> {
        BackwardPorts { table: self }
    }
}

/// Read everything, write forward values only.
pub struct ForwardPorts<'a> {
    table: &'a mut PortTable,
}

impl ForwardPorts<'_> {
    pub fn forward(&self, id: PortId) -> NetResult<FlowState> {
        self.table.forward(id)
    }

    pub fn boundary(&self, id: PortId) -> NetResult<BoundaryRequest> {
        self.table.boundary(id)
    }

    pub fn set_forward(&mut self, id: PortId, state: FlowState) -> NetResult<()> {
        self.table.get_mut(id)?.forward = state;
        Ok(())
    }
}

/// Read everything, write boundary requests only.
pub struct BackwardPorts<'a> {
    table: &'a mut PortTable,
}

impl BackwardPorts<'_> {
    pub fn forward(&self, id: PortId) -> NetResult<FlowState> {
        self.table.forward(id)
    }

    pub fn boundary(&self, id: PortId) -> NetResult<BoundaryRequest> {
        self.table.boundary(id)
    }

    pub fn set_boundary(&mut self, id: PortId, request: BoundaryRequest) -> NetResult<()> {
        self.table.get_mut(id)?.boundary = request;
        Ok(())
    }
}
