//! Simulation kernel for seqflow networks.
//!
//! Provides:
//! - Model registry with name lookup and init tracking
//! - Calc-step containers (time-step, regulation, top-level meshes)
//! - Mesh convergence solver (backward+forward rounds, nested meshes)
//! - Data-exchange hook between models without a physical connection
//! - Result sinks receiving one row per tick and a final summary
//! - Paced master loop with a run/pause/stop state machine

pub mod calc_step;
pub mod control;
pub mod error;
pub mod exchange;
pub mod kernel;
pub mod mesh;
pub mod registry;
pub mod sink;

// Re-exports for public API
pub use calc_step::{CalcStepList, IterationStepList, MeshPassReport, StepKind};
pub use control::{Clock, KernelHandle, SimulatorState};
pub use error::{SimError, SimResult};
pub use exchange::{DataExchange, FieldLink, FieldLinks};
pub use kernel::{Kernel, KernelConfig};
pub use mesh::{MAX_MESH_ROUNDS, Mesh, MeshMember, MeshOutcome};
pub use registry::ModelRegistry;
pub use sink::{MemorySink, OutputField, ResultSink, RunOutcome, RunSummary, TickRow};
