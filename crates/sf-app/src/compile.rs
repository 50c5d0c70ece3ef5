//! Project → kernel compilation.
//!
//! Instantiates one model per `ModelDef`, wires their ports, builds the
//! mesh tree and attaches exchanges and outputs. Models that belong to no
//! mesh still take part in time and regulation steps but never iterate.

use std::time::Duration;

use sf_components::{FlowSink, Junction, Model, Pipe, PressureSource, Tank, Valve};
use sf_core::units::{k, kgps, pa};
use sf_core::Accuracy;
use sf_net::{FluidKind, NetworkBuilder};
use sf_project::{MemberRef, MeshDef, ModelDef, ModelKindDef, Project, split_ref};
use sf_results::RunSettings;
use sf_sim::{FieldLink, FieldLinks, Kernel, KernelConfig, Mesh, ModelRegistry, OutputField};

use crate::error::{AppError, AppResult};

/// Command-line overrides of the project's kernel settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOverrides {
    pub step_s: Option<f64>,
    pub pacing_ms: Option<u64>,
    pub t_end_s: Option<f64>,
    pub start_paused: bool,
}

/// Kernel settings after applying overrides.
pub fn effective_settings(project: &Project, overrides: &RunOverrides) -> RunSettings {
    RunSettings {
        step_s: overrides.step_s.unwrap_or(project.kernel.step_s),
        pacing_ms: overrides.pacing_ms.unwrap_or(project.kernel.pacing_ms),
        t_end_s: overrides.t_end_s.or(project.kernel.t_end_s),
    }
}

fn kernel_config(settings: &RunSettings, overrides: &RunOverrides) -> KernelConfig {
    KernelConfig {
        step_s: settings.step_s,
        interval: Duration::from_millis(settings.pacing_ms),
        t_end_s: settings.t_end_s,
        max_ticks: None,
        start_paused: overrides.start_paused,
    }
}

/// Instantiate the model a definition describes.
pub fn build_model(def: &ModelDef, accuracy: Accuracy) -> AppResult<Box<dyn Model>> {
    let name = def.id.as_str();
    let model: Box<dyn Model> = match &def.kind {
        ModelKindDef::PressureSource { p_pa, t_k, fluid } => {
            let fluid: FluidKind = fluid
                .parse()
                .map_err(|e: String| AppError::compile(format!("model {name}: {e}")))?;
            Box::new(PressureSource::new(name, fluid, pa(*p_pa), k(*t_k)))
        }
        ModelKindDef::FlowSink { mdot_kgps } => Box::new(FlowSink::new(name, kgps(*mdot_kgps))),
        ModelKindDef::Pipe { k } => Box::new(Pipe::new(name, *k)),
        ModelKindDef::Valve {
            k_open,
            opening,
            tau_s,
            rate_limit_per_s,
            regul_every,
        } => Box::new(
            Valve::new(name, *k_open, *opening)
                .with_actuator(*tau_s, *rate_limit_per_s)?
                .with_regul_every(*regul_every),
        ),
        ModelKindDef::Junction { split } => Box::new(
            Junction::new(name)
                .with_split(*split)
                .with_accuracy(accuracy),
        ),
        ModelKindDef::Tank {
            volume_m3,
            p0_pa,
            t0_k,
        } => Box::new(Tank::new(name, *volume_m3, *p0_pa, *t0_k)?.with_accuracy(accuracy)),
    };
    Ok(model)
}

fn parse_ref<'a>(reference: &'a str, context: &str) -> AppResult<(&'a str, &'a str)> {
    split_ref(reference)
        .ok_or_else(|| AppError::compile(format!("malformed {context} reference '{reference}'")))
}

fn build_mesh(project: &Project, def: &MeshDef, registry: &ModelRegistry) -> AppResult<Mesh> {
    let mut mesh = Mesh::new(def.id.as_str());
    for member in def.member_refs() {
        mesh = match member {
            MemberRef::Model(id) => mesh.with_leaf(registry.id_of(id)?),
            MemberRef::Mesh(id) => {
                let sub = project
                    .mesh(id)
                    .ok_or_else(|| AppError::compile(format!("unknown mesh '{id}'")))?;
                mesh.with_submesh(build_mesh(project, sub, registry)?)
            }
        };
    }
    Ok(mesh)
}

fn require_field(registry: &ModelRegistry, model: &str, field: &str) -> AppResult<()> {
    if !registry.get(model)?.field_names().iter().any(|f| *f == field) {
        return Err(AppError::compile(format!("model {model} has no field '{field}'")));
    }
    Ok(())
}

fn field_links(project: &Project, registry: &ModelRegistry) -> AppResult<FieldLinks> {
    let mut links = Vec::with_capacity(project.exchanges.len());
    for exchange in &project.exchanges {
        let (from_model, from_field) = parse_ref(&exchange.from, "exchange")?;
        let (to_model, to_field) = parse_ref(&exchange.to, "exchange")?;
        require_field(registry, from_model, from_field)?;
        require_field(registry, to_model, to_field)?;
        links.push(FieldLink::new(from_model, from_field, to_model, to_field));
    }
    Ok(FieldLinks::new(links))
}

/// Build a ready-to-run kernel (without a result sink) from a validated
/// project.
pub fn compile_project(project: &Project, overrides: &RunOverrides) -> AppResult<Kernel> {
    sf_project::validate_project(project)?;

    let accuracy = Accuracy::with_tolerances(project.kernel.tolerances);

    let mut registry = ModelRegistry::new();
    for def in &project.models {
        registry.register_instance(build_model(def, accuracy)?)?;
    }

    let mut builder = NetworkBuilder::new();
    registry.declare_ports(&mut builder)?;
    for conn in &project.connections {
        let (from_model, from_port) = parse_ref(&conn.from, "connection")?;
        let (to_model, to_port) = parse_ref(&conn.to, "connection")?;
        builder.connect(from_model, from_port, to_model, to_port);
    }
    let network = builder.build()?;
    let edges = network.boundary_ports().len();

    let meshes = project
        .top_level_meshes()
        .into_iter()
        .map(|def| build_mesh(project, def, &registry))
        .collect::<AppResult<Vec<_>>>()?;
    let exchange = field_links(project, &registry)?;

    let mut outputs = Vec::with_capacity(project.outputs.len());
    for output in &project.outputs {
        let (model, field) = parse_ref(output, "output")?;
        outputs.push(OutputField::new(model, field));
    }

    let settings = effective_settings(project, overrides);
    tracing::info!(
        project = %project.name,
        models = registry.len(),
        edge_ports = edges,
        meshes = meshes.len(),
        exchanges = exchange.len(),
        "project compiled"
    );

    let mut kernel = Kernel::new(kernel_config(&settings, overrides), registry, network)?
        .with_meshes(meshes)?
        .with_outputs(outputs)?;
    if !exchange.is_empty() {
        kernel = kernel.with_exchange(Box::new(exchange));
    }
    Ok(kernel)
}
