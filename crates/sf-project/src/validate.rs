//! Project validation logic.

use crate::schema::{MemberRef, ModelDef, ModelKindDef, Project, split_ref};
use std::collections::{HashMap, HashSet};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Malformed reference: '{reference}' in {context} (expected model.name)")]
    MalformedReference { reference: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Mesh nesting cycle through '{mesh}'")]
    MeshCycle { mesh: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    validate_kernel(project)?;

    let mut model_ids = HashSet::new();
    for model in &project.models {
        if !model_ids.insert(model.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: model.id.clone(),
                context: "models".to_string(),
            });
        }
        validate_model(model)?;
    }

    validate_connections(project)?;
    validate_meshes(project)?;

    for exchange in &project.exchanges {
        for reference in [&exchange.from, &exchange.to] {
            validate_field_ref(project, reference, "exchanges")?;
        }
    }
    for output in &project.outputs {
        validate_field_ref(project, output, "outputs")?;
    }

    Ok(())
}

fn validate_kernel(project: &Project) -> Result<(), ValidationError> {
    let kernel = &project.kernel;
    validate_positive_finite("kernel.step_s", kernel.step_s)?;
    if let Some(t_end) = kernel.t_end_s
        && !(t_end.is_finite() && t_end >= 0.0)
    {
        return Err(invalid("kernel.t_end_s", t_end, "must be finite and non-negative"));
    }
    validate_non_negative_finite("kernel.tolerances.abs", kernel.tolerances.abs)?;
    validate_non_negative_finite("kernel.tolerances.rel", kernel.tolerances.rel)?;
    if kernel.tolerances.too_tight() {
        return Err(invalid(
            "kernel.tolerances",
            kernel.tolerances.rel,
            "below machine precision",
        ));
    }
    Ok(())
}

fn validate_model(model: &ModelDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("{}.{}", model.id, name);
    match &model.kind {
        ModelKindDef::PressureSource { p_pa, t_k, .. } => {
            validate_positive_finite(&field("p_pa"), *p_pa)?;
            validate_positive_finite(&field("t_k"), *t_k)?;
        }
        ModelKindDef::FlowSink { mdot_kgps } => {
            validate_non_negative_finite(&field("mdot_kgps"), *mdot_kgps)?;
        }
        ModelKindDef::Pipe { k } => {
            validate_non_negative_finite(&field("k"), *k)?;
        }
        ModelKindDef::Valve {
            k_open,
            opening,
            tau_s,
            rate_limit_per_s,
            regul_every,
        } => {
            validate_non_negative_finite(&field("k_open"), *k_open)?;
            if !(0.0..=1.0).contains(opening) {
                return Err(invalid(&field("opening"), *opening, "must be within [0, 1]"));
            }
            validate_positive_finite(&field("tau_s"), *tau_s)?;
            validate_positive_finite(&field("rate_limit_per_s"), *rate_limit_per_s)?;
            if *regul_every == 0 {
                return Err(invalid(&field("regul_every"), *regul_every, "must be at least 1"));
            }
        }
        ModelKindDef::Junction { split } => {
            if !(*split > 0.0 && *split < 1.0) {
                return Err(invalid(&field("split"), *split, "must be within (0, 1)"));
            }
        }
        ModelKindDef::Tank {
            volume_m3,
            p0_pa,
            t0_k,
        } => {
            validate_positive_finite(&field("volume_m3"), *volume_m3)?;
            validate_positive_finite(&field("p0_pa"), *p0_pa)?;
            validate_positive_finite(&field("t0_k"), *t0_k)?;
        }
    }
    Ok(())
}

/// Each connection runs from a declared outlet to a declared inlet of another
/// model, and no port is used twice.
fn validate_connections(project: &Project) -> Result<(), ValidationError> {
    let mut used = HashSet::new();
    for conn in &project.connections {
        let (from_model, from_port) = port_ref(project, &conn.from, "connections.from")?;
        let (to_model, to_port) = port_ref(project, &conn.to, "connections.to")?;

        if !from_model.kind.outlets().contains(&from_port) {
            return Err(missing(&conn.from, "connection outlet"));
        }
        if !to_model.kind.inlets().contains(&to_port) {
            return Err(missing(&conn.to, "connection inlet"));
        }
        if from_model.id == to_model.id {
            return Err(ValidationError::InvalidValue {
                field: "connections".to_string(),
                value: format!("{} -> {}", conn.from, conn.to),
                reason: "a model cannot feed itself".to_string(),
            });
        }
        for endpoint in [&conn.from, &conn.to] {
            if !used.insert(endpoint.as_str()) {
                return Err(ValidationError::DuplicateId {
                    id: endpoint.clone(),
                    context: "connections".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Meshes reference existing models and meshes, a model belongs to at most
/// one mesh, a mesh is nested at most once and nesting is acyclic.
fn validate_meshes(project: &Project) -> Result<(), ValidationError> {
    let mut mesh_ids = HashSet::new();
    for mesh in &project.meshes {
        if !mesh_ids.insert(mesh.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: mesh.id.clone(),
                context: "meshes".to_string(),
            });
        }
    }

    let mut owner_of_model: HashMap<&str, &str> = HashMap::new();
    let mut parent_of_mesh: HashMap<&str, &str> = HashMap::new();
    for mesh in &project.meshes {
        if mesh.members.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("meshes.{}", mesh.id),
                value: "[]".to_string(),
                reason: "a mesh needs at least one member".to_string(),
            });
        }
        for member in mesh.member_refs() {
            match member {
                MemberRef::Model(id) => {
                    if project.model(id).is_none() {
                        return Err(missing(id, &format!("mesh {}", mesh.id)));
                    }
                    if owner_of_model.insert(id, &mesh.id).is_some() {
                        return Err(ValidationError::DuplicateId {
                            id: id.to_string(),
                            context: "mesh members".to_string(),
                        });
                    }
                }
                MemberRef::Mesh(id) => {
                    if !mesh_ids.contains(id) {
                        return Err(missing(id, &format!("mesh {}", mesh.id)));
                    }
                    if parent_of_mesh.insert(id, &mesh.id).is_some() {
                        return Err(ValidationError::DuplicateId {
                            id: id.to_string(),
                            context: "nested meshes".to_string(),
                        });
                    }
                }
            }
        }
    }

    // Every mesh has at most one parent, so walking up the chain either
    // reaches a top-level mesh or revisits a mesh.
    for mesh in &project.meshes {
        let mut seen = HashSet::new();
        let mut current = mesh.id.as_str();
        while let Some(parent) = parent_of_mesh.get(current) {
            if !seen.insert(current) {
                return Err(ValidationError::MeshCycle {
                    mesh: current.to_string(),
                });
            }
            current = parent;
        }
    }
    Ok(())
}

fn port_ref<'a>(
    project: &'a Project,
    reference: &'a str,
    context: &str,
) -> Result<(&'a ModelDef, &'a str), ValidationError> {
    let (model, port) = split_ref(reference).ok_or_else(|| ValidationError::MalformedReference {
        reference: reference.to_string(),
        context: context.to_string(),
    })?;
    let model = project.model(model).ok_or_else(|| missing(model, context))?;
    Ok((model, port))
}

// Field names are resolved against live models when the kernel is built.
fn validate_field_ref(project: &Project, reference: &str, context: &str) -> Result<(), ValidationError> {
    port_ref(project, reference, context).map(|_| ())
}

fn missing(id: &str, context: &str) -> ValidationError {
    ValidationError::MissingReference {
        id: id.to_string(),
        context: context.to_string(),
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_positive_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(field, value, "must be finite and positive"));
    }
    Ok(())
}

fn validate_non_negative_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(field, value, "must be finite and non-negative"));
    }
    Ok(())
}
