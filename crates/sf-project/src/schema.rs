//! Project schema definitions.

use serde::{Deserialize, Serialize};
use sf_core::Tolerances;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub kernel: KernelDef,
    #[serde(default)]
    pub models: Vec<ModelDef>,
    /// Outlet-to-inlet links, written `model.port`.
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
    #[serde(default)]
    pub meshes: Vec<MeshDef>,
    /// Field copies between models, written `model.field`.
    #[serde(default)]
    pub exchanges: Vec<ExchangeDef>,
    /// Fields recorded every tick, written `model.field`.
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KernelDef {
    #[serde(default = "default_step_s")]
    pub step_s: f64,
    /// Wall-clock budget per tick; 0 runs unpaced.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_end_s: Option<f64>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

impl Default for KernelDef {
    fn default() -> Self {
        Self {
            step_s: default_step_s(),
            pacing_ms: default_pacing_ms(),
            t_end_s: None,
            tolerances: Tolerances::default(),
        }
    }
}

fn default_step_s() -> f64 {
    0.1
}

fn default_pacing_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    pub id: String,
    pub kind: ModelKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKindDef {
    PressureSource {
        p_pa: f64,
        t_k: f64,
        #[serde(default = "default_fluid")]
        fluid: String,
    },
    FlowSink {
        mdot_kgps: f64,
    },
    Pipe {
        k: f64,
    },
    Valve {
        k_open: f64,
        #[serde(default = "default_opening")]
        opening: f64,
        #[serde(default = "default_tau_s")]
        tau_s: f64,
        #[serde(default = "default_rate")]
        rate_limit_per_s: f64,
        #[serde(default = "default_regul_every")]
        regul_every: u32,
    },
    Junction {
        #[serde(default = "default_split")]
        split: f64,
    },
    Tank {
        volume_m3: f64,
        p0_pa: f64,
        t0_k: f64,
    },
}

fn default_fluid() -> String {
    "air".to_string()
}

fn default_opening() -> f64 {
    1.0
}

fn default_tau_s() -> f64 {
    0.5
}

fn default_rate() -> f64 {
    1.0
}

fn default_regul_every() -> u32 {
    1
}

fn default_split() -> f64 {
    0.5
}

impl ModelKindDef {
    /// Inlet port names of this model type.
    pub fn inlets(&self) -> &'static [&'static str] {
        match self {
            ModelKindDef::PressureSource { .. } => &[],
            ModelKindDef::FlowSink { .. } => &["in"],
            ModelKindDef::Junction { .. } => &["in1", "in2"],
            ModelKindDef::Pipe { .. } | ModelKindDef::Valve { .. } | ModelKindDef::Tank { .. } => {
                &["in"]
            }
        }
    }

    /// Outlet port names of this model type.
    pub fn outlets(&self) -> &'static [&'static str] {
        match self {
            ModelKindDef::FlowSink { .. } => &[],
            _ => &["out"],
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ModelKindDef::PressureSource { .. } => "pressure_source",
            ModelKindDef::FlowSink { .. } => "flow_sink",
            ModelKindDef::Pipe { .. } => "pipe",
            ModelKindDef::Valve { .. } => "valve",
            ModelKindDef::Junction { .. } => "junction",
            ModelKindDef::Tank { .. } => "tank",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionDef {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeshDef {
    pub id: String,
    /// Model ids, or `mesh:<id>` for a nested mesh, in execution order.
    pub members: Vec<String>,
}

/// Prefix marking a nested mesh in `MeshDef::members`.
pub const MESH_PREFIX: &str = "mesh:";

/// A parsed mesh member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRef<'a> {
    Model(&'a str),
    Mesh(&'a str),
}

impl MeshDef {
    pub fn member_refs(&self) -> impl Iterator<Item = MemberRef<'_>> {
        self.members.iter().map(|m| match m.strip_prefix(MESH_PREFIX) {
            Some(id) => MemberRef::Mesh(id),
            None => MemberRef::Model(m.as_str()),
        })
    }

    /// Ids of the meshes nested directly in this one.
    pub fn submeshes(&self) -> impl Iterator<Item = &str> {
        self.member_refs().filter_map(|r| match r {
            MemberRef::Mesh(id) => Some(id),
            MemberRef::Model(_) => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeDef {
    pub from: String,
    pub to: String,
}

/// Split `model.item` at the first dot.
pub fn split_ref(reference: &str) -> Option<(&str, &str)> {
    let (model, item) = reference.split_once('.')?;
    (!model.is_empty() && !item.is_empty()).then_some((model, item))
}

impl Project {
    pub fn model(&self, id: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn mesh(&self, id: &str) -> Option<&MeshDef> {
        self.meshes.iter().find(|m| m.id == id)
    }

    /// Meshes not nested in any other mesh, in declaration order.
    pub fn top_level_meshes(&self) -> Vec<&MeshDef> {
        self.meshes
            .iter()
            .filter(|m| {
                !self
                    .meshes
                    .iter()
                    .any(|other| other.submeshes().any(|s| s == m.id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_split_at_first_dot() {
        assert_eq!(split_ref("tank.p_pa"), Some(("tank", "p_pa")));
        assert_eq!(split_ref("a.b.c"), Some(("a", "b.c")));
        assert_eq!(split_ref("tank"), None);
        assert_eq!(split_ref(".p"), None);
    }

    #[test]
    fn mesh_members_parse() {
        let mesh = MeshDef {
            id: "outer".into(),
            members: vec!["pipe".into(), "mesh:inner".into()],
        };
        let refs: Vec<_> = mesh.member_refs().collect();
        assert_eq!(refs, vec![MemberRef::Model("pipe"), MemberRef::Mesh("inner")]);
        assert_eq!(mesh.submeshes().collect::<Vec<_>>(), vec!["inner"]);
    }

    #[test]
    fn model_kind_parses_from_yaml() {
        let yaml = "id: v1\nkind:\n  type: valve\n  k_open: 2000.0\n";
        let def: ModelDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            def.kind,
            ModelKindDef::Valve {
                k_open: 2000.0,
                opening: 1.0,
                tau_s: 0.5,
                rate_limit_per_s: 1.0,
                regul_every: 1,
            }
        );
        assert_eq!(def.kind.inlets(), &["in"]);
    }
}
