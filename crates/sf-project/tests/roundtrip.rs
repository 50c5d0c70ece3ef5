use sf_project::schema::*;
use sf_project::{ProjectError, load, load_json, load_yaml, save_json, save_yaml, validate_project};

const TWO_BRANCH: &str = r#"
version: 1
name: two-branch
kernel:
  step_s: 0.1
  pacing_ms: 0
  t_end_s: 2.0
models:
  - id: supply
    kind: { type: pressure_source, p_pa: 1.0e6, t_k: 300.0 }
  - id: split
    kind: { type: junction }
  - id: leg_a
    kind: { type: pipe, k: 2.0e4 }
  - id: leg_b
    kind: { type: valve, k_open: 1.0e4, opening: 0.8, regul_every: 5 }
  - id: store
    kind: { type: tank, volume_m3: 0.5, p0_pa: 5.0e5, t0_k: 290.0 }
connections:
  - { from: leg_a.out, to: split.in1 }
  - { from: leg_b.out, to: split.in2 }
  - { from: split.out, to: store.in }
meshes:
  - id: branches
    members: [leg_a, leg_b]
  - id: plant
    members: ["mesh:branches", split]
exchanges:
  - { from: store.p_pa, to: leg_b.command }
outputs: [store.p_pa, split.split]
"#;

fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn yaml_defaults_fill_in() {
    let path = write_temp("sf_project_two_branch.yaml", TWO_BRANCH);
    let project = load_yaml(&path).unwrap();

    assert_eq!(project.kernel.pacing_ms, 0);
    assert_eq!(project.kernel.tolerances, sf_core::Tolerances::default());
    assert_eq!(
        project.model("split").unwrap().kind,
        ModelKindDef::Junction { split: 0.5 }
    );
    let top: Vec<_> = project.top_level_meshes().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(top, vec!["plant"]);
}

#[test]
fn roundtrip_yaml_and_json() {
    let project: Project = serde_yaml::from_str(TWO_BRANCH).unwrap();
    validate_project(&project).unwrap();

    let dir = std::env::temp_dir();
    let yaml = dir.join("sf_project_roundtrip.yaml");
    let json = dir.join("sf_project_roundtrip.json");

    save_yaml(&yaml, &project).unwrap();
    save_json(&json, &project).unwrap();

    assert_eq!(load_yaml(&yaml).unwrap(), project);
    assert_eq!(load_json(&json).unwrap(), project);
    assert_eq!(load(&json).unwrap(), project);
}

#[test]
fn invalid_project_not_saved() {
    let mut project: Project = serde_yaml::from_str(TWO_BRANCH).unwrap();
    project.outputs.push("ghost.p_pa".into());
    let path = std::env::temp_dir().join("sf_project_invalid.yaml");
    assert!(matches!(
        save_yaml(&path, &project),
        Err(ProjectError::Validation(_))
    ));
}

#[test]
fn unknown_extension_rejected() {
    let path = write_temp("sf_project_two_branch.toml", TWO_BRANCH);
    assert!(matches!(load(&path), Err(ProjectError::UnknownFormat { .. })));
}
