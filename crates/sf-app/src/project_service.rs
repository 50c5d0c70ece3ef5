//! Project loading, saving, validation and introspection.

use std::path::Path;

use sf_project::Project;

use crate::error::{AppError, AppResult};

/// Counts shown by `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub name: String,
    pub models: usize,
    pub connections: usize,
    pub meshes: usize,
    pub top_level_meshes: usize,
    pub exchanges: usize,
    pub outputs: usize,
}

/// Load and validate a YAML or JSON project file.
pub fn load_project(path: &Path) -> AppResult<Project> {
    Ok(sf_project::load(path)?)
}

/// Save a project as YAML.
pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    sf_project::save_yaml(path, project).map_err(|e| match e {
        sf_project::ProjectError::Io(source) => AppError::ProjectFileWrite {
            path: path.to_path_buf(),
            source,
        },
        other => other.into(),
    })
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    Ok(sf_project::validate_project(project)?)
}

pub fn summarize(project: &Project) -> ProjectSummary {
    ProjectSummary {
        name: project.name.clone(),
        models: project.models.len(),
        connections: project.connections.len(),
        meshes: project.meshes.len(),
        top_level_meshes: project.top_level_meshes().len(),
        exchanges: project.exchanges.len(),
        outputs: project.outputs.len(),
    }
}
