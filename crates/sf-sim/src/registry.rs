//! Ordered model registry.
//!
//! Models are registered once while loading a project. Registration order is
//! the order used for initialization and for building calc-step containers.

use std::collections::HashMap;

use sf_components::Model;
use sf_core::ModelId;
use sf_net::{Network, NetworkBuilder, PortTable};

use crate::error::{SimError, SimResult};

struct Entry {
    model: Box<dyn Model>,
    initialized: bool,
}

#[derive(Default)]
pub struct ModelRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, ModelId>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.model.name()))
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model instance; names must be unique.
    pub fn register_instance(&mut self, model: Box<dyn Model>) -> SimResult<ModelId> {
        let name = model.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(SimError::DuplicateModel { name });
        }
        let id = ModelId::from_index(self.entries.len() as u32);
        tracing::debug!(model = %name, kind = model.type_tag(), id = %id, "registered model");
        self.by_name.insert(name, id);
        self.entries.push(Entry {
            model,
            initialized: false,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id_of(&self, name: &str) -> SimResult<ModelId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownModel {
                name: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> SimResult<&dyn Model> {
        let id = self.id_of(name)?;
        self.model(id)
    }

    pub fn get_mut(&mut self, name: &str) -> SimResult<&mut (dyn Model + 'static)> {
        let id = self.id_of(name)?;
        self.model_mut(id)
    }

    pub fn model(&self, id: ModelId) -> SimResult<&dyn Model> {
        self.entries
            .get(id.slot())
            .map(|e| e.model.as_ref())
            .ok_or_else(|| SimError::UnknownModel {
                name: format!("#{id}"),
            })
    }

    pub fn model_mut(&mut self, id: ModelId) -> SimResult<&mut (dyn Model + 'static)> {
        match self.entries.get_mut(id.slot()) {
            Some(e) => Ok(e.model.as_mut()),
            None => Err(SimError::UnknownModel {
                name: format!("#{id}"),
            }),
        }
    }

    /// Whether `name` has completed `init`.
    pub fn is_init(&self, name: &str) -> SimResult<bool> {
        let id = self.id_of(name)?;
        Ok(self.entries[id.slot()].initialized)
    }

    /// Models with their ids, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &dyn Model)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (ModelId::from_index(i as u32), e.model.as_ref()))
    }

    /// Declare every model's ports on a network builder.
    pub fn declare_ports(&self, builder: &mut NetworkBuilder) -> SimResult<()> {
        for entry in &self.entries {
            builder.add_model(entry.model.name(), entry.model.port_specs())?;
        }
        Ok(())
    }

    /// Resolve every model's ports against the wired network.
    pub fn bind_all(&mut self, network: &Network) -> SimResult<()> {
        for entry in &mut self.entries {
            let model = entry.model.as_mut();
            model
                .bind(network)
                .map_err(|e| SimError::model(model.name(), "bind", e))?;
        }
        Ok(())
    }

    /// Initialize every model not yet initialized, in registration order.
    pub fn init_all(&mut self, ports: &mut PortTable) -> SimResult<()> {
        for entry in self.entries.iter_mut().filter(|e| !e.initialized) {
            let model = entry.model.as_mut();
            model
                .init(&mut ports.forward_view())
                .map_err(|e| SimError::model(model.name(), "init", e))?;
            entry.initialized = true;
        }
        Ok(())
    }
}
