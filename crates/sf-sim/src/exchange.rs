//! Data exchange between models without a physical connection.

use crate::error::{SimError, SimResult};
use crate::registry::ModelRegistry;

/// Hook run once per tick between the time-step and regulation passes.
pub trait DataExchange: Send {
    fn exchange(&mut self, registry: &mut ModelRegistry) -> SimResult<()>;
}

/// Copy `from_model.from_field` into `to_model.to_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLink {
    pub from_model: String,
    pub from_field: String,
    pub to_model: String,
    pub to_field: String,
}

impl FieldLink {
    pub fn new(from_model: &str, from_field: &str, to_model: &str, to_field: &str) -> Self {
        Self {
            from_model: from_model.to_string(),
            from_field: from_field.to_string(),
            to_model: to_model.to_string(),
            to_field: to_field.to_string(),
        }
    }

    fn apply(&self, registry: &mut ModelRegistry) -> SimResult<f64> {
        let value = registry
            .get(&self.from_model)?
            .get_field(&self.from_field)
            .map_err(|e| SimError::model(&self.from_model, "get_field", e))?;
        registry
            .get_mut(&self.to_model)?
            .set_field(&self.to_field, value)
            .map_err(|e| SimError::model(&self.to_model, "set_field", e))?;
        Ok(value)
    }
}

/// Ordered list of field copies.
///
/// Every link is attempted each tick; the first failure is returned after
/// the remaining links have run.
#[derive(Debug, Clone, Default)]
pub struct FieldLinks {
    links: Vec<FieldLink>,
}

impl FieldLinks {
    pub fn new(links: Vec<FieldLink>) -> Self {
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl DataExchange for FieldLinks {
    fn exchange(&mut self, registry: &mut ModelRegistry) -> SimResult<()> {
        let mut first_error = None;
        for link in &self.links {
            match link.apply(registry) {
                Ok(value) => tracing::trace!(
                    from = %format!("{}.{}", link.from_model, link.from_field),
                    to = %format!("{}.{}", link.to_model, link.to_field),
                    value,
                    "exchanged"
                ),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_components::{FlowSink, Model, Valve};
    use sf_core::units::kgps;

    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        reg.register_instance(Box::new(FlowSink::new("sink", kgps(0.3))))
            .unwrap();
        reg.register_instance(Box::new(Valve::new("valve", 1.0, 1.0)))
            .unwrap();
        reg
    }

    #[test]
    fn copies_named_fields() {
        let mut reg = registry();
        let mut links = FieldLinks::new(vec![FieldLink::new("sink", "mdot_kgps", "valve", "command")]);
        links.exchange(&mut reg).unwrap();
        assert_eq!(reg.get("valve").unwrap().get_field("command").unwrap(), 0.3);
    }

    #[test]
    fn failures_do_not_skip_later_links() {
        let mut reg = registry();
        let mut links = FieldLinks::new(vec![
            FieldLink::new("sink", "mdot_kgps", "valve", "opening"),
            FieldLink::new("sink", "mdot_kgps", "valve", "command"),
        ]);
        let err = links.exchange(&mut reg).unwrap_err();
        assert!(matches!(err, SimError::Model { op: "set_field", .. }));
        let valve: &dyn Model = reg.get("valve").unwrap();
        assert_eq!(valve.get_field("command").unwrap(), 0.3);
    }
}
