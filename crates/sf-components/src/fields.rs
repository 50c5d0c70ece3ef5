//! Named field access for configuration, telemetry and data exchange.
//!
//! Each model builds one `FieldTable` at construction: a list of names with
//! plain getter/setter function pointers. Lookups are by string, but nothing
//! is discovered at runtime beyond what the table declares.

use crate::error::{ModelError, ModelResult};
use std::fmt;

pub type Getter<M> = fn(&M) -> f64;
pub type Setter<M> = fn(&mut M, f64) -> ModelResult<()>;

struct Field<M> {
    name: &'static str,
    get: Getter<M>,
    set: Option<Setter<M>>,
}

/// Capability map `name -> getter/setter` for a model type `M`.
pub struct FieldTable<M> {
    fields: Vec<Field<M>>,
}

impl<M> Default for FieldTable<M> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<M> fmt::Debug for FieldTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter().map(|e| e.name)).finish()
    }
}

impl<M> FieldTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self, name: &'static str, get: Getter<M>) -> Self {
        self.fields.push(Field {
            name,
            get,
            set: None,
        });
        self
    }

    pub fn read_write(mut self, name: &'static str, get: Getter<M>, set: Setter<M>) -> Self {
        self.fields.push(Field {
            name,
            get,
            set: Some(set),
        });
        self
    }

    fn find(&self, name: &str) -> ModelResult<&Field<M>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ModelError::UnknownField {
                name: name.to_string(),
            })
    }

    pub fn get(&self, model: &M, name: &str) -> ModelResult<f64> {
        Ok((self.find(name)?.get)(model))
    }

    /// Setter for `name`, copied out so it can be applied to `&mut M` while
    /// the table itself lives inside `M`.
    pub fn setter(&self, name: &str) -> ModelResult<Setter<M>> {
        self.find(name)?.set.ok_or_else(|| ModelError::ReadOnlyField {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gauge {
        value: f64,
        reads: f64,
    }

    fn table() -> FieldTable<Gauge> {
        FieldTable::<Gauge>::new()
            .read_write("value", |p| p.value, |p, v| {
                p.value = v;
                Ok(())
            })
            .read_only("reads", |p| p.reads)
    }

    #[test]
    fn get_and_set() {
        let t = table();
        let mut gauge = Gauge {
            value: 1.0,
            reads: 3.0,
        };
        assert_eq!(t.get(&gauge, "value").unwrap(), 1.0);
        let set = t.setter("value").unwrap();
        set(&mut gauge, 4.5).unwrap();
        assert_eq!(t.get(&gauge, "value").unwrap(), 4.5);
        assert_eq!(t.names(), vec!["value", "reads"]);
    }

    #[test]
    fn read_only_and_unknown() {
        let t = table();
        assert!(matches!(
            t.setter("reads"),
            Err(ModelError::ReadOnlyField { .. })
        ));
        let gauge = Gauge {
            value: 0.0,
            reads: 0.0,
        };
        assert!(matches!(
            t.get(&gauge, "missing"),
            Err(ModelError::UnknownField { .. })
        ));
    }
}
