//! Index from model names back to diagram entities

use std::collections::HashMap;

use super::names::NameResolver;
use super::refs::{parse_model_id, ModelRef};
use crate::diagram::Entity;

/// Transient entity/model map, rebuilt from the diagram on every pass
#[derive(Debug, Clone, Default)]
pub struct ModelBindings {
    /// (name, version) -> entity id
    exact: HashMap<(String, Option<u32>), String>,
    /// name -> entity id, ignoring versions
    by_name: HashMap<String, String>,
    /// entity id -> primary model
    models: HashMap<String, ModelRef>,
}

impl ModelBindings {
    /// Index every entity's primary model and its additional models. When
    /// two entities claim the same name, the first one wins.
    ///
    /// Entities without a `dbt_model` are indexed under their derived name,
    /// so sync can recognise tests it wrote for them earlier.
    pub fn build(entities: &[Entity], names: &NameResolver<'_>) -> Self {
        Self::index(entities.iter(), names)
    }

    /// Like [`ModelBindings::build`], restricted to entities bound to a model
    pub fn build_bound(entities: &[Entity], names: &NameResolver<'_>) -> Self {
        Self::index(entities.iter().filter(|entity| entity.is_bound()), names)
    }

    fn index<'e>(entities: impl Iterator<Item = &'e Entity>, names: &NameResolver<'_>) -> Self {
        let mut bindings = Self::default();
        for entity in entities {
            let primary = names.model_ref(entity);
            bindings.bind(&entity.id, &primary);
            for alias in &entity.additional_models {
                bindings.bind(&entity.id, &parse_model_id(alias));
            }
            bindings.models.insert(entity.id.clone(), primary);
        }
        bindings
    }

    fn bind(&mut self, entity_id: &str, model: &ModelRef) {
        self.exact
            .entry((model.name.clone(), model.version))
            .or_insert_with(|| entity_id.to_string());
        self.by_name
            .entry(model.name.clone())
            .or_insert_with(|| entity_id.to_string());
    }

    /// Find the entity for a model reference: exact (name, version), then
    /// name only, then (with `include_unbound`) the name itself.
    pub fn resolve(&self, name: &str, version: Option<u32>, include_unbound: bool) -> Option<String> {
        self.exact
            .get(&(name.to_string(), version))
            .or_else(|| self.by_name.get(name))
            .cloned()
            .or_else(|| include_unbound.then(|| name.to_string()))
    }

    pub fn resolve_ref(&self, model: &ModelRef, include_unbound: bool) -> Option<String> {
        self.resolve(&model.name, model.version, include_unbound)
    }

    /// The primary model an entity maps to
    pub fn model_of(&self, entity_id: &str) -> Option<&ModelRef> {
        self.models.get(entity_id)
    }
}
