//! Entity to model name mapping

use super::refs::{parse_model_id, ModelRef};
use crate::config::ProjectConfig;
use crate::diagram::{Entity, EntityType};

/// Maps entities to the model names they are documented under
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    config: &'a ProjectConfig,
}

impl<'a> NameResolver<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self { config }
    }

    /// The model (and version) an entity maps to.
    ///
    /// Bound entities use their `dbt_model` id. Otherwise the entity id is
    /// used, prefixed for its class when dimensional modeling is enabled.
    pub fn model_ref(&self, entity: &Entity) -> ModelRef {
        match entity.dbt_model.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => parse_model_id(id),
            None => ModelRef::new(self.derive_name(&entity.id, entity.entity_type)),
        }
    }

    pub fn model_name(&self, entity: &Entity) -> String {
        self.model_ref(entity).name
    }

    fn derive_name(&self, id: &str, entity_type: EntityType) -> String {
        if !self.config.dimensional_modeling.enabled {
            return id.to_string();
        }
        let prefixes = self.prefixes(entity_type);
        let Some(first) = prefixes.first() else {
            return id.to_string();
        };
        if prefixes.iter().any(|prefix| starts_with_ignore_case(id, prefix)) {
            id.to_string()
        } else {
            format!("{first}{id}")
        }
    }

    fn prefixes(&self, entity_type: EntityType) -> &'a [String] {
        match entity_type {
            EntityType::Dimension => &self.config.dimension_prefix,
            EntityType::Fact => &self.config.fact_prefix,
            EntityType::Unclassified => &[],
        }
    }

    /// Classify a model by its name prefix; dimension prefixes are checked
    /// before fact prefixes.
    pub fn classify(&self, model_name: &str) -> EntityType {
        let matches = |prefixes: &[String]| {
            prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && starts_with_ignore_case(model_name, prefix))
        };
        if matches(self.config.dimension_prefix.as_slice()) {
            EntityType::Dimension
        } else if matches(self.config.fact_prefix.as_slice()) {
            EntityType::Fact
        } else {
            EntityType::Unclassified
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
