//! Diagram types supplied by the caller

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The entity-relationship diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Diagram {
    pub fn new(entities: Vec<Entity>, relationships: Vec<Relationship>) -> Self {
        Self {
            entities,
            relationships,
        }
    }

    /// Read a diagram from JSON, or YAML for `.yml`/`.yaml` files
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::file_operation("read", path, err),
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yml" | "yaml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&text).map_err(|err| err.to_string())
        } else {
            serde_json::from_str(&text).map_err(|err| err.to_string())
        };
        parsed.map_err(|message| {
            Error::validation(format!("invalid diagram {}: {}", path.display(), message))
        })
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }
}

/// A table in the diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Bound model unique id, e.g. `model.jaffle_shop.orders` or
    /// `model.jaffle_shop.player.v2`
    #[serde(default)]
    pub dbt_model: Option<String>,
    /// Further model ids this entity answers to
    #[serde(default)]
    pub additional_models: Vec<String>,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub drafted_fields: Vec<DraftedField>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, dbt_model: impl Into<String>) -> Self {
        self.dbt_model = Some(dbt_model.into());
        self
    }

    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = entity_type;
        self
    }

    pub fn with_field(mut self, field: DraftedField) -> Self {
        self.drafted_fields.push(field);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.dbt_model.as_deref().is_some_and(|model| !model.is_empty())
    }
}

/// Dimensional classification of an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum EntityType {
    Dimension,
    Fact,
    #[default]
    Unclassified,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Dimension => "dimension",
            EntityType::Fact => "fact",
            EntityType::Unclassified => "unclassified",
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "dimension" => Ok(EntityType::Dimension),
            "fact" => Ok(EntityType::Fact),
            "unclassified" | "" => Ok(EntityType::Unclassified),
            other => Err(format!(
                "invalid entity_type '{other}', expected dimension, fact or unclassified"
            )),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column proposed in the diagram editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftedField {
    pub name: String,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DraftedField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }
}

/// Which side of a relationship is the "many" side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    OneToMany,
    ManyToOne,
}

/// A directed edge between two entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub kind: Cardinality,
    #[serde(default)]
    pub source_field: String,
    #[serde(default)]
    pub target_field: String,
    #[serde(default)]
    pub label: String,
}

/// The foreign key a relationship implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey<'a> {
    /// Entity holding the FK column
    pub entity: &'a str,
    pub column: &'a str,
    /// Entity holding the referenced key
    pub references: &'a str,
    pub referenced_field: &'a str,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: Cardinality,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            source_field: source_field.into(),
            target_field: target_field.into(),
            label: String::new(),
        }
    }

    /// Resolve which side holds the FK. `one_to_many` puts it on the
    /// target, `many_to_one` on the source.
    pub fn foreign_key(&self) -> ForeignKey<'_> {
        match self.kind {
            Cardinality::OneToMany => ForeignKey {
                entity: &self.target,
                column: &self.target_field,
                references: &self.source,
                referenced_field: &self.source_field,
            },
            Cardinality::ManyToOne => ForeignKey {
                entity: &self.source,
                column: &self.source_field,
                references: &self.target,
                referenced_field: &self.target_field,
            },
        }
    }

    /// Sort and dedup key
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.source,
            &self.target,
            &self.source_field,
            &self.target_field,
        )
    }
}
