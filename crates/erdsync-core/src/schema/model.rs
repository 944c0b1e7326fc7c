//! Typed view of one model's documentation

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::nodes::{
    ensure_column, ensure_model_version, find_model_version, read_tags, set_description, set_tags,
};
use crate::error::Result;
use crate::yaml::Mapping;

/// Documentation of a model (or of one version of it)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Column name -> column, in file order
    #[serde(default)]
    pub columns: IndexMap<String, ColumnSchema>,
}

/// Documentation of a single column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read the view from a model node. For a versioned view the columns
    /// come from the matching `versions[]` entry.
    pub fn from_node(model: &Mapping, version: Option<u32>) -> Self {
        let container = version
            .and_then(|v| find_model_version(model, v))
            .unwrap_or(model);
        let columns = container
            .get_sequence("columns")
            .into_iter()
            .flat_map(|columns| columns.mappings())
            .filter_map(|column| {
                let name = column.get_str("name")?.to_string();
                let schema = ColumnSchema {
                    name: name.clone(),
                    data_type: column.get_str("data_type").map(str::to_string),
                    description: column.get_str("description").map(str::to_string),
                };
                Some((name, schema))
            })
            .collect();

        Self {
            name: model.get_str("name").unwrap_or_default().to_string(),
            version,
            description: model.get_str("description").map(str::to_string),
            tags: read_tags(model),
            columns,
        }
    }

    /// Write the view into a model node. Keys the view does not carry are
    /// left untouched, and so are columns missing from the view.
    pub fn apply_to(&self, model: &mut Mapping) -> Result<()> {
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            set_description(model, description);
        }
        set_tags(model, &self.tags)?;

        let container = match self.version {
            Some(version) => ensure_model_version(model, version)?,
            None => model,
        };
        for column in self.columns.values() {
            let node = ensure_column(container, &column.name)?;
            if let Some(data_type) = &column.data_type {
                node.set("data_type", data_type.as_str());
            }
            if let Some(description) = &column.description {
                node.set("description", description.as_str());
            }
        }
        Ok(())
    }

    /// Get a column by name, ignoring case
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn add_column(&mut self, column: ColumnSchema) {
        self.columns.insert(column.name.clone(), column);
    }
}
