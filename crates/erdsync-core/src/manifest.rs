//! Read-only access to the dbt manifest

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A model known to the transformation framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModel {
    pub unique_id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<u32>,
    /// Project-relative path of the model's SQL file
    pub original_file_path: String,
    /// `package://path` of the schema file documenting the model, if any
    #[serde(default)]
    pub patch_path: Option<String>,
}

impl ManifestModel {
    pub fn new(
        unique_id: impl Into<String>,
        name: impl Into<String>,
        original_file_path: impl Into<String>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            version: None,
            original_file_path: original_file_path.into(),
            patch_path: None,
        }
    }

    /// Project-relative path of the schema file for this model: the file
    /// that already documents it, else the `.yml` next to its SQL file.
    pub fn schema_file(&self) -> PathBuf {
        if let Some(patch) = self.patch_path.as_deref().filter(|p| !p.is_empty()) {
            let path = patch.split_once("://").map_or(patch, |(_, path)| path);
            return PathBuf::from(path);
        }
        Path::new(&self.original_file_path).with_extension("yml")
    }
}

/// Lookup of framework models, implemented by manifest adapters
pub trait ModelCatalog {
    /// Find a model by name. Without a version, an unversioned model is
    /// preferred, then the latest version.
    fn resolve_model(&self, name: &str, version: Option<u32>) -> Option<ManifestModel>;

    fn list_models(&self) -> Vec<ManifestModel>;
}

/// Models read from `target/manifest.json`
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    models: IndexMap<String, ManifestModel>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    nodes: IndexMap<String, RawNode>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    original_file_path: String,
    #[serde(default)]
    patch_path: Option<String>,
}

impl Manifest {
    pub fn from_models(models: impl IntoIterator<Item = ManifestModel>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.unique_id.clone(), model))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(json)
            .map_err(|err| Error::validation(format!("invalid manifest: {err}")))?;
        let models = raw
            .nodes
            .into_iter()
            .filter(|(_, node)| node.resource_type == "model")
            .map(|(unique_id, node)| ManifestModel {
                version: node.version.as_ref().and_then(parse_version),
                unique_id,
                name: node.name,
                original_file_path: node.original_file_path,
                patch_path: node.patch_path,
            });
        Ok(Self::from_models(models))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::file_operation("read", path, err),
        })?;
        let manifest = Self::from_json(&json)?;
        tracing::debug!("loaded {} models from {}", manifest.models.len(), path.display());
        Ok(manifest)
    }

    pub fn get(&self, unique_id: &str) -> Option<&ManifestModel> {
        self.models.get(unique_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Versions appear as numbers or strings depending on the dbt release
fn parse_version(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ModelCatalog for Manifest {
    fn resolve_model(&self, name: &str, version: Option<u32>) -> Option<ManifestModel> {
        let mut candidates = self.models.values().filter(|model| model.name == name);
        let found = match version {
            Some(version) => candidates.find(|model| model.version == Some(version)),
            None => {
                let candidates: Vec<_> = candidates.collect();
                candidates
                    .iter()
                    .find(|model| model.version.is_none())
                    .or_else(|| candidates.iter().max_by_key(|model| model.version))
                    .copied()
            }
        };
        found.cloned()
    }

    fn list_models(&self) -> Vec<ManifestModel> {
        self.models.values().cloned().collect()
    }
}
