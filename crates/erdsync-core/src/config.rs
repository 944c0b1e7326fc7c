//! Project configuration passed into the engine

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings for one dbt project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the dbt project; model paths are relative to it
    pub project_dir: PathBuf,
    /// Subtrees that are scanned and written
    pub model_paths: Vec<String>,
    pub dimension_prefix: Vec<String>,
    pub fact_prefix: Vec<String>,
    pub dimensional_modeling: DimensionalModeling,
    /// Keep relationships whose sides are not bound to a diagram entity
    pub include_unbound: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionalModeling {
    pub enabled: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            model_paths: vec!["models".to_string()],
            dimension_prefix: vec!["dim_".to_string()],
            fact_prefix: vec!["fct_".to_string(), "fact_".to_string()],
            dimensional_modeling: DimensionalModeling::default(),
            include_unbound: false,
        }
    }
}

impl ProjectConfig {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Self::default()
        }
    }

    /// Check that the project directory exists and model paths are usable
    pub fn validate(&self) -> Result<()> {
        if !self.project_dir.is_dir() {
            return Err(Error::configuration(format!(
                "project directory {} does not exist",
                self.project_dir.display()
            )));
        }
        if self.model_paths.iter().all(|path| path.trim().is_empty()) {
            return Err(Error::configuration("no model paths configured"));
        }
        if let Some(path) = self.model_paths.iter().find(|path| escapes(Path::new(path))) {
            return Err(Error::configuration(format!(
                "model path '{path}' must be relative to the project directory"
            )));
        }
        Ok(())
    }

    /// Absolute (project-joined) model roots, skipping blank entries
    pub fn model_roots(&self) -> Vec<PathBuf> {
        self.model_paths
            .iter()
            .filter(|path| !path.trim().is_empty())
            .map(|path| self.project_dir.join(without_cur_dir(Path::new(path))))
            .collect()
    }

    /// Project-relative directory that new schema files for unbound
    /// entities are written to
    pub fn default_model_path(&self) -> Result<PathBuf> {
        self.model_paths
            .iter()
            .find(|path| !path.trim().is_empty())
            .map(|path| without_cur_dir(Path::new(path)))
            .ok_or_else(|| Error::configuration("no model paths configured"))
    }

    /// Whether a project-relative path lies under one of the model paths
    pub fn is_in_model_paths(&self, relative: &Path) -> bool {
        if escapes(relative) {
            return false;
        }
        let relative = without_cur_dir(relative);
        self.model_paths
            .iter()
            .filter(|path| !path.trim().is_empty())
            .any(|path| relative.starts_with(without_cur_dir(Path::new(path))))
    }
}

fn escapes(path: &Path) -> bool {
    path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
}

/// `./models` and `models` name the same directory
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.model_paths, vec!["models"]);
        assert_eq!(config.dimension_prefix, vec!["dim_"]);
        assert_eq!(config.fact_prefix, vec!["fct_", "fact_"]);
        assert!(!config.dimensional_modeling.enabled);
        assert!(!config.include_unbound);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{"model_paths": ["models", "marts"], "dimensional_modeling": {"enabled": true}}"#,
        )
        .unwrap();
        assert_eq!(config.model_paths, vec!["models", "marts"]);
        assert!(config.dimensional_modeling.enabled);
        assert_eq!(config.fact_prefix, vec!["fct_", "fact_"]);
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectConfig::new(dir.path()).validate().is_ok());

        let missing = ProjectConfig::new(dir.path().join("nope"));
        assert!(matches!(missing.validate(), Err(Error::Configuration { .. })));

        let mut empty = ProjectConfig::new(dir.path());
        empty.model_paths.clear();
        assert!(matches!(empty.validate(), Err(Error::Configuration { .. })));

        let mut outside = ProjectConfig::new(dir.path());
        outside.model_paths = vec!["../elsewhere".to_string()];
        assert!(outside.validate().is_err());
    }

    #[test]
    fn test_is_in_model_paths() {
        let config = ProjectConfig::default();
        assert!(config.is_in_model_paths(Path::new("models/staging/orders.yml")));
        assert!(!config.is_in_model_paths(Path::new("seeds/orders.yml")));
        assert!(!config.is_in_model_paths(Path::new("models/../seeds/orders.yml")));
        assert!(!config.is_in_model_paths(Path::new("modelsx/orders.yml")));
    }

    #[test]
    fn test_is_in_model_paths_with_dot_prefix() {
        let mut config = ProjectConfig::default();
        config.model_paths = vec!["./models/".to_string()];
        assert!(config.is_in_model_paths(Path::new("models/orders.yml")));
        assert!(config.is_in_model_paths(Path::new("./models/orders.yml")));
        assert!(!config.is_in_model_paths(Path::new("./seeds/orders.yml")));

        assert_eq!(config.default_model_path().unwrap(), PathBuf::from("models"));

        config.model_paths = vec!["models".to_string()];
        assert!(config.is_in_model_paths(Path::new("./models/orders.yml")));
    }
}
