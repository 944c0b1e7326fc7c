//! Configuration file handling

use std::path::{Path, PathBuf};

use erdsync_core::ProjectConfig;
use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

use crate::args::OutputFormat;

pub const CONFIG_FILE: &str = "erdsync.toml";

/// Configuration for erdsync
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Diagram file
    #[serde(default)]
    pub diagram: Option<PathBuf>,

    /// dbt manifest
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// Output format (human, json)
    #[serde(default)]
    pub format: Option<String>,

    /// Project settings handed to the engine
    #[serde(default)]
    pub project: ProjectConfig,
}

impl Config {
    /// Load configuration from a TOML file. Relative paths in the file are
    /// taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let mut config: Config = toml::from_str(&contents).into_diagnostic()?;

        let base = path.parent().unwrap_or(Path::new("."));
        config.project.project_dir = base.join(&config.project.project_dir);
        config.diagram = config.diagram.map(|p| base.join(p));
        config.manifest = config.manifest.map(|p| base.join(p));
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Try to find and load erdsync.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(
        mut self,
        project_dir: &Option<PathBuf>,
        manifest: &Option<PathBuf>,
        diagram: &Option<PathBuf>,
        format: &Option<OutputFormat>,
        include_unbound: bool,
    ) -> Self {
        if let Some(dir) = project_dir {
            self.project.project_dir = dir.clone();
        }

        if manifest.is_some() {
            self.manifest = manifest.clone();
        }

        if diagram.is_some() {
            self.diagram = diagram.clone();
        }

        if let Some(fmt) = format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }

        if include_unbound {
            self.project.include_unbound = true;
        }

        self
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.format.as_deref() {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Human,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.project.project_dir.join("target").join("manifest.json"))
    }
}
