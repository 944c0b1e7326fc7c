//! Transformation framework abstraction

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::diagram::{Diagram, EntityType, Relationship};
use crate::error::{Error, Result};
use crate::infer::RelationshipInferencer;
use crate::manifest::{ManifestModel, ModelCatalog};
use crate::resolver::NameResolver;
use crate::schema::{ensure_model, find_model, ModelSchema};
use crate::store;
use crate::sync::{SyncReport, Synchronizer};
use crate::yaml::Document;

/// A model as listed to the diagram editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub unique_id: String,
    pub name: String,
    pub version: Option<u32>,
    pub schema_file: PathBuf,
    pub entity_type: EntityType,
}

/// Operations the diagram editor needs from a transformation framework
pub trait TransformFramework {
    /// Models under the configured model paths
    fn get_models(&self) -> Result<Vec<ModelSummary>>;

    /// Documentation of a model, or `None` if no schema file documents it
    fn get_model_schema(&self, name: &str, version: Option<u32>) -> Result<Option<ModelSchema>>;

    /// Write a model's documentation and return the file written to
    fn save_model_schema(&self, schema: &ModelSchema) -> Result<PathBuf>;

    fn infer_relationships(&self, diagram: &Diagram) -> Result<Vec<Relationship>>;

    fn sync_relationships(&self, diagram: &Diagram) -> Result<SyncReport>;
}

/// A dbt project described by its manifest
pub struct DbtProject<C: ModelCatalog> {
    config: ProjectConfig,
    catalog: C,
}

impl<C: ModelCatalog> DbtProject<C> {
    pub fn new(config: ProjectConfig, catalog: C) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, catalog })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn resolve(&self, name: &str, version: Option<u32>) -> Result<ManifestModel> {
        self.catalog
            .resolve_model(name, version)
            .ok_or_else(|| Error::ModelNotFound {
                name: match version {
                    Some(v) => format!("{name}.v{v}"),
                    None => name.to_string(),
                },
            })
    }

    fn schema_path(&self, model: &ManifestModel) -> Result<PathBuf> {
        let relative = model.schema_file();
        if !self.config.is_in_model_paths(&relative) {
            return Err(Error::validation(format!(
                "schema file {} is outside the configured model paths",
                relative.display()
            )));
        }
        Ok(self.config.project_dir.join(relative))
    }
}

impl<C: ModelCatalog> TransformFramework for DbtProject<C> {
    fn get_models(&self) -> Result<Vec<ModelSummary>> {
        let names = NameResolver::new(&self.config);
        let mut models: Vec<ModelSummary> = self
            .catalog
            .list_models()
            .into_iter()
            .filter(|model| {
                self.config
                    .is_in_model_paths(Path::new(&model.original_file_path))
            })
            .map(|model| ModelSummary {
                entity_type: names.classify(&model.name),
                schema_file: model.schema_file(),
                unique_id: model.unique_id,
                name: model.name,
                version: model.version,
            })
            .collect();
        models.sort_by(|a, b| (&a.name, a.version).cmp(&(&b.name, b.version)));
        Ok(models)
    }

    fn get_model_schema(&self, name: &str, version: Option<u32>) -> Result<Option<ModelSchema>> {
        let model = self.resolve(name, version)?;
        let path = self.schema_path(&model)?;
        let Some(doc) = store::load(&path)? else {
            return Ok(None);
        };
        Ok(find_model(&doc, &model.name).map(|node| ModelSchema::from_node(node, model.version)))
    }

    fn save_model_schema(&self, schema: &ModelSchema) -> Result<PathBuf> {
        let model = self.resolve(&schema.name, schema.version)?;
        let path = self.schema_path(&model)?;
        let (mut doc, original) = match store::load(&path)? {
            Some(doc) => {
                let text = doc.render();
                (doc, Some(text))
            }
            None => (Document::new(), None),
        };
        schema.apply_to(ensure_model(&mut doc, &model.name)?)?;
        if original.as_deref() != Some(doc.render().as_str()) {
            store::save(&path, &doc)?;
            tracing::info!("wrote {}", path.display());
        }
        Ok(path)
    }

    fn infer_relationships(&self, diagram: &Diagram) -> Result<Vec<Relationship>> {
        RelationshipInferencer::new(&self.config, diagram).infer()
    }

    fn sync_relationships(&self, diagram: &Diagram) -> Result<SyncReport> {
        Synchronizer::new(&self.config, &self.catalog, diagram).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::schema::ColumnSchema;
    use pretty_assertions::assert_eq;

    fn project(dir: &Path) -> DbtProject<Manifest> {
        let mut orders = ManifestModel::new("model.shop.fct_orders", "fct_orders", "models/fct_orders.sql");
        orders.patch_path = Some("shop://models/_schema.yml".to_string());
        let manifest = Manifest::from_models([
            orders,
            ManifestModel::new("model.shop.dim_customers", "dim_customers", "models/dim_customers.sql"),
            ManifestModel::new("model.shop.raw", "raw", "seeds/raw.sql"),
        ]);
        DbtProject::new(ProjectConfig::new(dir), manifest).unwrap()
    }

    #[test]
    fn test_get_models_classifies_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let models = project(dir.path()).get_models().unwrap();
        let listed: Vec<_> = models
            .iter()
            .map(|m| (m.name.as_str(), m.entity_type))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("dim_customers", EntityType::Dimension),
                ("fct_orders", EntityType::Fact),
            ]
        );
        assert_eq!(models[1].schema_file, PathBuf::from("models/_schema.yml"));
    }

    #[test]
    fn test_save_then_get_model_schema() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        assert_eq!(project.get_model_schema("fct_orders", None).unwrap(), None);

        let mut schema = ModelSchema::new("fct_orders");
        schema.description = Some("One row per order".to_string());
        schema.tags = vec!["finance".to_string()];
        schema.add_column(ColumnSchema {
            name: "id".to_string(),
            data_type: Some("int".to_string()),
            description: Some("Primary key".to_string()),
        });
        let path = project.save_model_schema(&schema).unwrap();
        assert_eq!(path, dir.path().join("models/_schema.yml"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "version: 2\nmodels:\n  - name: fct_orders\n    description: One row per order\n    config:\n      tags:\n        - finance\n    columns:\n      - name: id\n        data_type: int\n        description: Primary key\n"
        );

        let read = project.get_model_schema("fct_orders", None).unwrap().unwrap();
        assert_eq!(read, schema);
    }

    #[test]
    fn test_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = project(dir.path()).get_model_schema("missing", None).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));
    }

    #[test]
    fn test_missing_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = DbtProject::new(ProjectConfig::new(dir.path().join("absent")), Manifest::default());
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}
