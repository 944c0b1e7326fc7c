//! Relationship inference from existing `relationships` tests

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::ProjectConfig;
use crate::diagram::{Cardinality, Diagram, Relationship};
use crate::error::{Error, Result};
use crate::resolver::{parse_ref, ModelBindings, ModelRef, NameResolver};
use crate::schema::{entry_version, read_relationship_test, tests_of, RelationshipTest};
use crate::store;
use crate::yaml::{Document, Mapping};

/// All `.yml`/`.yaml` files under the configured model paths, sorted
pub fn schema_files(config: &ProjectConfig) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for root in config.model_roots() {
        let root = glob::Pattern::escape(&root.to_string_lossy());
        for extension in ["yml", "yaml"] {
            let pattern = format!("{root}/**/*.{extension}");
            let paths = glob::glob(&pattern).map_err(|err| {
                Error::configuration(format!("invalid model path pattern {pattern}: {err}"))
            })?;
            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => {
                        files.insert(path);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!("skipping unreadable path: {}", err),
                }
            }
        }
    }
    Ok(files.into_iter().collect())
}

/// Recovers diagram relationships from the tests in schema files.
///
/// Every relationships test makes the model it sits on the child side:
/// the test's `to` resolves to the source entity, the scanned model to the
/// target entity.
pub struct RelationshipInferencer<'a> {
    config: &'a ProjectConfig,
    bindings: ModelBindings,
}

impl<'a> RelationshipInferencer<'a> {
    pub fn new(config: &'a ProjectConfig, diagram: &Diagram) -> Self {
        let bindings = ModelBindings::build_bound(&diagram.entities, &NameResolver::new(config));
        Self { config, bindings }
    }

    /// Scan every schema file. Files that fail to load are skipped.
    pub fn infer(&self) -> Result<Vec<Relationship>> {
        let mut found = Vec::new();
        for path in schema_files(self.config)? {
            match store::load(&path) {
                Ok(Some(doc)) => self.collect(&doc, &mut found),
                Ok(None) => {}
                Err(err) => tracing::warn!("skipping {}: {}", path.display(), err),
            }
        }
        let found = sorted(found);
        tracing::debug!("inferred {} relationships", found.len());
        Ok(found)
    }

    /// Relationships declared in a single document, deduplicated and sorted
    pub fn infer_document(&self, doc: &Document) -> Vec<Relationship> {
        let mut found = Vec::new();
        self.collect(doc, &mut found);
        sorted(found)
    }

    fn collect(&self, doc: &Document, found: &mut Vec<Relationship>) {
        let Some(models) = doc.root().get_sequence("models") else {
            return;
        };
        for model in models.mappings() {
            let Some(name) = model.get_str("name") else {
                continue;
            };
            self.collect_container(model, &ModelRef::new(name), found);
            let versions = model.get_sequence("versions");
            for entry in versions.into_iter().flat_map(|versions| versions.mappings()) {
                let Some(version) = entry_version(entry).and_then(|v| u32::try_from(v).ok()) else {
                    continue;
                };
                self.collect_container(entry, &ModelRef::versioned(name, version), found);
            }
        }
    }

    /// Column tests, plus container-level tests that name their column
    fn collect_container(
        &self,
        container: &Mapping,
        model: &ModelRef,
        found: &mut Vec<Relationship>,
    ) {
        let Some(target) = self.bindings.resolve_ref(model, self.config.include_unbound) else {
            tracing::debug!("model {} is not bound to an entity", model.name);
            return;
        };

        let columns = container.get_sequence("columns");
        for column in columns.into_iter().flat_map(|columns| columns.mappings()) {
            let Some(column_name) = column.get_str("name") else {
                continue;
            };
            for test in tests_of(column).filter_map(read_relationship_test) {
                self.emit(&target, column_name, &test, found);
            }
        }

        for test in tests_of(container).filter_map(read_relationship_test) {
            if let Some(column_name) = test.column_name.as_deref() {
                self.emit(&target, column_name, &test, found);
            }
        }
    }

    fn emit(
        &self,
        target: &str,
        column: &str,
        test: &RelationshipTest,
        found: &mut Vec<Relationship>,
    ) {
        let Some(field) = test.field.as_deref() else {
            tracing::warn!("relationships test on {}.{} has no field", target, column);
            return;
        };
        let to = parse_ref(&test.to);
        let Some(source) = self.bindings.resolve_ref(&to, self.config.include_unbound) else {
            tracing::debug!("dropping {} -> {}.{}: source is unbound", test.to, target, column);
            return;
        };
        found.push(Relationship::new(source, target, Cardinality::OneToMany, field, column));
    }
}

/// Stable sort, then keep the first of each duplicate
fn sorted(mut relationships: Vec<Relationship>) -> Vec<Relationship> {
    relationships.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    relationships.dedup_by(|a, b| a.sort_key() == b.sort_key());
    relationships
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::Entity;
    use pretty_assertions::assert_eq;

    fn diagram(ids: &[&str]) -> Diagram {
        Diagram::new(
            ids.iter()
                .map(|id| Entity::new(*id).with_model(format!("model.shop.{id}")))
                .collect(),
            Vec::new(),
        )
    }

    #[test]
    fn test_column_and_model_level_tests() {
        let config = ProjectConfig::default();
        let diagram = diagram(&["customers", "orders"]);
        let inferencer = RelationshipInferencer::new(&config, &diagram);
        let doc = Document::parse(
            r#"models:
  - name: orders
    data_tests:
      - relationships:
          column_name: buyer_id
          to: ref('customers')
          field: id
    columns:
      - name: customer_id
        tests:
          - relationships:
              to: ref('customers')
              field: id
"#,
        )
        .unwrap();
        let found = inferencer.infer_document(&doc);
        assert_eq!(
            found,
            vec![
                Relationship::new("customers", "orders", Cardinality::OneToMany, "id", "buyer_id"),
                Relationship::new("customers", "orders", Cardinality::OneToMany, "id", "customer_id"),
            ]
        );
    }

    #[test]
    fn test_unbound_sides_are_dropped_unless_requested() {
        let doc = Document::parse(
            "models:\n  - name: orders\n    columns:\n      - name: store_id\n        data_tests:\n          - relationships:\n              arguments:\n                to: ref('stores')\n                field: id\n",
        )
        .unwrap();
        let diagram = diagram(&["orders"]);

        let config = ProjectConfig::default();
        assert!(RelationshipInferencer::new(&config, &diagram)
            .infer_document(&doc)
            .is_empty());

        let config = ProjectConfig {
            include_unbound: true,
            ..ProjectConfig::default()
        };
        let found = RelationshipInferencer::new(&config, &diagram).infer_document(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, "stores");
    }

    #[test]
    fn test_versioned_columns() {
        let config = ProjectConfig::default();
        let diagram = Diagram::new(
            vec![
                Entity::new("players").with_model("model.league.player.v2"),
                Entity::new("teams").with_model("model.league.team"),
            ],
            Vec::new(),
        );
        let doc = Document::parse(
            "models:\n  - name: player\n    latest_version: 2\n    versions:\n      - v: 2\n        columns:\n          - name: team_id\n            data_tests:\n              - relationships:\n                  arguments:\n                    to: ref('team')\n                    field: id\n",
        )
        .unwrap();
        let found = RelationshipInferencer::new(&config, &diagram).infer_document(&doc);
        assert_eq!(
            found,
            vec![Relationship::new("teams", "players", Cardinality::OneToMany, "id", "team_id")]
        );
    }

    #[test]
    fn test_schema_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(models.join("b")).unwrap();
        std::fs::write(models.join("b/z.yaml"), "").unwrap();
        std::fs::write(models.join("a.yml"), "").unwrap();
        std::fs::write(models.join("orders.sql"), "select 1").unwrap();

        let config = ProjectConfig::new(dir.path());
        let files = schema_files(&config).unwrap();
        assert_eq!(files, vec![models.join("a.yml"), models.join("b/z.yaml")]);
    }
}
