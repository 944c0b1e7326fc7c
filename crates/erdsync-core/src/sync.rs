//! Writing the diagram back into schema files
//!
//! Each entity goes through the stages of [`SyncStage`] in order. The
//! foreign keys an entity should carry are recomputed from the current
//! relationship set on every pass, so a column that stopped being a
//! foreign key loses its test instead of keeping a stale one.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::diagram::{Diagram, Entity};
use crate::error::{Error, Result};
use crate::manifest::ModelCatalog;
use crate::resolver::{format_ref, parse_ref, ModelBindings, ModelRef, NameResolver};
use crate::schema::{
    ensure_column, ensure_model, ensure_model_version, remove_relationship_tests,
    set_description, set_tags, upsert_relationship_test, RelationshipTest,
};
use crate::store;
use crate::yaml::{Document, Mapping};

/// Data type given to FK columns that do not declare one
pub const DEFAULT_FK_DATA_TYPE: &str = "text";

/// Progress of one entity through a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Unresolved,
    TargetFileSelected,
    NodeEnsured,
    FieldsMerged,
    RelationshipsMerged,
    Written,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Unresolved => "unresolved",
            SyncStage::TargetFileSelected => "target file selection",
            SyncStage::NodeEnsured => "model lookup",
            SyncStage::FieldsMerged => "field merge",
            SyncStage::RelationshipsMerged => "relationship merge",
            SyncStage::Written => "write",
        };
        f.write_str(name)
    }
}

/// An entity that could not be synced
#[derive(Debug)]
pub struct SyncFailure {
    pub entity_id: String,
    /// The stage that failed
    pub stage: SyncStage,
    pub error: Error,
}

/// Outcome of a sync pass
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Files rewritten by this pass
    pub written: Vec<PathBuf>,
    /// Files that already matched the diagram
    pub unchanged: Vec<PathBuf>,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, path: PathBuf, changed: bool) {
        if changed {
            self.unchanged.retain(|p| p != &path);
            if !self.written.contains(&path) {
                self.written.push(path);
            }
        } else if !self.written.contains(&path) && !self.unchanged.contains(&path) {
            self.unchanged.push(path);
        }
    }
}

/// Where a foreign key column should point
#[derive(Debug, Clone, PartialEq, Eq)]
struct FkTarget {
    to: String,
    field: String,
}

/// Applies a diagram to the schema files of a project
pub struct Synchronizer<'a, C: ModelCatalog + ?Sized> {
    config: &'a ProjectConfig,
    catalog: &'a C,
    diagram: &'a Diagram,
    names: NameResolver<'a>,
    bindings: ModelBindings,
}

impl<'a, C: ModelCatalog + ?Sized> Synchronizer<'a, C> {
    pub fn new(config: &'a ProjectConfig, catalog: &'a C, diagram: &'a Diagram) -> Self {
        let names = NameResolver::new(config);
        let bindings = ModelBindings::build(&diagram.entities, &names);
        Self {
            config,
            catalog,
            diagram,
            names,
            bindings,
        }
    }

    /// Sync every entity. Invalid input fails the whole pass before any
    /// file is touched; failures of single entities are collected in the
    /// report and do not stop the others.
    pub fn run(&self) -> Result<SyncReport> {
        self.config.validate()?;
        validate_entity_ids(&self.diagram.entities)?;

        let mut report = SyncReport::default();
        for entity in &self.diagram.entities {
            let mut stage = SyncStage::Unresolved;
            match self.sync_entity(entity, &mut stage) {
                Ok((path, changed)) => report.record(path, changed),
                Err(error) => {
                    tracing::warn!("failed to sync entity '{}' at {}: {}", entity.id, stage, error);
                    report.errors.push(SyncFailure {
                        entity_id: entity.id.clone(),
                        stage,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Returns the target file and whether it was rewritten. `stage` is
    /// advanced before each step so a failure reports where it happened.
    fn sync_entity(&self, entity: &Entity, stage: &mut SyncStage) -> Result<(PathBuf, bool)> {
        let model = self.names.model_ref(entity);

        *stage = SyncStage::TargetFileSelected;
        let path = self.target_file(entity, &model)?;
        tracing::debug!("entity '{}' -> {}", entity.id, path.display());

        *stage = SyncStage::NodeEnsured;
        let (mut doc, original) = match store::load(&path)? {
            Some(doc) => {
                let text = doc.render();
                (doc, Some(text))
            }
            None => (Document::new(), None),
        };
        container(&mut doc, &model)?;

        *stage = SyncStage::FieldsMerged;
        self.merge_fields(&mut doc, entity, &model)?;

        *stage = SyncStage::RelationshipsMerged;
        let foreign_keys = self.foreign_keys(entity);
        self.merge_relationships(container(&mut doc, &model)?, &foreign_keys)?;

        *stage = SyncStage::Written;
        let rendered = doc.render();
        if original.as_deref() == Some(rendered.as_str()) {
            tracing::debug!("{} already up to date", path.display());
            return Ok((path, false));
        }
        store::save(&path, &doc)?;
        tracing::info!("wrote {}", path.display());
        Ok((path, true))
    }

    /// The schema file an entity is written to
    fn target_file(&self, entity: &Entity, model: &ModelRef) -> Result<PathBuf> {
        let relative = match entity.dbt_model.as_deref().filter(|id| !id.is_empty()) {
            Some(unique_id) => self
                .catalog
                .resolve_model(&model.name, model.version)
                .ok_or_else(|| Error::ModelNotFound {
                    name: unique_id.to_string(),
                })?
                .schema_file(),
            None => self
                .config
                .default_model_path()?
                .join(format!("{}.yml", entity.id)),
        };
        if !self.config.is_in_model_paths(&relative) {
            return Err(Error::validation(format!(
                "schema file {} for entity '{}' is outside the configured model paths",
                relative.display(),
                entity.id
            )));
        }
        Ok(self.config.project_dir.join(relative))
    }

    fn merge_fields(&self, doc: &mut Document, entity: &Entity, model: &ModelRef) -> Result<()> {
        let node = ensure_model(doc, &model.name)?;
        if !entity.description.trim().is_empty() {
            set_description(node, &entity.description);
        }
        if !entity.tags.is_empty() {
            set_tags(node, &entity.tags)?;
        }

        let container = container(doc, model)?;
        for field in &entity.drafted_fields {
            if field.name.trim().is_empty() {
                continue;
            }
            let column = ensure_column(container, &field.name)?;
            if let Some(datatype) = field.datatype.as_deref().filter(|d| !d.is_empty()) {
                set_after_name(column, "data_type", datatype);
            }
            if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
                set_description(column, description);
            }
        }
        Ok(())
    }

    /// Columns of `entity` that hold a foreign key in the current diagram
    fn foreign_keys(&self, entity: &Entity) -> BTreeMap<String, FkTarget> {
        let mut foreign_keys = BTreeMap::new();
        for relationship in &self.diagram.relationships {
            let fk = relationship.foreign_key();
            if fk.entity != entity.id {
                continue;
            }
            if fk.column.is_empty() || fk.referenced_field.is_empty() {
                tracing::warn!(
                    "skipping relationship {} -> {}: missing field",
                    relationship.source,
                    relationship.target
                );
                continue;
            }
            let Some(referenced) = self.bindings.model_of(fk.references) else {
                tracing::warn!(
                    "skipping relationship on {}.{}: unknown entity '{}'",
                    entity.id,
                    fk.column,
                    fk.references
                );
                continue;
            };
            let target = FkTarget {
                to: format_ref(referenced),
                field: fk.referenced_field.to_string(),
            };
            match foreign_keys.get(fk.column) {
                Some(existing) if existing != &target => tracing::warn!(
                    "column {}.{} references more than one entity; keeping the first",
                    entity.id,
                    fk.column
                ),
                Some(_) => {}
                None => {
                    foreign_keys.insert(fk.column.to_string(), target);
                }
            }
        }
        foreign_keys
    }

    fn merge_relationships(
        &self,
        container: &mut Mapping,
        foreign_keys: &BTreeMap<String, FkTarget>,
    ) -> Result<()> {
        let is_managed = |test: &RelationshipTest| {
            self.bindings
                .resolve_ref(&parse_ref(&test.to), false)
                .is_some()
        };

        if let Some(columns) = container.get_sequence_mut("columns") {
            for column in columns.mappings_mut() {
                let is_fk = column
                    .get_str("name")
                    .is_some_and(|name| foreign_keys.contains_key(name));
                if !is_fk && remove_relationship_tests(column, &is_managed) {
                    tracing::debug!(
                        "removed stale relationships test from {}",
                        column.get_str("name").unwrap_or_default()
                    );
                }
            }
        }

        for (name, target) in foreign_keys {
            let column = ensure_column(container, name)?;
            if !column.contains_key("data_type") {
                set_after_name(column, "data_type", DEFAULT_FK_DATA_TYPE);
            }
            upsert_relationship_test(column, &target.to, &target.field, &is_managed)?;
        }
        Ok(())
    }
}

/// The mapping that holds an entity's columns: the model itself, or the
/// `versions[]` entry for a versioned binding
fn container<'d>(doc: &'d mut Document, model: &ModelRef) -> Result<&'d mut Mapping> {
    let node = ensure_model(doc, &model.name)?;
    match model.version {
        Some(version) => ensure_model_version(node, version),
        None => Ok(node),
    }
}

fn set_after_name(node: &mut Mapping, key: &str, value: &str) {
    let index = node.position("name").map_or(0, |index| index + 1);
    node.set_at(index, key, value);
}

/// Entity ids name files, so they must be non-empty, unique and free of
/// path components.
fn validate_entity_ids(entities: &[Entity]) -> Result<()> {
    let mut seen = HashSet::new();
    for entity in entities {
        let id = entity.id.as_str();
        if id.trim().is_empty() {
            return Err(Error::validation("entity with an empty id"));
        }
        if id.contains(['/', '\\']) || id.contains("..") || Path::new(id).is_absolute() {
            return Err(Error::validation(format!(
                "entity id '{id}' must not contain path separators"
            )));
        }
        if !seen.insert(id) {
            return Err(Error::validation(format!("duplicate entity id '{id}'")));
        }
    }
    Ok(())
}
