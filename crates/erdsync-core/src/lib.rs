//! erdsync-core: keeps an entity-relationship diagram and dbt schema files in sync
//!
//! This library reads and writes dbt YAML schema files without disturbing
//! hand-written formatting, infers diagram relationships from existing
//! `relationships` tests, and writes the diagram's relationships back as
//! tests on the foreign key side.

pub mod config;
pub mod diagram;
pub mod error;
pub mod framework;
pub mod infer;
pub mod manifest;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod sync;
pub mod yaml;

pub use config::ProjectConfig;
pub use diagram::{Cardinality, Diagram, DraftedField, Entity, EntityType, Relationship};
pub use error::{Error, ErrorKind, Result};
pub use framework::{DbtProject, ModelSummary, TransformFramework};
pub use infer::RelationshipInferencer;
pub use manifest::{Manifest, ManifestModel, ModelCatalog};
pub use resolver::{ModelBindings, ModelRef, NameResolver};
pub use schema::{ColumnSchema, ModelSchema};
pub use sync::{SyncFailure, SyncReport, SyncStage, Synchronizer};
pub use yaml::Document;
