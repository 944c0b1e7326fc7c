//! Schema file accessors
//!
//! Find-or-create helpers for the `models` tree of a dbt schema file, the
//! tag/description placement rules, and reading and writing `relationships`
//! tests.

mod model;
mod nodes;
mod relationship;

pub use model::{ColumnSchema, ModelSchema};
pub use nodes::{
    config_insert_position, ensure_column, ensure_model, ensure_model_version, entry_version,
    find_model, find_model_version, read_tags, set_description, set_tags, SCHEMA_VERSION,
};
pub use relationship::{
    new_relationship_test, read_relationship_test, remove_relationship_tests, tests_of,
    upsert_relationship_test, write_relationship_test, RelationshipTest, TEST_KEYS,
};
