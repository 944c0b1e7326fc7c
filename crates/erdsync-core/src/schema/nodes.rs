//! Find-or-create accessors for models, columns and versions

use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::yaml::scalar::as_u64;
use crate::yaml::{Document, Mapping, Node, Sequence};

/// Schema file format version written into new documents
pub const SCHEMA_VERSION: u32 = 2;

/// Keys before which a new `config` block is placed when a model has
/// neither `description` nor `name`
const CONFIG_ANCHORS: [&str; 3] = ["columns", "versions", "latest_version"];

/// Look up a model by name
pub fn find_model<'a>(doc: &'a Document, name: &str) -> Option<&'a Mapping> {
    doc.root()
        .get_sequence("models")?
        .mappings()
        .find(|model| model.get_str("name") == Some(name))
}

/// Return the model named `name`, appending a bare `{name}` entry if the
/// document has none. An empty document gets `version: 2` first.
pub fn ensure_model<'a>(doc: &'a mut Document, name: &str) -> Result<&'a mut Mapping> {
    let root = doc.root_mut();
    if root.is_empty() {
        root.set("version", SCHEMA_VERSION);
    }
    let models = root.ensure_sequence("models")?;
    ensure_named(models, name)
}

/// Return the column named `name` under `container` (a model or a model
/// version), appending a bare `{name}` entry if missing.
pub fn ensure_column<'a>(container: &'a mut Mapping, name: &str) -> Result<&'a mut Mapping> {
    let columns = container.ensure_sequence("columns")?;
    ensure_named(columns, name)
}

fn ensure_named<'a>(seq: &'a mut Sequence, name: &str) -> Result<&'a mut Mapping> {
    let index = match seq.position_mapping(|node| node.get_str("name") == Some(name)) {
        Some(index) => index,
        None => {
            let mut node = Mapping::new();
            node.set("name", name);
            seq.push(node);
            seq.len() - 1
        }
    };
    seq.mapping_mut(index)
        .ok_or_else(|| Error::validation(format!("entry '{name}' is not a mapping")))
}

/// Look up the `versions[]` entry for `version`
pub fn find_model_version(model: &Mapping, version: u32) -> Option<&Mapping> {
    model
        .get_sequence("versions")?
        .mappings()
        .find(|entry| entry_version(entry) == Some(u64::from(version)))
}

/// Return the `versions[]` entry for `version`, creating it if needed, and
/// raise `latest_version` to at least `version`.
pub fn ensure_model_version(model: &mut Mapping, version: u32) -> Result<&mut Mapping> {
    let bump = match model.get("latest_version") {
        None => true,
        Some(Node::Scalar(value)) => as_u64(value).is_some_and(|latest| latest < u64::from(version)),
        Some(_) => false,
    };
    if bump {
        model.set("latest_version", version);
    }

    let versions = model.ensure_sequence("versions")?;
    let index = match versions.position_mapping(|entry| entry_version(entry) == Some(u64::from(version))) {
        Some(index) => index,
        None => {
            let mut entry = Mapping::new();
            entry.set("v", version);
            versions.push(entry);
            versions.len() - 1
        }
    };
    versions
        .mapping_mut(index)
        .ok_or_else(|| Error::validation(format!("version {version} is not a mapping")))
}

/// The `v` of a `versions[]` entry
pub fn entry_version(entry: &Mapping) -> Option<u64> {
    match entry.get("v")? {
        Node::Scalar(value) => as_u64(value),
        _ => None,
    }
}

/// Where a new `config` block goes: after `description`, else after `name`,
/// else before `columns`/`versions`/`latest_version`, else at the end.
pub fn config_insert_position(node: &Mapping) -> usize {
    if let Some(index) = node.position("description") {
        return index + 1;
    }
    if let Some(index) = node.position("name") {
        return index + 1;
    }
    CONFIG_ANCHORS
        .iter()
        .filter_map(|key| node.position(key))
        .min()
        .unwrap_or(node.len())
}

/// Set a node's tags.
///
/// An empty list removes tags from both `tags` and `config.tags`. Otherwise
/// the tags go where the node already keeps them (`config.tags` when both
/// exist, and for nodes without tags) and the other location is removed.
pub fn set_tags(node: &mut Mapping, tags: &[String]) -> Result<()> {
    if tags.is_empty() {
        node.remove("tags");
        remove_config_tags(node);
        return Ok(());
    }

    let value = Value::Sequence(tags.iter().cloned().map(Value::String).collect());
    let in_config = node
        .get_mapping("config")
        .is_some_and(|config| config.contains_key("tags"));
    if !in_config && node.contains_key("tags") {
        node.set("tags", value);
    } else {
        let index = config_insert_position(node);
        node.ensure_mapping_at("config", Some(index))?
            .set("tags", value);
        node.remove("tags");
    }
    Ok(())
}

fn remove_config_tags(node: &mut Mapping) {
    let emptied = match node.get_mapping_mut("config") {
        Some(config) => config.remove("tags").is_some() && config.is_empty(),
        None => false,
    };
    if emptied {
        node.remove("config");
    }
}

/// Read a node's tags from `config.tags` or legacy `tags`
pub fn read_tags(node: &Mapping) -> Vec<String> {
    let tags = node
        .get_mapping("config")
        .and_then(|config| config.get("tags"))
        .or_else(|| node.get("tags"));
    match tags.map(Node::to_value) {
        Some(Value::Sequence(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        Some(Value::String(tag)) => vec![tag],
        _ => Vec::new(),
    }
}

/// Set `description`, placing a new key right after `name`
pub fn set_description(node: &mut Mapping, description: &str) {
    let index = node.position("name").map_or(0, |index| index + 1);
    node.set_at(index, "description", description);
}
