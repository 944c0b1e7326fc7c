//! Format-preserving YAML documents
//!
//! Block mappings and block sequences are parsed into a tree that keeps the
//! original source lines of every entry. Leaves (scalars and flow
//! collections) are decoded with serde_yaml. Rendering re-emits untouched
//! entries verbatim, so comments, key order, quoting and blank lines survive
//! a load/save cycle. Anything the engine introduces is rendered in one
//! fixed style: two-space indentation, block sequences, no flow collections.

mod parser;
pub(crate) mod scalar;

use std::fmt;

use indexmap::IndexMap;
use serde_yaml::Value;

use crate::error::{Error, Result};

/// A node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Sequence),
    /// A scalar or a flow collection
    Scalar(Value),
}

impl Node {
    /// Build a node from a plain value; non-empty collections become block
    /// nodes.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Sequence(items) if !items.is_empty() => {
                let mut seq = Sequence::new();
                for item in items {
                    seq.push(Node::from_value(item));
                }
                Node::Sequence(seq)
            }
            Value::Mapping(map) if !map.is_empty() => {
                let mut mapping = Mapping::new();
                for (key, value) in map {
                    let key = match key {
                        Value::String(s) => s,
                        other => scalar::render(&other),
                    };
                    mapping.insert(&key, Node::from_value(value));
                }
                Node::Mapping(mapping)
            }
            other => Node::Scalar(other),
        }
    }

    /// Convert the node back into a plain value
    pub fn to_value(&self) -> Value {
        match self {
            Node::Mapping(mapping) => Value::Mapping(
                mapping
                    .iter()
                    .map(|(key, node)| (Value::String(key.to_string()), node.to_value()))
                    .collect(),
            ),
            Node::Sequence(seq) => Value::Sequence(seq.iter().map(Node::to_value).collect()),
            Node::Scalar(value) => value.clone(),
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// `null`, `[]`, `{}` or an empty block collection
    pub fn is_empty_value(&self) -> bool {
        match self {
            Node::Mapping(mapping) => mapping.is_empty(),
            Node::Sequence(seq) => seq.is_empty(),
            Node::Scalar(Value::Null) => true,
            Node::Scalar(Value::Sequence(items)) => items.is_empty(),
            Node::Scalar(Value::Mapping(map)) => map.is_empty(),
            Node::Scalar(_) => false,
        }
    }

    fn emit_block(&self, fallback_indent: usize, out: &mut Vec<String>) {
        match self {
            Node::Mapping(mapping) => mapping.emit(fallback_indent, out),
            Node::Sequence(seq) => seq.emit(fallback_indent, out),
            Node::Scalar(_) => {}
        }
    }
}

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::Mapping(mapping)
    }
}

impl From<Sequence> for Node {
    fn from(seq: Sequence) -> Self {
        Node::Sequence(seq)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_value(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    /// Comment and blank lines directly above the key
    leading: Vec<String>,
    /// Source lines of the key (and of the value, for leaves); `None` once
    /// the value is replaced
    raw: Option<Vec<String>>,
    value: Node,
}

impl Entry {
    fn new(value: Node) -> Self {
        Self {
            leading: Vec::new(),
            raw: None,
            value,
        }
    }

    fn emit(&self, key: &str, indent: usize, out: &mut Vec<String>) {
        out.extend(self.leading.iter().cloned());
        let pad = " ".repeat(indent);
        let key = scalar::render_str(key);
        match &self.value {
            Node::Scalar(value) => match &self.raw {
                Some(raw) => out.extend(raw.iter().cloned()),
                None => out.push(format!("{pad}{key}: {}", scalar::render(value))),
            },
            Node::Mapping(mapping) if mapping.is_empty() => out.push(format!("{pad}{key}: {{}}")),
            Node::Sequence(seq) if seq.is_empty() => out.push(format!("{pad}{key}: []")),
            block => {
                match &self.raw {
                    Some(raw) => out.extend(raw.iter().cloned()),
                    None => out.push(format!("{pad}{key}:")),
                }
                block.emit_block(indent + 2, out);
            }
        }
    }
}

/// A block mapping with insertion-ordered keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    /// Column of the keys, when parsed from source
    indent: Option<usize>,
    entries: IndexMap<String, Entry>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.value))
    }

    /// Index of a key in document order
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    pub fn get_mapping(&self, key: &str) -> Option<&Mapping> {
        self.get(key).and_then(Node::as_mapping)
    }

    pub fn get_sequence(&self, key: &str) -> Option<&Sequence> {
        self.get(key).and_then(Node::as_sequence)
    }

    pub fn get_mapping_mut(&mut self, key: &str) -> Option<&mut Mapping> {
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Node::Mapping(mapping),
                ..
            }) => Some(mapping),
            _ => None,
        }
    }

    pub fn get_sequence_mut(&mut self, key: &str) -> Option<&mut Sequence> {
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Node::Sequence(seq),
                ..
            }) => Some(seq),
            _ => None,
        }
    }

    /// Set a leaf or subtree value. Returns `false` when the key already
    /// holds an equal value, in which case the source text is left as is.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if let Some(entry) = self.entries.get(key) {
            if entry.value.to_value() == value {
                return false;
            }
        }
        self.insert(key, Node::from_value(value));
        true
    }

    /// Like [`Mapping::set`], but a new key is placed at `index`
    pub fn set_at(&mut self, index: usize, key: &str, value: impl Into<Value>) -> bool {
        if self.contains_key(key) {
            return self.set(key, value);
        }
        self.insert_at(index, key, Node::from_value(value.into()));
        true
    }

    /// Replace the value of an existing key (keeping its position and the
    /// comments above it) or append a new key.
    pub fn insert(&mut self, key: &str, node: Node) {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.value = node;
                entry.raw = None;
            }
            None => {
                self.entries.insert(key.to_string(), Entry::new(node));
            }
        }
    }

    /// Insert a new key at `index`; an existing key is replaced in place.
    pub fn insert_at(&mut self, index: usize, key: &str, node: Node) {
        if self.contains_key(key) {
            self.insert(key, node);
            return;
        }
        let index = index.min(self.entries.len());
        self.entries
            .shift_insert(index, key.to_string(), Entry::new(node));
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Return the mapping under `key`, creating it (at `index` when given)
    /// if the key is absent or holds an empty value.
    pub fn ensure_mapping_at(&mut self, key: &str, index: Option<usize>) -> Result<&mut Mapping> {
        let create = match self.get(key) {
            Some(Node::Mapping(_)) => false,
            Some(node) if node.is_empty_value() => true,
            Some(_) => {
                return Err(Error::validation(format!(
                    "expected '{key}' to be a mapping"
                )))
            }
            None => true,
        };
        if create {
            match index {
                Some(index) => self.insert_at(index, key, Node::Mapping(Mapping::new())),
                None => self.insert(key, Node::Mapping(Mapping::new())),
            }
        }
        self.get_mapping_mut(key)
            .ok_or_else(|| Error::validation(format!("expected '{key}' to be a mapping")))
    }

    pub fn ensure_mapping(&mut self, key: &str) -> Result<&mut Mapping> {
        self.ensure_mapping_at(key, None)
    }

    /// Return the sequence under `key`, creating it if the key is absent or
    /// holds an empty value.
    pub fn ensure_sequence(&mut self, key: &str) -> Result<&mut Sequence> {
        let create = match self.get(key) {
            Some(Node::Sequence(_)) => false,
            Some(node) if node.is_empty_value() => true,
            Some(_) => return Err(Error::validation(format!("expected '{key}' to be a list"))),
            None => true,
        };
        if create {
            self.insert(key, Node::Sequence(Sequence::new()));
        }
        self.get_sequence_mut(key)
            .ok_or_else(|| Error::validation(format!("expected '{key}' to be a list")))
    }

    fn emit(&self, fallback_indent: usize, out: &mut Vec<String>) {
        let indent = self.indent.unwrap_or(fallback_indent);
        for (key, entry) in &self.entries {
            entry.emit(key, indent, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Item {
    leading: Vec<String>,
    /// Source lines of a leaf item, or the lone `-` line above a block item;
    /// `None` for new items and for block items that start on the dash line
    raw: Option<Vec<String>>,
    value: Node,
}

/// A block sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    /// Column of the dashes, when parsed from source
    indent: Option<usize>,
    items: Vec<Item>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.items.get(index).map(|item| &item.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.items.iter().map(|item| &item.value)
    }

    /// Items that are mappings
    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.iter().filter_map(Node::as_mapping)
    }

    pub fn mappings_mut(&mut self) -> impl Iterator<Item = &mut Mapping> {
        self.items
            .iter_mut()
            .filter_map(|item| item.value.as_mapping_mut())
    }

    pub fn mapping_mut(&mut self, index: usize) -> Option<&mut Mapping> {
        self.items
            .get_mut(index)
            .and_then(|item| item.value.as_mapping_mut())
    }

    /// Index of the first mapping item satisfying `pred`
    pub fn position_mapping(&self, pred: impl Fn(&Mapping) -> bool) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.value.as_mapping().is_some_and(&pred))
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.items.push(Item {
            leading: Vec::new(),
            raw: None,
            value: node.into(),
        });
    }

    /// Replace an item with an empty mapping, keeping the comments above it
    pub fn reset_to_mapping(&mut self, index: usize) -> Option<&mut Mapping> {
        let item = self.items.get_mut(index)?;
        item.value = Node::Mapping(Mapping::new());
        item.raw = None;
        item.value.as_mapping_mut()
    }

    pub fn remove(&mut self, index: usize) -> Node {
        self.items.remove(index).value
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Node) -> bool) {
        self.items.retain(|item| keep(&item.value));
    }

    fn emit(&self, fallback_indent: usize, out: &mut Vec<String>) {
        let indent = self.indent.unwrap_or(fallback_indent);
        let pad = " ".repeat(indent);
        for item in &self.items {
            out.extend(item.leading.iter().cloned());
            match &item.value {
                Node::Scalar(value) => match &item.raw {
                    Some(raw) => out.extend(raw.iter().cloned()),
                    None => out.push(format!("{pad}- {}", scalar::render(value))),
                },
                Node::Mapping(mapping) if mapping.is_empty() => out.push(format!("{pad}- {{}}")),
                Node::Sequence(seq) if seq.is_empty() => out.push(format!("{pad}- []")),
                block => match &item.raw {
                    Some(raw) => {
                        out.extend(raw.iter().cloned());
                        block.emit_block(indent + 2, out);
                    }
                    None => {
                        let start = out.len();
                        block.emit_block(indent + 2, out);
                        mark_dash(out, start, indent);
                    }
                },
            }
        }
    }
}

/// Put the item dash back on the first content line of a block item
fn mark_dash(out: &mut [String], start: usize, indent: usize) {
    if let Some(line) = out[start..].iter_mut().find(|line| !is_trivia(line)) {
        if line.as_bytes().get(indent) == Some(&b' ') {
            line.replace_range(indent..indent + 1, "-");
        }
    }
}

pub(crate) fn is_trivia(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// A YAML document whose root is a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Lines before the root mapping (comments, directives, `---`)
    header: Vec<String>,
    root: Mapping,
    /// Lines after the root mapping
    trailing: Vec<String>,
    line_ending: &'static str,
    final_newline: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document
    pub fn new() -> Self {
        Self {
            header: Vec::new(),
            root: Mapping::new(),
            trailing: Vec::new(),
            line_ending: "\n",
            final_newline: true,
        }
    }

    /// Parse YAML text, keeping enough of the source to re-emit it verbatim
    pub fn parse(text: &str) -> Result<Self> {
        let has_content = text.lines().any(|line| !is_trivia(line));
        if has_content {
            if let Err(err) = serde_yaml::from_str::<Value>(text) {
                return Err(Error::Parse {
                    path: None,
                    line: err.location().map(|loc| loc.line()).unwrap_or(0),
                    message: err.to_string(),
                });
            }
        }
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let final_newline = text.is_empty() || text.ends_with('\n');
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let (header, root, trailing) = parser::Parser::new(lines).parse_document()?;
        Ok(Self {
            header,
            root,
            trailing,
            line_ending,
            final_newline,
        })
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Mapping {
        &mut self.root
    }

    /// Render the document as text
    pub fn render(&self) -> String {
        let mut lines = self.header.clone();
        self.root.emit(0, &mut lines);
        lines.extend(self.trailing.iter().cloned());
        if lines.is_empty() {
            return String::new();
        }
        let mut text = lines.join(self.line_ending);
        if self.final_newline {
            text.push_str(self.line_ending);
        }
        text
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
