//! Reading and writing `relationships` tests

use crate::error::Result;
use crate::yaml::{Mapping, Node};

/// Keys that hold a column's (or model's) test list, preferred first
pub const TEST_KEYS: [&str; 2] = ["data_tests", "tests"];

/// The parts of a `relationships` test the engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipTest {
    /// The `to` expression, usually `ref('model')`
    pub to: String,
    pub field: Option<String>,
    /// Set on model-level tests, which name the child column explicitly
    pub column_name: Option<String>,
}

/// Read a test list entry, if it is a `relationships` test with a `to`.
/// Values under `arguments` win over legacy keys placed directly under
/// `relationships`.
pub fn read_relationship_test(test: &Node) -> Option<RelationshipTest> {
    let relationships = test.as_mapping()?.get_mapping("relationships")?;
    let arguments = relationships.get_mapping("arguments");
    let lookup = |key: &str| {
        arguments
            .and_then(|args| args.get_str(key))
            .or_else(|| relationships.get_str(key))
            .map(str::to_string)
    };
    Some(RelationshipTest {
        to: lookup("to")?,
        field: lookup("field"),
        column_name: lookup("column_name"),
    })
}

/// All tests declared on a node, across `data_tests` and `tests`
pub fn tests_of(node: &Mapping) -> impl Iterator<Item = &Node> {
    TEST_KEYS
        .into_iter()
        .filter_map(|key| node.get_sequence(key))
        .flat_map(|tests| tests.iter())
}

fn is_relationship(test: Option<&Node>) -> bool {
    test.and_then(Node::as_mapping)
        .is_some_and(|mapping| mapping.contains_key("relationships"))
}

/// A new `{relationships: {arguments: {to, field}}}` test entry
pub fn new_relationship_test(to: &str, field: &str) -> Mapping {
    let mut arguments = Mapping::new();
    arguments.set("to", to);
    arguments.set("field", field);
    let mut relationships = Mapping::new();
    relationships.insert("arguments", arguments.into());
    let mut test = Mapping::new();
    test.insert("relationships", relationships.into());
    test
}

/// Point an existing `relationships` block at `to`/`field`.
///
/// Sibling metadata such as `config` is kept; legacy bare `to`/`field`
/// keys move into `arguments`.
pub fn write_relationship_test(relationships: &mut Mapping, to: &str, field: &str) -> Result<()> {
    let index = relationships
        .position("to")
        .or_else(|| relationships.position("field"));
    let arguments = relationships.ensure_mapping_at("arguments", index)?;
    arguments.set("to", to);
    arguments.set("field", field);
    relationships.remove("to");
    relationships.remove("field");
    Ok(())
}

/// Make `to`/`field` the column's single relationships test.
///
/// The first existing relationships test is rewritten in place; further
/// ones accepted by `is_managed` are dropped. Without any, a new test is
/// appended to `data_tests` (or to legacy `tests` when only that exists).
pub fn upsert_relationship_test(
    column: &mut Mapping,
    to: &str,
    field: &str,
    is_managed: impl Fn(&RelationshipTest) -> bool,
) -> Result<()> {
    let mut written = false;
    for key in TEST_KEYS {
        let Some(tests) = column.get_sequence_mut(key) else {
            continue;
        };
        let mut index = 0;
        while index < tests.len() {
            if !is_relationship(tests.get(index)) {
                index += 1;
                continue;
            }
            if !written {
                if let Some(test) = tests.mapping_mut(index) {
                    write_relationship_test(test.ensure_mapping("relationships")?, to, field)?;
                }
                written = true;
                index += 1;
            } else if tests
                .get(index)
                .and_then(read_relationship_test)
                .is_some_and(|test| is_managed(&test))
            {
                tests.remove(index);
            } else {
                index += 1;
            }
        }
    }

    if !written {
        let key = if !column.contains_key("data_tests") && column.get_sequence("tests").is_some() {
            "tests"
        } else {
            "data_tests"
        };
        column
            .ensure_sequence(key)?
            .push(new_relationship_test(to, field));
    }
    Ok(())
}

/// Drop the column's relationships tests accepted by `is_managed`. Test
/// lists left empty are removed. Returns whether anything changed.
pub fn remove_relationship_tests(
    column: &mut Mapping,
    is_managed: impl Fn(&RelationshipTest) -> bool,
) -> bool {
    let mut changed = false;
    for key in TEST_KEYS {
        let emptied = match column.get_sequence_mut(key) {
            Some(tests) => {
                let before = tests.len();
                tests.retain(|test| !read_relationship_test(test).is_some_and(|t| is_managed(&t)));
                changed |= tests.len() != before;
                tests.len() != before && tests.is_empty()
            }
            None => false,
        };
        if emptied {
            column.remove(key);
        }
    }
    changed
}
