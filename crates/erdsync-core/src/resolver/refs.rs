//! `ref()` expressions and model ids

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A model name with an optional version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    pub version: Option<u32>,
}

impl ModelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn versioned(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "ref('{}', v={})", self.name, version),
            None => write!(f, "ref('{}')", self.name),
        }
    }
}

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^\s*ref\s*\(\s*['"](?P<first>[^'"]+)['"]\s*(?:,\s*['"](?P<second>[^'"]+)['"]\s*)?(?:,\s*(?:v|version)\s*=\s*['"]?(?P<version>\d+)['"]?\s*)?\)\s*$"#,
        )
        .expect("ref pattern is valid")
    })
}

/// Parse a `to` expression.
///
/// Accepts `ref('name')`, `ref("name")`, `ref('package', 'name')` and a
/// trailing `v=N` or `version=N`. Anything else comes back verbatim as
/// the name, without a version.
pub fn parse_ref(text: &str) -> ModelRef {
    let Some(caps) = ref_pattern().captures(text) else {
        return ModelRef::new(text);
    };
    let name = caps
        .name("second")
        .or_else(|| caps.name("first"))
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    let version = match caps.name("version") {
        Some(m) => match m.as_str().parse() {
            Ok(version) => Some(version),
            Err(_) => return ModelRef::new(text),
        },
        None => None,
    };
    ModelRef {
        name: name.to_string(),
        version,
    }
}

/// Render a reference as a `ref()` expression
pub fn format_ref(model: &ModelRef) -> String {
    model.to_string()
}

const RESOURCE_TYPES: [&str; 3] = ["model", "seed", "snapshot"];

/// Strip resource type, package and version qualifiers from a model id:
/// `model.shop.player.v2` becomes `player` at version 2. A trailing `vN`
/// only counts as a version when a name would remain in front of it, so
/// `model.shop.v2` is the model `v2`.
pub fn parse_model_id(id: &str) -> ModelRef {
    let mut parts: Vec<&str> = id.split('.').collect();
    let mut version = None;
    let min_parts = if RESOURCE_TYPES.contains(&parts[0]) { 4 } else { 2 };
    if parts.len() >= min_parts {
        if let Some(v) = parts.last().and_then(|last| parse_version_suffix(last)) {
            version = Some(v);
            parts.pop();
        }
    }
    let name = parts.last().copied().unwrap_or(id);
    ModelRef {
        name: name.to_string(),
        version,
    }
}

fn parse_version_suffix(part: &str) -> Option<u32> {
    let digits = part.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref_forms() {
        assert_eq!(parse_ref("ref('customers')"), ModelRef::new("customers"));
        assert_eq!(parse_ref("ref(\"customers\")"), ModelRef::new("customers"));
        assert_eq!(parse_ref("ref('player', v=1)"), ModelRef::versioned("player", 1));
        assert_eq!(parse_ref("ref('player', version=3)"), ModelRef::versioned("player", 3));
        assert_eq!(parse_ref("ref( 'player' , v='2' )"), ModelRef::versioned("player", 2));
        assert_eq!(parse_ref("ref('shop', 'orders')"), ModelRef::new("orders"));
    }

    #[test]
    fn test_parse_ref_falls_back_to_text() {
        assert_eq!(parse_ref("source('raw', 'orders')"), ModelRef::new("source('raw', 'orders')"));
        assert_eq!(parse_ref("orders"), ModelRef::new("orders"));
        assert_eq!(parse_ref("ref('a', v=x)"), ModelRef::new("ref('a', v=x)"));
    }

    #[test]
    fn test_format_ref() {
        assert_eq!(format_ref(&ModelRef::new("customers")), "ref('customers')");
        assert_eq!(format_ref(&ModelRef::versioned("player", 2)), "ref('player', v=2)");
        assert_eq!(parse_ref(&format_ref(&ModelRef::versioned("player", 2))), ModelRef::versioned("player", 2));
    }

    #[test]
    fn test_parse_model_id() {
        assert_eq!(parse_model_id("model.shop.customers"), ModelRef::new("customers"));
        assert_eq!(parse_model_id("model.shop.player.v2"), ModelRef::versioned("player", 2));
        assert_eq!(parse_model_id("player.v2"), ModelRef::versioned("player", 2));
        assert_eq!(parse_model_id("orders"), ModelRef::new("orders"));
        assert_eq!(parse_model_id("model.shop.vip"), ModelRef::new("vip"));
        assert_eq!(parse_model_id("model.shop.v2"), ModelRef::new("v2"));
        assert_eq!(parse_model_id("model.v2"), ModelRef::new("v2"));
    }
}
