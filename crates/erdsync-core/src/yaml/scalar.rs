//! Scalar decoding and rendering helpers

use serde_yaml::Value;

/// Characters that may not start a plain scalar in our output
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
    '`',
];

/// Decode the raw text of a leaf value (everything after `key:` or `- `,
/// plus continuation lines).
///
/// Text that serde_yaml refuses on its own, such as a bare alias, is kept
/// as a string.
pub(crate) fn decode(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!("keeping undecodable scalar as text: {}", err);
            Value::String(strip_comment(text).trim().to_string())
        }
    }
}

/// Decode a mapping key as written in the source
pub(crate) fn decode_key(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('"') || raw.starts_with('\'') {
        if let Ok(key) = serde_yaml::from_str::<String>(raw) {
            return key;
        }
    }
    raw.to_string()
}

/// Render a value on a single line in the fixed output style
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => render_str(s),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", render(k), render(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, render(&tagged.value)),
    }
}

/// Render a string, plain when that reads back as the same string
pub(crate) fn render_str(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        quote(s)
    }
}

fn is_plain_safe(s: &str) -> bool {
    if s.is_empty()
        || s.trim() != s
        || s.starts_with(INDICATORS)
        || s.ends_with(':')
        || s.contains(": ")
        || s.contains(" #")
        || s.contains(['\'', '"', '\n', '\r', '\t'])
    {
        return false;
    }
    // Rejects strings that would read back as bools, numbers or null
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(ref parsed)) if parsed == s)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Byte offset of the `:` separating a mapping key from its value, if the
/// content starts with a mapping key.
pub(crate) fn find_key_colon(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 0;
    match bytes.first() {
        None | Some(b'[') | Some(b'{') | Some(b'#') => return None,
        Some(&quote @ (b'\'' | b'"')) => {
            i = 1;
            while i < bytes.len() {
                if quote == b'"' && bytes[i] == b'\\' {
                    i += 2;
                    continue;
                }
                if bytes[i] == quote {
                    if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i += 1;
        }
        Some(_) => {}
    }
    while i < bytes.len() {
        match bytes[i] {
            b':' if matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) => return Some(i),
            b'#' if i > 0 && matches!(bytes[i - 1], b' ' | b'\t') => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Drop a trailing `# comment` from the inline part of a line
pub(crate) fn strip_comment(text: &str) -> &str {
    let trimmed = text.trim_start();
    let offset = text.len() - trimmed.len();
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    if let Some(&quote @ (b'\'' | b'"')) = bytes.first() {
        i = 1;
        while i < bytes.len() && bytes[i] != quote {
            if quote == b'"' && bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
    }
    while i < bytes.len() {
        if bytes[i] == b'#' && (i == 0 || matches!(bytes[i - 1], b' ' | b'\t')) {
            return &text[..offset + i];
        }
        i += 1;
    }
    text
}

/// Read a value as an unsigned integer, accepting numeric strings
pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
