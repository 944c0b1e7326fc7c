//! Line-based parser for block-structured YAML
//!
//! Only the block layout is interpreted here. Input has already been
//! validated by serde_yaml, so the parser can assume well-formed YAML and
//! reports errors only for layouts it does not model (for example complex
//! `?` keys).

use serde_yaml::Value;

use super::scalar::{decode, decode_key, find_key_colon, strip_comment};
use super::{is_trivia, Entry, Item, Mapping, Node, Sequence};
use crate::error::{Error, Result};

pub(super) struct Parser {
    lines: Vec<String>,
    pos: usize,
}

impl Parser {
    pub(super) fn new(lines: Vec<String>) -> Self {
        Self { lines, pos: 0 }
    }

    /// Parse the whole document into header lines, root mapping and
    /// trailing lines.
    pub(super) fn parse_document(mut self) -> Result<(Vec<String>, Mapping, Vec<String>)> {
        let mut header_end = 0;
        while let Some(next) = self.next_content(header_end) {
            if !is_directive(&self.lines[next]) {
                break;
            }
            header_end = next + 1;
        }
        let mut header = self.lines[..header_end].to_vec();
        self.pos = header_end;

        let root = match self.next_content(self.pos) {
            Some(next) => {
                let indent = indent_of(&self.lines[next]);
                if is_dash(&self.lines[next][indent..]) {
                    return Err(self.error(next, "document root must be a mapping"));
                }
                self.parse_mapping(indent)?
            }
            None => {
                // Comment-only file: the comments stay above anything added later
                header.extend(self.lines[header_end..].iter().cloned());
                self.pos = self.lines.len();
                Mapping::new()
            }
        };

        if let Some(next) = self.next_content(self.pos) {
            if self.lines[next].trim_end() != "..." {
                return Err(self.error(next, "unexpected content after the root mapping"));
            }
        }
        let trailing = self.lines[self.pos..].to_vec();
        Ok((header, root, trailing))
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Mapping> {
        let mut mapping = Mapping {
            indent: Some(indent),
            ..Mapping::default()
        };
        while let Some(next) = self.next_content(self.pos) {
            let line_indent = indent_of(&self.lines[next]);
            if line_indent < indent
                || (line_indent == indent && is_dash(&self.lines[next][line_indent..]))
            {
                break;
            }
            if line_indent > indent {
                return Err(self.error(next, "unexpected indentation"));
            }

            let line = self.lines[next].clone();
            let content = &line[indent..];
            if content.starts_with("? ") {
                return Err(self.error(next, "complex mapping keys are not supported"));
            }
            let colon = find_key_colon(content)
                .ok_or_else(|| self.error(next, "expected a mapping key"))?;
            let key = decode_key(&content[..colon]);
            let leading = self.lines[self.pos..next].to_vec();
            self.pos = next + 1;

            let (raw, value) = self.parse_value(next, indent, &content[colon + 1..], true)?;
            mapping.entries.insert(
                key,
                Entry {
                    leading,
                    raw: Some(raw),
                    value,
                },
            );
        }
        Ok(mapping)
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Sequence> {
        let mut seq = Sequence {
            indent: Some(indent),
            ..Sequence::default()
        };
        while let Some(next) = self.next_content(self.pos) {
            let line_indent = indent_of(&self.lines[next]);
            if line_indent < indent || !is_dash(&self.lines[next][line_indent..]) {
                break;
            }
            if line_indent > indent {
                return Err(self.error(next, "unexpected indentation"));
            }

            let leading = self.lines[self.pos..next].to_vec();
            let line = self.lines[next].clone();
            let after = &line[indent + 1..];
            let content = after.trim_start();

            if only_properties(content) {
                // A lone dash (maybe with an anchor or tag); the item's value
                // starts on the next line
                self.pos = next + 1;
                let (raw, value) = self.parse_value(next, indent, after, false)?;
                seq.items.push(Item {
                    leading,
                    raw: Some(raw),
                    value,
                });
                continue;
            }

            let column = indent + 1 + (after.len() - content.len());
            if is_dash(content) || find_key_colon(content).is_some() {
                // Blank out the dash so the nested block parses at its own column
                self.lines[next].replace_range(indent..indent + 1, " ");
                self.pos = next;
                let value = if is_dash(content) {
                    Node::Sequence(self.parse_sequence(column)?)
                } else {
                    Node::Mapping(self.parse_mapping(column)?)
                };
                seq.items.push(Item {
                    leading,
                    raw: None,
                    value,
                });
            } else {
                let end = self.continuation_end(next, indent);
                let raw = self.lines[next..end].to_vec();
                let value = decode(&self.leaf_text(after, next, end));
                self.pos = end;
                seq.items.push(Item {
                    leading,
                    raw: Some(raw),
                    value: Node::Scalar(value),
                });
            }
        }
        Ok(seq)
    }

    /// Parse the value following `key:` (or a lone `-`) on line `at`.
    ///
    /// `inline` is the text after the indicator on that line. `compact`
    /// allows a block sequence at the parent's own indentation, which YAML
    /// permits for mapping values only.
    fn parse_value(
        &mut self,
        at: usize,
        parent_indent: usize,
        inline: &str,
        compact: bool,
    ) -> Result<(Vec<String>, Node)> {
        if !only_properties(inline) {
            let end = self.continuation_end(at, parent_indent);
            let raw = self.lines[at..end].to_vec();
            let value = decode(&self.leaf_text(inline, at, end));
            self.pos = end;
            return Ok((raw, Node::Scalar(value)));
        }

        let head = vec![self.lines[at].clone()];
        let Some(next) = self.next_content(self.pos) else {
            return Ok((head, Node::Scalar(Value::Null)));
        };
        let next_indent = indent_of(&self.lines[next]);
        let rest = &self.lines[next][next_indent..];
        let nested = next_indent > parent_indent
            || (compact && next_indent == parent_indent && is_dash(rest));
        if !nested {
            return Ok((head, Node::Scalar(Value::Null)));
        }

        if is_dash(rest) {
            let seq = self.parse_sequence(next_indent)?;
            Ok((head, Node::Sequence(seq)))
        } else if find_key_colon(rest).is_some() {
            let mapping = self.parse_mapping(next_indent)?;
            Ok((head, Node::Mapping(mapping)))
        } else {
            // A scalar that starts on the line below its key
            let end = self.continuation_end(at, parent_indent);
            let raw = self.lines[at..end].to_vec();
            let value = decode(&self.leaf_text(inline, at, end));
            self.pos = end;
            Ok((raw, Node::Scalar(value)))
        }
    }

    /// Source text of a leaf: the inline part plus its continuation lines
    fn leaf_text(&self, inline: &str, at: usize, end: usize) -> String {
        let mut text = inline.to_string();
        text.push('\n');
        for line in &self.lines[at + 1..end] {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// One past the last line that continues the leaf starting at `at`.
    /// Blank lines count only when more continuation follows them.
    fn continuation_end(&self, at: usize, parent_indent: usize) -> usize {
        let mut end = at + 1;
        for (offset, line) in self.lines[at + 1..].iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if indent_of(line) <= parent_indent {
                break;
            }
            end = at + 2 + offset;
        }
        end
    }

    fn next_content(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&i| !is_trivia(&self.lines[i]))
    }

    fn error(&self, line: usize, message: &str) -> Error {
        Error::Parse {
            path: None,
            line: line + 1,
            message: message.to_string(),
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_dash(content: &str) -> bool {
    content == "-" || content.starts_with("- ") || content.starts_with("-\t")
}

/// Nothing but `&anchor` / `!tag` properties (or nothing at all), so the
/// node itself starts on a later line
fn only_properties(inline: &str) -> bool {
    strip_comment(inline)
        .split_whitespace()
        .all(|token| token.starts_with('&') || token.starts_with('!'))
}

fn is_directive(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ") || line.starts_with('%')
}
