//! Parser for the delimited record format the extraction prompt asks for:
//!
//! ```text
//! ("entity"<t>NAME<t>TYPE<t>DESCRIPTION)<r>("relationship"<t>SRC<t>DST<t>DESCRIPTION<t>STRENGTH)
//! ```
//!
//! Models sometimes echo the template placeholders instead of substituting
//! them, so delimiters are auto-detected when not given. Malformed records are
//! dropped; the parser never fails.

use crate::schema::{Entity, ExtractionResult, Relationship, Strength};

pub const COMPLETION_PLACEHOLDER: &str = "{completion_delimiter}";
pub const RECORD_PLACEHOLDER: &str = "{record_delimiter}";
pub const TUPLE_PLACEHOLDER: &str = "{tuple_delimiter}";

/// Placeholder token, else a literal pipe, else newline.
pub fn detect_record_delimiter(text: &str) -> &'static str {
    if text.contains(RECORD_PLACEHOLDER) {
        RECORD_PLACEHOLDER
    } else if text.contains('|') {
        "|"
    } else {
        "\n"
    }
}

/// Placeholder token, else a semicolon, else tab.
pub fn detect_tuple_delimiter(text: &str) -> &'static str {
    if text.contains(TUPLE_PLACEHOLDER) {
        TUPLE_PLACEHOLDER
    } else if text.contains(';') {
        ";"
    } else {
        "\t"
    }
}

pub fn parse_extraction_output(
    output: &str,
    record_delimiter: Option<&str>,
    tuple_delimiter: Option<&str>,
) -> ExtractionResult {
    let cleaned = output.replace(COMPLETION_PLACEHOLDER, "");
    let text = cleaned.trim();

    let record_delimiter = record_delimiter
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| detect_record_delimiter(text));
    let tuple_delimiter = tuple_delimiter
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| detect_tuple_delimiter(text));

    let mut result = ExtractionResult::default();

    for raw in text.split(record_delimiter) {
        let mut record = raw.trim();
        if record.is_empty() {
            continue;
        }

        if let Some(inner) = record.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            record = inner.trim();
        }

        let tokens: Vec<&str> = record.split(tuple_delimiter).map(str::trim).collect();
        let record_type = tokens[0]
            .trim_matches(|c| c == ' ' || c == '"' || c == '\'')
            .to_lowercase();

        match (record_type.as_str(), tokens.as_slice()) {
            ("entity", [_, name, entity_type, description]) => {
                result.entities.push(Entity {
                    name: name.to_string(),
                    entity_type: entity_type.to_string(),
                    description: description.to_string(),
                });
            }
            ("relationship", [_, source, target, description, strength]) => {
                result.relationships.push(Relationship {
                    source: source.to_string(),
                    target: target.to_string(),
                    description: description.to_string(),
                    strength: Strength::parse(strength),
                });
            }
            _ => continue,
        }
    }

    result
}
