use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
}

/// Relationship strength as the model wrote it. Integral numbers collapse to
/// `Integer`; text that is not a number is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Strength {
    Integer(i64),
    Float(f64),
    Raw(String),
}

impl Strength {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                Strength::Integer(value as i64)
            }
            Ok(value) => Strength::Float(value),
            Err(_) => Strength::Raw(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Strength::Integer(v) => Some(*v as f64),
            Strength::Float(v) => Some(*v),
            Strength::Raw(_) => None,
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Integer(v) => write!(f, "{}", v),
            Strength::Float(v) => write!(f, "{}", v),
            Strength::Raw(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub description: String,
    pub strength: Strength,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedChunk {
    pub chunk_id: String,
    pub book_id: String,
    pub extraction: ExtractionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_coercion() {
        assert_eq!(Strength::parse("9"), Strength::Integer(9));
        assert_eq!(Strength::parse("9.0"), Strength::Integer(9));
        assert_eq!(Strength::parse(" 7.5 "), Strength::Float(7.5));
        assert_eq!(Strength::parse("high"), Strength::Raw("high".to_string()));
    }

    #[test]
    fn strength_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Strength::Integer(3),
            Strength::Float(0.5),
            Strength::Raw("strong".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[3,0.5,"strong"]"#);
    }
}
