/// Produces the merge key for entity names and types: surrounding quotes and
/// whitespace removed, inner whitespace collapsed, upper-cased. Punctuation is
/// kept, so "Apple Inc." and "Apple Inc" stay distinct entities.
#[derive(Debug, Clone, Default)]
pub struct EntityNormalizer;

impl EntityNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, name: &str) -> String {
        let stripped = name.trim().trim_matches(|c| c == '"' || c == '\'');
        stripped
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }

    /// Types become graph labels, so spaces turn into underscores.
    pub fn normalize_type(&self, entity_type: &str) -> String {
        let normalized = self.normalize(entity_type).replace(' ', "_");
        if normalized.is_empty() {
            "ENTITY".to_string()
        } else {
            normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let normalizer = EntityNormalizer::new();

        assert_eq!(normalizer.normalize("GraphRAG"), "GRAPHRAG");
        assert_eq!(normalizer.normalize("  \"Steve   Jobs\" "), "STEVE JOBS");
        assert_eq!(normalizer.normalize("Apple Inc."), "APPLE INC.");
    }

    #[test]
    fn types_become_label_safe() {
        let normalizer = EntityNormalizer::new();

        assert_eq!(normalizer.normalize_type("geo location"), "GEO_LOCATION");
        assert_eq!(normalizer.normalize_type("  "), "ENTITY");
    }
}
