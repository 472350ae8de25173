pub mod llm;
pub mod normalizer;
pub mod parser;
pub mod prompt;
pub mod schema;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use llm::{
    generate_with_timeout, normalize_response, GenerateOptions, LanguageModel, LlmError,
    OllamaClient, OllamaConfig,
};
pub use normalizer::EntityNormalizer;
pub use parser::parse_extraction_output;
pub use schema::{Entity, ExtractedChunk, ExtractionResult, Relationship, Strength};

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub entity_types: Vec<String>,
    /// Delimiters handed to the parser; `None` means auto-detect.
    pub record_delimiter: Option<String>,
    pub tuple_delimiter: Option<String>,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            entity_types: ["ORGANIZATION", "PERSON", "LOCATION", "EVENT"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            record_delimiter: None,
            tuple_delimiter: None,
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

pub struct Extractor {
    llm: Arc<dyn LanguageModel>,
    normalizer: EntityNormalizer,
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: ExtractorConfig) -> Self {
        Self {
            llm,
            normalizer: EntityNormalizer::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract entities and relationships from a chunk of text.
    pub async fn extract_from_text(&self, text: &str) -> Result<ExtractionResult, LlmError> {
        let prompt = prompt::build_extraction_prompt(&self.config.entity_types, text);
        let options = GenerateOptions::default().with_temperature(self.config.temperature);

        let output =
            generate_with_timeout(self.llm.as_ref(), &prompt, &options, self.config.timeout)
                .await?;

        let parsed = parse_extraction_output(
            &output,
            self.config.record_delimiter.as_deref(),
            self.config.tuple_delimiter.as_deref(),
        );
        let result = self.normalize(parsed);

        debug!(
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "extracted"
        );
        Ok(result)
    }

    pub async fn extract_chunk(
        &self,
        chunk_id: String,
        book_id: String,
        text: &str,
    ) -> Result<ExtractedChunk, LlmError> {
        let extraction = self.extract_from_text(text).await?;

        Ok(ExtractedChunk {
            chunk_id,
            book_id,
            extraction,
        })
    }

    /// Names become merge keys; records whose name or endpoint normalizes to
    /// nothing are dropped.
    fn normalize(&self, result: ExtractionResult) -> ExtractionResult {
        let entities = result
            .entities
            .into_iter()
            .filter_map(|entity| {
                let name = self.normalizer.normalize(&entity.name);
                (!name.is_empty()).then(|| Entity {
                    name,
                    entity_type: self.normalizer.normalize_type(&entity.entity_type),
                    description: entity.description.trim().to_string(),
                })
            })
            .collect();

        let relationships = result
            .relationships
            .into_iter()
            .filter_map(|rel| {
                let source = self.normalizer.normalize(&rel.source);
                let target = self.normalizer.normalize(&rel.target);
                (!source.is_empty() && !target.is_empty()).then(|| Relationship {
                    source,
                    target,
                    description: rel.description.trim().to_string(),
                    strength: rel.strength,
                })
            })
            .collect();

        ExtractionResult {
            entities,
            relationships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    const APPLE: &str = "Apple Inc. is a technology company founded by Steve Jobs.";

    fn scripted_output() -> &'static str {
        "(\"entity\";Apple Inc.;organization;Apple Inc. is a technology company)|\
         (\"entity\"; steve  jobs ;PERSON;Steve Jobs founded Apple Inc.)|\
         (\"relationship\";Steve Jobs;Apple Inc.;Steve Jobs founded Apple Inc.;9)\n\n"
    }

    #[tokio::test]
    async fn extracts_and_normalizes_names() {
        let model = Arc::new(ScriptedModel::new().on(APPLE, scripted_output()));
        let config = ExtractorConfig {
            entity_types: vec!["ORGANIZATION".into(), "PERSON".into()],
            ..Default::default()
        };
        let extractor = Extractor::new(model.clone(), config);

        let result = extractor.extract_from_text(APPLE).await.unwrap();

        let names: Vec<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["APPLE INC.", "STEVE JOBS"]);
        assert_eq!(result.entities[0].entity_type, "ORGANIZATION");

        assert_eq!(result.relationships.len(), 1);
        let rel = &result.relationships[0];
        assert_eq!(rel.source, "STEVE JOBS");
        assert_eq!(rel.target, "APPLE INC.");
        assert_eq!(rel.strength, Strength::Integer(9));

        let prompt = &model.calls()[0];
        assert!(prompt.contains("One of the following types: [ORGANIZATION,PERSON]"));
        assert!(prompt.contains(&format!("Entity_types: ORGANIZATION,PERSON\nText: {}", APPLE)));
        assert!(!prompt.contains("LOCATION"));
    }

    #[tokio::test]
    async fn drops_records_with_blank_names() {
        let model = Arc::new(ScriptedModel::new().with_default(
            "(\"entity\";\"\";PERSON;nobody)|(\"relationship\";A; ;blank target;1)|(\"entity\";A;PERSON;a)",
        ));
        let extractor = Extractor::new(model, ExtractorConfig::default());

        let result = extractor.extract_from_text("text").await.unwrap();

        assert_eq!(result.entities.len(), 1);
        assert!(result.relationships.is_empty());
    }

    #[tokio::test]
    async fn surfaces_model_errors() {
        let model = Arc::new(ScriptedModel::new().with_default_error(LlmError::Status(503)));
        let extractor = Extractor::new(model, ExtractorConfig::default());

        let err = extractor
            .extract_chunk("b:0".into(), "b".into(), "text")
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Status(503));
    }
}
