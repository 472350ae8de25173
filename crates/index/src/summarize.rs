//! Collapses the raw description lists accumulated during extraction into one
//! summary per entity and one `SUMMARIZED_RELATIONSHIP` per related pair.

use crate::model::{EntitySummary, RelationshipSummary};
use crate::store::GraphStore;
use anyhow::{Context, Result};
use extract::{generate_with_timeout, GenerateOptions, LanguageModel};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SUMMARIZE_PROMPT: &str = r#"
You are a helpful assistant responsible for generating a comprehensive summary of the data provided below.
Given one or two entities, and a list of descriptions, all related to the same entity or group of entities.
Please concatenate all of these into a single, comprehensive description. Make sure to include information collected from all the descriptions.
If the provided descriptions are contradictory, please resolve the contradictions and provide a single, coherent summary.
Make sure it is written in third person, and include the entity names so we have the full context.

#######
-Data-
Entities: {entity_name}
Description List: {description_list}
#######
Output:
"#;

pub fn build_summarize_prompt(entity_name: &str, descriptions: &[String]) -> String {
    let description_list = serde_json::to_string(descriptions).unwrap_or_default();
    SUMMARIZE_PROMPT
        .replace("{entity_name}", entity_name)
        .replace("{description_list}", &description_list)
}

#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    pub max_concurrent: usize,
    pub timeout: Option<Duration>,
    pub temperature: f32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Some(Duration::from_secs(120)),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationSummary {
    pub entities_summarized: usize,
    pub entities_failed: usize,
    pub relationships_summarized: usize,
    pub relationships_failed: usize,
}

pub struct DescriptionConsolidator {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    config: ConsolidationConfig,
}

impl DescriptionConsolidator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn GraphStore>,
        config: ConsolidationConfig,
    ) -> Self {
        Self { llm, store, config }
    }

    async fn summarize(&self, label: &str, descriptions: &[String]) -> Option<String> {
        let prompt = build_summarize_prompt(label, descriptions);
        let options = GenerateOptions::default().with_temperature(self.config.temperature);
        match generate_with_timeout(self.llm.as_ref(), &prompt, &options, self.config.timeout).await
        {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!(target_name = label, "empty summary");
                None
            }
            Err(e) => {
                warn!(target_name = label, error = %e, "summary generation failed");
                None
            }
        }
    }

    /// Summarize every entity and related pair with more than one description.
    /// Single descriptions are copied as-is by the store. Individual failures
    /// are counted; the affected item keeps no summary.
    pub async fn run(&self) -> Result<ConsolidationSummary> {
        self.store
            .health_check()
            .await
            .context("graph store unavailable for consolidation")?;

        let mut summary = ConsolidationSummary::default();
        let concurrency = self.config.max_concurrent.max(1);

        let entities = self
            .store
            .entity_descriptions()
            .await
            .context("Failed to read entity descriptions")?;
        let pending: Vec<_> = entities
            .into_iter()
            .filter(|e| e.descriptions.len() > 1)
            .collect();

        let tasks: Vec<_> = pending
            .iter()
            .map(|entity| async move {
                let text = self.summarize(&entity.name, &entity.descriptions).await;
                (entity.name.clone(), text)
            })
            .collect();
        let results: Vec<_> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut entity_summaries = Vec::new();
        for (name, text) in results {
            match text {
                Some(text) => entity_summaries.push(EntitySummary { name, summary: text }),
                None => summary.entities_failed += 1,
            }
        }
        summary.entities_summarized = entity_summaries.len();
        self.store
            .write_entity_summaries(&entity_summaries)
            .await
            .context("Failed to write entity summaries")?;

        let groups = self
            .store
            .relationship_descriptions()
            .await
            .context("Failed to read relationship descriptions")?;
        let pending: Vec<_> = groups
            .into_iter()
            .filter(|g| g.descriptions.len() > 1)
            .collect();

        let tasks: Vec<_> = pending
            .iter()
            .map(|group| async move {
                let label = format!("{}, {}", group.source, group.target);
                let text = self.summarize(&label, &group.descriptions).await;
                (group.source.clone(), group.target.clone(), text)
            })
            .collect();
        let results: Vec<_> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut relationship_summaries = Vec::new();
        for (source, target, text) in results {
            match text {
                Some(text) => relationship_summaries.push(RelationshipSummary {
                    source,
                    target,
                    summary: text,
                }),
                None => summary.relationships_failed += 1,
            }
        }
        summary.relationships_summarized = relationship_summaries.len();
        self.store
            .write_relationship_summaries(&relationship_summaries)
            .await
            .context("Failed to write relationship summaries")?;

        info!(?summary, "descriptions consolidated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryGraphStore;
    use extract::testing::ScriptedModel;
    use extract::LlmError;

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn consolidation_run_is_send() {
        let consolidator = DescriptionConsolidator::new(
            Arc::new(ScriptedModel::new()),
            store(),
            ConsolidationConfig::default(),
        );
        assert_send(consolidator.run());
    }

    fn store() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_entity("APPLE", "ORGANIZATION", "A company");
        store.add_entity("APPLE", "ORGANIZATION", "Makes phones");
        store.add_entity("JOBS", "PERSON", "A founder");
        store.add_entity("WOZ", "PERSON", "An engineer");
        store.add_entity("WOZ", "PERSON", "Co-founder");
        store.add_relationship("JOBS", "APPLE", "founded");
        store.add_relationship("APPLE", "JOBS", "was led by");
        store.add_relationship("WOZ", "APPLE", "co-founded");
        store
    }

    #[test]
    fn prompt_lists_descriptions_as_json() {
        let prompt = build_summarize_prompt("APPLE", &["a".to_string(), "b".to_string()]);
        assert!(prompt.contains("Entities: APPLE"));
        assert!(prompt.contains(r#"Description List: ["a","b"]"#));
    }

    #[tokio::test]
    async fn summarizes_multi_description_items_only() {
        let store = store();
        let llm = Arc::new(ScriptedModel::new().with_default("merged summary"));
        let consolidator =
            DescriptionConsolidator::new(llm.clone(), store.clone(), ConsolidationConfig::default());

        let summary = consolidator.run().await.unwrap();

        assert_eq!(summary.entities_summarized, 2);
        assert_eq!(summary.relationships_summarized, 1);
        assert_eq!(summary.entities_failed + summary.relationships_failed, 0);
        assert_eq!(llm.call_count(), 3);

        assert_eq!(store.entity_summary("APPLE").as_deref(), Some("merged summary"));
        assert_eq!(store.entity_summary("JOBS").as_deref(), Some("A founder"));
        assert_eq!(
            store.summarized_relationship("APPLE", "JOBS").as_deref(),
            Some("merged summary")
        );
        assert_eq!(
            store.summarized_relationship("APPLE", "WOZ").as_deref(),
            Some("co-founded")
        );
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let store = store();
        let llm = Arc::new(
            ScriptedModel::new()
                .with_default("merged")
                .fail_on("Entities: WOZ", LlmError::Status(500)),
        );
        let consolidator =
            DescriptionConsolidator::new(llm, store.clone(), ConsolidationConfig::default());

        let summary = consolidator.run().await.unwrap();

        assert_eq!(summary.entities_summarized, 1);
        assert_eq!(summary.entities_failed, 1);
        assert_eq!(store.entity_summary("WOZ"), None);
    }

    #[tokio::test]
    async fn unavailable_store_fails_fast() {
        let store = store();
        store.set_available(false);
        let llm = Arc::new(ScriptedModel::new());
        let consolidator =
            DescriptionConsolidator::new(llm.clone(), store, ConsolidationConfig::default());

        assert!(consolidator.run().await.is_err());
        assert_eq!(llm.call_count(), 0);
    }
}
