use anyhow::{Context, Result};
use extract::{generate_with_timeout, GenerateOptions, LanguageModel};
use index::{cosine_similarity, ContextLimits, EmbedOptions, Embedder, EntityRecord, GraphStore, LocalContext};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::global_search::NO_DATA_ANSWER;
use crate::prompts::build_local_prompt;
use crate::references::collapse_data_references;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "who", "what", "when", "where", "which", "why",
    "how", "did", "does", "with", "from", "that", "this", "these", "those", "about", "into",
    "has", "have", "had", "his", "her", "its", "their", "them", "they", "you", "your", "can",
    "tell", "between", "is", "of", "to", "in", "on", "a", "an",
];

#[derive(Debug, Clone)]
pub struct LocalSearchConfig {
    /// Entities whose neighbourhood goes into the context.
    pub max_entities: usize,
    /// Name matches fetched before re-ranking.
    pub candidate_limit: usize,
    pub limits: ContextLimits,
    pub response_type: String,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            max_entities: 10,
            candidate_limit: 30,
            limits: ContextLimits::default(),
            response_type: "multiple paragraphs".to_string(),
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTrace {
    pub terms: Vec<String>,
    pub entities_found: usize,
    pub entities_used: usize,
    pub reranked: bool,
    pub relationships: usize,
    pub chunks: usize,
    pub reports: usize,
    pub context_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSearchResult {
    pub answer: String,
    pub entities: Vec<String>,
    pub trace: SearchTrace,
}

/// Distinct upper-cased words of the question worth matching against entity
/// names, in question order.
pub fn keyword_terms(question: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    question
        .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '-'))
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .map(str::to_uppercase)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn csv_field(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Context tables with the dataset names and record ids the answer cites.
pub fn build_context_tables(context: &LocalContext) -> String {
    let mut out = String::new();

    if !context.reports.is_empty() {
        out.push_str("-----Reports-----\nid,title,content\n");
        for record in &context.reports {
            out.push_str(&format!(
                "{},{},{}\n",
                record.community_id,
                csv_field(&record.report.title),
                csv_field(&record.report.summary)
            ));
        }
        out.push('\n');
    }

    out.push_str("-----Entities-----\nid,entity,type,description,number of mentions\n");
    for (i, entity) in context.entities.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            i + 1,
            entity.name,
            entity.types.join("|"),
            csv_field(&entity.description),
            entity.mentions
        ));
    }

    if !context.relationships.is_empty() {
        out.push_str("\n-----Relationships-----\nid,source,target,description,weight\n");
        for (i, rel) in context.relationships.iter().enumerate() {
            let weight = rel.strength.map(|s| s.to_string()).unwrap_or_default();
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                i + 1,
                rel.source,
                rel.target,
                csv_field(&rel.description),
                weight
            ));
        }
    }

    if !context.chunks.is_empty() {
        out.push_str("\n-----Sources-----\nid,text\n");
        for (i, chunk) in context.chunks.iter().enumerate() {
            out.push_str(&format!("{},{}\n", i + 1, csv_field(&chunk.text)));
        }
    }

    out
}

/// Answers questions about specific entities from their graph neighbourhood.
pub struct LocalSearch {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    embedder: Option<Arc<dyn Embedder>>,
    config: LocalSearchConfig,
}

impl LocalSearch {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<dyn GraphStore>, config: LocalSearchConfig) -> Self {
        Self {
            llm,
            store,
            embedder: None,
            config,
        }
    }

    /// Re-rank name matches by embedding similarity to the question.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Candidates in store order when no embedder is set or embedding fails.
    async fn rank_entities(&self, question: &str, candidates: Vec<EntityRecord>) -> (Vec<EntityRecord>, bool) {
        let Some(embedder) = &self.embedder else {
            return (candidates, false);
        };
        if candidates.len() <= 1 {
            return (candidates, false);
        }

        let mut texts = vec![question.to_string()];
        texts.extend(candidates.iter().map(|e| format!("{}: {}", e.name, e.description)));

        let vectors = match embedder.embed(&texts, &EmbedOptions { dimensions: None, normalize: true }).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors,
            Ok(vectors) => {
                warn!(expected = texts.len(), got = vectors.len(), "embedding count mismatch; keeping name order");
                return (candidates, false);
            }
            Err(e) => {
                warn!(error = %e, "embedding failed; keeping name order");
                return (candidates, false);
            }
        };

        let query = &vectors[0];
        let mut scored: Vec<(f32, EntityRecord)> = candidates
            .into_iter()
            .zip(&vectors[1..])
            .map(|(entity, vector)| (cosine_similarity(query, vector), entity))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        (scored.into_iter().map(|(_, e)| e).collect(), true)
    }

    pub async fn search(&self, question: &str) -> Result<LocalSearchResult> {
        let terms = keyword_terms(question);
        let candidates = if terms.is_empty() {
            Vec::new()
        } else {
            self.store
                .find_entities(&terms, self.config.candidate_limit)
                .await
                .context("Failed to look up entities")?
        };
        let entities_found = candidates.len();

        let (mut ranked, reranked) = self.rank_entities(question, candidates).await;
        ranked.truncate(self.config.max_entities);
        let names: Vec<String> = ranked.into_iter().map(|e| e.name).collect();

        let mut trace = SearchTrace {
            terms,
            entities_found,
            entities_used: names.len(),
            reranked,
            relationships: 0,
            chunks: 0,
            reports: 0,
            context_size: 0,
        };

        if names.is_empty() {
            info!(?trace, "no matching entities");
            return Ok(LocalSearchResult {
                answer: NO_DATA_ANSWER.to_string(),
                entities: names,
                trace,
            });
        }

        let context = self
            .store
            .local_context(&names, self.config.limits)
            .await
            .context("Failed to load local context")?;
        let tables = build_context_tables(&context);
        trace.relationships = context.relationships.len();
        trace.chunks = context.chunks.len();
        trace.reports = context.reports.len();
        trace.context_size = tables.len();
        info!(?trace, "local context assembled");

        let prompt = build_local_prompt(&tables, &self.config.response_type, question);
        let options = GenerateOptions::default().with_temperature(self.config.temperature);
        let answer = generate_with_timeout(self.llm.as_ref(), &prompt, &options, self.config.timeout)
            .await
            .context("local search generation failed")?;

        Ok(LocalSearchResult {
            answer: collapse_data_references(answer.trim()),
            entities: names,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::testing::ScriptedModel;
    use extract::{ExtractionResult, LlmError};
    use index::MemoryGraphStore;

    /// Scores texts by whether they mention "PIXAR".
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String], _: &EmbedOptions) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    if i == 0 || t.contains("PIXAR") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    async fn sample_store() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        let extraction = extract::parse_extraction_output(
            "(\"entity\";STEVE JOBS;PERSON;Co-founder of Apple)|\
             (\"entity\";APPLE INC.;ORGANIZATION;A technology company)|\
             (\"entity\";STEVE JOBS PIXAR ERA;EVENT;Years at PIXAR)|\
             (\"relationship\";STEVE JOBS;APPLE INC.;Jobs founded Apple;9)",
            None,
            None,
        );
        store.write_chunk("book", "book-0", "Apple Inc. was founded by Steve Jobs.", &extraction).await.unwrap();
        store.write_chunk("book", "book-1", "Steve Jobs returned.", &ExtractionResult::default()).await.unwrap();
        store
    }

    #[test]
    fn terms_skip_stopwords_and_repeat() {
        assert_eq!(
            keyword_terms("Who founded Apple, and what did Apple's founder do?"),
            vec!["FOUNDED", "APPLE", "APPLE'S", "FOUNDER"]
        );
        assert!(keyword_terms("who is it?").is_empty());
    }

    #[tokio::test]
    async fn answers_from_entity_neighbourhood() {
        let store = sample_store().await;
        let llm = Arc::new(ScriptedModel::new().with_default("Steve Jobs founded Apple [Data: Entities (1, 2)]."));
        let search = LocalSearch::new(llm.clone(), store, LocalSearchConfig::default());

        let result = search.search("What did Steve Jobs build?").await.unwrap();

        assert!(result.entities.contains(&"STEVE JOBS".to_string()));
        assert_eq!(result.trace.relationships, 1);
        assert_eq!(result.trace.chunks, 1);
        let calls = llm.calls();
        assert!(calls[0].contains("-----Relationships-----"));
        assert!(calls[0].contains("Jobs founded Apple"));
        assert!(calls[0].contains("Apple Inc. was founded by Steve Jobs."));
    }

    #[tokio::test]
    async fn no_match_skips_the_model() {
        let store = sample_store().await;
        let llm = Arc::new(ScriptedModel::new());
        let search = LocalSearch::new(llm.clone(), store, LocalSearchConfig::default());

        let result = search.search("Tell me about Microsoft").await.unwrap();
        assert_eq!(result.answer, NO_DATA_ANSWER);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn embedder_reorders_candidates() {
        let store = sample_store().await;
        let llm = Arc::new(ScriptedModel::new().with_default("ok"));
        let config = LocalSearchConfig {
            max_entities: 1,
            ..Default::default()
        };
        let search = LocalSearch::new(llm, store, config).with_embedder(Arc::new(KeywordEmbedder));

        let result = search.search("Steve Jobs").await.unwrap();
        assert!(result.trace.reranked);
        assert_eq!(result.entities, vec!["STEVE JOBS PIXAR ERA".to_string()]);
    }
}
