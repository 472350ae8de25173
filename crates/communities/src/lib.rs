pub mod graph_export;
pub mod json;
pub mod report;
pub mod union_find;

pub use graph_export::{GraphData, GraphExporter};
pub use json::extract_json;
pub use report::{
    build_evidence_table, fallback_report, generate_report, parse_report, ReportConfig,
    ReportOutcome,
};
pub use union_find::{connected_components, CommunityStats, UnionFind};

use anyhow::{Context, Result};
use extract::LanguageModel;
use futures::stream::{self, StreamExt};
use index::{CommunityReportRecord, GraphStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CommunityDetection {
    /// Member names per community; the position is the community id.
    pub communities: Vec<Vec<String>>,
    pub stats: CommunityStats,
}

/// Partitions the entity graph into connected components and writes the ids.
pub struct CommunityDetector {
    exporter: GraphExporter,
    store: Arc<dyn GraphStore>,
}

impl CommunityDetector {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            exporter: GraphExporter::new(store.clone()),
            store,
        }
    }

    /// Ids are assigned largest community first, so the same graph always gets
    /// the same ids. Every entity, isolated ones included, ends up in exactly
    /// one community.
    pub async fn run(&self) -> Result<CommunityDetection> {
        let graph_data = self
            .exporter
            .export_graph()
            .await
            .context("Failed to export graph")?;

        let components = connected_components(&graph_data);
        let stats = CommunityStats::compute(&graph_data, &components);

        let mut assignments = Vec::with_capacity(graph_data.entities.len());
        let communities: Vec<Vec<String>> = components
            .iter()
            .enumerate()
            .map(|(community_id, members)| {
                members
                    .iter()
                    .map(|&idx| {
                        let name = graph_data.entities[idx].clone();
                        assignments.push((name.clone(), community_id as u32));
                        name
                    })
                    .collect()
            })
            .collect();

        self.store
            .write_community_assignments(&assignments)
            .await
            .context("Failed to write community assignments")?;

        info!(
            communities = stats.community_count,
            nodes = stats.node_count,
            relationships = stats.relationship_count,
            largest = stats.largest_community_size,
            smallest = stats.smallest_community_size,
            "communities detected"
        );

        Ok(CommunityDetection { communities, stats })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub communities: usize,
    pub parsed: usize,
    pub fallback: usize,
    pub failed: usize,
    pub failed_ids: Vec<u32>,
}

/// Generates and stores one report per community.
pub struct CommunityReporter {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    config: ReportConfig,
}

impl CommunityReporter {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<dyn GraphStore>, config: ReportConfig) -> Self {
        Self { llm, store, config }
    }

    /// Reports replace any stored report for the same community. Unparseable
    /// output is stored as a flagged fallback; failed calls store nothing.
    pub async fn run(&self) -> Result<ReportSummary> {
        self.store
            .health_check()
            .await
            .context("graph store unavailable for community reports")?;

        let members = self
            .store
            .community_members(self.config.min_community_size)
            .await
            .context("Failed to read community members")?;

        let tasks: Vec<_> = members
            .iter()
            .map(|community| async move {
                let outcome = generate_report(
                    self.llm.as_ref(),
                    &community.entities,
                    &community.relationships,
                    &self.config,
                )
                .await;
                (community.community_id, outcome)
            })
            .collect();
        let outcomes: Vec<_> = stream::iter(tasks)
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut summary = ReportSummary {
            communities: members.len(),
            ..Default::default()
        };
        let mut records = Vec::new();
        for (community_id, outcome) in outcomes {
            match outcome {
                ReportOutcome::Parsed(report) => {
                    summary.parsed += 1;
                    records.push(CommunityReportRecord {
                        community_id,
                        report,
                        fallback: false,
                    });
                }
                ReportOutcome::Fallback(report) => {
                    summary.fallback += 1;
                    records.push(CommunityReportRecord {
                        community_id,
                        report,
                        fallback: true,
                    });
                }
                ReportOutcome::Failed(error) => {
                    warn!(community_id, %error, "no report stored");
                    summary.failed += 1;
                    summary.failed_ids.push(community_id);
                }
            }
        }

        self.store
            .write_community_reports(&records)
            .await
            .context("Failed to write community reports")?;

        info!(?summary, "community reports generated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use extract::LlmError;
    use index::MemoryGraphStore;

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn report_run_is_send() {
        let reporter = CommunityReporter::new(
            Arc::new(ScriptedModel::new()),
            sample_store(),
            ReportConfig::default(),
        );
        assert_send(reporter.run());
    }

    fn sample_store() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_relationship("A", "B", "A works with B");
        store.add_relationship("B", "C", "B mentors C");
        store.add_relationship("D", "E", "D owns E");
        store.add_entity("F", "PERSON", "A loner");
        store
    }

    #[tokio::test]
    async fn detection_assigns_every_entity() {
        let store = sample_store();
        let detection = CommunityDetector::new(store.clone()).run().await.unwrap();

        assert_eq!(detection.communities.len(), 3);
        assert_eq!(detection.communities[0].len(), 3);
        assert_eq!(detection.stats.node_count, 6);
        assert_eq!(store.community_of("A"), Some(0));
        assert_eq!(store.community_of("C"), Some(0));
        assert_eq!(store.community_of("D"), Some(1));
        assert_eq!(store.community_of("F"), Some(2));
    }

    #[tokio::test]
    async fn detection_is_stable_across_runs() {
        let store = sample_store();
        let detector = CommunityDetector::new(store.clone());
        let first = detector.run().await.unwrap();
        let second = detector.run().await.unwrap();
        assert_eq!(first.communities, second.communities);
    }

    #[tokio::test]
    async fn detection_fails_fast_when_store_is_down() {
        let store = sample_store();
        store.set_available(false);
        assert!(CommunityDetector::new(store).run().await.is_err());
    }

    #[tokio::test]
    async fn reports_are_tagged_by_outcome() {
        let store = sample_store();
        CommunityDetector::new(store.clone()).run().await.unwrap();

        // Community 0 holds A, B, C; community 1 holds D, E; F is too small.
        let llm = Arc::new(
            ScriptedModel::new()
                .on("A works with B", r#"{"title": "ABC", "summary": "s", "rating": 6}"#)
                .on("D owns E", "Sorry, I cannot help with that."),
        );
        let reporter = CommunityReporter::new(llm.clone(), store.clone(), ReportConfig::default());
        let summary = reporter.run().await.unwrap();

        assert_eq!(
            summary,
            ReportSummary {
                communities: 2,
                parsed: 1,
                fallback: 1,
                failed: 0,
                failed_ids: vec![],
            }
        );
        assert_eq!(llm.call_count(), 2);

        let stored = store.community_reports(false).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].report.title, "ABC");
        let all = store.community_reports(true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].fallback);
    }

    #[tokio::test]
    async fn failed_generation_stores_nothing() {
        let store = sample_store();
        CommunityDetector::new(store.clone()).run().await.unwrap();

        let llm = Arc::new(
            ScriptedModel::new()
                .with_default(r#"{"title": "ok"}"#)
                .fail_on("D owns E", LlmError::Status(500)),
        );
        let summary = CommunityReporter::new(llm, store.clone(), ReportConfig::default())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed_ids, vec![1]);
        assert_eq!(store.community_reports(true).await.unwrap().len(), 1);
    }
}
