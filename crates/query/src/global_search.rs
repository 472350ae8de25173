use anyhow::{Context, Result};
use communities::extract_json;
use extract::{generate_with_timeout, GenerateOptions, LanguageModel};
use futures::stream::{self, StreamExt};
use index::{CommunityReportRecord, GraphStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::prompts::{build_map_prompt, build_reduce_prompt};
use crate::references::collapse_data_references;

pub const NO_DATA_ANSWER: &str =
    "I am sorry but I am unable to answer this question given the provided data.";

#[derive(Debug, Clone)]
pub struct GlobalSearchConfig {
    /// Points scoring at or below this are dropped before the reduce stage.
    pub score_threshold: f64,
    pub response_type: String,
    pub max_concurrent: usize,
    pub temperature: f32,
    pub timeout: Option<Duration>,
    /// Also map over reports whose model output did not parse.
    pub include_fallback: bool,
}

impl Default for GlobalSearchConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.0,
            response_type: "multiple paragraphs".to_string(),
            max_concurrent: 4,
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
            include_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub community_id: u32,
    pub description: String,
    pub score: f64,
}

/// Result of mapping the question over one report.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Points(Vec<KeyPoint>),
    /// The call failed or timed out; the report contributes nothing.
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearchTrace {
    pub communities_searched: usize,
    pub map_failures: usize,
    pub points_total: usize,
    pub points_used: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearchResult {
    pub answer: String,
    /// Surviving points, highest score first.
    pub points: Vec<KeyPoint>,
    pub trace: GlobalSearchTrace,
}

/// One report as the data table shown to the map stage.
pub fn format_report_context(record: &CommunityReportRecord) -> String {
    let report = &record.report;
    let mut content = format!("# {}\n\n{}\n", report.title, report.summary);
    for finding in &report.findings {
        content.push_str(&format!("\n## {}\n\n{}\n", finding.summary, finding.explanation));
    }

    format!(
        "-----Reports-----\nid|title|rating|content\n{}|{}|{}|{}",
        record.community_id, report.title, report.rating, content
    )
}

fn score_of(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Accepts `{"points": [...]}` or a bare list of points. Points without a
/// description are skipped; a missing or unreadable score counts as zero.
pub fn parse_map_response(community_id: u32, output: &str) -> Vec<KeyPoint> {
    let items = match extract_json(output) {
        Some(Value::Object(mut object)) => match object.remove("points") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| {
            let description = item.get("description")?.as_str()?.trim();
            if description.is_empty() {
                return None;
            }
            Some(KeyPoint {
                community_id,
                description: description.to_string(),
                score: score_of(item.get("score")),
            })
        })
        .collect()
}

/// Drop points at or below `threshold` and rank the rest, highest first.
/// Equal scores keep map order.
pub fn rank_points(points: Vec<KeyPoint>, threshold: f64) -> Vec<KeyPoint> {
    let mut kept: Vec<KeyPoint> = points.into_iter().filter(|p| p.score > threshold).collect();
    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept
}

pub fn format_analyst_reports(points: &[KeyPoint]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            format!(
                "----Analyst {}----\nImportance Score: {}\n{}\n",
                i + 1,
                point.score,
                point.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map-reduce question answering over the stored community reports.
pub struct GlobalSearch {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    config: GlobalSearchConfig,
}

impl GlobalSearch {
    pub fn new(llm: Arc<dyn LanguageModel>, store: Arc<dyn GraphStore>, config: GlobalSearchConfig) -> Self {
        Self { llm, store, config }
    }

    pub fn config(&self) -> &GlobalSearchConfig {
        &self.config
    }

    async fn map_report(&self, question: &str, record: &CommunityReportRecord) -> MapOutcome {
        let prompt = build_map_prompt(&format_report_context(record), question);
        let options = GenerateOptions::json().with_temperature(self.config.temperature);

        match generate_with_timeout(self.llm.as_ref(), &prompt, &options, self.config.timeout).await {
            Ok(output) => {
                let points = parse_map_response(record.community_id, &output);
                debug!(community_id = record.community_id, points = points.len(), "map call done");
                MapOutcome::Points(points)
            }
            Err(e) => {
                warn!(community_id = record.community_id, error = %e, "map call failed");
                MapOutcome::Failed(e.to_string())
            }
        }
    }

    pub async fn search(&self, question: &str) -> Result<GlobalSearchResult> {
        let reports = self
            .store
            .community_reports(self.config.include_fallback)
            .await
            .context("Failed to load community reports")?;
        self.search_reports(question, &reports).await
    }

    /// Map the question over `reports` in parallel, then reduce the ranked
    /// points in one final call. Map failures only cost their points; a failed
    /// reduce call is returned as an error.
    pub async fn search_reports(
        &self,
        question: &str,
        reports: &[CommunityReportRecord],
    ) -> Result<GlobalSearchResult> {
        let tasks: Vec<_> = reports
            .iter()
            .map(|record| self.map_report(question, record))
            .collect();
        let outcomes: Vec<MapOutcome> = stream::iter(tasks)
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut map_failures = 0;
        let mut all_points = Vec::new();
        for outcome in outcomes {
            match outcome {
                MapOutcome::Points(points) => all_points.extend(points),
                MapOutcome::Failed(_) => map_failures += 1,
            }
        }
        let points_total = all_points.len();
        let points = rank_points(all_points, self.config.score_threshold);

        let trace = GlobalSearchTrace {
            communities_searched: reports.len(),
            map_failures,
            points_total,
            points_used: points.len(),
        };
        info!(?trace, "map stage finished");

        if points.is_empty() {
            return Ok(GlobalSearchResult {
                answer: NO_DATA_ANSWER.to_string(),
                points,
                trace,
            });
        }

        let prompt = build_reduce_prompt(
            &format_analyst_reports(&points),
            &self.config.response_type,
            question,
        );
        let options = GenerateOptions::default().with_temperature(self.config.temperature);
        let answer = generate_with_timeout(self.llm.as_ref(), &prompt, &options, self.config.timeout)
            .await
            .context("reduce stage failed")?;

        Ok(GlobalSearchResult {
            answer: collapse_data_references(answer.trim()),
            points,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use extract::LlmError;
    use index::{CommunityReport, MemoryGraphStore};

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn search_futures_are_send() {
        let search = GlobalSearch::new(
            Arc::new(ScriptedModel::new()),
            Arc::new(MemoryGraphStore::new()),
            GlobalSearchConfig::default(),
        );
        let reports = vec![record(0, "Apple", false)];
        assert_send(search.search("question"));
        assert_send(search.search_reports("question", &reports));
    }

    fn record(community_id: u32, title: &str, fallback: bool) -> CommunityReportRecord {
        CommunityReportRecord {
            community_id,
            report: CommunityReport {
                title: title.to_string(),
                summary: format!("{} summary", title),
                rating: 5.0,
                rating_explanation: String::new(),
                findings: vec![],
            },
            fallback,
        }
    }

    fn point(score: f64, description: &str) -> KeyPoint {
        KeyPoint {
            community_id: 0,
            description: description.to_string(),
            score,
        }
    }

    #[test]
    fn map_response_shapes() {
        let object = r#"{"points": [{"description": "A [Data: Reports (1)]", "score": 80},
                                    {"description": "", "score": 10},
                                    {"description": "B", "score": "35"}]}"#;
        let points = parse_map_response(1, object);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].score, 35.0);

        let bare = r#"[{"description": "C"}]"#;
        assert_eq!(parse_map_response(2, bare), vec![KeyPoint {
            community_id: 2,
            description: "C".to_string(),
            score: 0.0,
        }]);

        assert!(parse_map_response(3, "no idea").is_empty());
    }

    #[test]
    fn ranking_drops_threshold_and_sorts() {
        let ranked = rank_points(
            vec![point(20.0, "low"), point(0.0, "zero"), point(90.0, "high"), point(20.0, "low2")],
            0.0,
        );
        let order: Vec<&str> = ranked.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(order, vec!["high", "low", "low2"]);
    }

    #[test]
    fn analyst_sections_are_numbered() {
        let text = format_analyst_reports(&[point(90.0, "first"), point(40.0, "second")]);
        assert!(text.starts_with("----Analyst 1----\nImportance Score: 90\nfirst\n"));
        assert!(text.contains("----Analyst 2----\nImportance Score: 40\nsecond"));
    }

    #[tokio::test]
    async fn map_failures_cost_only_their_points() {
        let llm = Arc::new(
            ScriptedModel::new()
                .on("Analyst Reports", "Apple was founded by Jobs [Data: Reports (0, 1, 2, 3, 4, 5, 6)].")
                .on("Apple summary", r#"{"points": [{"description": "Jobs founded Apple [Data: Reports (0)]", "score": 90}]}"#)
                .fail_on("Pixar summary", LlmError::Timeout(Duration::from_secs(1)))
                .on("Empty summary", r#"{"points": [{"description": "I don't know", "score": 0}]}"#),
        );
        let store = Arc::new(MemoryGraphStore::new());
        let search = GlobalSearch::new(llm.clone(), store, GlobalSearchConfig::default());

        let reports = vec![record(0, "Apple", false), record(1, "Pixar", false), record(2, "Empty", false)];
        let result = search.search_reports("Who founded Apple?", &reports).await.unwrap();

        assert_eq!(result.trace.communities_searched, 3);
        assert_eq!(result.trace.map_failures, 1);
        assert_eq!(result.trace.points_total, 2);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.answer, "Apple was founded by Jobs [Data: Reports (0, 1, 2, 3, 4, +more)].");
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn no_surviving_points_skips_reduce() {
        let llm = Arc::new(ScriptedModel::new().with_default(r#"{"points": []}"#));
        let search = GlobalSearch::new(llm.clone(), Arc::new(MemoryGraphStore::new()), GlobalSearchConfig::default());

        let result = search.search_reports("q", &[record(0, "Apple", false)]).await.unwrap();
        assert_eq!(result.answer, NO_DATA_ANSWER);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn reduce_failure_is_returned() {
        let llm = Arc::new(
            ScriptedModel::new()
                .fail_on("Analyst Reports", LlmError::Status(500))
                .with_default(r#"{"points": [{"description": "p", "score": 50}]}"#),
        );
        let search = GlobalSearch::new(llm, Arc::new(MemoryGraphStore::new()), GlobalSearchConfig::default());
        assert!(search.search_reports("q", &[record(0, "Apple", false)]).await.is_err());
    }

    #[tokio::test]
    async fn fallback_reports_are_skipped_by_default() {
        let store = Arc::new(MemoryGraphStore::new());
        store
            .write_community_reports(&[record(0, "Apple", false), record(1, "Unknown Community", true)])
            .await
            .unwrap();
        let llm = Arc::new(ScriptedModel::new().with_default(r#"{"points": []}"#));
        let search = GlobalSearch::new(llm.clone(), store, GlobalSearchConfig::default());

        let result = search.search("q").await.unwrap();
        assert_eq!(result.trace.communities_searched, 1);
        assert_eq!(llm.call_count(), 1);
    }
}
