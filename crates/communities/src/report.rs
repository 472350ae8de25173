use crate::json::extract_json;
use extract::{generate_with_timeout, GenerateOptions, LanguageModel};
use index::{CommunityReport, Finding, MemberEntity, MemberRelationship};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const COMMUNITY_REPORT_PROMPT: &str = r#"
You are an AI assistant that helps a human analyst to perform general information discovery. Information discovery is the process of identifying and assessing relevant information associated with certain entities (e.g., organizations and individuals) within a network.

# Goal
Write a comprehensive report of a community, given a list of entities that belong to the community as well as their relationships. The report will be used to inform decision-makers about information associated with the community and their potential impact.

# Report Structure

- TITLE: community's name that represents its key entities - title should be short but specific. When possible, include representative named entities in the title.
- SUMMARY: An executive summary of the community's overall structure, how its entities are related to each other, and significant information associated with its entities.
- IMPACT SEVERITY RATING: a float score between 0-10 that represents the severity of IMPACT posed by entities within the community.
- RATING EXPLANATION: Give a single sentence explanation of the IMPACT severity rating.
- DETAILED FINDINGS: A list of 5-10 key insights about the community. Each insight should have a short summary followed by explanatory text grounded according to the grounding rules below.

Return output as a well-formed JSON-formatted string with the following format and nothing else:
    {
        "title": <report_title>,
        "summary": <executive_summary>,
        "rating": <impact_severity_rating>,
        "rating_explanation": <rating_explanation>,
        "findings": [
            {
                "summary": <insight_1_summary>,
                "explanation": <insight_1_explanation>
            },
            {
                "summary": <insight_2_summary>,
                "explanation": <insight_2_explanation>
            }
        ]
    }

# Grounding Rules

Points supported by data should list their data references as follows:

"This is an example sentence supported by multiple data references [Data: <dataset name> (record ids); <dataset name> (record ids)]."

Do not list more than 5 record ids in a single reference. Instead, list the top 5 most relevant record ids and add "+more" to indicate that there are more.

For example:
"Person X is the owner of Company Y and subject to many allegations of wrongdoing [Data: Entities (5, 7); Relationships (23, 2, 34, 64, 46, +more)]."

Do not include information where the supporting evidence for it is not provided.

# Real Data

Use the following text for your answer. Do not make anything up in your answer.

Text:
{input_text}

Output:"#;

#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Evidence table bounds; members beyond them are left out of the prompt.
    pub max_entities: usize,
    pub max_relationships: usize,
    /// Communities smaller than this get no report.
    pub min_community_size: usize,
    pub max_concurrent: usize,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_entities: 10,
            max_relationships: 10,
            min_community_size: 2,
            max_concurrent: 4,
            temperature: 0.0,
            timeout: Some(Duration::from_secs(180)),
        }
    }
}

/// Result of one report generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// The model produced a JSON object.
    Parsed(CommunityReport),
    /// The model answered but nothing in the answer parsed.
    Fallback(CommunityReport),
    /// The model call itself failed or timed out.
    Failed(String),
}

impl ReportOutcome {
    pub fn report(&self) -> Option<&CommunityReport> {
        match self {
            ReportOutcome::Parsed(report) | ReportOutcome::Fallback(report) => Some(report),
            ReportOutcome::Failed(_) => None,
        }
    }
}

pub fn fallback_report() -> CommunityReport {
    CommunityReport {
        title: "Unknown Community".to_string(),
        summary: "Failed to parse community summary".to_string(),
        rating: 5.0,
        rating_explanation: "Default rating due to parsing failure".to_string(),
        findings: Vec::new(),
    }
}

fn csv_field(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Entity and relationship tables with 1-based record ids local to the prompt.
pub fn build_evidence_table(
    entities: &[MemberEntity],
    relationships: &[MemberRelationship],
    max_entities: usize,
    max_relationships: usize,
) -> String {
    let mut table = String::from("Entities\n\nid,entity,type,description\n");
    for (i, entity) in entities.iter().take(max_entities).enumerate() {
        let name = entity.name.clone().unwrap_or_else(|| format!("Unknown_{}", i));
        let entity_type = entity.entity_type.as_deref().unwrap_or("Entity");
        let description = entity
            .description
            .as_deref()
            .unwrap_or("No description available");
        table.push_str(&format!(
            "{},{},{},{}\n",
            i + 1,
            csv_field(&name),
            csv_field(entity_type),
            csv_field(description)
        ));
    }

    table.push_str("\nRelationships\n\nid,source,target,description\n");
    for (i, rel) in relationships.iter().take(max_relationships).enumerate() {
        let source = rel.source.as_deref().unwrap_or("Unknown");
        let target = rel.target.as_deref().unwrap_or("Unknown");
        let description = rel
            .description
            .clone()
            .unwrap_or_else(|| format!("{} is related to {}", source, target));
        table.push_str(&format!(
            "{},{},{},{}\n",
            i + 1,
            csv_field(source),
            csv_field(target),
            csv_field(&description)
        ));
    }

    table
}

pub fn build_report_prompt(evidence_table: &str) -> String {
    COMMUNITY_REPORT_PROMPT.replace("{input_text}", evidence_table)
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn rating_field(value: Option<&Value>) -> f64 {
    let rating = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match rating {
        Some(r) if r.is_finite() => r.clamp(0.0, 10.0),
        _ => 5.0,
    }
}

fn findings_field(value: Option<&Value>) -> Vec<Finding> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(finding) => Some(Finding {
                summary: string_field(finding, "summary"),
                explanation: string_field(finding, "explanation"),
            }),
            Value::String(summary) => Some(Finding {
                summary: summary.clone(),
                explanation: String::new(),
            }),
            _ => None,
        })
        .collect()
}

fn report_from_value(value: Value) -> Option<CommunityReport> {
    let object = match value {
        Value::Object(object) => object,
        Value::Array(items) => match items.into_iter().find(Value::is_object) {
            Some(Value::Object(object)) => object,
            _ => return None,
        },
        _ => return None,
    };

    Some(CommunityReport {
        title: string_field(&object, "title"),
        summary: string_field(&object, "summary"),
        rating: rating_field(object.get("rating")),
        rating_explanation: string_field(&object, "rating_explanation"),
        findings: findings_field(object.get("findings")),
    })
}

/// Never fails: unparseable output becomes the tagged fallback report.
pub fn parse_report(output: &str) -> ReportOutcome {
    match extract_json(output).and_then(report_from_value) {
        Some(report) => ReportOutcome::Parsed(report),
        None => {
            let preview: String = output.chars().take(200).collect();
            warn!(preview = %preview, "community report did not parse; using fallback");
            ReportOutcome::Fallback(fallback_report())
        }
    }
}

/// Build the bounded evidence table, ask the model for a JSON report and parse
/// it. A failed or timed-out call yields [`ReportOutcome::Failed`].
pub async fn generate_report(
    llm: &dyn LanguageModel,
    entities: &[MemberEntity],
    relationships: &[MemberRelationship],
    config: &ReportConfig,
) -> ReportOutcome {
    let table = build_evidence_table(
        entities,
        relationships,
        config.max_entities,
        config.max_relationships,
    );
    let prompt = build_report_prompt(&table);
    let options = GenerateOptions::json().with_temperature(config.temperature);

    match generate_with_timeout(llm, &prompt, &options, config.timeout).await {
        Ok(output) => parse_report(&output),
        Err(e) => {
            warn!(error = %e, "community report generation failed");
            ReportOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use extract::LlmError;

    fn entity(name: &str) -> MemberEntity {
        MemberEntity {
            name: Some(name.to_string()),
            entity_type: Some("PERSON".to_string()),
            description: Some(format!("{} description", name)),
        }
    }

    fn rel(source: &str, target: &str) -> MemberRelationship {
        MemberRelationship {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            description: Some(format!("{} knows {}", source, target)),
        }
    }

    #[test]
    fn evidence_table_is_bounded() {
        let entities: Vec<_> = (0..15).map(|i| entity(&format!("E{}", i))).collect();
        let relationships: Vec<_> = (0..12).map(|i| rel("E0", &format!("E{}", i))).collect();

        let table = build_evidence_table(&entities, &relationships, 10, 10);

        assert!(table.contains("10,E9,PERSON,E9 description"));
        assert!(!table.contains("E10 description"));
        assert!(table.contains("10,E0,E9,E0 knows E9"));
        assert!(!table.contains("E0 knows E10"));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let table = build_evidence_table(
            &[MemberEntity::default()],
            &[MemberRelationship {
                source: Some("A".into()),
                target: None,
                description: None,
            }],
            10,
            10,
        );

        assert!(table.contains("1,Unknown_0,Entity,No description available"));
        assert!(table.contains("1,A,Unknown,A is related to Unknown"));
    }

    #[test]
    fn parses_report_json() {
        let output = r#"```json
{"title": "Apple", "summary": "Tech", "rating": "7.5", "rating_explanation": "Big",
 "findings": [{"summary": "Founded", "explanation": "By Jobs [Data: Entities (1, 2)]"}]}
```"#;
        let ReportOutcome::Parsed(report) = parse_report(output) else {
            panic!("expected parsed report");
        };
        assert_eq!(report.title, "Apple");
        assert_eq!(report.rating, 7.5);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].explanation, "By Jobs [Data: Entities (1, 2)]");
    }

    #[test]
    fn rating_is_clamped() {
        let ReportOutcome::Parsed(report) = parse_report(r#"{"title": "T", "rating": 42}"#) else {
            panic!("expected parsed report");
        };
        assert_eq!(report.rating, 10.0);
    }

    #[test]
    fn unparseable_output_is_tagged_fallback() {
        assert_eq!(
            parse_report("no json here"),
            ReportOutcome::Fallback(fallback_report())
        );
        assert_eq!(parse_report("[1, 2]"), ReportOutcome::Fallback(fallback_report()));
    }

    #[tokio::test]
    async fn model_failure_is_distinct_from_fallback() {
        let llm = ScriptedModel::new().with_default_error(LlmError::Timeout(Duration::from_secs(1)));
        let outcome =
            generate_report(&llm, &[entity("A")], &[], &ReportConfig::default()).await;
        assert!(matches!(outcome, ReportOutcome::Failed(_)));
        assert!(outcome.report().is_none());
    }

    #[tokio::test]
    async fn prompt_carries_evidence() {
        let llm = ScriptedModel::new().with_default(r#"{"title": "T", "summary": "S"}"#);
        let outcome =
            generate_report(&llm, &[entity("A"), entity("B")], &[rel("A", "B")], &ReportConfig::default())
                .await;

        assert!(matches!(outcome, ReportOutcome::Parsed(_)));
        let calls = llm.calls();
        let prompt = &calls[0];
        assert!(prompt.contains("1,A,PERSON,A description"));
        assert!(prompt.contains("1,A,B,A knows B"));
    }
}
