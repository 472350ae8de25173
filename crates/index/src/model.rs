//! Records exchanged with a [`GraphStore`](crate::GraphStore).

use serde::{Deserialize, Serialize};

/// An entity and the raw descriptions appended on every mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptions {
    pub name: String,
    pub descriptions: Vec<String>,
}

/// All raw relationship descriptions between one unordered pair of entities.
/// `source <= target` by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptions {
    pub source: String,
    pub target: String,
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSummary {
    pub source: String,
    pub target: String,
    pub summary: String,
}

/// Distinct entities one entity shares a `RELATIONSHIP` edge with, in either
/// direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAdjacency {
    pub name: String,
    pub neighbors: Vec<String>,
}

/// Member entity as shown to the report generator. `description` is the
/// consolidated summary when present, else the first raw description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberEntity {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberRelationship {
    pub source: Option<String>,
    pub target: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMembers {
    pub community_id: u32,
    pub entities: Vec<MemberEntity>,
    pub relationships: Vec<MemberRelationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub summary: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    pub title: String,
    pub summary: String,
    /// Severity in `[0, 10]`.
    pub rating: f64,
    pub rating_explanation: String,
    pub findings: Vec<Finding>,
}

/// A report as persisted on a `Community` node. `fallback` marks reports whose
/// model output could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReportRecord {
    pub community_id: u32,
    pub report: CommunityReport,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub types: Vec<String>,
    pub description: String,
    pub community_id: Option<u32>,
    pub mentions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    pub description: String,
    pub strength: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub relationships: usize,
    pub chunks: usize,
    pub reports: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            relationships: 20,
            chunks: 5,
            reports: 3,
        }
    }
}

/// Graph neighbourhood of a set of entities, for local search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalContext {
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub chunks: Vec<ChunkRecord>,
    pub reports: Vec<CommunityReportRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub books: usize,
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
    pub summarized_relationships: usize,
    pub communities: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSummary {
    pub nodes_deleted: usize,
    pub relationships_deleted: usize,
    pub indexes_dropped: usize,
    pub constraints_dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelClearSummary {
    pub labels: Vec<String>,
    pub nodes_deleted: usize,
}

pub const DEFAULT_CLEAR_LABELS: [&str; 4] = ["Entity", "Chunk", "Community", "Book"];
