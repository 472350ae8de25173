use crate::error::GraphError;
use crate::model::{
    ClearSummary, CommunityMembers, CommunityReportRecord, ContextLimits, EntityAdjacency,
    EntityDescriptions, EntityRecord, EntitySummary, GraphStats, LabelClearSummary, LocalContext,
    RelationshipDescriptions, RelationshipSummary,
};
use async_trait::async_trait;
use extract::ExtractionResult;

/// Typed operations over the persisted property graph.
///
/// Entities are upserted by name: a repeated mention appends its description
/// and unions its type. Relationships are always created, never merged, so the
/// same pair extracted twice yields two edges until consolidation writes one
/// `SUMMARIZED_RELATIONSHIP` per unordered pair.
///
/// Concurrent `write_chunk` calls are safe but description appends are not
/// exactly-once; a retried chunk appends its descriptions again.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Cheap round-trip; `GraphError::Unavailable` when the store cannot be reached.
    async fn health_check(&self) -> Result<(), GraphError>;

    async fn init_schema(&self) -> Result<(), GraphError>;

    /// Persist one chunk: `Book -HAS_CHUNK-> Chunk`, upserted entities with
    /// `MENTIONS` edges from the chunk, and one new `RELATIONSHIP` edge per
    /// extracted relationship.
    async fn write_chunk(
        &self,
        book_id: &str,
        chunk_id: &str,
        text: &str,
        extraction: &ExtractionResult,
    ) -> Result<(), GraphError>;

    async fn entity_descriptions(&self) -> Result<Vec<EntityDescriptions>, GraphError>;

    /// Store consolidated summaries, then default every entity with exactly
    /// one description to that description.
    async fn write_entity_summaries(&self, summaries: &[EntitySummary]) -> Result<(), GraphError>;

    async fn relationship_descriptions(&self) -> Result<Vec<RelationshipDescriptions>, GraphError>;

    /// Write one `SUMMARIZED_RELATIONSHIP` per given pair, then give every
    /// remaining related pair a summarized edge carrying its raw description.
    async fn write_relationship_summaries(
        &self,
        summaries: &[RelationshipSummary],
    ) -> Result<(), GraphError>;

    async fn adjacency(&self) -> Result<Vec<EntityAdjacency>, GraphError>;

    /// Replace every entity's community id in one write. Existing `Community`
    /// nodes are removed since their reports no longer match the partition.
    async fn write_community_assignments(
        &self,
        assignments: &[(String, u32)],
    ) -> Result<(), GraphError>;

    /// Communities with at least `min_size` members, ordered by id.
    async fn community_members(&self, min_size: usize) -> Result<Vec<CommunityMembers>, GraphError>;

    /// Upsert `Community` nodes and link every member with `IN_COMMUNITY`.
    async fn write_community_reports(
        &self,
        reports: &[CommunityReportRecord],
    ) -> Result<(), GraphError>;

    /// Stored reports ordered by community id.
    async fn community_reports(
        &self,
        include_fallback: bool,
    ) -> Result<Vec<CommunityReportRecord>, GraphError>;

    /// Entities whose name contains any of `terms` (case-insensitive), most
    /// mentioned first.
    async fn find_entities(&self, terms: &[String], limit: usize)
    -> Result<Vec<EntityRecord>, GraphError>;

    async fn local_context(
        &self,
        names: &[String],
        limits: ContextLimits,
    ) -> Result<LocalContext, GraphError>;

    async fn stats(&self) -> Result<GraphStats, GraphError>;

    /// Delete every node, edge, index and constraint. Safe on an empty graph.
    async fn clear_all(&self) -> Result<ClearSummary, GraphError>;

    /// Detach-delete nodes carrying any of `labels`.
    async fn clear_labels(&self, labels: &[String]) -> Result<LabelClearSummary, GraphError>;
}

/// Labels are spliced into Cypher, so only plain identifiers are accepted.
pub fn validate_label(label: &str) -> Result<(), GraphError> {
    let valid = !label.is_empty()
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !label.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(GraphError::InvalidInput(format!("invalid label {:?}", label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_must_be_identifiers() {
        assert!(validate_label("Entity").is_ok());
        assert!(validate_label("__Chunk__").is_ok());
        assert!(validate_label("").is_err());
        assert!(validate_label("1abc").is_err());
        assert!(validate_label("Entity) DETACH DELETE (n").is_err());
    }
}
