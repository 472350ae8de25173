use crate::error::GraphError;
use crate::model::{
    ChunkRecord, ClearSummary, CommunityMembers, CommunityReportRecord, ContextLimits,
    EntityAdjacency, EntityDescriptions, EntityRecord, EntitySummary, GraphStats,
    LabelClearSummary, LocalContext, MemberEntity, MemberRelationship, RelationshipDescriptions,
    RelationshipRecord, RelationshipSummary, DEFAULT_CLEAR_LABELS,
};
use crate::store::{validate_label, GraphStore};
use async_trait::async_trait;
use extract::{ExtractionResult, Strength};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// In-process [`GraphStore`] with the same upsert and create semantics as the
/// Neo4j store. Entities keep insertion order.
pub struct MemoryGraphStore {
    inner: Mutex<Graph>,
    available: AtomicBool,
}

#[derive(Default)]
struct Graph {
    entities: Vec<EntityNode>,
    index: HashMap<String, usize>,
    relationships: Vec<RelationshipEdge>,
    /// Keyed by the unordered pair, smaller name first.
    summarized: BTreeMap<(String, String), String>,
    books: BTreeMap<String, Vec<String>>,
    chunks: Vec<ChunkNode>,
    communities: BTreeMap<u32, CommunityReportRecord>,
}

#[derive(Clone)]
struct EntityNode {
    name: String,
    types: Vec<String>,
    descriptions: Vec<String>,
    summary: Option<String>,
    community_id: Option<u32>,
}

struct RelationshipEdge {
    source: String,
    target: String,
    description: String,
    strength: Strength,
}

struct ChunkNode {
    id: String,
    text: String,
    mentions: BTreeSet<String>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Graph {
    fn upsert_entity(&mut self, name: &str) -> &mut EntityNode {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.entities.push(EntityNode {
                    name: name.to_string(),
                    types: Vec::new(),
                    descriptions: Vec::new(),
                    summary: None,
                    community_id: None,
                });
                self.index.insert(name.to_string(), self.entities.len() - 1);
                self.entities.len() - 1
            }
        };
        &mut self.entities[idx]
    }

    fn entity(&self, name: &str) -> Option<&EntityNode> {
        self.index.get(name).map(|&idx| &self.entities[idx])
    }

    fn mentions(&self, name: &str) -> usize {
        self.chunks.iter().filter(|c| c.mentions.contains(name)).count()
    }

    fn entity_record(&self, node: &EntityNode) -> EntityRecord {
        EntityRecord {
            name: node.name.clone(),
            types: node.types.clone(),
            description: node
                .summary
                .clone()
                .or_else(|| node.descriptions.first().cloned())
                .unwrap_or_default(),
            community_id: node.community_id,
            mentions: self.mentions(&node.name),
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.name.clone(), idx))
            .collect();
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Graph::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away; every call then fails with
    /// `GraphError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn graph(&self) -> Result<MutexGuard<'_, Graph>, GraphError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(GraphError::Unavailable("memory store switched off".to_string()));
        }
        self.inner
            .lock()
            .map_err(|_| GraphError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Community id of an entity, if assigned.
    pub fn community_of(&self, name: &str) -> Option<u32> {
        self.graph().ok()?.entity(name)?.community_id
    }

    pub fn entity_summary(&self, name: &str) -> Option<String> {
        self.graph().ok()?.entity(name)?.summary.clone()
    }

    pub fn summarized_relationship(&self, a: &str, b: &str) -> Option<String> {
        self.graph().ok()?.summarized.get(&pair_key(a, b)).cloned()
    }

    /// Add a bare relationship edge, creating endpoints as needed.
    pub fn add_relationship(&self, source: &str, target: &str, description: &str) {
        if let Ok(mut graph) = self.graph() {
            graph.upsert_entity(source);
            graph.upsert_entity(target);
            graph.relationships.push(RelationshipEdge {
                source: source.to_string(),
                target: target.to_string(),
                description: description.to_string(),
                strength: Strength::Integer(1),
            });
        }
    }

    /// Add an entity with no relationships.
    pub fn add_entity(&self, name: &str, entity_type: &str, description: &str) {
        if let Ok(mut graph) = self.graph() {
            let node = graph.upsert_entity(name);
            node.descriptions.push(description.to_string());
            if !node.types.iter().any(|t| t == entity_type) {
                node.types.push(entity_type.to_string());
            }
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn health_check(&self) -> Result<(), GraphError> {
        self.graph().map(|_| ())
    }

    async fn init_schema(&self) -> Result<(), GraphError> {
        self.graph().map(|_| ())
    }

    async fn write_chunk(
        &self,
        book_id: &str,
        chunk_id: &str,
        text: &str,
        extraction: &ExtractionResult,
    ) -> Result<(), GraphError> {
        let mut graph = self.graph()?;

        let chunks = graph.books.entry(book_id.to_string()).or_default();
        if !chunks.iter().any(|c| c == chunk_id) {
            chunks.push(chunk_id.to_string());
        }

        let mut mentioned = BTreeSet::new();
        for entity in &extraction.entities {
            let node = graph.upsert_entity(&entity.name);
            node.descriptions.push(entity.description.clone());
            if !node.types.contains(&entity.entity_type) {
                node.types.push(entity.entity_type.clone());
            }
            mentioned.insert(entity.name.clone());
        }

        match graph.chunks.iter().position(|c| c.id == chunk_id) {
            Some(idx) => {
                let chunk = &mut graph.chunks[idx];
                chunk.text = text.to_string();
                chunk.mentions.extend(mentioned);
            }
            None => graph.chunks.push(ChunkNode {
                id: chunk_id.to_string(),
                text: text.to_string(),
                mentions: mentioned,
            }),
        }

        for rel in &extraction.relationships {
            graph.upsert_entity(&rel.source);
            graph.upsert_entity(&rel.target);
            graph.relationships.push(RelationshipEdge {
                source: rel.source.clone(),
                target: rel.target.clone(),
                description: rel.description.clone(),
                strength: rel.strength.clone(),
            });
        }

        Ok(())
    }

    async fn entity_descriptions(&self) -> Result<Vec<EntityDescriptions>, GraphError> {
        let graph = self.graph()?;
        let mut out: Vec<EntityDescriptions> = graph
            .entities
            .iter()
            .map(|e| EntityDescriptions {
                name: e.name.clone(),
                descriptions: e.descriptions.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn write_entity_summaries(&self, summaries: &[EntitySummary]) -> Result<(), GraphError> {
        let mut graph = self.graph()?;
        for summary in summaries {
            let idx = graph.index.get(&summary.name).copied();
            if let Some(idx) = idx {
                graph.entities[idx].summary = Some(summary.summary.clone());
            }
        }
        for entity in graph.entities.iter_mut() {
            if entity.descriptions.len() == 1 {
                entity.summary = Some(entity.descriptions[0].clone());
            }
        }
        Ok(())
    }

    async fn relationship_descriptions(&self) -> Result<Vec<RelationshipDescriptions>, GraphError> {
        let graph = self.graph()?;
        let mut groups: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for rel in &graph.relationships {
            groups
                .entry(pair_key(&rel.source, &rel.target))
                .or_default()
                .push(rel.description.clone());
        }
        Ok(groups
            .into_iter()
            .map(|((source, target), descriptions)| RelationshipDescriptions {
                source,
                target,
                descriptions,
            })
            .collect())
    }

    async fn write_relationship_summaries(
        &self,
        summaries: &[RelationshipSummary],
    ) -> Result<(), GraphError> {
        let mut graph = self.graph()?;
        for summary in summaries {
            if graph.entity(&summary.source).is_some() && graph.entity(&summary.target).is_some() {
                graph
                    .summarized
                    .insert(pair_key(&summary.source, &summary.target), summary.summary.clone());
            }
        }

        let mut defaults = Vec::new();
        for rel in &graph.relationships {
            let key = pair_key(&rel.source, &rel.target);
            if !graph.summarized.contains_key(&key) && !defaults.iter().any(|(k, _)| k == &key) {
                defaults.push((key, rel.description.clone()));
            }
        }
        graph.summarized.extend(defaults);
        Ok(())
    }

    async fn adjacency(&self) -> Result<Vec<EntityAdjacency>, GraphError> {
        let graph = self.graph()?;
        let mut neighbors: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for rel in &graph.relationships {
            neighbors.entry(&rel.source).or_default().insert(&rel.target);
            neighbors.entry(&rel.target).or_default().insert(&rel.source);
        }

        let mut out: Vec<EntityAdjacency> = graph
            .entities
            .iter()
            .map(|e| EntityAdjacency {
                name: e.name.clone(),
                neighbors: neighbors
                    .get(e.name.as_str())
                    .map(|set| set.iter().map(|n| n.to_string()).collect())
                    .unwrap_or_default(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn write_community_assignments(
        &self,
        assignments: &[(String, u32)],
    ) -> Result<(), GraphError> {
        let mut graph = self.graph()?;
        graph.communities.clear();
        for entity in graph.entities.iter_mut() {
            entity.community_id = None;
        }
        for (name, id) in assignments {
            let idx = graph.index.get(name).copied();
            if let Some(idx) = idx {
                graph.entities[idx].community_id = Some(*id);
            }
        }
        Ok(())
    }

    async fn community_members(&self, min_size: usize) -> Result<Vec<CommunityMembers>, GraphError> {
        let graph = self.graph()?;
        let mut groups: BTreeMap<u32, Vec<&EntityNode>> = BTreeMap::new();
        for entity in &graph.entities {
            if let Some(id) = entity.community_id {
                groups.entry(id).or_default().push(entity);
            }
        }

        let mut out = Vec::new();
        for (community_id, nodes) in groups {
            if nodes.len() < min_size {
                continue;
            }
            let members: BTreeSet<&str> = nodes.iter().map(|n| n.name.as_str()).collect();

            let entities = nodes
                .iter()
                .map(|n| MemberEntity {
                    name: Some(n.name.clone()),
                    entity_type: n.types.first().cloned(),
                    description: n.summary.clone().or_else(|| n.descriptions.first().cloned()),
                })
                .collect();

            let mut relationships: Vec<MemberRelationship> = Vec::new();
            for rel in &graph.relationships {
                if !members.contains(rel.source.as_str()) || !members.contains(rel.target.as_str()) {
                    continue;
                }
                let candidate = MemberRelationship {
                    source: Some(rel.source.clone()),
                    target: Some(rel.target.clone()),
                    description: Some(rel.description.clone()).filter(|d| !d.is_empty()),
                };
                if !relationships.contains(&candidate) {
                    relationships.push(candidate);
                }
            }

            out.push(CommunityMembers {
                community_id,
                entities,
                relationships,
            });
        }
        Ok(out)
    }

    async fn write_community_reports(
        &self,
        reports: &[CommunityReportRecord],
    ) -> Result<(), GraphError> {
        let mut graph = self.graph()?;
        for record in reports {
            graph.communities.insert(record.community_id, record.clone());
        }
        Ok(())
    }

    async fn community_reports(
        &self,
        include_fallback: bool,
    ) -> Result<Vec<CommunityReportRecord>, GraphError> {
        let graph = self.graph()?;
        Ok(graph
            .communities
            .values()
            .filter(|r| include_fallback || !r.fallback)
            .cloned()
            .collect())
    }

    async fn find_entities(
        &self,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<EntityRecord>, GraphError> {
        let graph = self.graph()?;
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();

        let mut found: Vec<EntityRecord> = graph
            .entities
            .iter()
            .filter(|e| {
                let name = e.name.to_lowercase();
                terms.iter().any(|t| name.contains(t.as_str()))
            })
            .map(|e| graph.entity_record(e))
            .collect();
        found.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));
        found.truncate(limit);
        Ok(found)
    }

    async fn local_context(
        &self,
        names: &[String],
        limits: ContextLimits,
    ) -> Result<LocalContext, GraphError> {
        let graph = self.graph()?;
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();

        let mut entities: Vec<EntityRecord> = graph
            .entities
            .iter()
            .filter(|e| wanted.contains(e.name.as_str()))
            .map(|e| graph.entity_record(e))
            .collect();
        entities.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));

        let mut relationships: Vec<(usize, RelationshipRecord)> = graph
            .relationships
            .iter()
            .filter_map(|r| {
                let inside = [r.source.as_str(), r.target.as_str()]
                    .iter()
                    .filter(|n| wanted.contains(*n))
                    .count();
                (inside > 0).then(|| {
                    (
                        if inside == 2 { 0 } else { 1 },
                        RelationshipRecord {
                            source: r.source.clone(),
                            target: r.target.clone(),
                            description: r.description.clone(),
                            strength: r.strength.as_f64(),
                        },
                    )
                })
            })
            .collect();
        relationships.sort_by(|(ra, a), (rb, b)| {
            ra.cmp(rb)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        let relationships = relationships
            .into_iter()
            .take(limits.relationships)
            .map(|(_, r)| r)
            .collect();

        let mut chunks: Vec<(usize, ChunkRecord)> = graph
            .chunks
            .iter()
            .filter_map(|c| {
                let hits = c.mentions.iter().filter(|m| wanted.contains(m.as_str())).count();
                (hits > 0).then(|| {
                    (
                        hits,
                        ChunkRecord {
                            id: c.id.clone(),
                            text: c.text.clone(),
                        },
                    )
                })
            })
            .collect();
        chunks.sort_by(|(ha, a), (hb, b)| hb.cmp(ha).then_with(|| a.id.cmp(&b.id)));
        let chunks = chunks
            .into_iter()
            .take(limits.chunks)
            .map(|(_, c)| c)
            .collect();

        let mut hits: BTreeMap<u32, usize> = BTreeMap::new();
        for name in &wanted {
            if let Some(id) = graph.entity(name).and_then(|e| e.community_id) {
                *hits.entry(id).or_default() += 1;
            }
        }
        let mut reports: Vec<(usize, CommunityReportRecord)> = hits
            .into_iter()
            .filter_map(|(id, n)| graph.communities.get(&id).map(|r| (n, r.clone())))
            .collect();
        reports.sort_by(|(na, a), (nb, b)| {
            nb.cmp(na)
                .then_with(|| b.report.rating.total_cmp(&a.report.rating))
                .then_with(|| a.community_id.cmp(&b.community_id))
        });
        let reports = reports
            .into_iter()
            .take(limits.reports)
            .map(|(_, r)| r)
            .collect();

        Ok(LocalContext {
            entities,
            relationships,
            chunks,
            reports,
        })
    }

    async fn stats(&self) -> Result<GraphStats, GraphError> {
        let graph = self.graph()?;
        Ok(GraphStats {
            books: graph.books.len(),
            chunks: graph.chunks.len(),
            entities: graph.entities.len(),
            relationships: graph.relationships.len(),
            summarized_relationships: graph.summarized.len(),
            communities: graph.communities.len(),
        })
    }

    async fn clear_all(&self) -> Result<ClearSummary, GraphError> {
        let mut graph = self.graph()?;
        let has_chunk_edges: usize = graph.books.values().map(Vec::len).sum();
        let mention_edges: usize = graph.chunks.iter().map(|c| c.mentions.len()).sum();
        let member_edges = graph
            .entities
            .iter()
            .filter(|e| e.community_id.is_some_and(|id| graph.communities.contains_key(&id)))
            .count();

        let summary = ClearSummary {
            nodes_deleted: graph.entities.len()
                + graph.chunks.len()
                + graph.books.len()
                + graph.communities.len(),
            relationships_deleted: graph.relationships.len()
                + graph.summarized.len()
                + has_chunk_edges
                + mention_edges
                + member_edges,
            indexes_dropped: 0,
            constraints_dropped: 0,
        };
        *graph = Graph::default();
        Ok(summary)
    }

    async fn clear_labels(&self, labels: &[String]) -> Result<LabelClearSummary, GraphError> {
        let labels: Vec<String> = if labels.is_empty() {
            DEFAULT_CLEAR_LABELS.iter().map(|l| l.to_string()).collect()
        } else {
            labels.to_vec()
        };
        for label in &labels {
            validate_label(label)?;
        }

        let mut graph = self.graph()?;
        let mut nodes_deleted = 0;
        for label in &labels {
            match label.as_str() {
                "Entity" => {
                    nodes_deleted += graph.entities.len();
                    graph.entities.clear();
                    graph.relationships.clear();
                    graph.summarized.clear();
                    for chunk in graph.chunks.iter_mut() {
                        chunk.mentions.clear();
                    }
                    graph.rebuild_index();
                }
                "Chunk" => {
                    nodes_deleted += graph.chunks.len();
                    graph.chunks.clear();
                    for chunks in graph.books.values_mut() {
                        chunks.clear();
                    }
                }
                "Book" => {
                    nodes_deleted += graph.books.len();
                    graph.books.clear();
                }
                "Community" => {
                    nodes_deleted += graph.communities.len();
                    graph.communities.clear();
                }
                _ => {}
            }
        }

        Ok(LabelClearSummary {
            labels,
            nodes_deleted,
        })
    }
}
