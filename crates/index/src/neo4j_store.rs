use crate::error::GraphError;
use crate::model::{
    ChunkRecord, ClearSummary, CommunityMembers, CommunityReport, CommunityReportRecord,
    ContextLimits, EntityAdjacency, EntityDescriptions, EntityRecord, EntitySummary, Finding,
    GraphStats, LabelClearSummary, LocalContext, MemberEntity, MemberRelationship,
    RelationshipDescriptions, RelationshipRecord, RelationshipSummary, DEFAULT_CLEAR_LABELS,
};
use crate::store::{validate_label, GraphStore};
use async_trait::async_trait;
use extract::{ExtractionResult, Strength};
use neo4rs::{query, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Query, Row};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: None,
            max_connections: 16,
            fetch_size: 500,
        }
    }
}

#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Open a connection pool and confirm the server answers.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections);
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }
        let neo_config = builder.build()?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Unavailable(format!("{}: {}", config.uri, e)))?;

        let store = Self { graph };
        store.health_check().await?;
        info!(uri = %config.uri, "connected to Neo4j");
        Ok(store)
    }

    /// Run a parameterized query and collect every row.
    pub async fn execute(
        &self,
        cypher: &str,
        params: Vec<(&str, Value)>,
    ) -> Result<Vec<Row>, GraphError> {
        let mut stream = self.graph.execute(build_query(cypher, params)).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn run(&self, cypher: &str, params: Vec<(&str, Value)>) -> Result<(), GraphError> {
        self.graph.run(build_query(cypher, params)).await?;
        Ok(())
    }

    /// Run several statements in one transaction.
    async fn run_in_txn(&self, queries: Vec<Query>) -> Result<(), GraphError> {
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(queries).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn count(&self, cypher: &str) -> Result<usize, GraphError> {
        let rows = self.execute(cypher, vec![]).await?;
        Ok(rows
            .first()
            .map(|row| row.get::<i64>("count").unwrap_or(0).max(0) as usize)
            .unwrap_or(0))
    }

    async fn names(&self, cypher: &str) -> Result<Vec<String>, GraphError> {
        let rows = self.execute(cypher, vec![]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<String>("name").ok())
            .collect())
    }
}

fn build_query(cypher: &str, params: Vec<(&str, Value)>) -> Query {
    params
        .into_iter()
        .fold(query(cypher), |q, (key, value)| q.param(key, json_to_bolt(&value)))
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => BoltType::from(items.iter().map(json_to_bolt).collect::<Vec<_>>()),
        Value::Object(map) => BoltType::Map(BoltMap::from_iter(
            map.iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), json_to_bolt(v))),
        )),
    }
}

fn strength_to_json(strength: &Strength) -> Value {
    match strength {
        Strength::Integer(v) => json!(v),
        Strength::Float(v) => json!(v),
        Strength::Raw(v) => json!(v),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn report_from_row(row: &Row) -> CommunityReportRecord {
    let findings: Vec<Finding> = row
        .get::<String>("findings")
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    CommunityReportRecord {
        community_id: row.get::<i64>("communityId").unwrap_or(0).max(0) as u32,
        report: CommunityReport {
            title: row.get("title").unwrap_or_default(),
            summary: row.get("summary").unwrap_or_default(),
            rating: row.get("rating").unwrap_or(0.0),
            rating_explanation: row.get("rating_explanation").unwrap_or_default(),
            findings,
        },
        fallback: row.get("fallback").unwrap_or(false),
    }
}

fn entity_from_row(row: &Row) -> EntityRecord {
    EntityRecord {
        name: row.get("name").unwrap_or_default(),
        types: row.get("types").unwrap_or_default(),
        description: row.get("description").unwrap_or_default(),
        community_id: row.get::<i64>("community_id").ok().map(|v| v.max(0) as u32),
        mentions: row.get::<i64>("mentions").unwrap_or(0).max(0) as usize,
    }
}

const REPORT_COLUMNS: &str = "c.communityId AS communityId, c.title AS title, c.summary AS summary,
       c.rating AS rating, c.rating_explanation AS rating_explanation,
       c.findings AS findings, coalesce(c.fallback, false) AS fallback";

const ENTITY_COLUMNS: &str = "e.name AS name, coalesce(e.types, []) AS types,
       coalesce(e.summary, e.description[0], '') AS description,
       e.community_id AS community_id, mentions";

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn health_check(&self) -> Result<(), GraphError> {
        self.execute("RETURN 1 AS ok", vec![])
            .await
            .map(|_| ())
            .map_err(|e| GraphError::Unavailable(e.to_string()))
    }

    async fn init_schema(&self) -> Result<(), GraphError> {
        let statements = [
            "CREATE CONSTRAINT entity_name IF NOT EXISTS FOR (e:Entity) REQUIRE e.name IS UNIQUE",
            "CREATE CONSTRAINT chunk_id IF NOT EXISTS FOR (c:Chunk) REQUIRE c.id IS UNIQUE",
            "CREATE CONSTRAINT book_id IF NOT EXISTS FOR (b:Book) REQUIRE b.id IS UNIQUE",
            "CREATE INDEX community_id IF NOT EXISTS FOR (c:Community) ON (c.communityId)",
            "CREATE INDEX entity_community IF NOT EXISTS FOR (e:Entity) ON (e.community_id)",
        ];
        for statement in statements {
            self.run(statement, vec![]).await?;
        }
        info!("Neo4j schema ready");
        Ok(())
    }

    async fn write_chunk(
        &self,
        book_id: &str,
        chunk_id: &str,
        text: &str,
        extraction: &ExtractionResult,
    ) -> Result<(), GraphError> {
        let entities: Vec<Value> = extraction
            .entities
            .iter()
            .map(|e| json!({"name": e.name, "type": e.entity_type, "description": e.description}))
            .collect();
        let relationships: Vec<Value> = extraction
            .relationships
            .iter()
            .map(|r| {
                json!({
                    "source": r.source,
                    "target": r.target,
                    "description": r.description,
                    "strength": strength_to_json(&r.strength),
                })
            })
            .collect();

        let nodes = build_query(
            "MERGE (b:Book {id: $book_id})
             MERGE (c:Chunk {id: $chunk_id})
             SET c.text = $text
             MERGE (b)-[:HAS_CHUNK]->(c)
             WITH c
             UNWIND $entities AS row
             MERGE (n:Entity {name: row.name})
             SET n.description = coalesce(n.description, []) + [row.description],
                 n.types = CASE WHEN row.type IN coalesce(n.types, [])
                                THEN n.types
                                ELSE coalesce(n.types, []) + [row.type] END
             MERGE (c)-[:MENTIONS]->(n)",
            vec![
                ("book_id", json!(book_id)),
                ("chunk_id", json!(chunk_id)),
                ("text", json!(text)),
                ("entities", Value::Array(entities)),
            ],
        );
        let edges = build_query(
            "UNWIND $relationships AS row
             MERGE (s:Entity {name: row.source})
             MERGE (t:Entity {name: row.target})
             CREATE (s)-[:RELATIONSHIP {description: row.description, strength: row.strength}]->(t)",
            vec![("relationships", Value::Array(relationships))],
        );

        self.run_in_txn(vec![nodes, edges]).await?;
        debug!(chunk_id, "chunk persisted");
        Ok(())
    }

    async fn entity_descriptions(&self) -> Result<Vec<EntityDescriptions>, GraphError> {
        let rows = self
            .execute(
                "MATCH (e:Entity)
                 RETURN e.name AS name, coalesce(e.description, []) AS descriptions
                 ORDER BY name",
                vec![],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| EntityDescriptions {
                name: row.get("name").unwrap_or_default(),
                descriptions: row.get("descriptions").unwrap_or_default(),
            })
            .collect())
    }

    async fn write_entity_summaries(&self, summaries: &[EntitySummary]) -> Result<(), GraphError> {
        let data: Vec<Value> = summaries
            .iter()
            .map(|s| json!({"name": s.name, "summary": s.summary}))
            .collect();

        self.run_in_txn(vec![
            build_query(
                "UNWIND $data AS row
                 MATCH (e:Entity {name: row.name})
                 SET e.summary = row.summary",
                vec![("data", Value::Array(data))],
            ),
            query(
                "MATCH (e:Entity)
                 WHERE size(coalesce(e.description, [])) = 1
                 SET e.summary = e.description[0]",
            ),
        ])
        .await
    }

    async fn relationship_descriptions(&self) -> Result<Vec<RelationshipDescriptions>, GraphError> {
        let rows = self
            .execute(
                "MATCH (s:Entity)-[r:RELATIONSHIP]->(t:Entity)
                 WITH CASE WHEN s.name <= t.name THEN s.name ELSE t.name END AS source,
                      CASE WHEN s.name <= t.name THEN t.name ELSE s.name END AS target,
                      r
                 RETURN source, target, collect(r.description) AS descriptions
                 ORDER BY source, target",
                vec![],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| RelationshipDescriptions {
                source: row.get("source").unwrap_or_default(),
                target: row.get("target").unwrap_or_default(),
                descriptions: row.get("descriptions").unwrap_or_default(),
            })
            .collect())
    }

    async fn write_relationship_summaries(
        &self,
        summaries: &[RelationshipSummary],
    ) -> Result<(), GraphError> {
        let data: Vec<Value> = summaries
            .iter()
            .map(|s| json!({"source": s.source, "target": s.target, "summary": s.summary}))
            .collect();

        self.run_in_txn(vec![
            build_query(
                "UNWIND $data AS row
                 MATCH (s:Entity {name: row.source}), (t:Entity {name: row.target})
                 MERGE (s)-[r:SUMMARIZED_RELATIONSHIP]-(t)
                 SET r.summary = row.summary",
                vec![("data", Value::Array(data))],
            ),
            query(
                "MATCH (s:Entity)-[e:RELATIONSHIP]->(t:Entity)
                 WHERE NOT (s)-[:SUMMARIZED_RELATIONSHIP]-(t)
                 WITH s, t, collect(e.description)[0] AS description
                 MERGE (s)-[r:SUMMARIZED_RELATIONSHIP]-(t)
                 SET r.summary = description",
            ),
        ])
        .await
    }

    async fn adjacency(&self) -> Result<Vec<EntityAdjacency>, GraphError> {
        let rows = self
            .execute(
                "MATCH (e:Entity)
                 OPTIONAL MATCH (e)-[:RELATIONSHIP]-(other:Entity)
                 WITH e, other ORDER BY other.name
                 RETURN e.name AS name, collect(DISTINCT other.name) AS neighbors
                 ORDER BY name",
                vec![],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| EntityAdjacency {
                name: row.get("name").unwrap_or_default(),
                neighbors: row.get("neighbors").unwrap_or_default(),
            })
            .collect())
    }

    async fn write_community_assignments(
        &self,
        assignments: &[(String, u32)],
    ) -> Result<(), GraphError> {
        let data: Vec<Value> = assignments
            .iter()
            .map(|(name, id)| json!({"name": name, "community": id}))
            .collect();

        self.run_in_txn(vec![
            query("MATCH (c:Community) DETACH DELETE c"),
            query("MATCH (e:Entity) REMOVE e.community_id"),
            build_query(
                "UNWIND $data AS row
                 MATCH (e:Entity {name: row.name})
                 SET e.community_id = row.community",
                vec![("data", Value::Array(data))],
            ),
        ])
        .await?;

        info!(entities = assignments.len(), "community assignments written");
        Ok(())
    }

    async fn community_members(&self, min_size: usize) -> Result<Vec<CommunityMembers>, GraphError> {
        let rows = self
            .execute(
                "MATCH (e:Entity)
                 WHERE e.community_id IS NOT NULL
                 WITH e.community_id AS communityId, collect(e) AS nodes
                 WHERE size(nodes) >= $min_size
                 UNWIND nodes AS s
                 OPTIONAL MATCH (s)-[r:RELATIONSHIP]->(t:Entity)
                 WHERE t.community_id = communityId
                 WITH communityId, nodes,
                      collect(DISTINCT {source: s.name, target: t.name, description: r.description}) AS rels
                 WITH communityId, nodes, [x IN rels WHERE x.target IS NOT NULL] AS rels
                 RETURN communityId,
                        [n IN nodes | n.name] AS names,
                        [n IN nodes | coalesce(n.types[0], '')] AS types,
                        [n IN nodes | coalesce(n.summary, n.description[0], '')] AS descriptions,
                        [x IN rels | x.source] AS sources,
                        [x IN rels | x.target] AS targets,
                        [x IN rels | coalesce(x.description, '')] AS rel_descriptions
                 ORDER BY communityId",
                vec![("min_size", json!(min_size))],
            )
            .await?;

        let mut communities = Vec::with_capacity(rows.len());
        for row in &rows {
            let names: Vec<String> = row.get("names").unwrap_or_default();
            let types: Vec<String> = row.get("types").unwrap_or_default();
            let descriptions: Vec<String> = row.get("descriptions").unwrap_or_default();
            if names.len() != types.len() || names.len() != descriptions.len() {
                return Err(GraphError::Decode(
                    "community member columns differ in length".to_string(),
                ));
            }

            let sources: Vec<String> = row.get("sources").unwrap_or_default();
            let targets: Vec<String> = row.get("targets").unwrap_or_default();
            let rel_descriptions: Vec<String> = row.get("rel_descriptions").unwrap_or_default();

            let entities = names
                .into_iter()
                .zip(types)
                .zip(descriptions)
                .map(|((name, entity_type), description)| MemberEntity {
                    name: non_empty(name),
                    entity_type: non_empty(entity_type),
                    description: non_empty(description),
                })
                .collect();
            let relationships = sources
                .into_iter()
                .zip(targets)
                .zip(rel_descriptions)
                .map(|((source, target), description)| MemberRelationship {
                    source: non_empty(source),
                    target: non_empty(target),
                    description: non_empty(description),
                })
                .collect();

            communities.push(CommunityMembers {
                community_id: row.get::<i64>("communityId").unwrap_or(0).max(0) as u32,
                entities,
                relationships,
            });
        }

        Ok(communities)
    }

    async fn write_community_reports(
        &self,
        reports: &[CommunityReportRecord],
    ) -> Result<(), GraphError> {
        let mut data = Vec::with_capacity(reports.len());
        for record in reports {
            let findings = serde_json::to_string(&record.report.findings)
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            data.push(json!({
                "communityId": record.community_id,
                "title": record.report.title,
                "summary": record.report.summary,
                "rating": record.report.rating,
                "rating_explanation": record.report.rating_explanation,
                "findings": findings,
                "fallback": record.fallback,
            }));
        }

        self.run(
            "UNWIND $data AS row
             MERGE (c:Community {communityId: row.communityId})
             SET c.title = row.title,
                 c.summary = row.summary,
                 c.rating = row.rating,
                 c.rating_explanation = row.rating_explanation,
                 c.findings = row.findings,
                 c.fallback = row.fallback
             WITH c, row
             MATCH (e:Entity)
             WHERE e.community_id = row.communityId
             MERGE (e)-[:IN_COMMUNITY]->(c)",
            vec![("data", Value::Array(data))],
        )
        .await
    }

    async fn community_reports(
        &self,
        include_fallback: bool,
    ) -> Result<Vec<CommunityReportRecord>, GraphError> {
        let cypher = format!(
            "MATCH (c:Community)
             WHERE $include_fallback OR NOT coalesce(c.fallback, false)
             RETURN {}
             ORDER BY communityId",
            REPORT_COLUMNS
        );
        let rows = self
            .execute(&cypher, vec![("include_fallback", json!(include_fallback))])
            .await?;
        Ok(rows.iter().map(report_from_row).collect())
    }

    async fn find_entities(
        &self,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<EntityRecord>, GraphError> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let cypher = format!(
            "UNWIND $terms AS term
             MATCH (e:Entity)
             WHERE toLower(e.name) CONTAINS toLower(term)
             WITH DISTINCT e
             OPTIONAL MATCH (c:Chunk)-[:MENTIONS]->(e)
             WITH e, count(c) AS mentions
             RETURN {}
             ORDER BY mentions DESC, name
             LIMIT $limit",
            ENTITY_COLUMNS
        );
        let rows = self
            .execute(&cypher, vec![("terms", json!(terms)), ("limit", json!(limit))])
            .await?;
        Ok(rows.iter().map(entity_from_row).collect())
    }

    async fn local_context(
        &self,
        names: &[String],
        limits: ContextLimits,
    ) -> Result<LocalContext, GraphError> {
        if names.is_empty() {
            return Ok(LocalContext::default());
        }

        let entity_cypher = format!(
            "MATCH (e:Entity)
             WHERE e.name IN $names
             OPTIONAL MATCH (c:Chunk)-[:MENTIONS]->(e)
             WITH e, count(c) AS mentions
             RETURN {}
             ORDER BY mentions DESC, name",
            ENTITY_COLUMNS
        );
        let entities = self
            .execute(&entity_cypher, vec![("names", json!(names))])
            .await?
            .iter()
            .map(entity_from_row)
            .collect();

        let relationships = self
            .execute(
                "MATCH (s:Entity)-[r:RELATIONSHIP]->(t:Entity)
                 WHERE s.name IN $names OR t.name IN $names
                 RETURN s.name AS source, t.name AS target,
                        coalesce(r.description, '') AS description, r.strength AS strength,
                        CASE WHEN s.name IN $names AND t.name IN $names THEN 0 ELSE 1 END AS rank
                 ORDER BY rank, source, target
                 LIMIT $limit",
                vec![("names", json!(names)), ("limit", json!(limits.relationships))],
            )
            .await?
            .iter()
            .map(|row| RelationshipRecord {
                source: row.get("source").unwrap_or_default(),
                target: row.get("target").unwrap_or_default(),
                description: row.get("description").unwrap_or_default(),
                strength: row
                    .get::<f64>("strength")
                    .ok()
                    .or_else(|| row.get::<i64>("strength").ok().map(|v| v as f64)),
            })
            .collect();

        let chunks = self
            .execute(
                "MATCH (c:Chunk)-[:MENTIONS]->(e:Entity)
                 WHERE e.name IN $names
                 WITH c, count(DISTINCT e) AS hits
                 RETURN c.id AS id, c.text AS text
                 ORDER BY hits DESC, id
                 LIMIT $limit",
                vec![("names", json!(names)), ("limit", json!(limits.chunks))],
            )
            .await?
            .iter()
            .map(|row| ChunkRecord {
                id: row.get("id").unwrap_or_default(),
                text: row.get("text").unwrap_or_default(),
            })
            .collect();

        let report_cypher = format!(
            "MATCH (e:Entity)-[:IN_COMMUNITY]->(c:Community)
             WHERE e.name IN $names
             WITH c, count(DISTINCT e) AS hits
             RETURN {}, hits
             ORDER BY hits DESC, rating DESC, communityId
             LIMIT $limit",
            REPORT_COLUMNS
        );
        let reports = self
            .execute(
                &report_cypher,
                vec![("names", json!(names)), ("limit", json!(limits.reports))],
            )
            .await?
            .iter()
            .map(report_from_row)
            .collect();

        Ok(LocalContext {
            entities,
            relationships,
            chunks,
            reports,
        })
    }

    async fn stats(&self) -> Result<GraphStats, GraphError> {
        let rows = self
            .execute(
                "RETURN COUNT { MATCH (b:Book) } AS books,
                        COUNT { MATCH (c:Chunk) } AS chunks,
                        COUNT { MATCH (e:Entity) } AS entities,
                        COUNT { MATCH ()-[:RELATIONSHIP]->() } AS relationships,
                        COUNT { MATCH ()-[:SUMMARIZED_RELATIONSHIP]->() } AS summarized,
                        COUNT { MATCH (c:Community) } AS communities",
                vec![],
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| GraphError::Decode("stats query returned no rows".to_string()))?;
        let get = |column: &str| row.get::<i64>(column).unwrap_or(0).max(0) as usize;

        Ok(GraphStats {
            books: get("books"),
            chunks: get("chunks"),
            entities: get("entities"),
            relationships: get("relationships"),
            summarized_relationships: get("summarized"),
            communities: get("communities"),
        })
    }

    async fn clear_all(&self) -> Result<ClearSummary, GraphError> {
        let relationships_deleted = self
            .count("MATCH ()-[r]->() RETURN count(r) AS count")
            .await?;
        let nodes_deleted = self.count("MATCH (n) RETURN count(n) AS count").await?;
        self.run("MATCH (n) DETACH DELETE n", vec![]).await?;

        // Constraints own their backing indexes, so they go first.
        let mut constraints_dropped = 0;
        for name in self.names("SHOW CONSTRAINTS YIELD name RETURN name").await? {
            let statement = format!("DROP CONSTRAINT `{}` IF EXISTS", name.replace('`', "``"));
            match self.run(&statement, vec![]).await {
                Ok(()) => constraints_dropped += 1,
                Err(e) => warn!(constraint = %name, error = %e, "failed to drop constraint"),
            }
        }

        let mut indexes_dropped = 0;
        let index_names = self
            .names(
                "SHOW INDEXES YIELD name, type, owningConstraint
                 WHERE type <> 'LOOKUP' AND owningConstraint IS NULL
                 RETURN name",
            )
            .await?;
        for name in index_names {
            let statement = format!("DROP INDEX `{}` IF EXISTS", name.replace('`', "``"));
            match self.run(&statement, vec![]).await {
                Ok(()) => indexes_dropped += 1,
                Err(e) => warn!(index = %name, error = %e, "failed to drop index"),
            }
        }

        let summary = ClearSummary {
            nodes_deleted,
            relationships_deleted,
            indexes_dropped,
            constraints_dropped,
        };
        info!(?summary, "graph cleared");
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

        let mut nodes_deleted = 0;
        for label in &labels {
            let cypher = format!("MATCH (n:`{}`) DETACH DELETE n RETURN count(n) AS count", label);
            let deleted = self.count(&cypher).await?;
            debug!(label = %label, deleted, "label cleared");
            nodes_deleted += deleted;
        }

        Ok(LabelClearSummary {
            labels,
            nodes_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_keeps_its_numeric_type() {
        assert_eq!(strength_to_json(&Strength::Integer(9)), json!(9));
        assert_eq!(strength_to_json(&Strength::Float(0.5)), json!(0.5));
        assert_eq!(strength_to_json(&Strength::Raw("high".into())), json!("high"));
    }

    #[test]
    fn json_params_map_to_bolt() {
        assert!(matches!(json_to_bolt(&json!(null)), BoltType::Null(_)));
        assert!(matches!(json_to_bolt(&json!(3)), BoltType::Integer(_)));
        assert!(matches!(json_to_bolt(&json!(0.5)), BoltType::Float(_)));
        assert!(matches!(json_to_bolt(&json!("x")), BoltType::String(_)));
        assert!(matches!(json_to_bolt(&json!({"a": [1, 2]})), BoltType::Map(_)));
        assert!(matches!(json_to_bolt(&json!([1.5])), BoltType::List(_)));
    }
}
