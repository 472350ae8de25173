use index::{EntityAdjacency, GraphError, GraphStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Index-based adjacency snapshot of the entity graph.
#[derive(Debug, Clone, Default)]
pub struct GraphData {
    pub entities: Vec<String>,
    /// Distinct neighbours per entity index, as listed by the store.
    pub neighbors: Vec<Vec<usize>>,
    pub entity_to_idx: HashMap<String, usize>,
}

impl GraphData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.entity_to_idx.get(name) {
            return idx;
        }

        let idx = self.entities.len();
        self.entities.push(name.to_string());
        self.neighbors.push(Vec::new());
        self.entity_to_idx.insert(name.to_string(), idx);
        idx
    }

    pub fn add_neighbor(&mut self, entity: usize, neighbor: usize) {
        self.neighbors[entity].push(neighbor);
    }

    /// Entities appear in adjacency order; a neighbour never listed on its own
    /// is added when first seen.
    pub fn from_adjacency(adjacency: &[EntityAdjacency]) -> Self {
        let mut data = Self::new();
        for record in adjacency {
            let idx = data.add_entity(&record.name);
            for neighbor in &record.neighbors {
                let n = data.add_entity(neighbor);
                data.add_neighbor(idx, n);
            }
        }
        data
    }

    /// Sum of adjacency-list lengths over two. Exact only for symmetric
    /// adjacency; a one-sided listing counts as half an edge.
    pub fn relationship_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }
}

pub struct GraphExporter {
    store: Arc<dyn GraphStore>,
}

impl GraphExporter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Fetch the whole adjacency once. Checks the store first so nothing is
    /// computed against a store that is not there.
    pub async fn export_graph(&self) -> Result<GraphData, GraphError> {
        self.store.health_check().await?;
        let adjacency = self.store.adjacency().await?;
        let graph_data = GraphData::from_adjacency(&adjacency);

        info!(
            entities = graph_data.entities.len(),
            relationships = graph_data.relationship_count(),
            "graph exported"
        );
        Ok(graph_data)
    }
}
