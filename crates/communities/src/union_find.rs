use crate::graph_export::GraphData;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Disjoint-set forest with path compression.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// The first set's root is attached under the second's.
    pub fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);
        if px != py {
            self.parent[px] = py;
        }
    }
}

/// Connected components as entity indices, largest first. Groups of equal
/// size keep the order in which their first member appears in `graph`.
pub fn connected_components(graph: &GraphData) -> Vec<Vec<usize>> {
    let n = graph.entities.len();
    let mut uf = UnionFind::new(n);

    for (idx, neighbors) in graph.neighbors.iter().enumerate() {
        for &neighbor in neighbors {
            uf.union(idx, neighbor);
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for idx in 0..n {
        let root = uf.find(idx);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(idx);
    }

    // sort_by is stable
    groups.sort_by(|a, b| b.len().cmp(&a.len()));
    groups
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommunityStats {
    pub community_count: usize,
    /// Community size to number of communities of that size.
    pub distribution: BTreeMap<usize, usize>,
    pub node_count: usize,
    pub relationship_count: usize,
    pub largest_community_size: usize,
    pub smallest_community_size: usize,
}

impl CommunityStats {
    pub fn compute(graph: &GraphData, communities: &[Vec<usize>]) -> Self {
        let mut distribution = BTreeMap::new();
        for community in communities {
            *distribution.entry(community.len()).or_insert(0) += 1;
        }

        Self {
            community_count: communities.len(),
            distribution,
            node_count: graph.entities.len(),
            relationship_count: graph.relationship_count(),
            largest_community_size: communities.iter().map(Vec::len).max().unwrap_or(0),
            smallest_community_size: communities.iter().map(Vec::len).min().unwrap_or(0),
        }
    }
}
