//! Modularity-based community detection
//!
//! Leiden-style optimisation: repeated local moving of vertices to the
//! neighbouring community with the best modularity gain, followed by
//! graph aggregation, until the partition stops improving. The
//! implementation is fully deterministic (vertices are visited in index
//! order and ties break toward the smaller community id), so identical
//! inputs always yield identical partitions.

use std::collections::BTreeMap;

/// A detected partition of the vertex set.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Community id per vertex, renumbered densely in order of first
    /// appearance.
    pub membership: Vec<usize>,
    /// Modularity of the final partition on the input graph.
    pub modularity: f64,
}

impl Partition {
    /// Members per community, ordered by community id.
    pub fn communities(&self) -> Vec<Vec<usize>> {
        let count = self.membership.iter().copied().max().map_or(0, |m| m + 1);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (vertex, community) in self.membership.iter().enumerate() {
            groups[*community].push(vertex);
        }
        groups
    }
}

/// Undirected weighted adjacency used during optimisation. Self loops
/// carry intra-community weight between aggregation rounds.
struct WorkGraph {
    adj: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degrees: Vec<f64>,
    total_weight_2m: f64,
}

impl WorkGraph {
    fn from_edges(num_vertices: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); num_vertices];
        let mut self_loops = vec![0.0; num_vertices];

        for &(a, b, w) in edges {
            if a == b {
                self_loops[a] += w;
            } else {
                adj[a].push((b, w));
                adj[b].push((a, w));
            }
        }

        let mut degrees = vec![0.0; num_vertices];
        for v in 0..num_vertices {
            degrees[v] = adj[v].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self_loops[v];
        }
        let total_weight_2m = degrees.iter().sum();

        WorkGraph {
            adj,
            self_loops,
            degrees,
            total_weight_2m,
        }
    }
}

/// Detect communities in a directed call graph. Edge direction is
/// ignored for the modularity objective; parallel edges add weight.
pub fn detect_communities(num_vertices: usize, edges: &[(usize, usize)]) -> Partition {
    let weighted: Vec<(usize, usize, f64)> =
        edges.iter().map(|&(a, b)| (a, b, 1.0)).collect();
    detect_communities_weighted(num_vertices, &weighted)
}

pub fn detect_communities_weighted(
    num_vertices: usize,
    edges: &[(usize, usize, f64)],
) -> Partition {
    if num_vertices == 0 {
        return Partition {
            membership: Vec::new(),
            modularity: 0.0,
        };
    }

    let base = WorkGraph::from_edges(num_vertices, edges);
    if base.total_weight_2m == 0.0 {
        // No edges: every vertex is its own community.
        return Partition {
            membership: (0..num_vertices).collect(),
            modularity: 0.0,
        };
    }

    // `membership` maps original vertices to communities of the current
    // level; `level_graph` is the aggregated graph being optimised.
    let mut membership: Vec<usize> = (0..num_vertices).collect();
    let mut level_graph = base;

    loop {
        let level_assignment = local_moving(&level_graph);
        let community_count = renumber(&level_assignment).1;

        if community_count == level_graph.adj.len() {
            // No vertex moved; the partition is stable.
            break;
        }

        let (dense_assignment, _) = renumber(&level_assignment);
        for slot in membership.iter_mut() {
            *slot = dense_assignment[*slot];
        }

        level_graph = aggregate(&level_graph, &dense_assignment, community_count);
        if community_count == 1 {
            break;
        }
    }

    let (final_membership, _) = renumber(&membership);
    let modularity = modularity_of(&WorkGraph::from_edges(num_vertices, edges), &final_membership);

    Partition {
        membership: final_membership,
        modularity,
    }
}

/// One level of local moving: sweep vertices in index order, moving each
/// to the neighbouring community with the best positive modularity gain,
/// until a full sweep makes no move.
fn local_moving(graph: &WorkGraph) -> Vec<usize> {
    let n = graph.adj.len();
    let mut community: Vec<usize> = (0..n).collect();
    let mut sum_tot: Vec<f64> = graph.degrees.clone();
    let two_m = graph.total_weight_2m;

    let mut moved = true;
    while moved {
        moved = false;
        for v in 0..n {
            let current = community[v];
            let k_v = graph.degrees[v];

            // Weight from v into each neighbouring community.
            let mut weight_to: BTreeMap<usize, f64> = BTreeMap::new();
            for &(u, w) in &graph.adj[v] {
                *weight_to.entry(community[u]).or_insert(0.0) += w;
            }

            // Remove v from its community for the comparison.
            sum_tot[current] -= k_v;

            let own_weight = weight_to.get(&current).copied().unwrap_or(0.0);
            let mut best_community = current;
            let mut best_gain = own_weight - sum_tot[current] * k_v / two_m;

            for (&candidate, &weight) in &weight_to {
                if candidate == current {
                    continue;
                }
                let gain = weight - sum_tot[candidate] * k_v / two_m;
                if gain > best_gain + 1e-12
                    || (gain > best_gain - 1e-12 && candidate < best_community)
                {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            sum_tot[best_community] += k_v;
            if best_community != current {
                community[v] = best_community;
                moved = true;
            }
        }
    }

    community
}

/// Renumber community ids densely in order of first appearance. Returns
/// the mapping and the community count.
fn renumber(assignment: &[usize]) -> (Vec<usize>, usize) {
    let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0usize;
    let mut dense = Vec::with_capacity(assignment.len());
    for &community in assignment {
        let id = *remap.entry(community).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
        dense.push(id);
    }
    (dense, next)
}

/// Collapse each community into a single vertex, summing edge weights.
/// Intra-community weight becomes a self loop so modularity is preserved
/// across levels.
fn aggregate(graph: &WorkGraph, assignment: &[usize], community_count: usize) -> WorkGraph {
    let mut edge_weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut self_weights: Vec<f64> = vec![0.0; community_count];

    for (v, loops) in graph.self_loops.iter().enumerate() {
        self_weights[assignment[v]] += loops;
    }
    for v in 0..graph.adj.len() {
        for &(u, w) in &graph.adj[v] {
            if v < u {
                let (a, b) = (assignment[v], assignment[u]);
                if a == b {
                    self_weights[a] += w;
                } else {
                    let key = if a < b { (a, b) } else { (b, a) };
                    *edge_weights.entry(key).or_insert(0.0) += w;
                }
            }
        }
    }

    let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(edge_weights.len());
    for ((a, b), w) in edge_weights {
        edges.push((a, b, w));
    }
    for (c, w) in self_weights.iter().enumerate() {
        if *w > 0.0 {
            edges.push((c, c, *w));
        }
    }

    WorkGraph::from_edges(community_count, &edges)
}

/// Q = sum_c [ in_c / 2m - (tot_c / 2m)^2 ].
fn modularity_of(graph: &WorkGraph, membership: &[usize]) -> f64 {
    let two_m = graph.total_weight_2m;
    if two_m == 0.0 {
        return 0.0;
    }

    let count = membership.iter().copied().max().map_or(0, |m| m + 1);
    let mut internal = vec![0.0; count];
    let mut total = vec![0.0; count];

    for v in 0..graph.adj.len() {
        let c = membership[v];
        total[c] += graph.degrees[v];
        internal[c] += 2.0 * graph.self_loops[v];
        for &(u, w) in &graph.adj[v] {
            if membership[u] == c {
                internal[c] += w;
            }
        }
    }

    (0..count)
        .map(|c| internal[c] / two_m - (total[c] / two_m).powi(2))
        .sum()
}
