use crate::ann::{AnnIndex, IndexKind, Neighbor};
use crate::fusion::FusedMatrix;
use crate::{Error, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Build and search parameters of the HNSW graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Links per node on upper layers; layer 0 keeps twice as many
    pub max_connections: usize,
    pub max_layers: usize,
    pub ef_construction: usize,
    /// Query beam width, raised to `k` when smaller
    pub ef_search: usize,
    /// Seed for level assignment, so builds are reproducible
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_layers: 8,
            ef_construction: 200,
            ef_search: 64,
            seed: 42,
        }
    }
}

/// Bit vector for visited node tracking
struct VisitedSet {
    bits: Vec<u64>,
}

impl VisitedSet {
    #[inline]
    fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(64)],
        }
    }

    /// Returns true if `idx` was not yet visited
    #[inline]
    fn insert(&mut self, idx: usize) -> bool {
        let mask = 1u64 << (idx % 64);
        let word = &mut self.bits[idx / 64];
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    #[cfg(test)]
    fn contains(&self, idx: usize) -> bool {
        self.bits
            .get(idx / 64)
            .is_some_and(|word| word & (1u64 << (idx % 64)) != 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    /// Neighbor lists, one per layer the node lives on
    layers: Vec<Vec<usize>>,
}

type Scored = (OrderedFloat<f32>, usize);

/// Hierarchical navigable small world graph over unit vectors.
///
/// Built once from the fused matrix, immutable afterwards: searches take
/// `&self` and keep their scratch state local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    params: HnswParams,
    dim: usize,
    /// Contiguous storage for all vectors (cache-friendly)
    vectors: Vec<f32>,
    nodes: Vec<HnswNode>,
    entry_point: Option<usize>,
    top_layer: usize,
}

impl HnswIndex {
    pub fn build(matrix: &FusedMatrix, params: HnswParams) -> Self {
        let params = HnswParams {
            max_connections: params.max_connections.max(2),
            max_layers: params.max_layers.max(1),
            ef_construction: params.ef_construction.max(1),
            ef_search: params.ef_search.max(1),
            seed: params.seed,
        };
        let mut index = Self {
            params,
            dim: matrix.dim(),
            vectors: matrix.as_slice().to_vec(),
            nodes: Vec::with_capacity(matrix.len()),
            entry_point: None,
            top_layer: 0,
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        for idx in 0..matrix.len() {
            let layer = index.select_layer(&mut rng);
            index.insert(idx, layer);
        }
        index
    }

    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Level drawn from an exponential decay with scale `1 / ln(M)`
    fn select_layer(&self, rng: &mut StdRng) -> usize {
        let scale = 1.0 / (self.params.max_connections as f64).ln();
        let uniform: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-uniform.ln() * scale).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    #[inline(always)]
    fn vector(&self, idx: usize) -> &[f32] {
        let start = idx * self.dim;
        &self.vectors[start..start + self.dim]
    }

    #[inline(always)]
    fn distance_to_node(&self, query: &[f32], idx: usize) -> f32 {
        1.0 - crate::simd::dot_product_simd(query, self.vector(idx))
    }

    #[inline]
    fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.max_connections * 2
        } else {
            self.params.max_connections
        }
    }

    fn insert(&mut self, idx: usize, layer: usize) {
        debug_assert_eq!(idx, self.nodes.len());
        self.nodes.push(HnswNode {
            layers: vec![Vec::new(); layer + 1],
        });

        let Some(mut entry) = self.entry_point else {
            self.entry_point = Some(idx);
            self.top_layer = layer;
            return;
        };

        let query = self.vector(idx).to_vec();
        for upper in (layer + 1..=self.top_layer).rev() {
            entry = self.greedy_closest(&query, entry, upper);
        }

        for current in (0..=layer.min(self.top_layer)).rev() {
            let candidates = self.search_layer(&query, entry, self.params.ef_construction, current);
            let neighbors: Vec<usize> = candidates
                .iter()
                .take(self.params.max_connections)
                .map(|&(_, n)| n)
                .collect();

            for &neighbor in &neighbors {
                self.nodes[neighbor].layers[current].push(idx);
                if self.nodes[neighbor].layers[current].len() > self.layer_capacity(current) {
                    self.prune(neighbor, current);
                }
            }
            self.nodes[idx].layers[current] = neighbors;

            if let Some(&(_, closest)) = candidates.first() {
                entry = closest;
            }
        }

        if layer > self.top_layer {
            self.top_layer = layer;
            self.entry_point = Some(idx);
        }
    }

    /// Keep only the closest links of `node` on `layer`
    fn prune(&mut self, node: usize, layer: usize) {
        let capacity = self.layer_capacity(layer);
        let base = self.vector(node).to_vec();
        let mut links: Vec<Scored> = self.nodes[node].layers[layer]
            .iter()
            .map(|&n| (OrderedFloat(self.distance_to_node(&base, n)), n))
            .collect();
        links.sort_unstable();
        links.truncate(capacity);
        self.nodes[node].layers[layer] = links.into_iter().map(|(_, n)| n).collect();
    }

    fn greedy_closest(&self, query: &[f32], entry: usize, layer: usize) -> usize {
        self.search_layer(query, entry, 1, layer)
            .first()
            .map(|&(_, n)| n)
            .unwrap_or(entry)
    }

    /// Beam search on one layer; results ascending by distance
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Scored> {
        let mut visited = VisitedSet::new(self.nodes.len());
        let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<Scored> = BinaryHeap::with_capacity(ef + 1);

        let entry_dist = OrderedFloat(self.distance_to_node(query, entry));
        visited.insert(entry);
        candidates.push(Reverse((entry_dist, entry)));
        results.push((entry_dist, entry));

        while let Some(Reverse((dist, current))) = candidates.pop() {
            let worst = results.peek().map(|&(d, _)| d).unwrap_or(dist);
            if results.len() >= ef && dist > worst {
                break;
            }

            let Some(links) = self.nodes[current].layers.get(layer) else {
                continue;
            };
            for &neighbor in links {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = OrderedFloat(self.distance_to_node(query, neighbor));
                let worst = results.peek().map(|&(w, _)| w).unwrap_or(d);
                if results.len() < ef || d < worst {
                    candidates.push(Reverse((d, neighbor)));
                    results.push((d, neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }
}

impl AnnIndex for HnswIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dim {
            return Err(Error::InvalidDimension {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        let Some(mut entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        for layer in (1..=self.top_layer).rev() {
            entry = self.greedy_closest(vector, entry, layer);
        }

        let ef = self.params.ef_search.max(k);
        Ok(self
            .search_layer(vector, entry, ef, 0)
            .into_iter()
            .take(k)
            .map(|(dist, id)| Neighbor {
                id,
                distance: dist.into_inner().max(0.0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::ExactIndex;

    fn random_unit_matrix(n: usize, dim: usize, seed: u64) -> FusedMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Vec::with_capacity(n * dim);
        for _ in 0..n {
            let mut row: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            row.iter_mut().for_each(|x| *x /= norm);
            data.extend(row);
        }
        FusedMatrix::new(dim, data).unwrap()
    }

    #[test]
    fn test_visited_set() {
        let mut vs = VisitedSet::new(100);
        assert!(!vs.contains(5));
        assert!(vs.insert(5));
        assert!(vs.contains(5));
        assert!(!vs.insert(5));
        assert!(vs.insert(99));
    }

    #[test]
    fn test_hnsw_finds_self_first() {
        let matrix = random_unit_matrix(200, 16, 7);
        let index = HnswIndex::build(&matrix, HnswParams::default());
        assert_eq!(index.len(), 200);

        for id in [0usize, 57, 199] {
            let hits = index.query(matrix.row(id).unwrap(), 5).unwrap();
            assert_eq!(hits.len(), 5);
            assert_eq!(hits[0].id, id);
            assert!(hits[0].distance < 1e-5);
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_hnsw_close_to_exact() {
        let matrix = random_unit_matrix(500, 12, 3);
        let hnsw = HnswIndex::build(&matrix, HnswParams::default());
        let exact = ExactIndex::build(&matrix);

        let mut found = 0;
        let mut total = 0;
        for id in (0..500).step_by(25) {
            let q = matrix.row(id).unwrap();
            let truth: Vec<usize> = exact.query(q, 10).unwrap().iter().map(|n| n.id).collect();
            let approx: Vec<usize> = hnsw.query(q, 10).unwrap().iter().map(|n| n.id).collect();
            found += truth.iter().filter(|id| approx.contains(id)).count();
            total += truth.len();
        }
        assert!(found as f32 / total as f32 >= 0.9, "recall {found}/{total}");
    }

    #[test]
    fn test_build_is_deterministic() {
        let matrix = random_unit_matrix(100, 8, 11);
        let a = HnswIndex::build(&matrix, HnswParams::default());
        let b = HnswIndex::build(&matrix, HnswParams::default());
        let q = matrix.row(3).unwrap();
        assert_eq!(a.query(q, 7).unwrap(), b.query(q, 7).unwrap());
    }

    #[test]
    fn test_empty_index() {
        let matrix = FusedMatrix::new(4, Vec::new()).unwrap();
        let index = HnswIndex::build(&matrix, HnswParams::default());
        assert!(index.is_empty());
        assert!(index.query(&[0.0; 4], 3).unwrap().is_empty());
    }
}
