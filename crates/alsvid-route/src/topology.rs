//! Qubit-connectivity topology.
//!
//! An immutable undirected graph over the platform's real qubits. Beyond
//! adjacency it knows hop distances (precomputed all-pairs BFS), an
//! angular neighbor order for border-path pruning when planar coordinates
//! are available, and the partition of qubits into cores. Edges crossing a
//! core boundary can carry routing swaps but never a two-qubit gate.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sentinel distance for disconnected qubit pairs.
pub const INFINITE: u32 = u32::MAX;

/// Device qubit-connectivity graph.
///
/// ## Performance
///
/// On construction (factory methods) or after [`rebuild_caches`]
/// (manual construction / deserialization), an all-pairs distance matrix
/// is precomputed with BFS from each node, so `distance()` is O(1) during
/// routing. Without it, `distance()` falls back to per-query BFS.
///
/// [`rebuild_caches`]: Self::rebuild_caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Number of real qubits.
    num_qubits: u32,
    /// Number of cores the qubits are partitioned into (1 = single core).
    num_cores: u32,
    /// Connected qubit pairs (bidirectional).
    edges: Vec<(u32, u32)>,
    /// Planar qubit coordinates, when the device layout is known.
    coordinates: Option<Vec<(f64, f64)>>,
    /// Adjacency in insertion order.
    #[serde(skip)]
    adjacency: FxHashMap<u32, Vec<u32>>,
    /// Neighbor lists in angular order (falls back to insertion order).
    #[serde(skip)]
    neighbor_order: Vec<Vec<u32>>,
    /// All-pairs hop distances; `INFINITE` when unreachable.
    #[serde(skip)]
    dist: Vec<Vec<u32>>,
}

impl Topology {
    /// Create a topology with no edges and a single core.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            num_cores: 1,
            edges: vec![],
            coordinates: None,
            adjacency: FxHashMap::default(),
            neighbor_order: vec![],
            dist: vec![],
        }
    }

    /// Add an edge between two qubits (bidirectional).
    ///
    /// Duplicate edges (including reversed pairs) are silently ignored.
    pub fn add_edge(&mut self, a: u32, b: u32) {
        if self
            .edges
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
        {
            return;
        }
        self.edges.push((a, b));
        self.adjacency.entry(a).or_default().push(b);
        self.adjacency.entry(b).or_default().push(a);
    }

    /// Attach planar coordinates, enabling the angular neighbor order.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate count does not match the qubit count.
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Vec<(f64, f64)>) -> Self {
        assert_eq!(
            coordinates.len(),
            self.num_qubits as usize,
            "one coordinate pair per qubit required"
        );
        self.coordinates = Some(coordinates);
        self
    }

    /// Partition the qubits into `num_cores` equal contiguous cores.
    #[must_use]
    pub fn with_cores(mut self, num_cores: u32) -> Self {
        self.num_cores = num_cores.max(1);
        self
    }

    /// Rebuild the distance matrix and neighbor orderings from the edge
    /// list. Must be called after manual edge construction or after
    /// deserialization.
    pub fn rebuild_caches(&mut self) {
        self.adjacency.clear();
        for &(a, b) in &self.edges {
            self.adjacency.entry(a).or_default().push(b);
            self.adjacency.entry(b).or_default().push(a);
        }
        self.precompute_distances();
        self.precompute_neighbor_order();
    }

    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist = vec![vec![INFINITE; n]; n];
        for src in 0..n {
            self.dist[src][src] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(src as u32);
            while let Some(current) = queue.pop_front() {
                let cur = current as usize;
                for &nb in self.adjacency.get(&current).into_iter().flatten() {
                    let nbi = nb as usize;
                    if self.dist[src][nbi] == INFINITE {
                        self.dist[src][nbi] = self.dist[src][cur] + 1;
                        queue.push_back(nb);
                    }
                }
            }
        }
    }

    /// Order each neighbor list by angle around its center and rotate it so
    /// the largest angular gap falls beyond the last element. Without
    /// coordinates the insertion order is kept.
    fn precompute_neighbor_order(&mut self) {
        let n = self.num_qubits as usize;
        self.neighbor_order = vec![vec![]; n];
        for q in 0..self.num_qubits {
            let mut nbs = self
                .adjacency
                .get(&q)
                .cloned()
                .unwrap_or_default();
            if let Some(coords) = &self.coordinates {
                let (cx, cy) = coords[q as usize];
                let angle = |p: u32| -> f64 {
                    let (px, py) = coords[p as usize];
                    (py - cy).atan2(px - cx)
                };
                nbs.sort_by(|&a, &b| {
                    angle(a)
                        .partial_cmp(&angle(b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                if nbs.len() > 1 {
                    // Find the widest angular gap between consecutive
                    // neighbors (wrapping) and start the list just after it.
                    let mut gap_at = 0;
                    let mut widest = -1.0f64;
                    for i in 0..nbs.len() {
                        let a0 = angle(nbs[i]);
                        let a1 = angle(nbs[(i + 1) % nbs.len()]);
                        let mut gap = a1 - a0;
                        if gap <= 0.0 {
                            gap += std::f64::consts::TAU;
                        }
                        if gap > widest {
                            widest = gap;
                            gap_at = (i + 1) % nbs.len();
                        }
                    }
                    nbs.rotate_left(gap_at);
                }
            }
            self.neighbor_order[q as usize] = nbs;
        }
    }

    /// Number of real qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Number of cores.
    #[inline]
    pub fn num_cores(&self) -> u32 {
        self.num_cores
    }

    /// The core a qubit belongs to.
    pub fn core_of(&self, qubit: u32) -> u32 {
        let per_core = (self.num_qubits / self.num_cores).max(1);
        (qubit / per_core).min(self.num_cores - 1)
    }

    /// True iff the edge between `a` and `b` crosses a core boundary and
    /// therefore cannot host a two-qubit gate, only routing swaps.
    pub fn is_inter_core(&self, a: u32, b: u32) -> bool {
        self.core_of(a) != self.core_of(b)
    }

    /// Whether planar coordinates are available.
    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_connected(&self, a: u32, b: u32) -> bool {
        self.adjacency
            .get(&a)
            .is_some_and(|nbs| nbs.contains(&b))
    }

    /// The coupling edges.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Neighbors of a qubit, in angular order when coordinates exist.
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        self.neighbor_order
            .get(qubit as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Minimum hop distance, or [`INFINITE`] when disconnected.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        if from == to {
            return 0;
        }
        let (f, t) = (from as usize, to as usize);
        if f < self.dist.len() && t < self.dist[f].len() {
            return self.dist[f][t];
        }
        self.distance_bfs(from, to)
    }

    fn distance_bfs(&self, from: u32, to: u32) -> u32 {
        let mut visited = FxHashMap::default();
        let mut queue = VecDeque::new();
        visited.insert(from, 0u32);
        queue.push_back((from, 0u32));
        while let Some((current, d)) = queue.pop_front() {
            for &nb in self.adjacency.get(&current).into_iter().flatten() {
                if nb == to {
                    return d + 1;
                }
                if let std::collections::hash_map::Entry::Vacant(e) = visited.entry(nb) {
                    e.insert(d + 1);
                    queue.push_back((nb, d + 1));
                }
            }
        }
        INFINITE
    }

    /// Create a linear chain 0-1-2-...
    pub fn linear(n: u32) -> Self {
        let mut topo = Self::new(n);
        for i in 0..n.saturating_sub(1) {
            topo.add_edge(i, i + 1);
        }
        topo.rebuild_caches();
        topo
    }

    /// Create a star: qubit 0 connected to all others.
    pub fn star(n: u32) -> Self {
        let mut topo = Self::new(n);
        for i in 1..n {
            topo.add_edge(0, i);
        }
        topo.rebuild_caches();
        topo
    }

    /// Create a fully connected topology.
    pub fn full(n: u32) -> Self {
        let mut topo = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                topo.add_edge(i, j);
            }
        }
        topo.rebuild_caches();
        topo
    }

    /// Create a rectangular grid with planar coordinates.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut topo = Self::new(rows * cols);
        let mut coords = Vec::with_capacity((rows * cols) as usize);
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                coords.push((f64::from(c), f64::from(r)));
                if c + 1 < cols {
                    topo.add_edge(q, q + 1);
                }
                if r + 1 < rows {
                    topo.add_edge(q, q + cols);
                }
            }
        }
        let mut topo = topo.with_coordinates(coords);
        topo.rebuild_caches();
        topo
    }

    /// Create a multi-core topology: each core fully connected internally,
    /// consecutive cores linked by one inter-core edge between the last
    /// qubit of one core and the first qubit of the next.
    pub fn multi_core(num_cores: u32, qubits_per_core: u32) -> Self {
        let n = num_cores * qubits_per_core;
        let mut topo = Self::new(n).with_cores(num_cores);
        for core in 0..num_cores {
            let start = core * qubits_per_core;
            let end = start + qubits_per_core;
            for i in start..end {
                for j in (i + 1)..end {
                    topo.add_edge(i, j);
                }
            }
            if core + 1 < num_cores {
                topo.add_edge(end - 1, end);
            }
        }
        topo.rebuild_caches();
        topo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_distances() {
        let topo = Topology::linear(5);
        assert!(topo.is_connected(0, 1));
        assert!(!topo.is_connected(0, 2));
        assert_eq!(topo.distance(0, 4), 4);
        assert_eq!(topo.distance(2, 2), 0);
    }

    #[test]
    fn test_star_distances() {
        let topo = Topology::star(7);
        assert_eq!(topo.distance(0, 3), 1);
        assert_eq!(topo.distance(1, 2), 2);
        assert_eq!(topo.neighbors(0).len(), 6);
    }

    #[test]
    fn test_disconnected_is_infinite() {
        let mut topo = Topology::new(4);
        topo.add_edge(0, 1);
        topo.add_edge(2, 3);
        topo.rebuild_caches();
        assert_eq!(topo.distance(0, 3), INFINITE);
        assert_eq!(topo.distance(0, 1), 1);
    }

    #[test]
    fn test_grid_has_coordinates_and_angular_order() {
        let topo = Topology::grid(3, 3);
        assert!(topo.has_coordinates());
        assert_eq!(topo.distance(0, 8), 4);
        // Center qubit of a 3x3 grid has 4 neighbors; all present exactly once.
        let mut nbs = topo.neighbors(4).to_vec();
        nbs.sort_unstable();
        assert_eq!(nbs, vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_corner_neighbor_rotation() {
        // For corner qubit 0 of a grid, the angular gap between its two
        // neighbors (east and south) must fall between last and first, so
        // both orders are acceptable but the list must contain exactly them.
        let topo = Topology::grid(2, 2);
        let nbs = topo.neighbors(0);
        assert_eq!(nbs.len(), 2);
        assert!(nbs.contains(&1) && nbs.contains(&2));
    }

    #[test]
    fn test_multi_core() {
        let topo = Topology::multi_core(2, 2);
        assert_eq!(topo.num_qubits(), 4);
        assert_eq!(topo.core_of(1), 0);
        assert_eq!(topo.core_of(2), 1);
        assert!(topo.is_connected(1, 2));
        assert!(topo.is_inter_core(1, 2));
        assert!(!topo.is_inter_core(0, 1));
        assert_eq!(topo.distance(0, 3), 3);
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut topo = Topology::new(3);
        topo.add_edge(0, 1);
        topo.add_edge(1, 0);
        topo.add_edge(0, 1);
        assert_eq!(topo.edges().len(), 1);
    }
}
