//! 2-D k-d tree over observation coordinates
//!
//! Answers nearest, k-nearest and within-radius queries in O(log n)
//! average time, replacing the O(n·m) brute-force scan over large target
//! grids. Queries take `&self` only, so one tree can be shared read-only
//! across parallel workers.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use terrastat_core::SamplePoint;

/// A neighbor returned by a spatial query. Equal distances rank by
/// ascending observation index, so query results are deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the observation in the original point order
    pub index: usize,
    pub distance_sq: f64,
}

impl Neighbor {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

#[derive(Debug)]
struct Node {
    point_idx: usize,
    /// 0 = x split, 1 = y split
    axis: u8,
    left: Option<u32>,
    right: Option<u32>,
}

/// Spatial index over a fixed set of sample points.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<Node>,
    points: Vec<SamplePoint>,
}

impl KdTree {
    /// Build from sample points; O(n log n) with median partitioning.
    pub fn build(points: &[SamplePoint]) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(points.len()),
            points: points.to_vec(),
        };
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            tree.build_recursive(&mut indices, 0);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observation behind a query result.
    pub fn point(&self, index: usize) -> SamplePoint {
        self.points[index]
    }

    fn build_recursive(&mut self, indices: &mut [usize], depth: usize) -> u32 {
        let axis = (depth % 2) as u8;
        let median = indices.len() / 2;

        indices.select_nth_unstable_by(median, |&a, &b| {
            let (va, vb) = if axis == 0 {
                (self.points[a].x, self.points[b].x)
            } else {
                (self.points[a].y, self.points[b].y)
            };
            va.partial_cmp(&vb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let node_idx = self.nodes.len() as u32;
        self.nodes.push(Node {
            point_idx: indices[median],
            axis,
            left: None,
            right: None,
        });

        if median > 0 {
            let mut left: Vec<usize> = indices[..median].to_vec();
            let child = self.build_recursive(&mut left, depth + 1);
            self.nodes[node_idx as usize].left = Some(child);
        }
        if median + 1 < indices.len() {
            let mut right: Vec<usize> = indices[median + 1..].to_vec();
            let child = self.build_recursive(&mut right, depth + 1);
            self.nodes[node_idx as usize].right = Some(child);
        }

        node_idx
    }

    /// Single nearest point to (qx, qy), or None on an empty tree.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Neighbor> {
        self.k_nearest(qx, qy, 1).into_iter().next()
    }

    /// Up to k nearest points, sorted by ascending (distance, index).
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        // Candidates kept sorted ascending; the last entry is the current
        // k-th best and bounds the search.
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut best);
        best.into_iter()
            .map(|(distance_sq, index)| Neighbor { index, distance_sq })
            .collect()
    }

    /// All points within `radius` of (qx, qy), sorted by ascending
    /// (distance, index).
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || radius <= 0.0 {
            return Vec::new();
        }
        let mut found: Vec<(f64, usize)> = Vec::new();
        self.radius_recursive(0, qx, qy, radius * radius, &mut found);
        found.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        found
            .into_iter()
            .map(|(distance_sq, index)| Neighbor { index, distance_sq })
            .collect()
    }

    fn knn_recursive(
        &self,
        node_idx: u32,
        qx: f64,
        qy: f64,
        k: usize,
        best: &mut Vec<(f64, usize)>,
    ) {
        let node = &self.nodes[node_idx as usize];
        let p = &self.points[node.point_idx];

        let dx = qx - p.x;
        let dy = qy - p.y;
        let dist_sq = dx * dx + dy * dy;

        let candidate = (dist_sq, node.point_idx);
        if best.len() < k || candidate < best[best.len() - 1] {
            let pos = best.partition_point(|probe| *probe < candidate);
            best.insert(pos, candidate);
            if best.len() > k {
                best.pop();
            }
        }

        let diff = if node.axis == 0 { dx } else { dy };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.knn_recursive(child, qx, qy, k, best);
        }
        let bound = if best.len() >= k {
            best[best.len() - 1].0
        } else {
            f64::MAX
        };
        if diff * diff <= bound {
            if let Some(child) = far {
                self.knn_recursive(child, qx, qy, k, best);
            }
        }
    }

    fn radius_recursive(
        &self,
        node_idx: u32,
        qx: f64,
        qy: f64,
        radius_sq: f64,
        found: &mut Vec<(f64, usize)>,
    ) {
        let node = &self.nodes[node_idx as usize];
        let p = &self.points[node.point_idx];

        let dx = qx - p.x;
        let dy = qy - p.y;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq <= radius_sq {
            found.push((dist_sq, node.point_idx));
        }

        let diff = if node.axis == 0 { dx } else { dy };
        if let Some(child) = node.left {
            if diff < 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(child, qx, qy, radius_sq, found);
            }
        }
        if let Some(child) = node.right {
            if diff >= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(child, qx, qy, radius_sq, found);
            }
        }
    }
}
