//! Density clustering of surviving voxels into centroids.
//!
//! DBSCAN with a fixed `min_samples = 3`, backed by an R-tree for
//! neighborhood queries (point clouds here are small per tick, but the
//! R-tree keeps region queries sub-quadratic without hand-rolling a grid
//! index).

use std::collections::VecDeque;

use rstar::{RTree, RTreeObject, AABB};

pub const MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    coords: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl rstar::PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        (0..3).map(|a| (self.coords[a] - point[a]).powi(2)).sum()
    }
}

/// Cluster `points` with DBSCAN (`min_samples = 3`, given `eps`) and return
/// the arithmetic-mean centroid of each non-noise cluster. Noise points
/// (label -1) are discarded; an empty result means no clusters.
pub fn cluster(points: &[[f64; 3]], eps: f64) -> Vec<[f64; 3]> {
    if points.is_empty() {
        return Vec::new();
    }

    let entries: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(idx, &coords)| IndexedPoint { idx, coords })
        .collect();
    let tree = RTree::bulk_load(entries);
    let eps2 = eps * eps;

    let region_query = |coords: [f64; 3]| -> Vec<usize> {
        tree.locate_within_distance(coords, eps2)
            .map(|p| p.idx)
            .collect()
    };

    const UNVISITED: i64 = -2;
    const NOISE: i64 = -1;
    let mut labels = vec![UNVISITED; points.len()];
    let mut next_cluster = 0i64;

    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        let neighbors = region_query(points[i]);
        if neighbors.len() < MIN_SAMPLES {
            labels[i] = NOISE;
            continue;
        }

        labels[i] = next_cluster;
        let mut seeds: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();

        while let Some(j) = seeds.pop_front() {
            if labels[j] == NOISE {
                labels[j] = next_cluster;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = next_cluster;

            let j_neighbors = region_query(points[j]);
            if j_neighbors.len() >= MIN_SAMPLES {
                for k in j_neighbors {
                    if labels[k] == UNVISITED || labels[k] == NOISE {
                        seeds.push_back(k);
                    }
                }
            }
        }

        next_cluster += 1;
    }

    let mut sums = vec![[0.0f64; 3]; next_cluster as usize];
    let mut counts = vec![0usize; next_cluster as usize];
    for (i, &label) in labels.iter().enumerate() {
        if label < 0 {
            continue;
        }
        let c = label as usize;
        for a in 0..3 {
            sums[c][a] += points[i][a];
        }
        counts[c] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            let n = count as f64;
            [sum[0] / n, sum[1] / n, sum[2] / n]
        })
        .collect()
}
