//! Nearest-neighbor cluster tracker: greedy association, age-out, velocity.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ClusterRecord {
    pub id: u32,
    pub centroids: Vec<[f64; 3]>,
    pub timestamps: Vec<f64>,
    pub last_updated_tick: u64,
}

fn dist3(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// Stateful nearest-neighbor association of centroid streams to persistent
/// object ids, with age-out. Greedy, not globally optimal: each input
/// centroid may select an already-claimed record within the same call.
#[derive(Debug, Clone)]
pub struct ClusterTracker {
    history: BTreeMap<u32, ClusterRecord>,
    next_id: u32,
    frame_count: u64,
    max_distance: f64,
    max_age: u64,
}

impl ClusterTracker {
    pub fn new(max_distance: f64, max_age: u64) -> Self {
        Self {
            history: BTreeMap::new(),
            next_id: 0,
            frame_count: 0,
            max_distance,
            max_age,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Associate each input centroid with a historical record (nearest
    /// previous centroid under `max_distance`, ties won by the smallest id)
    /// or allocate a new id. Advances `frame_count` by exactly 1 regardless
    /// of how many centroids arrived, including zero.
    pub fn track(&mut self, centroids: &[[f64; 3]], timestamp: f64) -> Vec<u32> {
        self.frame_count += 1;
        let tick = self.frame_count;

        let mut ids = Vec::with_capacity(centroids.len());
        for &c in centroids {
            let mut best: Option<(u32, f64)> = None;
            // BTreeMap iterates in ascending id order, so a strict `<`
            // comparison below keeps the first (smallest id) match on ties.
            for (&id, rec) in self.history.iter() {
                let last = *rec.centroids.last().expect("record always has >=1 observation");
                let dist = dist3(last, c);
                if dist < self.max_distance && best.map_or(true, |(_, best_dist)| dist < best_dist) {
                    best = Some((id, dist));
                }
            }

            let id = match best {
                Some((id, _)) => {
                    let rec = self.history.get_mut(&id).expect("matched id must exist");
                    rec.centroids.push(c);
                    rec.timestamps.push(timestamp);
                    rec.last_updated_tick = tick;
                    id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.history.insert(
                        id,
                        ClusterRecord {
                            id,
                            centroids: vec![c],
                            timestamps: vec![timestamp],
                            last_updated_tick: tick,
                        },
                    );
                    id
                }
            };
            ids.push(id);
        }
        ids
    }

    /// Most recent centroid for each id.
    pub fn position(&self, ids: &[u32]) -> BTreeMap<u32, [f64; 3]> {
        ids.iter()
            .filter_map(|id| {
                self.history
                    .get(id)
                    .map(|rec| (*id, *rec.centroids.last().unwrap()))
            })
            .collect()
    }

    /// `(c_last - c_prev) / (t_last - t_prev)` for ids with >=2 observations;
    /// the zero vector for single-observation records.
    pub fn velocity(&self, ids: &[u32]) -> BTreeMap<u32, [f64; 3]> {
        ids.iter()
            .filter_map(|id| {
                self.history.get(id).map(|rec| {
                    let v = if rec.centroids.len() >= 2 {
                        let n = rec.centroids.len();
                        let (c1, c2) = (rec.centroids[n - 2], rec.centroids[n - 1]);
                        let (t1, t2) = (rec.timestamps[n - 2], rec.timestamps[n - 1]);
                        let dt = t2 - t1;
                        [
                            (c2[0] - c1[0]) / dt,
                            (c2[1] - c1[1]) / dt,
                            (c2[2] - c1[2]) / dt,
                        ]
                    } else {
                        [0.0, 0.0, 0.0]
                    };
                    (*id, v)
                })
            })
            .collect()
    }

    /// Remove every record whose `frame_count - last_updated_tick > max_age`.
    pub fn cleanup(&mut self) {
        let frame_count = self.frame_count;
        let max_age = self.max_age;
        self.history
            .retain(|_, rec| frame_count - rec.last_updated_tick <= max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_centroid_allocates_new_id() {
        let mut t = ClusterTracker::new(1.0, 3);
        let ids = t.track(&[[0.0, 0.0, 0.0]], 0.0);
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn stable_tracking_within_max_distance() {
        let mut t = ClusterTracker::new(1.0, 3);
        let id0 = t.track(&[[0.0, 0.0, 0.0]], 0.0)[0];
        let id1 = t.track(&[[0.5, 0.0, 0.0]], 1.0)[0];
        let id2 = t.track(&[[0.9, 0.0, 0.0]], 2.0)[0];
        assert_eq!(id0, id1);
        assert_eq!(id1, id2);
    }

    #[test]
    fn tie_break_on_equal_distance_favors_smallest_id() {
        let mut t = ClusterTracker::new(10.0, 3);
        t.track(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 0.0); // ids 0, 1
        // equidistant from both existing records
        let ids = t.track(&[[5.0, 0.0, 0.0]], 1.0);
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn velocity_formula_matches_consecutive_observations() {
        let mut t = ClusterTracker::new(5.0, 3);
        let id = t.track(&[[0.0, 0.0, 0.0]], 0.0)[0];
        t.track(&[[2.0, 4.0, 6.0]], 2.0);
        let v = t.velocity(&[id]);
        assert_relative_eq!(v[&id][0], 1.0);
        assert_relative_eq!(v[&id][1], 2.0);
        assert_relative_eq!(v[&id][2], 3.0);
    }

    #[test]
    fn single_observation_has_zero_velocity() {
        let mut t = ClusterTracker::new(5.0, 3);
        let id = t.track(&[[0.0, 0.0, 0.0]], 0.0)[0];
        assert_eq!(t.velocity(&[id])[&id], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn age_out_removes_stale_records_then_new_observation_gets_fresh_id() {
        let mut t = ClusterTracker::new(1.0, 2);
        let id = t.track(&[[0.0, 0.0, 0.0]], 0.0)[0];
        t.cleanup();
        for tick in 1..=3 {
            t.track(&[], tick as f64);
            t.cleanup();
        }
        assert!(t.position(&[id]).is_empty());

        let new_ids = t.track(&[[0.1, 0.0, 0.0]], 4.0);
        assert_ne!(new_ids[0], id);
    }

    #[test]
    fn frame_count_advances_once_per_track_call_even_when_empty() {
        let mut t = ClusterTracker::new(1.0, 2);
        t.track(&[], 0.0);
        t.track(&[], 1.0);
        assert_eq!(t.frame_count(), 2);
    }
}
