//! Top-p voxel selection: percentile thresholding of the accumulator grid.

use ndarray::Array3;

/// Linear-interpolation percentile (the conventional definition, matching
/// e.g. numpy's default `linear` method) over an already-sorted ascending
/// slice.
fn percentile_linear(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Select the indices of every cell at or above the `p`-th percentile of
/// strictly positive cell values. Returns `None` if there are no positive
/// cells, or if the computed threshold is non-positive.
pub fn extract(cells: &Array3<u64>, p: f64) -> Option<Vec<[usize; 3]>> {
    let mut positive: Vec<f64> = cells.iter().filter(|&&v| v > 0).map(|&v| v as f64).collect();
    if positive.is_empty() {
        return None;
    }
    positive.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let threshold = percentile_linear(&positive, p);
    if threshold <= 0.0 {
        return None;
    }

    let indices = cells
        .indexed_iter()
        .filter(|(_, &v)| v as f64 >= threshold)
        .map(|((i, j, k), _)| [i, j, k])
        .collect();

    Some(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_returns_none() {
        let cells = Array3::<u64>::zeros((4, 4, 4));
        assert!(extract(&cells, 99.9).is_none());
    }

    #[test]
    fn percentile_is_monotonic_in_set_inclusion() {
        let mut cells = Array3::<u64>::zeros((4, 4, 4));
        for (i, v) in [1u64, 2, 3, 4, 5, 100, 200, 300].into_iter().enumerate() {
            cells[[i % 4, i / 4, 0]] = v;
        }

        let low = extract(&cells, 50.0).unwrap();
        let high = extract(&cells, 99.0).unwrap();

        let low_set: std::collections::HashSet<_> = low.into_iter().collect();
        let high_set: std::collections::HashSet<_> = high.into_iter().collect();

        assert!(high_set.is_subset(&low_set));
    }

    #[test]
    fn single_positive_cell_is_its_own_percentile() {
        let mut cells = Array3::<u64>::zeros((2, 2, 2));
        cells[[0, 0, 0]] = 42;
        let result = extract(&cells, 99.9).unwrap();
        assert_eq!(result, vec![[0, 0, 0]]);
    }
}
