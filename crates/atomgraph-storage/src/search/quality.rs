//! Search quality measures.
//!
//! Used by the recall tests and benches to compare the hybrid pipeline with
//! [`HybridSearchEngine::search_exact`](super::HybridSearchEngine::search_exact)
//! and to check how well projected distances preserve embedding-space order.

use std::collections::HashSet;

use atomgraph_core::types::AtomId;

/// Fraction of the true top-`k` that appears in the approximate top-`k`.
///
/// An empty ground truth counts as perfect recall.
pub fn recall_at_k(approximate: &[AtomId], exact: &[AtomId], k: usize) -> f32 {
    let truth: HashSet<AtomId> = exact.iter().take(k).copied().collect();
    if truth.is_empty() {
        return 1.0;
    }
    let found = approximate
        .iter()
        .take(k)
        .filter(|id| truth.contains(id))
        .count();
    found as f32 / truth.len() as f32
}

/// Spearman's rho between two paired samples, ties given average ranks.
///
/// `None` when the samples differ in length, have fewer than two points, or
/// one of them is constant.
pub fn spearman_rank_correlation(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let ra = average_ranks(a);
    let rb = average_ranks(b);

    let n = ra.len() as f64;
    let mean_a = ra.iter().sum::<f64>() / n;
    let mean_b = rb.iter().sum::<f64>() / n;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (x, y) in ra.iter().zip(&rb) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())) as f32)
}

/// 1-based ranks; equal values share the mean of the ranks they span.
fn average_ranks(values: &[f32]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut ranks = vec![0.0f64; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<AtomId> {
        raw.iter().map(|&i| AtomId(i)).collect()
    }

    #[test]
    fn test_recall_at_k() {
        let exact = ids(&[1, 2, 3, 4]);
        assert_eq!(recall_at_k(&ids(&[1, 2, 3, 4]), &exact, 4), 1.0);
        assert_eq!(recall_at_k(&ids(&[4, 3, 9, 8]), &exact, 4), 0.5);
        // Only the first k of each list count
        assert_eq!(recall_at_k(&ids(&[9, 1]), &exact, 1), 0.0);
    }

    #[test]
    fn edge_case_recall_with_empty_truth() {
        assert_eq!(recall_at_k(&ids(&[1]), &[], 10), 1.0);
        assert_eq!(recall_at_k(&[], &ids(&[1]), 10), 0.0);
    }

    #[test]
    fn test_spearman_monotone() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let up = [10.0, 20.0, 25.0, 100.0, 101.0];
        let down = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((spearman_rank_correlation(&a, &up).unwrap() - 1.0).abs() < 1e-6);
        assert!((spearman_rank_correlation(&a, &down).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn edge_case_spearman_degenerate_inputs() {
        assert_eq!(spearman_rank_correlation(&[1.0], &[1.0]), None);
        assert_eq!(spearman_rank_correlation(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(spearman_rank_correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
    }
}
