//! Small numeric helpers shared by the aggregation, agreement and perturbation code.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Pearson correlation. `None` when lengths differ, fewer than two points, or either
/// side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    if den_x == 0.0 || den_y == 0.0 {
        None
    } else {
        Some((num / (den_x * den_y).sqrt()).clamp(-1.0, 1.0))
    }
}

/// 1-based ranks in ascending order of `values`, ties receiving the average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut ranks = vec![0.0; n];
    let mut i = 0usize;
    while i < n {
        let value = values[indices[i]];
        let mut j = i + 1;
        while j < n && values[indices[j]] == value {
            j += 1;
        }
        // positions i..j hold ranks i+1..=j
        let avg_rank = (i + j + 1) as f64 / 2.0;
        for &idx in &indices[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Spearman rank correlation with average ranks for ties.
///
/// Degenerate inputs (fewer than two points or a constant side) yield 1.0 when both
/// sides are identical and 0.0 otherwise.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() {
        return 0.0;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);
    match pearson(&rx, &ry) {
        Some(rho) => rho,
        None => degenerate(x, y),
    }
}

/// Kendall tau-b from concordant/discordant pair counts, corrected for ties.
///
/// Degenerate inputs follow the same convention as [`spearman`].
pub fn kendall_tau(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() {
        return 0.0;
    }

    let mut concordant = 0f64;
    let mut discordant = 0f64;
    let mut ties_x = 0f64;
    let mut ties_y = 0f64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];

            if dx == 0.0 && dy == 0.0 {
                continue;
            } else if dx == 0.0 {
                ties_x += 1.0;
            } else if dy == 0.0 {
                ties_y += 1.0;
            } else if (dx > 0.0) == (dy > 0.0) {
                concordant += 1.0;
            } else {
                discordant += 1.0;
            }
        }
    }

    let denom = ((concordant + discordant + ties_x) * (concordant + discordant + ties_y)).sqrt();
    if denom == 0.0 {
        degenerate(x, y)
    } else {
        ((concordant - discordant) / denom).clamp(-1.0, 1.0)
    }
}

fn degenerate(x: &[f64], y: &[f64]) -> f64 {
    if x == y { 1.0 } else { 0.0 }
}

pub fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Scale to unit L2 norm. A zero vector is returned unchanged.
pub fn unit_normalize(values: &[f64]) -> Vec<f64> {
    let norm = l2_norm(values);
    if norm == 0.0 {
        values.to_vec()
    } else {
        values.iter().map(|v| v / norm).collect()
    }
}

pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// `|values|` normalized to sum to one, or `None` when every value is zero.
pub fn abs_distribution(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().map(|v| v.abs()).sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| v.abs() / total).collect())
}

/// Shannon entropy in nats; zero-probability terms contribute nothing.
pub fn shannon_entropy(distribution: &[f64]) -> f64 {
    distribution
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

/// Gini coefficient of a non-negative distribution; 0 for uniform, towards 1 for concentrated.
pub fn gini(distribution: &[f64]) -> f64 {
    let n = distribution.len();
    let total: f64 = distribution.iter().sum();
    if n == 0 || total == 0.0 {
        return 0.0;
    }
    let mut sorted = distribution.to_vec();
    sorted.sort_by(f64::total_cmp);
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    let nf = n as f64;
    ((2.0 * weighted) / (nf * total) - (nf + 1.0) / nf).clamp(0.0, 1.0)
}

/// Number of largest entries needed to reach `fraction` of the distribution's mass.
pub fn effective_count(distribution: &[f64], fraction: f64) -> usize {
    let total: f64 = distribution.iter().sum();
    if distribution.is_empty() || total == 0.0 {
        return distribution.len();
    }
    let mut sorted = distribution.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    let target = fraction * total;
    let mut cumulative = 0.0;
    for (i, v) in sorted.iter().enumerate() {
        cumulative += v;
        if cumulative >= target - 1e-12 {
            return i + 1;
        }
    }
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_spearman_identical_and_reversed() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [4.0, 3.0, 2.0, 1.0];
        assert!((spearman(&a, &a) - 1.0).abs() < 1e-12);
        assert!((spearman(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kendall_tau_identical_and_reversed() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [4.0, 3.0, 2.0, 1.0];
        assert!((kendall_tau(&a, &a) - 1.0).abs() < 1e-12);
        assert!((kendall_tau(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kendall_tau_single_swap() {
        // one discordant pair out of six
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 1.0, 3.0, 4.0];
        assert!((kendall_tau(&a, &b) - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_correlation() {
        assert_eq!(spearman(&[1.0], &[1.0]), 1.0);
        assert_eq!(spearman(&[3.0, 3.0], &[1.0, 2.0]), 0.0);
        assert_eq!(kendall_tau(&[], &[]), 1.0);
    }

    #[test]
    fn test_pearson_none_on_constant() {
        assert!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_none());
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unit_normalize() {
        let v = unit_normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-12);
        assert!((v[1] - 0.8).abs() < 1e-12);
        assert_eq!(unit_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_entropy_and_gini() {
        let uniform = [0.25; 4];
        assert!((shannon_entropy(&uniform) - 4.0f64.ln()).abs() < 1e-12);
        assert!(gini(&uniform).abs() < 1e-12);
        let peaked = [1.0, 0.0, 0.0, 0.0];
        assert_eq!(shannon_entropy(&peaked), 0.0);
        assert!((gini(&peaked) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_effective_count() {
        assert_eq!(effective_count(&[0.7, 0.2, 0.1], 0.8), 2);
        assert_eq!(effective_count(&[1.0, 0.0], 0.8), 1);
        assert_eq!(effective_count(&[0.25; 4], 0.8), 4);
    }

    #[test]
    fn test_std_dev_population() {
        let s = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.0).abs() < 1e-12);
        assert!(std_dev(&[]).is_none());
    }
}
