//! Two-sample statistics used by the drift detector.

/// Population mean.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// Returns `(statistic, p_value)` where the statistic is the supremum of
/// the absolute difference between the two empirical CDFs and the p-value
/// is the asymptotic Kolmogorov approximation.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }

    let mut xs: Vec<f64> = a.to_vec();
    let mut ys: Vec<f64> = b.to_vec();
    xs.sort_by(|p, q| p.total_cmp(q));
    ys.sort_by(|p, q| p.total_cmp(q));

    let (m, n) = (xs.len(), ys.len());
    let mut i = 0usize;
    let mut j = 0usize;
    let mut d: f64 = 0.0;

    // Walk both sorted samples, tracking the ECDF gap at every step point.
    while i < m && j < n {
        let x = xs[i].min(ys[j]);
        while i < m && xs[i] <= x {
            i += 1;
        }
        while j < n && ys[j] <= x {
            j += 1;
        }
        let gap = (i as f64 / m as f64 - j as f64 / n as f64).abs();
        if gap > d {
            d = gap;
        }
    }

    (d, ks_pvalue(d, m, n))
}

/// Asymptotic two-sample KS p-value (Kolmogorov distribution tail).
fn ks_pvalue(d: f64, m: usize, n: usize) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    let en = ((m * n) as f64 / (m + n) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;

    let mut p = 0.0;
    let mut sign = 1.0;
    for j in 1..=100 {
        let term = (-2.0 * (j as f64) * (j as f64) * lambda * lambda).exp();
        p += sign * term;
        sign = -sign;
        if term < 1e-12 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Linear-interpolated percentile of a sorted slice, `q` in [0, 100].
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Count samples per bin given ascending edges; the last bin is
/// right-inclusive, values outside the edge range are ignored.
fn histogram(xs: &[f64], edges: &[f64]) -> Vec<usize> {
    let bins = edges.len() - 1;
    let mut counts = vec![0usize; bins];
    let first = edges[0];
    let last = edges[bins];
    for &x in xs {
        if x < first || x > last {
            continue;
        }
        // Find the bin via upper_bound on the left edges.
        let mut b = match edges[..bins].binary_search_by(|e| e.total_cmp(&x)) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        if b >= bins {
            b = bins - 1;
        }
        counts[b] += 1;
    }
    counts
}

/// Floor applied to zero-probability bins before the log-ratio.
const PSI_FLOOR: f64 = 1e-4;

/// Population Stability Index over `bins` reference-percentile bins.
///
/// Cut-points are percentiles of the reference column with duplicates
/// removed; fewer than two distinct cut-points (a constant column) is the
/// degenerate case and scores 0.
pub fn psi(reference: &[f64], current: &[f64], bins: usize) -> f64 {
    if reference.is_empty() || current.is_empty() {
        return 0.0;
    }

    let mut sorted = reference.to_vec();
    sorted.sort_by(|p, q| p.total_cmp(q));

    let mut edges: Vec<f64> = (0..=bins)
        .map(|i| percentile_sorted(&sorted, i as f64 * 100.0 / bins as f64))
        .collect();
    edges.dedup();

    if edges.len() < 2 {
        return 0.0;
    }

    let ref_counts = histogram(reference, &edges);
    let curr_counts = histogram(current, &edges);

    let mut total = 0.0;
    for (rc, cc) in ref_counts.iter().zip(&curr_counts) {
        let mut r = *rc as f64 / reference.len() as f64;
        let mut c = *cc as f64 / current.len() as f64;
        if r == 0.0 {
            r = PSI_FLOOR;
        }
        if c == 0.0 {
            c = PSI_FLOOR;
        }
        total += (c - r) * (c / r).ln();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&xs) - 5.0).abs() < 1e-12);
        assert!((std_dev(&xs) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ks_identical_samples() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (d, p) = ks_2samp(&a, &a);
        assert_eq!(d, 0.0);
        assert_eq!(p, 1.0);
    }

    #[test]
    fn ks_disjoint_samples() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..50).map(|i| 1000.0 + i as f64).collect();
        let (d, p) = ks_2samp(&a, &b);
        assert_eq!(d, 1.0);
        assert!(p < 1e-6);
    }

    #[test]
    fn ks_statistic_interleaved() {
        // ECDFs of {1,3} vs {2,4} differ by at most 0.5.
        let (d, _) = ks_2samp(&[1.0, 3.0], &[2.0, 4.0]);
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn percentile_interpolates() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&xs, 0.0), 0.0);
        assert_eq!(percentile_sorted(&xs, 100.0), 4.0);
        assert!((percentile_sorted(&xs, 50.0) - 2.0).abs() < 1e-12);
        assert!((percentile_sorted(&xs, 62.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn histogram_last_bin_inclusive() {
        let edges = [0.0, 1.0, 2.0];
        let counts = histogram(&[0.0, 0.5, 1.0, 1.5, 2.0, 2.5], &edges);
        // 2.5 is outside, 2.0 lands in the right-inclusive last bin.
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn psi_constant_reference_is_degenerate() {
        let reference = vec![3.0; 100];
        let current: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(psi(&reference, &current, 10), 0.0);
    }

    #[test]
    fn psi_identical_distributions_near_zero() {
        let xs: Vec<f64> = (0..1000).map(|i| (i % 100) as f64).collect();
        let p = psi(&xs, &xs, 10);
        assert!(p.abs() < 1e-9, "psi = {p}");
    }

    #[test]
    fn psi_detects_shifted_distribution() {
        let reference: Vec<f64> = (0..1000).map(|i| (i % 100) as f64).collect();
        let current: Vec<f64> = reference.iter().map(|x| x + 80.0).collect();
        let p = psi(&reference, &current, 10);
        assert!(p > 0.2, "psi = {p}");
    }
}
