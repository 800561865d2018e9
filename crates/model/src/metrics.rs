//! Classification metrics (support-weighted, multi-class).

/// Fraction of exact matches.
pub fn accuracy(y_true: &[i64], y_pred: &[i64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

/// Support-weighted precision, recall, and F1 over the classes present in
/// `y_true`. Undefined per-class ratios contribute 0.
pub fn weighted_prf(y_true: &[i64], y_pred: &[i64]) -> (f64, f64, f64) {
    if y_true.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mut classes: Vec<i64> = y_true.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let total = y_true.len() as f64;
    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;

    for &class in &classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let support = (tp + fn_) as f64;
        let p_c = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let r_c = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f_c = if p_c + r_c > 0.0 { 2.0 * p_c * r_c / (p_c + r_c) } else { 0.0 };

        let weight = support / total;
        precision += weight * p_c;
        recall += weight * r_c;
        f1 += weight * f_c;
    }

    (precision, recall, f1)
}
