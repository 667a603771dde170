/// Computes the infinity norm: `max(abs(a))`.
///
/// Returns negative infinity for an empty slice so that callers taking
/// the maximum over several norms need no special casing.
pub fn norm_inf(a: &[f64]) -> f64 {
    let mut max = f64::NEG_INFINITY;
    a.iter().for_each(|v| {
        let absvi = v.abs();
        if absvi > max {
            max = absvi
        }
    });
    max
}

/// Returns the 2-norm (Euclidean) of `a`.
pub fn norm(a: &[f64]) -> f64 {
    let mut sqsum = 0.0;
    for v in a {
        sqsum += v * v;
    }
    f64::sqrt(sqsum)
}

/// Returns the dot product of `a` and `b`.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Returns the maximum element of `a`, or negative infinity if empty.
pub fn max(a: &[f64]) -> f64 {
    a.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}
