//! Probability helpers and numeric iteration

use thiserror::Error;

/// Default starting point of [`iterconverge`]
pub const CONVERGE_INIT: f64 = 0.5;
/// Default step budget of [`iterconverge`]
pub const CONVERGE_MAXSTEPS: usize = 0x40;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvergenceError {
    #[error("no fixed point after {steps} steps (last value {last})")]
    Exhausted { steps: usize, last: f64 },

    #[error("iteration left [0, 1] at step {step}: {value}")]
    OutOfRange { step: usize, value: f64 },
}

/// Probability that at least one of several independent events happens
pub fn union_ind<I: IntoIterator<Item = f64>>(probs: I) -> f64 {
    1.0 - probs.into_iter().fold(1.0, |acc, p| acc * (1.0 - p))
}

fn settled(prev: f64, next: f64) -> bool {
    (next - prev).abs() <= f64::EPSILON * prev.abs().max(next.abs())
}

/// Solve `k = f(k)` for a probability `k`, starting from `init`.
///
/// Each step takes two plain iterations and an Aitken extrapolation
/// (Steffensen's method); the plain iterate is used when the extrapolation is
/// undefined or leaves [0, 1]. Stops once the relative change is within
/// machine epsilon.
pub fn iterconverge<F>(mut f: F, init: f64, maxsteps: usize) -> Result<f64, ConvergenceError>
where
    F: FnMut(f64) -> f64,
{
    let check = |step: usize, value: f64| {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ConvergenceError::OutOfRange { step, value })
        }
    };

    let mut k = check(0, init)?;
    for step in 1..=maxsteps {
        let k1 = check(step, f(k))?;
        if settled(k, k1) {
            return Ok(k1);
        }
        let k2 = check(step, f(k1))?;
        if settled(k1, k2) {
            return Ok(k2);
        }

        let denom = k2 - 2.0 * k1 + k;
        let accel = k - (k1 - k) * (k1 - k) / denom;
        let next = if denom != 0.0 && accel.is_finite() && (0.0..=1.0).contains(&accel) { accel } else { k2 };
        if settled(k, next) {
            return Ok(next);
        }
        k = next;
    }
    Err(ConvergenceError::Exhausted { steps: maxsteps, last: k })
}

/// Geometric progression with ratio `r` through `c`, bounded by `[a, b]`.
///
/// `c` itself is always included. A ratio that is not finite or not above 1
/// yields `[c]` alone.
pub fn geo_prog_range(a: f64, b: f64, r: f64, c: f64) -> Vec<f64> {
    let mut out = vec![c];
    if r.is_finite() && r > 1.0 {
        let mut x = c * r;
        while x <= b {
            out.push(x);
            x *= r;
        }
        let mut x = c / r;
        while x >= a {
            out.push(x);
            x /= r;
        }
    }
    out.sort_by(f64::total_cmp);
    out
}

/// Round an ascending float sequence to unique non-negative integers
pub fn int_unique(seq: &[f64]) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(seq.len());
    for &x in seq {
        let r = x.round();
        if !r.is_finite() || r < 0.0 {
            continue;
        }
        let r = r as usize;
        if out.last() != Some(&r) {
            out.push(r);
        }
    }
    out
}

/// Exponent of a discrete power law fitted to the values `>= xmin`, by the
/// maximum-likelihood approximation `1 + n / sum(ln(x / (xmin - 0.5)))`.
pub fn power_law_fit(values: &[usize], xmin: usize) -> Option<f64> {
    let base = xmin as f64 - 0.5;
    if base <= 0.0 {
        return None;
    }
    let (n, sum) = values
        .iter()
        .filter(|&&x| x >= xmin)
        .fold((0usize, 0.0f64), |(n, s), &x| (n + 1, s + (x as f64 / base).ln()));
    if n == 0 || sum <= 0.0 {
        return None;
    }
    Some(1.0 + n as f64 / sum)
}

/// Harmonic mean of precision and recall, zero when both are zero
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_ind() {
        assert_eq!(union_ind([]), 0.0);
        assert!((union_ind([0.5, 0.5]) - 0.75).abs() < 1e-12);
        assert_eq!(union_ind([1.0, 0.3]), 1.0);
    }

    #[test]
    fn test_iterconverge_linear_map() {
        // k = 0.5 k + 0.25 has the fixed point 0.5 from anywhere
        let k = iterconverge(|k| 0.5 * k + 0.25, 0.1, CONVERGE_MAXSTEPS).unwrap();
        assert!((k - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_iterconverge_identity_keeps_init() {
        assert_eq!(iterconverge(|k| k, CONVERGE_INIT, CONVERGE_MAXSTEPS).unwrap(), 0.5);
    }

    #[test]
    fn test_iterconverge_slow_contraction() {
        // union of k and 0.77 k: plain iteration converges to 1 only linearly
        let a = 0.7735;
        let k = iterconverge(|k| union_ind([k, a * k]), CONVERGE_INIT, CONVERGE_MAXSTEPS).unwrap();
        assert!((k - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_iterconverge_out_of_range() {
        let err = iterconverge(|k| k + 0.75, 0.5, CONVERGE_MAXSTEPS).unwrap_err();
        assert!(matches!(err, ConvergenceError::OutOfRange { step: 1, .. }));
    }

    #[test]
    fn test_iterconverge_exhausted() {
        // no fixed point: every step moves by at least 0.4
        let err = iterconverge(|k| if k < 0.5 { k + 0.5 } else { k - 0.4 }, 0.25, 4).unwrap_err();
        assert!(matches!(err, ConvergenceError::Exhausted { steps: 4, .. }));
    }

    #[test]
    fn test_geo_prog_range() {
        assert_eq!(geo_prog_range(2.0, 20.0, 2.0, 5.0), vec![2.5, 5.0, 10.0, 20.0]);
        assert_eq!(geo_prog_range(2.0, 20.0, f64::NAN, 5.0), vec![5.0]);
        assert_eq!(geo_prog_range(2.0, 20.0, 1.0, 5.0), vec![5.0]);
    }

    #[test]
    fn test_int_unique() {
        assert_eq!(int_unique(&[1.2, 1.4, 2.6, 3.0, 7.9]), vec![1, 3, 8]);
    }

    #[test]
    fn test_power_law_fit() {
        assert_eq!(power_law_fit(&[1, 2, 3], 6), None);
        let alpha = power_law_fit(&[6, 11, 1, 2], 6).unwrap();
        let expected = 1.0 + 2.0 / ((6.0f64 / 5.5).ln() + (11.0f64 / 5.5).ln());
        assert!((alpha - expected).abs() < 1e-12);
    }

    #[test]
    fn test_f1() {
        assert_eq!(f1_score(0.0, 0.0), 0.0);
        assert!((f1_score(0.5, 1.0) - 2.0 / 3.0).abs() < 1e-12);
    }
}
