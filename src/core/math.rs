//! Tolerant floating point comparisons
//!
//! Distances and weights in the paired-information index are accumulated
//! from many small contributions, so equality is always checked with a
//! relative epsilon.

/// Relative tolerance for [`eq`].
pub const EPS: f64 = 1e-10;

#[inline]
fn scale(a: f64, b: f64) -> f64 {
    1.0_f64.max(a.abs()).max(b.abs())
}

#[inline]
pub fn eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS * scale(a, b)
}

/// Strictly less, never true for values that compare [`eq`].
#[inline]
pub fn ls(a: f64, b: f64) -> bool {
    a < b && !eq(a, b)
}

/// Strictly greater, never true for values that compare [`eq`].
#[inline]
pub fn gr(a: f64, b: f64) -> bool {
    a > b && !eq(a, b)
}

#[inline]
pub fn le(a: f64, b: f64) -> bool {
    a < b || eq(a, b)
}

#[inline]
pub fn ge(a: f64, b: f64) -> bool {
    a > b || eq(a, b)
}

/// Round to the nearest integer, resolving ties toward zero so that
/// `round_to_zero(-x) == -round_to_zero(x)` always holds.
#[inline]
pub fn round_to_zero(x: f64) -> i64 {
    let truncated = x.trunc();
    if (x - truncated).abs() == 0.5 {
        truncated as i64
    } else {
        x.round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_comparisons_reject_equal_values() {
        assert!(!gr(0.9, 0.9));
        assert!(!gr(1.0 - 1.0 / 10.0, 0.9));
        assert!(gr(0.91, 0.9));
        assert!(!ls(2.0, 2.0 + 1e-12));
        assert!(ls(1.0, 2.0));
    }

    #[test]
    fn test_non_strict_comparisons() {
        assert!(le(3.0, 3.0));
        assert!(ge(3.0, 3.0));
        assert!(le(2.0, 3.0));
        assert!(!ge(2.0, 3.0));
    }

    #[test]
    fn test_round_to_zero_is_antisymmetric() {
        assert_eq!(round_to_zero(2.5), 2);
        assert_eq!(round_to_zero(-2.5), -2);
        assert_eq!(round_to_zero(2.6), 3);
        assert_eq!(round_to_zero(-2.6), -3);
        assert_eq!(round_to_zero(0.4), 0);
        for _ in 0..200 {
            let x = fastrand::f64() * 2000.0 - 1000.0;
            assert_eq!(round_to_zero(-x), -round_to_zero(x));
        }
    }
}
