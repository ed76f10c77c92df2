//! Power-of-ten scaling
//!
//! Every factor comes from a literal table, never from repeated
//! multiplication, so the same delta always produces the same bits.
//! Negative deltas divide by the exact power instead of multiplying by an
//! inexact reciprocal: `2500.0 / 1e3` is exactly `2.5`, `2500.0 * 1e-3` is not
//! guaranteed to be.

/// Largest supported |delta|, the distance between yotta and yocto
pub const MAX_DELTA: u32 = 48;

const POWERS_OF_TEN: [f64; (MAX_DELTA + 1) as usize] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22, 1e23, 1e24, 1e25, 1e26, 1e27, 1e28, 1e29, 1e30, 1e31,
    1e32, 1e33, 1e34, 1e35, 1e36, 1e37, 1e38, 1e39, 1e40, 1e41, 1e42, 1e43, 1e44, 1e45, 1e46,
    1e47, 1e48,
];

/// `10^exp` for `exp <= MAX_DELTA`
pub fn pow10(exp: u32) -> Option<f64> {
    POWERS_OF_TEN.get(exp as usize).copied()
}

/// `value * 10^delta`
pub fn scale(value: f64, delta: i32) -> f64 {
    let magnitude = delta.unsigned_abs();
    let factor = pow10(magnitude).unwrap_or_else(|| 10f64.powi(magnitude as i32));

    if delta >= 0 {
        value * factor
    } else {
        value / factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        let tolerance = f64::EPSILON * 4.0 * a.abs().max(b.abs());
        assert!((a - b).abs() <= tolerance, "{} != {}", a, b);
    }

    #[test]
    fn test_table_entries_are_exact_literals() {
        for exp in 0..=MAX_DELTA {
            let expected: f64 = format!("1e{}", exp).parse().unwrap();
            assert_eq!(pow10(exp), Some(expected));
        }
        assert_eq!(pow10(MAX_DELTA + 1), None);
    }

    #[test]
    fn test_zero_delta_is_identity() {
        assert_eq!(scale(2.5, 0), 2.5);
        assert_eq!(scale(-0.125, 0), -0.125);
    }

    #[test]
    fn test_nano_to_micro_is_exact() {
        assert_eq!(scale(2500.0, -3), 2.5);
        assert_eq!(scale(1.0, -3), 0.001);
    }

    #[test]
    fn test_positive_delta() {
        assert_eq!(scale(2.5, 3), 2500.0);
        assert_eq!(scale(1.0, 24), 1e24);
    }

    #[test]
    fn test_full_prefix_span() {
        assert_eq!(scale(1.0, 48), 1e48);
        assert_eq!(scale(1e48, -48), 1.0);
    }

    #[test]
    fn test_round_trip_within_epsilon() {
        let values = [2.5, 2500.0, 0.1, 123.456, 7e-5, 9.81, -42.0];
        for &value in &values {
            for delta in [-24, -9, -6, -3, -1, 1, 2, 3, 6, 9, 24] {
                let back = scale(scale(value, delta), -delta);
                assert_close(back, value);
            }
        }
    }
}
