//! Numeric helpers shared by the evaluator and the processing engines.
//!
//! Rounding works on the shortest decimal representation of the `f64`, so that
//! `round(2.345, 2)` sees the digits a user typed rather than the binary
//! expansion `2.34499999...`.

use std::cmp::Ordering;

/// Exact comparison of an integer with a float.
pub fn compare_mixed(int: i64, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    // 2^63 is exactly representable; anything at or beyond it is out of i64 range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(float - whole)),
        other => Some(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    HalfUp,
    Down,
}

/// Round half away from zero at `scale` decimal places (negative scales round
/// to tens, hundreds...).
pub fn round_half_up(value: f64, scale: i32) -> f64 {
    rescale(value, scale, Rounding::HalfUp)
}

/// Truncate toward zero at `scale` decimal places.
pub fn truncate(value: f64, scale: i32) -> f64 {
    rescale(value, scale, Rounding::Down)
}

fn rescale(value: f64, scale: i32, mode: Rounding) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // Display for f64 never uses exponent notation.
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes())
        .map(|b| b - b'0')
        .collect();
    let mut point = int_part.len();

    let keep = point as i64 + i64::from(scale);
    if keep >= digits.len() as i64 {
        return value;
    }
    if keep < 0 {
        return 0.0;
    }
    let keep = keep as usize;
    let round_up = mode == Rounding::HalfUp && digits[keep] >= 5;
    digits.truncate(keep);

    if round_up {
        let mut carry = true;
        for digit in digits.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, 1);
            point += 1;
        }
    }

    let mut text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    if text.is_empty() {
        text.push('0');
    }
    if point >= text.len() {
        text.extend(std::iter::repeat('0').take(point - text.len()));
    } else {
        text.insert(point, '.');
    }
    let magnitude: f64 = text.parse().unwrap_or(0.0);
    if value.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Floored modulo: the result takes the sign of the divisor, and a zero
/// divisor returns the dividend unchanged.
pub fn floored_mod(dividend: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        return dividend;
    }
    let remainder = dividend % divisor;
    if remainder != 0.0 && (remainder < 0.0) != (divisor < 0.0) {
        remainder + divisor
    } else {
        remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.345, 2), 2.35);
        assert_eq!(round_half_up(2.5, 0), 3.0);
        assert_eq!(round_half_up(-2.5, 0), -3.0);
        assert_eq!(round_half_up(0.5, 0), 1.0);
        assert_eq!(round_half_up(9.96, 1), 10.0);
        assert_eq!(round_half_up(1234.5, -2), 1200.0);
        assert_eq!(round_half_up(1250.0, -2), 1300.0);
        assert_eq!(round_half_up(12.0, 3), 12.0);
        assert_eq!(round_half_up(3.14159, 10), 3.14159);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate(2.349, 2), 2.34);
        assert_eq!(truncate(-7.9, 0), -7.0);
        assert_eq!(truncate(1299.0, -2), 1200.0);
        assert_eq!(truncate(0.05, -1), 0.0);
    }

    #[test]
    fn test_floored_mod() {
        assert_eq!(floored_mod(5.0, 3.0), 2.0);
        assert_eq!(floored_mod(-5.0, 3.0), 1.0);
        assert_eq!(floored_mod(5.0, -3.0), -1.0);
        assert_eq!(floored_mod(5.0, 0.0), 5.0);
        assert_eq!(floored_mod(6.0, 3.0), 0.0);
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(compare_mixed(1, 1.5), Some(Ordering::Less));
        assert_eq!(compare_mixed(-1, -1.5), Some(Ordering::Greater));
        assert_eq!(compare_mixed(3, 3.0), Some(Ordering::Equal));
        assert_eq!(compare_mixed(i64::MAX, 1e19), Some(Ordering::Less));
        assert_eq!(compare_mixed(0, f64::NAN), None);
    }
}
