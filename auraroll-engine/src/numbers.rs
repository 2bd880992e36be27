//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Floor a f64 and clamp it to the u64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() {
        return 0;
    }
    let max = u64_to_f64(u64::MAX);
    let clamped = value.clamp(0.0, max).floor();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// `floor(chance / multiplier)` for a positive, finite multiplier.
///
/// Integer multipliers are divided exactly so huge chances never pick up
/// float rounding; fractional multipliers go through f64.
#[must_use]
pub fn divide_chance(chance: u64, multiplier: f64) -> u64 {
    if multiplier.fract() == 0.0 && multiplier <= u64_to_f64(u64::MAX) {
        let whole = floor_f64_to_u64(multiplier).max(1);
        return chance / whole;
    }
    floor_f64_to_u64(u64_to_f64(chance) / multiplier)
}

/// Ratio of two counts, 0.0 when the denominator is zero.
#[must_use]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    u64_to_f64(numerator) / u64_to_f64(denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_non_finite_and_negative() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(7.9), 7);
    }

    #[test]
    fn divide_chance_floors_both_paths() {
        assert_eq!(divide_chance(1_000, 3.0), 333);
        assert_eq!(divide_chance(1_000, 2.5), 400);
        assert_eq!(divide_chance(10, 4.0), 2);
        assert_eq!(divide_chance(9_999_999_999, 2.0), 4_999_999_999);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert!((ratio(5, 0) - 0.0).abs() < f64::EPSILON);
        assert!((ratio(1, 4) - 0.25).abs() < f64::EPSILON);
    }
}
