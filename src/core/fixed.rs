//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the gameplay simulation.
//! Everything that runs inside a Simulate call uses integer arithmetic only,
//! so a replayed tick produces the same bits on every machine.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Positions are metres, timers are seconds. A level a few hundred metres
//! across stays far away from the range limits.

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

/// Maximum positive value
pub const FIXED_MAX: Fixed = i32::MAX;

/// Minimum negative value
pub const FIXED_MIN: Fixed = i32::MIN;

// =============================================================================
// SIMULATION CONSTANTS (All as integer literals - NO float conversion!)
// =============================================================================

/// Tick duration at 60 Hz: round(65536/60) = 1092
pub const TICK_DURATION: Fixed = 1092;

/// Gravity acceleration: 20.0 m/s² = 20 * 65536
pub const DEFAULT_GRAVITY: Fixed = 1310720;

/// Distance over which weapon damage falloff is evaluated: 100.0 m
pub const FALLOFF_DISTANCE: Fixed = 6553600;

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use tickfire::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert a sampled device/camera float to fixed-point, rounding to nearest.
///
/// Used by the input sampling hook, which runs outside Simulate.
#[inline]
pub fn from_f32(f: f32) -> Fixed {
    let scaled = (f as f64) * (FIXED_ONE as f64);
    if scaled.is_nan() {
        return 0;
    }
    scaled.round().clamp(FIXED_MIN as f64, FIXED_MAX as f64) as Fixed
}

/// Convert fixed-point to float for display/rendering.
///
/// # Warning
/// Only use for visual output. NEVER use result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Convert an integer to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
///
/// # Determinism
/// - Uses wrapping arithmetic
/// - Arithmetic shift (rounds toward negative infinity)
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    // Widen to i64, multiply, shift back
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
///
/// # Determinism
/// - Truncates toward zero
/// - Divide-by-zero returns 0 (not panic)
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0; // Deterministic: don't panic
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Integer square root of a u64, rounded down.
///
/// Pure integer Newton iteration; identical on every platform.
#[inline]
pub fn isqrt_u64(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Start above the root so the sequence decreases monotonically.
    let shift = (64 - n.leading_zeros()).div_ceil(2);
    let mut x = 1u64 << shift;
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Square root of a fixed-point number.
///
/// Returns 0 for non-positive inputs.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    if x <= 0 {
        return 0;
    }
    // sqrt(x * 2^16) * 2^8 == sqrt(x) in Q16.16
    isqrt_u64((x as u64) << FIXED_SCALE) as Fixed
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 { x.wrapping_neg() } else { x }
}

/// Minimum of two fixed-point numbers.
#[inline]
pub fn fixed_min(a: Fixed, b: Fixed) -> Fixed {
    if a < b { a } else { b }
}

/// Maximum of two fixed-point numbers.
#[inline]
pub fn fixed_max(a: Fixed, b: Fixed) -> Fixed {
    if a > b { a } else { b }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    fixed_max(min, fixed_min(max, value))
}

/// Linear interpolation: a + (b - a) * t
/// where t is in fixed-point (0.0 = 0, 1.0 = FIXED_ONE)
#[inline]
pub fn fixed_lerp(a: Fixed, b: Fixed, t: Fixed) -> Fixed {
    let diff = b.wrapping_sub(a);
    a.wrapping_add(fixed_mul(diff, t))
}

/// Round a fixed-point number to the nearest integer (halves away from zero).
#[inline]
pub fn fixed_round(x: Fixed) -> i32 {
    if x >= 0 {
        ((x as i64 + FIXED_HALF as i64) >> FIXED_SCALE) as i32
    } else {
        -(((-(x as i64) + FIXED_HALF as i64) >> FIXED_SCALE) as i32)
    }
}

/// Count down a timer by `dt`, never going below zero.
#[inline]
pub fn countdown(timer: Fixed, dt: Fixed) -> Fixed {
    fixed_max(0, timer.saturating_sub(dt))
}

// =============================================================================
// SERDE: fixed-point fields written as decimal numbers
// =============================================================================

/// Serialize/deserialize a `Fixed` as a decimal number.
///
/// Configuration files carry human-readable values (`"max_speed": 6.5`);
/// conversion happens once when the file is loaded.
pub mod decimal {
    use super::{Fixed, FIXED_ONE};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as f64 (exact for every Q16.16 value).
    pub fn serialize<S: Serializer>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*value as f64 / FIXED_ONE as f64)
    }

    /// Deserialize from f64, rounding to the nearest representable value.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fixed, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        let scaled = (raw * FIXED_ONE as f64).round();
        if !scaled.is_finite() || scaled > i32::MAX as f64 || scaled < i32::MIN as f64 {
            return Err(serde::de::Error::custom(format!(
                "value {raw} is outside the Q16.16 range"
            )));
        }
        Ok(scaled as Fixed)
    }

    /// Same as the parent module, for `Option<Fixed>`.
    pub mod option {
        use super::super::{Fixed, FIXED_ONE};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize as optional f64.
        pub fn serialize<S: Serializer>(
            value: &Option<Fixed>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.serialize_some(&(*v as f64 / FIXED_ONE as f64)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize from optional f64.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Fixed>, D::Error> {
            let raw = Option::<f64>::deserialize(deserializer)?;
            raw.map(|raw| {
                let scaled = (raw * FIXED_ONE as f64).round();
                if !scaled.is_finite() || scaled > i32::MAX as f64 || scaled < i32::MIN as f64 {
                    Err(serde::de::Error::custom(format!(
                        "value {raw} is outside the Q16.16 range"
                    )))
                } else {
                    Ok(scaled as Fixed)
                }
            })
            .transpose()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(FIXED_HALF, 32768);
        assert_eq!(FIXED_SCALE, 16);
        assert_eq!(TICK_DURATION, 1092);
        assert_eq!(FALLOFF_DISTANCE, from_int(100));
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.5), FIXED_HALF);
        assert_eq!(to_fixed(2.0), FIXED_ONE * 2);
        assert_eq!(to_fixed(-1.0), -FIXED_ONE);
    }

    #[test]
    fn test_from_f32_rounds() {
        assert_eq!(from_f32(1.0), FIXED_ONE);
        assert_eq!(from_f32(-0.5), -FIXED_HALF);
        assert_eq!(from_f32(f32::NAN), 0);
        assert_eq!(from_f32(1.0e9), FIXED_MAX);
    }

    #[test]
    fn test_fixed_mul() {
        // 2.0 * 3.0 = 6.0
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));

        // 0.5 * 0.5 = 0.25
        assert_eq!(fixed_mul(FIXED_HALF, FIXED_HALF), to_fixed(0.25));

        // Negative: -2.0 * 3.0 = -6.0
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FIXED_ONE, to_fixed(4.0)), to_fixed(0.25));

        // Divide by zero returns 0
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt_u64(0), 0);
        assert_eq!(isqrt_u64(1), 1);
        assert_eq!(isqrt_u64(15), 3);
        assert_eq!(isqrt_u64(16), 4);
        assert_eq!(isqrt_u64(u64::MAX), 4294967295);
    }

    #[test]
    fn test_fixed_sqrt() {
        assert_eq!(fixed_sqrt(to_fixed(4.0)), to_fixed(2.0));
        assert_eq!(fixed_sqrt(FIXED_ONE), FIXED_ONE);
        assert_eq!(fixed_sqrt(0), 0);
        assert_eq!(fixed_sqrt(-FIXED_ONE), 0);

        let two = fixed_sqrt(to_fixed(2.0));
        assert!((two - to_fixed(1.41421356)).abs() <= 1);
    }

    #[test]
    fn test_fixed_round() {
        assert_eq!(fixed_round(to_fixed(2.4)), 2);
        assert_eq!(fixed_round(to_fixed(2.5)), 3);
        assert_eq!(fixed_round(to_fixed(-2.5)), -3);
        assert_eq!(fixed_round(to_fixed(-2.4)), -2);
        assert_eq!(fixed_round(0), 0);
    }

    #[test]
    fn test_countdown_floors_at_zero() {
        assert_eq!(countdown(to_fixed(0.01), TICK_DURATION), 0);
        assert_eq!(countdown(FIXED_ONE, TICK_DURATION), FIXED_ONE - TICK_DURATION);
        assert_eq!(countdown(0, TICK_DURATION), 0);
    }

    #[test]
    fn test_decimal_serde() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "decimal")]
            value: Fixed,
            #[serde(with = "decimal::option", default)]
            maybe: Option<Fixed>,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"value": 6.5, "maybe": 0.25}"#).unwrap();
        assert_eq!(parsed.value, to_fixed(6.5));
        assert_eq!(parsed.maybe, Some(to_fixed(0.25)));

        let parsed: Wrapper = serde_json::from_str(r#"{"value": 1.0}"#).unwrap();
        assert_eq!(parsed.maybe, None);

        assert!(serde_json::from_str::<Wrapper>(r#"{"value": 1e12}"#).is_err());
    }

    #[test]
    fn test_fixed_determinism() {
        // Same inputs must produce same outputs
        for _ in 0..1000 {
            let a = 12345678;
            let b = 87654321;

            assert_eq!(fixed_mul(a, b), fixed_mul(a, b), "Multiplication must be deterministic");
            assert_eq!(fixed_div(a, b), fixed_div(a, b), "Division must be deterministic");
            assert_eq!(fixed_sqrt(a), fixed_sqrt(a), "Square root must be deterministic");
        }
    }
}
