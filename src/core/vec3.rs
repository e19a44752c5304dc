//! Fixed-Point 3D Vector
//!
//! Deterministic 3D vector operations for movement, ray queries and recoil.
//! All operations use fixed-point arithmetic. Y is up.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_ONE, FIXED_SCALE,
    fixed_mul, fixed_div, fixed_clamp, isqrt_u64,
};

/// 3D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec3 {
    /// X component (Q16.16 fixed-point)
    pub x: Fixed,
    /// Y component (Q16.16 fixed-point), up
    pub y: Fixed,
    /// Z component (Q16.16 fixed-point), forward
    pub z: Fixed,
}

impl FixedVec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Unit vector pointing up (+Y)
    pub const UP: Self = Self { x: 0, y: FIXED_ONE, z: 0 };

    /// Unit vector pointing down (-Y)
    pub const DOWN: Self = Self { x: 0, y: -FIXED_ONE, z: 0 };

    /// Unit vector pointing forward (+Z)
    pub const FORWARD: Self = Self { x: 0, y: 0, z: FIXED_ONE };

    /// Unit vector pointing right (+X)
    pub const RIGHT: Self = Self { x: FIXED_ONE, y: 0, z: 0 };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
            z: z << FIXED_SCALE,
        }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
            z: self.z.wrapping_add(other.z),
        }
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
            z: self.z.wrapping_sub(other.z),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
            z: fixed_mul(self.z, scalar),
        }
    }

    /// Divide by a fixed-point scalar.
    #[inline]
    pub fn div_scalar(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_div(self.x, scalar),
            y: fixed_div(self.y, scalar),
            z: fixed_div(self.z, scalar),
        }
    }

    /// Squared length as a raw Q32.32 value.
    ///
    /// Widened to i64 so vectors longer than ~181 units don't overflow.
    #[inline]
    pub fn length_squared_wide(self) -> i64 {
        let (x, y, z) = (self.x as i64, self.y as i64, self.z as i64);
        x * x + y * y + z * z
    }

    /// Squared length in Q16.16, saturating.
    #[inline]
    pub fn length_squared(self) -> Fixed {
        (self.length_squared_wide() >> FIXED_SCALE).min(i32::MAX as i64) as Fixed
    }

    /// Length (magnitude).
    ///
    /// sqrt of a Q32.32 value is exactly a Q16.16 value, so no rescaling.
    #[inline]
    pub fn length(self) -> Fixed {
        isqrt_u64(self.length_squared_wide() as u64).min(i32::MAX as u64) as Fixed
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        self.sub(other).length()
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    ///
    /// The vector is first rescaled by a power of two so its largest
    /// component sits in [2^16, 2^17). Tiny vectors then normalize as
    /// accurately as large ones and the result is unit length to within a
    /// few raw units.
    pub fn normalize(self) -> Self {
        let (x, y, z) = (self.x as i64, self.y as i64, self.z as i64);
        let largest = x.abs().max(y.abs()).max(z.abs());
        if largest == 0 {
            return Self::ZERO;
        }

        let bits = 64 - largest.leading_zeros() as i32;
        let shift = 17 - bits;
        let rescale = |c: i64| if shift >= 0 { c << shift } else { c >> -shift };
        let (x, y, z) = (rescale(x), rescale(y), rescale(z));

        let len = isqrt_u64((x * x + y * y + z * z) as u64) as i64;
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: ((x << FIXED_SCALE) / len) as Fixed,
            y: ((y << FIXED_SCALE) / len) as Fixed,
            z: ((z << FIXED_SCALE) / len) as Fixed,
        }
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> Fixed {
        let wide = (self.x as i64) * (other.x as i64)
            + (self.y as i64) * (other.y as i64)
            + (self.z as i64) * (other.z as i64);
        (wide >> FIXED_SCALE) as Fixed
    }

    /// Cross product.
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self {
            x: fixed_mul(self.y, other.z).wrapping_sub(fixed_mul(self.z, other.y)),
            y: fixed_mul(self.z, other.x).wrapping_sub(fixed_mul(self.x, other.z)),
            z: fixed_mul(self.x, other.y).wrapping_sub(fixed_mul(self.y, other.x)),
        }
    }

    /// Drop the vertical component.
    #[inline]
    pub fn horizontal(self) -> Self {
        Self { x: self.x, y: 0, z: self.z }
    }

    /// Replace the vertical component.
    #[inline]
    pub fn with_y(self, y: Fixed) -> Self {
        Self { x: self.x, y, z: self.z }
    }

    /// Project onto the plane with the given unit normal.
    #[inline]
    pub fn project_on_plane(self, normal: Self) -> Self {
        self.sub(normal.scale(self.dot(normal)))
    }

    /// Clamp the length to `max`, keeping direction.
    #[inline]
    pub fn clamp_length(self, max: Fixed) -> Self {
        let len = self.length();
        if len <= max || len == 0 {
            return self;
        }
        self.scale(fixed_div(max, len))
    }

    /// Move toward `target` by at most `max_delta`.
    #[inline]
    pub fn move_towards(self, target: Self, max_delta: Fixed) -> Self {
        let diff = target.sub(self);
        let dist = diff.length();
        if dist <= max_delta || dist == 0 {
            return target;
        }
        self.add(diff.scale(fixed_div(max_delta, dist)))
    }

    /// Clamp each component to a range.
    #[inline]
    pub fn clamp(self, min: Fixed, max: Fixed) -> Self {
        Self {
            x: fixed_clamp(self.x, min, max),
            y: fixed_clamp(self.y, min, max),
            z: fixed_clamp(self.z, min, max),
        }
    }

    /// Linear interpolation between two vectors.
    /// t = 0 returns self, t = FIXED_ONE returns other.
    #[inline]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x.wrapping_add(fixed_mul(other.x.wrapping_sub(self.x), t)),
            y: self.y.wrapping_add(fixed_mul(other.y.wrapping_sub(self.y), t)),
            z: self.z.wrapping_add(fixed_mul(other.z.wrapping_sub(self.z), t)),
        }
    }

    /// Negate all components.
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            x: self.x.wrapping_neg(),
            y: self.y.wrapping_neg(),
            z: self.z.wrapping_neg(),
        }
    }

    /// Is this the zero vector?
    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// Convert to float array for rendering.
    #[inline]
    pub fn to_floats(self) -> [f32; 3] {
        [
            self.x as f32 / FIXED_ONE as f32,
            self.y as f32 / FIXED_ONE as f32,
            self.z as f32 / FIXED_ONE as f32,
        ]
    }
}

// Operator overloads for ergonomics
impl Add for FixedVec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec3::add(self, rhs)
    }
}

impl Sub for FixedVec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec3::sub(self, rhs)
    }
}

impl Neg for FixedVec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.negate()
    }
}

impl fmt::Debug for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [fx, fy, fz] = self.to_floats();
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", fx, fy, fz)
    }
}

impl fmt::Display for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [fx, fy, fz] = self.to_floats();
        write!(f, "({:.3}, {:.3}, {:.3})", fx, fy, fz)
    }
}

/// Serialize/deserialize a `FixedVec3` as `[x, y, z]` decimal numbers.
pub mod decimal {
    use super::FixedVec3;
    use crate::core::fixed::{Fixed, FIXED_ONE};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a three-element float array.
    pub fn serialize<S: Serializer>(value: &FixedVec3, serializer: S) -> Result<S::Ok, S::Error> {
        let scale = FIXED_ONE as f64;
        let raw = [value.x as f64 / scale, value.y as f64 / scale, value.z as f64 / scale];
        serde::Serialize::serialize(&raw, serializer)
    }

    /// Deserialize from a three-element float array.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedVec3, D::Error> {
        let raw = <[f64; 3]>::deserialize(deserializer)?;
        let mut out = [0 as Fixed; 3];
        for (slot, value) in out.iter_mut().zip(raw) {
            let scaled = (value * FIXED_ONE as f64).round();
            if !scaled.is_finite() || scaled > i32::MAX as f64 || scaled < i32::MIN as f64 {
                return Err(serde::de::Error::custom(format!(
                    "component {value} is outside the Q16.16 range"
                )));
            }
            *slot = scaled as Fixed;
        }
        Ok(FixedVec3::new(out[0], out[1], out[2]))
    }
}

// =============================================================================
// TESTS
// =============================================================================
