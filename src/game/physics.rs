//! Physics Query Seam
//!
//! Movement and hit-scan never touch a live physics engine. They ask
//! deterministic questions through [`PhysicsWorld`]; answers depend only on
//! static geometry plus hurtboxes synced from start-of-tick positions.
//!
//! [`StaticWorld`] is the reference implementation: ground slabs (flat or
//! inclined, bounded in X/Z), axis-aligned boxes, and one body + head
//! sphere per actor. All math is fixed-point with i64 intermediates.

use std::collections::BTreeMap;

use crate::core::fixed::{
    Fixed, FIXED_ONE,
    fixed_div, fixed_mul, fixed_min, fixed_max, isqrt_u64,
};
use crate::core::vec3::FixedVec3;
use crate::game::state::ActorId;

// =============================================================================
// LAYERS
// =============================================================================

/// Bitmask selecting which collider layers a query sees.
pub type ColliderMask = u32;

/// Static level geometry
pub const LAYER_WORLD: ColliderMask = 0x0001;

/// Actor hurtboxes (body and head spheres)
pub const LAYER_HURTBOX: ColliderMask = 0x0002;

/// Everything
pub const LAYER_ALL: ColliderMask = u32::MAX;

/// Which hurtbox volume a ray struck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitboxPart {
    /// Torso/legs sphere
    Body,
    /// Head sphere
    Head,
}

/// Result of a ray or sweep query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayHit {
    /// World-space hit point
    pub position: FixedVec3,
    /// Surface normal at the hit point (unit length)
    pub normal: FixedVec3,
    /// Distance travelled along the ray
    pub distance: Fixed,
    /// Actor owning the struck hurtbox, if any
    pub actor: Option<ActorId>,
    /// Hurtbox volume, if an actor was struck
    pub part: Option<HitboxPart>,
}

// =============================================================================
// QUERY TRAIT
// =============================================================================

/// Deterministic physics queries used by Simulate code.
///
/// Implementations must answer from their own data only. Two worlds with
/// the same geometry and the same synced actors give identical answers.
pub trait PhysicsWorld {
    /// Does a sphere overlap anything on `mask`?
    fn overlap_sphere(&self, center: FixedVec3, radius: Fixed, mask: ColliderMask) -> bool;

    /// Nearest hit along a ray. `direction` must be unit length.
    /// Hurtboxes owned by `ignore` are skipped.
    fn raycast(
        &self,
        origin: FixedVec3,
        direction: FixedVec3,
        max_distance: Fixed,
        mask: ColliderMask,
        ignore: Option<ActorId>,
    ) -> Option<RayHit>;

    /// Sweep an upright capsule standing on `feet` along `direction`.
    /// The reported distance is how far the capsule travels before touching.
    fn sweep_capsule(
        &self,
        feet: FixedVec3,
        direction: FixedVec3,
        distance: Fixed,
        radius: Fixed,
        height: Fixed,
        mask: ColliderMask,
    ) -> Option<RayHit>;

    /// Place an actor's hurtboxes at `feet`.
    fn sync_actor(&mut self, actor: ActorId, feet: FixedVec3);

    /// Remove an actor's hurtboxes.
    fn remove_actor(&mut self, actor: ActorId);
}

// =============================================================================
// STATIC WORLD
// =============================================================================

/// Walkable surface: the half-space `normal · p ≤ offset`, bounded in X/Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slab {
    /// Unit surface normal (pointing out of the solid)
    pub normal: FixedVec3,
    /// Plane offset along the normal
    pub offset: Fixed,
    /// Min X/Z corner of the region the slab covers (y ignored)
    pub min: FixedVec3,
    /// Max X/Z corner of the region the slab covers (y ignored)
    pub max: FixedVec3,
}

impl Slab {
    /// Horizontal floor at height `y` covering the given X/Z rectangle.
    pub fn floor(y: Fixed, min: FixedVec3, max: FixedVec3) -> Self {
        Self { normal: FixedVec3::UP, offset: y, min, max }
    }

    /// Inclined surface through `point` with the given normal.
    pub fn inclined(point: FixedVec3, normal: FixedVec3, min: FixedVec3, max: FixedVec3) -> Self {
        let normal = normal.normalize();
        Self { normal, offset: point.dot(normal), min, max }
    }

    /// Is the X/Z footprint of `p` inside this slab (with `margin`)?
    #[inline]
    fn covers(&self, p: FixedVec3, margin: Fixed) -> bool {
        p.x >= self.min.x - margin
            && p.x <= self.max.x + margin
            && p.z >= self.min.z - margin
            && p.z <= self.max.z + margin
    }

    /// Signed distance from the surface (positive = outside the solid).
    #[inline]
    fn signed_distance(&self, p: FixedVec3) -> Fixed {
        p.dot(self.normal) - self.offset
    }
}

/// Solid axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aabb {
    /// Minimum corner
    pub min: FixedVec3,
    /// Maximum corner
    pub max: FixedVec3,
}

impl Aabb {
    /// Create a box from two corners.
    pub fn new(min: FixedVec3, max: FixedVec3) -> Self {
        Self { min, max }
    }

    fn closest_point(&self, p: FixedVec3) -> FixedVec3 {
        FixedVec3::new(
            fixed_max(self.min.x, fixed_min(self.max.x, p.x)),
            fixed_max(self.min.y, fixed_min(self.max.y, p.y)),
            fixed_max(self.min.z, fixed_min(self.max.z, p.z)),
        )
    }
}

/// Hurtbox dimensions shared by every actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HurtboxShape {
    /// Body sphere radius
    pub body_radius: Fixed,
    /// Body sphere center height above feet
    pub body_height: Fixed,
    /// Head sphere radius
    pub head_radius: Fixed,
    /// Head sphere center height above feet
    pub head_height: Fixed,
}

impl Default for HurtboxShape {
    fn default() -> Self {
        Self {
            body_radius: 32768,   // 0.5
            body_height: 58982,   // 0.9
            head_radius: 16384,   // 0.25
            head_height: 104858,  // 1.6
        }
    }
}

/// Reference static world.
#[derive(Clone, Debug, Default)]
pub struct StaticWorld {
    slabs: Vec<Slab>,
    boxes: Vec<Aabb>,
    hurtbox: HurtboxShape,
    /// Synced actor feet positions (BTreeMap for deterministic order)
    actors: BTreeMap<ActorId, FixedVec3>,
}

impl StaticWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a slab.
    pub fn with_slab(mut self, slab: Slab) -> Self {
        self.slabs.push(slab);
        self
    }

    /// Builder: add a box.
    pub fn with_box(mut self, aabb: Aabb) -> Self {
        self.boxes.push(aabb);
        self
    }

    /// Builder: override hurtbox dimensions.
    pub fn with_hurtbox(mut self, hurtbox: HurtboxShape) -> Self {
        self.hurtbox = hurtbox;
        self
    }

    /// Hurtbox dimensions in use.
    pub fn hurtbox(&self) -> HurtboxShape {
        self.hurtbox
    }

    /// Feet position of a synced actor.
    pub fn actor_position(&self, actor: ActorId) -> Option<FixedVec3> {
        self.actors.get(&actor).copied()
    }

    /// A flat square arena floor at y = 0.
    pub fn flat_arena(half_extent: Fixed) -> Self {
        Self::new().with_slab(Slab::floor(
            0,
            FixedVec3::new(-half_extent, 0, -half_extent),
            FixedVec3::new(half_extent, 0, half_extent),
        ))
    }

    fn ray_vs_slab(slab: &Slab, origin: FixedVec3, dir: FixedVec3, max: Fixed) -> Option<RayHit> {
        let denom = dir.dot(slab.normal);
        if denom >= 0 {
            // Parallel or leaving the surface
            return None;
        }
        let dist_above = slab.signed_distance(origin);
        if dist_above < 0 {
            return None;
        }
        let t = fixed_div(dist_above, -denom);
        if t > max {
            return None;
        }
        let position = origin + dir.scale(t);
        if !slab.covers(position, 0) {
            return None;
        }
        Some(RayHit { position, normal: slab.normal, distance: t, actor: None, part: None })
    }

    fn ray_vs_box(aabb: &Aabb, origin: FixedVec3, dir: FixedVec3, max: Fixed) -> Option<RayHit> {
        let mut t_enter = i32::MIN;
        let mut t_exit = max;
        let mut normal = FixedVec3::ZERO;

        let axes = [
            (origin.x, dir.x, aabb.min.x, aabb.max.x, FixedVec3::RIGHT),
            (origin.y, dir.y, aabb.min.y, aabb.max.y, FixedVec3::UP),
            (origin.z, dir.z, aabb.min.z, aabb.max.z, FixedVec3::FORWARD),
        ];
        for (o, d, lo, hi, axis) in axes {
            if d == 0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let t1 = fixed_div(lo - o, d);
            let t2 = fixed_div(hi - o, d);
            let (near, far, face) = if t1 < t2 { (t1, t2, -axis) } else { (t2, t1, axis) };
            if near > t_enter {
                t_enter = near;
                normal = face;
            }
            t_exit = fixed_min(t_exit, far);
            if t_enter > t_exit {
                return None;
            }
        }

        if t_enter < 0 {
            // Origin inside the box
            return Some(RayHit {
                position: origin,
                normal: -dir,
                distance: 0,
                actor: None,
                part: None,
            });
        }
        Some(RayHit {
            position: origin + dir.scale(t_enter),
            normal,
            distance: t_enter,
            actor: None,
            part: None,
        })
    }

    /// Ray vs sphere in i64 to survive long rays.
    fn ray_vs_sphere(
        center: FixedVec3,
        radius: Fixed,
        origin: FixedVec3,
        dir: FixedVec3,
        max: Fixed,
    ) -> Option<(Fixed, FixedVec3)> {
        let m = origin - center;
        // Q16.16 values held in i64
        let b = ((m.x as i64) * (dir.x as i64)
            + (m.y as i64) * (dir.y as i64)
            + (m.z as i64) * (dir.z as i64))
            >> 16;
        let r = radius as i64;
        let c = (m.length_squared_wide() >> 16) - ((r * r) >> 16);
        if c > 0 && b > 0 {
            return None;
        }
        let disc = ((b * b) >> 16) - c;
        if disc < 0 {
            return None;
        }
        let root = isqrt_u64((disc as u64) << 16) as i64;
        let t = (-b - root).max(0);
        if t > max as i64 {
            return None;
        }
        let t = t as Fixed;
        let position = origin + dir.scale(t);
        Some((t, (position - center).normalize()))
    }
}

impl PhysicsWorld for StaticWorld {
    fn overlap_sphere(&self, center: FixedVec3, radius: Fixed, mask: ColliderMask) -> bool {
        if mask & LAYER_WORLD != 0 {
            for slab in &self.slabs {
                if slab.covers(center, radius) && slab.signed_distance(center) <= radius {
                    return true;
                }
            }
            for aabb in &self.boxes {
                let closest = aabb.closest_point(center);
                if (center - closest).length() <= radius {
                    return true;
                }
            }
        }
        if mask & LAYER_HURTBOX != 0 {
            let shape = self.hurtbox;
            for feet in self.actors.values() {
                let body = feet.with_y(feet.y + shape.body_height);
                let head = feet.with_y(feet.y + shape.head_height);
                if center.distance(body) <= radius + shape.body_radius
                    || center.distance(head) <= radius + shape.head_radius
                {
                    return true;
                }
            }
        }
        false
    }

    fn raycast(
        &self,
        origin: FixedVec3,
        direction: FixedVec3,
        max_distance: Fixed,
        mask: ColliderMask,
        ignore: Option<ActorId>,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |hit: RayHit| {
            if best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        };

        if mask & LAYER_WORLD != 0 {
            for slab in &self.slabs {
                if let Some(hit) = Self::ray_vs_slab(slab, origin, direction, max_distance) {
                    consider(hit);
                }
            }
            for aabb in &self.boxes {
                if let Some(hit) = Self::ray_vs_box(aabb, origin, direction, max_distance) {
                    consider(hit);
                }
            }
        }

        if mask & LAYER_HURTBOX != 0 {
            let shape = self.hurtbox;
            for (id, feet) in &self.actors {
                if Some(*id) == ignore {
                    continue;
                }
                // Head first so an exact tie resolves as a headshot
                let volumes = [
                    (HitboxPart::Head, shape.head_height, shape.head_radius),
                    (HitboxPart::Body, shape.body_height, shape.body_radius),
                ];
                for (part, height, radius) in volumes {
                    let center = feet.with_y(feet.y + height);
                    if let Some((t, normal)) =
                        Self::ray_vs_sphere(center, radius, origin, direction, max_distance)
                    {
                        consider(RayHit {
                            position: origin + direction.scale(t),
                            normal,
                            distance: t,
                            actor: Some(*id),
                            part: Some(part),
                        });
                    }
                }
            }
        }

        best
    }

    fn sweep_capsule(
        &self,
        feet: FixedVec3,
        direction: FixedVec3,
        distance: Fixed,
        radius: Fixed,
        height: Fixed,
        mask: ColliderMask,
    ) -> Option<RayHit> {
        // Approximate the capsule with three rays (bottom, middle, top of the
        // shaft), each extended by the radius so the leading surface is tested.
        let heights = [radius, height >> 1, fixed_max(radius, height - radius)];
        let mut best: Option<RayHit> = None;
        for h in heights {
            let origin = feet.with_y(feet.y + h);
            if let Some(mut hit) =
                self.raycast(origin, direction, distance + radius, mask & LAYER_WORLD, None)
            {
                hit.distance = fixed_max(0, hit.distance - radius);
                if best.map_or(true, |b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    fn sync_actor(&mut self, actor: ActorId, feet: FixedVec3) {
        self.actors.insert(actor, feet);
    }

    fn remove_actor(&mut self, actor: ActorId) {
        self.actors.remove(&actor);
    }
}

/// Height of an inclined slab above `(x, z)`, for placing actors on slopes.
pub fn slab_height_at(slab: &Slab, x: Fixed, z: Fixed) -> Fixed {
    // n.x*x + n.y*y + n.z*z = offset  =>  y = (offset - n.x*x - n.z*z) / n.y
    if slab.normal.y == 0 {
        return 0;
    }
    let rest = slab.offset - fixed_mul(slab.normal.x, x) - fixed_mul(slab.normal.z, z);
    fixed_div(rest, slab.normal.y)
}

/// Is `v` unit length within a small tolerance?
#[inline]
pub fn is_unit(v: FixedVec3) -> bool {
    (v.length() - FIXED_ONE).abs() <= 64
}

// =============================================================================
// TESTS
// =============================================================================
