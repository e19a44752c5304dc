//! Input Capture and Normalization
//!
//! Turns raw device state into one deterministic [`InputRecord`] per tick.
//! Uses lookup table (MOVE_LUT) for exact i8 to Fixed conversion.
//!
//! ## Hook order (per tick)
//!
//! ```text
//! render frame ──► sample_device()   continuous: move axes, camera-forward
//! between ticks ─► accumulate()      one-shot: buttons OR'd, scroll summed
//! tick ──────────► take_record()     sanitize() then mask_extrapolated()
//! ```

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, FIXED_ONE, from_f32, fixed_abs, isqrt_u64};
use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec3::FixedVec3;
use crate::game::state::ActorId;

// =============================================================================
// MOVE LOOKUP TABLE (Critical for Determinism)
// =============================================================================

/// Lookup table for converting i8 move input to Fixed.
///
/// # Why a Lookup Table?
///
/// Converting i8 [-127..+127] to Fixed [-1.0..+1.0] requires:
/// `value * 65536 / 127 = value * 516.0...`
///
/// 516.0 is not an integer, so we use floor division:
/// `(value * 65536) / 127`
///
/// This lookup table precomputes all 256 possible values for
/// deterministic, fast conversion.
///
/// # Special Values
///
/// - Index 128 (-128 as i8) = 0 (represents "no input" / stick released)
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        // Treat as signed: 0..127 = positive, 128..255 = negative (-128..-1)
        let signed = if i < 128 { i } else { i - 256 };

        // -128 is reserved for "no input" -> map to 0
        if signed == -128 {
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Convert i8 move input to Fixed using lookup table.
#[inline]
pub fn move_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

/// Quantize a sampled stick axis in [-1, 1] to i8.
///
/// NaN maps to 0. Never produces the reserved -128.
#[inline]
pub fn quantize_axis(value: f32) -> i8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * 127.0).round() as i8
}

/// Largest deviation from unit length (raw Q16.16 units) that sanitize
/// leaves alone. Renormalization lands well inside this window, which is
/// what makes sanitize idempotent.
pub const LOOK_UNIT_EPSILON: Fixed = 16;

// =============================================================================
// INPUT RECORD
// =============================================================================

/// Input for one actor on one tick.
///
/// Continuous fields (`move_x`, `move_y`, `look`) persist across
/// extrapolated ticks. One-shot fields (`buttons`, `scroll`) are cleared
/// on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Strafe axis: -127 (left) to +127 (right)
    /// -128 = stick released / no input
    pub move_x: i8,

    /// Forward axis: -127 (back) to +127 (forward)
    /// -128 = stick released / no input
    pub move_y: i8,

    /// Transmitted camera-forward. Unit length after sanitize.
    pub look: FixedVec3,

    /// One-shot trigger bits (see the `JUMP`.. `QUICK_SWAP` constants)
    pub buttons: u16,

    /// One-shot weapon scroll steps
    pub scroll: i8,
}

impl Default for InputRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl InputRecord {
    /// Special value indicating no input (stick released)
    pub const NO_INPUT: i8 = -128;

    /// Jump trigger bit
    pub const JUMP: u16 = 0x0001;
    /// Fire trigger bit
    pub const FIRE: u16 = 0x0002;
    /// Manual reload trigger bit
    pub const RELOAD: u16 = 0x0004;
    /// Ability (blink) trigger bit
    pub const ABILITY: u16 = 0x0008;
    /// Select weapon slot 0
    pub const SELECT_PRIMARY: u16 = 0x0010;
    /// Select weapon slot 1
    pub const SELECT_SECONDARY: u16 = 0x0020;
    /// Swap back to the previously held weapon
    pub const QUICK_SWAP: u16 = 0x0040;

    /// Create an idle record looking down +Z.
    pub const fn new() -> Self {
        Self {
            move_x: Self::NO_INPUT,
            move_y: Self::NO_INPUT,
            look: FixedVec3::FORWARD,
            buttons: 0,
            scroll: 0,
        }
    }

    /// Create input with movement direction.
    pub const fn with_movement(move_x: i8, move_y: i8) -> Self {
        Self {
            move_x,
            move_y,
            look: FixedVec3::FORWARD,
            buttons: 0,
            scroll: 0,
        }
    }

    /// Builder: set the look vector.
    pub const fn looking(mut self, look: FixedVec3) -> Self {
        self.look = look;
        self
    }

    /// Builder: OR in trigger bits.
    pub const fn pressing(mut self, buttons: u16) -> Self {
        self.buttons |= buttons;
        self
    }

    /// Builder: set scroll steps.
    pub const fn scrolling(mut self, scroll: i8) -> Self {
        self.scroll = scroll;
        self
    }

    /// Movement axes as Fixed (strafe, forward), via MOVE_LUT.
    #[inline]
    pub fn move_axes(&self) -> (Fixed, Fixed) {
        (move_to_fixed(self.move_x), move_to_fixed(self.move_y))
    }

    /// Check whether a trigger bit is set.
    #[inline]
    pub fn pressed(&self, button: u16) -> bool {
        self.buttons & button != 0
    }

    /// Set or clear a trigger bit.
    #[inline]
    pub fn set_button(&mut self, button: u16, pressed: bool) {
        if pressed {
            self.buttons |= button;
        } else {
            self.buttons &= !button;
        }
    }

    /// Check if jump was pressed this tick.
    #[inline]
    pub fn jump_pressed(&self) -> bool {
        self.pressed(Self::JUMP)
    }

    /// Check if fire was requested this tick.
    #[inline]
    pub fn fire_pressed(&self) -> bool {
        self.pressed(Self::FIRE)
    }

    /// Check if a manual reload was requested this tick.
    #[inline]
    pub fn reload_pressed(&self) -> bool {
        self.pressed(Self::RELOAD)
    }

    /// Check if the ability was activated this tick.
    #[inline]
    pub fn ability_pressed(&self) -> bool {
        self.pressed(Self::ABILITY)
    }

    /// Check if input has any movement.
    #[inline]
    pub fn has_movement(&self) -> bool {
        let (x, y) = self.move_axes();
        x != 0 || y != 0
    }

    /// Any one-shot field set?
    #[inline]
    pub fn has_one_shot(&self) -> bool {
        self.buttons != 0 || self.scroll != 0
    }

    /// Check if this is an idle record (no movement, no triggers).
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.has_movement() && !self.has_one_shot()
    }

    /// Clamp to valid ranges. Pure and idempotent.
    ///
    /// - Move magnitude is rescaled on the quantized axes so that
    ///   `move_x² + move_y² ≤ 127²`; `-128` counts as 0 and is preserved.
    /// - `look` is renormalized only when measurably off unit length. A zero
    ///   look means no direction was transmitted and stays zero; consumers
    ///   fall back to the last-known aim.
    pub fn sanitize(self) -> Self {
        let mut out = self;

        let ax = if self.move_x == Self::NO_INPUT { 0 } else { self.move_x as i32 };
        let ay = if self.move_y == Self::NO_INPUT { 0 } else { self.move_y as i32 };
        let len_sq = (ax * ax + ay * ay) as u64;
        const MAX_SQ: u64 = 127 * 127;
        if len_sq > MAX_SQ {
            // Round the length up so the rescaled axes never overshoot.
            let mut len = isqrt_u64(len_sq);
            if len * len < len_sq {
                len += 1;
            }
            let len = len as i32;
            if self.move_x != Self::NO_INPUT {
                out.move_x = (ax * 127 / len) as i8;
            }
            if self.move_y != Self::NO_INPUT {
                out.move_y = (ay * 127 / len) as i8;
            }
        }

        if !self.look.is_zero() && fixed_abs(self.look.length() - FIXED_ONE) > LOOK_UNIT_EPSILON {
            out.look = self.look.normalize();
        }

        out
    }

    /// Clear every one-shot field. Continuous fields are untouched.
    #[inline]
    pub fn mask_extrapolated(self) -> Self {
        Self {
            buttons: 0,
            scroll: 0,
            ..self
        }
    }

    /// Hash this record.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_i8(self.move_x);
        hasher.update_i8(self.move_y);
        hasher.update_vec3(self.look);
        hasher.update_u16(self.buttons);
        hasher.update_i8(self.scroll);
    }
}

// =============================================================================
// INPUT PIPELINE
// =============================================================================

/// Raw device state sampled once per render frame.
///
/// Floats are fine here: this runs outside Simulate and is quantized
/// before it reaches a record.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceState {
    /// Stick / WASD axes, (strafe, forward) in [-1, 1]
    pub move_axes: [f32; 2],
    /// Camera forward vector
    pub camera_forward: [f32; 3],
}

/// Per-actor input pipeline.
///
/// Holds the latest continuous sample plus the one-shot triggers
/// accumulated since the last tick.
#[derive(Clone, Debug, Default)]
pub struct InputPipeline {
    continuous: InputRecord,
    pending_buttons: u16,
    pending_scroll: i8,
}

impl InputPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook 1: sample continuous device state. Latest sample wins.
    pub fn sample_device(&mut self, device: &DeviceState) {
        let [mx, my] = device.move_axes;
        self.continuous.move_x = quantize_axis(mx);
        self.continuous.move_y = quantize_axis(my);

        let [fx, fy, fz] = device.camera_forward;
        self.continuous.look = FixedVec3::new(from_f32(fx), from_f32(fy), from_f32(fz));
    }

    /// Hook 2: OR-accumulate one-shot triggers so a press shorter than a
    /// tick is never lost. Scroll steps add up (saturating).
    pub fn accumulate(&mut self, buttons: u16, scroll: i8) {
        self.pending_buttons |= buttons;
        self.pending_scroll = self.pending_scroll.saturating_add(scroll);
    }

    /// Triggers accumulated since the last tick.
    pub fn pending_buttons(&self) -> u16 {
        self.pending_buttons
    }

    /// Hooks 3 and 4: build the record for this tick and clear the
    /// accumulator.
    pub fn take_record(&mut self, extrapolated: bool) -> InputRecord {
        let raw = InputRecord {
            buttons: self.pending_buttons,
            scroll: self.pending_scroll,
            ..self.continuous
        };
        self.pending_buttons = 0;
        self.pending_scroll = 0;

        let record = raw.sanitize();
        if extrapolated {
            record.mask_extrapolated()
        } else {
            record
        }
    }
}

// =============================================================================
// INPUT HISTORY
// =============================================================================

/// Delta-compressed input entry.
///
/// Only stored when input CHANGES (not every tick).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDelta {
    /// Tick when this input state began
    pub tick: u32,
    /// The new input state
    pub record: InputRecord,
}

impl InputDelta {
    /// Create new delta entry.
    pub fn new(tick: u32, record: InputRecord) -> Self {
        Self { tick, record }
    }
}

/// Complete confirmed input recording for one actor.
///
/// Used for:
/// - Straight-through replay verification
/// - Offline session replay
/// - Desync diagnostics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputHistory {
    /// Actor identifier
    pub actor_id: ActorId,

    /// Session seed
    pub seed: u64,

    /// Starting tick
    pub start_tick: u32,

    /// Last recorded tick
    pub end_tick: u32,

    /// Delta-compressed input data.
    /// Only stores ticks where input CHANGED.
    deltas: Vec<InputDelta>,

    /// Last recorded input (for delta comparison)
    #[serde(skip)]
    last_record: InputRecord,
}

impl InputHistory {
    /// Create a new history for an actor.
    pub fn new(actor_id: ActorId, seed: u64, start_tick: u32) -> Self {
        Self {
            actor_id,
            seed,
            start_tick,
            end_tick: start_tick,
            deltas: Vec::with_capacity(256),
            last_record: InputRecord::new(),
        }
    }

    /// Record input for a tick.
    ///
    /// Only stores if input changed from previous tick.
    pub fn record(&mut self, tick: u32, record: InputRecord) {
        self.end_tick = tick;

        if record != self.last_record {
            self.deltas.push(InputDelta::new(tick, record));
            self.last_record = record;
        }
    }

    /// Get input at a specific tick.
    ///
    /// Uses binary search for efficiency.
    pub fn get_input_at(&self, tick: u32) -> InputRecord {
        let idx = self.deltas.partition_point(|d| d.tick <= tick);

        if idx == 0 {
            // Before first delta - idle
            InputRecord::new()
        } else {
            self.deltas[idx - 1].record
        }
    }

    /// Get all deltas.
    pub fn deltas(&self) -> &[InputDelta] {
        &self.deltas
    }

    /// Number of delta entries.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Finalize the recording.
    pub fn finalize(&mut self, end_tick: u32) {
        self.end_tick = end_tick;
    }

    /// Hash of the whole recording.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_input_history();
        hasher.update_u32(self.actor_id.0);
        hasher.update_u64(self.seed);
        hasher.update_u32(self.start_tick);
        hasher.update_u32(self.end_tick);
        for delta in &self.deltas {
            hasher.update_u32(delta.tick);
            delta.record.hash_into(&mut hasher);
        }
        hasher.finalize()
    }

    /// Create iterator over all inputs for replay.
    pub fn replay_iter(&self) -> ReplayIterator<'_> {
        ReplayIterator {
            history: self,
            current_tick: self.start_tick,
            delta_idx: 0,
            current: InputRecord::new(),
        }
    }
}

/// Iterator for replaying inputs tick-by-tick.
pub struct ReplayIterator<'a> {
    history: &'a InputHistory,
    current_tick: u32,
    delta_idx: usize,
    current: InputRecord,
}

impl<'a> Iterator for ReplayIterator<'a> {
    type Item = (u32, InputRecord);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_tick > self.history.end_tick {
            return None;
        }

        while self.delta_idx < self.history.deltas.len() {
            let delta = &self.history.deltas[self.delta_idx];
            if delta.tick <= self.current_tick {
                self.current = delta.record;
                self.delta_idx += 1;
            } else {
                break;
            }
        }

        let result = (self.current_tick, self.current);
        self.current_tick += 1;
        Some(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_move_lut_values() {
        assert_eq!(MOVE_LUT[0], 0);
        assert_eq!(MOVE_LUT[127], 65536); // 127 -> +1.0
        assert_eq!(MOVE_LUT[129], -65536); // -127 -> -1.0
        assert_eq!(MOVE_LUT[128], 0); // -128 -> no input

        for i in 1..=127 {
            let pos = MOVE_LUT[i as usize];
            let neg = MOVE_LUT[(256 - i) as usize];
            assert_eq!(pos, -neg, "LUT should be symmetric for {}", i);
        }
    }

    #[test]
    fn test_quantize_axis() {
        assert_eq!(quantize_axis(1.0), 127);
        assert_eq!(quantize_axis(-1.0), -127);
        assert_eq!(quantize_axis(-5.0), -127);
        assert_eq!(quantize_axis(0.0), 0);
        assert_eq!(quantize_axis(f32::NAN), 0);
    }

    #[test]
    fn test_button_bits() {
        let mut record = InputRecord::new();
        assert!(!record.jump_pressed());

        record.set_button(InputRecord::JUMP, true);
        record.set_button(InputRecord::FIRE, true);
        assert!(record.jump_pressed());
        assert!(record.fire_pressed());
        assert!(!record.ability_pressed());

        record.set_button(InputRecord::JUMP, false);
        assert!(!record.jump_pressed());
        assert!(record.fire_pressed());
    }

    #[test]
    fn test_sanitize_clamps_diagonal() {
        let record = InputRecord::with_movement(127, 127).sanitize();
        let (x, y) = (record.move_x as i32, record.move_y as i32);
        assert!(x * x + y * y <= 127 * 127);
        assert_eq!(record.move_x, record.move_y);

        let (fx, fy) = record.move_axes();
        let magnitude = FixedVec3::new(fx, 0, fy).length();
        assert!(magnitude <= FIXED_ONE);
    }

    #[test]
    fn test_sanitize_keeps_no_input_marker() {
        let record = InputRecord::with_movement(InputRecord::NO_INPUT, 127).sanitize();
        assert_eq!(record.move_x, InputRecord::NO_INPUT);
        assert_eq!(record.move_y, 127);
    }

    #[test]
    fn test_sanitize_look() {
        let zero = InputRecord::new().looking(FixedVec3::ZERO).sanitize();
        assert!(zero.look.is_zero());

        let long = InputRecord::new()
            .looking(FixedVec3::new(to_fixed(3.0), 0, to_fixed(4.0)))
            .sanitize();
        assert!(fixed_abs(long.look.length() - FIXED_ONE) <= LOOK_UNIT_EPSILON);

        // Already unit: untouched
        let unit = InputRecord::new().looking(FixedVec3::RIGHT);
        assert_eq!(unit.sanitize(), unit);
    }

    #[test]
    fn test_sanitize_idempotent() {
        let samples = [
            InputRecord::with_movement(127, -127).looking(FixedVec3::new(1, 1, 1)),
            InputRecord::with_movement(-90, 100).looking(FixedVec3::new(to_fixed(0.2), to_fixed(-0.9), 7)),
            InputRecord::with_movement(InputRecord::NO_INPUT, -128).looking(FixedVec3::ZERO),
        ];
        for record in samples {
            let once = record.sanitize();
            assert_eq!(once.sanitize(), once);
        }
    }

    #[test]
    fn test_mask_extrapolated() {
        let record = InputRecord::with_movement(50, -20)
            .looking(FixedVec3::RIGHT)
            .pressing(InputRecord::JUMP | InputRecord::FIRE | InputRecord::ABILITY)
            .scrolling(2);
        let masked = record.mask_extrapolated();

        assert_eq!(masked.buttons, 0);
        assert_eq!(masked.scroll, 0);
        assert_eq!(masked.move_x, 50);
        assert_eq!(masked.move_y, -20);
        assert_eq!(masked.look, FixedVec3::RIGHT);
    }

    #[test]
    fn test_pipeline_accumulates_short_presses() {
        let mut pipeline = InputPipeline::new();
        pipeline.sample_device(&DeviceState {
            move_axes: [0.0, 1.0],
            camera_forward: [0.0, 0.0, 1.0],
        });

        // Two frames between ticks; the jump lasted only the first one.
        pipeline.accumulate(InputRecord::JUMP, 0);
        pipeline.accumulate(InputRecord::FIRE, 1);
        pipeline.accumulate(0, 1);

        let record = pipeline.take_record(false);
        assert!(record.jump_pressed());
        assert!(record.fire_pressed());
        assert_eq!(record.scroll, 2);
        assert_eq!(record.move_y, 127);

        // Accumulator cleared
        let next = pipeline.take_record(false);
        assert_eq!(next.buttons, 0);
        assert_eq!(next.scroll, 0);
        assert_eq!(next.move_y, 127);
    }

    #[test]
    fn test_pipeline_extrapolated_tick() {
        let mut pipeline = InputPipeline::new();
        pipeline.sample_device(&DeviceState {
            move_axes: [1.0, 0.0],
            camera_forward: [1.0, 0.0, 0.0],
        });
        pipeline.accumulate(InputRecord::ABILITY | InputRecord::JUMP, -1);

        let record = pipeline.take_record(true);
        assert!(!record.has_one_shot());
        assert_eq!(record.move_x, 127);
        assert_eq!(record.look, FixedVec3::RIGHT);
    }

    #[test]
    fn test_history_delta_compression() {
        let mut history = InputHistory::new(ActorId(1), 12345, 0);

        let record = InputRecord::with_movement(100, 50);
        for tick in 0..4 {
            history.record(tick, record);
        }
        assert_eq!(history.delta_count(), 1);

        history.record(4, InputRecord::with_movement(-100, -50));
        assert_eq!(history.delta_count(), 2);
    }

    #[test]
    fn test_history_get_at() {
        let mut history = InputHistory::new(ActorId(1), 12345, 0);

        let r1 = InputRecord::with_movement(50, 0);
        let r2 = InputRecord::with_movement(-50, 0);
        let r3 = InputRecord::with_movement(0, 100).pressing(InputRecord::FIRE);

        history.record(10, r1);
        history.record(20, r2);
        history.record(30, r3);

        assert!(history.get_input_at(5).is_idle());
        assert_eq!(history.get_input_at(10), r1);
        assert_eq!(history.get_input_at(15), r1);
        assert_eq!(history.get_input_at(25), r2);
        assert_eq!(history.get_input_at(30), r3);
        assert_eq!(history.get_input_at(100), r3);
    }

    #[test]
    fn test_replay_iterator() {
        let mut history = InputHistory::new(ActorId(3), 12345, 0);

        history.record(0, InputRecord::with_movement(10, 0));
        history.record(3, InputRecord::with_movement(20, 0));
        history.finalize(5);

        let records: Vec<_> = history.replay_iter().collect();

        assert_eq!(records.len(), 6); // Ticks 0-5
        assert_eq!(records[2].1.move_x, 10);
        assert_eq!(records[3].1.move_x, 20);
        assert_eq!(records[5].1.move_x, 20);
    }

    #[test]
    fn test_history_hash_changes_with_content() {
        let mut a = InputHistory::new(ActorId(1), 7, 0);
        let mut b = InputHistory::new(ActorId(1), 7, 0);
        a.record(1, InputRecord::with_movement(1, 0));
        b.record(1, InputRecord::with_movement(1, 0));
        assert_eq!(a.compute_hash(), b.compute_hash());

        b.record(2, InputRecord::with_movement(2, 0));
        assert_ne!(a.compute_hash(), b.compute_hash());
    }
}
