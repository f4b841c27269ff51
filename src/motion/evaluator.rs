use std::f64::consts::TAU;

use crate::scene::model::{MotionId, MotionInstance, MotionParams};

/// Default cycles per second when a motion omits `speed`.
pub const DEFAULT_SPEED: f64 = 0.5;
/// Default amplitude multiplier when a motion omits `intensity`.
pub const DEFAULT_INTENSITY: f64 = 0.5;
/// Default orbit radii in viewport pixels.
pub const DEFAULT_ORBIT_RADIUS: (f64, f64) = (40.0, 24.0);
/// Default drip gravity multiplier.
pub const DEFAULT_GRAVITY: f64 = 0.5;

const FLOAT_AMPLITUDE_PX: f64 = 20.0;
const WIGGLE_AMPLITUDE_DEG: f64 = 5.0;
const PULSE_AMPLITUDE: f64 = 0.1;
const DRIP_PX_PER_CYCLE: f64 = 100.0;
const DRIP_LOOP_PX: f64 = 200.0;

/// Accumulated contribution of an entity's motions at one point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionOffset {
    /// Horizontal offset in viewport pixels.
    pub dx: f64,
    /// Vertical offset in viewport pixels.
    pub dy: f64,
    /// Rotation offset in degrees.
    pub d_rot: f64,
    /// Uniform scale multiplier.
    pub d_scale: f64,
}

impl MotionOffset {
    /// No offset, unit scale.
    pub const IDENTITY: Self = Self {
        dx: 0.0,
        dy: 0.0,
        d_rot: 0.0,
        d_scale: 1.0,
    };

    /// `true` when applying this offset leaves a transform unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for MotionOffset {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Fold every enabled motion in list order into one offset at `t_secs`.
///
/// Pure: the result depends only on the inputs, so any `t_secs` (including earlier times) can be
/// sampled in any order.
pub fn evaluate(motions: &[MotionInstance], t_secs: f64) -> MotionOffset {
    motions
        .iter()
        .filter(|m| m.enabled)
        .fold(MotionOffset::IDENTITY, |acc, m| {
            apply(acc, &m.motion_id, &m.params, t_secs)
        })
}

fn apply(mut acc: MotionOffset, id: &MotionId, p: &MotionParams, t: f64) -> MotionOffset {
    let speed = p.speed.unwrap_or(DEFAULT_SPEED);
    let intensity = p.intensity.unwrap_or(DEFAULT_INTENSITY);
    let freq = speed * TAU;

    match id {
        MotionId::Float => acc.dy += (t * freq).sin() * (FLOAT_AMPLITUDE_PX * intensity),
        MotionId::Wiggle => acc.d_rot += (t * freq).sin() * (WIGGLE_AMPLITUDE_DEG * intensity),
        MotionId::Pulse => acc.d_scale *= 1.0 + (t * freq).sin() * (PULSE_AMPLITUDE * intensity),
        MotionId::Orbit => {
            let phase = t * freq + p.phase_offset.unwrap_or(0.0);
            acc.dx += phase.cos() * p.radius_x.unwrap_or(DEFAULT_ORBIT_RADIUS.0);
            acc.dy += phase.sin() * p.radius_y.unwrap_or(DEFAULT_ORBIT_RADIUS.1);
        }
        MotionId::Drip => {
            let fall = (t * speed * DRIP_PX_PER_CYCLE) % DRIP_LOOP_PX;
            acc.dy += fall * p.gravity.unwrap_or(DEFAULT_GRAVITY);
        }
        MotionId::Other(_) => {}
    }
    acc
}

#[cfg(test)]
#[path = "../../tests/unit/motion/evaluator.rs"]
mod tests;
