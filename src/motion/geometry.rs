//! Work-area percentages to absolute steps, and straight-line move timing.

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Absolute position in steps from the machine origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftState {
    Lifted = 0,
    Lowered = 1,
}

impl LiftState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Any non-zero magnitude means lowered.
    pub fn from_request(value: i64) -> Self {
        if value != 0 {
            LiftState::Lowered
        } else {
            LiftState::Lifted
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) }
}

/// Convert a percentage of the work area into absolute steps.
///
/// With `park` set the work-area offset is removed again, so 0% lands on the true
/// machine origin rather than the paper corner.
pub fn percent_to_absolute(config: &Config, px: f64, py: f64, park: bool) -> Point {
    let left = config.work_area.left as f64;
    let top = config.work_area.top as f64;
    let width = config.max_area.width as f64;
    let height = config.max_area.height as f64;

    let mut point = Point {
        x: left + (clamp_percent(px) / 100.0) * (width - left),
        y: top + (clamp_percent(py) / 100.0) * (height - top),
    };
    if park {
        point.x -= left;
        point.y -= top;
    }
    point
}

/// Saturate `point` into `[0, max_area]` on both axes.
pub fn clamp_to_bounds(config: &Config, point: Point) -> Point {
    let clamp = |value: f64, max: u32| {
        if value.is_nan() { 0.0 } else { value.clamp(0.0, max as f64) }
    };
    Point {
        x: clamp(point.x, config.max_area.width),
        y: clamp(point.y, config.max_area.height),
    }
}

/// A straight-line move ready to be emitted, before axis inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    /// Clamped destination. Only the rounded delta reaches the board; this is stored as is.
    pub target: Point,
    pub dx: i64,
    pub dy: i64,
    pub distance: f64,
    pub duration_ms: u64,
}

/// Work out the step delta, distance and duration from `current` to `target`.
/// Returns `None` when the rounded delta is zero on both axes.
pub fn plan_move(config: &Config, current: Point, target: Point, lift: LiftState) -> Option<MovePlan> {
    let target = clamp_to_bounds(config, target);
    let dx = (target.x - current.x).round() as i64;
    let dy = (target.y - current.y).round() as i64;
    if dx == 0 && dy == 0 {
        return None;
    }

    let distance = (dx as f64).hypot(dy as f64);
    let speed = match lift {
        LiftState::Lowered => config.draw_speed,
        LiftState::Lifted => config.move_speed,
    };
    let duration_ms = (distance / speed * 1000.0).floor() as u64;

    Some(MovePlan {
        target,
        dx,
        dy,
        distance,
        duration_ms,
    })
}

/// Flip the delta signs to match how the steppers are wired.
pub fn apply_inversion(config: &Config, dx: i64, dy: i64) -> (i64, i64) {
    (
        if config.invert_x { -dx } else { dx },
        if config.invert_y { -dy } else { dy },
    )
}
