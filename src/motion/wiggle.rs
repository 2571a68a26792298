//! Brush agitation: a short back-and-forth around a point, ending where it began.

use super::geometry::Point;
use super::pen::PenController;
use super::{allow_noop, MotionError};
use crate::config::WiggleAxis;

/// The absolute targets of a wiggle around `start`, final return included.
///
/// Every phase is offset from `start` itself, not from the previous phase, and the
/// direction toggle flips after every move. For `XY` the phase index cycles through
/// up, down, down, up on toggled moves and right, left, left, right on the others,
/// which traces a diamond.
pub fn wiggle_pattern(start: Point, axis: WiggleAxis, travel: f64, iterations: u32) -> Vec<Point> {
    let mut targets = Vec::with_capacity(iterations as usize + 1);
    let mut toggle = true;

    for i in 0..iterations {
        let mut point = start;
        match axis {
            WiggleAxis::X => point.x += if toggle { travel } else { -travel },
            WiggleAxis::Y => point.y += if toggle { travel } else { -travel },
            WiggleAxis::XY => {
                let outer = matches!(i % 4, 1 | 2);
                match (outer, toggle) {
                    (true, true) => point.y += travel / 2.0,
                    (true, false) => point.x -= travel,
                    (false, true) => point.y -= travel / 2.0,
                    (false, false) => point.x += travel,
                }
            }
        }
        targets.push(point);
        toggle = !toggle;
    }

    targets.push(start);
    targets
}

/// Run a wiggle from the pen's current position, one move at a time.
///
/// Moves that clamp to where the pen already is are skipped; a channel failure stops
/// the wiggle where it is.
pub async fn wiggle(
    pen: &mut PenController,
    axis: WiggleAxis,
    travel: f64,
    iterations: u32,
) -> Result<(), MotionError> {
    let start = pen.position();
    tracing::debug!("Wiggling {:?} by {} x{} around ({}, {})", axis, travel, iterations, start.x, start.y);

    for target in wiggle_pattern(start, axis, travel, iterations) {
        allow_noop(pen.move_absolute(target, false).await)?;
    }
    Ok(())
}
