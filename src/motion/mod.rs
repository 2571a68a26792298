// src/motion/mod.rs - Pen motion: geometry, lift state machine, wiggle and tool change
pub mod geometry;
pub mod pen;
pub mod tools;
pub mod wiggle;

pub use geometry::{LiftState, MovePlan, Point};
pub use pen::{PenController, PenRequest, PenSnapshot};
pub use tools::change_tool;
pub use wiggle::{wiggle, wiggle_pattern};

use crate::hardware::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Channel write failed: {0}")]
    ChannelWrite(#[from] ChannelError),
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Nothing to do")]
    NoOpMove,
}

impl MotionError {
    /// True for outcomes that mean "nothing needed doing" rather than a fault.
    pub fn is_benign(&self) -> bool {
        matches!(self, MotionError::NoOpMove)
    }
}

/// Treat a move that turned out to be unnecessary as done.
pub(crate) fn allow_noop(result: Result<f64, MotionError>) -> Result<(), MotionError> {
    match result {
        Ok(_) | Err(MotionError::NoOpMove) => Ok(()),
        Err(e) => Err(e),
    }
}
