// src/motion/pen.rs - Pen position, lift state and distance tracking
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;

use super::geometry::{apply_inversion, percent_to_absolute, plan_move, LiftState, Point};
use super::MotionError;
use crate::config::Config;
use crate::hardware::{CommandChannel, Completion, PhysicalCommand, Sequencer};

/// Read-only copy of the pen, as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenSnapshot {
    pub x: f64,
    pub y: f64,
    /// 0 = lifted, 1 = lowered.
    pub state: u8,
    pub tool: Option<String>,
    #[serde(rename = "distanceCounter")]
    pub distance_counter: f64,
}

/// Logical pen update. Coordinates are percentages of the work area.
///
/// `x`, `y` and `state` accept numbers or numeric strings. Text that is not a number
/// becomes NaN for coordinates (clamped to 0 later) and 0 for `state`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PenRequest {
    #[serde(deserialize_with = "lenient_coordinate")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "lenient_coordinate")]
    pub y: Option<f64>,
    /// Truncated toward zero, then `min(|state|, 1)`.
    #[serde(deserialize_with = "lenient_state")]
    pub state: Option<i64>,
    pub park: bool,
    pub reset_counter: bool,
    pub ignore_timeout: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl Numeric {
    fn value(self) -> f64 {
        match self {
            Numeric::Number(value) => value,
            Numeric::Flag(flag) => f64::from(u8::from(flag)),
            Numeric::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Numeric>::deserialize(deserializer)?.map(Numeric::value))
}

fn lenient_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Numeric>::deserialize(deserializer)?.map(|raw| {
        let value = raw.value().trunc();
        if value.is_nan() { 0 } else { value.abs().min(1.0) as i64 }
    }))
}

#[derive(Debug, Clone)]
struct Pen {
    position: Point,
    lift: LiftState,
    active_tool: Option<String>,
    distance_counter: f64,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            position: Point::ORIGIN,
            lift: LiftState::Lifted,
            active_tool: None,
            distance_counter: 0.0,
        }
    }
}

/// Sole owner and mutator of the pen. Every change is preceded by a successful write
/// through the sequencer and published to snapshot subscribers right after.
#[derive(Debug)]
pub struct PenController {
    config: Arc<Config>,
    sequencer: Sequencer,
    pen: Pen,
    snapshot_tx: watch::Sender<PenSnapshot>,
}

impl PenController {
    pub fn new(config: Arc<Config>, channel: Arc<dyn CommandChannel>) -> Self {
        let pen = Pen::default();
        let (snapshot_tx, _) = watch::channel(Self::snapshot_of(&pen));
        Self {
            config,
            sequencer: Sequencer::new(channel),
            pen,
            snapshot_tx,
        }
    }

    fn snapshot_of(pen: &Pen) -> PenSnapshot {
        PenSnapshot {
            x: pen.position.x,
            y: pen.position.y,
            state: pen.lift.as_u8(),
            tool: pen.active_tool.clone(),
            distance_counter: pen.distance_counter,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Self::snapshot_of(&self.pen));
    }

    pub fn snapshot(&self) -> PenSnapshot {
        Self::snapshot_of(&self.pen)
    }

    /// Receiver that always holds the latest snapshot, readable without the controller.
    pub fn subscribe(&self) -> watch::Receiver<PenSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn position(&self) -> Point {
        self.pen.position
    }

    pub fn lift_state(&self) -> LiftState {
        self.pen.lift
    }

    pub(crate) fn set_active_tool(&mut self, name: &str) {
        self.pen.active_tool = Some(name.to_string());
        self.publish();
    }

    /// Raise or lower the pen, waiting `servo.duration` ms unless `immediate`.
    pub async fn set_state(&mut self, target: LiftState, immediate: bool) -> Result<LiftState, MotionError> {
        if target == self.pen.lift {
            return Ok(target);
        }

        // The board takes the pen's current value: SP,1 raises a lowered pen, SP,0 drops a lifted one.
        let command = PhysicalCommand::SetPen(self.pen.lift.as_u8());
        let completion = Completion::after_ms(self.config.servo.duration, immediate);
        let turn = self.sequencer.send(&command, completion).await?;

        self.pen.lift = target;
        self.publish();
        turn.finish().await;
        Ok(target)
    }

    /// Move in a straight line to an absolute point, clamped into the machine bounds.
    /// Returns the distance travelled in steps.
    pub async fn move_absolute(&mut self, point: Point, immediate: bool) -> Result<f64, MotionError> {
        let Some(plan) = plan_move(&self.config, self.pen.position, point, self.pen.lift) else {
            tracing::debug!("Move to ({}, {}) needs no movement", point.x, point.y);
            return Err(MotionError::NoOpMove);
        };
        tracing::debug!("Pos change: ({}, {}) over {}ms", plan.dx, plan.dy, plan.duration_ms);

        let (dx, dy) = apply_inversion(&self.config, plan.dx, plan.dy);
        let command = PhysicalCommand::Move { duration_ms: plan.duration_ms, dx, dy };
        let turn = self
            .sequencer
            .send(&command, Completion::after_ms(plan.duration_ms, immediate))
            .await?;

        self.pen.position = plan.target;
        if self.pen.lift == LiftState::Lowered {
            self.pen.distance_counter += plan.distance;
        }
        self.publish();
        turn.finish().await;
        Ok(plan.distance)
    }

    pub fn reset_counter(&mut self) {
        self.pen.distance_counter = 0.0;
        self.publish();
    }

    /// Lift the pen and return it to the machine origin.
    pub async fn park(&mut self) -> Result<PenSnapshot, MotionError> {
        tracing::info!("Parking pen");
        self.set_state(LiftState::Lifted, false).await?;
        if self.pen.position == Point::ORIGIN {
            return Err(MotionError::NoOpMove);
        }
        let origin = percent_to_absolute(&self.config, 0.0, 0.0, true);
        self.move_absolute(origin, false).await?;
        Ok(self.snapshot())
    }

    /// Apply a logical pen request.
    ///
    /// Only one thing happens per request, in this order of precedence: counter reset,
    /// lift change, move. An axis left out of a move keeps its current coordinate.
    pub async fn set_pen(&mut self, request: &PenRequest) -> Result<PenSnapshot, MotionError> {
        if request.reset_counter {
            self.reset_counter();
            return Ok(self.snapshot());
        }

        if let Some(state) = request.state {
            let target = LiftState::from_request(state);
            if target != self.pen.lift {
                self.set_state(target, request.ignore_timeout).await?;
                return Ok(self.snapshot());
            }
        }

        if request.x.is_some() || request.y.is_some() {
            if request.park && self.pen.position == Point::ORIGIN {
                return Err(MotionError::NoOpMove);
            }
            let requested = percent_to_absolute(
                &self.config,
                request.x.unwrap_or(0.0),
                request.y.unwrap_or(0.0),
                request.park,
            );
            let target = Point {
                x: if request.x.is_some() { requested.x } else { self.pen.position.x },
                y: if request.y.is_some() { requested.y } else { self.pen.position.y },
            };
            self.move_absolute(target, request.ignore_timeout).await?;
        }

        Ok(self.snapshot())
    }
}
