// src/plotter.rs - Plotter facade and the single worker that serializes all requests
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::Config;
use crate::hardware::{
    CommandChannel, Completion, PhysicalCommand, SequencerStats, SERVO_MAX_SLOT, SERVO_MIN_SLOT,
    SERVO_RATE_SLOT,
};
use crate::motion::{self, MotionError, PenController, PenRequest, PenSnapshot};

#[derive(Debug, Error)]
pub enum PlotterError {
    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),
    #[error("Plotter worker has stopped")]
    WorkerGone,
}

impl PlotterError {
    pub fn is_benign(&self) -> bool {
        matches!(self, PlotterError::Motion(e) if e.is_benign())
    }
}

/// Everything a client can ask of the plotter.
pub struct Plotter {
    config: Arc<Config>,
    pen: PenController,
}

impl Plotter {
    pub fn new(config: Arc<Config>, channel: Arc<dyn CommandChannel>) -> Self {
        let pen = PenController::new(config.clone(), channel);
        Self { config, pen }
    }

    /// Push the servo calibration to the board.
    pub async fn initialize(&self) -> Result<(), MotionError> {
        tracing::info!("Sending EBB config...");
        let servo = &self.config.servo;
        let settings = [
            (SERVO_MIN_SLOT, servo.min),
            (SERVO_MAX_SLOT, servo.max),
            (SERVO_RATE_SLOT, servo.rate),
        ];
        for (parameter, value) in settings {
            self.pen
                .sequencer()
                .submit(&PhysicalCommand::ServoConfig { parameter, value }, Completion::Immediate)
                .await?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> PenSnapshot {
        self.pen.snapshot()
    }

    pub async fn set_pen(&mut self, request: &PenRequest) -> Result<PenSnapshot, MotionError> {
        self.pen.set_pen(request).await
    }

    pub async fn park_pen(&mut self) -> Result<PenSnapshot, MotionError> {
        self.pen.park().await
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.config.tool_names()
    }

    pub async fn change_tool(&mut self, name: &str) -> Result<String, MotionError> {
        motion::change_tool(&mut self.pen, name).await
    }

    pub async fn disable_motors(&self) -> Result<(), MotionError> {
        tracing::info!("Disabling motors");
        self.pen
            .sequencer()
            .submit(&PhysicalCommand::DisableMotors, Completion::Immediate)
            .await?;
        Ok(())
    }

    pub async fn get_stats(&self) -> SequencerStats {
        self.pen.sequencer().get_stats().await
    }

    /// Move the plotter onto its own task and return a handle to it.
    ///
    /// The task runs one request to completion before taking the next, so sub-steps of
    /// two operations never interleave on the wire.
    pub fn spawn(mut self, queue_depth: usize) -> PlotterHandle {
        let (requests, mut request_rx) = mpsc::channel::<PlotterRequest>(queue_depth);
        let handle = PlotterHandle {
            requests,
            pen: self.pen.subscribe(),
            tools: Arc::new(self.list_tools()),
        };

        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                match request {
                    PlotterRequest::SetPen { request, respond_to } => {
                        let _ = respond_to.send(self.set_pen(&request).await);
                    }
                    PlotterRequest::ParkPen { respond_to } => {
                        let _ = respond_to.send(self.park_pen().await);
                    }
                    PlotterRequest::ChangeTool { name, respond_to } => {
                        let _ = respond_to.send(self.change_tool(&name).await);
                    }
                    PlotterRequest::DisableMotors { respond_to } => {
                        let _ = respond_to.send(self.disable_motors().await);
                    }
                }
            }
            let stats = self.get_stats().await;
            tracing::info!(
                "Plotter worker stopped after {} commands, {} bytes, {:?} of scheduled motion ({} write failures)",
                stats.commands_sent,
                stats.bytes_sent,
                stats.scheduled_wait,
                stats.write_failures
            );
        });

        handle
    }
}

/// A request sent to the plotter worker, with the channel to answer on.
#[derive(Debug)]
pub enum PlotterRequest {
    SetPen {
        request: PenRequest,
        respond_to: oneshot::Sender<Result<PenSnapshot, MotionError>>,
    },
    ParkPen {
        respond_to: oneshot::Sender<Result<PenSnapshot, MotionError>>,
    },
    ChangeTool {
        name: String,
        respond_to: oneshot::Sender<Result<String, MotionError>>,
    },
    DisableMotors {
        respond_to: oneshot::Sender<Result<(), MotionError>>,
    },
}

/// Cheap, cloneable access to a spawned [`Plotter`].
#[derive(Debug, Clone)]
pub struct PlotterHandle {
    requests: mpsc::Sender<PlotterRequest>,
    pen: watch::Receiver<PenSnapshot>,
    tools: Arc<Vec<String>>,
}

impl PlotterHandle {
    /// Latest published pen state. Does not wait for queued work.
    pub fn snapshot(&self) -> PenSnapshot {
        self.pen.borrow().clone()
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.tools.as_ref().clone()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, MotionError>>) -> PlotterRequest,
    ) -> Result<T, PlotterError> {
        let (respond_to, response) = oneshot::channel();
        self.requests
            .send(make(respond_to))
            .await
            .map_err(|_| PlotterError::WorkerGone)?;
        let result = response.await.map_err(|_| PlotterError::WorkerGone)?;
        Ok(result?)
    }

    pub async fn set_pen(&self, request: PenRequest) -> Result<PenSnapshot, PlotterError> {
        self.call(|respond_to| PlotterRequest::SetPen { request, respond_to }).await
    }

    pub async fn park_pen(&self) -> Result<PenSnapshot, PlotterError> {
        self.call(|respond_to| PlotterRequest::ParkPen { respond_to }).await
    }

    pub async fn change_tool(&self, name: &str) -> Result<String, PlotterError> {
        let name = name.to_string();
        self.call(|respond_to| PlotterRequest::ChangeTool { name, respond_to }).await
    }

    pub async fn disable_motors(&self) -> Result<(), PlotterError> {
        self.call(|respond_to| PlotterRequest::DisableMotors { respond_to }).await
    }
}
