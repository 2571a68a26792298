// src/hardware/mod.rs - Physical channel and command sequencer
pub mod loopback;
pub mod serial;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, Duration};

pub use loopback::LoopbackChannel;
pub use serial::SerialChannel;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Serial IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Injected write failure for '{0}'")]
    Injected(String),
}

/// An open, ready-to-write line channel to the motion board.
///
/// The returned string is whatever the board has said since the last write. It is not
/// correlated with the command just written and callers must not treat it as completion.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn write(&self, line: &str) -> Result<String, ChannelError>;
}

/// Servo parameter slots understood by the board's `SC` command.
pub const SERVO_MIN_SLOT: u8 = 4;
pub const SERVO_MAX_SLOT: u8 = 5;
pub const SERVO_RATE_SLOT: u8 = 10;

/// A single text command for the EiBotBoard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalCommand {
    /// `SP,<value>`: the board raises the pen on 1 and lowers it on 0.
    SetPen(u8),
    /// `SM,<duration>,<dx>,<dy>`: relative stepper move.
    Move { duration_ms: u64, dx: i64, dy: i64 },
    /// `SC,<parameter>,<value>`: servo configuration.
    ServoConfig { parameter: u8, value: u32 },
    /// `EM,0,0`: release both steppers.
    DisableMotors,
}

impl PhysicalCommand {
    /// The full line as written to the wire, carriage return included.
    pub fn to_line(&self) -> String {
        format!("{}\r", self)
    }
}

impl fmt::Display for PhysicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalCommand::SetPen(value) => write!(f, "SP,{}", value),
            PhysicalCommand::Move { duration_ms, dx, dy } => {
                write!(f, "SM,{},{},{}", duration_ms, dx, dy)
            }
            PhysicalCommand::ServoConfig { parameter, value } => {
                write!(f, "SC,{},{}", parameter, value)
            }
            PhysicalCommand::DisableMotors => write!(f, "EM,0,0"),
        }
    }
}

/// When a submitted command counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Immediate,
    After(Duration),
}

impl Completion {
    /// `After(ms)` unless the caller asked not to wait.
    pub fn after_ms(ms: u64, immediate: bool) -> Self {
        if immediate {
            Completion::Immediate
        } else {
            Completion::After(Duration::from_millis(ms))
        }
    }
}

/// Statistics for command execution
#[derive(Debug, Clone, Default)]
pub struct SequencerStats {
    pub commands_sent: u64,
    pub write_failures: u64,
    pub bytes_sent: u64,
    pub scheduled_wait: Duration,
}

/// Writes one command at a time to the channel and resolves it by elapsed time.
///
/// The in-flight lock is held from the write until the completion timer fires, so a
/// second command cannot reach the wire while the previous one is still assumed to be
/// moving. The board's reply is never inspected for completion.
pub struct Sequencer {
    channel: Arc<dyn CommandChannel>,
    in_flight: Mutex<()>,
    stats: Mutex<SequencerStats>,
}

/// A command that has been written and whose completion timer has not yet run.
#[must_use = "a turn holds the channel until finished"]
pub struct Turn<'a> {
    _guard: MutexGuard<'a, ()>,
    completion: Completion,
}

impl Turn<'_> {
    pub async fn finish(self) {
        if let Completion::After(wait) = self.completion {
            sleep(wait).await;
        }
    }
}

impl Sequencer {
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            channel,
            in_flight: Mutex::new(()),
            stats: Mutex::new(SequencerStats::default()),
        }
    }

    /// Write `command` and return the pending turn. On a write error no timer is started.
    pub async fn send(
        &self,
        command: &PhysicalCommand,
        completion: Completion,
    ) -> Result<Turn<'_>, ChannelError> {
        let guard = self.in_flight.lock().await;
        let line = command.to_line();
        tracing::debug!("Serial TX: {}", command);

        match self.channel.write(&line).await {
            Ok(response) => {
                if !response.is_empty() {
                    tracing::trace!("Board said {:?} (ignored)", response);
                }
                let mut stats = self.stats.lock().await;
                stats.commands_sent += 1;
                stats.bytes_sent += line.len() as u64;
                if let Completion::After(wait) = completion {
                    stats.scheduled_wait += wait;
                }
                Ok(Turn { _guard: guard, completion })
            }
            Err(e) => {
                tracing::error!("Serial write of '{}' failed: {}", command, e);
                self.stats.lock().await.write_failures += 1;
                Err(e)
            }
        }
    }

    /// Write `command` and wait out its completion.
    pub async fn submit(
        &self,
        command: &PhysicalCommand,
        completion: Completion,
    ) -> Result<(), ChannelError> {
        self.send(command, completion).await?.finish().await;
        Ok(())
    }

    pub async fn get_stats(&self) -> SequencerStats {
        self.stats.lock().await.clone()
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer").finish_non_exhaustive()
    }
}
