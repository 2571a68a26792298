//! # cncserver-rs
//!
//! HTTP control server for EiBotBoard-driven pen and brush plotters such as the
//! WaterColorBot. Logical requests (move to a percentage of the paper, lift or lower the
//! brush, dip into a paint well) become timed `SP`/`SM` commands on a serial line, sent
//! one at a time and considered finished once their computed duration has elapsed.

pub mod config;
pub mod hardware;
pub mod motion;
pub mod plotter;
pub mod web;

pub use config::{load_config, Config, ConfigError};
pub use hardware::{CommandChannel, LoopbackChannel, SerialChannel};
pub use motion::{MotionError, PenRequest, PenSnapshot};
pub use plotter::{Plotter, PlotterError, PlotterHandle};
