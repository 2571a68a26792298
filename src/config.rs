//! # Plotter Configuration
//!
//! Machine geometry, speeds, servo calibration and tool stations, loaded once at startup
//! and shared read-only for the lifetime of the process.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! name = "WaterColorBot"
//! draw_speed = 2000.0
//! move_speed = 3000.0
//! invert_x = true
//!
//! [max_area]
//! width = 12630
//! height = 7200
//!
//! [work_area]
//! top = 0
//! left = 2450
//!
//! [servo]
//! min = 18000
//! max = 25000
//! rate = 0
//! duration = 200
//!
//! [[tools]]
//! name = "water0"
//! x = 0
//! y = 0
//! wiggle_axis = "y"
//! wiggle_travel = 500
//! wiggle_iterations = 4
//! ```
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use cncserver_rs::config::{Config, WiggleAxis};
//! let toml_str = r#"
//! [[tools]]
//! name = "color0"
//! x = 1620
//! y = 0
//! wiggle_axis = "xy"
//! "#;
//! let config: Config = toml::from_str(toml_str).unwrap();
//! assert_eq!(config.tools[0].wiggle_axis, WiggleAxis::XY);
//! assert_eq!(config.max_area.width, 12630);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Omitting `tools` entirely keeps the built-in WaterColorBot stations.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the plotter, its serial link and the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub max_area: MaxArea,
    #[serde(default)]
    pub work_area: WorkArea,
    /// Steps per second while the pen is lowered.
    #[serde(default = "default_draw_speed")]
    pub draw_speed: f64,
    /// Steps per second while the pen is lifted.
    #[serde(default = "default_move_speed")]
    pub move_speed: f64,
    #[serde(default)]
    pub servo: ServoConfig,
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolConfig>,
    #[serde(default = "default_invert_x")]
    pub invert_x: bool,
    #[serde(default)]
    pub invert_y: bool,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_area: MaxArea::default(),
            work_area: WorkArea::default(),
            draw_speed: default_draw_speed(),
            move_speed: default_move_speed(),
            servo: ServoConfig::default(),
            tools: default_tools(),
            invert_x: default_invert_x(),
            invert_y: false,
            serial: SerialConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Outer physical bound, in steps.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct MaxArea {
    pub width: u32,
    pub height: u32,
}

impl Default for MaxArea {
    fn default() -> Self {
        Self { width: 12630, height: 7200 }
    }
}

/// Offset of the usable paper region inside the max area, in steps.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct WorkArea {
    #[serde(default)]
    pub top: u32,
    #[serde(default)]
    pub left: u32,
}

impl Default for WorkArea {
    fn default() -> Self {
        Self { top: 0, left: 2450 }
    }
}

/// Lift servo calibration sent to the board at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServoConfig {
    /// Lift position (lower numbers lift higher).
    #[serde(default = "default_servo_min")]
    pub min: u32,
    /// Drop position.
    #[serde(default = "default_servo_max")]
    pub max: u32,
    #[serde(default)]
    pub rate: u32,
    /// Milliseconds a full lift or drop is assumed to take.
    #[serde(default = "default_servo_duration")]
    pub duration: u64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min: default_servo_min(),
            max: default_servo_max(),
            rate: 0,
            duration: default_servo_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WiggleAxis {
    X,
    Y,
    XY,
}

/// A fixed physical station (paint well or water dish) the brush can be dipped into.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_wiggle_axis")]
    pub wiggle_axis: WiggleAxis,
    #[serde(default = "default_wiggle_travel")]
    pub wiggle_travel: f64,
    #[serde(default = "default_wiggle_iterations")]
    pub wiggle_iterations: u32,
}

impl ToolConfig {
    fn station(name: &str, x: f64, y: f64, wiggle_axis: WiggleAxis, wiggle_iterations: u32) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            wiggle_axis,
            wiggle_travel: default_wiggle_travel(),
            wiggle_iterations,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Empty means "pick the first available port".
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud: default_baud(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Config {
    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name.clone()).collect()
    }

    /// Validate geometry, speeds and tool table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_area.width == 0 || self.max_area.height == 0 {
            return Err(ConfigError::Invalid("max_area must be non-zero".to_string()));
        }
        if self.work_area.left > self.max_area.width || self.work_area.top > self.max_area.height {
            return Err(ConfigError::Invalid(format!(
                "work_area offset ({}, {}) lies outside max_area {}x{}",
                self.work_area.left, self.work_area.top, self.max_area.width, self.max_area.height
            )));
        }
        if self.draw_speed <= 0.0 || self.move_speed <= 0.0 {
            return Err(ConfigError::Invalid("draw_speed and move_speed must be > 0".to_string()));
        }
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if tool.name.is_empty() {
                return Err(ConfigError::Invalid("tool names cannot be empty".to_string()));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tool '{}'", tool.name)));
            }
        }
        Ok(())
    }
}

/// Read, parse and validate a TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

// Default value functions
fn default_name() -> String { "WaterColorBot".to_string() }
fn default_draw_speed() -> f64 { 2000.0 }
fn default_move_speed() -> f64 { 3000.0 }
fn default_invert_x() -> bool { true }
fn default_servo_min() -> u32 { 18000 }
fn default_servo_max() -> u32 { 25000 }
fn default_servo_duration() -> u64 { 200 }
fn default_wiggle_axis() -> WiggleAxis { WiggleAxis::Y }
fn default_wiggle_travel() -> f64 { 500.0 }
fn default_wiggle_iterations() -> u32 { 4 }
fn default_baud() -> u32 { 9600 }
fn default_port() -> u16 { 4242 }

fn default_tools() -> Vec<ToolConfig> {
    const COLOR_X: f64 = 1620.0;
    let mut tools = vec![
        ToolConfig::station("water0", 0.0, 0.0, WiggleAxis::Y, 4),
        ToolConfig::station("water1", 0.0, 2900.0, WiggleAxis::Y, 4),
        ToolConfig::station("water2", 0.0, 5650.0, WiggleAxis::Y, 4),
    ];
    let color_rows = [0.0, 1050.0, 2000.0, 2950.0, 3750.0, 4750.0, 5650.0, 6550.0];
    for (i, y) in color_rows.into_iter().enumerate() {
        tools.push(ToolConfig::station(&format!("color{}", i), COLOR_X, y, WiggleAxis::XY, 8));
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_watercolorbot() {
        let config = Config::default();
        assert_eq!(config.max_area, MaxArea { width: 12630, height: 7200 });
        assert_eq!(config.work_area, WorkArea { top: 0, left: 2450 });
        assert_eq!(config.tools.len(), 11);
        assert_eq!(config.tool_names()[0], "water0");
        assert_eq!(config.tool_names()[10], "color7");
        assert!(config.invert_x);
        assert!(!config.invert_y);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tool_lookup() {
        let config = Config::default();
        let water1 = config.tool("water1").unwrap();
        assert_eq!((water1.x, water1.y), (0.0, 2900.0));
        assert_eq!(water1.wiggle_axis, WiggleAxis::Y);
        assert!(config.tool("nonexistent").is_none());
    }

    #[test]
    fn rejects_duplicate_tools() {
        let toml_str = r#"
            [[tools]]
            name = "a"
            x = 0
            y = 0

            [[tools]]
            name = "a"
            x = 10
            y = 10
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_work_area_outside_max_area() {
        let mut config = Config::default();
        config.work_area.left = config.max_area.width + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_speed() {
        let mut config = Config::default();
        config.draw_speed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            name = "Tiny"
            draw_speed = 100.0

            [max_area]
            width = 1000
            height = 500

            [work_area]
            left = 100

            [serial]
            path = "/dev/ttyACM0"
            "#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.name, "Tiny");
        assert_eq!(config.max_area.width, 1000);
        assert_eq!(config.work_area.top, 0);
        assert_eq!(config.move_speed, 3000.0);
        assert_eq!(config.serial.path, "/dev/ttyACM0");
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.server.port, 4242);
    }

    #[test]
    fn sample_file_matches_defaults() {
        let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/cncserver.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.tool_names(), defaults.tool_names());
        assert_eq!(config.max_area, defaults.max_area);
        assert_eq!(config.work_area, defaults.work_area);
        assert_eq!(config.servo.duration, defaults.servo.duration);
        assert_eq!(config.invert_x, defaults.invert_x);
        let color4 = config.tool("color4").unwrap();
        assert_eq!((color4.x, color4.y, color4.wiggle_axis), (1620.0, 3750.0, WiggleAxis::XY));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_config("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
