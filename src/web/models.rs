//! Contains the data models for API requests and responses.
//!
//! Pen requests and snapshots are served as-is from [`crate::motion`].

use serde::{Deserialize, Serialize};

/// Plain status message, used for errors and for the motor and tool endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self { status: status.into() }
    }
}

/// Tool names in configuration order.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<String>,
}
