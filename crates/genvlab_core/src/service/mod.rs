//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry clients into launch-time and API-level operations.
//! - Keep HTTP/CLI layers decoupled from the control protocol.

pub mod provisioner;
pub mod state_service;
