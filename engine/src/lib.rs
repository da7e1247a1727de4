//! Tripsquad Engine Library
//!
//! Multi-agent travel planning: three workers share a partitioned memory
//! and are driven through a phased workflow by the conductor. Used by both
//! the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Partitioned associative memory
pub mod memory;

/// Text generation abstraction layer
pub mod llm;

/// Designer, cost analyst and fact checker
pub mod workers;

/// Conductor orchestration module
pub mod conductor;

/// Message bus for inter-worker notices
pub mod message_bus;

/// Database persistence module
pub mod db;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
