//! Data models shared across the orchestrator.

pub mod batch;
pub mod config;
pub mod document;
