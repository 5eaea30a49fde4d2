#![deny(missing_docs)]

//! Core library for promptdesk: address extraction, social post generation, and notes.

/// HTTP routing and REST handlers.
pub mod api;
/// Text-generation capability gate, session contract, and providers.
pub mod capability;
/// Environment-driven configuration management.
pub mod config;
/// Sequential address extraction pipeline.
pub mod extraction;
/// Social post generation and section parsing.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Notes CRUD over a flat key-value store.
pub mod notes;
