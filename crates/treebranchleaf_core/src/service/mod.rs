//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate placement planning and repository calls into editor-level
//!   operations.
//! - Keep per-session editor state out of the pure hierarchy modules.

pub mod session;
pub mod tree_service;
