//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the provider engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its logging
//! conventions, its validated `CoreConfig` and the broadcast channel used to
//! publish provider and token lifecycle events.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
