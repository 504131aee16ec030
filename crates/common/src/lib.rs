//! Camlog Common Utilities
//!
//! Shared infrastructure for all camlog crates:
//! - Error types and result aliases
//! - The artifact contract (named output units and the sink seam)
//! - Clock and wall-timestamp utilities
//! - Tracing/logging initialization
//! - Capture defaults

pub mod artifact;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use artifact::*;
pub use clock::*;
pub use config::*;
pub use error::*;
