//! Basic library shared by the ecoNET crates
//!
//! Provides:
//! - logging initialization and runtime level control
//! - graceful shutdown signal handling
//! - service bootstrap helpers (banner, development env)
//! - hex formatting for frame dumps

pub mod hex;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

// Re-export common dependencies
pub use anyhow;
pub use tokio;
