//! ecoNET boiler service
//!
//! Wires the protocol driver to a caching [`coordinator::Coordinator`] and
//! drives it from a periodic poll loop. Configuration comes from a file
//! layered with `BOILERSRV_*` environment variables.

pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod runtime;
pub mod validation;

pub use config::AppConfig;
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use validation::Rejection;
