//! # Core Runtime
//!
//! Ambient infrastructure shared by every crate in the workspace:
//! service configuration, logging setup and the runtime error type.

pub mod config;
pub mod error;
pub mod logging;

pub use config::ServiceConfig;
pub use error::{Error, Result};
