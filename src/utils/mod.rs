//! Utility modules for the pipeline
//!
//! - **error**: Error types shared by every stage
//! - **logging**: Tracing subscriber setup

pub mod error; // Error handling
pub mod logging; // Logging setup

pub use error::{EnrichError, Result, TransportError};
pub use logging::{LogFormat, init_logging};
