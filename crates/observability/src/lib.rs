//! Logging setup shared by the brewline binaries.

pub mod logging;

pub use logging::{LogFormat, init};
