//! # Built-in subscribers
//!
//! Small, self-contained implementations useful for demos.
//!
//! - [`LogWriter`]: reports feature messages through `tracing`.

mod log;

pub use log::LogWriter;
