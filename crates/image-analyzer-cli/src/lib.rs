//! Image Analyzer front end: CLI, REPL and optional HTTP server.

pub mod check;
pub mod config;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod repl;
#[cfg(feature = "http")]
pub mod server;

pub use config::{Overrides, Settings};
pub use pipeline::{analyze_file, build_analyzer};
