//! Core support crate for the xenon-emu emulator
//!
//! Holds the pieces every other crate leans on: the error taxonomy,
//! the TOML configuration model and tracing setup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{CpuError, LoaderError, MemoryError};
