//! liveleech library crate.
//!
//! This module exposes the capture/segment/remux pipeline for integration
//! testing.

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod remux;
pub mod resolver;
pub mod shutdown;
pub mod utils;
pub mod watcher;

pub use error::{Error, Result};
