//! Reelforge - client for a remote media conversion service
//!
//! Uploads local media, asks the service to fetch remote videos, extract
//! audio or compose short videos from images, and saves the results.
//! Multi-step operations run as jobs with a single observable state.

pub mod artifact;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod materialize;
pub mod transfer;
pub mod validate;
pub mod workflow;

pub use error::{ReelforgeError, Result};
