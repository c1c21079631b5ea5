//! # bizdir Common Library
//!
//! Shared code for the business directory services:
//! - Error type shared across crates
//! - TOML configuration model and loading
//! - Root folder and API key resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
