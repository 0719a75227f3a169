//! # Beatline Common Library
//!
//! Shared code for the Beatline event pipeline services:
//! - Database schema, models and settings access
//! - Configuration loading and root folder resolution
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
