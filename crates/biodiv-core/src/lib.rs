//! Biodiv Core - Domain models, query builders, and configuration
//!
//! This crate contains the filter and query-building logic for biodiversity
//! observation analyses, plus the port definitions the storage adapters implement.
//! Nothing in here talks to a database directly.

pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod formats;
pub mod lookup;
pub mod materialize;
pub mod models;
pub mod ports;
pub mod project;
pub mod query;
pub mod schema;

pub use error::{BiodivError, Result};
