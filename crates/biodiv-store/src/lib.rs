//! Biodiv Store - Adapters for the core ports
//!
//! A PostgreSQL/PostGIS adapter running analysis queries and reading lookup
//! values, plus in-memory adapters for tests and dry runs.

pub mod memory;
pub mod postgres;
