//! Shared building blocks for the medical table gateway.
//!
//! - `config`: environment-driven configuration
//! - `errors`: the unified error type and its HTTP mapping
//! - `middleware`: request id propagation
//! - `models`: the table allow-list, records and filters
//! - `response`: response bodies
//! - `utils`: SQL statement assembly

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
