//! service-core: Shared infrastructure for the broker services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

