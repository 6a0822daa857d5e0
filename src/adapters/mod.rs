//! Adapters - Implementations of port interfaces.
//!
//! - `http` - axum REST surface
//! - `memory` - in-memory question bank and repositories for tests and local runs
//! - `postgres` - sqlx-backed production adapters

pub mod http;
pub mod memory;
pub mod postgres;
