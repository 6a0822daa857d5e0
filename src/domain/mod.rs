//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (ids, errors, fixed-point helpers)
//! - `analysis` - Pure calculators (score matrix, item statistics, reliability, DIF)
//! - `item` - Item statistics record and validity lifecycle
//! - `reliability` - Competency and trait reliability records
//! - `health` - Health report rollup

pub mod analysis;
pub mod foundation;
pub mod health;
pub mod item;
pub mod reliability;
