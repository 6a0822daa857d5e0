//! Psychometric Analysis Engine
//!
//! Classical test theory item statistics, Cronbach's alpha reliability,
//! Mantel-Haenszel DIF analysis and item lifecycle management for an
//! assessment item bank.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
