//! HTTP adapter for psychometric endpoints.
//!
//! Exposes the engine via REST API:
//! - `GET /api/items/:item_id/statistics` - Stored item statistics
//! - `GET /api/items/requiring-review` - Items flagged for review
//! - `GET /api/items/problematic` - Items with severe flags
//! - `POST /api/items/:item_id/statistics/recalculate` - Recompute one item
//! - `POST /api/items/:item_id/retire` - Manual retirement
//! - `POST /api/items/:item_id/activate` - Manual activation
//! - `GET /api/reliability/competencies/:competency_id` - Competency alpha
//! - `GET /api/reliability/traits/:trait_id` - Trait alpha
//! - `POST /api/dif-analysis` - Mantel-Haenszel DIF
//! - `GET /api/health-report` - Bank health snapshot

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, PsychometricsAppState};
pub use routes::psychometrics_router;
