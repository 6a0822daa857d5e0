//! DIF analysis handlers.

mod run_dif_analysis;

pub use run_dif_analysis::{RunDifAnalysisCommand, RunDifAnalysisHandler};
