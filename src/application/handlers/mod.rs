//! Application handlers.
//!
//! Command and query handlers that orchestrate the calculators over the ports,
//! plus the scheduled recalculation job.

pub mod batch;
pub mod dif;
pub mod health;
pub mod item;
pub mod recalculation_job;
pub mod reliability;

pub use batch::BatchSummary;
pub use dif::{RunDifAnalysisCommand, RunDifAnalysisHandler};
pub use health::GetHealthReportHandler;
pub use item::{
    ActivateItemCommand, ActivateItemHandler, ActivateItemResult, CalculateItemStatisticsCommand,
    CalculateItemStatisticsHandler, CalculateItemStatisticsResult, FlaggedItemsFilter,
    GetItemStatisticsHandler, GetItemStatisticsQuery, ListFlaggedItemsHandler, RetireItemCommand,
    RetireItemHandler, RetireItemResult,
};
pub use recalculation_job::{RecalculationJob, RecalculationJobConfig};
pub use reliability::{CalculateReliabilityHandler, GetReliabilityHandler};
