//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers (recalculate, retire, activate) write through the
//! repositories; query handlers (statistics, reliability, DIF, health) only read.

pub mod handlers;

pub use handlers::{
    ActivateItemCommand, ActivateItemHandler, BatchSummary, CalculateItemStatisticsCommand,
    CalculateItemStatisticsHandler, CalculateReliabilityHandler, FlaggedItemsFilter,
    GetHealthReportHandler, GetItemStatisticsHandler, GetItemStatisticsQuery,
    GetReliabilityHandler, ListFlaggedItemsHandler, RecalculationJob, RecalculationJobConfig,
    RetireItemCommand, RetireItemHandler, RunDifAnalysisCommand, RunDifAnalysisHandler,
};
