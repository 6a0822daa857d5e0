//! Item statistics command and query handlers.

mod activate_item;
mod calculate_item_statistics;
mod get_item_statistics;
mod retire_item;

pub use activate_item::{ActivateItemCommand, ActivateItemHandler, ActivateItemResult};
pub use calculate_item_statistics::{
    CalculateItemStatisticsCommand, CalculateItemStatisticsHandler, CalculateItemStatisticsResult,
};
pub use get_item_statistics::{
    FlaggedItemsFilter, GetItemStatisticsHandler, GetItemStatisticsQuery, ListFlaggedItemsHandler,
};
pub use retire_item::{RetireItemCommand, RetireItemHandler, RetireItemResult};
