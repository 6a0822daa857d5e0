//! Response source port (read side).
//!
//! Defines how raw answers reach the engine. Responses are delivered as a
//! forward-only stream so that the matrix builder never holds the full
//! answer table in memory.
//!
//! # Design
//!
//! - **Streaming**: implementations must use a cursor, not a buffered result set
//! - **Raw scores**: normalization happens in the domain, not the adapter

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::analysis::{OptionSelection, RawResponse};
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, RespondentId};

/// Stream of raw responses.
pub type ResponseStream<'a> = BoxStream<'a, Result<RawResponse, DomainError>>;

/// Stream of chosen options.
pub type SelectionStream<'a> = BoxStream<'a, Result<OptionSelection, DomainError>>;

/// Which responses to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseScope {
    /// Every response to an item of the competency.
    Competency(CompetencyId),

    /// Every response to the listed items.
    Items(Vec<ItemId>),

    /// Responses to the listed items by the listed respondents only.
    ItemsForRespondents {
        items: Vec<ItemId>,
        respondents: Vec<RespondentId>,
    },
}

/// Port for streaming responses out of the answer store.
pub trait ResponseSource: Send + Sync {
    /// Streams `(respondent, item, raw score, max score)` records for `scope`.
    fn stream_responses(&self, scope: &ResponseScope) -> ResponseStream<'_>;

    /// Streams option selections for one multiple-choice item.
    fn stream_selections(&self, item_id: &ItemId) -> SelectionStream<'_>;
}
