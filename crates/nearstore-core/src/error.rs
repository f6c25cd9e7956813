//! Error types for core item bookkeeping.

use thiserror::Error;

use crate::types::ItemId;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the item registry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("item already registered: {0}")]
    DuplicateItem(ItemId),

    #[error("unknown item: {0}")]
    UnknownItem(ItemId),
}
