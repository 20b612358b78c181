//! Cart synchronization errors.

use thiserror::Error;

use crate::remote::RemoteCartError;

/// Failure result of a cart operation.
///
/// Every public operation of the core returns `Result`; nothing panics and
/// nothing is thrown across the subsystem boundary.
#[derive(Debug, Error)]
pub enum CartSyncError {
    /// Quantity below 1, rejected before any store is touched.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The referenced line item does not exist.
    #[error("cart item not found")]
    ItemNotFound,

    /// The item reference does not match the current session mode, e.g. a
    /// local index presented while authenticated.
    #[error("item reference does not match the current session")]
    InvalidItemRef,

    /// The remote cart service refused the operation; carries the server's
    /// own message (e.g. insufficient stock).
    #[error("{0}")]
    Rejected(String),

    /// The remote cart service could not be reached.
    #[error("cart service unavailable")]
    Remote(#[source] RemoteCartError),
}

impl From<RemoteCartError> for CartSyncError {
    fn from(error: RemoteCartError) -> Self {
        match error {
            RemoteCartError::Rejected(message) => Self::Rejected(message),
            other => Self::Remote(other),
        }
    }
}
