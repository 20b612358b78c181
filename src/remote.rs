//! Remote cart service client contract.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::{
    models::{CartSummary, ProductId, ProductSnapshot, ServerItemId},
    storage::StoredLineItem,
};

/// A line item as returned by the remote cart service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCartItem {
    pub item_id: ServerItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub product: Option<ProductSnapshot>,
}

/// The entire authoritative cart, returned by every successful call.
///
/// The service never returns a delta, and the summary is the server's own:
/// price authority is server-side and the core never recomputes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCartState {
    pub items: Vec<RemoteCartItem>,
    pub summary: CartSummary,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum RemoteCartError {
    /// The server refused the operation (missing item, insufficient stock);
    /// carries the server's message verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The service could not be reached or returned garbage.
    #[error("cart service unreachable: {0}")]
    Unavailable(String),
}

/// Contract boundary to the authoritative server-side cart of an
/// authenticated session.
#[automock]
#[async_trait]
pub trait RemoteCartClient: Send + Sync {
    async fn get_cart(&self) -> Result<RemoteCartState, RemoteCartError>;

    async fn add_item(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<RemoteCartState, RemoteCartError>;

    async fn update_item(
        &self,
        item_id: ServerItemId,
        quantity: u32,
    ) -> Result<RemoteCartState, RemoteCartError>;

    async fn remove_item(&self, item_id: ServerItemId) -> Result<RemoteCartState, RemoteCartError>;

    async fn clear(&self) -> Result<RemoteCartState, RemoteCartError>;

    /// Transfer an anonymous cart's contents into this user's server cart in
    /// one batch.
    async fn merge(&self, items: Vec<StoredLineItem>) -> Result<RemoteCartState, RemoteCartError>;
}
