//! Product enrichment lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::models::{ProductId, ProductSnapshot};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("product lookup unavailable: {0}")]
    Unavailable(String),
}

/// Batch-resolves product ids to display snapshots.
///
/// Ids that cannot be resolved (deleted product, transient miss) are simply
/// absent from the returned map; callers treat absence as "unknown product"
/// and render accordingly.
#[automock]
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn batch_get(
        &self,
        product_ids: Vec<ProductId>,
    ) -> Result<HashMap<ProductId, ProductSnapshot>, LookupError>;
}
