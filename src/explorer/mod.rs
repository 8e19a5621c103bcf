pub mod client;
pub mod paginator;
pub mod rate_limiter;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{Address, RawPage, TransactionCategory};

pub use client::ExplorerClient;
pub use paginator::{CancellationFlag, CategoryFetch, CategoryPaginator, FetchOutcome};
pub use rate_limiter::RequestCadence;

/// Parameters for a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub address: Address,
    pub start_block: u64,
    /// `None` asks for everything up to the provider's latest block
    pub end_block: Option<u64>,
    pub page_size: usize,
}

/// Anything that can serve pages of raw records for one category
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_page(
        &self,
        category: TransactionCategory,
        request: &PageRequest,
    ) -> Result<RawPage, ApiError>;
}
