//! Remote collaborator contract for a board.

use async_trait::async_trait;

use crate::types::{Counts, Page};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{path} returned HTTP {status}")]
    Status { status: u16, path: String },
    #[error("invalid base URL `{0}`")]
    InvalidUrl(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Where a board reads pages and counts from and persists changes to.
///
/// The controller never retries; implementations that want retries must do
/// them internally.
#[async_trait]
pub trait BoardSource<T>: Send + Sync {
    /// Fetch page `page` (1-based) of `stage` with at most `limit` items.
    async fn fetch_page(&self, stage: &str, page: u32, limit: u32) -> Result<Page<T>, SourceError>;

    /// Fetch the total item count per stage.
    async fn fetch_counts(&self) -> Result<Counts, SourceError>;

    /// Persist `item_id` moving into `stage`.
    async fn change_stage(&self, item_id: &str, stage: &str) -> Result<(), SourceError>;

    /// Persist the manual order of `stage`.
    async fn reorder(&self, stage: &str, ordered_ids: &[String]) -> Result<(), SourceError>;
}
