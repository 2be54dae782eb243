mod azure;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::RetrievedPassage;

pub use azure::AzureSearchClient;

/// Similarity search over the wine-review index.
///
/// Implementations return at most `top_k` passages ordered by descending
/// relevance. An empty vector means nothing matched.
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>>;
}
