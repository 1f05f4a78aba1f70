use async_trait::async_trait;

use crate::error::UpstreamError;

/// Pull-based view of a server-paginated list.
///
/// Each call fetches the next page. `Ok(None)` means the server has no more
/// pages; after that, or after an error, the pager stays exhausted.
#[async_trait]
pub trait Pager: Send {
    type Item: Send;

    async fn next_page(&mut self) -> Result<Option<Vec<Self::Item>>, UpstreamError>;
}
