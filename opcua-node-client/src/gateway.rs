use crate::errors::ProvisionResult;
use crate::model::{BrowseQuery, BrowseResult};
use async_trait::async_trait;

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

/// Async trait for the external node-discovery gateway.
#[cfg_attr(any(test, feature = "test-support"), automock)]
#[async_trait]
pub trait DiscoveryGateway: Send + Sync {
    /// Browse the address space below `namespace`/`identifier` on a server.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Gateway`](crate::ProvisionError::Gateway)
    /// with the HTTP status and status text. Failures without a response use
    /// status `0` and `"Unknown Error"`.
    async fn browse(&self, query: &BrowseQuery) -> ProvisionResult<BrowseResult>;
}
