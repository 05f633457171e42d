use crate::errors::ProvisionResult;
use crate::model::{Channel, ChannelsPage, ListQuery, Thing, ThingsPage};
use async_trait::async_trait;

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

/// Async trait over the things/channels management API.
///
/// The store is the only shared mutable resource the orchestrator touches.
/// Implementations must not retry on their own: the provisioning protocol
/// decides what happens after a failed step.
#[cfg_attr(any(test, feature = "test-support"), automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read a single thing.
    async fn get_thing(&self, id: &str) -> ProvisionResult<Thing>;

    /// List things matching the discriminator and optional metadata filter.
    async fn get_things(&self, query: &ListQuery) -> ProvisionResult<ThingsPage>;

    /// Create a batch of things; the returned things carry assigned ids.
    ///
    /// # Errors
    /// The batch is all-or-nothing at the store level.
    async fn add_things(&self, things: Vec<Thing>) -> ProvisionResult<Vec<Thing>>;

    /// Replace a thing's name and metadata.
    async fn edit_thing(&self, thing: &Thing) -> ProvisionResult<()>;

    async fn delete_thing(&self, id: &str) -> ProvisionResult<()>;

    /// List channels matching the discriminator and optional metadata filter.
    async fn get_channels(&self, query: &ListQuery) -> ProvisionResult<ChannelsPage>;

    /// Create a channel and return the raw `Location` of the new resource.
    async fn add_channel(&self, channel: &Channel) -> ProvisionResult<String>;

    async fn delete_channel(&self, id: &str) -> ProvisionResult<()>;

    /// Connect every listed thing to every listed channel.
    async fn connect_things(
        &self,
        channel_ids: Vec<String>,
        thing_ids: Vec<String>,
    ) -> ProvisionResult<()>;
}
