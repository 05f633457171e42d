//! # opcua-node-client
//!
//! Provisions OPC-UA nodes as *things* grouped per server under *channels*
//! of a generic management API, and proxies browse requests to an OPC-UA
//! discovery gateway.
//!
//! ## Features
//! - `http-backend` (default): `reqwest` implementations of the store and gateway
//! - `test-support`: Enables `MockResourceStore`, `MockNotificationSink` and
//!   `MockDiscoveryGateway` via `mockall`

mod config;
mod errors;
mod gateway;
mod model;
mod notify;
mod orchestrator;
mod store;

pub mod backend;

// Stable public API
pub use config::ClientConfig;
pub use errors::{ProvisionError, ProvisionResult, format_status_message, friendly_status_hint};
pub use gateway::DiscoveryGateway;
pub use model::{
    BrowseQuery, BrowseResult, Channel, ChannelsPage, ListQuery, Node, NodeDescriptor, NodeEdit,
    NodeMetadata, OPCUA_TYPE, OpcuaRef, SERVER_GROUPING_NAME, Thing, ThingsPage, id_from_location,
    server_filter, server_grouping,
};
pub use notify::{
    BROWSE_FAILED, BROWSE_FINISHED, NODE_DELETED, NODE_EDITED, NODES_CREATED, NotificationSink,
    TracingNotifier,
};
pub use orchestrator::{
    CleanupHandle, CleanupOutcome, CompensationReport, NodeOrchestrator, ProvisionedNodes,
};
pub use store::ResourceStore;

// Backend re-exports (conditional)
#[cfg(feature = "http-backend")]
pub use backend::http::{HttpDiscoveryGateway, HttpResourceStore};

// Test support re-export
#[cfg(feature = "test-support")]
pub use gateway::MockDiscoveryGateway;
#[cfg(feature = "test-support")]
pub use notify::MockNotificationSink;
#[cfg(feature = "test-support")]
pub use store::MockResourceStore;

/// Wires an orchestrator to the HTTP backends and a tracing notifier.
///
/// # Examples
/// ```no_run
/// # async fn run() -> opcua_node_client::ProvisionResult<()> {
/// use opcua_node_client::{ClientConfig, NodeDescriptor};
///
/// let orchestrator = opcua_node_client::connect(&ClientConfig::from_env())?;
/// let uri = "opc.tcp://plc-1:4840";
/// orchestrator
///     .add_nodes(uri, &[NodeDescriptor::new("Temp", "ns=2;i=10", uri)])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "http-backend")]
pub fn connect(config: &ClientConfig) -> ProvisionResult<NodeOrchestrator> {
    use std::sync::Arc;

    Ok(NodeOrchestrator::new(
        Arc::new(HttpResourceStore::new(config.clone())?),
        Arc::new(TracingNotifier),
        Arc::new(HttpDiscoveryGateway::new(config)?),
    ))
}
