//! Node provisioning and deprovisioning protocols.
//!
//! Every operation is a short, strictly sequenced saga over the resource
//! store. Nothing is atomic: concurrent calls for the same server URI may
//! interleave, and two of them may both observe "no grouping" and create one
//! each. Compensation and orphan cleanup are best-effort; their failures are
//! logged and never escalated.

use crate::errors::{ProvisionError, ProvisionResult, format_status_message};
use crate::gateway::DiscoveryGateway;
use crate::model::{
    BrowseQuery, BrowseResult, ListQuery, Node, NodeDescriptor, NodeEdit, Thing, ThingsPage,
    id_from_location, server_grouping,
};
use crate::notify::{
    BROWSE_FAILED, BROWSE_FINISHED, NODE_DELETED, NODE_EDITED, NODES_CREATED, NotificationSink,
};
use crate::store::ResourceStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Outcome of a successful [`NodeOrchestrator::add_nodes`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedNodes {
    /// Grouping the new nodes are connected to.
    pub channel_id: String,
    /// Whether this call created the grouping (as opposed to reusing one).
    pub grouping_created: bool,
    /// Created things, with store-assigned ids.
    pub nodes: Vec<Thing>,
}

/// What best-effort compensation managed to undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub deleted: Vec<String>,
    /// `(thing id, error)` for every delete that failed.
    pub failed: Vec<(String, String)>,
}

impl CompensationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of the orphan-grouping cleanup that follows a node deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// No node referenced the server any more; the grouping was deleted.
    Removed(String),
    /// Other nodes still reference the server; the grouping was kept.
    Retained,
    /// The deleted node carried no `channelID`, nothing to remove.
    Skipped,
    /// A store call failed; the grouping may now be orphaned.
    Failed(String),
}

/// Handle to the background orphan-grouping cleanup.
///
/// Dropping the handle detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct CleanupHandle(JoinHandle<CleanupOutcome>);

impl CleanupHandle {
    /// Waits for the cleanup to finish.
    pub async fn outcome(self) -> ProvisionResult<CleanupOutcome> {
        Ok(self.0.await?)
    }
}

/// Provisions OPC-UA nodes on top of the things/channels store.
///
/// Holds no state besides the collaborator handles, so it is cheap to clone
/// and share across tasks.
#[derive(Clone)]
pub struct NodeOrchestrator {
    store: Arc<dyn ResourceStore>,
    notifier: Arc<dyn NotificationSink>,
    gateway: Arc<dyn DiscoveryGateway>,
}

impl NodeOrchestrator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        notifier: Arc<dyn NotificationSink>,
        gateway: Arc<dyn DiscoveryGateway>,
    ) -> Self {
        Self {
            store,
            notifier,
            gateway,
        }
    }

    pub async fn get_node(&self, id: &str) -> ProvisionResult<Thing> {
        self.store.get_thing(id).await
    }

    /// One page of OPC-UA node things.
    pub async fn get_nodes(&self, offset: u64, limit: u64) -> ProvisionResult<ThingsPage> {
        self.store.get_things(&ListQuery::opcua(offset, limit)).await
    }

    /// Creates `nodes` under the grouping of `server_uri`, creating the
    /// grouping first if the server has none.
    ///
    /// If connecting the new nodes fails, every created node is deleted again
    /// (best-effort) and the connect error is returned. The grouping is kept
    /// even when this call created it.
    #[tracing::instrument(
        name = "opcua.add_nodes",
        skip(self, nodes),
        fields(server_uri = %server_uri, count = nodes.len())
    )]
    pub async fn add_nodes(
        &self,
        server_uri: &str,
        nodes: &[NodeDescriptor],
    ) -> ProvisionResult<ProvisionedNodes> {
        if nodes.is_empty() {
            return Err(ProvisionError::InvalidInput(
                "at least one node is required".into(),
            ));
        }

        let (channel_id, grouping_created) = self.resolve_grouping(server_uri).await?;
        let created = self.create_and_connect(&channel_id, server_uri, nodes).await?;

        tracing::info!(
            channel_id = %channel_id,
            count = created.len(),
            grouping_created,
            "OPC-UA nodes provisioned"
        );
        self.notifier.success(NODES_CREATED, "");

        Ok(ProvisionedNodes {
            channel_id,
            grouping_created,
            nodes: created,
        })
    }

    /// Returns the grouping id for `server_uri` and whether it was created.
    async fn resolve_grouping(&self, server_uri: &str) -> ProvisionResult<(String, bool)> {
        let page = self
            .store
            .get_channels(&ListQuery::first_for_server(server_uri))
            .await?;

        if page.total == 0 {
            let location = self.store.add_channel(&server_grouping(server_uri)).await?;
            let channel_id = id_from_location(&location)?;
            tracing::info!(channel_id = %channel_id, "Server grouping created");
            return Ok((channel_id, true));
        }

        let channel_id = page
            .channels
            .into_iter()
            .next()
            .and_then(|chan| chan.id)
            .ok_or_else(|| {
                ProvisionError::Inconsistent(format!(
                    "{} grouping(s) reported for {server_uri} but none listed",
                    page.total
                ))
            })?;
        tracing::debug!(channel_id = %channel_id, "Reusing server grouping");
        Ok((channel_id, false))
    }

    async fn create_and_connect(
        &self,
        channel_id: &str,
        server_uri: &str,
        nodes: &[NodeDescriptor],
    ) -> ProvisionResult<Vec<Thing>> {
        let requests = nodes
            .iter()
            .inspect(|node| {
                if node.server_uri != server_uri {
                    tracing::debug!(
                        node = %node.name,
                        node_server_uri = %node.server_uri,
                        "Node server URI differs from batch server URI"
                    );
                }
            })
            .map(|node| node.to_thing(channel_id))
            .collect::<ProvisionResult<Vec<_>>>()?;

        let created = self.store.add_things(requests).await?;
        let ids: Vec<String> = created.iter().filter_map(|t| t.id.clone()).collect();

        if ids.len() != nodes.len() {
            self.compensate(&ids).await;
            return Err(ProvisionError::Inconsistent(format!(
                "requested {} things, store returned {} with {} ids",
                nodes.len(),
                created.len(),
                ids.len()
            )));
        }

        if let Err(err) = self
            .store
            .connect_things(vec![channel_id.to_string()], ids.clone())
            .await
        {
            tracing::warn!(error = %err, channel_id = %channel_id, "Connect failed, compensating");
            self.compensate(&ids).await;
            return Err(err);
        }

        Ok(created)
    }

    /// Deletes every listed thing, one by one. Never fails.
    async fn compensate(&self, ids: &[String]) -> CompensationReport {
        let mut report = CompensationReport::default();
        for id in ids {
            match self.store.delete_thing(id).await {
                Ok(()) => report.deleted.push(id.clone()),
                Err(err) => {
                    tracing::warn!(thing_id = %id, error = %err, "Compensating delete failed");
                    report.failed.push((id.clone(), err.to_string()));
                }
            }
        }

        if report.is_complete() {
            tracing::info!(deleted = report.deleted.len(), "Compensation complete");
        } else {
            tracing::warn!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Compensation left orphaned things"
            );
        }
        report
    }

    /// Replaces a node's name and metadata.
    ///
    /// The rebuilt metadata carries no `channelID`; the store's full-replace
    /// semantics drop the grouping link unless the store keeps it itself.
    #[tracing::instrument(name = "opcua.edit_node", skip(self, edit), fields(node_id = %edit.id))]
    pub async fn edit_node(&self, edit: &NodeEdit) -> ProvisionResult<()> {
        let thing = edit.to_thing()?;
        tracing::debug!("Edit replaces metadata without channelID");
        self.store.edit_thing(&thing).await?;
        self.notifier.success(NODE_EDITED, "");
        Ok(())
    }

    /// Deletes a node, then removes its grouping in the background if no
    /// other node references the same server.
    ///
    /// Success is reported as soon as the node itself is gone; the returned
    /// handle can be awaited for the cleanup outcome or simply dropped.
    #[tracing::instrument(
        name = "opcua.delete_node",
        skip(self, node),
        fields(node_id = %node.id, server_uri = %node.server_uri())
    )]
    pub async fn delete_node(&self, node: &Node) -> ProvisionResult<CleanupHandle> {
        self.store.delete_thing(&node.id).await?;

        let span = tracing::info_span!(
            "opcua.cleanup_grouping",
            server_uri = %node.server_uri(),
            channel_id = node.channel_id().unwrap_or_default(),
        );
        let task = tokio::spawn(
            cleanup_orphan_grouping(
                Arc::clone(&self.store),
                node.server_uri().to_string(),
                node.metadata.channel_id.clone(),
            )
            .instrument(span),
        );

        self.notifier.success(NODE_DELETED, "");
        Ok(CleanupHandle(task))
    }

    /// Proxies a browse request to the discovery gateway.
    #[tracing::instrument(name = "opcua.browse", skip(self))]
    pub async fn browse_server_nodes(
        &self,
        server_uri: &str,
        namespace: &str,
        identifier: &str,
    ) -> ProvisionResult<BrowseResult> {
        let query = BrowseQuery {
            server_uri: server_uri.to_string(),
            namespace: namespace.to_string(),
            identifier: identifier.to_string(),
        };

        match self.gateway.browse(&query).await {
            Ok(result) => {
                self.notifier.success(BROWSE_FINISHED, "");
                Ok(result)
            }
            Err(err) => {
                let message = match &err {
                    ProvisionError::Gateway {
                        status,
                        status_text,
                    } => format_status_message(*status, status_text),
                    _ => format_status_message(0, "Unknown Error"),
                };
                tracing::warn!(error = %err, "Browse failed");
                self.notifier.error(BROWSE_FAILED, &message);
                Err(err)
            }
        }
    }
}

async fn cleanup_orphan_grouping(
    store: Arc<dyn ResourceStore>,
    server_uri: String,
    channel_id: Option<String>,
) -> CleanupOutcome {
    let query = ListQuery::first_for_server(&server_uri);
    let remaining = match store.get_things(&query).await {
        Ok(page) => page.total,
        Err(err) => {
            tracing::warn!(error = %err, "Could not count remaining nodes");
            return CleanupOutcome::Failed(err.to_string());
        }
    };

    if remaining > 0 {
        tracing::debug!(remaining, "Grouping still referenced");
        return CleanupOutcome::Retained;
    }

    let Some(channel_id) = channel_id else {
        tracing::warn!("Last node had no channelID, grouping left in place");
        return CleanupOutcome::Skipped;
    };

    match store.delete_channel(&channel_id).await {
        Ok(()) => {
            tracing::info!(channel_id = %channel_id, "Orphaned grouping removed");
            CleanupOutcome::Removed(channel_id)
        }
        Err(err) => {
            tracing::warn!(channel_id = %channel_id, error = %err, "Orphaned grouping not removed");
            CleanupOutcome::Failed(err.to_string())
        }
    }
}
