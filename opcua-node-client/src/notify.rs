//! User-facing success/error reporting.

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

pub const NODES_CREATED: &str = "OPC-UA Nodes successfully created";
pub const NODE_EDITED: &str = "OPC-UA Node successfully edited";
pub const NODE_DELETED: &str = "OPC-UA Node successfully deleted";
pub const BROWSE_FINISHED: &str = "OPC-UA browsing finished";
pub const BROWSE_FAILED: &str = "Failed to Browse";

/// One-way notification sink (toasts, status bar, log, ...).
///
/// Nothing returned by the sink is consumed by the orchestrator.
#[cfg_attr(any(test, feature = "test-support"), automock)]
pub trait NotificationSink: Send + Sync {
    fn success(&self, title: &str, message: &str);

    fn error(&self, title: &str, message: &str);
}

/// Sink that reports every notification as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn success(&self, title: &str, message: &str) {
        tracing::info!(target: "opcua.notify", title, message, "success");
    }

    fn error(&self, title: &str, message: &str) {
        tracing::warn!(target: "opcua.notify", title, message, "error");
    }
}
