//! Wire and domain types.
//!
//! The management API only knows generic *things* and *channels*. OPC-UA
//! nodes and server groupings are views over those resources, told apart by
//! the [`OPCUA_TYPE`] discriminator stored in their metadata.

use crate::errors::{ProvisionError, ProvisionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Metadata discriminator shared by OPC-UA nodes and server groupings.
pub const OPCUA_TYPE: &str = "opcua";

/// Display name of every server grouping channel.
pub const SERVER_GROUPING_NAME: &str = "OPC-UA-Server";

/// Generic named entity in the resource store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    /// Store-assigned identifier; absent on create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Generic named grouping entity in the resource store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Store-assigned identifier; absent on create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

/// One page of a things listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingsPage {
    pub total: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub things: Vec<Thing>,
}

/// One page of a channels listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelsPage {
    pub total: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Paged, discriminated, optionally metadata-filtered listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub offset: u64,
    pub limit: u64,
    pub discriminator: String,
    /// Metadata equality filter, sent as a JSON string.
    pub metadata: Option<Value>,
}

impl ListQuery {
    /// Listing of OPC-UA resources without a metadata filter.
    pub fn opcua(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            discriminator: OPCUA_TYPE.to_string(),
            metadata: None,
        }
    }

    /// First OPC-UA resource referencing `server_uri`, if any.
    pub fn first_for_server(server_uri: &str) -> Self {
        Self {
            metadata: Some(server_filter(server_uri)),
            ..Self::opcua(0, 1)
        }
    }
}

/// Metadata filter matching every resource bound to `server_uri`.
pub fn server_filter(server_uri: &str) -> Value {
    json!({ "serverURI": server_uri })
}

/// OPC-UA specific part of the metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcuaRef {
    #[serde(rename = "serverURI")]
    pub server_uri: String,
    #[serde(rename = "nodeID", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Metadata record of an OPC-UA node thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub opcua: OpcuaRef,
    /// Identifier of the server grouping the node is connected to.
    #[serde(rename = "channelID", default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl NodeMetadata {
    pub fn new(server_uri: &str, node_id: &str, channel_id: Option<String>) -> Self {
        Self {
            kind: OPCUA_TYPE.to_string(),
            opcua: OpcuaRef {
                server_uri: server_uri.to_string(),
                node_id: Some(node_id.to_string()),
            },
            channel_id,
        }
    }
}

/// An OPC-UA node: a thing tagged with [`OPCUA_TYPE`] metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub metadata: NodeMetadata,
}

impl Node {
    pub fn server_uri(&self) -> &str {
        &self.metadata.opcua.server_uri
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.metadata.channel_id.as_deref()
    }

    /// Converts back into the generic store representation.
    pub fn to_thing(&self) -> ProvisionResult<Thing> {
        Ok(Thing {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            metadata: serde_json::to_value(&self.metadata)?,
        })
    }
}

impl TryFrom<&Thing> for Node {
    type Error = ProvisionError;

    fn try_from(thing: &Thing) -> ProvisionResult<Self> {
        let id = thing.id.clone().ok_or_else(|| {
            ProvisionError::MalformedNode(format!("thing {:?} has no id", thing.name))
        })?;
        let metadata: NodeMetadata = serde_json::from_value(thing.metadata.clone())
            .map_err(|e| ProvisionError::MalformedNode(format!("thing {id}: {e}")))?;
        if metadata.kind != OPCUA_TYPE {
            return Err(ProvisionError::MalformedNode(format!(
                "thing {id} has type {:?}, expected {OPCUA_TYPE:?}",
                metadata.kind
            )));
        }
        Ok(Self {
            id,
            name: thing.name.clone(),
            metadata,
        })
    }
}

/// One element of a node provisioning batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    #[serde(rename = "nodeID")]
    pub node_id: String,
    #[serde(rename = "serverURI")]
    pub server_uri: String,
}

impl NodeDescriptor {
    pub fn new(name: &str, node_id: &str, server_uri: &str) -> Self {
        Self {
            name: name.to_string(),
            node_id: node_id.to_string(),
            server_uri: server_uri.to_string(),
        }
    }

    /// Create request for this node, bound to `channel_id`.
    pub fn to_thing(&self, channel_id: &str) -> ProvisionResult<Thing> {
        let metadata = NodeMetadata::new(&self.server_uri, &self.node_id, Some(channel_id.into()));
        Ok(Thing {
            id: None,
            name: self.name.clone(),
            metadata: serde_json::to_value(metadata)?,
        })
    }
}

/// Caller-supplied fields of a node edit.
///
/// The edit is a full replacement: the grouping link (`channelID`) is not
/// part of the rebuilt metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEdit {
    pub id: String,
    pub name: String,
    #[serde(rename = "serverURI")]
    pub server_uri: String,
    #[serde(rename = "nodeID")]
    pub node_id: String,
}

impl NodeEdit {
    pub fn to_thing(&self) -> ProvisionResult<Thing> {
        let metadata = NodeMetadata::new(&self.server_uri, &self.node_id, None);
        Ok(Thing {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            metadata: serde_json::to_value(metadata)?,
        })
    }
}

/// Create request for the grouping channel of `server_uri`.
pub fn server_grouping(server_uri: &str) -> Channel {
    Channel {
        id: None,
        name: SERVER_GROUPING_NAME.to_string(),
        metadata: json!({
            "type": OPCUA_TYPE,
            "opcua": { "serverURI": server_uri },
        }),
    }
}

/// Extracts the new resource id from a `Location` header such as
/// `/channels/<id>`.
pub fn id_from_location(location: &str) -> ProvisionResult<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProvisionError::Location(location.to_string()))
}

/// Node discovery request forwarded to the browse gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseQuery {
    #[serde(rename = "server")]
    pub server_uri: String,
    pub namespace: String,
    pub identifier: String,
}

/// Opaque address-space listing returned by the browse gateway.
pub type BrowseResult = Value;
