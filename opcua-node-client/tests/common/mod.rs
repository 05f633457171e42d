//! Common test utilities for the HTTP backend tests
//!
//! Provides an in-process fake of the management API and the browse
//! gateway, plus a notification sink that records what it is told.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use opcua_node_client::{
    Channel, ChannelsPage, ClientConfig, HttpDiscoveryGateway, HttpResourceStore,
    NodeOrchestrator, NotificationSink, Thing, ThingsPage,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct FakeState {
    pub things: BTreeMap<String, Thing>,
    pub channels: BTreeMap<String, Channel>,
    /// `(channel id, thing id)` pairs recorded by `/connect`.
    pub connections: Vec<(String, String)>,
    pub next_id: u64,
    pub fail_connect: bool,
    pub browse_status: Option<StatusCode>,
    /// Raw body served by `/browse` instead of the JSON listing.
    pub browse_body: Option<String>,
    pub browse_queries: Vec<BTreeMap<String, String>>,
    pub auth_headers: Vec<String>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

pub type Shared = Arc<Mutex<FakeState>>;

/// A running fake API; dropped with the test runtime.
pub struct FakeApi {
    pub state: Shared,
    pub base_url: String,
}

impl FakeApi {
    pub async fn start() -> Self {
        init_tracing();
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/things", get(list_things))
            .route("/things/bulk", post(add_things))
            .route(
                "/things/{id}",
                get(get_thing).put(edit_thing).delete(delete_thing),
            )
            .route("/channels", get(list_channels).post(add_channel))
            .route("/channels/{id}", axum::routing::delete(delete_channel))
            .route("/connect", post(connect))
            .route("/browse", get(browse))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API");
        let addr = listener.local_addr().expect("No local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake API crashed");
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone(), format!("{}/browse", self.base_url))
    }

    pub fn orchestrator(&self, notifier: Arc<RecordingNotifier>) -> NodeOrchestrator {
        self.orchestrator_with(&self.config(), notifier)
    }

    pub fn orchestrator_with(
        &self,
        config: &ClientConfig,
        notifier: Arc<RecordingNotifier>,
    ) -> NodeOrchestrator {
        NodeOrchestrator::new(
            Arc::new(HttpResourceStore::new(config.clone()).expect("store")),
            notifier,
            Arc::new(HttpDiscoveryGateway::new(config).expect("gateway")),
        )
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake state poisoned");
        f(&mut state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String, String),
    Error(String, String),
}

/// Notification sink that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices poisoned").clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn success(&self, title: &str, message: &str) {
        self.notices
            .lock()
            .expect("notices poisoned")
            .push(Notice::Success(title.into(), message.into()));
    }

    fn error(&self, title: &str, message: &str) {
        self.notices
            .lock()
            .expect("notices poisoned")
            .push(Notice::Error(title.into(), message.into()));
    }
}

#[derive(Deserialize)]
struct ListParams {
    offset: u64,
    limit: u64,
    #[serde(rename = "type")]
    kind: String,
    metadata: Option<String>,
}

/// Equality filter over top-level and `opcua` nested metadata keys.
fn matches(metadata: &Value, params: &ListParams) -> bool {
    if metadata["type"] != params.kind.as_str() {
        return false;
    }
    let Some(raw) = &params.metadata else {
        return true;
    };
    let filter: Value = serde_json::from_str(raw).expect("metadata filter is not JSON");
    filter
        .as_object()
        .expect("metadata filter is not an object")
        .iter()
        .all(|(k, v)| metadata.get(k) == Some(v) || metadata["opcua"].get(k) == Some(v))
}

fn record_auth(state: &mut FakeState, headers: &HeaderMap) {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        state
            .auth_headers
            .push(value.to_str().unwrap_or_default().to_string());
    }
}

async fn list_things(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Json<ThingsPage> {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    let matching: Vec<Thing> = state
        .things
        .values()
        .filter(|t| matches(&t.metadata, &params))
        .cloned()
        .collect();
    Json(ThingsPage {
        total: matching.len() as u64,
        offset: params.offset,
        limit: params.limit,
        things: matching
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect(),
    })
}

async fn add_things(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(things): Json<Vec<Thing>>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    record_auth(&mut state, &headers);
    let mut created = Vec::new();
    for mut thing in things {
        let id = state.next_id("thing");
        thing.id = Some(id.clone());
        state.things.insert(id, thing.clone());
        created.push(thing);
    }
    (StatusCode::CREATED, Json(json!({ "things": created })))
}

async fn get_thing(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    match state.things.get(&id) {
        Some(thing) => Json(thing.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Deserialize)]
struct ThingUpdate {
    name: String,
    metadata: Value,
}

async fn edit_thing(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(update): Json<ThingUpdate>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    match state.things.get_mut(&id) {
        Some(thing) => {
            thing.name = update.name;
            thing.metadata = update.metadata;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_thing(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.things.remove(&id);
    state.connections.retain(|(_, thing)| *thing != id);
    StatusCode::NO_CONTENT
}

async fn list_channels(
    State(state): State<Shared>,
    Query(params): Query<ListParams>,
) -> Json<ChannelsPage> {
    let state = state.lock().unwrap();
    let matching: Vec<Channel> = state
        .channels
        .values()
        .filter(|c| matches(&c.metadata, &params))
        .cloned()
        .collect();
    Json(ChannelsPage {
        total: matching.len() as u64,
        offset: params.offset,
        limit: params.limit,
        channels: matching
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .collect(),
    })
}

async fn add_channel(State(state): State<Shared>, Json(mut channel): Json<Channel>) -> Response {
    let mut state = state.lock().unwrap();
    let id = state.next_id("chan");
    channel.id = Some(id.clone());
    state.channels.insert(id.clone(), channel);
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/channels/{id}"))],
    )
        .into_response()
}

async fn delete_channel(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.channels.remove(&id);
    state.connections.retain(|(chan, _)| *chan != id);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct ConnectBody {
    channel_ids: Vec<String>,
    thing_ids: Vec<String>,
}

async fn connect(State(state): State<Shared>, Json(body): Json<ConnectBody>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.fail_connect {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    for chan in &body.channel_ids {
        for thing in &body.thing_ids {
            state.connections.push((chan.clone(), thing.clone()));
        }
    }
    StatusCode::OK
}

async fn browse(
    State(state): State<Shared>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.browse_queries.push(params.clone());
    if let Some(body) = state.browse_body.clone() {
        let status = state.browse_status.unwrap_or(StatusCode::OK);
        return (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response();
    }
    match state.browse_status {
        Some(status) => status.into_response(),
        None => Json(json!({
            "server": params.get("server"),
            "nodes": [{ "nodeID": "ns=2;i=10", "name": "Temp" }],
        }))
        .into_response(),
    }
}
