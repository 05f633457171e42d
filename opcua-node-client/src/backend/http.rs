use crate::config::ClientConfig;
use crate::errors::{ProvisionError, ProvisionResult, status_text};
use crate::gateway::DiscoveryGateway;
use crate::model::{
    BrowseQuery, BrowseResult, Channel, ChannelsPage, ListQuery, Thing, ThingsPage,
};
use crate::store::ResourceStore;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

fn build_client(config: &ClientConfig) -> ProvisionResult<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| ProvisionError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Turns a non-2xx response into [`ProvisionError::Store`].
fn ensure_success(resp: Response) -> ProvisionResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        tracing::debug!(status = status.as_u16(), url = %resp.url(), "Store rejected request");
        Err(ProvisionError::Store {
            status: status.as_u16(),
            status_text: status_text(status.canonical_reason()),
        })
    }
}

fn list_params(query: &ListQuery) -> ProvisionResult<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("offset", query.offset.to_string()),
        ("limit", query.limit.to_string()),
        ("type", query.discriminator.clone()),
    ];
    if let Some(metadata) = &query.metadata {
        params.push(("metadata", serde_json::to_string(metadata)?));
    }
    Ok(params)
}

#[derive(Deserialize)]
struct BulkThings {
    things: Vec<Thing>,
}

#[derive(Serialize)]
struct ThingUpdate<'a> {
    name: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ConnectRequest {
    channel_ids: Vec<String>,
    thing_ids: Vec<String>,
}

/// [`ResourceStore`] backed by the management API's REST endpoints.
pub struct HttpResourceStore {
    client: Client,
    config: ClientConfig,
}

impl HttpResourceStore {
    pub fn new(config: ClientConfig) -> ProvisionResult<Self> {
        tracing::info!(store_url = %config.store_url, "Initializing HttpResourceStore");
        Ok(Self {
            client: build_client(&config)?,
            config,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.config.store_endpoint(path));
        match &self.config.token {
            Some(token) => builder.header(AUTHORIZATION, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ProvisionResult<Response> {
        ensure_success(builder.send().await?)
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn get_thing(&self, id: &str) -> ProvisionResult<Thing> {
        let resp = self
            .send(self.request(Method::GET, &format!("things/{id}")))
            .await?;
        Ok(resp.json().await?)
    }

    async fn get_things(&self, query: &ListQuery) -> ProvisionResult<ThingsPage> {
        let params = list_params(query)?;
        let resp = self
            .send(self.request(Method::GET, "things").query(&params))
            .await?;
        Ok(resp.json().await?)
    }

    async fn add_things(&self, things: Vec<Thing>) -> ProvisionResult<Vec<Thing>> {
        let count = things.len();
        let resp = self
            .send(self.request(Method::POST, "things/bulk").json(&things))
            .await?;
        let body: BulkThings = resp.json().await?;
        tracing::debug!(requested = count, created = body.things.len(), "Bulk create done");
        Ok(body.things)
    }

    async fn edit_thing(&self, thing: &Thing) -> ProvisionResult<()> {
        let id = thing
            .id
            .as_deref()
            .ok_or_else(|| ProvisionError::InvalidInput("cannot edit a thing without id".into()))?;
        let body = ThingUpdate {
            name: &thing.name,
            metadata: &thing.metadata,
        };
        self.send(self.request(Method::PUT, &format!("things/{id}")).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_thing(&self, id: &str) -> ProvisionResult<()> {
        self.send(self.request(Method::DELETE, &format!("things/{id}")))
            .await?;
        Ok(())
    }

    async fn get_channels(&self, query: &ListQuery) -> ProvisionResult<ChannelsPage> {
        let params = list_params(query)?;
        let resp = self
            .send(self.request(Method::GET, "channels").query(&params))
            .await?;
        Ok(resp.json().await?)
    }

    async fn add_channel(&self, channel: &Channel) -> ProvisionResult<String> {
        let resp = self
            .send(self.request(Method::POST, "channels").json(channel))
            .await?;
        resp.headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::Location(String::new()))
    }

    async fn delete_channel(&self, id: &str) -> ProvisionResult<()> {
        self.send(self.request(Method::DELETE, &format!("channels/{id}")))
            .await?;
        Ok(())
    }

    async fn connect_things(
        &self,
        channel_ids: Vec<String>,
        thing_ids: Vec<String>,
    ) -> ProvisionResult<()> {
        let body = ConnectRequest {
            channel_ids,
            thing_ids,
        };
        self.send(self.request(Method::POST, "connect").json(&body))
            .await?;
        Ok(())
    }
}

/// [`DiscoveryGateway`] calling the browse endpoint over HTTP GET.
pub struct HttpDiscoveryGateway {
    client: Client,
    browse_url: String,
}

impl HttpDiscoveryGateway {
    pub fn new(config: &ClientConfig) -> ProvisionResult<Self> {
        tracing::info!(browse_url = %config.browse_url, "Initializing HttpDiscoveryGateway");
        Ok(Self {
            client: build_client(config)?,
            browse_url: config.browse_url.clone(),
        })
    }
}

#[async_trait]
impl DiscoveryGateway for HttpDiscoveryGateway {
    async fn browse(&self, query: &BrowseQuery) -> ProvisionResult<BrowseResult> {
        let resp = self
            .client
            .get(&self.browse_url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Browse request got no response");
                ProvisionError::Gateway {
                    status: 0,
                    status_text: "Unknown Error".into(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProvisionError::Gateway {
                status: status.as_u16(),
                status_text: status_text(status.canonical_reason()),
            });
        }
        resp.json().await.map_err(|e| {
            tracing::debug!(error = %e, status = status.as_u16(), "Undecodable browse body");
            ProvisionError::Gateway {
                status: status.as_u16(),
                status_text: status_text(status.canonical_reason()),
            }
        })
    }
}
