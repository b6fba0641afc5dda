//! Thunder Compute REST client. Every call is a single authenticated round trip against
//! `<api-url>/pods`, the JSON handling stays here so the workflows only see typed values.

use crate::config::{ApiToken, ThunderConfig};
use crate::error::ApiError;
use crate::provider::{InstanceId, InstanceStatus, Provider};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of `POST /pods`.
#[derive(Debug, Deserialize)]
struct CreatedPod {
    #[serde(default, deserialize_with = "loose_string")]
    instance_id: Option<String>,
}

/// Body of `GET /pods/{id}`. Only the fields this tool reads.
#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    port: Option<String>,
}

/// Accepts a string or a number, the way `jq -r` prints either.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => Some(s),
        Some(Loose::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Trimmed value, `None` when absent or blank.
fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct ThunderClient {
    client: Client,
    api_url: Url,
    token: ApiToken,
}

impl ThunderClient {
    pub fn new(config: &ThunderConfig, token: ApiToken) -> Result<Self, ApiError> {
        let api_url = config.api_url();
        let api_url = Url::parse(&api_url).map_err(|e| ApiError::InvalidUrl {
            url: api_url.clone(),
            message: e.to_string(),
        })?;
        if api_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: api_url.to_string(),
                message: "not a base URL".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("thunder-runner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// API root plus the given segments, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends an authenticated request to `<api-url>/<segments...>` and returns the raw body.
    /// Any non-2xx answer is an error carrying the body the API sent back.
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        let url = self.url(segments);
        debug!(%method, url = %url, "Thunder API request");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(self.token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let text = self.request(method, segments, body).await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, "Failed to parse Thunder API response");
            ApiError::Json(e)
        })
    }

    async fn get_pod(&self, id: &InstanceId) -> Result<Pod, ApiError> {
        self.request_json(Method::GET, &["pods", id.as_ref()], None)
            .await
    }
}

fn has_port(host: &str) -> bool {
    host.rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// Older pod responses report the port separately.
fn join_host_port(host: String, port: Option<String>) -> String {
    match port {
        Some(port) if !has_port(&host) => format!("{host}:{port}"),
        _ => host,
    }
}

#[async_trait::async_trait]
impl Provider for ThunderClient {
    async fn create_instance(&self) -> Result<InstanceId, ApiError> {
        info!("Creating Thunder instance");
        let created: CreatedPod = self
            .request_json(Method::POST, &["pods"], Some(&json!({})))
            .await?;
        let id = created
            .instance_id
            .as_deref()
            .and_then(InstanceId::new)
            .ok_or(ApiError::MissingField("instance_id"))?;
        info!(instance_id = %id, "Thunder instance created");
        Ok(id)
    }

    async fn instance_status(&self, id: &InstanceId) -> Result<InstanceStatus, ApiError> {
        let pod = self.get_pod(id).await?;
        // Compared verbatim, a padded value is not `running`
        let status = pod
            .status
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingField("status"))?;
        Ok(InstanceStatus::parse(&status))
    }

    async fn instance_host(&self, id: &InstanceId) -> Result<String, ApiError> {
        let pod = self.get_pod(id).await?;
        let host = trimmed(pod.host).ok_or(ApiError::MissingField("host"))?;
        Ok(join_host_port(host, trimmed(pod.port)))
    }

    async fn delete_instance(&self, id: &InstanceId) -> Result<(), ApiError> {
        info!(instance_id = %id, "Deleting Thunder instance");
        match self
            .request(Method::DELETE, &["pods", id.as_ref()], None)
            .await
        {
            Ok(_) => {}
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                warn!(instance_id = %id, "Instance not found, treating as already deleted");
            }
            Err(e) => return Err(e),
        }
        info!(instance_id = %id, "Thunder instance deleted");
        Ok(())
    }
}
