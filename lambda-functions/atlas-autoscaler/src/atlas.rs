//! Atlas Administration API client.
//!
//! Programmatic API keys authenticate with HTTP digest: every call is sent
//! once without credentials, and answered again with an `Authorization`
//! header built from the server's `WWW-Authenticate` challenge.

use std::time::Duration;

use async_trait::async_trait;
use digest_auth::{AuthContext, HttpMethod};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::cluster::{ClusterDescription, ProjectId};
use crate::secrets::ApiKeys;

pub const DEFAULT_BASE_URL: &str = "https://cloud.mongodb.com/api/atlas/v2";

/// Versioned media type for the 2023-11-15 API.
pub const ATLAS_MEDIA_TYPE: &str = "application/vnd.atlas.2023-11-15+json";

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code: {status}, response: {body}")]
    Status { status: u16, body: String },

    #[error("digest authentication failed: {0}")]
    Auth(String),

    #[error("invalid Atlas URL: {0}")]
    Url(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Project lookup, cluster read and cluster update.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn project_id(&self, project_name: &str) -> Result<ProjectId, AtlasError>;

    async fn cluster(
        &self,
        project: &ProjectId,
        cluster_name: &str,
    ) -> Result<ClusterDescription, AtlasError>;

    /// Submit the full cluster document.
    async fn update_cluster(
        &self,
        project: &ProjectId,
        cluster_name: &str,
        cluster: &ClusterDescription,
    ) -> Result<(), AtlasError>;
}

#[derive(Deserialize)]
struct Group {
    id: String,
}

pub struct AtlasClient {
    client: Client,
    base_url: Url,
    keys: ApiKeys,
}

impl AtlasClient {
    pub fn new(base_url: &str, timeout: Duration, keys: ApiKeys) -> Result<Self, AtlasError> {
        let base_url = Url::parse(base_url).map_err(|e| AtlasError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(AtlasError::Url(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            keys,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, AtlasError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AtlasError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, answering a digest challenge if the server issues one.
    /// The status of the final response is left to the caller.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, AtlasError> {
        debug!("{} {}", method, url);

        let response = self
            .request(method.clone(), url.clone(), body.clone())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AtlasError::Auth("missing digest challenge".to_string()))?;
        let authorization = self.digest_authorization(challenge, &method, &url, body.as_deref())?;

        Ok(self
            .request(method, url, body)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?)
    }

    fn request(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, ATLAS_MEDIA_TYPE);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, ATLAS_MEDIA_TYPE).body(body);
        }
        request
    }

    fn digest_authorization(
        &self,
        challenge: &str,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<String, AtlasError> {
        let mut prompt = digest_auth::parse(challenge).map_err(|e| AtlasError::Auth(e.to_string()))?;

        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let context = AuthContext::new_with_method(
            self.keys.public_key.as_str(),
            self.keys.private_key.as_str(),
            uri.as_str(),
            body,
            HttpMethod::from(method.as_str()),
        );

        let answer = prompt
            .respond(&context)
            .map_err(|e| AtlasError::Auth(e.to_string()))?;
        Ok(answer.to_header_string())
    }
}

/// Turn any non-2xx response into [`AtlasError::Status`], keeping the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AtlasError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response_body(response.text().await);
    Err(AtlasError::Status {
        status: status.as_u16(),
        body,
    })
}

fn response_body(text: Result<String, reqwest::Error>) -> String {
    text.unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}

#[async_trait]
impl ClusterDirectory for AtlasClient {
    async fn project_id(&self, project_name: &str) -> Result<ProjectId, AtlasError> {
        let url = self.endpoint(&["groups", "byName", project_name])?;
        let response = check_status(self.send(Method::GET, url, None).await?).await?;
        let group: Group = response.json().await?;

        info!("Resolved project {} to {}", project_name, group.id);
        Ok(ProjectId::new(group.id))
    }

    async fn cluster(
        &self,
        project: &ProjectId,
        cluster_name: &str,
    ) -> Result<ClusterDescription, AtlasError> {
        let url = self.endpoint(&["groups", project.as_str(), "clusters", cluster_name])?;
        let response = check_status(self.send(Method::GET, url, None).await?).await?;
        Ok(response.json().await?)
    }

    async fn update_cluster(
        &self,
        project: &ProjectId,
        cluster_name: &str,
        cluster: &ClusterDescription,
    ) -> Result<(), AtlasError> {
        let url = self.endpoint(&["groups", project.as_str(), "clusters", cluster_name])?;
        let body = serde_json::to_vec(cluster)?;

        let response = self.send(Method::PATCH, url, Some(body)).await?;
        check_status(response).await?;

        info!("Submitted update for cluster {} in project {}", cluster_name, project);
        Ok(())
    }
}
