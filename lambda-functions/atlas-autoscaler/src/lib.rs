pub mod atlas;
pub mod cluster;
pub mod config;
pub mod detect;
pub mod error;
pub mod merge;
pub mod request;
pub mod secrets;
pub mod specs;

use std::fmt;

use chrono::Utc;
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};

pub use atlas::{AtlasClient, AtlasError, ClusterDirectory};
pub use cluster::{ClusterDescription, ProjectId};
pub use config::Config;
pub use detect::{detect_changes, has_changes, FieldChange};
pub use error::{at_stage, ErrorKind, ScalingError, Stage, StageError};
pub use merge::{apply_delta, PlannedEdit, ScalingPlan};
pub use request::{AutoScaleBounds, ScalingRequest, SpecDelta, ValidRequest};
pub use secrets::{ApiKeys, SecretsManagerProvider};
pub use specs::SpecKind;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScalingStatus {
    Scaled,
    Unchanged,
}

impl fmt::Display for ScalingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaled => write!(f, "scaled"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub status: ScalingStatus,
    pub message: String,
    pub project: String,
    pub cluster: String,
    pub changes: usize,
    pub timestamp: String,
}

impl Response {
    pub fn scaled(project: &str, cluster: &str, changes: usize) -> Self {
        Self {
            status: ScalingStatus::Scaled,
            message: format!("Cluster {} in project {} scaled.", cluster, project),
            project: project.to_string(),
            cluster: cluster.to_string(),
            changes,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn unchanged(project: &str, cluster: &str) -> Self {
        Self {
            status: ScalingStatus::Unchanged,
            message: format!(
                "No changes detected for cluster {} in project {}.",
                cluster, project
            ),
            project: project.to_string(),
            cluster: cluster.to_string(),
            changes: 0,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Fetches the live cluster, decides whether the request changes it, and
/// submits the merged document when it does.
pub struct ClusterScaler<D> {
    directory: D,
}

impl<D: ClusterDirectory> ClusterScaler<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub async fn scale(&self, request: &ValidRequest) -> Result<Response, StageError> {
        let project = at_stage(
            Stage::GettingProject,
            self.directory.project_id(&request.project).await,
        )?;

        at_stage(Stage::AutoScaling, self.auto_scale(&project, request).await)
    }

    async fn auto_scale(
        &self,
        project: &ProjectId,
        request: &ScalingRequest,
    ) -> Result<Response, ScalingError> {
        let cluster = self.directory.cluster(project, &request.cluster).await?;

        let plan = ScalingPlan::from_request(request);
        let changes = detect_changes(&cluster, &plan);
        if changes.is_empty() {
            info!(
                "No changes detected for cluster {} in project {}, skipping update",
                request.cluster, request.project
            );
            return Ok(Response::unchanged(&request.project, &request.cluster));
        }

        let cluster_name = cluster
            .name
            .clone()
            .unwrap_or_else(|| request.cluster.clone());
        let mut updated = plan.apply(cluster);
        updated.strip_read_only_fields();

        if tracing::enabled!(Level::DEBUG) {
            let body = serde_json::to_string_pretty(&updated)?;
            debug!("Updated JSON body:\n{}", body);
        }

        self.directory
            .update_cluster(project, &cluster_name, &updated)
            .await?;

        let response = Response::scaled(&request.project, &request.cluster, changes.len());
        info!("{}", response.message);
        Ok(response)
    }
}

/// One Lambda invocation: validate, load credentials, build the Atlas
/// client, then scale.
pub async fn function_handler(
    event: LambdaEvent<ScalingRequest>,
    config: &Config,
) -> Result<Response, Error> {
    let request = at_stage(Stage::ValidatingEvent, event.payload.validate())?;

    let secrets = SecretsManagerProvider::new(&config.secret_region).await;
    let keys = at_stage(
        Stage::GettingSecret,
        secrets.api_keys(&config.secret_name).await,
    )?;

    let client = at_stage(
        Stage::InstantiatingClient,
        AtlasClient::new(&config.atlas_base_url, config.request_timeout, keys),
    )?;

    Ok(ClusterScaler::new(client).scale(&request).await?)
}
