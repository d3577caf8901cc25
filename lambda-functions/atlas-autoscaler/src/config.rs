use std::time::Duration;

use anyhow::{Context, Result};
use bon::Builder;

use crate::atlas::DEFAULT_BASE_URL;

pub const DEFAULT_SECRET_REGION: &str = "us-east-1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings read once per cold start.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(on(String, into))]
pub struct Config {
    /// Secrets Manager id of the secret holding the Atlas API keys.
    pub secret_name: String,

    #[builder(default = DEFAULT_SECRET_REGION.to_string())]
    pub secret_region: String,

    #[builder(default = DEFAULT_BASE_URL.to_string())]
    pub atlas_base_url: String,

    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    pub request_timeout: Duration,
}

impl Config {
    /// - `SECRET_NAME`: required
    /// - `SECRET_REGION`: optional (default: us-east-1)
    /// - `ATLAS_BASE_URL`: optional (default: the public Atlas API)
    /// - `ATLAS_TIMEOUT_SECS`: optional request timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_name = lookup("SECRET_NAME")
            .filter(|name| !name.is_empty())
            .context("SECRET_NAME must be set")?;

        let secret_region =
            lookup("SECRET_REGION").unwrap_or_else(|| DEFAULT_SECRET_REGION.to_string());
        let atlas_base_url =
            lookup("ATLAS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = lookup("ATLAS_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self::builder()
            .secret_name(secret_name)
            .secret_region(secret_region)
            .atlas_base_url(atlas_base_url)
            .request_timeout(Duration::from_secs(timeout_secs))
            .build())
    }
}
