use std::collections::HashMap;
use std::fmt;

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, SdkError};
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use tracing::info;

use crate::error::ScalingError;

pub const PUBLIC_KEY_FIELD: &str = "MONGODB_ATLAS_PUBLIC_KEY";
pub const PRIVATE_KEY_FIELD: &str = "MONGODB_ATLAS_PRIVATE_KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeys {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Extract the Atlas key pair from a secret stored as a flat JSON object.
pub fn parse_api_keys(secret_string: &str) -> Result<ApiKeys, ScalingError> {
    let secret: HashMap<String, String> = serde_json::from_str(secret_string)
        .map_err(|e| ScalingError::Credential(format!("secret is not a JSON object of strings: {}", e)))?;

    let public_key = secret
        .get(PUBLIC_KEY_FIELD)
        .cloned()
        .ok_or_else(|| ScalingError::Credential("public key not found in secret".to_string()))?;
    let private_key = secret
        .get(PRIVATE_KEY_FIELD)
        .cloned()
        .ok_or_else(|| ScalingError::Credential("private key not found in secret".to_string()))?;

    Ok(ApiKeys {
        public_key,
        private_key,
    })
}

pub struct SecretsManagerProvider {
    client: SecretsManagerClient,
}

impl SecretsManagerProvider {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: SecretsManagerClient::new(&config),
        }
    }

    pub async fn api_keys(&self, secret_id: &str) -> Result<ApiKeys, ScalingError> {
        let result = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .version_stage("AWSCURRENT")
            .send()
            .await
            .map_err(secrets_manager_error)?;

        let secret_string = result.secret_string().ok_or_else(|| {
            ScalingError::Credential(format!("secret {} has no string value", secret_id))
        })?;

        info!("Loaded Atlas API keys from secret {}", secret_id);
        parse_api_keys(secret_string)
    }
}

/// Keep the whole source chain: an `SdkError` alone only says "service error".
fn secrets_manager_error<E, R>(err: SdkError<E, R>) -> ScalingError
where
    E: std::error::Error + 'static,
    R: fmt::Debug,
{
    ScalingError::SecretsManager(DisplayErrorContext(&err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys(
            r#"{"MONGODB_ATLAS_PUBLIC_KEY": "abcdefgh", "MONGODB_ATLAS_PRIVATE_KEY": "1234-5678"}"#,
        )
        .unwrap();

        assert_eq!(keys.public_key, "abcdefgh");
        assert_eq!(keys.private_key, "1234-5678");
    }

    #[test]
    fn test_missing_public_key() {
        let err = parse_api_keys(r#"{"MONGODB_ATLAS_PRIVATE_KEY": "1234-5678"}"#).unwrap_err();

        assert!(matches!(err, ScalingError::Credential(_)));
        assert_eq!(err.to_string(), "public key not found in secret");
    }

    #[test]
    fn test_missing_private_key() {
        let err = parse_api_keys(r#"{"MONGODB_ATLAS_PUBLIC_KEY": "abcdefgh"}"#).unwrap_err();
        assert_eq!(err.to_string(), "private key not found in secret");
    }

    #[test]
    fn test_malformed_secret() {
        assert!(matches!(
            parse_api_keys("not json"),
            Err(ScalingError::Credential(_))
        ));
        assert!(matches!(
            parse_api_keys(r#"["MONGODB_ATLAS_PUBLIC_KEY"]"#),
            Err(ScalingError::Credential(_))
        ));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keys = ApiKeys {
            public_key: "abcdefgh".to_string(),
            private_key: "super-secret".to_string(),
        };

        let debug = format!("{:?}", keys);
        assert!(debug.contains("abcdefgh"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_sdk_error_keeps_cause() {
        let err: SdkError<GetSecretValueError> =
            SdkError::construction_failure("secret id atlas/api-keys is malformed");

        let message = secrets_manager_error(err).to_string();
        assert!(message.starts_with("secrets manager request failed:"));
        assert!(message.contains("secret id atlas/api-keys is malformed"));
    }
}
