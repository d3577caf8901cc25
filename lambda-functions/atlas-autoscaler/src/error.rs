use std::fmt;

use crate::atlas::AtlasError;

/// Errors raised while handling a scaling request.
#[derive(Debug, thiserror::Error)]
pub enum ScalingError {
    /// The request is incomplete or malformed. Not worth retrying.
    #[error("{0}")]
    Validation(String),

    /// The stored secret is missing a key or is not a JSON object.
    #[error("{0}")]
    Credential(String),

    /// Secrets Manager could not be reached or refused the lookup.
    #[error("secrets manager request failed: {0}")]
    SecretsManager(String),

    #[error(transparent)]
    Atlas(#[from] AtlasError),

    #[error("failed to serialize cluster document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used when reporting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Credential,
    Dependency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Credential => write!(f, "credential"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

impl ScalingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Credential(_) => ErrorKind::Credential,
            Self::SecretsManager(_) | Self::Atlas(_) | Self::Serialization(_) => {
                ErrorKind::Dependency
            }
        }
    }
}

/// The step of an invocation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidatingEvent,
    GettingSecret,
    InstantiatingClient,
    GettingProject,
    AutoScaling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidatingEvent => write!(f, "validating event"),
            Self::GettingSecret => write!(f, "getting secret"),
            Self::InstantiatingClient => write!(f, "instantiating new client"),
            Self::GettingProject => write!(f, "getting project"),
            Self::AutoScaling => write!(f, "auto scaling"),
        }
    }
}

/// A [`ScalingError`] labelled with the stage that failed.
#[derive(Debug, thiserror::Error)]
#[error("error {stage}: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: ScalingError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<ScalingError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Label a fallible step with its stage, logging the failure on the way out.
pub fn at_stage<T, E>(stage: Stage, result: Result<T, E>) -> Result<T, StageError>
where
    E: Into<ScalingError>,
{
    result.map_err(|e| {
        let err = StageError::new(stage, e);
        tracing::error!(stage = %stage, kind = %err.kind(), "Error {}: {}", stage, err.source);
        err
    })
}
