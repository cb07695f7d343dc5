use serde::Serialize;
use thiserror::Error;

/// Outcome of one step inside a batch operation (rollback stop phase,
/// cascade delete, dangling-image cleanup). The id names the container
/// or image the step acted on.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub resource_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepOutcome {
    pub fn success(resource_id: impl Into<String>) -> Self {
        StepOutcome {
            resource_id: resource_id.into(),
            ok: true,
            detail: None,
        }
    }

    pub fn failure(resource_id: impl Into<String>, detail: impl Into<String>) -> Self {
        StepOutcome {
            resource_id: resource_id.into(),
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// Classified failure taxonomy. Raw daemon errors are interpreted exactly
/// once, at the gateway boundary; everything above it forwards or wraps
/// these variants.
#[derive(Debug, Error)]
pub enum ConcordError {
    #[error("permission denied accessing the Docker daemon socket")]
    PermissionDenied { detail: String },

    #[error("Docker daemon is not running or unreachable")]
    RuntimeUnavailable { detail: String },

    #[error("{target} not found")]
    NotFound { target: String },

    #[error("resource is in use by {} container(s)", .blocking.len())]
    ResourceInUse {
        blocking: Vec<String>,
        detail: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("batch operation partially failed")]
    PartialFailure { steps: Vec<StepOutcome> },

    #[error("docker runtime error: {0}")]
    Unknown(String),
}

impl ConcordError {
    /// Stable machine-readable code, preserved end-to-end to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            ConcordError::PermissionDenied { .. } => "DOCKER_PERMISSION_DENIED",
            ConcordError::RuntimeUnavailable { .. } => "DOCKER_DAEMON_UNAVAILABLE",
            ConcordError::NotFound { .. } => "NOT_FOUND",
            ConcordError::ResourceInUse { .. } => "RESOURCE_IN_USE",
            ConcordError::Validation(_) => "VALIDATION_ERROR",
            ConcordError::PartialFailure { .. } => "PARTIAL_FAILURE",
            ConcordError::Unknown(_) => "UNKNOWN_FAILURE",
        }
    }

    /// True when the caller may safely retry the same request later.
    pub fn retryable(&self) -> bool {
        matches!(self, ConcordError::RuntimeUnavailable { .. })
    }

    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            ConcordError::PermissionDenied { .. } => vec![
                "Ensure your user is in the 'docker' group",
                "Log out and back in (or run 'newgrp docker') to apply group changes",
                "Alternatively run the server with sufficient privileges (not recommended)",
            ],
            ConcordError::RuntimeUnavailable { .. } => vec![
                "Start the Docker service (e.g. 'sudo systemctl start docker')",
                "Verify that 'docker ps' works in your shell",
            ],
            ConcordError::ResourceInUse { .. } => vec![
                "Stop and remove the listed containers first",
                "Or retry with cascade=true to force-remove them",
            ],
            _ => vec![],
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ConcordError::PermissionDenied { detail }
            | ConcordError::RuntimeUnavailable { detail }
            | ConcordError::ResourceInUse { detail, .. } => Some(detail.clone()),
            ConcordError::Unknown(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}

/// Serializable form of a classified error, used both in HTTP error
/// responses and embedded in batch reports.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocking_containers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
}

impl From<&ConcordError> for ErrorBody {
    fn from(err: &ConcordError) -> Self {
        let blocking_containers = match err {
            ConcordError::ResourceInUse { blocking, .. } => blocking.clone(),
            _ => vec![],
        };
        let steps = match err {
            ConcordError::PartialFailure { steps } => steps.clone(),
            _ => vec![],
        };
        ErrorBody {
            error_code: err.code().to_string(),
            message: err.to_string(),
            suggestions: err.suggestions().into_iter().map(String::from).collect(),
            detail: err.detail(),
            blocking_containers,
            steps,
        }
    }
}
