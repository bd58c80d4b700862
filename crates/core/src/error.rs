use ptw_types::PermitTypeId;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid permit type selection: {0}")]
    InvalidSelection(String),
    #[error("template unavailable for permit type {permit_type}: {reason}")]
    TemplateUnavailable {
        permit_type: PermitTypeId,
        reason: UnavailableReason,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no active form session")]
    NoActiveSession,
    #[error("no tokio runtime available to drive template lookups")]
    RuntimeUnavailable,
    #[error("failed to read template file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Error reported by a [`TemplateLookup`](crate::fetcher::TemplateLookup) implementation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("template backend error: {0}")]
    Backend(String),
    #[error("template backend unreachable: {0}")]
    Unreachable(String),
}

/// Why a template could not be resolved.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UnavailableReason {
    #[error("no template is defined for this permit type")]
    NotFound,
    #[error("lookup timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}
