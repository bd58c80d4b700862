//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into form sessions. Environment variables are read by the host binary; the helpers
//! here only parse the raw values, so nothing reads process-wide state while events are being
//! handled.

use crate::constants::DEFAULT_NOTICE_CAPACITY;
use crate::validation::is_blank;
use crate::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Decides whether a blank value counts as "set by the user" when merging templates.
///
/// Blank means JSON `null`, an empty or whitespace-only string, or an empty array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlankValuePolicy {
    /// A blank value is treated as never entered; the template default fills it.
    #[default]
    TreatAsUnset,
    /// Any present value, blank or not, is kept.
    TreatAsSet,
}

impl BlankValuePolicy {
    /// Returns true if `value` should be preserved over a template default in merge mode.
    pub fn counts_as_set(&self, value: &serde_json::Value) -> bool {
        match self {
            BlankValuePolicy::TreatAsUnset => !is_blank(value),
            BlankValuePolicy::TreatAsSet => true,
        }
    }
}

impl FromStr for BlankValuePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unset" => Ok(BlankValuePolicy::TreatAsUnset),
            "set" => Ok(BlankValuePolicy::TreatAsSet),
            other => Err(SyncError::InvalidInput(format!(
                "blank policy must be 'unset' or 'set', got '{other}'"
            ))),
        }
    }
}

/// Synchronizer configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    fetch_timeout: Option<Duration>,
    blank_policy: BlankValuePolicy,
    notice_capacity: usize,
    template_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// Create a new `SyncConfig`.
    pub fn new(
        fetch_timeout: Option<Duration>,
        blank_policy: BlankValuePolicy,
        notice_capacity: usize,
        template_dir: Option<PathBuf>,
    ) -> SyncResult<Self> {
        if notice_capacity == 0 {
            return Err(SyncError::InvalidInput(
                "notice_capacity must be greater than zero".into(),
            ));
        }
        if fetch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SyncError::InvalidInput(
                "fetch_timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            fetch_timeout,
            blank_policy,
            notice_capacity,
            template_dir,
        })
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    pub fn blank_policy(&self) -> BlankValuePolicy {
        self.blank_policy
    }

    pub fn notice_capacity(&self) -> usize {
        self.notice_capacity
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: None,
            blank_policy: BlankValuePolicy::default(),
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
            template_dir: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the fetch timeout from an optional millisecond value.
///
/// `None` or empty/whitespace means no timeout.
pub fn fetch_timeout_from_env_value(value: Option<String>) -> SyncResult<Option<Duration>> {
    non_empty(value)
        .map(|v| {
            v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                SyncError::InvalidInput(format!(
                    "fetch timeout must be a whole number of milliseconds, got '{v}'"
                ))
            })
        })
        .transpose()
}

/// Parse the blank value policy. Defaults to [`BlankValuePolicy::TreatAsUnset`].
pub fn blank_policy_from_env_value(value: Option<String>) -> SyncResult<BlankValuePolicy> {
    let parsed = non_empty(value)
        .map(|v| v.parse::<BlankValuePolicy>())
        .transpose()?;
    Ok(parsed.unwrap_or_default())
}

/// Parse the notice channel capacity. Defaults to [`DEFAULT_NOTICE_CAPACITY`].
pub fn notice_capacity_from_env_value(value: Option<String>) -> SyncResult<usize> {
    let Some(v) = non_empty(value) else {
        return Ok(DEFAULT_NOTICE_CAPACITY);
    };
    v.parse::<usize>().map_err(|_| {
        SyncError::InvalidInput(format!(
            "notice capacity must be a positive integer, got '{v}'"
        ))
    })
}

/// Resolve the template directory without reading environment variables.
///
/// An absent or blank value means no catalog is configured. A configured value must point at
/// an existing directory.
pub fn resolve_template_dir(value: Option<String>) -> SyncResult<Option<PathBuf>> {
    let Some(v) = non_empty(value) else {
        return Ok(None);
    };
    let dir = PathBuf::from(v);
    if !dir.is_dir() {
        return Err(SyncError::InvalidInput(format!(
            "template directory does not exist or is not a directory: {}",
            dir.display()
        )));
    }
    Ok(Some(dir))
}
