//! Permit templates and the values that travel between the synchronizer and the fetcher.

use crate::error::UnavailableReason;
use crate::{SyncError, SyncResult};
use ptw_types::{FieldName, PermitTypeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Field name → value mapping used for every state slice.
pub type FieldMap = BTreeMap<FieldName, serde_json::Value>;

/// The resolved schema fragment for one permit type.
///
/// Descriptors are shared behind an [`Arc`] once fetched and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDescriptor {
    #[serde(default)]
    pub field_defaults: FieldMap,
    #[serde(default)]
    pub required_fields: BTreeSet<FieldName>,
    #[serde(default)]
    pub visible_fields: BTreeSet<FieldName>,
}

impl TemplateDescriptor {
    /// Checks that required and visible fields only name fields the template defines.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidInput`] naming the first unknown field.
    pub fn validate(&self) -> SyncResult<()> {
        let unknown = self
            .required_fields
            .iter()
            .chain(self.visible_fields.iter())
            .find(|f| !self.field_defaults.contains_key(*f));

        match unknown {
            Some(field) => Err(SyncError::InvalidInput(format!(
                "template references undefined field '{field}'"
            ))),
            None => Ok(()),
        }
    }
}

/// Counter distinguishing successive type selections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lookup the synchronizer wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    pub permit_type: PermitTypeId,
    pub generation: Generation,
}

/// A successful lookup, tagged with the generation it was requested under.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub permit_type: PermitTypeId,
    pub generation: Generation,
    pub descriptor: Arc<TemplateDescriptor>,
}

/// A failed lookup, tagged with the generation it was requested under.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub permit_type: PermitTypeId,
    pub generation: Generation,
    pub reason: UnavailableReason,
}

impl FetchFailure {
    pub fn into_error(self) -> SyncError {
        SyncError::TemplateUnavailable {
            permit_type: self.permit_type,
            reason: self.reason,
        }
    }
}

/// Outcome of one `TemplateFetcher::resolve` call.
pub type TemplateCompletion = Result<ResolvedTemplate, FetchFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_yaml() {
        let yaml = r#"
field_defaults:
  isolation_required: true
  gas_test: null
required_fields: [gas_test]
visible_fields: [isolation_required, gas_test]
"#;
        let descriptor: TemplateDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.field_defaults.len(), 2);
        assert!(descriptor
            .required_fields
            .contains(&FieldName::new("gas_test").unwrap()));
        descriptor.validate().unwrap();
    }

    #[test]
    fn test_descriptor_rejects_unknown_keys() {
        let yaml = "field_defaults: {}\nrules: []\n";
        assert!(serde_yaml::from_str::<TemplateDescriptor>(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_undefined_required_field() {
        let mut descriptor = TemplateDescriptor::default();
        descriptor
            .required_fields
            .insert(FieldName::new("ghost").unwrap());
        let err = descriptor.validate().unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_generation_next_is_monotonic() {
        let g = Generation::default();
        assert!(g.next() > g);
        assert_eq!(g.next().next().get(), 2);
    }
}
