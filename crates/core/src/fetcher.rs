//! Template resolution.
//!
//! [`TemplateFetcher`] maps a permit type to its [`TemplateDescriptor`] through an externally
//! supplied [`TemplateLookup`]. Every resolution carries the generation it was requested under
//! so the synchronizer can drop results that a newer selection has superseded. In-flight
//! lookups are never cancelled; they complete and are discarded.

use crate::error::{LookupError, UnavailableReason};
use crate::template::{
    FetchFailure, Generation, ResolvedTemplate, TemplateCompletion, TemplateDescriptor,
};
use async_trait::async_trait;
use ptw_types::PermitTypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Source of permit templates, typically a backend API client.
///
/// Implementations must not block the runtime. `Ok(None)` means the backend has no template
/// for the permit type.
#[async_trait]
pub trait TemplateLookup: Send + Sync {
    async fn fetch_template(
        &self,
        permit_type: &PermitTypeId,
    ) -> Result<Option<Arc<TemplateDescriptor>>, LookupError>;
}

/// In-memory lookup backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateLookup {
    templates: HashMap<PermitTypeId, Arc<TemplateDescriptor>>,
}

impl StaticTemplateLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the template for `permit_type`.
    pub fn with_template(mut self, permit_type: PermitTypeId, descriptor: TemplateDescriptor) -> Self {
        self.templates.insert(permit_type, Arc::new(descriptor));
        self
    }
}

#[async_trait]
impl TemplateLookup for StaticTemplateLookup {
    async fn fetch_template(
        &self,
        permit_type: &PermitTypeId,
    ) -> Result<Option<Arc<TemplateDescriptor>>, LookupError> {
        Ok(self.templates.get(permit_type).cloned())
    }
}

/// Resolves permit types to templates, optionally bounded by a timeout.
#[derive(Clone)]
pub struct TemplateFetcher {
    lookup: Arc<dyn TemplateLookup>,
    timeout: Option<Duration>,
}

impl TemplateFetcher {
    pub fn new(lookup: Arc<dyn TemplateLookup>) -> Self {
        Self {
            lookup,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issues one lookup for `permit_type` and tags the outcome with `generation`.
    ///
    /// Lookup errors, a missing template and timeout expiry all resolve to a
    /// [`FetchFailure`].
    pub async fn resolve(&self, permit_type: PermitTypeId, generation: Generation) -> TemplateCompletion {
        let lookup = self.lookup.fetch_template(&permit_type);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(result) => result.map_err(UnavailableReason::from),
                Err(_) => Err(UnavailableReason::TimedOut(limit)),
            },
            None => lookup.await.map_err(UnavailableReason::from),
        };

        match outcome {
            Ok(Some(descriptor)) => Ok(ResolvedTemplate {
                permit_type,
                generation,
                descriptor,
            }),
            Ok(None) => Err(FetchFailure {
                permit_type,
                generation,
                reason: UnavailableReason::NotFound,
            }),
            Err(reason) => {
                tracing::debug!(%permit_type, %generation, %reason, "template lookup failed");
                Err(FetchFailure {
                    permit_type,
                    generation,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptw_types::FieldName;
    use serde_json::json;

    struct FailingLookup;

    #[async_trait]
    impl TemplateLookup for FailingLookup {
        async fn fetch_template(
            &self,
            _permit_type: &PermitTypeId,
        ) -> Result<Option<Arc<TemplateDescriptor>>, LookupError> {
            Err(LookupError::Unreachable("connection refused".into()))
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl TemplateLookup for SlowLookup {
        async fn fetch_template(
            &self,
            _permit_type: &PermitTypeId,
        ) -> Result<Option<Arc<TemplateDescriptor>>, LookupError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(Arc::new(TemplateDescriptor::default())))
        }
    }

    fn hot_work() -> TemplateDescriptor {
        let mut descriptor = TemplateDescriptor::default();
        descriptor
            .field_defaults
            .insert(FieldName::new("fire_watch").unwrap(), json!(true));
        descriptor
    }

    #[tokio::test]
    async fn test_resolve_returns_descriptor_and_generation() {
        let lookup = StaticTemplateLookup::new().with_template(PermitTypeId::Numeric(1), hot_work());
        let fetcher = TemplateFetcher::new(Arc::new(lookup));

        let resolved = fetcher
            .resolve(PermitTypeId::Numeric(1), Generation::new(7))
            .await
            .unwrap();

        assert_eq!(resolved.generation, Generation::new(7));
        assert_eq!(resolved.permit_type, PermitTypeId::Numeric(1));
        assert_eq!(*resolved.descriptor, hot_work());
    }

    #[tokio::test]
    async fn test_resolve_missing_template_is_not_found() {
        let fetcher = TemplateFetcher::new(Arc::new(StaticTemplateLookup::new()));

        let failure = fetcher
            .resolve(PermitTypeId::Numeric(9), Generation::new(2))
            .await
            .unwrap_err();

        assert_eq!(failure.generation, Generation::new(2));
        assert_eq!(failure.reason, UnavailableReason::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_lookup_error_is_unavailable() {
        let fetcher = TemplateFetcher::new(Arc::new(FailingLookup));

        let failure = fetcher
            .resolve(PermitTypeId::Numeric(1), Generation::new(1))
            .await
            .unwrap_err();

        assert!(matches!(
            failure.reason,
            UnavailableReason::Lookup(LookupError::Unreachable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_times_out() {
        let fetcher = TemplateFetcher::new(Arc::new(SlowLookup))
            .with_timeout(Some(Duration::from_millis(250)));

        let failure = fetcher
            .resolve(PermitTypeId::Numeric(1), Generation::new(3))
            .await
            .unwrap_err();

        assert_eq!(
            failure.reason,
            UnavailableReason::TimedOut(Duration::from_millis(250))
        );
    }
}
