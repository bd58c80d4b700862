//! # PTW Core
//!
//! Permit-type-driven form state synchronization for permit-to-work forms.
//!
//! When a user picks a permit type, the form needs that type's field template. This crate:
//! - resolves templates through a host-supplied async [`TemplateLookup`]
//! - applies them in `Create` mode (template defaults win) or `Merge` mode (existing values win)
//! - keeps form values, draft snapshot and accumulated values consistent
//! - discards lookups superseded by a newer selection, using a generation counter
//!
//! **No UI or transport concerns**: rendering, persistence and the template backend itself
//! belong to the host application.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod notice;
pub mod session;
pub mod state;
pub mod template;
pub mod validation;

pub use catalog::YamlTemplateCatalog;
pub use config::{BlankValuePolicy, SyncConfig};
pub use error::{LookupError, SyncError, SyncResult, UnavailableReason};
pub use fetcher::{StaticTemplateLookup, TemplateFetcher, TemplateLookup};
pub use notice::Notice;
pub use session::FormSession;
pub use state::{AppliedTemplate, FormState, FormStateSynchronizer, Mode, ResolutionOutcome};
pub use template::{
    FetchFailure, FieldMap, Generation, ResolvedTemplate, TemplateCompletion, TemplateDescriptor,
    TemplateRequest,
};

pub use ptw_types::{FieldName, NonEmptyText, PermitTypeId};
