//! Replays a recorded form-session event script against a template lookup.
//!
//! Scripts are YAML:
//!
//! ```yaml
//! mode: merge
//! record:            # optional, seeds an edit of an existing permit
//!   permit_holder: "J. Smith"
//! steps:
//!   - select: hot-work
//!   - settle
//!   - edit: { field: fire_watch, value: false }
//!   - select: null
//! ```
//!
//! Steps are written as single-key maps (`select: ...`, `edit: {...}`) or bare words (`next`,
//! `settle`). `select` takes a raw JSON value exactly as the UI would send it. `next` applies
//! the next lookup to finish; `settle` applies all of them. Any lookups still outstanding when
//! the script ends are settled before the report is taken.

use ptw_core::{FieldMap, FieldName, FormSession, Mode, Notice, SyncError, TemplateLookup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    pub mode: Mode,
    #[serde(default)]
    pub record: Option<FieldMap>,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Select(serde_json::Value),
    Edit {
        field: FieldName,
        value: serde_json::Value,
    },
    Next,
    Settle,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub form_values: FieldMap,
    pub accumulated_values: FieldMap,
    pub generation: u64,
    pub missing_required_fields: Vec<FieldName>,
    pub dirty: bool,
    pub notices: Vec<Notice>,
    pub warnings: Vec<String>,
}

/// Runs `script` on a fresh session.
///
/// Recoverable errors (invalid selections, unavailable templates) are collected as warnings,
/// mirroring how a form would show them and carry on.
pub async fn run(
    script: ReplayScript,
    lookup: Arc<dyn TemplateLookup>,
    config: Arc<ptw_core::SyncConfig>,
) -> Result<ReplayReport, SyncError> {
    let mut session = FormSession::new(lookup, config)?;
    let mut notices_rx = session.subscribe();
    let mut warnings = Vec::new();

    match script.record {
        Some(record) if script.mode == Mode::Merge => session.start_editing(record),
        Some(_) => {
            return Err(SyncError::InvalidInput(
                "a record can only be replayed in merge mode".into(),
            ))
        }
        None => session.start_session(script.mode),
    }

    for step in script.steps {
        let result = match step {
            Step::Select(raw) => session.select_type_raw(&raw),
            Step::Edit { field, value } => session.edit_field(field, value),
            Step::Next => match session.next_completion().await {
                Some(outcome) => outcome.map(|_| ()),
                None => Ok(()),
            },
            Step::Settle => session.settle().await,
        };
        if let Err(e) = result {
            tracing::warn!("replay step failed: {}", e);
            warnings.push(e.to_string());
        }
    }

    if let Err(e) = session.settle().await {
        warnings.push(e.to_string());
    }

    let mut notices = Vec::new();
    loop {
        match notices_rx.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(TryRecvError::Lagged(skipped)) => {
                warnings.push(format!("{skipped} notices dropped (channel capacity)"));
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    let sync = session.synchronizer().ok_or(SyncError::NoActiveSession)?;
    Ok(ReplayReport {
        form_values: sync.form_values().clone(),
        accumulated_values: sync.accumulated_values().clone(),
        generation: sync.generation().get(),
        missing_required_fields: sync.missing_required_fields(),
        dirty: sync.is_dirty(),
        notices,
        warnings,
    })
}
