//! Async driver for a permit form session.
//!
//! [`FormSession`] connects a [`FormStateSynchronizer`] to a [`TemplateFetcher`] on a tokio
//! runtime. Selections spawn a lookup task; every task reports back over one channel, and the
//! session applies completions one at a time as the host awaits them. State is only touched
//! from `&mut self` methods, so reactions never interleave and no lock guards the form state.
//!
//! ```ignore
//! let mut session = FormSession::new(lookup, Arc::new(SyncConfig::default()))?;
//! let mut notices = session.subscribe();
//! session.start_session(Mode::Create);
//! session.select_type(Some(PermitTypeId::text("hot-work")?))?;
//! session.settle().await?;
//! ```

use crate::config::SyncConfig;
use crate::fetcher::{TemplateFetcher, TemplateLookup};
use crate::notice::Notice;
use crate::state::{FormStateSynchronizer, Mode, ResolutionOutcome};
use crate::template::{FieldMap, Generation, TemplateCompletion, TemplateRequest};
use crate::{SyncError, SyncResult};
use ptw_types::{FieldName, PermitTypeId};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

pub struct FormSession {
    id: Uuid,
    config: Arc<SyncConfig>,
    fetcher: TemplateFetcher,
    runtime: Handle,
    sync: Option<FormStateSynchronizer>,
    // Highest generation handed out so far, across all sessions on this driver.
    generation_floor: Generation,
    completion_tx: mpsc::UnboundedSender<TemplateCompletion>,
    completion_rx: mpsc::UnboundedReceiver<TemplateCompletion>,
    in_flight: usize,
    notices: broadcast::Sender<Notice>,
}

impl FormSession {
    /// Creates an idle session driver bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RuntimeUnavailable`] when called outside a tokio runtime.
    pub fn new(lookup: Arc<dyn TemplateLookup>, config: Arc<SyncConfig>) -> SyncResult<Self> {
        let runtime = Handle::try_current().map_err(|_| SyncError::RuntimeUnavailable)?;
        let fetcher = TemplateFetcher::new(lookup).with_timeout(config.fetch_timeout());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(config.notice_capacity());

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            fetcher,
            runtime,
            sync: None,
            generation_floor: Generation::default(),
            completion_tx,
            completion_rx,
            in_flight: 0,
            notices,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribes to template notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Starts a fresh session with empty state, ending any active one.
    pub fn start_session(&mut self, mode: Mode) {
        self.end_session();
        self.sync = Some(FormStateSynchronizer::starting_at(
            mode,
            self.config.blank_policy(),
            self.generation_floor,
        ));
        tracing::info!(session = %self.id, ?mode, "form session started");
    }

    /// Starts a `Merge` session seeded with an existing record.
    pub fn start_editing(&mut self, record: FieldMap) {
        self.end_session();
        let fields = record.len();
        self.sync = Some(
            FormStateSynchronizer::starting_at(
                Mode::Merge,
                self.config.blank_policy(),
                self.generation_floor,
            )
            .with_record(record),
        );
        tracing::info!(session = %self.id, fields, "form session started for existing record");
    }

    /// Ends the active session and discards its state.
    ///
    /// Lookups still in flight complete later and are discarded.
    pub fn end_session(&mut self) {
        if let Some(sync) = self.sync.take() {
            // The next session starts one past this one, so no outstanding request matches.
            self.generation_floor = sync.generation().next();
            tracing::info!(session = %self.id, in_flight = self.in_flight, "form session ended");
        }
    }

    pub fn is_active(&self) -> bool {
        self.sync.is_some()
    }

    /// Read access to the active session's state.
    pub fn synchronizer(&self) -> Option<&FormStateSynchronizer> {
        self.sync.as_ref()
    }

    /// Current form values, or `None` when no session is active.
    pub fn form_values(&self) -> Option<&FieldMap> {
        self.sync.as_ref().map(FormStateSynchronizer::form_values)
    }

    /// Number of lookups that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn active(&mut self) -> SyncResult<&mut FormStateSynchronizer> {
        self.sync.as_mut().ok_or(SyncError::NoActiveSession)
    }

    /// Selects a permit type, spawning its template lookup.
    pub fn select_type(&mut self, permit_type: Option<PermitTypeId>) -> SyncResult<()> {
        let request = self.active()?.on_type_selected(permit_type);
        if let Some(request) = request {
            self.spawn_resolution(request);
        }
        Ok(())
    }

    /// Selects a permit type from a raw UI value.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSelection`] for malformed values, leaving state untouched.
    pub fn select_type_raw(&mut self, raw: &serde_json::Value) -> SyncResult<()> {
        let request = self.active()?.on_type_selected_raw(raw)?;
        if let Some(request) = request {
            self.spawn_resolution(request);
        }
        Ok(())
    }

    /// Records a field edit.
    pub fn edit_field(&mut self, field: FieldName, value: serde_json::Value) -> SyncResult<()> {
        self.active()?.on_field_edited(field, value);
        Ok(())
    }

    fn spawn_resolution(&mut self, request: TemplateRequest) {
        let fetcher = self.fetcher.clone();
        let tx = self.completion_tx.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let completion = fetcher
                .resolve(request.permit_type, request.generation)
                .await;
            // The receiver lives as long as the session; a send error means it was dropped.
            let _ = tx.send(completion);
        });
    }

    /// Waits for the next lookup to finish and applies it.
    ///
    /// Returns `None` when nothing is in flight. Applied and unavailable outcomes for the
    /// current selection are also published as [`Notice`]s.
    pub async fn next_completion(&mut self) -> Option<SyncResult<ResolutionOutcome>> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        self.in_flight -= 1;
        Some(self.apply_completion(completion))
    }

    fn apply_completion(&mut self, completion: TemplateCompletion) -> SyncResult<ResolutionOutcome> {
        let Some(sync) = self.sync.as_mut() else {
            let generation = match &completion {
                Ok(resolved) => resolved.generation,
                Err(failure) => failure.generation,
            };
            tracing::debug!(session = %self.id, %generation, "completion arrived after session ended");
            return Ok(ResolutionOutcome::Discarded { generation });
        };

        let outcome = sync.on_resolution(completion);
        let notice = match &outcome {
            Ok(ResolutionOutcome::Applied {
                permit_type,
                generation,
            }) => Some(Notice::TemplateApplied {
                permit_type: permit_type.clone(),
                generation: *generation,
            }),
            Ok(ResolutionOutcome::Discarded { .. }) => None,
            Err(SyncError::TemplateUnavailable {
                permit_type,
                reason,
            }) => Some(Notice::TemplateUnavailable {
                permit_type: permit_type.clone(),
                generation: sync.generation(),
                reason: reason.to_string(),
            }),
            Err(_) => None,
        };

        if let Some(notice) = notice {
            // No subscribers is not an error.
            let _ = self.notices.send(notice);
        }
        outcome
    }

    /// Applies every outstanding lookup.
    ///
    /// # Errors
    ///
    /// Returns the last [`SyncError::TemplateUnavailable`] seen for a current selection, after
    /// all outstanding lookups have been processed.
    pub async fn settle(&mut self) -> SyncResult<()> {
        let mut last_error = None;
        while let Some(result) = self.next_completion().await {
            if let Err(e) = result {
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
