//! Form state synchronization.
//!
//! A permit form keeps three views of its field values:
//!
//! - **form values**: what the bound controls display
//! - **draft snapshot**: the mirror used for dirty checks and save payloads
//! - **accumulated values**: every value entered during the session, including fields the
//!   current permit type does not use, so switching types back and forth loses nothing
//!
//! All three live in one [`FormState`] that only [`FormStateSynchronizer`] mutates. Every
//! mutation leaves the draft snapshot equal to the form values.
//!
//! ## Generations
//!
//! Each type selection bumps a [`Generation`] counter and asks for a template tagged with the
//! new generation. When the template arrives, it is applied only if its generation is still
//! current. A completion for an older selection is dropped, whatever order lookups complete
//! in.

use crate::config::BlankValuePolicy;
use crate::constants::PERMIT_TYPE_FIELD;
use crate::template::{FieldMap, Generation, TemplateCompletion, TemplateDescriptor, TemplateRequest};
use crate::validation::{is_blank, parse_permit_type_selection};
use crate::SyncResult;
use ptw_types::{FieldName, PermitTypeId};
use serde::Deserialize;
use std::sync::Arc;

/// Whether the session produces a new record or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// New record: template defaults always win.
    Create,
    /// Existing record: values already present win over template defaults.
    Merge,
}

/// The template currently shaping the form.
#[derive(Debug, Clone)]
pub struct AppliedTemplate {
    pub permit_type: PermitTypeId,
    pub generation: Generation,
    pub descriptor: Arc<TemplateDescriptor>,
}

/// What happened to a template completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Applied {
        permit_type: PermitTypeId,
        generation: Generation,
    },
    /// A newer selection superseded the request; nothing changed.
    Discarded { generation: Generation },
}

/// The three dependent state slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    form_values: FieldMap,
    draft_snapshot: FieldMap,
    accumulated_values: FieldMap,
}

impl FormState {
    fn write(&mut self, field: FieldName, value: serde_json::Value) {
        self.form_values.insert(field.clone(), value.clone());
        self.draft_snapshot.insert(field.clone(), value.clone());
        self.accumulated_values.insert(field, value);
    }

    pub fn form_values(&self) -> &FieldMap {
        &self.form_values
    }

    pub fn draft_snapshot(&self) -> &FieldMap {
        &self.draft_snapshot
    }

    pub fn accumulated_values(&self) -> &FieldMap {
        &self.accumulated_values
    }
}

/// Owns the form state of one session and applies templates to it.
#[derive(Debug, Clone)]
pub struct FormStateSynchronizer {
    mode: Mode,
    blank_policy: BlankValuePolicy,
    generation: Generation,
    state: FormState,
    applied: Option<AppliedTemplate>,
    baseline: FieldMap,
}

impl FormStateSynchronizer {
    pub fn new(mode: Mode, blank_policy: BlankValuePolicy) -> Self {
        Self::starting_at(mode, blank_policy, Generation::default())
    }

    /// Creates a synchronizer whose generation counter starts at `generation`.
    ///
    /// Used when a session is restarted while lookups from the previous one may still be in
    /// flight: starting above every generation already handed out keeps those stale.
    pub fn starting_at(mode: Mode, blank_policy: BlankValuePolicy, generation: Generation) -> Self {
        Self {
            mode,
            blank_policy,
            generation,
            state: FormState::default(),
            applied: None,
            baseline: FieldMap::new(),
        }
    }

    /// Seeds all three slices with an existing record's values.
    ///
    /// The record becomes the baseline for [`is_dirty`](Self::is_dirty).
    pub fn with_record(mut self, record: FieldMap) -> Self {
        for (field, value) in record {
            self.state.write(field, value);
        }
        self.baseline = self.state.draft_snapshot.clone();
        self
    }

    /// Handles a permit type selection.
    ///
    /// The selection is recorded in all three slices immediately, so it survives a failed or
    /// superseded lookup. Returns the template request to hand to the fetcher, or `None` for an
    /// unset selection, which instead clears the fields contributed by the applied template.
    pub fn on_type_selected(&mut self, permit_type: Option<PermitTypeId>) -> Option<TemplateRequest> {
        self.generation = self.generation.next();

        let Some(permit_type) = permit_type else {
            if let Some(applied) = self.applied.take() {
                for field in applied.descriptor.field_defaults.keys() {
                    if field.as_str() == PERMIT_TYPE_FIELD {
                        continue;
                    }
                    self.state.form_values.remove(field);
                    self.state.draft_snapshot.remove(field);
                }
            }
            self.state.write(FieldName::permit_type(), serde_json::Value::Null);
            tracing::debug!(generation = %self.generation, "permit type cleared");
            return None;
        };

        self.state.write(FieldName::permit_type(), permit_type.to_json());
        tracing::debug!(%permit_type, generation = %self.generation, "permit type selected");

        Some(TemplateRequest {
            permit_type,
            generation: self.generation,
        })
    }

    /// Handles a raw selection value straight from the UI.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSelection`](crate::SyncError::InvalidSelection) for a
    /// malformed value. State and generation are left untouched in that case.
    pub fn on_type_selected_raw(
        &mut self,
        raw: &serde_json::Value,
    ) -> SyncResult<Option<TemplateRequest>> {
        let permit_type = parse_permit_type_selection(raw)?;
        Ok(self.on_type_selected(permit_type))
    }

    /// Handles the outcome of a template lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::TemplateUnavailable`](crate::SyncError::TemplateUnavailable) when
    /// the lookup for the current selection failed. The form values and draft snapshot are
    /// left exactly as they were. Failures for superseded selections are discarded like stale
    /// successes.
    pub fn on_resolution(&mut self, completion: TemplateCompletion) -> SyncResult<ResolutionOutcome> {
        let generation = match &completion {
            Ok(resolved) => resolved.generation,
            Err(failure) => failure.generation,
        };

        if generation != self.generation {
            tracing::debug!(
                %generation,
                current = %self.generation,
                "discarding stale template completion"
            );
            return Ok(ResolutionOutcome::Discarded { generation });
        }

        match completion {
            Ok(resolved) => {
                self.apply_template(&resolved.descriptor, self.mode);
                tracing::info!(
                    permit_type = %resolved.permit_type,
                    %generation,
                    fields = resolved.descriptor.field_defaults.len(),
                    "template applied"
                );
                self.applied = Some(AppliedTemplate {
                    permit_type: resolved.permit_type.clone(),
                    generation,
                    descriptor: resolved.descriptor,
                });
                Ok(ResolutionOutcome::Applied {
                    permit_type: resolved.permit_type,
                    generation,
                })
            }
            Err(failure) => {
                tracing::warn!(
                    permit_type = %failure.permit_type,
                    %generation,
                    reason = %failure.reason,
                    "template unavailable, keeping current fields"
                );
                Err(failure.into_error())
            }
        }
    }

    /// Applies `descriptor` to the form values.
    ///
    /// - `Create`: every template field takes the template default.
    /// - `Merge`: a template field keeps its current value if it has a user-set one, otherwise
    ///   takes the value remembered in the accumulated slice, otherwise the default.
    ///
    /// Fields the template does not define are dropped from the form values but remain in the
    /// accumulated slice. The permit type field is always kept. Afterwards the draft snapshot
    /// equals the form values, and every form value is written into the accumulated slice.
    pub fn apply_template(&mut self, descriptor: &TemplateDescriptor, mode: Mode) {
        let policy = self.blank_policy;
        let state = &mut self.state;
        let mut next = FieldMap::new();

        if let Some(selected) = state.form_values.get(PERMIT_TYPE_FIELD) {
            next.insert(FieldName::permit_type(), selected.clone());
        }

        for (field, default) in &descriptor.field_defaults {
            if field.as_str() == PERMIT_TYPE_FIELD {
                continue;
            }
            let value = match mode {
                Mode::Create => default,
                Mode::Merge => state
                    .form_values
                    .get(field)
                    .filter(|v| policy.counts_as_set(v))
                    .or_else(|| {
                        state
                            .accumulated_values
                            .get(field)
                            .filter(|v| policy.counts_as_set(v))
                    })
                    .unwrap_or(default),
            };
            next.insert(field.clone(), value.clone());
        }

        for (field, value) in &state.form_values {
            if !next.contains_key(field) {
                state
                    .accumulated_values
                    .entry(field.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        state.form_values = next;
        state.draft_snapshot = state.form_values.clone();
        for (field, value) in &state.form_values {
            state
                .accumulated_values
                .insert(field.clone(), value.clone());
        }
    }

    /// Records a user edit in all three slices.
    pub fn on_field_edited(&mut self, field: FieldName, value: serde_json::Value) {
        tracing::debug!(%field, "field edited");
        self.state.write(field, value);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn form_values(&self) -> &FieldMap {
        &self.state.form_values
    }

    pub fn draft_snapshot(&self) -> &FieldMap {
        &self.state.draft_snapshot
    }

    pub fn accumulated_values(&self) -> &FieldMap {
        &self.state.accumulated_values
    }

    /// The last template actually applied.
    ///
    /// A failed lookup leaves the previous template in place, together with the fields it put
    /// on the form, so this can name a different permit type than the `permit_type` field.
    /// [`is_field_visible`](Self::is_field_visible) and
    /// [`missing_required_fields`](Self::missing_required_fields) answer for this template.
    pub fn current_template(&self) -> Option<&AppliedTemplate> {
        self.applied.as_ref()
    }

    /// Whether the applied template shows `field`. The permit type field is always visible.
    pub fn is_field_visible(&self, field: &str) -> bool {
        if field == PERMIT_TYPE_FIELD {
            return true;
        }
        self.applied
            .as_ref()
            .is_some_and(|t| t.descriptor.visible_fields.contains(field))
    }

    /// Required fields of the applied template whose current value is missing or blank.
    pub fn missing_required_fields(&self) -> Vec<FieldName> {
        let Some(applied) = &self.applied else {
            return Vec::new();
        };
        applied
            .descriptor
            .required_fields
            .iter()
            .filter(|f| self.state.form_values.get(*f).is_none_or(is_blank))
            .cloned()
            .collect()
    }

    /// The draft snapshot as a JSON object, ready to be sent as a save payload.
    pub fn draft_payload(&self) -> serde_json::Value {
        let object = self
            .state
            .draft_snapshot
            .iter()
            .map(|(field, value)| (field.as_str().to_owned(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }

    /// Whether the draft differs from the values the session started with.
    pub fn is_dirty(&self) -> bool {
        self.state.draft_snapshot != self.baseline
    }
}
