use crate::template::Generation;
use ptw_types::PermitTypeId;
use serde::Serialize;

/// User-facing feedback published by a form session, for example to drive a success or warning
/// banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    TemplateApplied {
        permit_type: PermitTypeId,
        generation: Generation,
    },
    TemplateUnavailable {
        permit_type: PermitTypeId,
        generation: Generation,
        reason: String,
    },
}
