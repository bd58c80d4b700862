//! Constants used throughout the PTW core crate.
//!
//! Field names, environment variable names and catalog limits live here so the synchronizer,
//! the catalog loader and the host binary agree on them.

/// Form field holding the selected permit type.
///
/// The synchronizer owns this field: template defaults never overwrite it and it is never
/// removed when a template is applied.
pub use ptw_types::PERMIT_TYPE_FIELD;

/// Default buffer size of the notice broadcast channel.
pub const DEFAULT_NOTICE_CAPACITY: usize = 64;

/// File extensions accepted by the YAML template catalog.
pub const TEMPLATE_FILE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Maximum number of template files in a catalog directory.
pub const MAX_TEMPLATE_FILES: usize = 500;

/// Maximum total size of a catalog directory.
pub const MAX_TEMPLATE_BYTES: u64 = 8 * 1024 * 1024; // 8 MiB

/// Environment variable: fetch timeout in milliseconds.
pub const ENV_FETCH_TIMEOUT_MS: &str = "PTW_FETCH_TIMEOUT_MS";

/// Environment variable: blank value policy (`unset` or `set`).
pub const ENV_BLANK_POLICY: &str = "PTW_BLANK_POLICY";

/// Environment variable: notice channel capacity.
pub const ENV_NOTICE_CAPACITY: &str = "PTW_NOTICE_CAPACITY";

/// Environment variable: directory of YAML permit templates.
pub const ENV_TEMPLATE_DIR: &str = "PTW_TEMPLATE_DIR";
