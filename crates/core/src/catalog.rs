//! YAML-backed permit template catalog.
//!
//! A catalog directory holds one file per permit type. The file stem is the permit type id
//! (all-digit stems become numeric ids):
//!
//! ```text
//! templates/
//!   hot-work.yaml
//!   confined-space.yaml
//!   12.yml
//! ```
//!
//! Each file is a [`TemplateDescriptor`]:
//!
//! ```yaml
//! field_defaults:
//!   fire_watch: true
//!   gas_test: null
//! required_fields: [gas_test]
//! visible_fields: [fire_watch, gas_test]
//! ```
//!
//! The directory is scanned once at load time with the same guardrails applied to any
//! operator-supplied directory: no symlinks, no nested directories, no foreign file types, and
//! bounded file count and total size. Hidden entries (names starting with `.`, such as
//! `.gitkeep` or `.git`) are skipped. Anything else that is not a `.yaml`/`.yml` file, a
//! `README.md` for example, fails the load.

use crate::constants::{MAX_TEMPLATE_BYTES, MAX_TEMPLATE_FILES, TEMPLATE_FILE_EXTENSIONS};
use crate::error::LookupError;
use crate::fetcher::TemplateLookup;
use crate::template::TemplateDescriptor;
use crate::{SyncError, SyncResult};
use async_trait::async_trait;
use ptw_types::PermitTypeId;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Templates loaded from a directory of YAML files.
#[derive(Debug, Clone, Default)]
pub struct YamlTemplateCatalog {
    templates: HashMap<PermitTypeId, Arc<TemplateDescriptor>>,
}

impl YamlTemplateCatalog {
    /// Loads every template in `dir`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::FileRead`] if the directory or a file cannot be read.
    /// - [`SyncError::YamlDeserialization`] if a file is not a valid descriptor.
    /// - [`SyncError::InvalidInput`] if the directory breaks a guardrail, two files map to the
    ///   same permit type, or a descriptor references undefined fields.
    pub fn load(dir: &Path) -> SyncResult<Self> {
        let mut templates = HashMap::new();
        let mut total_bytes = 0u64;

        for entry in fs::read_dir(dir).map_err(SyncError::FileRead)? {
            let entry = entry.map_err(SyncError::FileRead)?;
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                tracing::debug!("skipping hidden entry {}", path.display());
                continue;
            }
            let metadata = fs::symlink_metadata(&path).map_err(SyncError::FileRead)?;
            let file_type = metadata.file_type();

            if file_type.is_symlink() {
                return Err(SyncError::InvalidInput(format!(
                    "template directory must not contain symlinks: {}",
                    path.display()
                )));
            }
            if !file_type.is_file() {
                return Err(SyncError::InvalidInput(format!(
                    "template directory must only contain files: {}",
                    path.display()
                )));
            }

            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !TEMPLATE_FILE_EXTENSIONS.contains(&extension) {
                return Err(SyncError::InvalidInput(format!(
                    "unsupported template file (expected .yaml or .yml): {}",
                    path.display()
                )));
            }

            total_bytes = total_bytes.saturating_add(metadata.len());
            if templates.len() >= MAX_TEMPLATE_FILES || total_bytes > MAX_TEMPLATE_BYTES {
                return Err(SyncError::InvalidInput(
                    "template directory exceeds maximum file count or total size".into(),
                ));
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let permit_type: PermitTypeId = stem.parse().map_err(|_| {
                SyncError::InvalidInput(format!(
                    "template file name is not a permit type id: {}",
                    path.display()
                ))
            })?;

            let contents = fs::read_to_string(&path).map_err(SyncError::FileRead)?;
            let descriptor: TemplateDescriptor =
                serde_yaml::from_str(&contents).map_err(SyncError::YamlDeserialization)?;
            descriptor.validate()?;

            if templates.insert(permit_type.clone(), Arc::new(descriptor)).is_some() {
                return Err(SyncError::InvalidInput(format!(
                    "duplicate template for permit type {permit_type}"
                )));
            }
        }

        tracing::info!(
            "loaded {} permit templates from {}",
            templates.len(),
            dir.display()
        );

        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Permit types with a template, in sorted order.
    pub fn permit_types(&self) -> Vec<PermitTypeId> {
        let mut ids: Vec<_> = self.templates.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl TemplateLookup for YamlTemplateCatalog {
    async fn fetch_template(
        &self,
        permit_type: &PermitTypeId,
    ) -> Result<Option<Arc<TemplateDescriptor>>, LookupError> {
        Ok(self.templates.get(permit_type).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptw_types::FieldName;
    use serde_json::json;
    use tempfile::TempDir;

    const HOT_WORK: &str = "field_defaults:\n  fire_watch: true\n  extinguisher: null\nrequired_fields: [extinguisher]\n";
    const ELECTRICAL: &str = "field_defaults:\n  isolation_point: \"\"\n";

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_load_reads_text_and_numeric_ids() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        write(&dir, "12.yml", ELECTRICAL);

        let catalog = YamlTemplateCatalog::load(dir.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.permit_types(),
            vec![
                PermitTypeId::Numeric(12),
                PermitTypeId::text("hot-work").unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_catalog_serves_templates() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        let catalog = YamlTemplateCatalog::load(dir.path()).unwrap();

        let descriptor = catalog
            .fetch_template(&PermitTypeId::text("hot-work").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            descriptor.field_defaults[&FieldName::new("fire_watch").unwrap()],
            json!(true)
        );

        let missing = catalog
            .fetch_template(&PermitTypeId::Numeric(99))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_load_rejects_foreign_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        write(&dir, "notes.txt", "not a template");

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn test_load_skips_hidden_entries() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        write(&dir, ".gitkeep", "");
        fs::create_dir(dir.path().join(".git")).unwrap();

        let catalog = YamlTemplateCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.permit_types(), vec![PermitTypeId::text("hot-work").unwrap()]);
    }

    #[test]
    fn test_load_rejects_readme() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        write(&dir, "README.md", "# templates");

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(msg) if msg.contains("README.md")));
    }

    #[test]
    fn test_load_rejects_nested_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn test_load_rejects_duplicate_permit_types() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", HOT_WORK);
        write(&dir, "hot-work.yml", HOT_WORK);

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        write(&dir, "hot-work.yaml", "field_defaults: [unclosed");

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::YamlDeserialization(_)));
    }

    #[test]
    fn test_load_rejects_undefined_required_field() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "hot-work.yaml",
            "field_defaults:\n  fire_watch: true\nrequired_fields: [permit_holder]\n",
        );

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(msg) if msg.contains("permit_holder")));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_rejects_symlinks() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("hot-work.yaml");
        fs::write(&target, HOT_WORK).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("hot-work.yaml")).unwrap();

        let err = YamlTemplateCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(msg) if msg.contains("symlink")));
    }
}
