//! Service Configuration
//!
//! Deployment-supplied configuration: the closed rejection reason taxonomy
//! and the notification template set, each optionally loaded from YAML.

use std::path::Path;

use anyhow::{Context, Result};

use vetting_workflow::{RejectionTaxonomy, StaticTemplateStore};

/// Configuration bundle handed to the service at startup.
#[derive(Debug, Clone, Default)]
pub struct ReviewConfig {
    pub taxonomy: RejectionTaxonomy,
    pub templates: StaticTemplateStore,
}

impl ReviewConfig {
    /// Load configuration, falling back to the built-in defaults for any
    /// path not supplied. A supplied taxonomy file replaces the default set;
    /// a supplied template file merges over it.
    pub fn load(taxonomy_path: Option<&Path>, templates_path: Option<&Path>) -> Result<Self> {
        let taxonomy = match taxonomy_path {
            Some(path) => RejectionTaxonomy::from_yaml_file(path)
                .with_context(|| format!("loading rejection taxonomy from {}", path.display()))?,
            None => RejectionTaxonomy::default(),
        };

        let mut templates = StaticTemplateStore::default();
        if let Some(path) = templates_path {
            templates
                .load_yaml_file(path)
                .with_context(|| format!("loading message templates from {}", path.display()))?;
        }

        Ok(Self {
            taxonomy,
            templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vetting_workflow::TemplateStore;

    #[test]
    fn defaults_require_no_files() {
        let config = ReviewConfig::load(None, None).unwrap();
        assert!(config.taxonomy.contains("incomplete_docs"));
        assert!(!config.templates.is_empty());
    }

    #[test]
    fn files_override_the_defaults() {
        let mut taxonomy = tempfile::NamedTempFile::new().unwrap();
        writeln!(taxonomy, "- code: region_unsupported\n  label: Region not supported").unwrap();

        let mut templates = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            templates,
            "- id: approval_vip\n  scenario: approval\n  content: Welcome, {{name}}!"
        )
        .unwrap();

        let config = ReviewConfig::load(Some(taxonomy.path()), Some(templates.path())).unwrap();
        assert!(config.taxonomy.contains("region_unsupported"));
        assert!(!config.taxonomy.contains("incomplete_docs"));
        assert!(config.templates.get("approval_vip").is_some());
        assert!(config.templates.get("approval_default").is_some());
    }

    #[test]
    fn a_broken_file_is_a_startup_error() {
        let mut taxonomy = tempfile::NamedTempFile::new().unwrap();
        writeln!(taxonomy, "{{ not yaml").unwrap();
        assert!(ReviewConfig::load(Some(taxonomy.path()), None).is_err());
    }
}
