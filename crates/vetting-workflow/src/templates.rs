//! Message Templates
//!
//! Reusable notification bodies keyed by scenario. Read-only to the engine:
//! a template id resolves to content with `{placeholder}` substitution, and a
//! missing template falls back to the caller-supplied text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Notification scenario a template is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageScenario {
    Approval,
    Rejection,
    MoreInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub scenario: MessageScenario,
    pub content: String,
}

impl MessageTemplate {
    /// Substitute `{key}` placeholders from the variable map. Unknown
    /// placeholders are left as-is.
    pub fn render(&self, vars: &HashMap<String, String>) -> String {
        let mut out = self.content.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

/// Read-only template lookup used by the engine.
pub trait TemplateStore: Send + Sync {
    fn get(&self, id: &str) -> Option<MessageTemplate>;
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse template file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// In-memory template registry with built-in defaults per scenario.
/// Additional templates loaded from YAML override same-id entries.
#[derive(Debug, Clone)]
pub struct StaticTemplateStore {
    templates: HashMap<String, MessageTemplate>,
}

impl StaticTemplateStore {
    pub fn insert(&mut self, template: MessageTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Merge templates from a YAML list of `{id, scenario, content}` entries.
    pub fn load_yaml_file(&mut self, path: &Path) -> Result<(), TemplateError> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: Vec<MessageTemplate> = serde_yaml::from_str(&raw)?;
        for template in parsed {
            self.insert(template);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for StaticTemplateStore {
    fn default() -> Self {
        let mut store = Self {
            templates: HashMap::new(),
        };
        store.insert(MessageTemplate {
            id: "approval_default".into(),
            scenario: MessageScenario::Approval,
            content: "Hello {name}, your verification request has been approved. \
                      You now have full access to your account."
                .into(),
        });
        store.insert(MessageTemplate {
            id: "rejection_default".into(),
            scenario: MessageScenario::Rejection,
            content: "Hello {name}, unfortunately your verification request was \
                      rejected. Reason: {reason}"
                .into(),
        });
        store.insert(MessageTemplate {
            id: "more_info_default".into(),
            scenario: MessageScenario::MoreInfo,
            content: "Hello {name}, we need additional information to continue your \
                      verification: {fields}"
                .into(),
        });
        store
    }
}

impl TemplateStore for StaticTemplateStore {
    fn get(&self, id: &str) -> Option<MessageTemplate> {
        self.templates.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_scenario() {
        let store = StaticTemplateStore::default();
        assert!(store.get("approval_default").is_some());
        assert!(store.get("rejection_default").is_some());
        assert!(store.get("more_info_default").is_some());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let template = MessageTemplate {
            id: "t".into(),
            scenario: MessageScenario::MoreInfo,
            content: "Hi {name}, please provide: {fields}. Keep {unknown}.".into(),
        };
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Dana".to_string());
        vars.insert("fields".to_string(), "national_id, address".to_string());

        assert_eq!(
            template.render(&vars),
            "Hi Dana, please provide: national_id, address. Keep {unknown}."
        );
    }

    #[test]
    fn yaml_load_overrides_same_id_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- id: approval_default\n  scenario: approval\n  content: Short approval note for {{name}}\n\
             - id: approval_designer\n  scenario: approval\n  content: Welcome aboard, {{name}}"
        )
        .unwrap();

        let mut store = StaticTemplateStore::default();
        let before = store.len();
        store.load_yaml_file(file.path()).unwrap();

        assert_eq!(store.len(), before + 1);
        let overridden = store.get("approval_default").unwrap();
        assert!(overridden.content.starts_with("Short approval"));
    }
}
