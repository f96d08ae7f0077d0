//! Rejection Reason Taxonomy
//!
//! Closed, configuration-supplied set of rejection reason codes. The engine
//! refuses any `reason_code` outside this set. Ships with a built-in default
//! set; deployments override it from a YAML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonCode {
    pub code: String,
    /// Human-readable label shown to admins and used as notification fallback
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct RejectionTaxonomy {
    codes: Vec<ReasonCode>,
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse taxonomy file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("taxonomy must define at least one reason code")]
    Empty,
}

impl RejectionTaxonomy {
    pub fn new(codes: Vec<ReasonCode>) -> Result<Self, TaxonomyError> {
        if codes.is_empty() {
            return Err(TaxonomyError::Empty);
        }
        Ok(Self { codes })
    }

    /// Load a replacement taxonomy from a YAML list of `{code, label}` entries.
    pub fn from_yaml_file(path: &Path) -> Result<Self, TaxonomyError> {
        let raw = std::fs::read_to_string(path)?;
        let codes: Vec<ReasonCode> = serde_yaml::from_str(&raw)?;
        Self::new(codes)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.code == code)
    }

    pub fn get(&self, code: &str) -> Option<&ReasonCode> {
        self.codes.iter().find(|c| c.code == code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &ReasonCode> {
        self.codes.iter()
    }
}

impl Default for RejectionTaxonomy {
    fn default() -> Self {
        let entry = |code: &str, label: &str| ReasonCode {
            code: code.to_string(),
            label: label.to_string(),
        };
        Self {
            codes: vec![
                entry("incomplete_docs", "Submitted documents are incomplete"),
                entry("invalid_documents", "Submitted documents are invalid or unreadable"),
                entry("identity_mismatch", "Identity details do not match the documents"),
                entry(
                    "credential_unverifiable",
                    "Professional credentials could not be verified",
                ),
                entry("duplicate_account", "Another verified account exists for this identity"),
                entry("quality_standards", "Submission does not meet quality standards"),
                entry("fraud_suspected", "Submission flagged for suspected fraud"),
                entry("other", "Rejected for another reason (see details)"),
            ],
        }
    }
}
