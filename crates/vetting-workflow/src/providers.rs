//! Risk Assessment Seam
//!
//! Risk scores are consumed from an external provider, never computed here.
//! Provider failure at process creation is tolerated (the process is created
//! unscored); explicit re-scoring surfaces the failure to the caller.

use async_trait::async_trait;
use thiserror::Error;

use vetting_types::{RiskAssessment, RiskLevel, VerificationRequest};

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("risk provider unavailable: {0}")]
    Unavailable(String),

    #[error("risk provider rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait RiskAssessmentProvider: Send + Sync {
    async fn assess(&self, request: &VerificationRequest) -> Result<RiskAssessment, RiskError>;
}

/// Provider returning a fixed assessment. Used in tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedRiskProvider {
    pub score: u8,
    pub level: RiskLevel,
}

impl FixedRiskProvider {
    pub fn new(score: u8, level: RiskLevel) -> Self {
        Self { score, level }
    }
}

impl Default for FixedRiskProvider {
    fn default() -> Self {
        Self::new(10, RiskLevel::Low)
    }
}

#[async_trait]
impl RiskAssessmentProvider for FixedRiskProvider {
    async fn assess(&self, _request: &VerificationRequest) -> Result<RiskAssessment, RiskError> {
        Ok(RiskAssessment::new(self.score, self.level))
    }
}
