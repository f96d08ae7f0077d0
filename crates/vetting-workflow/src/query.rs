//! Query Surface
//!
//! Typed filter + pagination for the admin process list. One filtered,
//! server-side-paginated query; filters combine conjunctively. Clients never
//! receive unbounded result sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vetting_types::{Priority, ProcessStatus, RiskLevel, VerificationProcess};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// Conjunctive filter over processes. Empty vectors and `None` fields match
/// everything for that dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<ProcessStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priorities: Vec<Priority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_levels: Vec<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_reviewer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on submitted name or email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Only processes whose more-info deadline has elapsed
    #[serde(default)]
    pub overdue_only: bool,
}

impl ProcessFilter {
    pub fn with_status(status: ProcessStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn matches(&self, process: &VerificationProcess, now: DateTime<Utc>) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&process.status) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&process.priority) {
            return false;
        }
        if !self.risk_levels.is_empty() {
            match &process.risk_assessment {
                Some(risk) if self.risk_levels.contains(&risk.level) => {}
                _ => return false,
            }
        }
        if let Some(reviewer) = &self.assigned_reviewer {
            if process.assigned_reviewer.as_deref() != Some(reviewer.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if process.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if process.created_at > before {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let name_hit = process.request.full_name.to_lowercase().contains(&needle);
            let email_hit = process.request.email.to_lowercase().contains(&needle);
            if !name_hit && !email_hit {
                return false;
            }
        }
        if self.overdue_only && !process.is_overdue(now) {
            return false;
        }
        true
    }
}

/// Offset/limit pagination request; the limit is clamped to [`MAX_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn first() -> Self {
        Self::default()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results with the total match count for pagination controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.offset + self.items.len() >= self.total
    }
}
