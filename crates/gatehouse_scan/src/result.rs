//! Scan outcome types.

use serde::{Deserialize, Serialize};

/// A blocked pattern finding: which signature matched and why it matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPattern {
    /// The pattern source that matched
    pub pattern: String,
    /// Human-readable description of the threat
    pub description: String,
}

/// Result of scanning one content blob.
///
/// # Examples
///
/// ```
/// use gatehouse_scan::ScanResult;
///
/// let clean = ScanResult::default();
/// assert!(!clean.has_blocked_patterns());
/// assert!(clean.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScanResult {
    /// Findings that unconditionally fail the action
    pub blocked_patterns: Vec<BlockedPattern>,
    /// Findings that require caller acknowledgment
    pub warnings: Vec<String>,
}

impl ScanResult {
    /// Whether any blocked pattern matched.
    pub fn has_blocked_patterns(&self) -> bool {
        !self.blocked_patterns.is_empty()
    }

    /// Whether any warning was raised.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether the scan found nothing at all.
    pub fn is_empty(&self) -> bool {
        self.blocked_patterns.is_empty() && self.warnings.is_empty()
    }
}
