//! Injectable pattern set configuration.

use crate::{BlockedPattern, ScanResult};
use gatehouse_error::{GateError, GateErrorKind, GateResult};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// One pattern definition: a regex source plus its threat description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    /// Regex source, matched case-insensitively
    pub pattern: String,
    /// Human-readable description of what the pattern detects
    pub description: String,
}

impl PatternDef {
    /// Create a pattern definition.
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

/// An ordered, compiled set of patterns.
///
/// Compilation is case-insensitive and validated up front, so a scan can
/// never fail at match time.
#[derive(Debug, Clone)]
pub struct PatternSet {
    compiled: Vec<(regex::Regex, PatternDef)>,
}

impl PatternSet {
    /// Compile a set of pattern definitions.
    ///
    /// # Errors
    ///
    /// Returns [`GateErrorKind::InvalidPattern`] for the first definition
    /// whose regex fails to compile.
    pub fn compile(defs: Vec<PatternDef>) -> GateResult<Self> {
        let mut compiled = Vec::with_capacity(defs.len());
        for def in defs {
            let regex = RegexBuilder::new(&def.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    GateError::new(GateErrorKind::InvalidPattern {
                        pattern: def.pattern.clone(),
                        reason: e.to_string(),
                    })
                })?;
            compiled.push((regex, def));
        }
        Ok(Self { compiled })
    }

    /// Append every matching pattern to `result.blocked_patterns`.
    pub fn collect_blocked(&self, text: &str, result: &mut ScanResult) {
        for (regex, def) in &self.compiled {
            if regex.is_match(text) {
                result.blocked_patterns.push(BlockedPattern {
                    pattern: def.pattern.clone(),
                    description: def.description.clone(),
                });
            }
        }
    }

    /// Append a warning for every matching pattern.
    pub fn collect_warnings(&self, text: &str, result: &mut ScanResult) {
        for (regex, def) in &self.compiled {
            if regex.is_match(text) {
                result.warnings.push(def.description.clone());
            }
        }
    }

    /// Number of patterns in the set.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
