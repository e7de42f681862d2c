//! Embedded script code scanner.

use crate::{PatternDef, PatternSet, ScanResult};
use gatehouse_error::GateResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Script pattern configuration.
///
/// `blocked` covers process/OS escape and dynamic code evaluation; a
/// deployment extends it with its own denylist. `warned` covers writes to
/// shared mutable state outside the script's own scope, which are legal but
/// warrant human acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPatterns {
    /// Patterns that unconditionally fail the action
    #[serde(default)]
    pub blocked: Vec<PatternDef>,
    /// Patterns that require caller acknowledgment
    #[serde(default)]
    pub warned: Vec<PatternDef>,
}

impl Default for ScriptPatterns {
    fn default() -> Self {
        Self {
            blocked: vec![
                PatternDef::new(r"\bos\.system\s*\(", "os.system executes OS commands"),
                PatternDef::new(
                    r"\bsubprocess\.(popen|run|call|check_call|check_output)\s*\(",
                    "subprocess spawns OS processes",
                ),
                PatternDef::new(r"\beval\s*\(", "eval performs dynamic code evaluation"),
                PatternDef::new(r"\bexec\s*\(", "exec performs dynamic code evaluation"),
                PatternDef::new(
                    r"\b__import__\s*\(",
                    "__import__ loads modules dynamically",
                ),
            ],
            warned: vec![
                PatternDef::new(
                    r"\bsystem\.tag\.write(blocking|async)?\s*\(",
                    "script writes tag values outside its own scope",
                ),
                PatternDef::new(
                    r"\bglobals\s*\(\s*\)",
                    "script touches the shared global namespace",
                ),
            ],
        }
    }
}

/// Case-insensitive scanner for embedded script code.
///
/// Like [`crate::SqlScanner`], a pure function of its input.
///
/// # Examples
///
/// ```
/// use gatehouse_scan::ScriptScanner;
///
/// let scanner = ScriptScanner::default();
/// assert!(scanner.scan("import os\nos.system('rm -rf /')").has_blocked_patterns());
/// assert!(scanner.scan("value = 40 + 2").is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ScriptScanner {
    blocked: PatternSet,
    warned: PatternSet,
}

impl ScriptScanner {
    /// Compile a scanner from the given pattern configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new(patterns: ScriptPatterns) -> GateResult<Self> {
        Ok(Self {
            blocked: PatternSet::compile(patterns.blocked)?,
            warned: PatternSet::compile(patterns.warned)?,
        })
    }

    /// Scan script code. Empty input yields an empty result, never an error.
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    pub fn scan(&self, code: &str) -> ScanResult {
        let mut result = ScanResult::default();
        if code.trim().is_empty() {
            return result;
        }

        self.blocked.collect_blocked(code, &mut result);
        self.warned.collect_warnings(code, &mut result);

        if result.has_blocked_patterns() {
            debug!(
                blocked = result.blocked_patterns.len(),
                "script code matched blocked patterns"
            );
        }
        result
    }
}

impl Default for ScriptScanner {
    fn default() -> Self {
        Self::new(ScriptPatterns::default()).expect("built-in script patterns compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> ScriptScanner {
        ScriptScanner::default()
    }

    #[test]
    fn test_empty_input_is_clean() {
        assert!(scanner().scan("").is_empty());
    }

    #[test]
    fn test_blocked_os_escape() {
        assert!(scanner()
            .scan("import os\nos.system('rm -rf /')")
            .has_blocked_patterns());
        assert!(scanner()
            .scan("subprocess.Popen(['ls', '-la'])")
            .has_blocked_patterns());
        assert!(scanner()
            .scan("subprocess.check_output('whoami')")
            .has_blocked_patterns());
    }

    #[test]
    fn test_blocked_dynamic_evaluation() {
        assert!(scanner().scan("eval(user_input)").has_blocked_patterns());
        assert!(scanner().scan("exec(compiled)").has_blocked_patterns());
        assert!(scanner().scan("__import__('os')").has_blocked_patterns());
    }

    #[test]
    fn test_benign_code_is_clean() {
        let result = scanner().scan("total = sum(values)\nreturn total / len(values)");
        assert!(result.is_empty());
    }

    #[test]
    fn test_tag_write_warns_but_does_not_block() {
        let result = scanner().scan("system.tag.writeBlocking(['[default]Pump1/speed'], [50])");
        assert!(!result.has_blocked_patterns());
        assert!(result.warnings.iter().any(|w| w.contains("tag values")));
    }

    #[test]
    fn test_globals_access_warns() {
        let result = scanner().scan("state = globals()");
        assert!(result.warnings.iter().any(|w| w.contains("global namespace")));
    }

    #[test]
    fn test_blocked_still_reports_warnings() {
        let code = "system.tag.write('/x', eval(payload))";
        let result = scanner().scan(code);
        assert!(result.has_blocked_patterns());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_deployment_denylist_extension() {
        let mut patterns = ScriptPatterns::default();
        patterns
            .blocked
            .push(PatternDef::new(r"\bopen\s*\(", "file access denied by deployment"));
        let scanner = ScriptScanner::new(patterns).unwrap();
        assert!(scanner.scan("f = open('/etc/passwd')").has_blocked_patterns());
    }

    #[test]
    fn test_word_boundary_avoids_false_positives() {
        // "evaluate(" is not "eval("
        assert!(!scanner().scan("score = evaluate(model)").has_blocked_patterns());
        // "execute(" is not "exec(" either
        assert!(!scanner().scan("cursor.execute(query)").has_blocked_patterns());
    }
}
