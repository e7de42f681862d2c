//! SQL text scanner.

use crate::{PatternDef, PatternSet, ScanResult};
use gatehouse_error::GateResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// SQL pattern configuration, serializable so deployments can override the
/// shipped sets from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlPatterns {
    /// Patterns that unconditionally fail the action
    #[serde(default)]
    pub blocked: Vec<PatternDef>,
    /// Patterns that require caller acknowledgment
    #[serde(default)]
    pub warned: Vec<PatternDef>,
}

impl Default for SqlPatterns {
    fn default() -> Self {
        Self {
            blocked: vec![
                PatternDef::new(
                    r"\bdrop\s+(table|database|schema|index|view|procedure|function)\b",
                    "DROP statement mutates database schema",
                ),
                PatternDef::new(r"\btruncate\b", "TRUNCATE destroys table contents"),
                PatternDef::new(
                    r"\balter\s+(table|database|schema|index|view)\b",
                    "ALTER statement mutates database schema",
                ),
                PatternDef::new(
                    r"\bcreate\s+(table|database|schema|index|view|procedure|function|user)\b",
                    "CREATE statement mutates database schema",
                ),
                PatternDef::new(r"\bgrant\b", "GRANT modifies database privileges"),
                PatternDef::new(r"\brevoke\b", "REVOKE modifies database privileges"),
                PatternDef::new(
                    r"\bexec(ute)?\b\s*[\s(]",
                    "dynamic statement execution",
                ),
                PatternDef::new(r"xp_cmdshell", "xp_cmdshell executes OS commands"),
                PatternDef::new(r"sp_configure", "sp_configure changes server options"),
                PatternDef::new(r"\bshutdown\b", "SHUTDOWN stops the database server"),
                PatternDef::new(r";\s*--", "stacked query with comment marker"),
                PatternDef::new(r"\bsleep\s*\(", "SLEEP timing primitive"),
                PatternDef::new(r"\bbenchmark\s*\(", "BENCHMARK timing primitive"),
                PatternDef::new(r"\bwaitfor\s+delay\b", "WAITFOR DELAY timing primitive"),
                PatternDef::new(r"\bload_file\s*\(", "LOAD_FILE reads server files"),
                PatternDef::new(
                    r"\binto\s+(outfile|dumpfile)\b",
                    "INTO OUTFILE writes server files",
                ),
                PatternDef::new(
                    r"\bunion\b[\s\S]*\binformation_schema\b",
                    "schema enumeration via information_schema union",
                ),
            ],
            warned: vec![PatternDef::new(
                r"'\s*\+|\+\s*'|\|\|",
                "string concatenation in SQL text; prefer bound parameters",
            )],
        }
    }
}

/// Case-insensitive scanner for SQL text.
///
/// Pure function of its input: no I/O, no shared state, safe to share across
/// threads.
///
/// # Examples
///
/// ```
/// use gatehouse_scan::SqlScanner;
///
/// let scanner = SqlScanner::default();
/// assert!(scanner.scan("drop table users").has_blocked_patterns());
/// assert!(!scanner.scan("SELECT * FROM users WHERE id = :id").has_blocked_patterns());
/// ```
#[derive(Debug, Clone)]
pub struct SqlScanner {
    blocked: PatternSet,
    warned: PatternSet,
}

impl SqlScanner {
    /// Compile a scanner from the given pattern configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new(patterns: SqlPatterns) -> GateResult<Self> {
        Ok(Self {
            blocked: PatternSet::compile(patterns.blocked)?,
            warned: PatternSet::compile(patterns.warned)?,
        })
    }

    /// Scan SQL text.
    ///
    /// Empty input yields an empty result, never an error. When a blocked
    /// pattern matches, warnings are still computed for operator visibility.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn scan(&self, text: &str) -> ScanResult {
        let mut result = ScanResult::default();
        if text.trim().is_empty() {
            return result;
        }

        self.blocked.collect_blocked(text, &mut result);
        self.warned.collect_warnings(text, &mut result);
        self.balance_heuristics(text, &mut result);
        self.missing_where_heuristic(text, &mut result);

        if result.has_blocked_patterns() {
            debug!(
                blocked = result.blocked_patterns.len(),
                "SQL text matched blocked patterns"
            );
        }
        result
    }

    /// Unbalanced quote/parenthesis counts. A heuristic, not a parser:
    /// false positives are acceptable here because blocked-pattern matching
    /// is the hard gate.
    fn balance_heuristics(&self, text: &str, result: &mut ScanResult) {
        let quote_count = text.chars().filter(|&c| c == '\'').count();
        if quote_count % 2 != 0 {
            result
                .warnings
                .push("unbalanced single quotes in SQL text".to_string());
        }

        let open = text.chars().filter(|&c| c == '(').count();
        let close = text.chars().filter(|&c| c == ')').count();
        if open != close {
            result
                .warnings
                .push("unbalanced parentheses in SQL text".to_string());
        }
    }

    /// DELETE/UPDATE without a WHERE clause warns, never blocks: some
    /// legitimate bulk operations have no WHERE.
    fn missing_where_heuristic(&self, text: &str, result: &mut ScanResult) {
        let lowered = text.to_lowercase();
        let trimmed = lowered.trim_start();
        let destructive =
            trimmed.starts_with("delete") || trimmed.starts_with("update");
        if destructive && !lowered.contains("where") {
            result.warnings.push(
                "destructive statement has no WHERE clause; it affects every row".to_string(),
            );
        }
    }
}

impl Default for SqlScanner {
    fn default() -> Self {
        Self::new(SqlPatterns::default()).expect("built-in SQL patterns compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> SqlScanner {
        SqlScanner::default()
    }

    #[test]
    fn test_empty_input_is_clean() {
        assert!(scanner().scan("").is_empty());
        assert!(scanner().scan("   \n\t").is_empty());
    }

    #[test]
    fn test_blocked_schema_statements() {
        for sql in [
            "DROP TABLE users",
            "drop table users",
            "TRUNCATE users",
            "ALTER TABLE users ADD col INT",
            "CREATE TABLE evil (id INT)",
            "GRANT ALL ON db.* TO 'eve'",
            "REVOKE SELECT ON db.* FROM 'bob'",
        ] {
            assert!(
                scanner().scan(sql).has_blocked_patterns(),
                "expected blocked: {sql}"
            );
        }
    }

    #[test]
    fn test_blocked_dynamic_execution() {
        assert!(scanner().scan("EXEC xp_cmdshell 'dir'").has_blocked_patterns());
        assert!(scanner().scan("execute (@stmt)").has_blocked_patterns());
        assert!(scanner().scan("exec sp_configure").has_blocked_patterns());
    }

    #[test]
    fn test_blocked_injection_markers() {
        assert!(scanner().scan("SELECT 1; -- comment").has_blocked_patterns());
        assert!(scanner()
            .scan("SELECT name FROM t UNION SELECT table_name FROM information_schema.tables")
            .has_blocked_patterns());
    }

    #[test]
    fn test_blocked_timing_and_exfiltration() {
        for sql in [
            "SELECT SLEEP(10)",
            "SELECT BENCHMARK(1000000, MD5('x'))",
            "WAITFOR DELAY '0:0:10'",
            "SELECT LOAD_FILE('/etc/passwd')",
            "SELECT * FROM users INTO OUTFILE '/tmp/x'",
        ] {
            assert!(
                scanner().scan(sql).has_blocked_patterns(),
                "expected blocked: {sql}"
            );
        }
    }

    #[test]
    fn test_plain_select_is_clean() {
        let result = scanner().scan("SELECT id, name FROM users WHERE id = :id");
        assert!(!result.has_blocked_patterns());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_unbalanced_quotes_warn() {
        let result = scanner().scan("SELECT * FROM t WHERE name = 'broken");
        assert!(!result.has_blocked_patterns());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unbalanced single quotes")));
    }

    #[test]
    fn test_unbalanced_parens_warn() {
        let result = scanner().scan("SELECT COUNT( FROM t WHERE a = 1");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unbalanced parentheses")));
    }

    #[test]
    fn test_concatenation_warns() {
        let result = scanner().scan("SELECT * FROM t WHERE name = 'a' + @input");
        assert!(result.warnings.iter().any(|w| w.contains("concatenation")));
    }

    #[test]
    fn test_delete_without_where_warns_but_does_not_block() {
        let result = scanner().scan("DELETE FROM audit_log");
        assert!(!result.has_blocked_patterns());
        assert!(result.warnings.iter().any(|w| w.contains("WHERE")));
    }

    #[test]
    fn test_update_with_where_does_not_warn_about_where() {
        let result = scanner().scan("UPDATE t SET a = 1 WHERE id = 2");
        assert!(!result.warnings.iter().any(|w| w.contains("WHERE")));
    }

    #[test]
    fn test_blocked_still_reports_warnings() {
        // Tie-break rule: blocked wins, but warnings stay visible.
        let result = scanner().scan("DELETE FROM t; -- drop it");
        assert!(result.has_blocked_patterns());
        assert!(result.warnings.iter().any(|w| w.contains("WHERE")));
    }

    #[test]
    fn test_custom_pattern_set() {
        let patterns = SqlPatterns {
            blocked: vec![PatternDef::new(r"\bforbidden\b", "test pattern")],
            warned: vec![],
        };
        let scanner = SqlScanner::new(patterns).unwrap();
        assert!(scanner.scan("FORBIDDEN word").has_blocked_patterns());
        assert!(!scanner.scan("DROP TABLE users").has_blocked_patterns());
    }
}
