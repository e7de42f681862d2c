//! Structural and content validation per action kind.

use gatehouse_core::{marker, Action, ActionKind, Payload};
use gatehouse_error::GateResult;
use gatehouse_scan::{BlockedPattern, ScriptScanner, SqlScanner};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Query types the named-query execution engine accepts.
const QUERY_TYPES: [&str; 5] = ["Query", "Update", "Insert", "Delete", "Scalar"];

/// UI component types the shipped view system knows about. Unknown types
/// warn rather than error, to tolerate custom extensions.
const KNOWN_COMPONENT_TYPES: [&str; 10] = [
    "flex-container",
    "coord-container",
    "label",
    "button",
    "gauge",
    "chart",
    "table",
    "text-field",
    "dropdown",
    "embedded-view",
];

/// A field-scoped validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field (or path) that failed validation
    pub field: String,
    /// Reason for failure
    pub reason: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The outcome of validating one action.
///
/// Security violations are kept apart from ordinary field errors so the
/// executor can log them as security events and mark them unconditionally
/// fatal.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Field-scoped structural errors
    pub errors: Vec<FieldError>,
    /// Blocked content patterns found by the scanners
    pub security_violations: Vec<BlockedPattern>,
    /// Findings the caller must acknowledge before proceeding
    pub warnings: Vec<String>,
    /// Informational notes; never gate anything
    pub info: Vec<String>,
}

impl ValidationResult {
    /// Whether the action may proceed to authorization.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.security_violations.is_empty()
    }

    /// Whether a blocked content pattern was found.
    pub fn has_security_violations(&self) -> bool {
        !self.security_violations.is_empty()
    }

    /// Render errors as marker-prefixed strings for an `ActionResult`.
    pub fn error_strings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for violation in &self.security_violations {
            out.push(format!(
                "{}: {} (pattern: {})",
                marker::SECURITY_VIOLATION,
                violation.description,
                violation.pattern
            ));
        }
        for error in &self.errors {
            if error.field == "target_path" {
                out.push(format!("{}: {}", marker::INVALID_PATH, error.reason));
            } else {
                out.push(format!("{}: {}", error.field, error.reason));
            }
        }
        out
    }

    fn error(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(FieldError::new(field, reason));
    }

    fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    fn note(&mut self, info: impl Into<String>) {
        self.info.push(info.into());
    }
}

/// Validates actions structurally and composes the content scanners.
///
/// A pure function of its input: never mutates the action, never performs
/// I/O. Calling [`ActionValidator::validate`] twice on the same action
/// yields identical results.
pub struct ActionValidator {
    sql_scanner: SqlScanner,
    script_scanner: ScriptScanner,
    param_regex: Regex,
}

impl ActionValidator {
    /// Create a validator around the given scanners.
    pub fn new(sql_scanner: SqlScanner, script_scanner: ScriptScanner) -> Self {
        Self {
            sql_scanner,
            script_scanner,
            param_regex: Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)")
                .expect("valid parameter regex"),
        }
    }

    /// The SQL scanner in use.
    pub fn sql_scanner(&self) -> &SqlScanner {
        &self.sql_scanner
    }

    /// The script scanner in use.
    pub fn script_scanner(&self) -> &ScriptScanner {
        &self.script_scanner
    }

    /// Validate one action.
    #[instrument(skip(self, action), fields(correlation_id = action.correlation_id(), resource_kind = action.resource_kind()))]
    pub fn validate(&self, action: &Action) -> ValidationResult {
        debug!("Validating action");
        let mut result = ValidationResult::default();

        self.validate_target_path(action, &mut result);
        self.validate_payload_presence(action, &mut result);

        if let Some(payload) = action.payload() {
            match action.resource_kind() {
                "named-query" => self.validate_named_query(action, payload, &mut result),
                "view" => self.validate_view(payload, &mut result),
                "script" => self.validate_script(action, payload, &mut result),
                "tag" => self.validate_tag(action, payload, &mut result),
                _ => {}
            }
        }

        debug!(
            errors = result.errors.len(),
            security = result.security_violations.len(),
            warnings = result.warnings.len(),
            "Validation complete"
        );
        result
    }

    fn validate_target_path(&self, action: &Action, result: &mut ValidationResult) {
        let path = action.target_path();
        if path.is_empty() {
            result.error("target_path", "target path must not be empty");
            return;
        }
        if !path.contains('/') {
            result.error(
                "target_path",
                "target path must be namespaced below a top-level scope",
            );
        }
        if path.split('/').any(|segment| segment == "..") {
            result.error("target_path", "target path must not contain '..' segments");
        }
    }

    fn validate_payload_presence(&self, action: &Action, result: &mut ValidationResult) {
        match action.kind() {
            ActionKind::Create | ActionKind::Update => {
                if action.payload().is_none() {
                    result.error(
                        "payload",
                        format!("{} requires a payload", action.kind()),
                    );
                }
            }
            ActionKind::Read | ActionKind::Delete => {
                if action.payload().is_some() {
                    result.warn(format!(
                        "{} actions ignore their payload",
                        action.kind()
                    ));
                }
            }
        }
    }

    fn validate_named_query(
        &self,
        action: &Action,
        payload: &Payload,
        result: &mut ValidationResult,
    ) {
        if !action.kind().is_mutating() || action.kind() == ActionKind::Delete {
            return;
        }

        match payload.get("queryType").and_then(Value::as_str) {
            Some(query_type) if QUERY_TYPES.contains(&query_type) => {}
            Some(other) => result.error(
                "queryType",
                format!(
                    "unknown query type '{other}'; expected one of {}",
                    QUERY_TYPES.join(", ")
                ),
            ),
            None => result.error("queryType", "queryType is required"),
        }

        if payload
            .get("database")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty)
        {
            result.error("database", "database is required");
        }

        let query = payload.get("query").and_then(Value::as_str);
        match query {
            Some(text) if !text.trim().is_empty() => {
                let scan = self.sql_scanner.scan(text);
                result.security_violations.extend(scan.blocked_patterns);
                result.warnings.extend(scan.warnings);
                self.validate_parameters(payload, text, result);
            }
            _ => result.error("query", "query text is required"),
        }
    }

    /// Cross-check declared parameters against `:name` references in the
    /// query text. Both directions are tolerated by the execution engine, so
    /// neither is an error.
    fn validate_parameters(&self, payload: &Payload, query: &str, result: &mut ValidationResult) {
        let mut declared: HashSet<&str> = HashSet::new();
        if let Some(params) = payload.get("parameters") {
            let Some(list) = params.as_array() else {
                result.error("parameters", "parameters must be a list of objects");
                return;
            };
            for (index, param) in list.iter().enumerate() {
                let Some(obj) = param.as_object() else {
                    result.error(
                        format!("parameters[{index}]"),
                        "parameter must be an object",
                    );
                    continue;
                };
                match obj.get("name").and_then(Value::as_str) {
                    Some(name) if !name.is_empty() => {
                        if !declared.insert(name) {
                            result.error(
                                format!("parameters[{index}].name"),
                                format!("duplicate parameter name '{name}'"),
                            );
                        }
                    }
                    _ => result.error(
                        format!("parameters[{index}].name"),
                        "parameter name must be a non-empty string",
                    ),
                }
            }
        }

        let referenced: HashSet<&str> = self
            .param_regex
            .captures_iter(query)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str())
            .collect();

        for name in &referenced {
            if !declared.contains(name) {
                result.warn(format!("parameter :{name} referenced but not declared"));
            }
        }
        for name in &declared {
            if !referenced.contains(name) {
                result.note(format!("parameter :{name} declared but not used"));
            }
        }
    }

    fn validate_view(&self, payload: &Payload, result: &mut ValidationResult) {
        match payload.get("root") {
            Some(Value::Object(root)) => {
                self.validate_component_tree(root, "root", result);
            }
            Some(_) => result.error("root", "root must be an object"),
            None => result.error("root", "view payload requires a root node"),
        }
    }

    fn validate_component_tree(
        &self,
        node: &Payload,
        path: &str,
        result: &mut ValidationResult,
    ) {
        match node.get("type").and_then(Value::as_str) {
            Some(component_type) => {
                if !KNOWN_COMPONENT_TYPES.contains(&component_type) {
                    result.warn(format!(
                        "unknown component type '{component_type}' at {path}"
                    ));
                }
            }
            None => result.error(
                format!("{path}.type"),
                "every view node must declare a type",
            ),
        }

        if let Some(Value::Array(children)) = node.get("children") {
            for (index, child) in children.iter().enumerate() {
                let child_path = format!("{path}.children[{index}]");
                match child.as_object() {
                    Some(child_node) => {
                        self.validate_component_tree(child_node, &child_path, result)
                    }
                    None => result.error(child_path, "view node must be an object"),
                }
            }
        }
    }

    fn validate_script(
        &self,
        action: &Action,
        payload: &Payload,
        result: &mut ValidationResult,
    ) {
        if action.kind() != ActionKind::Create && action.kind() != ActionKind::Update {
            return;
        }
        match payload.get("code").and_then(Value::as_str) {
            Some(code) if !code.trim().is_empty() => {
                let scan = self.script_scanner.scan(code);
                result.security_violations.extend(scan.blocked_patterns);
                result.warnings.extend(scan.warnings);
            }
            _ => result.error("code", "script code is required"),
        }
    }

    fn validate_tag(&self, action: &Action, payload: &Payload, result: &mut ValidationResult) {
        if action.kind() == ActionKind::Create
            && payload
                .get("name")
                .and_then(Value::as_str)
                .is_none_or(str::is_empty)
        {
            result.error("name", "tag name is required");
        }

        if let Some(data_type) = payload.get("dataType") {
            if !data_type.is_string() {
                result.error("dataType", "dataType must be a string");
            }
        }

        // Expression tags embed script code in their value source.
        let is_expression = payload
            .get("valueSource")
            .and_then(Value::as_str)
            .is_some_and(|source| source == "expr" || source == "expression");
        if is_expression {
            if let Some(expression) = payload.get("expression").and_then(Value::as_str) {
                let scan = self.script_scanner.scan(expression);
                result.security_violations.extend(scan.blocked_patterns);
                result.warnings.extend(scan.warnings);
            }
        }
    }
}

impl Default for ActionValidator {
    fn default() -> Self {
        Self::new(SqlScanner::default(), ScriptScanner::default())
    }
}

/// Build a validator from explicit pattern configuration.
///
/// # Errors
///
/// Returns an error if any configured pattern fails to compile.
pub fn validator_from_patterns(
    sql: gatehouse_scan::SqlPatterns,
    script: gatehouse_scan::ScriptPatterns,
) -> GateResult<ActionValidator> {
    Ok(ActionValidator::new(
        SqlScanner::new(sql)?,
        ScriptScanner::new(script)?,
    ))
}
