//! Content-level security scanners.
//!
//! Two independent scanners inspect mutation payloads before they reach a
//! backend resource: [`SqlScanner`] for SQL text and [`ScriptScanner`] for
//! embedded script code. Both are pure functions over their input, with no
//! I/O and no shared state, and are safe to call concurrently without
//! locking.
//!
//! Each scanner distinguishes *blocked* patterns (the action fails
//! unconditionally; never bypassable by `force`) from *warnings* (the caller
//! must acknowledge them before proceeding). When a blocked pattern matches,
//! warnings are still computed and returned for operator visibility, but the
//! blocked finding wins unconditionally.
//!
//! Pattern sets are immutable configuration injected at construction time,
//! so tests and deployments can substitute their own without touching global
//! state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod patterns;
mod result;
mod script;
mod sql;

pub use patterns::{PatternDef, PatternSet};
pub use result::{BlockedPattern, ScanResult};
pub use script::{ScriptPatterns, ScriptScanner};
pub use sql::{SqlPatterns, SqlScanner};
