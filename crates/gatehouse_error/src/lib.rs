//! Error types for the Gatehouse admission pipeline.
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `GateErrorKind` enumerates the specific error conditions
//! - `GateError` wraps the kind with source location tracking
//! - Errors capture their construction site via `#[track_caller]`
//!
//! Pipeline *outcomes* (denied, rate limited, security violation) are not
//! errors; they surface as `ActionResult` values. `GateError` covers faults
//! in the machinery itself: bad configuration, invalid scanner patterns,
//! handler registration mistakes.
//!
//! # Examples
//!
//! ```
//! use gatehouse_error::{GateError, GateErrorKind, GateResult};
//!
//! fn register() -> GateResult<()> {
//!     Err(GateError::new(GateErrorKind::DuplicateHandler {
//!         resource_kind: "tag".to_string(),
//!     }))
//! }
//!
//! assert!(register().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod gate;

pub use gate::{GateError, GateErrorKind, GateResult};
