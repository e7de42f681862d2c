//! The Gatehouse admission pipeline.
//!
//! This crate decides whether, and how safely, a requested mutation may
//! proceed. The pipeline answers five questions in order:
//!
//! 1. **Is the request well-formed?** [`ActionValidator`], composing the
//!    content scanners from `gatehouse_scan` for payloads carrying SQL or
//!    script code.
//! 2. **Is the caller within quota?** [`CallerRateLimiter`], a per-caller
//!    dual-ceiling token bucket.
//! 3. **Is the caller allowed?** [`PolicyEngine`], evaluating the
//!    capability set and environment mode.
//! 4. **Must a human confirm it?** The confirmation workflow encoded in
//!    the [`state`] machine and PENDING_CONFIRMATION results.
//! 5. **Do it.** [`ActionExecutor`] dispatches to the registered
//!    [`gatehouse_core::ResourceHandler`] and emits audit records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod executor;
mod policy;
mod rate_limit;
pub mod state;
mod validation;

pub use config::{GateConfig, ScanConfig};
pub use executor::{ActionExecutor, HandlerRegistry};
pub use policy::{Decision, PolicyEngine, ResourcePermissions};
pub use rate_limit::{
    CallerRateLimiter, RateLimitConfig, RateLimitRejection, RateLimitResult,
};
pub use validation::{validator_from_patterns, ActionValidator, FieldError, ValidationResult};
