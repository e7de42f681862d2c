//! Core data types for the Gatehouse admission pipeline.
//!
//! This crate provides the foundation value types shared across the pipeline:
//! the [`Action`] model, the [`ActionResult`] outcome type, the authenticated
//! [`AuthContext`] principal with its closed [`Permission`] enumeration, and
//! the boundary traits ([`ResourceHandler`], [`AuditLogger`]) the pipeline
//! consumes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod audit;
mod handler;
mod identity;
mod result;
mod telemetry;

pub use action::{Action, ActionKind, ActionOptions, Payload};
pub use audit::{AuditLogger, NullAuditLogger, TracingAuditLogger};
pub use handler::ResourceHandler;
pub use identity::{AuthContext, EnvironmentMode, Permission};
pub use result::{marker, ActionResult, ActionResultBuilder, ActionStatus};
pub use telemetry::init_telemetry;
