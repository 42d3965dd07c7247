//! Tern Core: shared token, span, and diagnostic vocabulary
//!
//! This crate provides the pieces of the Tern compiler that are not tied
//! to any particular pipeline stage: source positions, the token record,
//! and the diagnostic/warning/aggregate-error types every stage raises.
//!
//! # Modules
//!
//! - `span`: 1-based source positions
//! - `token`: the token record and its kind
//! - `diagnostic`: error/warning records, diagnostic codes, pretty-printing

pub mod diagnostic;
pub mod span;
pub mod token;

pub use diagnostic::{AggregateError, Diagnostic, DiagnosticCode, Severity};
pub use span::Span;
pub use token::{Token, TokenKind};
