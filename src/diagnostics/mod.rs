//! Structured diagnostics for reload batches.
//!
//! Deterministic, sortable types for per-file failures and skips.

pub mod reload_diagnostics;

pub use reload_diagnostics::{ReloadDiagnostic, ReloadReport, ReloadStage, SkipReason};
