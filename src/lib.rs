//! Tally - run-level usage reconciliation
//!
//! After a benchmark run finishes, its token and cost totals are read back
//! from an eventually-consistent, bucketed usage-accounting API and promoted
//! through a verification state machine. Only verified totals are handed to
//! downstream analysis.
//!
//! Leaf-first:
//!
//! - [`run`] - per-run metrics documents and their atomic store
//! - [`usage`] - usage API client and bucket aggregation
//! - [`verify`] - the stability state machine
//! - [`scheduler`] - one reconciliation batch over all due runs
//! - [`analysis`] - the verified-only gate for report generation

pub mod analysis;
pub mod cli;
pub mod config;
pub mod logging;
pub mod run;
pub mod scheduler;
pub mod usage;
pub mod verify;
