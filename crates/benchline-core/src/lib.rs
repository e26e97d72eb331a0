//! benchline-core library.
//!
//! Reconstructs where every repair unit of a batch stood on every calendar
//! day, then rolls the per-unit view up into daily cohorts and batch
//! summaries.
//!
//! The pipeline runs strictly forward:
//!
//! ```text
//! Unit ──build_timeline──▶ DayTimeline ──aggregate──▶ AggregateTable
//!                                                         │
//!                                        prune + summary  ▼
//!                                          CohortTable, BatchSummary
//! ```
//!
//! # Conventions
//!
//! - **Errors**: engine failures are [`error::EngineError`]; dataset and
//!   config loading return `thiserror` enums or `anyhow::Result`.
//! - **Logging**: `tracing` macros (`debug!` per stage, `warn!` for
//!   excluded units and batches).

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod day;
pub mod error;
pub mod model;
pub mod prune;
pub mod repair;
pub mod summary;
pub mod timeline;
