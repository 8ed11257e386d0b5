//! Scheduled job that posts accrued interest for savings accounts.
//!
//! ## Design
//!
//! - Accounts are read by keyset pagination, one page per round
//! - A page is split into one batch per worker; equal ids never straddle batches
//! - Each round runs one look-ahead fetch and all posting tasks on the same
//!   fixed-size pool, then waits for all of them before the next round
//! - The tenant context is captured per round and attached inside every task
//! - Posting failures are logged and counted; only source failures stop a run
//!
//! ## Components
//!
//! - `AccrualPostingJob`: round orchestrator and entry point
//! - `PrefetchBuffer` / `FetchTask`: bounded look-ahead
//! - `PostingTask`: posts one batch
//! - `CompletionChecker`: logs round outcomes
//! - `ScheduledJobRunner`: runs jobs by scheduler name

pub mod buffer;
pub mod completion;
mod context;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod posting_task;
pub mod runner;
pub mod types;

pub use buffer::{FetchTask, PrefetchBuffer};
pub use completion::{CompletionChecker, RoundCheck};
pub use config::{AccrualJobConfig, FailurePolicy};
pub use error::AccrualJobError;
pub use orchestrator::AccrualPostingJob;
pub use posting_task::PostingTask;
pub use runner::{JobHandler, JobName, ScheduledJobRunner};
pub use types::{AccountFailure, RunState, RunSummary, TaskKind, TaskOutcome, TaskStatus};
