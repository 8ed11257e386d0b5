//! `accrual-core`: building blocks shared by the accrual posting pipeline.
//!
//! This crate contains **pure** primitives (no threads, no storage): identifiers,
//! the error model, the tenant execution context, and page partitioning.

pub mod context;
pub mod error;
pub mod id;
pub mod page;

pub use context::{ContextProvider, ExecutionContext, ThreadLocalContextProvider};
pub use error::{ConfigError, PostingError, PostingResult, SourceError};
pub use id::{AccountId, TenantId};
pub use page::{partition, Batch, Page};
