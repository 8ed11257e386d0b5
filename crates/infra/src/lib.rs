//! Infrastructure layer: account sources, posting services and the accrual job.

pub mod jobs;
pub mod posting;
pub mod source;
