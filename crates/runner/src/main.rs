//! Runs one accrual posting pass for a single tenant and prints its summary as JSON.
//!
//! Environment:
//! - `DATABASE_URL` (required): the tenant's database
//! - `ACCRUAL_TENANT_ID`, `ACCRUAL_TENANT_IDENTIFIER`: tenant routing (identifier defaults to `default`)
//! - `ACCRUAL_BUSINESS_DATE`: `YYYY-MM-DD`, defaults to today (UTC)
//! - `ACCRUAL_THREAD_POOL_SIZE`, `ACCRUAL_BATCH_SIZE`, `ACCRUAL_LOOKAHEAD_DEPTH`, `ACCRUAL_FAILURE_POLICY`

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;

use accrual_core::{ContextProvider, ExecutionContext, TenantId, ThreadLocalContextProvider};
use accrual_infra::jobs::{AccrualJobConfig, AccrualPostingJob, JobName, ScheduledJobRunner};
use accrual_infra::posting::PostgresPostingService;
use accrual_infra::source::PostgresAccountSource;

fn main() -> anyhow::Result<()> {
    accrual_observability::init();

    let config = AccrualJobConfig::from_env()?;
    let ctx = context_from_env()?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    // The job runs on this thread; the runtime's own workers drive the database I/O.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let pool = runtime
        .block_on(
            PgPoolOptions::new()
                .max_connections(max_connections(config.thread_pool_size)?)
                .connect(&database_url),
        )
        .context("failed to connect to database")?;

    let provider = ThreadLocalContextProvider::new();
    let job = AccrualPostingJob::new(
        PostgresAccountSource::new(pool.clone(), runtime.handle().clone()),
        PostgresPostingService::new(pool, runtime.handle().clone()),
        provider,
    );
    let runner = ScheduledJobRunner::new().with_accrual_posting(job);

    provider.attach(&ctx);
    let result = runner.execute(
        JobName::PostAccrualInterestForSavings.display_name(),
        &config.to_job_parameters(),
    );
    provider.detach();

    let summary = result?;
    tracing::info!(tenant = %ctx.tenant_identifier(), "accrual posting completed");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// One connection per worker plus one for the synchronous fetches on this thread.
fn max_connections(thread_pool_size: usize) -> anyhow::Result<u32> {
    let workers = u32::try_from(thread_pool_size)
        .with_context(|| format!("thread pool size {thread_pool_size} exceeds the connection limit"))?;
    Ok(workers.saturating_add(1))
}

fn context_from_env() -> anyhow::Result<ExecutionContext> {
    let tenant_id = match std::env::var("ACCRUAL_TENANT_ID") {
        Ok(raw) => raw.parse::<TenantId>()?,
        Err(_) => {
            tracing::warn!("ACCRUAL_TENANT_ID not set; generating an ephemeral tenant id");
            TenantId::new()
        }
    };
    let identifier = std::env::var("ACCRUAL_TENANT_IDENTIFIER").unwrap_or_else(|_| "default".to_string());
    let business_date = match std::env::var("ACCRUAL_BUSINESS_DATE") {
        Ok(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("ACCRUAL_BUSINESS_DATE {raw:?} is not a YYYY-MM-DD date"))?,
        Err(_) => Utc::now().date_naive(),
    };
    Ok(ExecutionContext::new(tenant_id, identifier, business_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_cover_every_worker() {
        assert_eq!(max_connections(4).unwrap(), 5);
    }

    #[test]
    fn oversized_pool_is_rejected_or_saturated() {
        assert_eq!(max_connections(u32::MAX as usize).unwrap(), u32::MAX);
        if let Ok(too_big) = usize::try_from(u64::from(u32::MAX) + 1) {
            assert!(max_connections(too_big).is_err());
        }
    }
}
