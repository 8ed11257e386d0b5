//! Postgres-backed account source.
//!
//! Selects active savings accounts whose product posts accruals periodically.
//! One database per tenant, so the tenant is routed by the pool, not by a column.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tokio::runtime::Handle;
use tracing::debug;

use accrual_core::{AccountId, ExecutionContext, Page, SourceError};

use super::AccountSource;

const ACTIVE_STATUS: i32 = 300;
const ACCRUAL_PERIODIC_ACCOUNTING: i32 = 3;

/// Postgres account source.
///
/// Calls block on the given runtime handle, so `fetch_page` must run on a
/// thread that is not itself driving that runtime (worker pool threads are fine).
pub struct PostgresAccountSource {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresAccountSource {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }
}

impl AccountSource for PostgresAccountSource {
    fn fetch_page(
        &self,
        ctx: &ExecutionContext,
        after: AccountId,
        max_size: usize,
    ) -> Result<Page, SourceError> {
        let pool = self.pool.clone();
        let limit = i64::try_from(max_size).unwrap_or(i64::MAX);

        let rows = self
            .runtime
            .block_on(async move {
                sqlx::query(
                    r#"
                    SELECT sa.id
                    FROM m_savings_account sa
                    JOIN m_savings_product sp ON sp.id = sa.product_id
                    WHERE sa.status_enum = $1
                      AND sp.accounting_type = $2
                      AND sa.id > $3
                    ORDER BY sa.id
                    LIMIT $4
                    "#,
                )
                .bind(ACTIVE_STATUS)
                .bind(ACCRUAL_PERIODIC_ACCOUNTING)
                .bind(after.get())
                .bind(limit)
                .fetch_all(&*pool)
                .await
            })
            .map_err(|e| SourceError::storage(e.to_string()))?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map(AccountId::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SourceError::storage(e.to_string()))?;

        debug!(
            tenant = %ctx.tenant_identifier(),
            after = %after,
            fetched = ids.len(),
            "fetched accrual account page"
        );

        Ok(Page::new(ids))
    }
}
