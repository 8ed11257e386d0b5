//! Postgres-backed posting service.
//!
//! Delegates the accrual computation to the `post_accrual_interest_for_savings`
//! database function, one call (and transaction) per account.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::runtime::Handle;

use accrual_core::{AccountId, ExecutionContext, PostingError, PostingResult};

use super::PostingService;

/// Postgres posting service.
///
/// Like `PostgresAccountSource`, blocks on `runtime` and must be called from
/// threads outside of it.
pub struct PostgresPostingService {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresPostingService {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }
}

impl PostingService for PostgresPostingService {
    fn post(&self, ctx: &ExecutionContext, account: AccountId) -> PostingResult<()> {
        let pool = self.pool.clone();
        let business_date = ctx.business_date();

        self.runtime
            .block_on(async move {
                sqlx::query("SELECT post_accrual_interest_for_savings($1, $2)")
                    .bind(account.get())
                    .bind(business_date)
                    .execute(&*pool)
                    .await
            })
            .map(|_| ())
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PostingError::NotFound(account),
                sqlx::Error::Database(db) if db.code().as_deref() == Some("40001") => {
                    PostingError::conflict(db.message().to_string())
                }
                sqlx::Error::Database(db) => PostingError::validation(db.message().to_string()),
                other => PostingError::storage(other.to_string()),
            })
    }
}
