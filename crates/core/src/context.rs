//! Tenant execution context and its propagation contract.
//!
//! Worker threads have no ambient tenant. Whoever starts a run captures the
//! context once, and every task attaches its own copy before touching a
//! collaborator.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::id::TenantId;

/// Tenant/routing metadata a task runs under.
///
/// Immutable once captured; tasks receive clones, never a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    tenant_id: TenantId,
    tenant_identifier: String,
    business_date: NaiveDate,
}

impl ExecutionContext {
    pub fn new(tenant_id: TenantId, tenant_identifier: impl Into<String>, business_date: NaiveDate) -> Self {
        Self {
            tenant_id,
            tenant_identifier: tenant_identifier.into(),
            business_date,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Human-readable tenant name used for routing and log lines.
    pub fn tenant_identifier(&self) -> &str {
        &self.tenant_identifier
    }

    /// Business date the accrual is posted for.
    pub fn business_date(&self) -> NaiveDate {
        self.business_date
    }
}

/// Captures and attaches the execution context of the current thread.
pub trait ContextProvider: Send + Sync {
    /// Context of the calling thread, if one is attached.
    fn capture(&self) -> Option<ExecutionContext>;

    /// Attach `ctx` to the calling thread, replacing any previous context.
    fn attach(&self, ctx: &ExecutionContext);

    /// Remove the calling thread's context.
    fn detach(&self);
}

impl<T: ContextProvider + ?Sized> ContextProvider for Arc<T> {
    fn capture(&self) -> Option<ExecutionContext> {
        (**self).capture()
    }

    fn attach(&self, ctx: &ExecutionContext) {
        (**self).attach(ctx)
    }

    fn detach(&self) {
        (**self).detach()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// Thread-local context storage.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadLocalContextProvider;

impl ThreadLocalContextProvider {
    pub fn new() -> Self {
        Self
    }

    /// Context attached to the calling thread.
    pub fn current() -> Option<ExecutionContext> {
        CURRENT.with(|c| c.borrow().clone())
    }
}

impl ContextProvider for ThreadLocalContextProvider {
    fn capture(&self) -> Option<ExecutionContext> {
        Self::current()
    }

    fn attach(&self, ctx: &ExecutionContext) {
        CURRENT.with(|c| *c.borrow_mut() = Some(ctx.clone()));
    }

    fn detach(&self) {
        CURRENT.with(|c| *c.borrow_mut() = None);
    }
}
