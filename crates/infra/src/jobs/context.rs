use accrual_core::{ContextProvider, ExecutionContext};

/// Keeps an execution context attached to the current worker thread.
///
/// Detaches on drop, including when the task unwinds, so a pooled thread never
/// carries one task's tenant into the next task it picks up.
pub(crate) struct ContextGuard<'a, C: ContextProvider + ?Sized> {
    provider: &'a C,
}

impl<'a, C: ContextProvider + ?Sized> ContextGuard<'a, C> {
    pub(crate) fn attach(provider: &'a C, ctx: &ExecutionContext) -> Self {
        provider.attach(ctx);
        Self { provider }
    }
}

impl<C: ContextProvider + ?Sized> Drop for ContextGuard<'_, C> {
    fn drop(&mut self) {
        self.provider.detach();
    }
}
