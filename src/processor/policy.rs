use crate::context::ReturnContext;
use crate::error::RuntimeError;

/// Hook for undoing side effects when a return lands on a service task that
/// needs special handling (asynchronous, stateful or external).
pub trait ServiceTaskPolicy: Send + Sync {
    fn on_return(&self, ctx: &ReturnContext) -> Result<(), RuntimeError>;
}

/// Leaves service side effects alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompensation;

impl ServiceTaskPolicy for NoCompensation {
    fn on_return(&self, ctx: &ReturnContext) -> Result<(), RuntimeError> {
        tracing::debug!(service_task = %ctx.target.id, "no compensation configured");
        Ok(())
    }
}
