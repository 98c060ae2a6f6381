//! Request logging step.

use tracing::info;

use crate::exchange::Exchange;
use crate::middleware::{Next, StepFuture};

/// Logs method and path for every request offered to it, then proceeds.
///
/// Mount it first (and at the root prefix) so it sees every request before
/// any resource handler runs:
///
/// ```rust
/// use troilo::{App, middleware};
///
/// let app = App::new().middleware(middleware::log_requests);
/// ```
pub fn log_requests<'a>(cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
    Box::pin(async move {
        info!(
            method = %cx.request().method(),
            path = cx.request().path(),
            "request"
        );
        next.proceed();
        Ok(())
    })
}
