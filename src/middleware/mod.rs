//! Middleware layer.
//!
//! Middleware intercepts requests on their way to the router and is the
//! right place for cross-cutting concerns: request logging, body parsing,
//! authentication-header inspection.
//!
//! A step receives the [`Exchange`] (request plus write-once response slot)
//! and an explicit [`Next`] continuation token. It must do exactly one of:
//!
//! - call [`Next::proceed`] once and return `Ok(())` — pass-through; the
//!   chain advances to the next eligible step
//! - finalise a response via [`Exchange::respond`] and return `Ok(())` —
//!   the chain terminates and that response is sent
//! - return `Err(Failure)` — dispatch diverts to the error pipeline
//!
//! Calling `proceed` more than once, or finalising the response twice, is a
//! contract violation: the dispatcher logs it and aborts the request with a
//! 500. The chain itself is driven by an iterative cursor in
//! [`App::dispatch`](crate::App::dispatch), so deep chains cost no stack.
//!
//! Built-in steps:
//! - [`log_requests`] — logs method and path for every request
//! - [`parse_json_body`] — decodes declared JSON bodies ahead of handlers

use std::future::Future;
use std::pin::Pin;

use crate::error::Failure;
use crate::exchange::Exchange;

mod body_parser;
mod logger;

pub use body_parser::parse_json_body;
pub use logger::log_requests;

/// The boxed future a middleware step returns. Borrows the exchange for the
/// duration of the step.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Failure>> + Send + 'a>>;

/// The continuation handed to each step.
///
/// Calling [`proceed`](Next::proceed) tells the dispatcher to advance past
/// this step. Not calling it means this step is terminal for the request.
pub struct Next {
    calls: u32,
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { calls: 0 }
    }

    /// Proceed to the next eligible step once this one returns.
    ///
    /// Must be called at most once per step invocation.
    pub fn proceed(&mut self) {
        self.calls += 1;
    }

    pub(crate) fn called(&self) -> bool {
        self.calls >= 1
    }

    pub(crate) fn over_called(&self) -> bool {
        self.calls > 1
    }
}

/// A normal-chain middleware step.
///
/// Automatically implemented for any function of the right shape, so the
/// built-in steps and most custom ones are plain `fn` items:
///
/// ```rust
/// use troilo::{Exchange, Next, StepFuture};
///
/// fn deny_robots<'a>(cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
///     Box::pin(async move {
///         if cx.request().path() == "/robots.txt" {
///             cx.respond(troilo::Status::Forbidden);
///         } else {
///             next.proceed();
///         }
///         Ok(())
///     })
/// }
/// ```
///
/// Steps that carry state implement the trait on a struct instead.
pub trait Step: Send + Sync + 'static {
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a>;
}

impl<F> Step for F
where
    F: for<'a> Fn(&'a mut Exchange, &'a mut Next) -> StepFuture<'a> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
        (self)(cx, next)
    }
}

/// An error-pipeline step.
///
/// Registered through [`App::on_error`](crate::App::on_error), which is what
/// makes chain membership explicit rather than inferred. Receives the
/// signaled [`Failure`] alongside the exchange; the same single-response,
/// single-proceed discipline applies. Returning `Err` re-signals a (possibly
/// different) failure to the next error step; control never re-enters the
/// normal chain.
pub trait ErrorStep: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        failure: &'a Failure,
        cx: &'a mut Exchange,
        next: &'a mut Next,
    ) -> StepFuture<'a>;
}

impl<F> ErrorStep for F
where
    F: for<'a> Fn(&'a Failure, &'a mut Exchange, &'a mut Next) -> StepFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        failure: &'a Failure,
        cx: &'a mut Exchange,
        next: &'a mut Next,
    ) -> StepFuture<'a> {
        (self)(failure, cx, next)
    }
}
