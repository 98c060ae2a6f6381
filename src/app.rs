//! The application: middleware chain, router, and error pipeline.
//!
//! # Dispatch
//!
//! One [`App::dispatch`] call handles one request. An iterative cursor walks
//! the normal chain in registration order, skipping steps whose mount prefix
//! does not cover the request path. Each eligible step either proceeds
//! (cursor advances), finalises a response (dispatch ends), or signals a
//! [`Failure`] (cursor jumps to index 0 of the error pipeline, and never
//! comes back). When the normal chain is exhausted the router runs as the
//! built-in terminal step.
//!
//! `NotFound` and `MethodNotAllowed` are rendered directly at the router
//! boundary as 404/405; only explicitly signaled failures travel through the
//! error pipeline. If no error step responds, a built-in responder sends a
//! fixed-shape 500 and logs the failure, so exactly one response leaves the
//! engine per request, no matter what the steps do.

use std::sync::Arc;

use tracing::error;

use crate::error::Failure;
use crate::exchange::Exchange;
use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{ErrorStep, Next, Step};
use crate::request::Request;
use crate::response::Response;
use crate::router::{InvalidPatternError, RouteError, Router};
use crate::status::Status;

const DEFAULT_ERROR_BODY: &[u8] = br#"{"error":"internal server error"}"#;
const NOT_FOUND_BODY: &[u8] = br#"{"error":"not found"}"#;

/// A middleware step plus the path prefix it is mounted under.
struct Entry {
    /// `None` means mounted at the root: eligible for every request.
    prefix: Option<String>,
    step: Arc<dyn Step>,
}

impl Entry {
    /// `/api` covers `/api` and `/api/...`, never `/apix`.
    fn eligible(&self, path: &str) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => {
                path == prefix
                    || path.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// The application. Register middleware, error steps, and routes at startup;
/// hand it to [`Server::serve`](crate::Server::serve).
///
/// ```rust
/// use troilo::{App, Failure, Request, Response, middleware};
///
/// let app = App::new()
///     .middleware(middleware::log_requests)
///     .middleware(middleware::parse_json_body)
///     .get("/", |_req: Request| async {
///         Ok::<_, Failure>(Response::text("hello"))
///     });
/// ```
pub struct App {
    steps: Vec<Entry>,
    error_steps: Vec<Arc<dyn ErrorStep>>,
    router: Router,
}

impl App {
    pub fn new() -> Self {
        Self { steps: Vec::new(), error_steps: Vec::new(), router: Router::new() }
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Appends a step to the normal chain, mounted at the root.
    pub fn middleware(mut self, step: impl Step) -> Self {
        self.steps.push(Entry { prefix: None, step: Arc::new(step) });
        self
    }

    /// Appends a step to the normal chain, offered only to requests whose
    /// path starts at `prefix`.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` does not begin with `/`.
    pub fn middleware_at(mut self, prefix: &str, step: impl Step) -> Self {
        assert!(prefix.starts_with('/'), "mount prefix `{prefix}` must begin with `/`");
        let prefix = if prefix == "/" {
            None
        } else {
            Some(prefix.trim_end_matches('/').to_owned())
        };
        self.steps.push(Entry { prefix, step: Arc::new(step) });
        self
    }

    /// Appends a step to the error pipeline.
    ///
    /// This is the only way into that chain: membership is decided by which
    /// registration method you call, never inferred from the step itself.
    pub fn on_error(mut self, step: impl ErrorStep) -> Self {
        self.error_steps.push(Arc::new(step));
        self
    }

    /// Registers a route on the app's router.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern. Use [`App::try_route`] to handle the
    /// [`InvalidPatternError`] instead.
    pub fn route(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.router = self.router.on(method, pattern, handler);
        self
    }

    /// Fallible route registration.
    pub fn try_route(
        mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<Self, InvalidPatternError> {
        self.router = self.router.try_on(method, pattern, handler)?;
        Ok(self)
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::Put, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::Delete, pattern, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Runs one request through the engine and always produces a response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let mut cx = Exchange::new(request);

        for entry in &self.steps {
            if !entry.eligible(cx.request().path()) {
                continue;
            }

            let mut next = Next::new();
            let outcome = entry.step.call(&mut cx, &mut next).await;
            if cx.double_write() || next.over_called() {
                return contract_violation(&cx);
            }

            match outcome {
                Err(failure) => return self.run_error_steps(failure, cx).await,
                Ok(()) => {
                    if let Some(response) = cx.take_response() {
                        // The step finalised; nothing later runs.
                        return response;
                    }
                    if !next.called() {
                        // Terminal step without a response: the chain is
                        // over and the router never runs.
                        return not_found();
                    }
                }
            }
        }

        self.dispatch_route(cx).await
    }

    /// The built-in terminal step: route lookup and handler invocation.
    async fn dispatch_route(&self, mut cx: Exchange) -> Response {
        let method = cx.request().method();
        match self.router.lookup(method, cx.request().path()) {
            Ok((handler, params)) => {
                cx.request_mut().set_params(params);
                // The handler gets its own copy; the original request stays
                // on the exchange for the error pipeline.
                match handler.call(cx.request().clone()).await {
                    Ok(response) => {
                        cx.respond(response);
                        cx.take_response().unwrap_or_else(not_found)
                    }
                    Err(failure) => self.run_error_steps(failure, cx).await,
                }
            }
            Err(RouteError::MethodNotAllowed) => Response::status(Status::MethodNotAllowed),
            Err(RouteError::NotFound) => not_found(),
        }
    }

    /// Walks the error pipeline from index 0.
    ///
    /// `Err` from an error step re-signals: the failure value is swapped and
    /// the cursor advances. Exhausting the pipeline reaches the built-in
    /// responder.
    async fn run_error_steps(&self, mut failure: Failure, mut cx: Exchange) -> Response {
        for step in &self.error_steps {
            let mut next = Next::new();
            let outcome = step.call(&failure, &mut cx, &mut next).await;
            if cx.double_write() || next.over_called() {
                return contract_violation(&cx);
            }

            match outcome {
                Err(resignaled) => failure = resignaled,
                Ok(()) => {
                    if let Some(response) = cx.take_response() {
                        return response;
                    }
                    if !next.called() {
                        break;
                    }
                }
            }
        }

        error!(%failure, "unhandled failure, sending default error response");
        Response::builder()
            .status(Status::InternalServerError)
            .json(DEFAULT_ERROR_BODY.to_vec())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found() -> Response {
    Response::builder().status(Status::NotFound).json(NOT_FOUND_BODY.to_vec())
}

fn contract_violation(cx: &Exchange) -> Response {
    error!(
        method = %cx.request().method(),
        path = cx.request().path(),
        "step contract violation: response finalised twice or continuation called twice"
    );
    Response::builder()
        .status(Status::InternalServerError)
        .json(DEFAULT_ERROR_BODY.to_vec())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::middleware::StepFuture;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Pass-through step that records its name.
    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Step for Recorder {
        fn call<'a>(&'a self, _cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.name.to_owned());
                next.proceed();
                Ok(())
            })
        }
    }

    /// Step that responds without proceeding.
    struct Responder(&'static str);

    impl Step for Responder {
        fn call<'a>(&'a self, cx: &'a mut Exchange, _next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move {
                cx.respond(Response::text(self.0));
                Ok(())
            })
        }
    }

    /// Step that signals a failure.
    struct Failing;

    impl Step for Failing {
        fn call<'a>(&'a self, _cx: &'a mut Exchange, _next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move { Err(Failure::Handler("boom".into())) })
        }
    }

    /// Error step that renders the failure message.
    struct FailureRenderer(Log);

    impl ErrorStep for FailureRenderer {
        fn call<'a>(
            &'a self,
            failure: &'a Failure,
            cx: &'a mut Exchange,
            _next: &'a mut Next,
        ) -> StepFuture<'a> {
            Box::pin(async move {
                self.0.lock().unwrap().push(format!("error: {failure}"));
                cx.respond(Response::builder().status(Status::BadGateway).text(failure.to_string()));
                Ok(())
            })
        }
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn middleware_runs_in_registration_order() {
        let log = log();
        let app = App::new()
            .middleware(Recorder { name: "a", log: log.clone() })
            .middleware(Recorder { name: "b", log: log.clone() })
            .middleware(Recorder { name: "c", log: log.clone() });

        app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(entries(&log), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn responding_step_short_circuits_the_chain() {
        let log = log();
        let app = App::new()
            .middleware(Recorder { name: "before", log: log.clone() })
            .middleware(Responder("stopped here"))
            .middleware(Recorder { name: "after", log: log.clone() })
            .get("/", |_req: Request| async { Ok::<_, Failure>("handler") });

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.body(), b"stopped here");
        assert_eq!(entries(&log), ["before"]);
    }

    #[tokio::test]
    async fn prefixed_step_is_skipped_off_its_mount() {
        let log = log();
        let app = App::new()
            .middleware_at("/api", Recorder { name: "api", log: log.clone() })
            .middleware(Recorder { name: "root", log: log.clone() });

        app.dispatch(Request::new(Method::Get, "/other")).await;
        assert_eq!(entries(&log), ["root"]);

        app.dispatch(Request::new(Method::Get, "/api/items")).await;
        assert_eq!(entries(&log), ["root", "api", "root"]);

        // A shared prefix of the first segment is not a mount match.
        app.dispatch(Request::new(Method::Get, "/apix")).await;
        assert_eq!(entries(&log), ["root", "api", "root", "root"]);
    }

    #[tokio::test]
    async fn failure_skips_remaining_steps_and_reaches_error_chain() {
        let log = log();
        let app = App::new()
            .middleware(Recorder { name: "first", log: log.clone() })
            .middleware(Failing)
            .middleware(Recorder { name: "unreachable", log: log.clone() })
            .on_error(FailureRenderer(log.clone()));

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 502);
        assert_eq!(entries(&log), ["first", "error: handler error: boom"]);
    }

    #[tokio::test]
    async fn error_steps_can_resignal_a_different_failure() {
        fn reclassify<'a>(
            _failure: &'a Failure,
            _cx: &'a mut Exchange,
            _next: &'a mut Next,
        ) -> StepFuture<'a> {
            Box::pin(async move { Err(Failure::Handler("reclassified".into())) })
        }

        let log = log();
        let app = App::new()
            .middleware(Failing)
            .on_error(reclassify)
            .on_error(FailureRenderer(log.clone()));

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 502);
        assert_eq!(entries(&log), ["error: handler error: reclassified"]);
    }

    #[tokio::test]
    async fn exhausted_error_chain_falls_back_to_default_responder() {
        let app = App::new().middleware(Failing);

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 500);
        assert_eq!(response.body(), DEFAULT_ERROR_BODY);
    }

    #[tokio::test]
    async fn handler_failure_reaches_the_error_chain() {
        let log = log();
        let app = App::new()
            .get("/fail", |_req: Request| async {
                Err::<Response, _>(Failure::Handler("from handler".into()))
            })
            .on_error(FailureRenderer(log.clone()));

        let response = app.dispatch(Request::new(Method::Get, "/fail")).await;

        assert_eq!(response.status_code(), 502);
        assert_eq!(entries(&log), ["error: handler error: from handler"]);
    }

    #[tokio::test]
    async fn unrouted_request_gets_the_default_404() {
        let app = App::new();

        let response = app.dispatch(Request::new(Method::Get, "/nowhere")).await;

        assert_eq!(response.status_code(), 404);
        assert_eq!(response.body(), NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn wrong_method_gets_405() {
        let app = App::new().get("/only-get", |_req: Request| async {
            Ok::<_, Failure>("here")
        });

        let response = app.dispatch(Request::new(Method::Post, "/only-get")).await;

        assert_eq!(response.status_code(), 405);
    }

    #[tokio::test]
    async fn double_proceed_is_a_contract_violation() {
        fn greedy<'a>(_cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move {
                next.proceed();
                next.proceed();
                Ok(())
            })
        }

        let app = App::new()
            .middleware(greedy)
            .get("/", |_req: Request| async { Ok::<_, Failure>("unreached") });

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn double_respond_is_a_contract_violation() {
        fn chatty<'a>(cx: &'a mut Exchange, _next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move {
                cx.respond(Response::text("one"));
                cx.respond(Response::text("two"));
                Ok(())
            })
        }

        let app = App::new().middleware(chatty);

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn headers_set_by_middleware_survive_onto_the_handler_response() {
        fn tag<'a>(cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move {
                cx.set_header("x-request-tag", "tagged");
                next.proceed();
                Ok(())
            })
        }

        let app = App::new()
            .middleware(tag)
            .get("/", |_req: Request| async { Ok::<_, Failure>("ok") });

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.header("x-request-tag"), Some("tagged"));
        assert_eq!(response.body(), b"ok");
    }

    #[tokio::test]
    async fn step_that_neither_proceeds_nor_responds_ends_the_request() {
        fn stall<'a>(_cx: &'a mut Exchange, _next: &'a mut Next) -> StepFuture<'a> {
            Box::pin(async move { Ok(()) })
        }

        let app = App::new()
            .middleware(stall)
            .get("/", |_req: Request| async { Ok::<_, Failure>("unreached") });

        let response = app.dispatch(Request::new(Method::Get, "/")).await;

        assert_eq!(response.status_code(), 404);
    }
}
