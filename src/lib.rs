//! # troilo
//!
//! A small HTTP framework built around one idea: a request is dispatched
//! through an **ordered middleware chain** with explicit continuation
//! control, a **first-match router** as the chain's terminal step, and a
//! parallel **error pipeline** that is only reachable by an explicit failure
//! signal.
//!
//! ## The contract
//!
//! - Middleware runs in registration order, optionally scoped to a path
//!   prefix. A step proceeds, responds, or fails; nothing is implicit.
//! - Routes match in registration order. The first structural match wins,
//!   with no specificity ranking — you control precedence by ordering.
//! - A signaled failure diverts to the error pipeline and never returns to
//!   the normal chain. A built-in responder guarantees exactly one response
//!   per request, whatever the steps do.
//! - The response is write-once. Double writes and double continuation calls
//!   are detected and answered with a 500, not silently ignored.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use troilo::{App, Failure, Request, Response, Server, middleware, todos};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = todos::TodoStore::new();
//!
//!     let app = App::new()
//!         .middleware(middleware::log_requests)
//!         .middleware(middleware::parse_json_body)
//!         .get("/", |_req: Request| async {
//!             Ok::<_, Failure>(Response::text("hello"))
//!         });
//!     let app = todos::mount(app, &store);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod app;
mod error;
mod exchange;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod middleware;
pub mod todos;

pub use app::App;
pub use error::{Error, Failure};
pub use exchange::Exchange;
pub use handler::Handler;
pub use method::Method;
pub use middleware::{ErrorStep, Next, Step, StepFuture};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response};
pub use router::{InvalidPatternError, Router};
pub use server::Server;
pub use status::Status;
