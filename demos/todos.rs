//! Todo API example — the full wiring of chain, router, and error pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example todos
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/todos
//!   curl -X POST http://localhost:3000/todos \
//!        -H 'content-type: application/json' \
//!        -d '{"id":"1","title":"buy milk"}'
//!   curl -X PUT http://localhost:3000/todos/1 \
//!        -H 'content-type: application/json' \
//!        -d '{"id":"1","title":"buy oat milk"}'
//!   curl -X DELETE http://localhost:3000/todos/1
//!   # malformed body -> handled by the error pipeline, never the handler:
//!   curl -X POST http://localhost:3000/todos \
//!        -H 'content-type: application/json' -d '{oops'

use troilo::{
    App, Exchange, Failure, Next, Request, Response, Server, Status, StepFuture, middleware, todos,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = todos::TodoStore::new();

    let app = App::new()
        .middleware(middleware::log_requests)
        .middleware(middleware::parse_json_body)
        .get("/", |_req: Request| async {
            Ok::<_, Failure>(Response::text("todo service"))
        })
        .get("/about", |_req: Request| async {
            Ok::<_, Failure>(Response::text("a worked example of chain + router dispatch"))
        })
        .on_error(render_failure);
    let app = todos::mount(app, &store);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

/// Terminal error step: turns any signaled failure into a JSON response with
/// a status that fits the failure class.
fn render_failure<'a>(
    failure: &'a Failure,
    cx: &'a mut Exchange,
    _next: &'a mut Next,
) -> StepFuture<'a> {
    Box::pin(async move {
        let status = match failure {
            Failure::MalformedBody(_) => Status::BadRequest,
            Failure::BodyTooLarge(_) => Status::ContentTooLarge,
            Failure::Handler(_) => Status::InternalServerError,
        };
        let body = serde_json::json!({ "error": failure.to_string() });
        cx.respond(
            Response::builder()
                .status(status)
                .json(serde_json::to_vec(&body).unwrap_or_default()),
        );
        Ok(())
    })
}
