//! JSON body parsing step.

use crate::error::Failure;
use crate::exchange::Exchange;
use crate::middleware::{Next, StepFuture};

/// Upper bound on bodies we are willing to parse. Anything larger is
/// rejected before `serde_json` ever sees it.
const MAX_PARSE_BYTES: usize = 1024 * 1024;

/// Decodes the request body when the request declares `application/json`.
///
/// On success the decoded value is stored on the request
/// ([`Request::json`](crate::Request::json)) and the chain proceeds. A body
/// that declares JSON but fails to decode signals
/// [`Failure::MalformedBody`] into the error pipeline; the route handler
/// never runs. Requests without a JSON content type pass through untouched.
///
/// Mount it ahead of any handler that reads a body:
///
/// ```rust
/// use troilo::{App, middleware};
///
/// let app = App::new().middleware(middleware::parse_json_body);
/// ```
pub fn parse_json_body<'a>(cx: &'a mut Exchange, next: &'a mut Next) -> StepFuture<'a> {
    Box::pin(async move {
        if !declares_json(cx) {
            next.proceed();
            return Ok(());
        }

        let value = {
            let body = cx.request().body();
            if body.len() > MAX_PARSE_BYTES {
                return Err(Failure::BodyTooLarge(body.len()));
            }
            serde_json::from_slice(body).map_err(|e| Failure::MalformedBody(e.to_string()))?
        };

        cx.request_mut().set_json(value);
        next.proceed();
        Ok(())
    })
}

/// `content-type: application/json`, ignoring any `;charset=` suffix.
fn declares_json(cx: &Exchange) -> bool {
    cx.request()
        .header("content-type")
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}
