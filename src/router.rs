//! Ordered, first-match-wins request router.
//!
//! Routes live in one flat table in registration order. Dispatch scans the
//! table top to bottom and the first route whose method and segment shape
//! both fit the request wins, even if a later route would also fit. There is
//! no specificity ranking and no backtracking; if you want `/todos/new` to
//! beat `/todos/{id}`, register it first.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// A rejected route pattern, reported at registration time.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidPatternError {
    #[error("route pattern is empty")]
    Empty,
    #[error("route pattern `{0}` must begin with `/`")]
    MissingLeadingSlash(String),
    #[error("route pattern `{0}` contains an empty segment")]
    EmptySegment(String),
    #[error("route pattern `{0}` contains a parameter with an empty name")]
    EmptyParamName(String),
}

/// Why a lookup produced no handler.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum RouteError {
    /// No route matched the path at all.
    NotFound,
    /// Some route matched the path, but under a different method.
    MethodNotAllowed,
}

// ── Patterns ──────────────────────────────────────────────────────────────────

/// One segment of a parsed route pattern.
#[derive(Debug)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern: `/todos/{id}` becomes `[Literal("todos"), Param("id")]`.
#[derive(Debug)]
struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, InvalidPatternError> {
        if raw.is_empty() {
            return Err(InvalidPatternError::Empty);
        }
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| InvalidPatternError::MissingLeadingSlash(raw.to_owned()))?;

        // "/" is the zero-segment pattern.
        if rest.is_empty() {
            return Ok(Self { segments: Vec::new() });
        }

        let mut segments = Vec::new();
        for piece in rest.split('/') {
            if piece.is_empty() {
                return Err(InvalidPatternError::EmptySegment(raw.to_owned()));
            }
            if let Some(name) = piece.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(InvalidPatternError::EmptyParamName(raw.to_owned()));
                }
                segments.push(Segment::Param(name.to_owned()));
            } else {
                segments.push(Segment::Literal(piece.to_owned()));
            }
        }
        Ok(Self { segments })
    }

    /// Structural match: literals compare exactly, parameters bind any single
    /// non-empty segment. Returns the bound parameters on success.
    fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let trimmed = path.strip_prefix('/')?;
        let given: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        if given.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, value) in self.segments.iter().zip(&given) {
            match segment {
                Segment::Literal(lit) if lit == value => {}
                Segment::Param(name) if !value.is_empty() => {
                    params.insert(name.clone(), (*value).to_owned());
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; either hand it to [`App`](crate::App) (the usual
/// path, via the app's own registration methods) or drive it directly. Each
/// [`Router::on`] call returns `self` so registrations chain naturally.
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for a method + pattern pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern. Use [`Router::try_on`] to handle the
    /// [`InvalidPatternError`] instead.
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.try_on(method, pattern, handler)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"))
    }

    /// Fallible registration. Appends the route to the table on success.
    pub fn try_on(
        mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<Self, InvalidPatternError> {
        let pattern = Pattern::parse(pattern)?;
        self.routes.push(Route { method, pattern, handler: handler.into_boxed_handler() });
        Ok(self)
    }

    /// Scans the table in registration order for the first structural match.
    ///
    /// Distinguishes a path nobody registered (`NotFound`) from a path that
    /// is only registered under other methods (`MethodNotAllowed`).
    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(BoxedHandler, HashMap<String, String>), RouteError> {
        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = route.pattern.captures(path) else {
                continue;
            };
            if route.method == method {
                return Ok((Arc::clone(&route.handler), params));
            }
            path_matched = true;
        }
        if path_matched {
            Err(RouteError::MethodNotAllowed)
        } else {
            Err(RouteError::NotFound)
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::request::Request;
    use crate::response::Response;

    async fn call(router: &Router, method: Method, path: &str) -> Result<String, RouteError> {
        let (handler, params) = router.lookup(method, path)?;
        let mut req = Request::new(method, path);
        req.set_params(params);
        let response = handler.call(req).await.expect("test handler failed");
        Ok(String::from_utf8(response.body().to_vec()).unwrap())
    }

    fn named(name: &'static str) -> impl Handler {
        move |_req: Request| async move { Ok::<_, Failure>(Response::text(name)) }
    }

    #[test]
    fn pattern_rejects_bad_syntax() {
        assert_eq!(Pattern::parse("").unwrap_err(), InvalidPatternError::Empty);
        assert_eq!(
            Pattern::parse("todos").unwrap_err(),
            InvalidPatternError::MissingLeadingSlash("todos".into()),
        );
        assert_eq!(
            Pattern::parse("/todos//x").unwrap_err(),
            InvalidPatternError::EmptySegment("/todos//x".into()),
        );
        assert_eq!(
            Pattern::parse("/todos/{}").unwrap_err(),
            InvalidPatternError::EmptyParamName("/todos/{}".into()),
        );
    }

    #[test]
    fn pattern_binds_params() {
        let pattern = Pattern::parse("/todos/{id}").unwrap();
        let params = pattern.captures("/todos/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(pattern.captures("/todos").is_none());
        assert!(pattern.captures("/todos/42/extra").is_none());
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let router = Router::new()
            .on(Method::Get, "/todos/{id}", named("param"))
            .on(Method::Get, "/todos/new", named("literal"));

        // Both routes fit `/todos/new`; the earlier registration wins.
        assert_eq!(call(&router, Method::Get, "/todos/new").await.unwrap(), "param");
    }

    #[tokio::test]
    async fn params_reach_the_handler() {
        let router = Router::new().on(Method::Get, "/todos/{id}", |req: Request| async move {
            Ok::<_, Failure>(Response::text(req.param("id").unwrap_or("none").to_owned()))
        });

        assert_eq!(call(&router, Method::Get, "/todos/42").await.unwrap(), "42");
    }

    #[tokio::test]
    async fn distinguishes_not_found_from_wrong_method() {
        let router = Router::new().on(Method::Get, "/todos", named("list"));

        assert_eq!(call(&router, Method::Get, "/todos").await.unwrap(), "list");
        assert_eq!(
            call(&router, Method::Post, "/todos").await.unwrap_err(),
            RouteError::MethodNotAllowed,
        );
        assert_eq!(
            call(&router, Method::Get, "/nope").await.unwrap_err(),
            RouteError::NotFound,
        );
    }

    #[tokio::test]
    async fn root_pattern_matches_only_root() {
        let router = Router::new().on(Method::Get, "/", named("home"));

        assert_eq!(call(&router, Method::Get, "/").await.unwrap(), "home");
        assert_eq!(
            call(&router, Method::Get, "/home").await.unwrap_err(),
            RouteError::NotFound,
        );
    }
}
