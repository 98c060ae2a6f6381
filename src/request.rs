//! Incoming HTTP request type.

use std::collections::HashMap;

use crate::method::Method;

/// An incoming HTTP request.
///
/// Built by the server from the wire (or by hand in tests), then treated as
/// read-only for the rest of dispatch. The two exceptions are deliberate:
/// the router binds path parameters on match, and the body-parser step
/// populates [`json`](Request::json). Handlers receive their own copy, so the
/// original request stays available to the error pipeline.
#[derive(Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    params: HashMap<String, String>,
    json: Option<serde_json::Value>,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    ///
    /// The server builds requests this way from the wire; tests build them
    /// the same way to drive [`App::dispatch`](crate::App::dispatch) directly.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
            params: HashMap::new(),
            json: None,
        }
    }

    /// Appends a header. Returns `self` for chaining.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Sets the raw body bytes. Returns `self` for chaining.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/todos/{id}`, `req.param("id")` on `/todos/42` returns
    /// `Some("42")`. Empty until the router has matched the request.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The body decoded as JSON, if the body-parser step ran and the request
    /// declared `application/json`.
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_json(&mut self, value: serde_json::Value) {
        self.json = Some(value);
    }
}
