//! In-memory todo resource.
//!
//! The worked example the engine is validated against: four CRUD handlers
//! over one shared ordered collection. A todo is whatever JSON object the
//! client sent; the only field the engine interprets is `id`, and even that
//! one loosely:
//!
//! - ids are client-supplied strings and **uniqueness is not enforced**
//! - update and delete apply to *every* todo whose id matches, in place
//! - update and delete against an id nobody has still report success
//!
//! All three are preserved from the behaviour this resource documents, not
//! oversights to fix here.
//!
//! Wire it up with [`mount`]:
//!
//! ```rust
//! use troilo::{App, middleware, todos};
//!
//! let store = todos::TodoStore::new();
//! let app = todos::mount(
//!     App::new().middleware(middleware::parse_json_body),
//!     &store,
//! );
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::app::App;
use crate::error::Failure;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The shared todo collection: one ordered sequence behind one lock.
///
/// Cloning the store clones the handle, not the data; every handler works
/// against the same sequence. All four operations take the lock for their
/// whole scan, which is the minimum discipline that keeps concurrent
/// create/update/delete from tearing each other's iteration.
#[derive(Clone, Default)]
pub struct TodoStore {
    inner: Arc<Mutex<Vec<Value>>>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full sequence, in insertion order.
    pub fn list(&self) -> Vec<Value> {
        self.lock().clone()
    }

    /// Appends `todo` verbatim. No shape or id-uniqueness validation.
    pub fn create(&self, todo: Value) {
        self.lock().push(todo);
    }

    /// Replaces every todo whose id equals `id` with `replacement`,
    /// preserving position. Zero matches is not an error.
    pub fn update(&self, id: &str, replacement: Value) {
        for slot in self.lock().iter_mut() {
            if todo_id(slot) == Some(id) {
                *slot = replacement.clone();
            }
        }
    }

    /// Removes every todo whose id equals `id`. Zero matches is not an error.
    pub fn delete(&self, id: &str) {
        self.lock().retain(|todo| todo_id(todo) != Some(id));
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        // A panicked handler cannot corrupt a Vec of Values, so recover
        // rather than poison every request that follows.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The string id of a stored todo, if it has one.
fn todo_id(todo: &Value) -> Option<&str> {
    todo.get("id").and_then(Value::as_str)
}

/// Registers the four todo routes on `app`, backed by `store`.
///
/// | Method | Path | Success |
/// |---|---|---|
/// | GET | `/todos` | 200, JSON array |
/// | POST | `/todos` | 201, confirmation |
/// | PUT | `/todos/{id}` | 200, confirmation |
/// | DELETE | `/todos/{id}` | 200, confirmation |
///
/// POST and PUT read the parsed JSON body, so
/// [`middleware::parse_json_body`](crate::middleware::parse_json_body) must
/// be mounted ahead of these routes; a request that never went through the
/// parser gets a 400.
pub fn mount(app: App, store: &TodoStore) -> App {
    let list_store = store.clone();
    let create_store = store.clone();
    let update_store = store.clone();
    let delete_store = store.clone();

    app.get("/todos", move |_req: Request| {
        let store = list_store.clone();
        async move {
            let bytes = serde_json::to_vec(&store.list()).map_err(Failure::handler)?;
            Ok(Response::json(bytes))
        }
    })
    .post("/todos", move |req: Request| {
        let store = create_store.clone();
        async move {
            let Some(body) = req.json().cloned() else {
                return Ok(Response::status(Status::BadRequest));
            };
            store.create(body);
            Ok(Response::builder()
                .status(Status::Created)
                .json(br#"{"message":"todo created"}"#.to_vec()))
        }
    })
    .put("/todos/{id}", move |req: Request| {
        let store = update_store.clone();
        async move {
            let Some(body) = req.json().cloned() else {
                return Ok(Response::status(Status::BadRequest));
            };
            let id = req.param("id").unwrap_or_default().to_owned();
            store.update(&id, body);
            Ok(Response::json(br#"{"message":"todo updated"}"#.to_vec()))
        }
    })
    .delete("/todos/{id}", move |req: Request| {
        let store = delete_store.clone();
        async move {
            store.delete(req.param("id").unwrap_or_default());
            Ok(Response::json(br#"{"message":"todo deleted"}"#.to_vec()))
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn crud_round_trip() {
        let store = TodoStore::new();

        store.create(json!({"id": "1", "title": "a"}));
        let listed = store.list();
        assert_eq!(listed, vec![json!({"id": "1", "title": "a"})]);

        store.update("1", json!({"id": "1", "title": "b"}));
        assert_eq!(store.list(), vec![json!({"id": "1", "title": "b"})]);

        store.delete("1");
        assert!(store.list().is_empty());
    }

    #[test]
    fn list_is_read_only() {
        let store = TodoStore::new();
        store.create(json!({"id": "1"}));

        let first = store.list();
        let second = store.list();

        assert_eq!(first, second);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn missing_id_operations_are_no_ops() {
        let store = TodoStore::new();
        store.create(json!({"id": "1", "title": "keep"}));

        store.update("missing", json!({"id": "missing"}));
        store.delete("missing");

        assert_eq!(store.list(), vec![json!({"id": "1", "title": "keep"})]);
    }

    #[test]
    fn duplicate_ids_are_updated_and_deleted_together() {
        let store = TodoStore::new();
        store.create(json!({"id": "1", "title": "first"}));
        store.create(json!({"id": "2", "title": "other"}));
        store.create(json!({"id": "1", "title": "second"}));

        store.update("1", json!({"id": "1", "title": "both"}));
        assert_eq!(
            store.list(),
            vec![
                json!({"id": "1", "title": "both"}),
                json!({"id": "2", "title": "other"}),
                json!({"id": "1", "title": "both"}),
            ],
        );

        store.delete("1");
        assert_eq!(store.list(), vec![json!({"id": "2", "title": "other"})]);
    }

    #[test]
    fn position_is_preserved_across_update() {
        let store = TodoStore::new();
        store.create(json!({"id": "a"}));
        store.create(json!({"id": "b"}));
        store.create(json!({"id": "c"}));

        store.update("b", json!({"id": "b", "done": true}));

        assert_eq!(todo_id(&store.list()[1]), Some("b"));
        assert_eq!(store.list()[1]["done"], json!(true));
    }

    #[test]
    fn todos_without_a_string_id_are_untouchable_by_id() {
        let store = TodoStore::new();
        store.create(json!({"title": "no id"}));
        store.create(json!({"id": 7, "title": "numeric id"}));

        store.delete("7");
        store.update("7", json!({"id": "7"}));

        assert_eq!(store.list().len(), 2);
    }
}
