//! Rendering context abstraction.
//!
//! The template host owns variable lookup. This crate only needs to resolve
//! dotted paths and to store values for tags that assign into the context.

use serde_json::{Map, Value as Json};

/// Variable lookup and assignment during rendering.
pub trait Context {
    /// Resolve a dotted variable path like `user.name` or `items.0`.
    ///
    /// Returns `None` when any segment of the path is missing.
    fn resolve_variable(&self, path: &str) -> Option<Json>;

    /// Store a value under `name` in the innermost scope.
    fn set(&mut self, name: &str, value: Json);

    /// Open a nested scope. Contexts without scoping ignore this.
    fn push(&mut self) {}

    /// Close the innermost scope opened by [`push`](Self::push).
    fn pop(&mut self) {}
}

/// Walk a dotted path through nested objects and arrays.
///
/// Each segment is tried as an object key first, then as an array index.
#[must_use]
pub fn lookup_path<'a>(root: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.').try_fold(root, |current, segment| match current {
        Json::Object(map) => map.get(segment),
        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_in_map(map: &Map<String, Json>, path: &str) -> Option<Json> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let value = map.get(head)?;
    match rest {
        Some(rest) => lookup_path(value, rest).cloned(),
        None => Some(value.clone()),
    }
}

impl Context for Map<String, Json> {
    fn resolve_variable(&self, path: &str) -> Option<Json> {
        lookup_in_map(self, path)
    }

    fn set(&mut self, name: &str, value: Json) {
        self.insert(name.to_owned(), value);
    }
}

/// Layered context with push/pop scoping.
///
/// Lookups search from the innermost layer outwards. Assignments always land
/// in the innermost layer, so values set inside a block disappear on `pop`.
#[derive(Debug, Clone)]
pub struct ContextStack {
    layers: Vec<Map<String, Json>>,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self {
            layers: vec![Map::new()],
        }
    }
}

impl ContextStack {
    /// Create a stack whose base layer is `root`.
    #[must_use]
    pub fn new(root: Map<String, Json>) -> Self {
        Self { layers: vec![root] }
    }

    /// Number of layers, including the base layer.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl From<Map<String, Json>> for ContextStack {
    fn from(root: Map<String, Json>) -> Self {
        Self::new(root)
    }
}

impl Context for ContextStack {
    fn resolve_variable(&self, path: &str) -> Option<Json> {
        let head = path.split_once('.').map_or(path, |(head, _)| head);
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.contains_key(head))
            .and_then(|layer| lookup_in_map(layer, path))
    }

    fn set(&mut self, name: &str, value: Json) {
        if let Some(layer) = self.layers.last_mut() {
            layer.insert(name.to_owned(), value);
        }
    }

    fn push(&mut self) {
        self.layers.push(Map::new());
    }

    /// The base layer is never removed.
    fn pop(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
        }
    }
}
