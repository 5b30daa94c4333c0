use serde_json::{Number, Value as Json};

use crate::context::Context;
use crate::util::strip_quotes;

/// A template variable reference as written in a tag invocation.
///
/// Numeric tokens, quoted strings and the `True`/`False`/`None` keywords are
/// literals. Everything else is a dotted lookup into the rendering context.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Literal(Json),
    Lookup(String),
}

impl Variable {
    #[must_use]
    pub fn new(token: &str) -> Self {
        if let Some(literal) = parse_literal(token) {
            return Self::Literal(literal);
        }
        Self::Lookup(token.to_owned())
    }

    /// Resolve against a context. Missing lookups yield `None`.
    pub fn resolve(&self, context: &dyn Context) -> Option<Json> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Lookup(path) => context.resolve_variable(path),
        }
    }
}

fn parse_literal(token: &str) -> Option<Json> {
    match token {
        "True" => return Some(Json::Bool(true)),
        "False" => return Some(Json::Bool(false)),
        "None" => return Some(Json::Null),
        _ => {}
    }
    if let Some(inner) = strip_quotes(token) {
        return Some(Json::String(inner.to_owned()));
    }
    if let Ok(int) = token.parse::<i64>() {
        return Some(Json::from(int));
    }

    // Only tokens that start like a number, so `inf` and `NaN` stay lookups.
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) || token.ends_with('.') {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Json::Number)
}
