//! Parsed argument values and their render-time resolution.
//!
//! A [`Value`] is what the parser stores for each argument. Resolving it
//! against a [`Context`] yields the JSON value handed to the tag, after the
//! value's [`ValueKind`] has validated and converted it.
//!
//! Validation failures are governed by [`ErrorMode`]: strict mode returns a
//! [`ValueError`], lenient mode logs a warning and substitutes the kind's
//! fallback value.

use std::collections::HashMap;

use customtags_config::{Config, TemplatesConfig};
use regex::Regex;
use serde_json::{Map, Value as Json};
use std::sync::LazyLock;

use crate::context::Context;
use crate::error::ValueError;
use crate::variable::Variable;

/// Parsed but unresolved arguments, keyed by argument name.
pub type Kwargs = HashMap<String, Value>;

/// Resolved arguments handed to a tag's render step.
pub type Arguments = Map<String, Json>;

static COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" *, *").unwrap());

/// How value validation failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail rendering with a [`ValueError`].
    Strict,
    /// Log a warning and use the fallback value.
    #[default]
    Lenient,
}

impl ErrorMode {
    #[must_use]
    pub fn from_debug(debug: bool) -> Self {
        if debug { Self::Strict } else { Self::Lenient }
    }
}

impl From<&TemplatesConfig> for ErrorMode {
    fn from(config: &TemplatesConfig) -> Self {
        Self::from_debug(config.debug)
    }
}

impl From<&Config> for ErrorMode {
    fn from(config: &Config) -> Self {
        Self::from(&config.templates)
    }
}

/// Where a typed value's raw content comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Literal content written in the template (quoted or non-resolving).
    Constant(Json),
    /// Content looked up in the rendering context.
    Variable(Variable),
}

impl Reference {
    fn raw(&self, context: &dyn Context) -> Json {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Variable(var) => var.resolve(context).unwrap_or(Json::Null),
        }
    }
}

/// Validation and conversion rule applied to a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    String,
    Integer,
}

impl ValueKind {
    /// Error message templates by category. `{value}` is replaced with the
    /// offending value.
    #[must_use]
    pub fn errors(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::String => &[],
            Self::Integer => &[("clean", "{value} could not be converted to Integer")],
        }
    }

    /// Value rendered in place of one that failed validation in lenient mode.
    #[must_use]
    pub fn fallback(self) -> Json {
        match self {
            Self::String | Self::Integer => Json::String(String::new()),
        }
    }

    /// Validate and convert `raw`, returning the error category on failure.
    ///
    /// An empty string coming from the context becomes `null`, since hosts
    /// render both identically. Written constants are kept as-is.
    pub fn clean(self, raw: &Json, constant: bool) -> Result<Json, &'static str> {
        match self {
            Self::String => match raw {
                Json::String(s) if s.is_empty() && !constant => Ok(Json::Null),
                other => Ok(other.clone()),
            },
            Self::Integer => clean_integer(raw).ok_or("clean"),
        }
    }

    /// Report a validation failure according to `mode`.
    pub fn error(
        self,
        raw: &Json,
        category: &'static str,
        mode: ErrorMode,
    ) -> Result<Json, ValueError> {
        let template = self
            .errors()
            .iter()
            .find(|(cat, _)| *cat == category)
            .map_or("", |(_, template)| *template);
        let message = template.replace("{value}", &raw.to_string());

        match mode {
            ErrorMode::Strict => Err(ValueError::Invalid { category, message }),
            ErrorMode::Lenient => {
                tracing::warn!(category, value = %raw, "{message}");
                Ok(self.fallback())
            }
        }
    }
}

/// Integer conversion. `None` means the value cannot be converted.
fn clean_integer(raw: &Json) -> Option<Json> {
    match raw {
        Json::Null => Some(Json::Null),
        Json::Bool(b) => Some(Json::from(i64::from(*b))),
        Json::Number(n) if n.is_i64() || n.is_u64() => Some(raw.clone()),
        Json::Number(n) => float_to_integer(n.as_f64()?).map(Json::from),
        Json::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(Json::Null);
            }
            trimmed.parse::<i64>().ok().map(Json::from)
        }
        Json::Array(_) | Json::Object(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_integer(f: f64) -> Option<i64> {
    let truncated = f.trunc();
    let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
    (truncated.is_finite() && in_range).then_some(truncated as i64)
}

/// How a multi-value argument's resolved items are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    /// Keep the items as a list.
    #[default]
    List,
    /// Treat the items as one comma-separated list, so `a,b`, `a, b` and
    /// `a b` all produce `["a", "b"]`.
    CommaSeparated,
}

impl SequenceKind {
    fn clean(self, items: Vec<Json>) -> Json {
        match self {
            Self::List => Json::Array(items),
            Self::CommaSeparated => {
                let joined = items
                    .iter()
                    .map(|item| match item {
                        Json::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let normalized = COMMA_RE.replace_all(joined.trim(), ",");
                Json::Array(
                    normalized
                        .split(',')
                        .filter(|part| !part.is_empty())
                        .map(|part| Json::String(part.to_owned()))
                        .collect(),
                )
            }
        }
    }
}

/// Ordered values collected by a multi-value argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListValue {
    pub items: Vec<Value>,
    pub sequence: SequenceKind,
}

impl ListValue {
    #[must_use]
    pub fn new(sequence: SequenceKind) -> Self {
        Self {
            items: Vec::new(),
            sequence,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Named values collected by a keyword argument, in template order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictValue {
    pub entries: Vec<(String, Value)>,
}

impl DictValue {
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.push((key, value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed argument value, resolved lazily at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Pre-resolved content such as defaults and flag results.
    Static(Json),
    /// A single token with a validation rule.
    Typed { kind: ValueKind, reference: Reference },
    /// Values collected by a multi-value argument.
    List(ListValue),
    /// Values collected by a keyword argument.
    Dict(DictValue),
}

impl Value {
    #[must_use]
    pub fn constant(kind: ValueKind, value: impl Into<Json>) -> Self {
        Self::Typed {
            kind,
            reference: Reference::Constant(value.into()),
        }
    }

    #[must_use]
    pub fn variable(kind: ValueKind, token: &str) -> Self {
        Self::Typed {
            kind,
            reference: Reference::Variable(Variable::new(token)),
        }
    }

    /// Resolve against `context`, validating through the value's kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when validation fails in [`ErrorMode::Strict`].
    /// In lenient mode this never fails.
    pub fn resolve(&self, context: &dyn Context, mode: ErrorMode) -> Result<Json, ValueError> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Typed { kind, reference } => {
                let raw = reference.raw(context);
                let constant = matches!(reference, Reference::Constant(_));
                match kind.clean(&raw, constant) {
                    Ok(cleaned) => Ok(cleaned),
                    Err(category) => kind.error(&raw, category, mode),
                }
            }
            Self::List(list) => {
                let items = list
                    .items
                    .iter()
                    .map(|item| item.resolve(context, mode))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(list.sequence.clean(items))
            }
            Self::Dict(dict) => {
                let mut resolved = Map::new();
                for (key, value) in &dict.entries {
                    resolved.insert(key.clone(), value.resolve(context, mode)?);
                }
                Ok(Json::Object(resolved))
            }
        }
    }
}

/// Resolve every parsed argument for rendering.
///
/// # Errors
///
/// Returns the first [`ValueError`] raised in strict mode.
pub fn resolve_all(
    kwargs: &Kwargs,
    context: &dyn Context,
    mode: ErrorMode,
) -> Result<Arguments, ValueError> {
    let mut resolved = Arguments::new();
    for (name, value) in kwargs {
        resolved.insert(name.clone(), value.resolve(context, mode)?);
    }
    Ok(resolved)
}
