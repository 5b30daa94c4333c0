//! Declarative argument descriptors.
//!
//! An [`Argument`] is defined once per tag and shared by every invocation.
//! During parsing the parser offers it one bit at a time through
//! [`Argument::parse`], which either consumes the bit into the keyword
//! arguments or declines it so the parser can try the next argument.
//!
//! # Example
//!
//! ```
//! use customtags::Argument;
//!
//! let varname = Argument::new("varname").optional().no_resolve();
//! let count = Argument::integer("count").default(10);
//! let items = Argument::multi("items").max_values(3);
//! let safe = Argument::flag("safe")
//!     .true_values(["on"])
//!     .false_values(["off"])
//!     .default(false);
//! # let _ = (varname, count, items, safe);
//! ```

use serde_json::Value as Json;

use crate::error::{OptionsError, ParseError};
use crate::util::strip_quotes;
use crate::value::{DictValue, Kwargs, ListValue, SequenceKind, Value, ValueKind};

/// Accepted tokens of a [`ArgumentKind::Flag`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlagValues {
    pub true_values: Vec<String>,
    pub false_values: Vec<String>,
    pub case_sensitive: bool,
}

impl FlagValues {
    fn normalize<'a>(&self, token: &'a str) -> std::borrow::Cow<'a, str> {
        if self.case_sensitive {
            token.into()
        } else {
            token.to_lowercase().into()
        }
    }

    fn contains(&self, values: &[String], token: &str) -> bool {
        let token = self.normalize(token);
        values.iter().any(|v| self.normalize(v) == token)
    }

    /// Match a token, returning the flag value it stands for.
    fn matches(&self, token: &str) -> Option<bool> {
        if self.contains(&self.true_values, token) {
            Some(true)
        } else if self.contains(&self.false_values, token) {
            Some(false)
        } else {
            None
        }
    }

    fn allowed(&self) -> Vec<String> {
        self.true_values
            .iter()
            .chain(&self.false_values)
            .map(|v| self.normalize(v).into_owned())
            .collect()
    }
}

/// How an argument consumes bits and what it stores.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentKind {
    /// Exactly one bit.
    Single(ValueKind),
    /// Consecutive bits collected into a list, up to `max_values`.
    MultiValue {
        item: ValueKind,
        max_values: Option<usize>,
        sequence: SequenceKind,
    },
    /// `key=value` bits collected into a mapping, up to `max_values`.
    Keyword {
        item: ValueKind,
        max_values: Option<usize>,
    },
    /// One bit matched against fixed true/false tokens.
    Flag(FlagValues),
    /// Alternatives tried in order. The first one accepting a bit is kept
    /// and receives every following bit; the others are never filled.
    OneOf(Vec<Argument>),
}

/// A named argument of a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub default: Option<Json>,
    pub required: bool,
    pub resolve: bool,
    pub exclude: Vec<String>,
    pub kind: ArgumentKind,
}

impl Argument {
    fn with_kind(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self {
            name: name.into(),
            default: None,
            required: true,
            resolve: true,
            exclude: Vec::new(),
            kind,
        }
    }

    /// A single-bit string argument.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, ArgumentKind::Single(ValueKind::String))
    }

    /// A single-bit argument converted to an integer at render time.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::with_kind(name, ArgumentKind::Single(ValueKind::Integer))
    }

    /// A variadic argument collecting consecutive bits into a list.
    #[must_use]
    pub fn multi(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ArgumentKind::MultiValue {
                item: ValueKind::String,
                max_values: None,
                sequence: SequenceKind::List,
            },
        )
    }

    /// A single `key=value` argument.
    #[must_use]
    pub fn keyword(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ArgumentKind::Keyword {
                item: ValueKind::String,
                max_values: Some(1),
            },
        )
    }

    /// A variadic argument collecting `key=value` bits into a mapping.
    #[must_use]
    pub fn multi_keyword(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ArgumentKind::Keyword {
                item: ValueKind::String,
                max_values: None,
            },
        )
    }

    /// A boolean flag. At least one of `true_values`/`false_values` must be set.
    #[must_use]
    pub fn flag(name: impl Into<String>) -> Self {
        Self::with_kind(name, ArgumentKind::Flag(FlagValues::default()))
    }

    /// A group whose first accepting alternative wins.
    ///
    /// Alternatives store their values under their own names. `name` is only
    /// used for error reporting.
    #[must_use]
    pub fn one_of(
        name: impl Into<String>,
        alternatives: impl IntoIterator<Item = Argument>,
    ) -> Self {
        let alternatives = alternatives.into_iter().collect();
        Self::with_kind(name, ArgumentKind::OneOf(alternatives))
    }

    /// Make the argument optional with a `null` default.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the default value. Implies [`optional`](Self::optional).
    #[must_use]
    pub fn default(mut self, value: impl Into<Json>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    /// Store bits as literal strings instead of context lookups.
    #[must_use]
    pub fn no_resolve(mut self) -> Self {
        self.resolve = false;
        self
    }

    /// Reject these bits with [`ParseError::InvalidArgument`].
    #[must_use]
    pub fn exclude<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Convert collected values to integers. Multi-value and keyword only.
    #[must_use]
    pub fn integer_items(mut self) -> Self {
        match &mut self.kind {
            ArgumentKind::MultiValue { item, .. } | ArgumentKind::Keyword { item, .. } => {
                *item = ValueKind::Integer;
            }
            ArgumentKind::Single(_) | ArgumentKind::Flag(_) | ArgumentKind::OneOf(_) => {}
        }
        self
    }

    /// Cap the number of collected values. Multi-value and keyword only.
    #[must_use]
    pub fn max_values(mut self, max: usize) -> Self {
        match &mut self.kind {
            ArgumentKind::MultiValue { max_values, .. }
            | ArgumentKind::Keyword { max_values, .. } => {
                *max_values = Some(max);
            }
            ArgumentKind::Single(_) | ArgumentKind::Flag(_) | ArgumentKind::OneOf(_) => {}
        }
        self
    }

    /// Resolve collected values as one comma-separated list. Multi-value only.
    #[must_use]
    pub fn comma_separated(mut self) -> Self {
        if let ArgumentKind::MultiValue { sequence, .. } = &mut self.kind {
            *sequence = SequenceKind::CommaSeparated;
        }
        self
    }

    /// Flag only.
    #[must_use]
    pub fn true_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let ArgumentKind::Flag(flag) = &mut self.kind {
            flag.true_values = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Flag only.
    #[must_use]
    pub fn false_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let ArgumentKind::Flag(flag) = &mut self.kind {
            flag.false_values = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Flag only.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        if let ArgumentKind::Flag(flag) = &mut self.kind {
            flag.case_sensitive = true;
        }
        self
    }

    /// Check the definition for mistakes that would make it unusable.
    pub fn validate(&self) -> Result<(), OptionsError> {
        match &self.kind {
            ArgumentKind::Flag(flag)
                if flag.true_values.is_empty() && flag.false_values.is_empty() =>
            {
                Err(OptionsError::FlagWithoutValues(self.name.clone()))
            }
            ArgumentKind::MultiValue {
                max_values: Some(0),
                ..
            }
            | ArgumentKind::Keyword {
                max_values: Some(0),
                ..
            } => Err(OptionsError::ZeroMaxValues(self.name.clone())),
            ArgumentKind::OneOf(alternatives) if alternatives.is_empty() => {
                Err(OptionsError::EmptyOneOf(self.name.clone()))
            }
            ArgumentKind::OneOf(alternatives) => alternatives.iter().try_for_each(Self::validate),
            _ => Ok(()),
        }
    }

    /// Names under which this argument stores values.
    #[must_use]
    pub fn stored_names(&self) -> Vec<&str> {
        match &self.kind {
            ArgumentKind::OneOf(alternatives) => {
                alternatives.iter().flat_map(Self::stored_names).collect()
            }
            _ => vec![self.name.as_str()],
        }
    }

    /// Whether `kwargs` already hold a value for this argument.
    #[must_use]
    pub fn is_satisfied(&self, kwargs: &Kwargs) -> bool {
        match &self.kind {
            ArgumentKind::OneOf(alternatives) => {
                alternatives.iter().any(|a| a.is_satisfied(kwargs))
            }
            _ => kwargs.contains_key(&self.name),
        }
    }

    /// Store defaults for every name this argument left unset.
    pub fn fill_defaults(&self, kwargs: &mut Kwargs) {
        match &self.kind {
            ArgumentKind::OneOf(alternatives) => {
                for alternative in alternatives {
                    alternative.fill_defaults(kwargs);
                }
            }
            _ => {
                if !kwargs.contains_key(&self.name) {
                    kwargs.insert(self.name.clone(), self.get_default());
                }
            }
        }
    }

    /// Value used when the argument was never given in the template.
    #[must_use]
    pub fn get_default(&self) -> Value {
        match (&self.kind, &self.default) {
            (ArgumentKind::MultiValue { sequence, .. }, None) => {
                Value::List(ListValue::new(*sequence))
            }
            (ArgumentKind::Keyword { .. }, None) => Value::Dict(DictValue::default()),
            (_, default) => Value::Static(default.clone().unwrap_or(Json::Null)),
        }
    }

    /// Offer one bit to this argument.
    ///
    /// Returns `Ok(true)` if the bit was consumed into `kwargs`, `Ok(false)` if
    /// the argument declines it and the parser should try the next argument.
    pub fn parse(&self, bit: &str, tagname: &str, kwargs: &mut Kwargs) -> Result<bool, ParseError> {
        match &self.kind {
            ArgumentKind::Single(kind) => {
                if kwargs.contains_key(&self.name) {
                    return Ok(false);
                }
                self.check_excluded(bit, tagname)?;
                kwargs.insert(self.name.clone(), self.capture(*kind, bit));
                Ok(true)
            }
            ArgumentKind::MultiValue {
                item,
                max_values,
                sequence,
            } => {
                let len = match kwargs.get(&self.name) {
                    Some(Value::List(list)) => list.len(),
                    Some(_) => return Ok(false),
                    None => 0,
                };
                if max_values.is_some_and(|max| len >= max) {
                    return Ok(false);
                }
                self.check_excluded(bit, tagname)?;
                let value = self.capture(*item, bit);
                if let Value::List(list) = kwargs
                    .entry(self.name.clone())
                    .or_insert_with(|| Value::List(ListValue::new(*sequence)))
                {
                    list.push(value);
                }
                Ok(true)
            }
            ArgumentKind::Keyword { item, max_values } => {
                self.parse_keyword(*item, *max_values, bit, tagname, kwargs)
            }
            ArgumentKind::Flag(flag) => self.parse_flag(flag, bit, tagname, kwargs),
            ArgumentKind::OneOf(alternatives) => {
                self.parse_one_of(alternatives, bit, tagname, kwargs)
            }
        }
    }

    fn parse_keyword(
        &self,
        item: ValueKind,
        max_values: Option<usize>,
        bit: &str,
        tagname: &str,
        kwargs: &mut Kwargs,
    ) -> Result<bool, ParseError> {
        // Quoted bits are literals even when they contain `=`.
        if strip_quotes(bit).is_some() {
            return Ok(false);
        }
        let Some((key, raw)) = bit.split_once('=').filter(|(key, _)| is_identifier(key)) else {
            return Ok(false);
        };
        let dict = match kwargs.get(&self.name) {
            Some(Value::Dict(dict)) => Some(dict),
            Some(_) => return Ok(false),
            None => None,
        };
        let len = dict.map_or(0, DictValue::len);
        if max_values.is_some_and(|max| len >= max) {
            return Ok(false);
        }
        self.check_excluded(bit, tagname)?;
        if dict.is_some_and(|dict| dict.contains_key(key)) {
            return Err(ParseError::KeywordInUse {
                tagname: tagname.to_owned(),
                keyword: key.to_owned(),
            });
        }

        let value = self.capture(item, raw);
        if let Value::Dict(dict) = kwargs
            .entry(self.name.clone())
            .or_insert_with(|| Value::Dict(DictValue::default()))
        {
            dict.insert(key.to_owned(), value);
        }
        Ok(true)
    }

    fn parse_flag(
        &self,
        flag: &FlagValues,
        bit: &str,
        tagname: &str,
        kwargs: &mut Kwargs,
    ) -> Result<bool, ParseError> {
        if kwargs.contains_key(&self.name) {
            return Ok(false);
        }

        let matched = flag.matches(bit);
        let two_sided = !flag.true_values.is_empty() && !flag.false_values.is_empty();
        // Optional one-sided flags leave the bit for later arguments.
        if matched.is_none() && !two_sided && !self.required {
            return Ok(false);
        }
        self.check_excluded(bit, tagname)?;

        let value = match matched {
            Some(value) => value,
            None if two_sided => {
                return Err(ParseError::InvalidFlag {
                    tagname: tagname.to_owned(),
                    argname: self.name.clone(),
                    actual: bit.to_owned(),
                    allowed: flag.allowed(),
                });
            }
            None => flag.true_values.is_empty(),
        };

        kwargs.insert(self.name.clone(), Value::Static(Json::Bool(value)));
        Ok(true)
    }

    fn parse_one_of(
        &self,
        alternatives: &[Argument],
        bit: &str,
        tagname: &str,
        kwargs: &mut Kwargs,
    ) -> Result<bool, ParseError> {
        if let Some(chosen) = alternatives.iter().find(|a| a.is_satisfied(kwargs)) {
            return chosen.parse(bit, tagname, kwargs);
        }

        // A failing alternative only rules itself out.
        for alternative in alternatives {
            let mut trial = kwargs.clone();
            if let Ok(true) = alternative.parse(bit, tagname, &mut trial) {
                self.check_excluded(bit, tagname)?;
                *kwargs = trial;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_excluded(&self, bit: &str, tagname: &str) -> Result<(), ParseError> {
        let excluded = match &self.kind {
            ArgumentKind::Flag(flag) => flag.contains(&self.exclude, bit),
            _ => self.exclude.iter().any(|e| e == bit),
        };
        if excluded {
            return Err(ParseError::InvalidArgument {
                tagname: tagname.to_owned(),
                argname: self.name.clone(),
                token: bit.to_owned(),
            });
        }
        Ok(())
    }

    /// Wrap one bit into a value. Quoted bits are always constants.
    fn capture(&self, kind: ValueKind, bit: &str) -> Value {
        if let Some(inner) = strip_quotes(bit) {
            Value::constant(kind, inner)
        } else if self.resolve {
            Value::variable(kind, bit)
        } else {
            Value::constant(kind, bit)
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
