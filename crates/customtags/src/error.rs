//! Error types for tag definition, parsing and rendering.

/// Structural error raised while parsing a tag invocation.
///
/// These are always fatal, regardless of [`ErrorMode`](crate::ErrorMode).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A required argument was not supplied before its scope closed.
    #[error("The tag '{tagname}' requires the '{argument}' argument.")]
    ArgumentRequired {
        /// Tag being parsed.
        tagname: String,
        /// Name of the missing argument.
        argument: String,
    },
    /// A flag token matched neither its true nor its false values.
    #[error(
        "The flag '{argname}' for the tag '{tagname}' must be one of {}, not '{actual}'.",
        format_list(.allowed)
    )]
    InvalidFlag {
        /// Tag being parsed.
        tagname: String,
        /// Name of the flag argument.
        argname: String,
        /// Token that was given.
        actual: String,
        /// Accepted values, true values first.
        allowed: Vec<String>,
    },
    /// A token listed in an argument's exclusions was given for it.
    #[error("The argument '{argname}' of the tag '{tagname}' does not accept '{token}'.")]
    InvalidArgument {
        /// Tag being parsed.
        tagname: String,
        /// Name of the argument.
        argname: String,
        /// Token that was given.
        token: String,
    },
    /// A keyword was given twice to the same keyword argument.
    #[error("The keyword '{keyword}' is already in use in the tag '{tagname}'.")]
    KeywordInUse {
        /// Tag being parsed.
        tagname: String,
        /// The repeated keyword.
        keyword: String,
    },
    /// A content token appeared where only a breakpoint is accepted.
    #[error(
        "Expected one of the following breakpoints: {} in {tagname}, got '{got}' instead.",
        format_list(.breakpoints)
    )]
    BreakpointExpected {
        /// Tag being parsed.
        tagname: String,
        /// Breakpoints that would have been accepted.
        breakpoints: Vec<String>,
        /// Token that was given.
        got: String,
    },
    /// Tokens remained after every argument was satisfied.
    #[error("The tag '{tagname}' got too many arguments: {}", format_list(.extra))]
    TooManyArguments {
        /// Tag being parsed.
        tagname: String,
        /// The surplus tokens.
        extra: Vec<String>,
    },
    /// The template ended before a declared block was closed.
    #[error("Unclosed tag '{tagname}'. Looking for one of: {}", format_list(.expected))]
    UnclosedBlock {
        /// Tag being parsed.
        tagname: String,
        /// End markers still pending.
        expected: Vec<String>,
    },
}

/// Tag definition error, raised when building [`Options`](crate::Options).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("Flag '{0}' must define at least one of true_values or false_values")]
    FlagWithoutValues(String),
    #[error("Argument '{0}' is defined more than once")]
    DuplicateArgument(String),
    #[error("Argument '{0}' has max_values set to 0")]
    ZeroMaxValues(String),
    #[error("One-of group '{0}' has no alternatives")]
    EmptyOneOf(String),
    #[error("Block identifier '{0}' is defined more than once")]
    DuplicateBlock(String),
    #[error("Tag '{0}' must end with an 'as' breakpoint followed by one argument")]
    MissingAsBreakpoint(String),
    #[error("The 'as' argument of tag '{0}' must not resolve")]
    ResolvingVarname(String),
}

/// A value failed its validation while resolving in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("{message}")]
    Invalid {
        /// Error category, e.g. `clean`.
        category: &'static str,
        /// Rendered message including the offending value.
        message: String,
    },
}

/// Error raised while rendering a compiled tag.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("Tag '{tagname}' failed to render: {message}")]
    Tag {
        /// Tag being rendered.
        tagname: String,
        /// What went wrong.
        message: String,
    },
}

fn format_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("'{item}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invalid_flag_lists_allowed_values() {
        let err = ParseError::InvalidFlag {
            tagname: "my_tag".to_owned(),
            argname: "safe".to_owned(),
            actual: "maybe".to_owned(),
            allowed: vec!["on".to_owned(), "off".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "The flag 'safe' for the tag 'my_tag' must be one of 'on', 'off', not 'maybe'."
        );
    }

    #[test]
    fn test_breakpoint_expected_message() {
        let err = ParseError::BreakpointExpected {
            tagname: "my_tag".to_owned(),
            breakpoints: vec!["as".to_owned(), "using".to_owned()],
            got: "myname".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Expected one of the following breakpoints: 'as', 'using' in my_tag, got 'myname' instead."
        );
    }

    #[test]
    fn test_render_error_wraps_value_error() {
        let err: RenderError = ValueError::Invalid {
            category: "clean",
            message: "abc could not be converted to Integer".to_owned(),
        }
        .into();
        assert_eq!(err.to_string(), "abc could not be converted to Integer");
    }
}
