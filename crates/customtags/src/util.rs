//! Token helpers shared by arguments, tags and template hosts.

use regex::Regex;
use serde_json::Value as Json;
use std::sync::LazyLock;

static CAMEL_FIRST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").unwrap());

static CAMEL_ALL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Whitespace-separated chunks, keeping quoted sections (with escapes) intact.
static SMART_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        (?:
            [^\s'"]*
            (?:
                (?:"(?:[^"\\]|\\.)*" | '(?:[^'\\]|\\.)*')
                [^\s'"]*
            )+
        )
        | \S+
        "#,
    )
    .unwrap()
});

/// Convert a `CamelCase` identifier into `snake_case`.
///
/// Used to derive a tag's registered name from its type name.
///
/// # Example
///
/// ```
/// use customtags::camel_case_to_snake_case;
///
/// assert_eq!(camel_case_to_snake_case("MyTag"), "my_tag");
/// assert_eq!(camel_case_to_snake_case("HTTPResponseTag"), "http_response_tag");
/// ```
#[must_use]
pub fn camel_case_to_snake_case(name: &str) -> String {
    let partial = CAMEL_FIRST_RE.replace_all(name, "${1}_${2}");
    CAMEL_ALL_RE
        .replace_all(&partial, "${1}_${2}")
        .to_lowercase()
}

/// Return the contents of a token wrapped in matching single or double quotes.
///
/// Returns `None` for unquoted tokens.
#[must_use]
pub fn strip_quotes(bit: &str) -> Option<&str> {
    let bytes = bit.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first == last && matches!(first, b'"' | b'\'') {
        Some(&bit[1..bit.len() - 1])
    } else {
        None
    }
}

/// Split tag contents into bits, keeping quoted strings together.
///
/// Translation markers like `_("two words")` are rejoined into a single bit.
///
/// # Example
///
/// ```
/// use customtags::split_contents;
///
/// assert_eq!(
///     split_contents(r#"hello "my friend" as greeting"#),
///     vec!["hello", r#""my friend""#, "as", "greeting"],
/// );
/// ```
#[must_use]
pub fn split_contents(contents: &str) -> Vec<String> {
    let mut split = Vec::new();
    let mut chunks = SMART_SPLIT_RE.find_iter(contents).map(|m| m.as_str());

    while let Some(chunk) = chunks.next() {
        let sentinel = match chunk.as_bytes() {
            [b'_', b'(', quote @ (b'"' | b'\''), ..] => format!("{})", char::from(*quote)),
            _ => {
                split.push(chunk.to_owned());
                continue;
            }
        };

        let mut joined = vec![chunk];
        let mut last = chunk;
        while !last.ends_with(&sentinel) {
            let Some(next) = chunks.next() else {
                break;
            };
            joined.push(next);
            last = next;
        }
        split.push(joined.join(" "));
    }

    split
}

/// Render a resolved value as template output.
///
/// Strings render without quotes and `null` renders as nothing.
#[must_use]
pub fn render_value(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
