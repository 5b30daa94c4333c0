//! Declarative argument parsing for custom template tags.
//!
//! Instead of hand-writing a parser for every tag, describe its grammar with
//! [`Options`] and let the [`Parser`] turn the tag's bits into keyword
//! arguments.
//!
//! # Architecture
//!
//! - [`Argument`]: a named descriptor (single, integer, multi-value,
//!   keyword, flag or a one-of group) that consumes bits into [`Value`]s
//! - [`Options`]: arguments grouped into scopes by breakpoint keywords, plus
//!   the blocks the tag encloses
//! - [`Parser`]: the state machine walking bits against a per-parse
//!   [`StructuredOptions`] cursor
//! - [`Value`]: lazily resolved against a [`Context`] at render time, with
//!   validation failures handled per [`ErrorMode`]
//! - [`Tag`], [`TagNode`], [`AsTag`]: wiring parsed arguments into a render step
//!
//! The template host stays outside this crate. It provides variable lookup
//! through [`Context`] and block capture through [`BlockParser`].
//!
//! # Example
//!
//! ```
//! use customtags::{Argument, ErrorMode, NoBlocks, Options, resolve_all, split_contents};
//! use serde_json::{Map, json};
//!
//! // {% ct_cycle "odd" "even" as rowclass %}
//! let options = Options::builder()
//!     .argument(Argument::multi("values"))
//!     .breakpoint("as")
//!     .argument(Argument::new("varname").optional().no_resolve())
//!     .build()
//!     .unwrap();
//!
//! let bits = split_contents(r#""odd" "even" as rowclass"#);
//! let parsed = options.parse("ct_cycle", &bits, &mut NoBlocks).unwrap();
//! let arguments = resolve_all(&parsed.kwargs, &Map::new(), ErrorMode::Strict).unwrap();
//!
//! assert_eq!(arguments["values"], json!(["odd", "even"]));
//! assert_eq!(arguments["varname"], json!("rowclass"));
//! ```

mod argument;
mod context;
mod error;
mod options;
mod parser;
mod tag;
#[cfg(test)]
mod testing;
mod util;
mod value;
mod variable;

pub use argument::{Argument, ArgumentKind, FlagValues};
pub use context::{Context, ContextStack, lookup_path};
pub use error::{OptionsError, ParseError, RenderError, ValueError};
pub use options::{BlockSpec, Options, OptionsBuilder, Scope, StructuredOptions};
pub use parser::{BlockParser, NoBlocks, ParseState, ParsedTag, Parser, TagParser, parse_blocks};
pub use tag::{AsTag, Tag, TagNode, default_name};
pub use util::{camel_case_to_snake_case, render_value, split_contents, strip_quotes};
pub use value::{
    Arguments, DictValue, ErrorMode, Kwargs, ListValue, Reference, SequenceKind, Value, ValueKind,
    resolve_all,
};
pub use variable::Variable;
