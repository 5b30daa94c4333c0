//! Tag grammar definition.
//!
//! [`Options`] describes a tag's grammar: arguments grouped into scopes by
//! breakpoint keywords, the blocks the tag encloses, and the parser strategy.
//! It is built once per tag and shared by every invocation. Each parse works
//! on its own [`StructuredOptions`] cursor.
//!
//! # Example
//!
//! ```
//! use customtags::{Argument, Options};
//!
//! // {% ct_for item in items %}...{% empty %}...{% endfor %}
//! let options = Options::builder()
//!     .argument(Argument::multi("loopvars").no_resolve().comma_separated())
//!     .breakpoint("in")
//!     .argument(Argument::new("values"))
//!     .block_with_alias("empty", "pre_empty")
//!     .block_with_alias("endfor", "post_empty")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(options.breakpoints().collect::<Vec<_>>(), vec!["in"]);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::argument::Argument;
use crate::error::{OptionsError, ParseError};
use crate::parser::{BlockParser, ParsedTag, Parser, TagParser, parse_blocks};

/// Arguments accepted after one breakpoint, or before the first one.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Keyword opening this scope. `None` for the leading scope.
    pub breakpoint: Option<String>,
    pub arguments: Vec<Argument>,
}

/// A block enclosed by the tag, ended by `identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub identifier: String,
    pub alias: Option<String>,
}

impl BlockSpec {
    /// Key under which the captured content is stored.
    #[must_use]
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.identifier)
    }
}

/// Immutable grammar of a tag.
#[derive(Debug, Clone)]
pub struct Options {
    scopes: Vec<Scope>,
    blocks: Vec<BlockSpec>,
    parser: Arc<dyn TagParser>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::default()],
            blocks: Vec::new(),
            parser: Arc::new(Parser),
        }
    }
}

impl Options {
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Start a fresh parse cursor over this grammar.
    #[must_use]
    pub fn build(&self) -> StructuredOptions<'_> {
        StructuredOptions::new(&self.scopes, &self.blocks)
    }

    /// The parser strategy used for this tag.
    #[must_use]
    pub fn parser(&self) -> &dyn TagParser {
        self.parser.as_ref()
    }

    #[must_use]
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    #[must_use]
    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().filter_map(|s| s.breakpoint.as_deref())
    }

    /// All arguments in declaration order.
    pub fn all_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.scopes.iter().flat_map(|s| &s.arguments)
    }

    /// Parse a tag invocation, then capture its blocks from `host`.
    ///
    /// `bits` excludes the tag name.
    pub fn parse<B: BlockParser>(
        &self,
        tagname: &str,
        bits: &[String],
        host: &mut B,
    ) -> Result<ParsedTag<B::NodeList>, ParseError> {
        let mut structured = self.build();
        let kwargs = self.parser.parse(&mut structured, tagname, bits)?;
        let blocks = parse_blocks(tagname, structured.blocks(), host)?;
        Ok(ParsedTag { kwargs, blocks })
    }
}

/// Builder for [`Options`].
///
/// Arguments are added to the scope opened by the most recent
/// [`breakpoint`](Self::breakpoint) call.
#[derive(Debug)]
pub struct OptionsBuilder {
    scopes: Vec<Scope>,
    blocks: Vec<BlockSpec>,
    parser: Option<Arc<dyn TagParser>>,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            blocks: Vec::new(),
            parser: None,
        }
    }

    #[must_use]
    pub fn argument(mut self, argument: Argument) -> Self {
        if let Some(scope) = self.scopes.last_mut() {
            scope.arguments.push(argument);
        }
        self
    }

    #[must_use]
    pub fn breakpoint(mut self, keyword: impl Into<String>) -> Self {
        self.scopes.push(Scope {
            breakpoint: Some(keyword.into()),
            arguments: Vec::new(),
        });
        self
    }

    /// Enclose a block ended by `identifier`, stored under the same name.
    #[must_use]
    pub fn block(mut self, identifier: impl Into<String>) -> Self {
        self.blocks.push(BlockSpec {
            identifier: identifier.into(),
            alias: None,
        });
        self
    }

    /// Enclose a block ended by `identifier`, stored under `alias`.
    #[must_use]
    pub fn block_with_alias(
        mut self,
        identifier: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.blocks.push(BlockSpec {
            identifier: identifier.into(),
            alias: Some(alias.into()),
        });
        self
    }

    /// Use a custom parser strategy instead of [`Parser`].
    #[must_use]
    pub fn parser(mut self, parser: impl TagParser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Validate the definition.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] for invalid arguments, repeated argument
    /// names or repeated block identifiers.
    pub fn build(self) -> Result<Options, OptionsError> {
        let mut names = HashSet::new();
        for argument in self.scopes.iter().flat_map(|s| &s.arguments) {
            argument.validate()?;
            for name in argument.stored_names() {
                if !names.insert(name) {
                    return Err(OptionsError::DuplicateArgument(name.to_owned()));
                }
            }
        }

        let mut identifiers = HashSet::new();
        for block in &self.blocks {
            if !identifiers.insert(block.identifier.as_str()) {
                return Err(OptionsError::DuplicateBlock(block.identifier.clone()));
            }
        }

        Ok(Options {
            scopes: self.scopes,
            blocks: self.blocks,
            parser: self.parser.unwrap_or_else(|| Arc::new(Parser)),
        })
    }
}

/// Per-parse cursor over an [`Options`] grammar.
///
/// Owns its own copy of the breakpoint and block sequences, so concurrent
/// parses of the same tag never share state. The cursor only moves forward.
#[derive(Debug, Clone)]
pub struct StructuredOptions<'a> {
    scopes: &'a [Scope],
    breakpoints: Vec<&'a str>,
    blocks: Vec<BlockSpec>,
    current: usize,
}

impl<'a> StructuredOptions<'a> {
    #[must_use]
    pub fn new(scopes: &'a [Scope], blocks: &[BlockSpec]) -> Self {
        Self {
            scopes,
            breakpoints: scopes
                .iter()
                .filter_map(|s| s.breakpoint.as_deref())
                .collect(),
            blocks: blocks.to_vec(),
            current: 0,
        }
    }

    /// Arguments of the current scope only.
    #[must_use]
    pub fn get_arguments(&self) -> &'a [Argument] {
        self.scopes
            .get(self.current)
            .map(|scope| scope.arguments.as_slice())
            .unwrap_or_default()
    }

    /// Move into the next scope. No-op after the last breakpoint.
    pub fn shift_breakpoint(&mut self) {
        if self.current < self.breakpoints.len() {
            self.current += 1;
        }
    }

    /// Index of the current scope, `0` before any breakpoint.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Breakpoint that opened the current scope.
    #[must_use]
    pub fn current_breakpoint(&self) -> Option<&'a str> {
        self.current
            .checked_sub(1)
            .and_then(|i| self.breakpoints.get(i).copied())
    }

    /// Breakpoint that would open the following scope.
    #[must_use]
    pub fn next_breakpoint(&self) -> Option<&'a str> {
        self.breakpoints.get(self.current).copied()
    }

    /// Breakpoints still ahead, starting with the next one.
    #[must_use]
    pub fn remaining_breakpoints(&self) -> &[&'a str] {
        self.breakpoints.get(self.current..).unwrap_or(&[])
    }

    /// Whether `bit` is a breakpoint beyond the next one.
    #[must_use]
    pub fn is_later_breakpoint(&self, bit: &str) -> bool {
        self.remaining_breakpoints()
            .iter()
            .skip(1)
            .any(|bp| *bp == bit)
    }

    #[must_use]
    pub fn blocks(&self) -> &[BlockSpec] {
        &self.blocks
    }
}
