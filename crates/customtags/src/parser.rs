//! Tag invocation parser.
//!
//! Walks the bits of a tag invocation against a [`StructuredOptions`] cursor:
//!
//! - A bit equal to the next breakpoint closes the current scope (checking
//!   its required arguments) and opens the following one.
//! - A bit equal to a later breakpoint closes every scope up to it.
//! - Any other bit is offered to the current scope's arguments in order.
//!
//! Breakpoint matches always take priority over argument content, so a
//! multi-value argument stops collecting at the next breakpoint keyword.
//! Quote a bit to pass a breakpoint keyword as content.
//!
//! After the last bit, every remaining scope is checked and optional
//! arguments receive their defaults. Blocks are captured separately by
//! [`parse_blocks`] through the host's [`BlockParser`].

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::argument::Argument;
use crate::error::ParseError;
use crate::options::{BlockSpec, StructuredOptions};
use crate::value::Kwargs;

/// Parser strategy turning bits into keyword arguments.
///
/// [`Parser`] is the default. Custom strategies can reuse [`ParseState`].
pub trait TagParser: Send + Sync + fmt::Debug {
    /// Parse `bits` (without the tag name) into keyword arguments.
    fn parse(
        &self,
        options: &mut StructuredOptions<'_>,
        tagname: &str,
        bits: &[String],
    ) -> Result<Kwargs, ParseError>;
}

/// The default breakpoint-driven parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser;

impl TagParser for Parser {
    fn parse(
        &self,
        options: &mut StructuredOptions<'_>,
        tagname: &str,
        bits: &[String],
    ) -> Result<Kwargs, ParseError> {
        let mut state = ParseState::new(options, tagname);
        for (position, bit) in bits.iter().enumerate() {
            state.todo = &bits[position..];
            state.handle_bit(bit)?;
        }
        state.todo = &[];
        state.finish()?;
        Ok(state.kwargs)
    }
}

/// Mutable state of one parse.
#[derive(Debug)]
pub struct ParseState<'s, 'a> {
    pub options: &'s mut StructuredOptions<'a>,
    pub tagname: &'s str,
    pub kwargs: Kwargs,
    /// Arguments of the current scope not yet offered a bit.
    pub arguments: VecDeque<&'a Argument>,
    pub current_argument: Option<&'a Argument>,
    /// Bits not yet handled, starting with the current one.
    pub todo: &'s [String],
}

impl<'s, 'a> ParseState<'s, 'a> {
    pub fn new(options: &'s mut StructuredOptions<'a>, tagname: &'s str) -> Self {
        let arguments = options.get_arguments().iter().collect();
        Self {
            options,
            tagname,
            kwargs: Kwargs::new(),
            arguments,
            current_argument: None,
            todo: &[],
        }
    }

    /// Route one bit to a breakpoint transition or to the arguments.
    pub fn handle_bit(&mut self, bit: &str) -> Result<(), ParseError> {
        if self.options.next_breakpoint() == Some(bit) {
            self.handle_next_breakpoint()
        } else if self.options.is_later_breakpoint(bit) {
            self.handle_breakpoints(bit)
        } else {
            self.handle_argument(bit)
        }
    }

    /// Close the current scope and open the next one.
    pub fn handle_next_breakpoint(&mut self) -> Result<(), ParseError> {
        self.check_required()?;
        self.options.shift_breakpoint();
        self.load_scope();
        tracing::debug!(
            tag = self.tagname,
            breakpoint = ?self.options.current_breakpoint(),
            "Entered breakpoint scope"
        );
        Ok(())
    }

    /// Close scopes until the one opened by `breakpoint` is current.
    pub fn handle_breakpoints(&mut self, breakpoint: &str) -> Result<(), ParseError> {
        while self.options.current_breakpoint() != Some(breakpoint)
            && self.options.next_breakpoint().is_some()
        {
            self.handle_next_breakpoint()?;
        }
        Ok(())
    }

    /// Offer a content bit to the current argument, then to the following ones.
    pub fn handle_argument(&mut self, bit: &str) -> Result<(), ParseError> {
        loop {
            let argument = match self.current_argument {
                Some(argument) => argument,
                None => {
                    let Some(argument) = self.arguments.pop_front() else {
                        return Err(self.unexpected_bit(bit));
                    };
                    self.current_argument = Some(argument);
                    argument
                }
            };
            if argument.parse(bit, self.tagname, &mut self.kwargs)? {
                return Ok(());
            }
            self.current_argument = None;
        }
    }

    /// Fill defaults for the current scope, failing on missing required arguments.
    pub fn check_required(&mut self) -> Result<(), ParseError> {
        for argument in self.options.get_arguments() {
            if argument.required && !argument.is_satisfied(&self.kwargs) {
                return Err(ParseError::ArgumentRequired {
                    tagname: self.tagname.to_owned(),
                    argument: argument.name.clone(),
                });
            }
            argument.fill_defaults(&mut self.kwargs);
        }
        Ok(())
    }

    /// Check the current scope and every scope after it.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        self.check_required()?;
        while self.options.next_breakpoint().is_some() {
            self.options.shift_breakpoint();
            self.load_scope();
            self.check_required()?;
        }
        Ok(())
    }

    fn load_scope(&mut self) {
        self.arguments = self.options.get_arguments().iter().collect();
        self.current_argument = None;
    }

    fn unexpected_bit(&self, bit: &str) -> ParseError {
        let breakpoints = self.options.remaining_breakpoints();
        if breakpoints.is_empty() {
            ParseError::TooManyArguments {
                tagname: self.tagname.to_owned(),
                extra: if self.todo.is_empty() {
                    vec![bit.to_owned()]
                } else {
                    self.todo.to_vec()
                },
            }
        } else {
            ParseError::BreakpointExpected {
                tagname: self.tagname.to_owned(),
                breakpoints: breakpoints.iter().map(|bp| (*bp).to_owned()).collect(),
                got: bit.to_owned(),
            }
        }
    }
}

/// Host primitive capturing template content up to an end tag.
pub trait BlockParser {
    type NodeList: Default;

    /// Capture content until one of `end_tags`, consuming the end tag.
    ///
    /// Returns the captured content and the end tag found, or `None` if the
    /// template ended first.
    fn parse_until(&mut self, end_tags: &[&str]) -> Option<(Self::NodeList, String)>;
}

/// Block host for tags that enclose no content.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBlocks;

impl BlockParser for NoBlocks {
    type NodeList = ();

    fn parse_until(&mut self, _end_tags: &[&str]) -> Option<((), String)> {
        None
    }
}

/// Result of parsing one tag invocation.
#[derive(Debug)]
pub struct ParsedTag<N> {
    pub kwargs: Kwargs,
    /// Captured block content by block name.
    pub blocks: HashMap<String, N>,
}

/// Capture the declared blocks from `host`.
///
/// Content before the first end tag found goes to the first pending block.
/// Pending blocks skipped over by that end tag, including its own block,
/// receive empty content.
pub fn parse_blocks<B: BlockParser>(
    tagname: &str,
    specs: &[BlockSpec],
    host: &mut B,
) -> Result<HashMap<String, B::NodeList>, ParseError> {
    let mut blocks = HashMap::new();
    let mut pending: VecDeque<&BlockSpec> = specs.iter().collect();

    while !pending.is_empty() {
        let end_tags: Vec<&str> = pending.iter().map(|s| s.identifier.as_str()).collect();
        let Some((mut nodelist, found)) = host.parse_until(&end_tags) else {
            return Err(ParseError::UnclosedBlock {
                tagname: tagname.to_owned(),
                expected: end_tags.iter().map(|t| (*t).to_owned()).collect(),
            });
        };
        tracing::debug!(tag = tagname, end_tag = %found, "Captured block");

        while let Some(spec) = pending.pop_front() {
            blocks.insert(spec.name().to_owned(), std::mem::take(&mut nodelist));
            if spec.identifier == found {
                break;
            }
        }
    }

    Ok(blocks)
}
