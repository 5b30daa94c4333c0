//! Tags wiring parsed arguments into a render step.
//!
//! Implement [`Tag`] to define a tag: its [`Options`] describe the grammar,
//! and [`Tag::render_tag`] receives the resolved arguments and captured
//! blocks. [`TagNode`] is one compiled invocation of a tag.
//!
//! `N` is the host's captured block content type (see
//! [`BlockParser::NodeList`]); tags without blocks use `()`.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::context::Context;
use crate::error::{OptionsError, ParseError, RenderError};
use crate::options::{Options, Scope};
use crate::parser::BlockParser;
use crate::util::{camel_case_to_snake_case, render_value};
use crate::value::{Arguments, ErrorMode, Kwargs, resolve_all};

/// A custom template tag.
pub trait Tag<N = ()> {
    /// Registered tag name. Defaults to the snake-cased type name.
    fn name(&self) -> String {
        default_name::<Self>()
    }

    fn options(&self) -> &Options;

    /// Render with resolved `arguments` and captured `blocks`.
    fn render_tag(
        &self,
        context: &mut dyn Context,
        arguments: &Arguments,
        blocks: &HashMap<String, N>,
    ) -> Result<String, RenderError>;
}

/// Snake-cased name of a type without its module path or generics.
///
/// ```
/// struct CtFor;
/// assert_eq!(customtags::default_name::<CtFor>(), "ct_for");
/// ```
#[must_use]
pub fn default_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let last = base.rsplit("::").next().unwrap_or(base);
    camel_case_to_snake_case(last)
}

/// A compiled tag invocation.
#[derive(Debug)]
pub struct TagNode<T, N = ()> {
    tag: T,
    tagname: String,
    kwargs: Kwargs,
    blocks: HashMap<String, N>,
}

impl<T: Tag<N>, N> TagNode<T, N> {
    /// Compile a tag invocation.
    ///
    /// `contents` are the split tag contents with the tag name first. Blocks
    /// declared by the tag are captured from `host`.
    pub fn compile<B>(tag: T, contents: &[String], host: &mut B) -> Result<Self, ParseError>
    where
        B: BlockParser<NodeList = N>,
    {
        let (tagname, bits) = match contents.split_first() {
            Some((name, bits)) => (name.clone(), bits),
            None => (tag.name(), contents),
        };
        tracing::debug!(tag = %tagname, bits = bits.len(), "Compiling tag");

        let parsed = tag.options().parse(&tagname, bits, host)?;
        Ok(Self {
            tag,
            tagname,
            kwargs: parsed.kwargs,
            blocks: parsed.blocks,
        })
    }

    /// Resolve the arguments against `context` and render.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Value`] when a value fails validation in
    /// [`ErrorMode::Strict`], or whatever the tag's render step returns.
    pub fn render(
        &self,
        context: &mut dyn Context,
        mode: ErrorMode,
    ) -> Result<String, RenderError> {
        let arguments = resolve_all(&self.kwargs, &*context, mode)?;
        self.tag.render_tag(context, &arguments, &self.blocks)
    }

    #[must_use]
    pub fn tag(&self) -> &T {
        &self.tag
    }

    #[must_use]
    pub fn tagname(&self) -> &str {
        &self.tagname
    }

    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    #[must_use]
    pub fn blocks(&self) -> &HashMap<String, N> {
        &self.blocks
    }
}

/// A tag computing one value, rendered inline or stored with `as varname`.
///
/// The options must end with an `as` breakpoint followed by a single
/// non-resolving argument, usually optional:
///
/// ```
/// use customtags::{Argument, AsTag, Options};
/// use serde_json::json;
///
/// let options = Options::builder()
///     .argument(Argument::new("name").default("world"))
///     .breakpoint("as")
///     .argument(Argument::new("varname").optional().no_resolve())
///     .build()
///     .unwrap();
/// let hello = AsTag::new("hello", options, |_ctx, args| {
///     let name = args.get("name").and_then(|n| n.as_str()).unwrap_or_default();
///     Ok(json!(format!("hello {name}")))
/// })
/// .unwrap();
/// assert_eq!(hello.varname(), "varname");
/// ```
pub struct AsTag<F> {
    name: String,
    options: Options,
    varname: String,
    getter: F,
}

impl<F> std::fmt::Debug for AsTag<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsTag")
            .field("name", &self.name)
            .field("varname", &self.varname)
            .finish_non_exhaustive()
    }
}

impl<F> AsTag<F>
where
    F: Fn(&mut dyn Context, &Arguments) -> Result<Json, RenderError>,
{
    /// # Errors
    ///
    /// Returns [`OptionsError`] if `options` do not end with `as <varname>`
    /// or the varname argument resolves against the context.
    pub fn new(name: impl Into<String>, options: Options, getter: F) -> Result<Self, OptionsError> {
        let name = name.into();
        let varname = match options.scopes().last() {
            Some(Scope {
                breakpoint: Some(breakpoint),
                arguments,
            }) if breakpoint == "as" && arguments.len() == 1 => &arguments[0],
            _ => return Err(OptionsError::MissingAsBreakpoint(name)),
        };
        if varname.resolve {
            return Err(OptionsError::ResolvingVarname(name));
        }
        let varname = varname.name.clone();

        Ok(Self {
            name,
            options,
            varname,
            getter,
        })
    }

    /// Name of the argument holding the target variable.
    #[must_use]
    pub fn varname(&self) -> &str {
        &self.varname
    }
}

impl<F, N> Tag<N> for AsTag<F>
where
    F: Fn(&mut dyn Context, &Arguments) -> Result<Json, RenderError>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn render_tag(
        &self,
        context: &mut dyn Context,
        arguments: &Arguments,
        _blocks: &HashMap<String, N>,
    ) -> Result<String, RenderError> {
        let mut arguments = arguments.clone();
        let target = arguments.remove(&self.varname);
        let value = (self.getter)(context, &arguments)?;

        match target {
            Some(Json::String(var)) if !var.is_empty() => {
                context.set(&var, value);
                Ok(String::new())
            }
            _ => Ok(render_value(&value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::Argument;
    use crate::context::ContextStack;
    use crate::parser::NoBlocks;
    use crate::testing::{NodeList, TemplateHost, bits, object, render_nodes};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    fn render_source<T: Tag<NodeList>>(
        tag: T,
        source: &str,
        context: Json,
    ) -> Result<String, RenderError> {
        let mut host = TemplateHost::new(source);
        let contents = host.next_tag().unwrap();
        let node = TagNode::compile(tag, &contents, &mut host).unwrap();
        node.render(&mut ContextStack::new(object(context)), ErrorMode::Strict)
    }

    fn hello() -> AsTag<impl Fn(&mut dyn Context, &Arguments) -> Result<Json, RenderError>> {
        let options = Options::builder()
            .argument(Argument::new("name").default("world"))
            .breakpoint("as")
            .argument(Argument::new("varname").optional().no_resolve())
            .build()
            .unwrap();
        AsTag::new("hello", options, |_ctx, args| {
            let name = render_value(args.get("name").unwrap_or(&Json::Null));
            Ok(json!(format!("hello {name}")))
        })
        .unwrap()
    }

    #[test]
    fn test_hello_renders_inline() {
        let mut context = Map::new();
        let node = TagNode::compile(hello(), &bits("hello"), &mut NoBlocks).unwrap();
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "hello world");

        let node = TagNode::compile(hello(), &bits("hello 'ada'"), &mut NoBlocks).unwrap();
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "hello ada");
    }

    #[test]
    fn test_hello_resolves_context_variable() {
        let mut context = object(json!({"user": {"name": "grace"}}));
        let node = TagNode::compile(hello(), &bits("hello user.name"), &mut NoBlocks).unwrap();
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "hello grace");
    }

    #[test]
    fn test_hello_stores_into_context() {
        let mut context = Map::new();
        let node =
            TagNode::compile(hello(), &bits("hello 'ada' as greeting"), &mut NoBlocks).unwrap();
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "");
        assert_eq!(context.resolve_variable("greeting"), Some(json!("hello ada")));

        let node = TagNode::compile(hello(), &bits("hello as greeting2"), &mut NoBlocks).unwrap();
        node.render(&mut context, ErrorMode::Strict).unwrap();
        assert_eq!(context.resolve_variable("greeting2"), Some(json!("hello world")));
    }

    #[test]
    fn test_as_tag_requires_as_breakpoint() {
        let options = Options::builder()
            .argument(Argument::new("x"))
            .build()
            .unwrap();
        let err = AsTag::new("bad", options, |_: &mut dyn Context, _: &Arguments| Ok(Json::Null))
            .unwrap_err();
        assert_eq!(err, OptionsError::MissingAsBreakpoint("bad".to_owned()));

        let options = Options::builder()
            .breakpoint("as")
            .argument(Argument::new("varname"))
            .build()
            .unwrap();
        let err = AsTag::new("bad", options, |_: &mut dyn Context, _: &Arguments| Ok(Json::Null))
            .unwrap_err();
        assert_eq!(err, OptionsError::ResolvingVarname("bad".to_owned()));
    }

    #[derive(Debug)]
    struct Blocky {
        options: Options,
    }

    impl Blocky {
        fn new() -> Self {
            let options = Options::builder()
                .block("a")
                .block("b")
                .block("c")
                .block("d")
                .block("e")
                .build()
                .unwrap();
            Self { options }
        }
    }

    impl Tag<NodeList> for Blocky {
        fn options(&self) -> &Options {
            &self.options
        }

        fn render_tag(
            &self,
            context: &mut dyn Context,
            _arguments: &Arguments,
            blocks: &HashMap<String, NodeList>,
        ) -> Result<String, RenderError> {
            Ok(["a", "b", "c", "d", "e"]
                .iter()
                .map(|name| {
                    blocks
                        .get(*name)
                        .map(|nodes| render_nodes(nodes, &*context))
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
                .join(";"))
        }
    }

    #[test]
    fn test_default_tag_name() {
        assert_eq!(Tag::<NodeList>::name(&Blocky::new()), "blocky");
        assert_eq!(default_name::<TagNode<Blocky, NodeList>>(), "tag_node");
    }

    #[test]
    fn test_blocky() {
        let cases = [
            ("{% blocky %}1{% a %}2{% b %}3{% c %}4{% d %}5{% e %}", "1;2;3;4;5"),
            ("{% blocky %}12{% b %}3{% c %}4{% d %}5{% e %}", "12;;3;4;5"),
            ("{% blocky %}1{% a %}23{% c %}4{% d %}5{% e %}", "1;23;;4;5"),
        ];
        for (source, expected) in cases {
            assert_eq!(render_source(Blocky::new(), source, json!({})).unwrap(), expected);
        }
    }

    /// `{% ct_for a, b in pairs %}...{% empty %}...{% endfor %}`
    #[derive(Debug)]
    struct CtFor {
        options: Options,
    }

    impl CtFor {
        fn new() -> Self {
            let options = Options::builder()
                .argument(Argument::multi("loopvars").no_resolve().comma_separated())
                .breakpoint("in")
                .argument(Argument::new("values"))
                .block_with_alias("empty", "pre_empty")
                .block_with_alias("endfor", "post_empty")
                .build()
                .unwrap();
            Self { options }
        }
    }

    impl Tag<NodeList> for CtFor {
        fn options(&self) -> &Options {
            &self.options
        }

        fn render_tag(
            &self,
            context: &mut dyn Context,
            arguments: &Arguments,
            blocks: &HashMap<String, NodeList>,
        ) -> Result<String, RenderError> {
            let loopvars: Vec<&str> = arguments["loopvars"]
                .as_array()
                .map(|vars| vars.iter().filter_map(Json::as_str).collect())
                .unwrap_or_default();
            let values = arguments["values"].as_array().cloned().unwrap_or_default();

            if values.is_empty() {
                return Ok(render_nodes(&blocks["post_empty"], &*context));
            }

            let mut output = String::new();
            for item in values {
                context.push();
                if let [var] = loopvars.as_slice() {
                    context.set(var, item);
                } else {
                    let parts = item.as_array().cloned().unwrap_or_default();
                    for (var, part) in loopvars.iter().zip(parts) {
                        context.set(var, part);
                    }
                }
                output.push_str(&render_nodes(&blocks["pre_empty"], &*context));
                context.pop();
            }
            Ok(output)
        }
    }

    #[test]
    fn test_ct_for_single_loopvar() {
        let output = render_source(
            CtFor::new(),
            "{% ct_for x in items %}[{{ x }}]{% endfor %}",
            json!({"items": [1, 2, 3]}),
        )
        .unwrap();
        assert_eq!(output, "[1][2][3]");
    }

    #[test]
    fn test_ct_for_unpacks_comma_separated_loopvars() {
        let sources = [
            "{% ct_for a,b in pairs %}{{ a }}={{ b }} {% empty %}none{% endfor %}",
            "{% ct_for a, b in pairs %}{{ a }}={{ b }} {% empty %}none{% endfor %}",
            "{% ct_for a b in pairs %}{{ a }}={{ b }} {% empty %}none{% endfor %}",
        ];
        for source in sources {
            let context = json!({"pairs": [["x", 1], ["y", 2]]});
            let output = render_source(CtFor::new(), source, context).unwrap();
            assert_eq!(output, "x=1 y=2 ", "source: {source}");
        }
    }

    #[test]
    fn test_ct_for_empty_branch() {
        let output = render_source(
            CtFor::new(),
            "{% ct_for x in items %}{{ x }}{% empty %}nothing{% endfor %}",
            json!({"items": []}),
        )
        .unwrap();
        assert_eq!(output, "nothing");
    }

    #[test]
    fn test_ct_for_loopvar_does_not_leak() {
        let mut host = TemplateHost::new("{% ct_for x in items %}{{ x }}{% endfor %}");
        let contents = host.next_tag().unwrap();
        let node = TagNode::compile(CtFor::new(), &contents, &mut host).unwrap();
        let mut context = ContextStack::new(object(json!({"items": ["a"], "x": "outer"})));

        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "a");
        assert_eq!(context.resolve_variable("x"), Some(json!("outer")));
    }

    #[test]
    fn test_ct_for_unclosed() {
        let mut host = TemplateHost::new("{% ct_for x in items %}{{ x }}");
        let contents = host.next_tag().unwrap();
        let err = TagNode::compile(CtFor::new(), &contents, &mut host).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnclosedBlock {
                tagname: "ct_for".to_owned(),
                expected: vec!["empty".to_owned(), "endfor".to_owned()],
            }
        );
    }

    /// `{% ct_with value as name %}...{% endwith %}`
    #[derive(Debug)]
    struct CtWith {
        options: Options,
    }

    impl Tag<NodeList> for CtWith {
        fn options(&self) -> &Options {
            &self.options
        }

        fn render_tag(
            &self,
            context: &mut dyn Context,
            arguments: &Arguments,
            blocks: &HashMap<String, NodeList>,
        ) -> Result<String, RenderError> {
            let varname = arguments["varname"].as_str().unwrap_or_default();
            context.push();
            context.set(varname, arguments["variable"].clone());
            let output = render_nodes(&blocks["endwith"], &*context);
            context.pop();
            Ok(output)
        }
    }

    #[test]
    fn test_ct_with() {
        let tag = CtWith {
            options: Options::builder()
                .argument(Argument::new("variable"))
                .breakpoint("as")
                .argument(Argument::new("varname").no_resolve())
                .block("endwith")
                .build()
                .unwrap(),
        };
        let output = render_source(
            tag,
            "{% ct_with user.name as who %}hi {{ who }}{% endwith %}",
            json!({"user": {"name": "ada"}}),
        )
        .unwrap();
        assert_eq!(output, "hi ada");
    }

    /// `{% ct_firstof a b c %}`: the first truthy value.
    #[derive(Debug)]
    struct CtFirstof {
        options: Options,
    }

    impl Tag for CtFirstof {
        fn options(&self) -> &Options {
            &self.options
        }

        fn render_tag(
            &self,
            _context: &mut dyn Context,
            arguments: &Arguments,
            _blocks: &HashMap<String, ()>,
        ) -> Result<String, RenderError> {
            let first = arguments["args"]
                .as_array()
                .and_then(|args| args.iter().find(|v| is_truthy(v)))
                .map(render_value)
                .unwrap_or_default();
            Ok(first)
        }
    }

    fn is_truthy(value: &Json) -> bool {
        match value {
            Json::Null => false,
            Json::Bool(b) => *b,
            Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Json::String(s) => !s.is_empty(),
            Json::Array(items) => !items.is_empty(),
            Json::Object(map) => !map.is_empty(),
        }
    }

    #[test]
    fn test_ct_firstof() {
        let tag = CtFirstof {
            options: Options::builder()
                .argument(Argument::multi("args"))
                .build()
                .unwrap(),
        };
        let contents = bits("ct_firstof empty zero name 'fallback'");
        let node = TagNode::compile(tag, &contents, &mut NoBlocks).unwrap();
        let mut context = object(json!({"empty": "", "zero": 0, "name": "ada"}));
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "ada");

        let mut context = Map::new();
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "fallback");
    }

    /// `{% repeat text times %}` with an integer count.
    #[derive(Debug)]
    struct Repeat {
        options: Options,
    }

    impl Tag for Repeat {
        fn options(&self) -> &Options {
            &self.options
        }

        fn render_tag(
            &self,
            _context: &mut dyn Context,
            arguments: &Arguments,
            _blocks: &HashMap<String, ()>,
        ) -> Result<String, RenderError> {
            let text = render_value(&arguments["text"]);
            let Some(times) = arguments["times"].as_u64() else {
                return Err(RenderError::Tag {
                    tagname: "repeat".to_owned(),
                    message: format!("invalid count {}", arguments["times"]),
                });
            };
            Ok(text.repeat(usize::try_from(times).unwrap_or_default()))
        }
    }

    fn repeat_node(input: &str) -> TagNode<Repeat> {
        let tag = Repeat {
            options: Options::builder()
                .argument(Argument::new("text"))
                .argument(Argument::integer("times").default(1))
                .build()
                .unwrap(),
        };
        TagNode::compile(tag, &bits(input), &mut NoBlocks).unwrap()
    }

    #[test]
    fn test_integer_argument_from_context() {
        let node = repeat_node("repeat 'ab' n");
        let mut context = object(json!({"n": "3"}));
        assert_eq!(node.render(&mut context, ErrorMode::Strict).unwrap(), "ababab");
        assert_eq!(node.tagname(), "repeat");
        assert_eq!(node.kwargs().len(), 2);
    }

    #[test]
    fn test_invalid_integer_strict_and_lenient() {
        let node = repeat_node("repeat 'ab' n");
        let mut context = object(json!({"n": "abc"}));

        let err = node.render(&mut context, ErrorMode::Strict).unwrap_err();
        assert!(matches!(err, RenderError::Value(_)));
        assert_eq!(err.to_string(), r#""abc" could not be converted to Integer"#);

        // Lenient mode renders the fallback, which this tag rejects.
        let err = node.render(&mut context, ErrorMode::Lenient).unwrap_err();
        assert_eq!(err.to_string(), r#"Tag 'repeat' failed to render: invalid count """#);
    }
}
