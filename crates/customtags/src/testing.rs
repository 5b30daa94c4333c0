//! Minimal template host for tests.
//!
//! Understands `{% tag bits %}` and `{{ variable }}` markers, captures blocks
//! through [`BlockParser`] and renders captured nodes against a context.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::context::Context;
use crate::parser::BlockParser;
use crate::util::{render_value, split_contents};
use crate::value::{ErrorMode, Kwargs, resolve_all};

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*(.*?)\s*%\}|\{\{\s*(.*?)\s*\}\}").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Var(String),
    /// A nested tag the host does not compile; renders as nothing.
    Tag(Vec<String>),
}

pub(crate) type NodeList = Vec<Node>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Var(String),
    Tag(Vec<String>),
}

#[derive(Debug)]
pub(crate) struct TemplateHost {
    tokens: VecDeque<Token>,
}

impl TemplateHost {
    pub(crate) fn new(source: &str) -> Self {
        let mut tokens = VecDeque::new();
        let mut last = 0;
        for caps in MARKER_RE.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                tokens.push_back(Token::Text(source[last..whole.start()].to_owned()));
            }
            if let Some(tag) = caps.get(1) {
                tokens.push_back(Token::Tag(split_contents(tag.as_str())));
            } else if let Some(var) = caps.get(2) {
                tokens.push_back(Token::Var(var.as_str().to_owned()));
            }
            last = whole.end();
        }
        if last < source.len() {
            tokens.push_back(Token::Text(source[last..].to_owned()));
        }
        Self { tokens }
    }

    /// Pop tokens up to and including the next tag, returning its bits.
    pub(crate) fn next_tag(&mut self) -> Option<Vec<String>> {
        while let Some(token) = self.tokens.pop_front() {
            if let Token::Tag(bits) = token {
                return Some(bits);
            }
        }
        None
    }
}

impl BlockParser for TemplateHost {
    type NodeList = NodeList;

    fn parse_until(&mut self, end_tags: &[&str]) -> Option<(NodeList, String)> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.pop_front() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Var(path) => nodes.push(Node::Var(path)),
                Token::Tag(bits) => match bits.first() {
                    Some(name) if end_tags.contains(&name.as_str()) => {
                        return Some((nodes, name.clone()));
                    }
                    _ => nodes.push(Node::Tag(bits)),
                },
            }
        }
        None
    }
}

pub(crate) fn render_nodes(nodes: &[Node], context: &dyn Context) -> String {
    nodes
        .iter()
        .map(|node| match node {
            Node::Text(text) => text.clone(),
            Node::Var(path) => context
                .resolve_variable(path)
                .map(|value| render_value(&value))
                .unwrap_or_default(),
            Node::Tag(_) => String::new(),
        })
        .collect()
}

pub(crate) fn bits(input: &str) -> Vec<String> {
    split_contents(input)
}

pub(crate) fn object(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(crate) fn resolve(kwargs: &Kwargs, context: &Json, mode: ErrorMode) -> Json {
    let context = object(context.clone());
    Json::Object(resolve_all(kwargs, &context, mode).unwrap())
}

#[test]
fn test_template_host_lexes_markers() {
    let mut host = TemplateHost::new("a{{ x }}{% if y %}b{% end %}c");
    let (nodes, found) = host.parse_until(&["end"]).unwrap();
    assert_eq!(found, "end");
    assert_eq!(
        nodes,
        vec![
            Node::Text("a".to_owned()),
            Node::Var("x".to_owned()),
            Node::Tag(vec!["if".to_owned(), "y".to_owned()]),
            Node::Text("b".to_owned()),
        ]
    );
    assert!(host.parse_until(&["end"]).is_none());
}
