//! A small, lossless XML tree over `quick-xml` events.
//!
//! Every start tag keeps its raw text so an untouched document serialises
//! back to the exact bytes it was read from. Attribute edits splice the new
//! value into the raw tag instead of re-rendering it.

use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use std::ops::Range;

const XMLNS: &str = "xmlns";
const DEFAULT_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, stored escaped.
    Text(String),
    Comment(String),
    CData(String),
    Declaration(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    /// Value as written between the quotes, still escaped.
    pub raw_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    raw_start: String,
    attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    self_closing: bool,
}

fn utf8(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)
        .context("XML content is not valid UTF-8")?
        .to_string())
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Byte range of `key`'s value inside a raw start tag (between the quotes).
fn attr_value_span(raw: &str, key: &str) -> Option<Range<usize>> {
    let bytes = raw.as_bytes();
    let mut i = bytes.iter().position(|b| b.is_ascii_whitespace())?;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let key_end = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return None;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = *bytes.get(i)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let value_start = i + 1;
        let value_end = value_start + bytes[value_start..].iter().position(|&b| b == quote)?;
        if &raw[key_start..key_end] == key {
            return Some(value_start..value_end);
        }
        i = value_end + 1;
    }
}

fn unescaped(raw: &str) -> String {
    match unescape(raw) {
        Ok(value) => value.into_owned(),
        // Keep unknown entities verbatim rather than failing the read.
        Err(_) => raw.to_string(),
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            raw_start: name.clone(),
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    fn from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Self> {
        let name = utf8(start.name().as_ref())?;
        let raw_start = utf8(start)?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.with_context(|| format!("malformed attribute on <{name}>"))?;
            attributes.push(Attribute {
                key: utf8(attr.key.as_ref())?,
                raw_value: utf8(&attr.value)?,
            });
        }
        Ok(Self {
            name,
            raw_start,
            attributes,
            children: Vec::new(),
            self_closing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn attr(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| unescaped(&attr.raw_value))
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match attr_value_span(&self.raw_start, key) {
            Some(span) => self.raw_start.replace_range(span, &escaped),
            None => {
                let trimmed = self.raw_start.trim_end().len();
                self.raw_start.truncate(trimmed);
                self.raw_start.push_str(&format!(" {key}=\"{escaped}\""));
            }
        }
        match self.attributes.iter_mut().find(|attr| attr.key == key) {
            Some(attr) => attr.raw_value = escaped,
            None => self.attributes.push(Attribute {
                key: key.to_string(),
                raw_value: escaped,
            }),
        }
    }

    /// Namespace declarations made on this element as `(prefix, uri)`; the
    /// default namespace has an empty prefix.
    pub fn namespace_declarations(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter_map(|attr| {
                if attr.key == XMLNS {
                    Some((String::new(), unescaped(&attr.raw_value)))
                } else {
                    attr.key
                        .strip_prefix("xmlns:")
                        .map(|prefix| (prefix.to_string(), unescaped(&attr.raw_value)))
                }
            })
            .collect()
    }

    /// Text before the first non-text child, like ElementTree's `.text`.
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut seen = false;
        for child in &self.children {
            match child {
                Node::Text(raw) => {
                    out.push_str(&unescaped(raw));
                    seen = true;
                }
                Node::CData(raw) => {
                    out.push_str(raw);
                    seen = true;
                }
                _ => break,
            }
        }
        seen.then_some(out)
    }

    pub fn set_text(&mut self, value: &str) {
        let leading = self
            .children
            .iter()
            .take_while(|child| matches!(child, Node::Text(_) | Node::CData(_)))
            .count();
        self.children.drain(..leading);
        self.children
            .insert(0, Node::Text(partial_escape(value).into_owned()));
    }

    /// Visit this element and every descendant element, parents first.
    pub fn for_each_element_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.for_each_element_mut(f);
            }
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.raw_start);
        if self.self_closing && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_to(out),
            Node::Text(raw) => out.push_str(raw),
            Node::Comment(raw) => {
                out.push_str("<!--");
                out.push_str(raw);
                out.push_str("-->");
            }
            Node::CData(raw) => {
                out.push_str("<![CDATA[");
                out.push_str(raw);
                out.push_str("]]>");
            }
            Node::Declaration(raw) | Node::ProcessingInstruction(raw) => {
                out.push_str("<?");
                out.push_str(raw);
                out.push_str("?>");
            }
            Node::DocType(raw) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(raw);
                out.push('>');
            }
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(raw) if raw.trim().is_empty())
    }
}

/// Prefix bindings in scope while walking down a tree.
#[derive(Debug, Default, Clone)]
pub struct NamespaceScope {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceScope {
    pub fn push(&mut self, element: &Element) {
        self.frames.push(element.namespace_declarations());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|(bound, _)| bound == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Whether `element` (already pushed) is `{namespace}local`.
    pub fn is(&self, element: &Element, namespace: &str, local: &str) -> bool {
        element.local_name() == local
            && self.resolve(element.prefix().unwrap_or("")) == Some(namespace)
    }
}

fn find_first_mut<'a>(
    element: &'a mut Element,
    scope: &mut NamespaceScope,
    namespace: &str,
    local: &str,
) -> Option<&'a mut Element> {
    scope.push(element);
    if scope.is(element, namespace, local) {
        scope.pop();
        return Some(element);
    }
    for child in &mut element.children {
        if let Node::Element(el) = child {
            if let Some(found) = find_first_mut(el, scope, namespace, local) {
                scope.pop();
                return Some(found);
            }
        }
    }
    scope.pop();
    None
}

fn for_each_scoped_mut<F: FnMut(&mut Element, &NamespaceScope)>(
    element: &mut Element,
    scope: &mut NamespaceScope,
    f: &mut F,
) {
    scope.push(element);
    f(element, scope);
    for child in &mut element.children {
        if let Node::Element(el) = child {
            for_each_scoped_mut(el, scope, f);
        }
    }
    scope.pop();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    byte_order_mark: bool,
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Bindings declared on the root element, used as the outer scope for
    /// the root's children.
    pub fn root_scope(&self) -> NamespaceScope {
        let mut scope = NamespaceScope::default();
        if let Some(root) = self.root() {
            scope.push(root);
        }
        scope
    }

    /// First element, in document order, named `{namespace}local`.
    pub fn find_first_mut(&mut self, namespace: &str, local: &str) -> Option<&mut Element> {
        let root = self.root_mut()?;
        find_first_mut(root, &mut NamespaceScope::default(), namespace, local)
    }

    pub fn for_each_element_mut<F: FnMut(&mut Element, &NamespaceScope)>(&mut self, mut f: F) {
        if let Some(root) = self.root_mut() {
            for_each_scoped_mut(root, &mut NamespaceScope::default(), &mut f);
        }
    }

    pub fn has_declaration(&self) -> bool {
        self.nodes.iter().any(|node| {
            matches!(node, Node::Declaration(raw) if raw.starts_with("xml"))
        })
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        if self.byte_order_mark {
            out.push('\u{feff}');
        }
        if !self.has_declaration() {
            out.push_str(DEFAULT_DECLARATION);
            out.push('\n');
        }
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }
}

/// Builds a [`Document`] from XML text.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    preserve_comments: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            preserve_comments: true,
        }
    }
}

impl TreeBuilder {
    pub fn preserve_comments(mut self, keep: bool) -> Self {
        self.preserve_comments = keep;
        self
    }

    pub fn build(&self, source: &str) -> Result<Document> {
        let (byte_order_mark, body) = match source.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let mut reader = Reader::from_str(body);
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .with_context(|| format!("XML parse error near byte {position}"))?;
            let node = match event {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start, false)?);
                    continue;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| anyhow!("unbalanced end tag near byte {position}"))?;
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(Element::from_start(&start, true)?),
                Event::Text(text) => Node::Text(utf8(&text)?),
                Event::CData(data) => Node::CData(utf8(&data)?),
                Event::Comment(comment) => {
                    if !self.preserve_comments {
                        continue;
                    }
                    Node::Comment(utf8(&comment)?)
                }
                Event::Decl(decl) => Node::Declaration(utf8(&decl)?),
                Event::PI(pi) => Node::ProcessingInstruction(utf8(&pi)?),
                Event::DocType(doctype) => Node::DocType(utf8(&doctype)?),
                Event::Eof => break,
            };
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(anyhow!("unclosed element <{}>", open.name()));
        }
        if !nodes.iter().any(|node| matches!(node, Node::Element(_))) {
            return Err(anyhow!("document has no root element"));
        }

        Ok(Document {
            byte_order_mark,
            nodes,
        })
    }
}

pub fn parse(source: &str) -> Result<Document> {
    TreeBuilder::default().build(source)
}
