use crate::error::ValidationError;
use crate::service::{REPLAY_NS, SCHEMA_NS, SEARCH_NS};
use roxmltree::{Document, Node};
use serde_json::{map::Entry, Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;
use xmltree::{Element, EmitterConfig, XMLNode};

const XML_PREFIX: &str = "xml";

/// Element holding a single text value, e.g. `<tt:Token>src1</tt:Token>`.
pub fn leaf(name: &str, text: impl Into<String>) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.into()));
    element
}

/// Parses caller-supplied markup for an escape-hatch element (`Extension`,
/// `Tunnel`). The ONVIF prefixes are in scope; anything else must be
/// declared inside the fragment.
pub fn raw_fragment(field: &str, markup: &str) -> Result<Vec<XMLNode>, ValidationError> {
    let wrapped = format!(
        r#"<fragment xmlns:tt="{}" xmlns:tse="{}" xmlns:trp="{}">{}</fragment>"#,
        SCHEMA_NS, SEARCH_NS, REPLAY_NS, markup
    );
    let doc = Document::parse(&wrapped)
        .map_err(|err| ValidationError::invalid(field, format!("not well-formed XML: {err}")))?;
    Ok(doc
        .root_element()
        .children()
        .filter_map(|child| convert_node(child, true))
        .collect())
}

/// Copies a parsed reply element. Names keep the prefix used on the wire.
pub(crate) fn from_node(node: Node<'_, '_>) -> Element {
    convert(node, false)
}

fn convert(node: Node<'_, '_>, declare_namespaces: bool) -> Element {
    let tag = node.tag_name();
    let mut element = Element::new(&qualified_name(node, tag.namespace(), tag.name()));
    if declare_namespaces {
        let inherited: Vec<(Option<&str>, &str)> = node
            .parent_element()
            .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
            .unwrap_or_default();
        for ns in node.namespaces() {
            if inherited.contains(&(ns.name(), ns.uri())) {
                continue;
            }
            let declaration = match ns.name() {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            element.attributes.insert(declaration, ns.uri().to_string());
        }
    }
    for attr in node.attributes() {
        element.attributes.insert(
            qualified_name(node, attr.namespace(), attr.name()),
            attr.value().to_string(),
        );
    }
    element.children = node
        .children()
        .filter_map(|child| convert_node(child, declare_namespaces))
        .collect();
    element
}

fn convert_node(node: Node<'_, '_>, keep_whitespace: bool) -> Option<XMLNode> {
    if node.is_element() {
        return Some(XMLNode::Element(convert(node, keep_whitespace)));
    }
    if !node.is_text() {
        return None;
    }
    node.text()
        .filter(|text| keep_whitespace || !text.trim().is_empty())
        .map(|text| XMLNode::Text(text.to_string()))
}

fn qualified_name(node: Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn prefix_of(name: &str) -> Option<&str> {
    name.split_once(':').map(|(prefix, _)| prefix)
}

fn is_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Characters allowed by the XML 1.0 `Char` production.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ch >= '\u{10000}'
}

fn check_text(element: &Element, text: &str) -> Result<(), ValidationError> {
    match text.chars().find(|ch| !is_xml_char(*ch)) {
        Some(ch) => Err(ValidationError::invalid(
            element.local_name(),
            format!("U+{:04X} cannot appear in an XML document", ch as u32),
        )),
        None => Ok(()),
    }
}

pub(crate) fn write_document(element: &Element) -> Result<String, ValidationError> {
    write(element, true)
}

fn write(element: &Element, declaration: bool) -> Result<String, ValidationError> {
    let config = EmitterConfig::new()
        .write_document_declaration(declaration)
        .perform_indent(false)
        .pad_self_closing(false);
    let mut buffer = Vec::new();
    element
        .write_with_config(&mut buffer, config)
        .map_err(|err| ValidationError::Malformed(format!("cannot serialize XML: {err}")))?;
    String::from_utf8(buffer).map_err(|err| ValidationError::Malformed(err.to_string()))
}

/// Builder and lookup helpers over `xmltree` elements whose names carry
/// their prefix (`tse:SearchToken`).
pub trait ElementExt: Sized {
    fn with_attr(self, name: &str, value: impl Into<String>) -> Self;
    fn with_child(self, child: Element) -> Self;
    fn with_opt(self, child: Option<Element>) -> Self;
    fn with_children(self, children: impl IntoIterator<Item = Element>) -> Self;
    fn with_nodes(self, nodes: Vec<XMLNode>) -> Self;

    fn local_name(&self) -> &str;
    fn elements(&self) -> impl Iterator<Item = &Element>;
    /// First direct child with the given local name.
    fn find(&self, local_name: &str) -> Option<&Element>;
    fn find_all<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element>;
    /// Trimmed text of the first direct child with the given local name.
    fn child_text(&self, local_name: &str) -> Option<String>;
    fn descendant(&self, local_name: &str) -> Option<&Element>;
    fn text_content(&self) -> String;

    /// Prefixes used in this subtree that no element inside it declares.
    fn required_prefixes(&self) -> BTreeSet<String>;
    fn check_chars(&self) -> Result<(), ValidationError>;
    fn to_xml(&self) -> Result<String, ValidationError>;
    /// JSON projection keyed by local names. Text-only elements become
    /// strings, repeated children become arrays, attributes go under `$`.
    fn to_json(&self) -> Value;
}

impl ElementExt for Element {
    fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    fn with_child(mut self, child: Element) -> Self {
        self.children.push(XMLNode::Element(child));
        self
    }

    fn with_opt(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.with_child(child),
            None => self,
        }
    }

    fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children
            .extend(children.into_iter().map(XMLNode::Element));
        self
    }

    fn with_nodes(mut self, nodes: Vec<XMLNode>) -> Self {
        self.children.extend(nodes);
        self
    }

    fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XMLNode::Element(element) => Some(element),
            _ => None,
        })
    }

    fn find(&self, local_name: &str) -> Option<&Element> {
        self.elements()
            .find(|element| element.local_name() == local_name)
    }

    fn find_all<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements()
            .filter(move |element| element.local_name() == local_name)
    }

    fn child_text(&self, local_name: &str) -> Option<String> {
        self.find(local_name)
            .map(|child| child.text_content().trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn descendant(&self, local_name: &str) -> Option<&Element> {
        self.elements().find_map(|element| {
            if element.local_name() == local_name {
                Some(element)
            } else {
                element.descendant(local_name)
            }
        })
    }

    fn text_content(&self) -> String {
        self.get_text().map(Cow::into_owned).unwrap_or_default()
    }

    fn required_prefixes(&self) -> BTreeSet<String> {
        let mut prefixes = BTreeSet::new();
        collect_prefixes(self, &mut Vec::new(), &mut prefixes);
        prefixes
    }

    fn check_chars(&self) -> Result<(), ValidationError> {
        for value in self.attributes.values() {
            check_text(self, value)?;
        }
        for node in &self.children {
            match node {
                XMLNode::Element(child) => child.check_chars()?,
                XMLNode::Text(text) | XMLNode::CData(text) | XMLNode::Comment(text) => {
                    check_text(self, text)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn to_xml(&self) -> Result<String, ValidationError> {
        write(self, false)
    }

    fn to_json(&self) -> Value {
        let has_elements = self.elements().next().is_some();
        if !has_elements && self.attributes.is_empty() {
            return Value::String(self.text_content().trim().to_string());
        }
        let mut map = Map::new();
        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            map.insert("$".to_string(), Value::Object(attrs));
        }
        let text = self.text_content();
        if !text.trim().is_empty() {
            map.insert("_".to_string(), Value::String(text.trim().to_string()));
        }
        for element in self.elements() {
            let value = element.to_json();
            match map.entry(element.local_name()) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    Value::Array(items) => items.push(value),
                    existing => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                },
            }
        }
        Value::Object(map)
    }
}

fn collect_prefixes<'a>(
    element: &'a Element,
    scope: &mut Vec<&'a str>,
    prefixes: &mut BTreeSet<String>,
) {
    let depth = scope.len();
    scope.extend(
        element
            .attributes
            .keys()
            .filter_map(|name| name.strip_prefix("xmlns:")),
    );
    let used = prefix_of(&element.name).into_iter().chain(
        element
            .attributes
            .keys()
            .filter(|name| !is_declaration(name))
            .filter_map(|name| prefix_of(name)),
    );
    for prefix in used {
        if prefix != XML_PREFIX && !scope.contains(&prefix) {
            prefixes.insert(prefix.to_string());
        }
    }
    for child in element.elements() {
        collect_prefixes(child, scope, prefixes);
    }
    scope.truncate(depth);
}
