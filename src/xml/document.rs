//! Parsed response documents and path lookup
//!
//! Paths are `/`-separated local names resolved in the document's default
//! namespace:
//! - `//Name` searches all descendants, `/Name` matches the root itself
//! - `Name[@Attr="value"]` filters on an attribute
//! - a trailing `/@Attr` selects an attribute instead of element text
//!
//! All leaf values are kept as the exact wire strings.

use crate::errors::{ApiError, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use std::str;

/// A node in the element tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as it appeared on the wire
    qname: String,
    namespace: Option<String>,
    /// Raw attribute keys (namespace declarations included) and unescaped values
    attributes: Vec<(String, String)>,
    nodes: Vec<Node>,
}

impl Element {
    /// Local part of the element name
    pub fn name(&self) -> &str {
        local_part(&self.qname)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Attribute value by local name (namespace declarations excluded)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Attributes as (local name, value)
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(key, _)| key != "xmlns" && !key.starts_with("xmlns:"))
            .map(|(key, value)| (local_part(key), value.as_str()))
    }

    /// Child elements in document order
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// First child element with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|e| e.name() == name)
    }

    /// Text of the first child element with the given local name
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text)
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// All elements matched by `path`, relative to this element
    pub fn select(&self, path: &str) -> Vec<&Element> {
        match PathExpr::parse(path) {
            Some(expr) => expr.select_from(self, self.namespace()),
            None => Vec::new(),
        }
    }

    /// First value matched by `path`: attribute value or element text
    pub fn value(&self, path: &str) -> Option<String> {
        let expr = PathExpr::parse(path)?;
        expr.values_from(self, self.namespace()).into_iter().next()
    }

    /// Serialize this element and its subtree
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.qname);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.nodes.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.nodes {
            match node {
                Node::Element(e) => e.write_xml(out),
                Node::Text(t) => out.push_str(&escape(t.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.qname);
        out.push('>');
    }

    fn descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in self.children() {
            out.push(child);
            child.descendants(out);
        }
    }
}

/// A parsed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parse an XML body into an element tree
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = NsReader::from_reader(xml);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_resolved_event() {
                Ok((ns, Event::Start(e))) => {
                    stack.push(Self::element(&e, ns)?);
                }
                Ok((ns, Event::Empty(e))) => {
                    let element = Self::element(&e, ns)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok((_, Event::End(_))) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ApiError::XmlParse("Unbalanced end tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok((_, Event::Text(e))) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ApiError::XmlParse(format!("XML parse error: {}", e)))?;
                    if let Some(parent) = stack.last_mut() {
                        if !text.is_empty() {
                            parent.nodes.push(Node::Text(text.into_owned()));
                        }
                    }
                }
                Ok((_, Event::CData(e))) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.nodes.push(Node::Text(text));
                    }
                }
                Ok((_, Event::Eof)) => break,
                Err(e) => {
                    return Err(ApiError::XmlParse(format!("XML parse error: {}", e)));
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ApiError::XmlParse("Unexpected end of document".to_string()));
        }
        root.map(|root| Document { root })
            .ok_or_else(|| ApiError::XmlParse("Document has no root element".to_string()))
    }

    fn element(e: &BytesStart<'_>, ns: ResolveResult<'_>) -> Result<Element> {
        let qname = str::from_utf8(e.name().as_ref())
            .map_err(|e| ApiError::XmlParse(format!("Invalid element name: {}", e)))?
            .to_string();
        let namespace = match ns {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            _ => None,
        };

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| ApiError::XmlParse(format!("Invalid attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ApiError::XmlParse(format!("Invalid attribute value: {}", e)))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Element {
            qname,
            namespace,
            attributes,
            nodes: Vec::new(),
        })
    }

    fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.nodes.push(Node::Element(element)),
            None if root.is_none() => *root = Some(element),
            None => {
                return Err(ApiError::XmlParse("Multiple root elements".to_string()));
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Namespace of the root element (encodes the protocol version)
    pub fn default_namespace(&self) -> Option<&str> {
        self.root.namespace()
    }

    /// All elements matched by `path`
    pub fn select(&self, path: &str) -> Vec<&Element> {
        match PathExpr::parse(path) {
            Some(expr) => expr.select_from_document(&self.root),
            None => Vec::new(),
        }
    }

    /// First element matched by `path`
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.select(path).into_iter().next()
    }

    /// First value matched by `path`
    pub fn value(&self, path: &str) -> Option<String> {
        self.values(path).into_iter().next()
    }

    /// All values matched by `path`
    pub fn values(&self, path: &str) -> Vec<String> {
        let Some(expr) = PathExpr::parse(path) else {
            return Vec::new();
        };
        let elements = expr.select_from_document(&self.root);
        expr.project(elements)
    }

    /// First value matched by `path`, parsed as an integer
    pub fn int(&self, path: &str) -> Option<u64> {
        self.value(path).and_then(|v| v.trim().parse().ok())
    }

    /// Serialize the document
    pub fn to_xml(&self) -> String {
        self.root.to_xml()
    }
}

impl std::str::FromStr for Document {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        Document::parse(s.as_bytes())
    }
}

fn local_part(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: String,
    predicate: Option<(String, String)>,
}

impl Step {
    fn matches(&self, element: &Element, namespace: Option<&str>) -> bool {
        (self.name == "*" || element.name() == self.name)
            && element.namespace() == namespace
            && match &self.predicate {
                Some((attr, value)) => element.attribute(attr) == Some(value.as_str()),
                None => true,
            }
    }
}

/// Compiled path expression
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathExpr {
    absolute: bool,
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl PathExpr {
    fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        let absolute = path.starts_with('/');
        let mut rest = path;
        let mut steps = Vec::new();
        let mut attribute = None;

        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else if steps.is_empty() {
                Axis::Child
            } else {
                return None;
            };

            let end = step_end(rest);
            let token = &rest[..end];
            rest = &rest[end..];

            if let Some(name) = token.strip_prefix('@') {
                if !rest.is_empty() || name.is_empty() || axis == Axis::Descendant {
                    return None;
                }
                attribute = Some(name.to_string());
                break;
            }
            steps.push(parse_step(axis, token)?);
        }

        if steps.is_empty() {
            tracing::debug!(path = %path, "empty_path_expression");
            return None;
        }
        Some(Self {
            absolute,
            steps,
            attribute,
        })
    }

    /// Evaluate against a document whose root is `root`
    fn select_from_document<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let namespace = root.namespace();
        if !self.absolute {
            return self.walk(vec![root], &self.steps, namespace);
        }

        let first = &self.steps[0];
        let mut candidates = vec![root];
        if first.axis == Axis::Descendant {
            root.descendants(&mut candidates);
        }
        let context: Vec<&Element> = candidates
            .into_iter()
            .filter(|e| first.matches(e, namespace))
            .collect();
        self.walk(context, &self.steps[1..], namespace)
    }

    fn select_from<'a>(&self, element: &'a Element, namespace: Option<&str>) -> Vec<&'a Element> {
        self.walk(vec![element], &self.steps, namespace)
    }

    fn values_from(&self, element: &Element, namespace: Option<&str>) -> Vec<String> {
        self.project(self.select_from(element, namespace))
    }

    fn walk<'a>(
        &self,
        mut context: Vec<&'a Element>,
        steps: &[Step],
        namespace: Option<&str>,
    ) -> Vec<&'a Element> {
        for step in steps {
            let mut next: Vec<&'a Element> = Vec::new();
            for element in context {
                let mut candidates = Vec::new();
                match step.axis {
                    Axis::Child => candidates.extend(element.children()),
                    Axis::Descendant => element.descendants(&mut candidates),
                }
                for candidate in candidates {
                    if step.matches(candidate, namespace)
                        && !next.iter().any(|e| std::ptr::eq(*e, candidate))
                    {
                        next.push(candidate);
                    }
                }
            }
            context = next;
        }
        context
    }

    fn project(&self, elements: Vec<&Element>) -> Vec<String> {
        match &self.attribute {
            Some(attr) => elements
                .into_iter()
                .filter_map(|e| e.attribute(attr).map(str::to_string))
                .collect(),
            None => elements.into_iter().map(Element::text).collect(),
        }
    }
}

/// End of the current step, skipping `/` inside predicates
fn step_end(s: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            ('/', None) if depth == 0 => return i,
            _ => {}
        }
    }
    s.len()
}

/// Parse `Name` or `Name[@attr="value"]`
fn parse_step(axis: Axis, token: &str) -> Option<Step> {
    let (name, predicate) = match token.find('[') {
        Some(open) => {
            let inner = token[open + 1..].strip_suffix(']')?;
            let (attr, value) = inner.strip_prefix('@')?.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))?;
            (
                &token[..open],
                Some((attr.trim().to_string(), value.to_string())),
            )
        }
        None => (token, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Step {
        axis,
        name: name.to_string(),
        predicate,
    })
}
