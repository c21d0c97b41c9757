use std::collections::HashMap;

use crate::debug::DebugLogger;
use crate::selector::ElementKey;
use crate::stylesheet::{StyleRule, parse_stylesheet};

/// Index of an element in its owning [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Svg,
    Group,
    Defs,
    Symbol,
    Use,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    Path,
    LinearGradient,
    RadialGradient,
    Stop,
    ClipPath,
    Mask,
    Style,
    /// Recognised but unsupported; skipped with its subtree.
    Ignored,
    /// Unrecognised tag; an inert container.
    Unknown,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "svg" => Self::Svg,
            "g" => Self::Group,
            "defs" => Self::Defs,
            "symbol" => Self::Symbol,
            "use" => Self::Use,
            "rect" => Self::Rect,
            "circle" => Self::Circle,
            "ellipse" => Self::Ellipse,
            "line" => Self::Line,
            "polyline" => Self::Polyline,
            "polygon" => Self::Polygon,
            "path" => Self::Path,
            "linearGradient" => Self::LinearGradient,
            "radialGradient" => Self::RadialGradient,
            "stop" => Self::Stop,
            "clipPath" => Self::ClipPath,
            "mask" => Self::Mask,
            "style" => Self::Style,
            "title" | "desc" | "metadata" | "text" | "image" | "foreignObject" | "filter"
            | "marker" | "pattern" | "script" => Self::Ignored,
            _ => Self::Unknown,
        }
    }

    pub fn is_shape(self) -> bool {
        matches!(
            self,
            Self::Rect
                | Self::Circle
                | Self::Ellipse
                | Self::Line
                | Self::Polyline
                | Self::Polygon
                | Self::Path
        )
    }

    /// Containers whose children are traversed during a normal render walk.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Svg | Self::Group | Self::Unknown)
    }

    /// Elements that only take part in rendering through a reference.
    pub fn is_reference_only(self) -> bool {
        matches!(
            self,
            Self::Defs
                | Self::Symbol
                | Self::ClipPath
                | Self::Mask
                | Self::LinearGradient
                | Self::RadialGradient
                | Self::Stop
                | Self::Style
        )
    }

    pub fn is_gradient(self) -> bool {
        matches!(self, Self::LinearGradient | Self::RadialGradient)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            kind: ElementKind::from_tag(tag),
            tag: tag.to_string(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Replaces an existing attribute in place or appends a new one.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").filter(|id| !id.is_empty())
    }

    pub fn class(&self) -> &str {
        self.attribute("class").unwrap_or("")
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attribute("style")
    }

    /// `href`, falling back to `xlink:href`, as a local `#id` reference.
    pub fn href_id(&self) -> Option<&str> {
        let raw = self
            .attribute("href")
            .or_else(|| self.attribute("xlink:href"))?;
        raw.trim().strip_prefix('#').filter(|id| !id.is_empty())
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn key(&self) -> ElementKey<'_> {
        ElementKey {
            tag: &self.tag,
            id: self.id(),
            classes: self.class(),
        }
    }
}

/// Owned element tree with an id index and the stylesheet rule table.
///
/// Produced by [`DocumentBuilder::finish`] and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: Vec<Element>,
    root: Option<NodeId>,
    ids: HashMap<String, NodeId>,
    rules: Vec<StyleRule>,
}

impl Document {
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Panics if `id` does not belong to this document.
    pub fn element(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// Rules in document order.
    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.element(node).parent(), move |id| {
            self.element(*id).parent()
        })
    }

    /// Copies the subtree rooted at `node` into a new document. Style
    /// elements inside the subtree contribute their rules again and id-bearing
    /// elements are indexed afresh.
    pub fn deep_copy(&self, node: NodeId) -> Document {
        enum Step {
            Enter(NodeId),
            Exit(NodeId),
        }

        let mut builder = DocumentBuilder::new();
        let mut steps = vec![Step::Enter(node)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Enter(id) => {
                    let element = self.element(id);
                    builder.push(TokenEvent::StartElement {
                        name: element.tag.clone(),
                        attributes: element.attributes.clone(),
                    });
                    if !element.text.is_empty() {
                        builder.push(TokenEvent::Text(element.text.clone()));
                    }
                    steps.push(Step::Exit(id));
                    for child in element.children.iter().rev() {
                        steps.push(Step::Enter(*child));
                    }
                }
                Step::Exit(id) => builder.push(TokenEvent::EndElement {
                    name: self.element(id).tag.clone(),
                }),
            }
        }
        builder.finish()
    }
}

/// Tokenizer output consumed by [`DocumentBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    StartElement {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    EndElement {
        name: String,
    },
}

impl TokenEvent {
    pub fn start(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self::StartElement {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn end(name: &str) -> Self {
        Self::EndElement {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentBuilder {
    doc: Document,
    stack: Vec<NodeId>,
    rule_order: usize,
    /// Open elements that are being discarded (content after the root closed).
    discard_depth: usize,
    debug: Option<DebugLogger>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn push(&mut self, event: TokenEvent) {
        match event {
            TokenEvent::StartElement { name, attributes } => self.start_element(name, attributes),
            TokenEvent::Text(text) => {
                if self.discard_depth == 0 {
                    if let Some(top) = self.stack.last() {
                        self.doc.elements[top.0].text.push_str(&text);
                    }
                }
            }
            TokenEvent::EndElement { name } => self.end_element(&name),
        }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = TokenEvent>) {
        for event in events {
            self.push(event);
        }
    }

    /// Closes any elements still open and returns the finished document.
    pub fn finish(mut self) -> Document {
        while let Some(top) = self.stack.pop() {
            self.close(top);
        }
        if let Some(debug) = &self.debug {
            debug.increment("document.elements", self.doc.elements.len() as u64);
        }
        self.doc
    }

    fn start_element(&mut self, name: String, attributes: Vec<(String, String)>) {
        if self.discard_depth > 0 || (self.stack.is_empty() && self.doc.root.is_some()) {
            self.discard_depth += 1;
            if self.discard_depth == 1 {
                self.log("document.extra_root", &[("tag", &name)]);
            }
            return;
        }

        let id = NodeId(self.doc.elements.len());
        let mut element = Element::new(&name);
        for (k, v) in attributes {
            element.set_attribute(&k, &v);
        }
        element.parent = self.stack.last().copied();

        if let Some(key) = element.id().map(str::to_string) {
            if self.doc.ids.contains_key(&key) {
                self.log("document.duplicate_id", &[("id", &key), ("tag", &name)]);
            } else {
                self.doc.ids.insert(key, id);
            }
        }

        match element.parent {
            Some(parent) => self.doc.elements[parent.0].children.push(id),
            None => self.doc.root = Some(id),
        }
        self.doc.elements.push(element);
        self.stack.push(id);
    }

    fn end_element(&mut self, name: &str) {
        if self.discard_depth > 0 {
            self.discard_depth -= 1;
            return;
        }
        // Close up to the nearest open element with this name; unmatched ends are dropped.
        let Some(pos) = self
            .stack
            .iter()
            .rposition(|id| self.doc.elements[id.0].tag == name)
        else {
            return;
        };
        while self.stack.len() > pos {
            if let Some(top) = self.stack.pop() {
                self.close(top);
            }
        }
    }

    fn close(&mut self, id: NodeId) {
        let element = &self.doc.elements[id.0];
        if element.kind != ElementKind::Style {
            return;
        }
        if let Some(ty) = element.attribute("type") {
            if !ty.trim().is_empty() && !ty.trim().eq_ignore_ascii_case("text/css") {
                return;
            }
        }
        let css = element.text.clone();
        match parse_stylesheet(&css, &mut self.rule_order) {
            Some(parsed) => {
                for warning in &parsed.warnings {
                    self.log("document.invalid_stylesheet", &[("message", warning)]);
                }
                for selector in &parsed.dropped_selectors {
                    self.log("document.unsupported_selector", &[("selector", selector)]);
                }
                for rule in &parsed.rules {
                    let count = rule.declarations.len().to_string();
                    self.log(
                        "document.style_rule",
                        &[("selector", &rule.selector.text), ("declarations", &count)],
                    );
                }
                self.doc.rules.extend(parsed.rules);
            }
            None => self.log("document.invalid_stylesheet", &[]),
        }
    }

    fn log(&self, kind: &str, fields: &[(&str, &str)]) {
        if let Some(debug) = &self.debug {
            debug.log_event(kind, fields);
        }
    }
}
