use std::str::FromStr;

use crate::debug::DebugLogger;
use crate::document::{Document, Element, NodeId};
use crate::selector::{ElementKey, SelectorMatcher};
use crate::stylesheet::{Declaration, StyleRule, parse_style_attribute};
use crate::types::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    Fill,
    FillOpacity,
    FillRule,
    Stroke,
    StrokeWidth,
    StrokeOpacity,
    StrokeLinecap,
    StrokeLinejoin,
    StrokeMiterlimit,
    StrokeDasharray,
    StrokeDashoffset,
    Opacity,
    ClipPath,
    ClipRule,
    Mask,
    Color,
    Display,
    Visibility,
    StopColor,
    StopOpacity,
}

impl PropertyId {
    /// `Color` comes first: `currentColor` in later properties resolves against it.
    pub const ALL: [PropertyId; 20] = [
        PropertyId::Color,
        PropertyId::Fill,
        PropertyId::FillOpacity,
        PropertyId::FillRule,
        PropertyId::Stroke,
        PropertyId::StrokeWidth,
        PropertyId::StrokeOpacity,
        PropertyId::StrokeLinecap,
        PropertyId::StrokeLinejoin,
        PropertyId::StrokeMiterlimit,
        PropertyId::StrokeDasharray,
        PropertyId::StrokeDashoffset,
        PropertyId::Opacity,
        PropertyId::ClipPath,
        PropertyId::ClipRule,
        PropertyId::Mask,
        PropertyId::Display,
        PropertyId::Visibility,
        PropertyId::StopColor,
        PropertyId::StopOpacity,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "fill" => Self::Fill,
            "fill-opacity" => Self::FillOpacity,
            "fill-rule" => Self::FillRule,
            "stroke" => Self::Stroke,
            "stroke-width" => Self::StrokeWidth,
            "stroke-opacity" => Self::StrokeOpacity,
            "stroke-linecap" => Self::StrokeLinecap,
            "stroke-linejoin" => Self::StrokeLinejoin,
            "stroke-miterlimit" => Self::StrokeMiterlimit,
            "stroke-dasharray" => Self::StrokeDasharray,
            "stroke-dashoffset" => Self::StrokeDashoffset,
            "opacity" => Self::Opacity,
            "clip-path" => Self::ClipPath,
            "clip-rule" => Self::ClipRule,
            "mask" => Self::Mask,
            "color" => Self::Color,
            "display" => Self::Display,
            "visibility" => Self::Visibility,
            "stop-color" => Self::StopColor,
            "stop-opacity" => Self::StopOpacity,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::FillOpacity => "fill-opacity",
            Self::FillRule => "fill-rule",
            Self::Stroke => "stroke",
            Self::StrokeWidth => "stroke-width",
            Self::StrokeOpacity => "stroke-opacity",
            Self::StrokeLinecap => "stroke-linecap",
            Self::StrokeLinejoin => "stroke-linejoin",
            Self::StrokeMiterlimit => "stroke-miterlimit",
            Self::StrokeDasharray => "stroke-dasharray",
            Self::StrokeDashoffset => "stroke-dashoffset",
            Self::Opacity => "opacity",
            Self::ClipPath => "clip-path",
            Self::ClipRule => "clip-rule",
            Self::Mask => "mask",
            Self::Color => "color",
            Self::Display => "display",
            Self::Visibility => "visibility",
            Self::StopColor => "stop-color",
            Self::StopOpacity => "stop-opacity",
        }
    }

    pub fn inherited(self) -> bool {
        !matches!(
            self,
            Self::Opacity
                | Self::ClipPath
                | Self::Mask
                | Self::Display
                | Self::StopColor
                | Self::StopOpacity
        )
    }

    pub fn initial(self) -> PropertyValue {
        ComputedStyle::default().get(self)
    }

    /// Parses a specified value. `currentColor` stays unresolved here.
    pub fn parse(self, raw: &str) -> Option<PropertyValue> {
        let v = raw.trim();
        match self {
            Self::Fill | Self::Stroke => parse_paint(v).map(PropertyValue::Paint),
            Self::StopColor => {
                if v.eq_ignore_ascii_case("currentcolor") {
                    Some(PropertyValue::Paint(Paint::CurrentColor))
                } else {
                    parse_color(v).map(PropertyValue::Color)
                }
            }
            Self::Color => parse_color(v).map(PropertyValue::Color),
            Self::FillOpacity | Self::StrokeOpacity | Self::Opacity | Self::StopOpacity => {
                parse_opacity(v).map(PropertyValue::Number)
            }
            Self::FillRule | Self::ClipRule => match v {
                "nonzero" => Some(PropertyValue::FillRule(FillRule::NonZero)),
                "evenodd" => Some(PropertyValue::FillRule(FillRule::EvenOdd)),
                _ => None,
            },
            Self::StrokeWidth => parse_length(v)
                .filter(|w| *w >= 0.0)
                .map(PropertyValue::Number),
            Self::StrokeLinecap => match v {
                "butt" => Some(PropertyValue::LineCap(LineCap::Butt)),
                "round" => Some(PropertyValue::LineCap(LineCap::Round)),
                "square" => Some(PropertyValue::LineCap(LineCap::Square)),
                _ => None,
            },
            Self::StrokeLinejoin => match v {
                "miter" => Some(PropertyValue::LineJoin(LineJoin::Miter)),
                "round" => Some(PropertyValue::LineJoin(LineJoin::Round)),
                "bevel" => Some(PropertyValue::LineJoin(LineJoin::Bevel)),
                _ => None,
            },
            Self::StrokeMiterlimit => parse_number(v)
                .filter(|m| *m >= 1.0)
                .map(PropertyValue::Number),
            Self::StrokeDasharray => parse_dasharray(v).map(PropertyValue::Dashes),
            Self::StrokeDashoffset => parse_length(v).map(PropertyValue::Number),
            Self::ClipPath | Self::Mask => {
                if v == "none" {
                    Some(PropertyValue::Reference(None))
                } else {
                    let (id, rest) = parse_url_ref(v)?;
                    rest.is_empty()
                        .then(|| PropertyValue::Reference(Some(id)))
                }
            }
            Self::Display => parse_display(v).map(PropertyValue::Display),
            Self::Visibility => match v {
                "visible" => Some(PropertyValue::Visibility(Visibility::Visible)),
                "hidden" => Some(PropertyValue::Visibility(Visibility::Hidden)),
                "collapse" => Some(PropertyValue::Visibility(Visibility::Collapse)),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Inline,
    Block,
    None,
    /// Any other display keyword; treated like `inline`.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,
    Color(Color),
    CurrentColor,
    /// Paint server reference; the fallback applies when it cannot be resolved.
    Url {
        id: String,
        fallback: Option<Box<Paint>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Paint(Paint),
    Color(Color),
    Number(f64),
    FillRule(FillRule),
    LineCap(LineCap),
    LineJoin(LineJoin),
    /// Empty means `none`.
    Dashes(Vec<f64>),
    Reference(Option<String>),
    Display(Display),
    Visibility(Visibility),
}

/// Computed presentation style of one element. Paints never hold
/// `currentColor`; it is resolved against `color` during the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub fill: Paint,
    pub fill_opacity: f64,
    pub fill_rule: FillRule,
    pub stroke: Paint,
    pub stroke_width: f64,
    pub stroke_opacity: f64,
    pub stroke_linecap: LineCap,
    pub stroke_linejoin: LineJoin,
    pub stroke_miterlimit: f64,
    pub stroke_dasharray: Vec<f64>,
    pub stroke_dashoffset: f64,
    pub opacity: f64,
    pub clip_path: Option<String>,
    pub clip_rule: FillRule,
    pub mask: Option<String>,
    pub color: Color,
    pub display: Display,
    pub visibility: Visibility,
    pub stop_color: Color,
    pub stop_opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            fill: Paint::Color(Color::BLACK),
            fill_opacity: 1.0,
            fill_rule: FillRule::NonZero,
            stroke: Paint::None,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            stroke_linecap: LineCap::Butt,
            stroke_linejoin: LineJoin::Miter,
            stroke_miterlimit: 4.0,
            stroke_dasharray: Vec::new(),
            stroke_dashoffset: 0.0,
            opacity: 1.0,
            clip_path: None,
            clip_rule: FillRule::NonZero,
            mask: None,
            color: Color::BLACK,
            display: Display::Inline,
            visibility: Visibility::Visible,
            stop_color: Color::BLACK,
            stop_opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    pub fn get(&self, id: PropertyId) -> PropertyValue {
        match id {
            PropertyId::Fill => PropertyValue::Paint(self.fill.clone()),
            PropertyId::FillOpacity => PropertyValue::Number(self.fill_opacity),
            PropertyId::FillRule => PropertyValue::FillRule(self.fill_rule),
            PropertyId::Stroke => PropertyValue::Paint(self.stroke.clone()),
            PropertyId::StrokeWidth => PropertyValue::Number(self.stroke_width),
            PropertyId::StrokeOpacity => PropertyValue::Number(self.stroke_opacity),
            PropertyId::StrokeLinecap => PropertyValue::LineCap(self.stroke_linecap),
            PropertyId::StrokeLinejoin => PropertyValue::LineJoin(self.stroke_linejoin),
            PropertyId::StrokeMiterlimit => PropertyValue::Number(self.stroke_miterlimit),
            PropertyId::StrokeDasharray => PropertyValue::Dashes(self.stroke_dasharray.clone()),
            PropertyId::StrokeDashoffset => PropertyValue::Number(self.stroke_dashoffset),
            PropertyId::Opacity => PropertyValue::Number(self.opacity),
            PropertyId::ClipPath => PropertyValue::Reference(self.clip_path.clone()),
            PropertyId::ClipRule => PropertyValue::FillRule(self.clip_rule),
            PropertyId::Mask => PropertyValue::Reference(self.mask.clone()),
            PropertyId::Color => PropertyValue::Color(self.color),
            PropertyId::Display => PropertyValue::Display(self.display),
            PropertyId::Visibility => PropertyValue::Visibility(self.visibility),
            PropertyId::StopColor => PropertyValue::Color(self.stop_color),
            PropertyId::StopOpacity => PropertyValue::Number(self.stop_opacity),
        }
    }

    /// Stores a computed value; values of the wrong shape are ignored.
    fn set(&mut self, id: PropertyId, value: PropertyValue) {
        match (id, value) {
            (PropertyId::Fill, PropertyValue::Paint(p)) => self.fill = p,
            (PropertyId::Stroke, PropertyValue::Paint(p)) => self.stroke = p,
            (PropertyId::FillOpacity, PropertyValue::Number(n)) => self.fill_opacity = n,
            (PropertyId::StrokeOpacity, PropertyValue::Number(n)) => self.stroke_opacity = n,
            (PropertyId::Opacity, PropertyValue::Number(n)) => self.opacity = n,
            (PropertyId::StopOpacity, PropertyValue::Number(n)) => self.stop_opacity = n,
            (PropertyId::StrokeWidth, PropertyValue::Number(n)) => self.stroke_width = n,
            (PropertyId::StrokeMiterlimit, PropertyValue::Number(n)) => self.stroke_miterlimit = n,
            (PropertyId::StrokeDashoffset, PropertyValue::Number(n)) => self.stroke_dashoffset = n,
            (PropertyId::FillRule, PropertyValue::FillRule(r)) => self.fill_rule = r,
            (PropertyId::ClipRule, PropertyValue::FillRule(r)) => self.clip_rule = r,
            (PropertyId::StrokeLinecap, PropertyValue::LineCap(c)) => self.stroke_linecap = c,
            (PropertyId::StrokeLinejoin, PropertyValue::LineJoin(j)) => self.stroke_linejoin = j,
            (PropertyId::StrokeDasharray, PropertyValue::Dashes(d)) => self.stroke_dasharray = d,
            (PropertyId::ClipPath, PropertyValue::Reference(r)) => self.clip_path = r,
            (PropertyId::Mask, PropertyValue::Reference(r)) => self.mask = r,
            (PropertyId::Color, PropertyValue::Color(c)) => self.color = c,
            (PropertyId::StopColor, PropertyValue::Color(c)) => self.stop_color = c,
            (PropertyId::Display, PropertyValue::Display(d)) => self.display = d,
            (PropertyId::Visibility, PropertyValue::Visibility(v)) => self.visibility = v,
            _ => {}
        }
    }

    pub fn is_displayed(&self) -> bool {
        self.display != Display::None
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Specified {
    Value(PropertyValue),
    Inherit,
    Initial,
}

/// Where a rejected declaration came from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationOrigin {
    Attribute,
    Stylesheet,
    Inline,
}

impl DeclarationOrigin {
    fn as_str(self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Stylesheet => "stylesheet",
            Self::Inline => "inline",
        }
    }
}

/// Runs the cascade for one element.
///
/// Precedence from low to high: inherited or initial value, presentation
/// attributes, `rules` (sorted here by specificity then document order),
/// inline `style` declarations. Invalid values are reported through
/// `on_invalid` and leave the previous winner in place.
pub fn cascade(
    element: &Element,
    rules: &[&StyleRule],
    parent: Option<&ComputedStyle>,
    mut on_invalid: impl FnMut(DeclarationOrigin, &Declaration),
) -> ComputedStyle {
    let mut specified: Vec<Option<Specified>> = vec![None; PropertyId::ALL.len()];
    let mut apply = |origin: DeclarationOrigin, decl: &Declaration| {
        let Some(id) = PropertyId::from_name(&decl.name) else {
            return;
        };
        let slot = &mut specified[slot_of(id)];
        let value = decl.value.trim();
        if value.eq_ignore_ascii_case("inherit") {
            *slot = Some(Specified::Inherit);
        } else if value.eq_ignore_ascii_case("initial") {
            *slot = Some(Specified::Initial);
        } else if id == PropertyId::Color && value.eq_ignore_ascii_case("currentcolor") {
            *slot = Some(Specified::Inherit);
        } else {
            match id.parse(value) {
                Some(v) => *slot = Some(Specified::Value(v)),
                None => on_invalid(origin, decl),
            }
        }
    };

    for (name, value) in element.attributes() {
        if PropertyId::from_name(name).is_some() {
            let decl = Declaration {
                name: name.clone(),
                value: value.clone(),
            };
            apply(DeclarationOrigin::Attribute, &decl);
        }
    }

    let mut sorted: Vec<&StyleRule> = rules.to_vec();
    sorted.sort_by(|a, b| {
        a.selector
            .specificity
            .cmp(&b.selector.specificity)
            .then(a.order.cmp(&b.order))
    });
    for rule in sorted {
        for decl in &rule.declarations {
            apply(DeclarationOrigin::Stylesheet, decl);
        }
    }

    if let Some(inline) = element.inline_style() {
        for decl in parse_style_attribute(inline) {
            apply(DeclarationOrigin::Inline, &decl);
        }
    }

    let initial = ComputedStyle::default();
    let mut style = ComputedStyle::default();
    for id in PropertyId::ALL {
        let from_parent = || parent.map(|p| p.get(id)).unwrap_or_else(|| initial.get(id));
        let value = match specified[slot_of(id)].take() {
            Some(Specified::Value(v)) => resolve_current_color(id, v, style.color),
            Some(Specified::Inherit) => from_parent(),
            Some(Specified::Initial) => initial.get(id),
            None if id.inherited() => from_parent(),
            None => initial.get(id),
        };
        style.set(id, value);
    }
    style
}

fn slot_of(id: PropertyId) -> usize {
    PropertyId::ALL
        .iter()
        .position(|p| *p == id)
        .unwrap_or_default()
}

fn resolve_current_color(id: PropertyId, value: PropertyValue, color: Color) -> PropertyValue {
    match (id, value) {
        (PropertyId::StopColor, PropertyValue::Paint(Paint::CurrentColor)) => {
            PropertyValue::Color(color)
        }
        (_, PropertyValue::Paint(paint)) => PropertyValue::Paint(resolve_paint(paint, color)),
        (_, other) => other,
    }
}

fn resolve_paint(paint: Paint, color: Color) -> Paint {
    match paint {
        Paint::CurrentColor => Paint::Color(color),
        Paint::Url { id, fallback } => Paint::Url {
            id,
            fallback: fallback.map(|f| Box::new(resolve_paint(*f, color))),
        },
        other => other,
    }
}

/// Cascade driver bound to a document, a selector matcher and an optional
/// diagnostics sink.
pub struct StyleResolver<'a> {
    document: &'a Document,
    matcher: &'a dyn SelectorMatcher,
    debug: Option<&'a DebugLogger>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(
        document: &'a Document,
        matcher: &'a dyn SelectorMatcher,
        debug: Option<&'a DebugLogger>,
    ) -> Self {
        Self {
            document,
            matcher,
            debug,
        }
    }

    /// Rules whose selector matches `node` in its document position.
    pub fn matched_rules(&self, node: NodeId) -> Vec<&'a StyleRule> {
        let rules = self.document.rules();
        if rules.is_empty() {
            return Vec::new();
        }
        let element = self.document.element(node);
        let key = element.key();
        let ancestors: Vec<ElementKey<'a>> = self
            .document
            .ancestors(node)
            .map(|id| self.document.element(id).key())
            .collect();
        rules
            .iter()
            .filter(|rule| self.matcher.matches(&rule.selector, &key, &ancestors))
            .collect()
    }

    /// Computed style of `node` inheriting from `parent`. The parent style is
    /// passed in rather than looked up so reused content can inherit from the
    /// referencing element.
    pub fn compute(&self, node: NodeId, parent: Option<&ComputedStyle>) -> ComputedStyle {
        let element = self.document.element(node);
        let rules = self.matched_rules(node);
        cascade(element, &rules, parent, |origin, decl| {
            if let Some(debug) = self.debug {
                debug.log_event(
                    "style.invalid_value",
                    &[
                        ("tag", &element.tag),
                        ("origin", origin.as_str()),
                        ("property", &decl.name),
                        ("value", &decl.value),
                    ],
                );
            }
        })
    }

    /// Computed style of `node` inheriting along its document ancestors.
    pub fn compute_with_ancestors(&self, node: NodeId) -> ComputedStyle {
        let mut chain: Vec<NodeId> = self.document.ancestors(node).collect();
        chain.reverse();
        chain.push(node);
        let mut style: Option<ComputedStyle> = None;
        for id in chain {
            style = Some(self.compute(id, style.as_ref()));
        }
        style.unwrap_or_default()
    }
}

/// Number with an optional absolute unit, converted to px at 96 dpi.
/// Percentages and relative units are rejected.
pub fn parse_length(input: &str) -> Option<f64> {
    let s = input.trim();
    let split = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value = parse_number(number)?;
    let scale = match unit.to_ascii_lowercase().as_str() {
        "" | "px" => 1.0,
        "pt" => 4.0 / 3.0,
        "pc" => 16.0,
        "mm" => 96.0 / 25.4,
        "cm" => 96.0 / 2.54,
        "in" => 96.0,
        _ => return None,
    };
    Some(value * scale)
}

pub fn parse_number(input: &str) -> Option<f64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Number or percentage, clamped to 0..=1.
pub fn parse_opacity(input: &str) -> Option<f64> {
    let s = input.trim();
    let value = match s.strip_suffix('%') {
        Some(pct) => parse_number(pct)? / 100.0,
        None => parse_number(s)?,
    };
    Some(value.clamp(0.0, 1.0))
}

/// Colour keyword or function. `none` and `currentColor` are not colours.
pub fn parse_color(input: &str) -> Option<Color> {
    let s = input.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("currentcolor") {
        return None;
    }
    let c = csscolorparser::Color::from_str(s).ok()?;
    Some(Color::rgba(c.r, c.g, c.b, c.a))
}

/// `none | <color> | currentColor | url(#id) [none | <color> | currentColor]`
pub fn parse_paint(input: &str) -> Option<Paint> {
    let s = input.trim();
    if let Some((id, rest)) = parse_url_ref(s) {
        let fallback = if rest.is_empty() {
            None
        } else {
            match parse_simple_paint(rest)? {
                Paint::Url { .. } => return None,
                p => Some(Box::new(p)),
            }
        };
        return Some(Paint::Url { id, fallback });
    }
    parse_simple_paint(s)
}

fn parse_simple_paint(s: &str) -> Option<Paint> {
    if s.eq_ignore_ascii_case("none") {
        Some(Paint::None)
    } else if s.eq_ignore_ascii_case("currentcolor") {
        Some(Paint::CurrentColor)
    } else {
        parse_color(s).map(Paint::Color)
    }
}

/// Splits `url(#id) rest` into the local id and the trimmed remainder.
pub fn parse_url_ref(input: &str) -> Option<(String, &str)> {
    let s = input.trim();
    if !s.get(..4)?.eq_ignore_ascii_case("url(") {
        return None;
    }
    let close = s.find(')')?;
    let inner = s[4..close].trim().trim_matches('"').trim_matches('\'');
    let id = inner.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some((id.to_string(), s[close + 1..].trim()))
}

fn parse_dasharray(input: &str) -> Option<Vec<f64>> {
    if input.eq_ignore_ascii_case("none") {
        return Some(Vec::new());
    }
    let mut dashes = Vec::new();
    for part in input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
    {
        dashes.push(parse_length(part).filter(|v| *v >= 0.0)?);
    }
    if dashes.is_empty() {
        return None;
    }
    if dashes.iter().all(|v| *v == 0.0) {
        return Some(Vec::new());
    }
    if dashes.len() % 2 == 1 {
        dashes.extend_from_within(..);
    }
    Some(dashes)
}

fn parse_display(input: &str) -> Option<Display> {
    match input {
        "inline" => Some(Display::Inline),
        "block" => Some(Display::Block),
        "none" => Some(Display::None),
        v if !v.is_empty()
            && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            Some(Display::Other)
        }
        _ => None,
    }
}
