use std::collections::HashSet;

use crate::debug::DebugLogger;
use crate::document::{Document, Element, ElementKind, NodeId};
use crate::flatten::{FlattenedPath, Flattener};
use crate::paint_server::{PaintContext, ResolvedPaint, resolve_paint_server};
use crate::path::shape_path;
use crate::selector::SelectorMatcher;
use crate::style::{ComputedStyle, Paint, StyleResolver, parse_length};
use crate::transform::{Transform, parse_transform_list};
use crate::types::{Rect, Size};

pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 32;
pub const DEFAULT_MAX_REFERENCE_EXPANSIONS: usize = 10_000;

/// Size used when the root element specifies neither a size nor a viewBox.
const FALLBACK_SIZE: Size = Size {
    width: 300.0,
    height: 150.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Device viewport; the document's intrinsic size when `None`.
    pub viewport: Option<Size>,
    /// Applied outside the root viewBox mapping.
    pub base_transform: Transform,
    pub flattener: Flattener,
    pub max_reference_depth: usize,
    /// Total references one build may expand, across all branches.
    pub max_reference_expansions: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: None,
            base_transform: Transform::identity(),
            flattener: Flattener::default(),
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
            max_reference_expansions: DEFAULT_MAX_REFERENCE_EXPANSIONS,
        }
    }
}

/// One rendered element with everything resolved into device space.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub source: NodeId,
    pub kind: ElementKind,
    /// Cumulative user-to-device transform.
    pub transform: Transform,
    pub style: ComputedStyle,
    pub geometry: Option<FlattenedPath>,
    pub fill: Option<ResolvedPaint>,
    pub stroke: Option<ResolvedPaint>,
    /// Product of `opacity` along the ancestor chain, this node included.
    pub opacity: f64,
    pub clip: Option<Box<RenderNode>>,
    pub mask: Option<Box<RenderNode>>,
    pub children: Vec<RenderNode>,
    /// Device bounds of the geometry of this node and its descendants.
    pub bounds: Option<Rect>,
}

impl RenderNode {
    fn new(
        source: NodeId,
        kind: ElementKind,
        transform: Transform,
        style: ComputedStyle,
        opacity: f64,
    ) -> Self {
        Self {
            source,
            kind,
            transform,
            style,
            geometry: None,
            fill: None,
            stroke: None,
            opacity,
            clip: None,
            mask: None,
            children: Vec::new(),
            bounds: None,
        }
    }

    /// Depth-first iterator over this node and its children (not clip or mask content).
    pub fn descendants(&self) -> impl Iterator<Item = &RenderNode> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildStats {
    pub nodes: u64,
    pub shapes: u64,
    pub references: u64,
    pub unresolved: u64,
    pub cycles: u64,
    pub depth_limited: u64,
    pub budget_exhausted: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTree {
    pub root: Option<RenderNode>,
    pub viewport: Size,
    pub stats: BuildStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    Cycle,
    TooDeep,
    OverBudget,
}

/// Elements being resolved on the current branch of the build.
///
/// Every element on the traversal path is present. References go through
/// [`ReferenceGuard::enter`], which refuses an element that is already
/// active, caps how many references can nest and bounds the total number of
/// expansions so fan-out through repeated references stays linear.
#[derive(Debug)]
pub struct ReferenceGuard {
    active: HashSet<NodeId>,
    references: Vec<NodeId>,
    max_depth: usize,
    max_expansions: usize,
    expansions: usize,
    cycles: u64,
    depth_limited: u64,
    budget_exhausted: u64,
}

impl ReferenceGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            active: HashSet::new(),
            references: Vec::new(),
            max_depth,
            max_expansions: usize::MAX,
            expansions: 0,
            cycles: 0,
            depth_limited: 0,
            budget_exhausted: 0,
        }
    }

    pub fn with_expansion_limit(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    pub fn enter(&mut self, node: NodeId) -> Result<(), Blocked> {
        if self.active.contains(&node) {
            self.cycles += 1;
            return Err(Blocked::Cycle);
        }
        if self.references.len() >= self.max_depth {
            self.depth_limited += 1;
            return Err(Blocked::TooDeep);
        }
        if self.expansions >= self.max_expansions {
            self.budget_exhausted += 1;
            return Err(Blocked::OverBudget);
        }
        self.expansions += 1;
        self.active.insert(node);
        self.references.push(node);
        Ok(())
    }

    pub fn leave(&mut self, node: NodeId) {
        if self.references.last() == Some(&node) {
            self.references.pop();
        }
        self.active.remove(&node);
    }

    /// Marks a traversed element active; false if it already was.
    fn visit(&mut self, node: NodeId) -> bool {
        self.active.insert(node)
    }

    fn unvisit(&mut self, node: NodeId) {
        self.active.remove(&node);
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.references.is_empty()
    }
}

pub(crate) fn log_blocked(
    debug: Option<&DebugLogger>,
    document: &Document,
    node: NodeId,
    blocked: Blocked,
) {
    let Some(debug) = debug else {
        return;
    };
    let id = document.element(node).id().unwrap_or("");
    let kind = match blocked {
        Blocked::Cycle => "render.reference_cycle",
        Blocked::TooDeep => "render.reference_depth",
        Blocked::OverBudget => "render.reference_budget",
    };
    debug.log_event(kind, &[("id", id)]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside a clipPath: only shapes and `use` of shapes contribute.
    Clip,
}

/// Builds the render tree for `document`. Never fails: bad values fall back
/// to defaults and unresolvable references are treated as absent.
pub fn build_render_tree(
    document: &Document,
    matcher: &dyn SelectorMatcher,
    options: &RenderOptions,
    debug: Option<&DebugLogger>,
) -> RenderTree {
    let viewport = options.viewport.unwrap_or_else(|| intrinsic_size(document));
    let mut builder = Builder {
        document,
        styles: StyleResolver::new(document, matcher, debug),
        options,
        debug,
        guard: ReferenceGuard::new(options.max_reference_depth)
            .with_expansion_limit(options.max_reference_expansions),
        stats: BuildStats::default(),
    };
    let root = builder.build_root(viewport);
    let mut stats = builder.stats;
    stats.cycles = builder.guard.cycles;
    stats.depth_limited = builder.guard.depth_limited;
    stats.budget_exhausted = builder.guard.budget_exhausted;

    if let Some(debug) = debug {
        debug.log_json(&format!(
            "{{\"type\":\"render.summary\",\"nodes\":{},\"shapes\":{},\"references\":{},\"unresolved\":{},\"cycles\":{},\"depth_limited\":{},\"budget_exhausted\":{}}}",
            stats.nodes,
            stats.shapes,
            stats.references,
            stats.unresolved,
            stats.cycles,
            stats.depth_limited,
            stats.budget_exhausted
        ));
    }

    RenderTree {
        root,
        viewport,
        stats,
    }
}

/// Root size from `width`/`height`, falling back to the viewBox size.
pub fn intrinsic_size(document: &Document) -> Size {
    let Some(root) = document.root() else {
        return FALLBACK_SIZE;
    };
    let el = document.element(root);
    let view_box = parse_viewbox(el.attribute("viewBox"));
    let width = el
        .attribute("width")
        .and_then(parse_length)
        .filter(|w| *w > 0.0)
        .or(view_box.map(|vb| vb.width))
        .unwrap_or(FALLBACK_SIZE.width);
    let height = el
        .attribute("height")
        .and_then(parse_length)
        .filter(|h| *h > 0.0)
        .or(view_box.map(|vb| vb.height))
        .unwrap_or(FALLBACK_SIZE.height);
    Size::new(width, height)
}

pub fn parse_viewbox(view_box: Option<&str>) -> Option<Rect> {
    let mut it = view_box?
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok());
    let min_x = it.next()??;
    let min_y = it.next()??;
    let w = it.next()??;
    let h = it.next()??;
    if it.next().is_some() || w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(Rect::new(min_x, min_y, w, h))
}

/// Maps `view_box` onto a `w` x `h` viewport, centred and uniformly scaled to
/// fit (`xMidYMid meet`), or stretched when `preserveAspectRatio="none"`.
pub fn viewbox_transform(view_box: Rect, w: f64, h: f64, aspect: Option<&str>) -> Transform {
    let sx = w / view_box.width;
    let sy = h / view_box.height;
    if aspect.map(str::trim) == Some("none") {
        return Transform::new(sx, 0.0, 0.0, sy, -view_box.x * sx, -view_box.y * sy);
    }
    let s = sx.min(sy);
    let tx = (w - view_box.width * s) * 0.5 - view_box.x * s;
    let ty = (h - view_box.height * s) * 0.5 - view_box.y * s;
    Transform::from_translate(tx, ty) * Transform::from_scale(s, s)
}

fn bbox_transform(bbox: Rect) -> Transform {
    Transform::new(bbox.width, 0.0, 0.0, bbox.height, bbox.x, bbox.y)
}

fn union_bounds(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, None) => a,
        (None, b) => b,
    }
}

struct Builder<'a> {
    document: &'a Document,
    styles: StyleResolver<'a>,
    options: &'a RenderOptions,
    debug: Option<&'a DebugLogger>,
    guard: ReferenceGuard,
    stats: BuildStats,
}

impl<'a> Builder<'a> {
    fn build_root(&mut self, viewport: Size) -> Option<RenderNode> {
        let root = self.document.root()?;
        let el = self.document.element(root);
        let mut transform = self.options.base_transform;
        let mut user_viewport = viewport;
        if el.kind == ElementKind::Svg {
            if let Some(vb) = parse_viewbox(el.attribute("viewBox")) {
                transform = transform
                    * viewbox_transform(
                        vb,
                        viewport.width,
                        viewport.height,
                        el.attribute("preserveAspectRatio"),
                    );
                user_viewport = Size::new(vb.width, vb.height);
            }
        }
        self.build_element(root, None, transform, 1.0, user_viewport, Mode::Normal)
    }

    fn build_element(
        &mut self,
        node: NodeId,
        parent_style: Option<&ComputedStyle>,
        parent_transform: Transform,
        parent_opacity: f64,
        viewport: Size,
        mode: Mode,
    ) -> Option<RenderNode> {
        let kind = self.document.element(node).kind;
        match (mode, kind) {
            (_, ElementKind::Ignored) => return None,
            (Mode::Normal, k) if k.is_reference_only() => return None,
            (Mode::Clip, k) if !k.is_shape() && k != ElementKind::Use => return None,
            _ => {}
        }

        let fresh = self.guard.visit(node);
        let out = self.build_active(
            node,
            parent_style,
            parent_transform,
            parent_opacity,
            viewport,
            mode,
        );
        if fresh {
            self.guard.unvisit(node);
        }
        out
    }

    fn build_active(
        &mut self,
        node: NodeId,
        parent_style: Option<&ComputedStyle>,
        parent_transform: Transform,
        parent_opacity: f64,
        mut viewport: Size,
        mode: Mode,
    ) -> Option<RenderNode> {
        let document = self.document;
        let el = document.element(node);
        let style = self.styles.compute(node, parent_style);
        if !style.is_displayed() || (mode == Mode::Clip && !style.is_visible()) {
            return None;
        }
        self.stats.nodes += 1;

        let mut transform = parent_transform * self.local_transform(el);
        let opacity = match mode {
            Mode::Normal => parent_opacity * style.opacity,
            Mode::Clip => 1.0,
        };

        let mut geometry = None;
        let mut user_bbox = None;
        let mut children = Vec::new();
        match el.kind {
            k if k.is_shape() => {
                if let Some(path) = shape_path(el) {
                    let flattener = self.options.flattener;
                    user_bbox = flattener.flatten(&path, &Transform::identity()).bounds();
                    let flat = flattener.flatten(&path, &transform);
                    if !flat.is_empty() {
                        self.stats.shapes += 1;
                        geometry = Some(flat);
                    }
                }
            }
            ElementKind::Use => {
                let x = el.attribute("x").and_then(parse_length).unwrap_or(0.0);
                let y = el.attribute("y").and_then(parse_length).unwrap_or(0.0);
                transform = transform * Transform::from_translate(x, y);
                if let Some(child) =
                    self.build_use_target(el, &style, transform, opacity, viewport, mode)
                {
                    children.push(child);
                }
            }
            k if k.is_container() => {
                if el.kind == ElementKind::Svg && Some(node) != document.root() {
                    let x = el.attribute("x").and_then(parse_length).unwrap_or(0.0);
                    let y = el.attribute("y").and_then(parse_length).unwrap_or(0.0);
                    transform = transform * Transform::from_translate(x, y);
                    let w = el.attribute("width").and_then(parse_length);
                    let h = el.attribute("height").and_then(parse_length);
                    if let Some((t, vp)) = nested_viewport(el, w, h) {
                        transform = transform * t;
                        viewport = vp;
                    }
                }
                children = self.build_children(node, &style, transform, opacity, viewport, mode);
            }
            _ => {}
        }

        let mut out = RenderNode::new(node, el.kind, transform, style, opacity);
        let child_bounds = children
            .iter()
            .fold(None, |acc, c: &RenderNode| union_bounds(acc, c.bounds));
        out.bounds = union_bounds(geometry.as_ref().and_then(|g| g.bounds()), child_bounds);

        if mode == Mode::Normal && geometry.is_some() && out.style.is_visible() {
            let ctx = PaintContext {
                document,
                styles: &self.styles,
                debug: self.debug,
                bbox: user_bbox,
                viewport,
                transform,
            };
            out.fill = resolve_paint(
                &ctx,
                &mut self.guard,
                &mut self.stats,
                &out.style.fill,
                out.style.fill_opacity * opacity,
            );
            if out.style.stroke_width > 0.0 {
                out.stroke = resolve_paint(
                    &ctx,
                    &mut self.guard,
                    &mut self.stats,
                    &out.style.stroke,
                    out.style.stroke_opacity * opacity,
                );
            }
        }
        out.geometry = geometry;
        out.children = children;

        // Containers have no geometry of their own; approximate their user
        // bounding box from the device bounds of their content.
        let ref_bbox = user_bbox.or_else(|| {
            let inverse = transform.try_inverted()?;
            out.bounds.map(|b| inverse.map_rect(&b))
        });
        if let Some(id) = out.style.clip_path.clone() {
            out.clip = self.resolve_clip(&id, transform, ref_bbox, viewport);
        }
        if mode == Mode::Normal {
            if let Some(id) = out.style.mask.clone() {
                out.mask = self.resolve_mask(&id, transform, ref_bbox, viewport);
            }
        }
        Some(out)
    }

    fn build_children(
        &mut self,
        node: NodeId,
        style: &ComputedStyle,
        transform: Transform,
        opacity: f64,
        viewport: Size,
        mode: Mode,
    ) -> Vec<RenderNode> {
        let document = self.document;
        document
            .element(node)
            .children()
            .iter()
            .filter_map(|child| {
                self.build_element(*child, Some(style), transform, opacity, viewport, mode)
            })
            .collect()
    }

    fn local_transform(&self, el: &Element) -> Transform {
        let Some(raw) = el.attribute("transform") else {
            return Transform::identity();
        };
        parse_transform_list(raw).unwrap_or_else(|| {
            self.log("render.invalid_transform", &[("tag", &el.tag), ("value", raw)]);
            Transform::identity()
        })
    }

    fn build_use_target(
        &mut self,
        use_el: &Element,
        use_style: &ComputedStyle,
        transform: Transform,
        opacity: f64,
        viewport: Size,
        mode: Mode,
    ) -> Option<RenderNode> {
        let target = self.lookup(use_el.href_id()?, "href")?;
        if let Err(blocked) = self.guard.enter(target) {
            log_blocked(self.debug, self.document, target, blocked);
            return None;
        }
        self.stats.references += 1;
        let out = match (mode, self.document.element(target).kind) {
            (Mode::Normal, ElementKind::Symbol) => {
                self.build_symbol_instance(target, use_el, use_style, transform, opacity)
            }
            _ => self.build_element(target, Some(use_style), transform, opacity, viewport, mode),
        };
        self.guard.leave(target);
        out
    }

    fn build_symbol_instance(
        &mut self,
        symbol: NodeId,
        use_el: &Element,
        use_style: &ComputedStyle,
        transform: Transform,
        opacity: f64,
    ) -> Option<RenderNode> {
        let el = self.document.element(symbol);
        let style = self.styles.compute(symbol, Some(use_style));
        self.stats.nodes += 1;
        let opacity = opacity * style.opacity;

        let size = |name: &str| {
            use_el
                .attribute(name)
                .or_else(|| el.attribute(name))
                .and_then(parse_length)
        };
        let mut transform = transform;
        let mut viewport = Size::new(0.0, 0.0);
        if let Some((t, vp)) = nested_viewport(el, size("width"), size("height")) {
            transform = transform * t;
            viewport = vp;
        }
        if viewport.width <= 0.0 {
            viewport = size("width")
                .zip(size("height"))
                .map(|(w, h)| Size::new(w, h))
                .unwrap_or(FALLBACK_SIZE);
        }

        let children = self.build_children(symbol, &style, transform, opacity, viewport, Mode::Normal);
        let mut out = RenderNode::new(symbol, ElementKind::Symbol, transform, style, opacity);
        out.bounds = children
            .iter()
            .fold(None, |acc, c: &RenderNode| union_bounds(acc, c.bounds));
        out.children = children;
        Some(out)
    }

    fn resolve_clip(
        &mut self,
        id: &str,
        transform: Transform,
        bbox: Option<Rect>,
        viewport: Size,
    ) -> Option<Box<RenderNode>> {
        let target = self.lookup(id, "clip-path")?;
        let el = self.document.element(target);
        if el.kind != ElementKind::ClipPath {
            self.unresolved(id, "clip-path");
            return None;
        }
        if let Err(blocked) = self.guard.enter(target) {
            log_blocked(self.debug, self.document, target, blocked);
            return None;
        }
        self.stats.references += 1;

        let style = self.styles.compute_with_ancestors(target);
        let mut clip_transform = transform * self.local_transform(el);
        let object_units = el.attribute("clipPathUnits").map(str::trim) == Some("objectBoundingBox");
        let usable_bbox = bbox.filter(|b| !b.is_empty());
        let mut children = Vec::new();
        // An objectBoundingBox clip on an empty box clips everything away.
        if !object_units || usable_bbox.is_some() {
            if let Some(b) = usable_bbox.filter(|_| object_units) {
                clip_transform = clip_transform * bbox_transform(b);
            }
            children =
                self.build_children(target, &style, clip_transform, 1.0, viewport, Mode::Clip);
        }

        let nested = style
            .clip_path
            .clone()
            .and_then(|inner| self.resolve_clip(&inner, transform, bbox, viewport));
        self.guard.leave(target);

        let mut out = RenderNode::new(target, ElementKind::ClipPath, clip_transform, style, 1.0);
        out.bounds = children
            .iter()
            .fold(None, |acc, c: &RenderNode| union_bounds(acc, c.bounds));
        out.children = children;
        out.clip = nested;
        Some(Box::new(out))
    }

    fn resolve_mask(
        &mut self,
        id: &str,
        transform: Transform,
        bbox: Option<Rect>,
        viewport: Size,
    ) -> Option<Box<RenderNode>> {
        let target = self.lookup(id, "mask")?;
        let el = self.document.element(target);
        if el.kind != ElementKind::Mask {
            self.unresolved(id, "mask");
            return None;
        }
        if let Err(blocked) = self.guard.enter(target) {
            log_blocked(self.debug, self.document, target, blocked);
            return None;
        }
        self.stats.references += 1;

        let style = self.styles.compute_with_ancestors(target);
        let mut mask_transform = transform;
        let mut children = Vec::new();
        let object_units =
            el.attribute("maskContentUnits").map(str::trim) == Some("objectBoundingBox");
        let usable_bbox = bbox.filter(|b| !b.is_empty());
        if !object_units || usable_bbox.is_some() {
            if let Some(b) = usable_bbox.filter(|_| object_units) {
                mask_transform = mask_transform * bbox_transform(b);
            }
            children =
                self.build_children(target, &style, mask_transform, 1.0, viewport, Mode::Normal);
        }
        self.guard.leave(target);

        let mut out = RenderNode::new(target, ElementKind::Mask, mask_transform, style, 1.0);
        out.bounds = children
            .iter()
            .fold(None, |acc, c: &RenderNode| union_bounds(acc, c.bounds));
        out.children = children;
        Some(Box::new(out))
    }

    fn lookup(&mut self, id: &str, property: &str) -> Option<NodeId> {
        let found = self.document.lookup_by_id(id);
        if found.is_none() {
            self.unresolved(id, property);
        }
        found
    }

    fn unresolved(&mut self, id: &str, property: &str) {
        self.stats.unresolved += 1;
        self.log(
            "render.unresolved_reference",
            &[("id", id), ("property", property)],
        );
    }

    fn log(&self, kind: &str, fields: &[(&str, &str)]) {
        if let Some(debug) = self.debug {
            debug.log_event(kind, fields);
        }
    }
}

/// viewBox mapping for a nested viewport of the given size. `None` when
/// either the viewBox or the size is missing.
fn nested_viewport(el: &Element, w: Option<f64>, h: Option<f64>) -> Option<(Transform, Size)> {
    let vb = parse_viewbox(el.attribute("viewBox"))?;
    let (w, h) = (w.filter(|v| *v > 0.0)?, h.filter(|v| *v > 0.0)?);
    Some((
        viewbox_transform(vb, w, h, el.attribute("preserveAspectRatio")),
        Size::new(vb.width, vb.height),
    ))
}

fn resolve_paint(
    ctx: &PaintContext<'_>,
    guard: &mut ReferenceGuard,
    stats: &mut BuildStats,
    paint: &Paint,
    alpha: f64,
) -> Option<ResolvedPaint> {
    let resolved = match paint {
        Paint::None => None,
        Paint::Color(c) => Some(ResolvedPaint::Solid(*c)),
        // Resolved during the cascade; treated as no paint if it ever gets here.
        Paint::CurrentColor => None,
        Paint::Url { id, fallback } => {
            let server = ctx
                .document
                .lookup_by_id(id)
                .filter(|n| ctx.document.element(*n).kind.is_gradient());
            match server {
                Some(node) => {
                    stats.references += 1;
                    resolve_paint_server(ctx, node, guard)
                }
                None => {
                    stats.unresolved += 1;
                    if let Some(debug) = ctx.debug {
                        debug.log_event(
                            "render.unresolved_reference",
                            &[("id", id), ("property", "paint")],
                        );
                    }
                    match fallback.as_deref() {
                        Some(Paint::Color(c)) => Some(ResolvedPaint::Solid(*c)),
                        _ => None,
                    }
                }
            }
        }
    };
    resolved.map(|p| p.with_opacity(alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SimpleSelectorMatcher;
    use crate::types::Color;
    use crate::xml::parse_document;

    fn build(svg: &str) -> RenderTree {
        let doc = parse_document(svg, None).expect("document");
        build_render_tree(&doc, &SimpleSelectorMatcher, &RenderOptions::default(), None)
    }

    fn shapes(tree: &RenderTree) -> Vec<&RenderNode> {
        tree.root
            .iter()
            .flat_map(|r| r.descendants())
            .filter(|n| n.geometry.is_some())
            .collect()
    }

    #[test]
    fn mutually_referencing_uses_terminate_empty() {
        let tree = build(
            r##"<svg>
                <use id="u1" href="#u2"/>
                <use id="u2" href="#u1"/>
            </svg>"##,
        );
        assert!(shapes(&tree).is_empty());
        assert_eq!(tree.stats.cycles, 2);
    }

    #[test]
    fn use_of_own_ancestor_is_a_cycle() {
        let tree = build(
            r##"<svg>
                <g id="g"><rect width="1" height="1"/><use href="#g"/></g>
            </svg>"##,
        );
        assert_eq!(shapes(&tree).len(), 1);
        assert_eq!(tree.stats.cycles, 1);
    }

    #[test]
    fn reference_depth_is_capped() {
        let mut svg = String::from("<svg><rect id=\"r0\" width=\"1\" height=\"1\"/>");
        for i in 1..=40 {
            svg.push_str(&format!("<use id=\"r{i}\" href=\"#r{}\"/>", i - 1));
        }
        svg.push_str("</svg>");
        let doc = parse_document(&svg, None).expect("document");
        let options = RenderOptions {
            max_reference_depth: 4,
            ..RenderOptions::default()
        };
        let tree = build_render_tree(&doc, &SimpleSelectorMatcher, &options, None);
        // r0..r4 reach the rect; deeper chains stop at the cap.
        assert_eq!(shapes(&tree).len(), 5);
        assert!(tree.stats.depth_limited > 0);
    }

    #[test]
    fn repeated_references_share_one_expansion_budget() {
        let mut svg = String::from("<svg><defs><rect id=\"a0\" width=\"1\" height=\"1\"/>");
        for i in 1..=30 {
            svg.push_str(&format!(
                "<g id=\"a{i}\"><use href=\"#a{p}\"/><use href=\"#a{p}\"/></g>",
                p = i - 1
            ));
        }
        svg.push_str("</defs><use href=\"#a30\"/></svg>");
        let doc = parse_document(&svg, None).expect("document");

        let tree = build_render_tree(&doc, &SimpleSelectorMatcher, &RenderOptions::default(), None);
        assert!(tree.stats.budget_exhausted > 0);
        assert!(tree.stats.references <= DEFAULT_MAX_REFERENCE_EXPANSIONS as u64);
        assert!(tree.stats.nodes < 4 * DEFAULT_MAX_REFERENCE_EXPANSIONS as u64);

        let options = RenderOptions {
            max_reference_expansions: 10,
            ..RenderOptions::default()
        };
        let tree = build_render_tree(&doc, &SimpleSelectorMatcher, &options, None);
        assert_eq!(tree.stats.references, 10);
        assert!(shapes(&tree).len() <= 10);
    }

    #[test]
    fn cumulative_transform_composes_parent_first() {
        let tree = build(
            r##"<svg>
                <g transform="translate(10 0)">
                  <rect transform="scale(2)" width="1" height="1"/>
                </g>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        assert_eq!(rect.transform.map_point(crate::types::Point::new(1.0, 1.0)).x, 12.0);
        assert_eq!(rect.bounds, Some(Rect::new(10.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn root_viewbox_maps_onto_viewport() {
        let doc = parse_document(
            r##"<svg viewBox="0 0 10 10"><rect width="10" height="10"/></svg>"##,
            None,
        )
        .expect("document");
        let options = RenderOptions {
            viewport: Some(Size::new(200.0, 100.0)),
            ..RenderOptions::default()
        };
        let tree = build_render_tree(&doc, &SimpleSelectorMatcher, &options, None);
        let rect = shapes(&tree)[0];
        assert_eq!(rect.bounds, Some(Rect::new(50.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn display_none_drops_subtree_and_hidden_keeps_children() {
        let tree = build(
            r##"<svg>
                <g display="none"><rect width="1" height="1"/></g>
                <g visibility="hidden">
                  <rect id="hidden" width="1" height="1"/>
                  <rect id="shown" visibility="visible" width="1" height="1"/>
                </g>
            </svg>"##,
        );
        let s = shapes(&tree);
        assert_eq!(s.len(), 2);
        assert!(s[0].fill.is_none());
        assert!(s[1].fill.is_some());
    }

    #[test]
    fn opacity_multiplies_down_the_tree() {
        let tree = build(
            r##"<svg>
                <g opacity="0.5"><rect opacity="0.5" fill-opacity="0.5" fill="red" width="1" height="1"/></g>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        assert_eq!(rect.opacity, 0.25);
        assert_eq!(
            rect.fill,
            Some(ResolvedPaint::Solid(Color::rgba(1.0, 0.0, 0.0, 0.125)))
        );
    }

    #[test]
    fn missing_paint_server_uses_fallback() {
        let tree = build(
            r##"<svg>
                <rect fill="url(#nope) blue" stroke="url(#nope)" width="1" height="1"/>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        assert_eq!(rect.fill, Some(ResolvedPaint::Solid(Color::rgb(0.0, 0.0, 1.0))));
        assert!(rect.stroke.is_none());
        assert_eq!(tree.stats.unresolved, 2);
    }

    #[test]
    fn use_inherits_style_and_translates() {
        let tree = build(
            r##"<svg>
                <defs><rect id="r" width="2" height="2"/></defs>
                <use href="#r" x="5" y="6" fill="lime"/>
            </svg>"##,
        );
        let s = shapes(&tree);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].bounds, Some(Rect::new(5.0, 6.0, 2.0, 2.0)));
        assert_eq!(s[0].fill, Some(ResolvedPaint::Solid(Color::rgb(0.0, 1.0, 0.0))));
    }

    #[test]
    fn symbol_viewbox_maps_into_use_size() {
        let tree = build(
            r##"<svg>
                <symbol id="s" viewBox="0 0 1 1"><rect width="1" height="1"/></symbol>
                <use href="#s" width="10" height="10"/>
            </svg>"##,
        );
        let s = shapes(&tree);
        assert_eq!(s[0].bounds, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn clip_paths_nest_and_stop_on_cycles() {
        let tree = build(
            r##"<svg>
                <clipPath id="a" clip-path="url(#b)"><rect width="5" height="5"/></clipPath>
                <clipPath id="b" clip-path="url(#a)"><circle r="3"/></clipPath>
                <rect clip-path="url(#a)" width="10" height="10"/>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        let clip = rect.clip.as_ref().expect("clip");
        assert_eq!(clip.children.len(), 1);
        let inner = clip.clip.as_ref().expect("nested clip");
        assert_eq!(inner.kind, ElementKind::ClipPath);
        assert!(inner.clip.is_none());
        assert_eq!(tree.stats.cycles, 1);
    }

    #[test]
    fn clip_path_ignores_groups_and_uses_bbox_units() {
        let tree = build(
            r##"<svg>
                <clipPath id="c" clipPathUnits="objectBoundingBox">
                  <g><rect width="1" height="1"/></g>
                  <rect width="0.5" height="1"/>
                </clipPath>
                <rect clip-path="url(#c)" x="10" y="10" width="20" height="10"/>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        let clip = rect.clip.as_ref().expect("clip");
        assert_eq!(clip.children.len(), 1);
        assert_eq!(clip.children[0].bounds, Some(Rect::new(10.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn mask_content_is_built_as_a_group() {
        let tree = build(
            r##"<svg>
                <mask id="m"><rect width="4" height="4" fill="white"/></mask>
                <rect mask="url(#m)" width="10" height="10"/>
            </svg>"##,
        );
        let rect = shapes(&tree)[0];
        let mask = rect.mask.as_ref().expect("mask");
        assert_eq!(mask.children.len(), 1);
        assert!(mask.children[0].fill.is_some());
    }

    #[test]
    fn intrinsic_size_prefers_attributes() {
        let doc = parse_document(r##"<svg width="1in" viewBox="0 0 10 20"/>"##, None)
            .expect("document");
        assert_eq!(intrinsic_size(&doc), Size::new(96.0, 20.0));
        let empty = Document::default();
        assert_eq!(intrinsic_size(&empty), FALLBACK_SIZE);
    }
}
