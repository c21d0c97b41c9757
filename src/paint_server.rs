use crate::debug::DebugLogger;
use crate::document::{Document, ElementKind, NodeId};
use crate::render::{ReferenceGuard, log_blocked};
use crate::style::{StyleResolver, parse_number};
use crate::transform::{Transform, parse_transform_list};
use crate::types::{Color, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradientUnits {
    #[default]
    ObjectBoundingBox,
    UserSpaceOnUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpreadMethod {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    /// Stop colour with `stop-opacity` folded into alpha.
    pub color: Color,
}

/// Gradient geometry in gradient space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientGeometry {
    Linear {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Radial {
        cx: f64,
        cy: f64,
        r: f64,
        fx: f64,
        fy: f64,
    },
}

/// A resolved gradient. `transform` maps gradient space to device space.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintServer {
    pub geometry: GradientGeometry,
    pub spread: SpreadMethod,
    pub transform: Transform,
    pub stops: Vec<GradientStop>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPaint {
    Solid(Color),
    Server(PaintServer),
}

impl ResolvedPaint {
    /// Multiplies `opacity` into every colour's alpha.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        match self {
            ResolvedPaint::Solid(c) => ResolvedPaint::Solid(c.with_alpha(c.a * opacity)),
            ResolvedPaint::Server(mut server) => {
                for stop in &mut server.stops {
                    stop.color = stop.color.with_alpha(stop.color.a * opacity);
                }
                ResolvedPaint::Server(server)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coord {
    value: f64,
    percent: bool,
}

impl Coord {
    const fn pct(fraction: f64) -> Self {
        Self {
            value: fraction,
            percent: true,
        }
    }

    fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        match s.strip_suffix('%') {
            Some(p) => Some(Self::pct(parse_number(p)? / 100.0)),
            None => Some(Self {
                value: crate::style::parse_length(s)?,
                percent: false,
            }),
        }
    }

    /// Numbers are fractions in bounding-box units; percentages are relative
    /// to `extent` in user space.
    fn resolve(self, units: GradientUnits, extent: f64) -> f64 {
        match (units, self.percent) {
            (GradientUnits::UserSpaceOnUse, true) => self.value * extent,
            _ => self.value,
        }
    }
}

/// Attributes gathered along an `href` chain; the first element that
/// specifies an attribute wins.
#[derive(Debug, Default)]
struct GradientAttributes {
    units: Option<GradientUnits>,
    transform: Option<Transform>,
    spread: Option<SpreadMethod>,
    x1: Option<Coord>,
    y1: Option<Coord>,
    x2: Option<Coord>,
    y2: Option<Coord>,
    cx: Option<Coord>,
    cy: Option<Coord>,
    r: Option<Coord>,
    fx: Option<Coord>,
    fy: Option<Coord>,
    stops_from: Option<NodeId>,
}

/// Resolution context for paint servers of one painted element.
pub struct PaintContext<'a> {
    pub document: &'a Document,
    pub styles: &'a StyleResolver<'a>,
    pub debug: Option<&'a DebugLogger>,
    /// Untransformed bounds of the painted geometry.
    pub bbox: Option<Rect>,
    /// Nearest viewport size, for user-space percentages.
    pub viewport: Size,
    /// User space of the painted element to device space.
    pub transform: Transform,
}

/// Resolves the gradient `node` into a paint. `None` means no paint: the
/// server has no stops, a bounding box is required but empty, or the server
/// is already being resolved on this branch.
pub fn resolve_paint_server(
    ctx: &PaintContext<'_>,
    node: NodeId,
    guard: &mut ReferenceGuard,
) -> Option<ResolvedPaint> {
    let kind = ctx.document.element(node).kind;
    if !kind.is_gradient() {
        return None;
    }

    let attrs = collect_attributes(ctx, node, kind, guard)?;
    let stops = attrs
        .stops_from
        .map(|g| collect_stops(ctx, g))
        .unwrap_or_default();
    match stops.as_slice() {
        [] => return None,
        [only] => return Some(ResolvedPaint::Solid(only.color)),
        _ => {}
    }

    let units = attrs.units.unwrap_or_default();
    let (w, h) = (ctx.viewport.width, ctx.viewport.height);
    let diagonal = libm::sqrt(w * w + h * h) / std::f64::consts::SQRT_2;

    let mut to_user = Transform::identity();
    if units == GradientUnits::ObjectBoundingBox {
        let bbox = ctx.bbox.filter(|b| !b.is_empty())?;
        to_user = Transform::new(bbox.width, 0.0, 0.0, bbox.height, bbox.x, bbox.y);
    }
    let transform = ctx.transform * to_user * attrs.transform.unwrap_or_default();

    let last = stops[stops.len() - 1].color;
    let geometry = match kind {
        ElementKind::LinearGradient => {
            let x1 = attrs.x1.unwrap_or(Coord::pct(0.0)).resolve(units, w);
            let y1 = attrs.y1.unwrap_or(Coord::pct(0.0)).resolve(units, h);
            let x2 = attrs.x2.unwrap_or(Coord::pct(1.0)).resolve(units, w);
            let y2 = attrs.y2.unwrap_or(Coord::pct(0.0)).resolve(units, h);
            if x1 == x2 && y1 == y2 {
                return Some(ResolvedPaint::Solid(last));
            }
            GradientGeometry::Linear { x1, y1, x2, y2 }
        }
        _ => {
            let cx = attrs.cx.unwrap_or(Coord::pct(0.5));
            let cy = attrs.cy.unwrap_or(Coord::pct(0.5));
            let r = attrs.r.unwrap_or(Coord::pct(0.5)).resolve(units, diagonal);
            if r < 0.0 {
                return None;
            }
            if r == 0.0 {
                return Some(ResolvedPaint::Solid(last));
            }
            GradientGeometry::Radial {
                cx: cx.resolve(units, w),
                cy: cy.resolve(units, h),
                r,
                fx: attrs.fx.unwrap_or(cx).resolve(units, w),
                fy: attrs.fy.unwrap_or(cy).resolve(units, h),
            }
        }
    };

    Some(ResolvedPaint::Server(PaintServer {
        geometry,
        spread: attrs.spread.unwrap_or_default(),
        transform,
        stops,
    }))
}

fn collect_attributes(
    ctx: &PaintContext<'_>,
    node: NodeId,
    kind: ElementKind,
    guard: &mut ReferenceGuard,
) -> Option<GradientAttributes> {
    if let Err(blocked) = guard.enter(node) {
        log_blocked(ctx.debug, ctx.document, node, blocked);
        return None;
    }

    let mut attrs = GradientAttributes::default();
    let mut chain = vec![node];
    let mut current = node;
    loop {
        let el = ctx.document.element(current);
        let get = |name: &str| el.attribute(name);
        fill(&mut attrs.units, get("gradientUnits").and_then(|v| match v.trim() {
            "userSpaceOnUse" => Some(GradientUnits::UserSpaceOnUse),
            "objectBoundingBox" => Some(GradientUnits::ObjectBoundingBox),
            _ => None,
        }));
        fill(
            &mut attrs.transform,
            get("gradientTransform").and_then(parse_transform_list),
        );
        fill(&mut attrs.spread, get("spreadMethod").and_then(|v| match v.trim() {
            "pad" => Some(SpreadMethod::Pad),
            "reflect" => Some(SpreadMethod::Reflect),
            "repeat" => Some(SpreadMethod::Repeat),
            _ => None,
        }));
        // Geometry only carries over between gradients of the same type.
        if el.kind == kind {
            let coord = |name: &str| get(name).and_then(Coord::parse);
            if kind == ElementKind::LinearGradient {
                fill(&mut attrs.x1, coord("x1"));
                fill(&mut attrs.y1, coord("y1"));
                fill(&mut attrs.x2, coord("x2"));
                fill(&mut attrs.y2, coord("y2"));
            } else {
                fill(&mut attrs.cx, coord("cx"));
                fill(&mut attrs.cy, coord("cy"));
                fill(&mut attrs.r, coord("r"));
                fill(&mut attrs.fx, coord("fx"));
                fill(&mut attrs.fy, coord("fy"));
            }
        }
        if attrs.stops_from.is_none()
            && el
                .children()
                .iter()
                .any(|c| ctx.document.element(*c).kind == ElementKind::Stop)
        {
            attrs.stops_from = Some(current);
        }

        let Some(next) = el.href_id().and_then(|id| ctx.document.lookup_by_id(id)) else {
            break;
        };
        if !ctx.document.element(next).kind.is_gradient() {
            break;
        }
        match guard.enter(next) {
            Ok(()) => {
                chain.push(next);
                current = next;
            }
            Err(blocked) => {
                log_blocked(ctx.debug, ctx.document, next, blocked);
                break;
            }
        }
    }

    for id in chain.into_iter().rev() {
        guard.leave(id);
    }
    Some(attrs)
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Stops of `gradient` with offsets clamped to 0..=1 and made non-decreasing.
fn collect_stops(ctx: &PaintContext<'_>, gradient: NodeId) -> Vec<GradientStop> {
    let gradient_style = ctx.styles.compute_with_ancestors(gradient);
    let mut stops: Vec<GradientStop> = Vec::new();
    for child in ctx.document.element(gradient).children() {
        let el = ctx.document.element(*child);
        if el.kind != ElementKind::Stop {
            continue;
        }
        let offset = el.attribute("offset").and_then(parse_offset).unwrap_or(0.0);
        let offset = stops.last().map_or(offset, |prev| offset.max(prev.offset));
        let style = ctx.styles.compute(*child, Some(&gradient_style));
        let color = style
            .stop_color
            .with_alpha(style.stop_color.a * style.stop_opacity);
        stops.push(GradientStop { offset, color });
    }
    stops
}

fn parse_offset(input: &str) -> Option<f64> {
    let s = input.trim();
    let v = match s.strip_suffix('%') {
        Some(p) => parse_number(p)? / 100.0,
        None => parse_number(s)?,
    };
    Some(v.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SimpleSelectorMatcher;
    use crate::xml::parse_document;

    fn resolve(svg: &str, id: &str, bbox: Option<Rect>) -> Option<ResolvedPaint> {
        let doc = parse_document(svg, None).expect("document");
        let styles = StyleResolver::new(&doc, &SimpleSelectorMatcher, None);
        let ctx = PaintContext {
            document: &doc,
            styles: &styles,
            debug: None,
            bbox,
            viewport: Size::new(200.0, 100.0),
            transform: Transform::identity(),
        };
        let mut guard = ReferenceGuard::new(32);
        let node = doc.lookup_by_id(id).expect("gradient id");
        let out = resolve_paint_server(&ctx, node, &mut guard);
        assert!(guard.is_empty());
        out
    }

    const BOX: Option<Rect> = Some(Rect {
        x: 10.0,
        y: 20.0,
        width: 100.0,
        height: 50.0,
    });

    #[test]
    fn bounding_box_units_map_into_the_box() {
        let svg = r##"<svg>
            <linearGradient id="g">
              <stop offset="0" stop-color="red"/>
              <stop offset="100%" stop-color="blue" stop-opacity="0.5"/>
            </linearGradient>
        </svg>"##;
        let Some(ResolvedPaint::Server(server)) = resolve(svg, "g", BOX) else {
            panic!("expected a gradient");
        };
        assert_eq!(
            server.geometry,
            GradientGeometry::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 0.0
            }
        );
        let end = server.transform.apply(1.0, 0.0);
        assert_eq!(end, (110.0, 20.0));
        assert_eq!(server.stops[1].color, Color::rgba(0.0, 0.0, 1.0, 0.5));
        assert!(resolve(svg, "g", None).is_none());
    }

    #[test]
    fn stop_count_decides_paint_kind() {
        let svg = r##"<svg>
            <linearGradient id="none"/>
            <radialGradient id="one"><stop offset="0.3" stop-color="lime"/></radialGradient>
        </svg>"##;
        assert!(resolve(svg, "none", BOX).is_none());
        assert_eq!(
            resolve(svg, "one", BOX),
            Some(ResolvedPaint::Solid(Color::rgb(0.0, 1.0, 0.0)))
        );
    }

    #[test]
    fn href_chain_inherits_unspecified_attributes_and_stops() {
        let svg = r##"<svg>
            <linearGradient id="base" gradientUnits="userSpaceOnUse" x2="50%" spreadMethod="reflect">
              <stop offset="0" stop-color="red"/>
              <stop offset="1" stop-color="blue"/>
            </linearGradient>
            <linearGradient id="child" href="#base" y2="10"/>
        </svg>"##;
        let Some(ResolvedPaint::Server(server)) = resolve(svg, "child", None) else {
            panic!("expected a gradient");
        };
        assert_eq!(server.spread, SpreadMethod::Reflect);
        assert_eq!(server.stops.len(), 2);
        assert_eq!(
            server.geometry,
            GradientGeometry::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 100.0,
                y2: 10.0
            }
        );
    }

    #[test]
    fn href_cycle_terminates() {
        let svg = r##"<svg>
            <linearGradient id="a" href="#b"/>
            <linearGradient id="b" href="#a"/>
        </svg>"##;
        assert!(resolve(svg, "a", BOX).is_none());
    }

    #[test]
    fn stylesheet_rules_reach_stops() {
        let svg = r##"<svg>
            <style>.warm { stop-color: orange } #g stop { stop-opacity: 50% }</style>
            <radialGradient id="g" fx="0.25">
              <stop class="warm" offset="0.6"/>
              <stop offset="0.2" stop-color="black"/>
            </radialGradient>
        </svg>"##;
        let Some(ResolvedPaint::Server(server)) = resolve(svg, "g", BOX) else {
            panic!("expected a gradient");
        };
        assert_eq!(server.stops[0].color, Color::rgba(1.0, 165.0 / 255.0, 0.0, 0.5));
        // Offsets never decrease.
        assert_eq!(server.stops[1].offset, 0.6);
        match server.geometry {
            GradientGeometry::Radial { fx, fy, cy, .. } => {
                assert_eq!(fx, 0.25);
                assert_eq!(fy, cy);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn opacity_multiplies_every_stop() {
        let paint = ResolvedPaint::Solid(Color::rgba(1.0, 0.0, 0.0, 0.5)).with_opacity(0.5);
        assert_eq!(paint, ResolvedPaint::Solid(Color::rgba(1.0, 0.0, 0.0, 0.25)));
    }
}
