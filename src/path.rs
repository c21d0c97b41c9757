use crate::document::{Element, ElementKind};
use crate::style::parse_length;
use crate::types::{Point, Rect};

/// Path segment in absolute user-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    /// Elliptical arc from the current point; rotation in degrees.
    ArcTo {
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    Close,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub commands: Vec<PathCommand>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::MoveTo(Point::new(x, y)));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::LineTo(Point::new(x, y)));
    }

    pub fn quad_to(&mut self, x1: f64, y1: f64, x: f64, y: f64) {
        self.commands
            .push(PathCommand::QuadTo(Point::new(x1, y1), Point::new(x, y)));
    }

    pub fn cubic_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        self.commands.push(PathCommand::CubicTo(
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x, y),
        ));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arc_to(
        &mut self,
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    ) {
        self.commands.push(PathCommand::ArcTo {
            rx,
            ry,
            x_axis_rotation,
            large_arc,
            sweep,
            to: Point::new(x, y),
        });
    }

    pub fn close(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    /// Bounds of all end and control points, with arcs expanded to cubics.
    /// Encloses the geometry; used for objectBoundingBox units.
    pub fn control_bounds(&self) -> Option<Rect> {
        let mut pts = Vec::new();
        let mut current = Point::ZERO;
        let mut start = Point::ZERO;
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) => {
                    pts.push(p);
                    current = p;
                    start = p;
                }
                PathCommand::LineTo(p) => {
                    pts.push(p);
                    current = p;
                }
                PathCommand::QuadTo(c, p) => {
                    pts.extend([c, p]);
                    current = p;
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    pts.extend([c1, c2, p]);
                    current = p;
                }
                PathCommand::ArcTo {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    to,
                } => {
                    for seg in arc_to_cubics(current, rx, ry, x_axis_rotation, large_arc, sweep, to)
                    {
                        match seg {
                            PathCommand::CubicTo(c1, c2, p) => pts.extend([c1, c2, p]),
                            PathCommand::LineTo(p) => pts.push(p),
                            _ => {}
                        }
                    }
                    current = to;
                }
                PathCommand::Close => current = start,
            }
        }
        Rect::from_points(&pts)
    }
}

/// Parses SVG path data. Parsing stops at the first malformed segment and
/// keeps everything before it.
pub fn parse_path_data(d: &str) -> Path {
    let mut path = Path::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur = Point::ZERO;
    let mut start = Point::ZERO;
    let mut last_cubic_ctrl: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;

    while let Some(c) = p.next_command(&mut cmd) {
        let rel = c.is_ascii_lowercase();
        let offset = |x: f64, y: f64, cur: Point| {
            if rel {
                Point::new(cur.x + x, cur.y + y)
            } else {
                Point::new(x, y)
            }
        };
        let before = p.i;
        match c.to_ascii_uppercase() {
            'M' => {
                let Some((x, y)) = p.next_pair() else { break };
                cur = offset(x, y, cur);
                start = cur;
                path.commands.push(PathCommand::MoveTo(cur));
                while let Some((x, y)) = p.next_pair() {
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'L' => {
                while let Some((x, y)) = p.next_pair() {
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'H' => {
                while let Some(x) = p.next_number() {
                    cur.x = if rel { cur.x + x } else { x };
                    path.commands.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'V' => {
                while let Some(y) = p.next_number() {
                    cur.y = if rel { cur.y + y } else { y };
                    path.commands.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'C' => {
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let c1 = offset(x1, y1, cur);
                    let c2 = offset(x2, y2, cur);
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::CubicTo(c1, c2, cur));
                    last_cubic_ctrl = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'S' => {
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let c1 = reflect(last_cubic_ctrl, cur);
                    let c2 = offset(x2, y2, cur);
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::CubicTo(c1, c2, cur));
                    last_cubic_ctrl = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'Q' => {
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let ctrl = offset(x1, y1, cur);
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::QuadTo(ctrl, cur));
                    last_quad_ctrl = Some(ctrl);
                    last_cubic_ctrl = None;
                }
            }
            'T' => {
                while let Some((x, y)) = p.next_pair() {
                    let ctrl = reflect(last_quad_ctrl, cur);
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::QuadTo(ctrl, cur));
                    last_quad_ctrl = Some(ctrl);
                    last_cubic_ctrl = None;
                }
            }
            'A' => {
                while let Some((rx, ry, rot, large, sweep, x, y)) = p.next_arc() {
                    cur = offset(x, y, cur);
                    path.commands.push(PathCommand::ArcTo {
                        rx,
                        ry,
                        x_axis_rotation: rot,
                        large_arc: large,
                        sweep,
                        to: cur,
                    });
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
            }
            'Z' => {
                path.commands.push(PathCommand::Close);
                cur = start;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            _ => break,
        }
        // A command letter that consumed nothing (or trailing garbage) ends parsing.
        if p.i == before && !matches!(c, 'Z' | 'z') {
            break;
        }
    }

    path
}

fn reflect(ctrl: Option<Point>, cur: Point) -> Point {
    match ctrl {
        Some(c) => Point::new(2.0 * cur.x - c.x, 2.0 * cur.y - c.y),
        None => cur,
    }
}

/// Converts an SVG arc into cubic segments of at most 90 degrees each
/// (center parameterization). Degenerate arcs become a single line.
pub fn arc_to_cubics(
    from: Point,
    rx_in: f64,
    ry_in: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) -> Vec<PathCommand> {
    use std::f64::consts::PI;

    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 || from == to {
        return vec![PathCommand::LineTo(to)];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sin(phi);
    let cos_phi = libm::cos(phi);

    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrt(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let mut coef = 0.0;
    if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        coef = sign * libm::sqrt((num / den).max(0.0));
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

    fn angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
        libm::atan2(ux * vy - uy * vx, ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    let count = libm::ceil(dtheta.abs() / (PI / 2.0)).max(1.0) as usize;
    let delta = dtheta / count as f64;

    let map = |x: f64, y: f64| {
        let x = rx * x;
        let y = ry * y;
        Point::new(cx + cos_phi * x - sin_phi * y, cy + sin_phi * x + cos_phi * y)
    };

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let t1 = theta;
        let t2 = theta + delta;
        let k = (4.0 / 3.0) * libm::tan(delta / 4.0);
        let (s1, c1) = (libm::sin(t1), libm::cos(t1));
        let (s2, c2) = (libm::sin(t2), libm::cos(t2));
        // Land exactly on the requested endpoint.
        let end = if i + 1 == count { to } else { map(c2, s2) };
        out.push(PathCommand::CubicTo(
            map(c1 - k * s1, s1 + k * c1),
            map(c2 + k * s2, s2 - k * c2),
            end,
        ));
        theta = t2;
    }
    out
}

/// Outline for a basic shape element, in its own user space.
/// Missing or non-positive required sizes produce no geometry.
pub fn shape_path(element: &Element) -> Option<Path> {
    match element.kind {
        ElementKind::Rect => rect_path(element),
        ElementKind::Circle => {
            let r = length_attr(element, "r")?;
            if r <= 0.0 {
                return None;
            }
            ellipse_path(length_or_zero(element, "cx"), length_or_zero(element, "cy"), r, r)
        }
        ElementKind::Ellipse => {
            let rx = length_attr(element, "rx")?;
            let ry = length_attr(element, "ry")?;
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            ellipse_path(length_or_zero(element, "cx"), length_or_zero(element, "cy"), rx, ry)
        }
        ElementKind::Line => {
            let mut path = Path::new();
            path.move_to(length_or_zero(element, "x1"), length_or_zero(element, "y1"));
            path.line_to(length_or_zero(element, "x2"), length_or_zero(element, "y2"));
            Some(path)
        }
        ElementKind::Polyline => poly_path(element, false),
        ElementKind::Polygon => poly_path(element, true),
        ElementKind::Path => {
            let path = parse_path_data(element.attribute("d")?);
            // Path data must begin with a moveto.
            match path.commands.first() {
                Some(PathCommand::MoveTo(_)) => Some(path),
                _ => None,
            }
        }
        _ => None,
    }
}

fn length_attr(element: &Element, name: &str) -> Option<f64> {
    parse_length(element.attribute(name)?)
}

fn length_or_zero(element: &Element, name: &str) -> f64 {
    length_attr(element, name).unwrap_or(0.0)
}

fn rect_path(element: &Element) -> Option<Path> {
    let x = length_or_zero(element, "x");
    let y = length_or_zero(element, "y");
    let w = length_attr(element, "width")?;
    let h = length_attr(element, "height")?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    let rx = length_attr(element, "rx").filter(|v| *v >= 0.0);
    let ry = length_attr(element, "ry").filter(|v| *v >= 0.0);
    let (rx, ry) = match (rx, ry) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.min(w / 2.0);
    let ry = ry.min(h / 2.0);

    let mut path = Path::new();
    if rx > 0.0 && ry > 0.0 {
        path.move_to(x + rx, y);
        path.line_to(x + w - rx, y);
        path.arc_to(rx, ry, 0.0, false, true, x + w, y + ry);
        path.line_to(x + w, y + h - ry);
        path.arc_to(rx, ry, 0.0, false, true, x + w - rx, y + h);
        path.line_to(x + rx, y + h);
        path.arc_to(rx, ry, 0.0, false, true, x, y + h - ry);
        path.line_to(x, y + ry);
        path.arc_to(rx, ry, 0.0, false, true, x + rx, y);
    } else {
        path.move_to(x, y);
        path.line_to(x + w, y);
        path.line_to(x + w, y + h);
        path.line_to(x, y + h);
    }
    path.close();
    Some(path)
}

fn ellipse_path(cx: f64, cy: f64, rx: f64, ry: f64) -> Option<Path> {
    // Four quarter cubics.
    const K: f64 = 0.552_284_749_831;
    let ox = rx * K;
    let oy = ry * K;
    let mut path = Path::new();
    path.move_to(cx + rx, cy);
    path.cubic_to(cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry);
    path.cubic_to(cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy);
    path.cubic_to(cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry);
    path.cubic_to(cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy);
    path.close();
    Some(path)
}

fn poly_path(element: &Element, close: bool) -> Option<Path> {
    let points = parse_points(element.attribute("points")?);
    if points.len() < 2 {
        return None;
    }
    let mut path = Path::new();
    path.move_to(points[0].x, points[0].y);
    for p in &points[1..] {
        path.line_to(p.x, p.y);
    }
    if close {
        path.close();
    }
    Some(path)
}

/// Coordinate pairs from a `points` attribute; an odd trailing number is dropped.
pub fn parse_points(input: &str) -> Vec<Point> {
    let mut p = PathParser::new(input);
    let mut out = Vec::new();
    while let Some((x, y)) = p.next_pair() {
        out.push(Point::new(x, y));
    }
    out
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn skip_separators(&mut self) {
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b' ' | b'\n' | b'\r' | b'\t' | b',' => self.i += 1,
                _ => break,
            }
        }
    }

    /// Next command letter, or the current command again when a number
    /// follows (implicit repeat).
    fn next_command(&mut self, current: &mut char) -> Option<char> {
        self.skip_separators();
        let b = *self.bytes.get(self.i)?;
        if b.is_ascii_alphabetic() {
            self.i += 1;
            let c = b as char;
            // An implicit repeat after moveto is a lineto.
            *current = match c {
                'M' => 'L',
                'm' => 'l',
                'Z' | 'z' => ' ',
                other => other,
            };
            return Some(c);
        }
        if *current == ' ' {
            return None;
        }
        Some(*current)
    }

    fn next_number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.i;
        let mut digits = false;
        if matches!(self.bytes.get(self.i), Some(b'+' | b'-')) {
            self.i += 1;
        }
        while matches!(self.bytes.get(self.i), Some(b) if b.is_ascii_digit()) {
            self.i += 1;
            digits = true;
        }
        if self.bytes.get(self.i) == Some(&b'.') {
            self.i += 1;
            while matches!(self.bytes.get(self.i), Some(b) if b.is_ascii_digit()) {
                self.i += 1;
                digits = true;
            }
        }
        if digits && matches!(self.bytes.get(self.i), Some(b'e' | b'E')) {
            let mark = self.i;
            self.i += 1;
            if matches!(self.bytes.get(self.i), Some(b'+' | b'-')) {
                self.i += 1;
            }
            let exp_start = self.i;
            while matches!(self.bytes.get(self.i), Some(b) if b.is_ascii_digit()) {
                self.i += 1;
            }
            if self.i == exp_start {
                self.i = mark;
            }
        }
        if !digits {
            self.i = start;
            return None;
        }
        let value = std::str::from_utf8(&self.bytes[start..self.i])
            .ok()
            .and_then(|s| s.parse::<f64>().ok());
        if value.is_none() {
            self.i = start;
        }
        value
    }

    fn next_pair(&mut self) -> Option<(f64, f64)> {
        let start = self.i;
        let x = self.next_number();
        let y = self.next_number();
        match (x, y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => {
                self.i = start;
                None
            }
        }
    }

    fn next_numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let start = self.i;
        let mut out = [0.0; N];
        for slot in out.iter_mut() {
            match self.next_number() {
                Some(v) => *slot = v,
                None => {
                    self.i = start;
                    return None;
                }
            }
        }
        Some(out)
    }

    fn next_flag(&mut self) -> Option<bool> {
        self.skip_separators();
        match self.bytes.get(self.i) {
            Some(b'0') => {
                self.i += 1;
                Some(false)
            }
            Some(b'1') => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    #[allow(clippy::type_complexity)]
    fn next_arc(&mut self) -> Option<(f64, f64, f64, bool, bool, f64, f64)> {
        let start = self.i;
        let parsed = (|| {
            let [rx, ry, rot] = self.next_numbers::<3>()?;
            let large = self.next_flag()?;
            let sweep = self.next_flag()?;
            let (x, y) = self.next_pair()?;
            Some((rx, ry, rot, large, sweep, x, y))
        })();
        if parsed.is_none() {
            self.i = start;
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentBuilder, TokenEvent};

    fn element(name: &str, attrs: &[(&str, &str)]) -> Element {
        let mut builder = DocumentBuilder::new();
        builder.push(TokenEvent::start(name, attrs));
        builder.push(TokenEvent::end(name));
        let doc = builder.finish();
        doc.element(doc.root().expect("root")).clone()
    }

    #[test]
    fn parses_relative_and_implicit_commands() {
        let path = parse_path_data("m10 10 5 0 v5 h-5 z");
        assert_eq!(
            path.commands,
            vec![
                PathCommand::MoveTo(Point::new(10.0, 10.0)),
                PathCommand::LineTo(Point::new(15.0, 10.0)),
                PathCommand::LineTo(Point::new(15.0, 15.0)),
                PathCommand::LineTo(Point::new(10.0, 15.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn parses_compact_numbers_and_arc_flags() {
        let path = parse_path_data("M0,0L.5.5-1-1A5 5 0 1110 0");
        assert_eq!(path.commands.len(), 4);
        assert_eq!(path.commands[1], PathCommand::LineTo(Point::new(0.5, 0.5)));
        assert_eq!(path.commands[2], PathCommand::LineTo(Point::new(-1.0, -1.0)));
        assert_eq!(
            path.commands[3],
            PathCommand::ArcTo {
                rx: 5.0,
                ry: 5.0,
                x_axis_rotation: 0.0,
                large_arc: true,
                sweep: true,
                to: Point::new(10.0, 0.0),
            }
        );
    }

    #[test]
    fn smooth_curves_reflect_previous_control() {
        let path = parse_path_data("M0 0 Q5 5 10 0 T20 0");
        assert_eq!(
            path.commands[2],
            PathCommand::QuadTo(Point::new(15.0, -5.0), Point::new(20.0, 0.0))
        );

        let path = parse_path_data("M0 0 C0 5 5 5 5 0 S10 -5 10 0");
        assert_eq!(
            path.commands[2],
            PathCommand::CubicTo(
                Point::new(5.0, -5.0),
                Point::new(10.0, -5.0),
                Point::new(10.0, 0.0)
            )
        );
    }

    #[test]
    fn malformed_segment_keeps_prefix() {
        let path = parse_path_data("M0 0 L10 10 L20 # 5");
        assert_eq!(path.commands.len(), 2);
        assert!(parse_path_data("L10 10").commands.len() <= 1);
    }

    #[test]
    fn arc_ends_exactly_at_target() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(10.0, 0.0);
        let segs = arc_to_cubics(from, 5.0, 5.0, 0.0, false, true, to);
        assert_eq!(segs.len(), 2);
        match segs.last() {
            Some(PathCommand::CubicTo(_, _, end)) => assert_eq!(*end, to),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            arc_to_cubics(from, 0.0, 5.0, 0.0, false, true, to),
            vec![PathCommand::LineTo(to)]
        );
    }

    #[test]
    fn arc_radii_scale_up_when_too_small() {
        let segs = arc_to_cubics(
            Point::new(0.0, 0.0),
            1.0,
            1.0,
            0.0,
            false,
            true,
            Point::new(10.0, 0.0),
        );
        let mut path = Path::new();
        path.move_to(0.0, 0.0);
        path.commands.extend(segs);
        let bounds = path.control_bounds().expect("bounds");
        assert!(bounds.height > 4.0 && bounds.height < 7.5, "{bounds:?}");
    }

    #[test]
    fn rect_without_positive_size_has_no_geometry() {
        assert!(shape_path(&element("rect", &[("width", "0"), ("height", "5")])).is_none());
        assert!(shape_path(&element("rect", &[("width", "5")])).is_none());
        assert!(shape_path(&element("rect", &[("width", "-1"), ("height", "5")])).is_none());
    }

    #[test]
    fn rounded_rect_copies_and_clamps_radius() {
        let path = shape_path(&element(
            "rect",
            &[("width", "10"), ("height", "4"), ("rx", "3")],
        ))
        .expect("rounded rect");
        let arcs: Vec<_> = path
            .commands
            .iter()
            .filter_map(|c| match c {
                PathCommand::ArcTo { rx, ry, .. } => Some((*rx, *ry)),
                _ => None,
            })
            .collect();
        assert_eq!(arcs, vec![(3.0, 2.0); 4]);
    }

    #[test]
    fn circle_bounds_and_units() {
        let path = shape_path(&element("circle", &[("cx", "1in"), ("cy", "0"), ("r", "10")]))
            .expect("circle");
        let b = path.control_bounds().expect("bounds");
        assert!((b.x - 86.0).abs() < 1e-9);
        assert!((b.width - 20.0).abs() < 1e-9);
        assert!(shape_path(&element("circle", &[("r", "0")])).is_none());
    }

    #[test]
    fn polygon_closes_and_drops_odd_coordinate() {
        let path = shape_path(&element("polygon", &[("points", "0,0 10,0 10,10 7")]))
            .expect("polygon");
        assert_eq!(path.commands.len(), 4);
        assert_eq!(path.commands.last(), Some(&PathCommand::Close));
        assert!(shape_path(&element("polyline", &[("points", "1 2")])).is_none());
    }

    #[test]
    fn path_element_requires_leading_moveto() {
        assert!(shape_path(&element("path", &[("d", "L 1 1")])).is_none());
        assert!(shape_path(&element("path", &[("d", "M 0 0 L 1 1")])).is_some());
    }
}
