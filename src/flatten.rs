use crate::path::{Path, PathCommand, arc_to_cubics};
use crate::transform::Transform;
use crate::types::{Point, Rect};

pub const DEFAULT_TOLERANCE: f64 = 0.25;
pub const DEFAULT_MAX_DEPTH: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub points: Vec<Point>,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub from: Point,
    pub to: Point,
}

/// Device-space polygonal outline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedPath {
    pub subpaths: Vec<Subpath>,
}

impl FlattenedPath {
    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    /// Line segments in input order; closed subpaths get their closing edge.
    pub fn segments(&self) -> impl Iterator<Item = LineSegment> + '_ {
        self.subpaths.iter().flat_map(|sp| {
            let edges = sp.points.windows(2).map(|w| LineSegment {
                from: w[0],
                to: w[1],
            });
            let closing = match (sp.closed, sp.points.first(), sp.points.last()) {
                (true, Some(first), Some(last)) if first != last => Some(LineSegment {
                    from: *last,
                    to: *first,
                }),
                _ => None,
            };
            edges.chain(closing)
        })
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::from_points(self.subpaths.iter().flat_map(|sp| sp.points.iter()))
    }

    pub fn point_count(&self) -> usize {
        self.subpaths.iter().map(|sp| sp.points.len()).sum()
    }
}

/// Converts curved paths into polylines in device space.
///
/// Control points are mapped through the transform first, so `tolerance` is
/// measured in device units. A curve is subdivided at t = 0.5 until its inner
/// control points lie within `tolerance` of the chord; by the convex-hull
/// property the curve then stays within `tolerance` of that chord.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flattener {
    pub tolerance: f64,
    pub max_depth: u32,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Flattener {
    pub fn new(tolerance: f64, max_depth: u32) -> Self {
        Self {
            tolerance,
            max_depth,
        }
    }

    pub fn flatten(&self, path: &Path, transform: &Transform) -> FlattenedPath {
        let mut out = SubpathWriter::default();
        // User-space current point, needed for arc center parameterization.
        let mut current = Point::ZERO;
        let mut start = Point::ZERO;

        for cmd in &path.commands {
            match *cmd {
                PathCommand::MoveTo(p) => {
                    out.move_to(transform.map_point(p));
                    current = p;
                    start = p;
                }
                PathCommand::LineTo(p) => {
                    out.line_to(transform.map_point(p));
                    current = p;
                }
                PathCommand::QuadTo(c, p) => {
                    let p0 = out.current_or(transform.map_point(current));
                    self.flatten_quad(
                        p0,
                        transform.map_point(c),
                        transform.map_point(p),
                        0,
                        &mut out,
                    );
                    current = p;
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    let p0 = out.current_or(transform.map_point(current));
                    self.flatten_cubic(
                        [
                            p0,
                            transform.map_point(c1),
                            transform.map_point(c2),
                            transform.map_point(p),
                        ],
                        0,
                        &mut out,
                    );
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
                            PathCommand::CubicTo(c1, c2, p) => {
                                let p0 = out.current_or(transform.map_point(current));
                                self.flatten_cubic(
                                    [
                                        p0,
                                        transform.map_point(c1),
                                        transform.map_point(c2),
                                        transform.map_point(p),
                                    ],
                                    0,
                                    &mut out,
                                );
                                current = p;
                            }
                            PathCommand::LineTo(p) => {
                                out.line_to(transform.map_point(p));
                                current = p;
                            }
                            _ => {}
                        }
                    }
                    current = to;
                }
                PathCommand::Close => {
                    out.close();
                    current = start;
                    out.pending_start = Some(transform.map_point(start));
                }
            }
        }

        out.finish()
    }

    fn flatten_cubic(&self, p: [Point; 4], depth: u32, out: &mut SubpathWriter) {
        let [p0, p1, p2, p3] = p;
        let flat = p1.distance_to_segment(p0, p3) <= self.tolerance
            && p2.distance_to_segment(p0, p3) <= self.tolerance;
        if flat || depth >= self.max_depth {
            out.line_to(p3);
            return;
        }

        let m01 = p0.midpoint(p1);
        let m12 = p1.midpoint(p2);
        let m23 = p2.midpoint(p3);
        let m012 = m01.midpoint(m12);
        let m123 = m12.midpoint(m23);
        let mid = m012.midpoint(m123);

        self.flatten_cubic([p0, m01, m012, mid], depth + 1, out);
        self.flatten_cubic([mid, m123, m23, p3], depth + 1, out);
    }

    fn flatten_quad(&self, p0: Point, p1: Point, p2: Point, depth: u32, out: &mut SubpathWriter) {
        if p1.distance_to_segment(p0, p2) <= self.tolerance || depth >= self.max_depth {
            out.line_to(p2);
            return;
        }
        let q0 = p0.midpoint(p1);
        let q1 = p1.midpoint(p2);
        let mid = q0.midpoint(q1);
        self.flatten_quad(p0, q0, mid, depth + 1, out);
        self.flatten_quad(mid, q1, p2, depth + 1, out);
    }
}

#[derive(Default)]
struct SubpathWriter {
    done: Vec<Subpath>,
    points: Vec<Point>,
    closed: bool,
    /// Start of a subpath reopened by drawing after a close.
    pending_start: Option<Point>,
}

impl SubpathWriter {
    fn move_to(&mut self, p: Point) {
        self.flush();
        self.pending_start = None;
        self.points.push(p);
    }

    fn line_to(&mut self, p: Point) {
        if self.points.is_empty() {
            if let Some(start) = self.pending_start.take() {
                self.points.push(start);
            }
        }
        self.points.push(p);
    }

    fn current_or(&mut self, fallback: Point) -> Point {
        if self.points.is_empty() {
            let start = self.pending_start.take().unwrap_or(fallback);
            self.points.push(start);
        }
        self.points.last().copied().unwrap_or(fallback)
    }

    fn close(&mut self) {
        self.closed = true;
        self.flush();
    }

    fn flush(&mut self) {
        let points = std::mem::take(&mut self.points);
        let closed = std::mem::take(&mut self.closed);
        // A lone moveto draws nothing.
        if points.len() >= 2 {
            self.done.push(Subpath { points, closed });
        }
    }

    fn finish(mut self) -> FlattenedPath {
        self.flush();
        FlattenedPath {
            subpaths: self.done,
        }
    }
}
