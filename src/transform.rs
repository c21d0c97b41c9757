use crate::types::{Point, Rect};

/// 2-D affine map `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
///
/// `a * b` produces the transform that applies `b` first and `a` second, so
/// the left operand is the outer (later) transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn from_rotate(radians: f64) -> Self {
        let c = libm::cos(radians);
        let s = libm::sin(radians);
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    /// Rotation about `(cx, cy)`: translate(cx, cy) · rotate · translate(-cx, -cy).
    pub fn from_rotate_around(radians: f64, cx: f64, cy: f64) -> Self {
        let c = libm::cos(radians);
        let s = libm::sin(radians);
        let x = cx * (1.0 - c) + cy * s;
        let y = cy * (1.0 - c) - cx * s;
        Self::new(c, s, -s, c, x, y)
    }

    pub fn from_scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Shear by angles (radians) along x and y.
    pub fn from_shear(shx: f64, shy: f64) -> Self {
        Self::new(1.0, libm::tan(shy), libm::tan(shx), 1.0, 0.0, 0.0)
    }

    pub fn from_translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self * previous`: the result applies `previous` first, then `self`.
    pub fn multiply(&self, previous: &Transform) -> Transform {
        let b = self;
        let a = previous;
        Transform {
            a: b.a * a.a + b.c * a.b,
            b: b.b * a.a + b.d * a.b,
            c: b.a * a.c + b.c * a.d,
            d: b.b * a.c + b.d * a.d,
            e: b.a * a.e + b.c * a.f + b.e,
            f: b.b * a.e + b.d * a.f + b.f,
        }
    }

    /// `self = next * self`; `next` runs after the accumulated transform.
    pub fn left_multiply(&mut self, next: &Transform) -> &mut Self {
        *self = next.multiply(self);
        self
    }

    /// `self = self * previous`; `previous` becomes the inner transform.
    pub fn right_multiply(&mut self, previous: &Transform) -> &mut Self {
        *self = self.multiply(previous);
        self
    }

    pub fn rotate(&mut self, radians: f64) -> &mut Self {
        self.left_multiply(&Self::from_rotate(radians))
    }

    pub fn rotate_around(&mut self, radians: f64, cx: f64, cy: f64) -> &mut Self {
        self.left_multiply(&Self::from_rotate_around(radians, cx, cy))
    }

    pub fn scale(&mut self, sx: f64, sy: f64) -> &mut Self {
        self.left_multiply(&Self::from_scale(sx, sy))
    }

    pub fn shear(&mut self, shx: f64, shy: f64) -> &mut Self {
        self.left_multiply(&Self::from_shear(shx, shy))
    }

    pub fn translate(&mut self, tx: f64, ty: f64) -> &mut Self {
        self.left_multiply(&Self::from_translate(tx, ty))
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse, or identity when the determinant is exactly zero.
    pub fn inverted(&self) -> Transform {
        self.try_inverted().unwrap_or(Transform::IDENTITY)
    }

    pub fn try_inverted(&self) -> Option<Transform> {
        let det = self.determinant();
        if det == 0.0 {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = self.a * inv_det;
        let b = self.b * inv_det;
        let c = self.c * inv_det;
        let d = self.d * inv_det;
        let e = (self.c * self.f - self.d * self.e) * inv_det;
        let f = (self.b * self.e - self.a * self.f) * inv_det;
        Some(Transform::new(d, -b, -c, a, e, f))
    }

    pub fn is_identity(&self) -> bool {
        self.a == 1.0
            && self.b == 0.0
            && self.c == 0.0
            && self.d == 1.0
            && self.e == 0.0
            && self.f == 0.0
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn map_point(&self, p: Point) -> Point {
        let (x, y) = self.apply(p.x, p.y);
        Point { x, y }
    }

    pub fn map_points(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.map_point(*p)).collect()
    }

    pub fn map_points_in_place(&self, points: &mut [Point]) {
        for p in points {
            *p = self.map_point(*p);
        }
    }

    /// Bounding box of the four mapped corners of `rect`.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            Point::new(rect.x, rect.y),
            Point::new(rect.x + rect.width, rect.y),
            Point::new(rect.x + rect.width, rect.y + rect.height),
            Point::new(rect.x, rect.y + rect.height),
        ];
        let mapped = self.map_points(&corners);
        let mut l = mapped[0].x;
        let mut t = mapped[0].y;
        let mut r = mapped[0].x;
        let mut b = mapped[0].y;
        for p in &mapped[1..] {
            l = l.min(p.x);
            r = r.max(p.x);
            t = t.min(p.y);
            b = b.max(p.y);
        }
        Rect::new(l, t, r - l, b - t)
    }

    /// Uniform scale estimate, `sqrt(|det|)`; used for stroke widths.
    pub fn scale_factor(&self) -> f64 {
        libm::sqrt(self.determinant().abs())
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.multiply(&rhs)
    }
}

/// Parses an SVG `transform` attribute. Functions are right-multiplied in the
/// order written, so the last function is applied to points first.
/// Returns `None` for any malformed list.
pub fn parse_transform_list(input: &str) -> Option<Transform> {
    let mut out = Transform::identity();
    let mut s = input.trim();

    while !s.is_empty() {
        let open = s.find('(')?;
        let name = s[..open].trim();
        let close = s[open + 1..].find(')')?;
        let args = parse_number_list(&s[open + 1..open + 1 + close])?;

        let m = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Transform::new(*a, *b, *c, *d, *e, *f),
            ("translate", [tx]) => Transform::from_translate(*tx, 0.0),
            ("translate", [tx, ty]) => Transform::from_translate(*tx, *ty),
            ("scale", [s]) => Transform::from_scale(*s, *s),
            ("scale", [sx, sy]) => Transform::from_scale(*sx, *sy),
            ("rotate", [deg]) => Transform::from_rotate(deg.to_radians()),
            ("rotate", [deg, cx, cy]) => Transform::from_rotate_around(deg.to_radians(), *cx, *cy),
            ("skewX", [deg]) => Transform::from_shear(deg.to_radians(), 0.0),
            ("skewY", [deg]) => Transform::from_shear(0.0, deg.to_radians()),
            _ => return None,
        };

        out.right_multiply(&m);
        s = s[open + 1 + close + 1..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    if out.is_finite() { Some(out) } else { None }
}

fn parse_number_list(input: &str) -> Option<Vec<f64>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPS: f64 = 1e-9;

    fn approx(a: &Transform, b: &Transform) -> bool {
        (a.a - b.a).abs() < EPS
            && (a.b - b.b).abs() < EPS
            && (a.c - b.c).abs() < EPS
            && (a.d - b.d).abs() < EPS
            && (a.e - b.e).abs() < EPS
            && (a.f - b.f).abs() < EPS
    }

    fn samples() -> Vec<Transform> {
        vec![
            Transform::from_rotate(0.3),
            Transform::from_scale(2.0, -0.5),
            Transform::from_translate(7.0, -3.0),
            Transform::from_shear(0.2, -0.1),
            Transform::new(1.5, 0.25, -0.75, 2.0, 10.0, 4.0),
            Transform::from_rotate_around(1.1, 5.0, 6.0),
        ]
    }

    #[test]
    fn composition_is_associative() {
        let all = samples();
        for a in &all {
            for b in &all {
                for c in &all {
                    let left = (*a * *b) * *c;
                    let right = *a * (*b * *c);
                    assert!(approx(&left, &right), "{left:?} != {right:?}");
                }
            }
        }
    }

    #[test]
    fn product_applies_right_operand_first() {
        let t = Transform::from_translate(10.0, 0.0);
        let s = Transform::from_scale(2.0, 2.0);
        let p = Point::new(1.0, 1.0);
        assert_eq!((t * s).map_point(p), Point::new(12.0, 2.0));
        assert_eq!((s * t).map_point(p), Point::new(22.0, 2.0));
    }

    #[test]
    fn left_and_right_multiply_order() {
        let t = Transform::from_translate(10.0, 0.0);
        let s = Transform::from_scale(2.0, 2.0);

        let mut left = t;
        left.left_multiply(&s);
        assert_eq!(left, s * t);

        let mut right = t;
        right.right_multiply(&s);
        assert_eq!(right, t * s);

        let mut via_mutator = t;
        via_mutator.scale(2.0, 2.0);
        assert_eq!(via_mutator, s * t);
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        for t in samples() {
            let product = t * t.inverted();
            assert!(approx(&product, &Transform::identity()), "{t:?}");
            let product = t.inverted() * t;
            assert!(approx(&product, &Transform::identity()), "{t:?}");
        }
    }

    #[test]
    fn singular_inverse_is_exact_identity() {
        let singular = Transform::new(1.0, 2.0, 2.0, 4.0, 5.0, 6.0);
        assert_eq!(singular.determinant(), 0.0);
        assert!(singular.inverted().is_identity());
        assert!(singular.try_inverted().is_none());
        assert!(Transform::from_scale(0.0, 3.0).inverted().is_identity());
    }

    #[test]
    fn rotate_and_scale_map_points() {
        let p = Transform::from_rotate(FRAC_PI_2).map_point(Point::new(1.0, 0.0));
        assert!(p.x.abs() < EPS);
        assert!((p.y - 1.0).abs() < EPS);

        let p = Transform::from_scale(2.0, 3.0).map_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(2.0, 3.0));
    }

    #[test]
    fn rotate_around_keeps_center_fixed() {
        let t = Transform::from_rotate_around(0.7, 3.0, -2.0);
        let explicit = Transform::from_translate(3.0, -2.0)
            * Transform::from_rotate(0.7)
            * Transform::from_translate(-3.0, 2.0);
        assert!(approx(&t, &explicit));
        let c = t.map_point(Point::new(3.0, -2.0));
        assert!((c.x - 3.0).abs() < EPS && (c.y + 2.0).abs() < EPS);
    }

    #[test]
    fn map_rect_uses_all_corners() {
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        let out = Transform::from_rotate(FRAC_PI_4).map_rect(&rect);
        let h = std::f64::consts::SQRT_2 / 2.0;
        assert!((out.x + h).abs() < EPS);
        assert!(out.y.abs() < EPS);
        assert!((out.width - std::f64::consts::SQRT_2).abs() < EPS);
        assert!((out.height - std::f64::consts::SQRT_2).abs() < EPS);
    }

    #[test]
    fn map_rect_normalizes_mirrored_extents() {
        let out = Transform::from_scale(-2.0, 1.0).map_rect(&Rect::new(1.0, 1.0, 2.0, 3.0));
        assert_eq!(out, Rect::new(-6.0, 1.0, 4.0, 3.0));
    }

    #[test]
    fn map_points_preserves_order() {
        let t = Transform::from_translate(1.0, 2.0);
        let pts = [Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(-1.0, 3.0)];
        let mapped = t.map_points(&pts);
        assert_eq!(
            mapped,
            vec![Point::new(1.0, 2.0), Point::new(6.0, 7.0), Point::new(0.0, 5.0)]
        );
        let mut in_place = pts;
        t.map_points_in_place(&mut in_place);
        assert_eq!(in_place.to_vec(), mapped);
    }

    #[test]
    fn identity_check_is_exact() {
        assert!(Transform::identity().is_identity());
        assert!(!Transform::from_translate(1e-300, 0.0).is_identity());
    }

    #[test]
    fn parses_transform_list_in_written_order() {
        let t = parse_transform_list("translate(10, 5) scale(2)").expect("valid list");
        assert_eq!(t.map_point(Point::new(1.0, 1.0)), Point::new(12.0, 7.0));

        let t = parse_transform_list("rotate(90 10 10)").expect("valid rotate");
        let p = t.map_point(Point::new(20.0, 10.0));
        assert!((p.x - 10.0).abs() < EPS && (p.y - 20.0).abs() < EPS);

        let t = parse_transform_list("matrix(1 0 0 1 3 4),skewX(0)").expect("valid matrix");
        assert!(approx(&t, &Transform::from_translate(3.0, 4.0)));
    }

    #[test]
    fn malformed_transform_list_is_rejected() {
        assert!(parse_transform_list("translate(10").is_none());
        assert!(parse_transform_list("wobble(3)").is_none());
        assert!(parse_transform_list("matrix(1 2 3)").is_none());
        assert!(parse_transform_list("scale(a)").is_none());
        assert_eq!(parse_transform_list("  "), Some(Transform::identity()));
    }
}
