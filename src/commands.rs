use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::flatten::FlattenedPath;
use crate::paint_server::{GradientGeometry, ResolvedPaint};
use crate::render::{RenderNode, RenderTree};
use crate::style::{FillRule, LineCap, LineJoin};
use crate::transform::Transform;

/// One backend instruction. Paths are already in device space; the current
/// transform is reported so backends can map paint servers and hairlines.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SetTransform(Transform),
    FillPath {
        path: FlattenedPath,
        fill_rule: FillRule,
        paint: ResolvedPaint,
    },
    StrokePath {
        path: FlattenedPath,
        paint: ResolvedPaint,
        width: f64,
        line_cap: LineCap,
        line_join: LineJoin,
        miter_limit: f64,
        dashes: Vec<f64>,
        dash_offset: f64,
    },
    /// Intersects the clip with the union of `paths`. Empty clips everything.
    PushClip {
        paths: Vec<(FlattenedPath, FillRule)>,
    },
    PopClip,
    /// Renders `commands` into a luminance mask applied until `PopMask`.
    PushMask {
        commands: Vec<PaintCommand>,
    },
    PopMask,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    pub commands: Vec<PaintCommand>,
}

impl CommandList {
    /// Depth-first command stream for `tree`.
    pub fn emit(tree: &RenderTree) -> Self {
        let mut emitter = Emitter::default();
        if let Some(root) = &tree.root {
            emitter.node(root);
        }
        Self {
            commands: emitter.commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaintCommand> {
        self.commands.iter()
    }

    /// Hex SHA-256 of a canonical text encoding of the stream. Numbers are
    /// written at fixed precision so equal scenes hash equally.
    pub fn fingerprint(&self) -> String {
        let mut text = String::new();
        encode_commands(&mut text, &self.commands);
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a PaintCommand;
    type IntoIter = std::slice::Iter<'a, PaintCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[derive(Default)]
struct Emitter {
    commands: Vec<PaintCommand>,
    current: Transform,
}

impl Emitter {
    fn node(&mut self, node: &RenderNode) {
        let mut clips = 0;
        let mut clip = node.clip.as_deref();
        while let Some(c) = clip {
            self.commands.push(PaintCommand::PushClip {
                paths: clip_paths(c),
            });
            clips += 1;
            clip = c.clip.as_deref();
        }

        if let Some(mask) = node.mask.as_deref() {
            let mut inner = Emitter::default();
            for child in &mask.children {
                inner.node(child);
            }
            self.commands.push(PaintCommand::PushMask {
                commands: inner.commands,
            });
        }

        if let Some(geometry) = &node.geometry {
            if node.fill.is_some() || node.stroke.is_some() {
                self.set_transform(node.transform);
            }
            if let Some(paint) = &node.fill {
                self.commands.push(PaintCommand::FillPath {
                    path: geometry.clone(),
                    fill_rule: node.style.fill_rule,
                    paint: paint.clone(),
                });
            }
            if let Some(paint) = &node.stroke {
                let scale = node.transform.scale_factor();
                self.commands.push(PaintCommand::StrokePath {
                    path: geometry.clone(),
                    paint: paint.clone(),
                    width: node.style.stroke_width * scale,
                    line_cap: node.style.stroke_linecap,
                    line_join: node.style.stroke_linejoin,
                    miter_limit: node.style.stroke_miterlimit,
                    dashes: node
                        .style
                        .stroke_dasharray
                        .iter()
                        .map(|d| d * scale)
                        .collect(),
                    dash_offset: node.style.stroke_dashoffset * scale,
                });
            }
        }

        for child in &node.children {
            self.node(child);
        }

        if node.mask.is_some() {
            self.commands.push(PaintCommand::PopMask);
        }
        for _ in 0..clips {
            self.commands.push(PaintCommand::PopClip);
        }
    }

    fn set_transform(&mut self, transform: Transform) {
        if self.current != transform {
            self.current = transform;
            self.commands.push(PaintCommand::SetTransform(transform));
        }
    }
}

fn clip_paths(clip: &RenderNode) -> Vec<(FlattenedPath, FillRule)> {
    clip.children
        .iter()
        .flat_map(|c| c.descendants())
        .filter_map(|n| Some((n.geometry.clone()?, n.style.clip_rule)))
        .collect()
}

fn num(out: &mut String, v: f64) {
    // -0.0 and tiny negatives would otherwise print as "-0.000000".
    let v = if v.abs() < 5e-7 { 0.0 } else { v };
    let _ = write!(out, "{:.6} ", v);
}

fn encode_path(out: &mut String, path: &FlattenedPath) {
    for sp in &path.subpaths {
        out.push_str(if sp.closed { "Z[" } else { "O[" });
        for p in &sp.points {
            num(out, p.x);
            num(out, p.y);
        }
        out.push(']');
    }
}

fn encode_paint(out: &mut String, paint: &ResolvedPaint) {
    match paint {
        ResolvedPaint::Solid(c) => {
            out.push_str("solid ");
            for v in [c.r, c.g, c.b, c.a] {
                num(out, v);
            }
        }
        ResolvedPaint::Server(server) => {
            match server.geometry {
                GradientGeometry::Linear { x1, y1, x2, y2 } => {
                    out.push_str("linear ");
                    for v in [x1, y1, x2, y2] {
                        num(out, v);
                    }
                }
                GradientGeometry::Radial { cx, cy, r, fx, fy } => {
                    out.push_str("radial ");
                    for v in [cx, cy, r, fx, fy] {
                        num(out, v);
                    }
                }
            }
            let _ = write!(out, "{:?} ", server.spread);
            encode_transform(out, &server.transform);
            for stop in &server.stops {
                for v in [stop.offset, stop.color.r, stop.color.g, stop.color.b, stop.color.a] {
                    num(out, v);
                }
            }
        }
    }
}

fn encode_transform(out: &mut String, t: &Transform) {
    for v in [t.a, t.b, t.c, t.d, t.e, t.f] {
        num(out, v);
    }
}

fn encode_commands(out: &mut String, commands: &[PaintCommand]) {
    for command in commands {
        match command {
            PaintCommand::SetTransform(t) => {
                out.push_str("T ");
                encode_transform(out, t);
            }
            PaintCommand::FillPath {
                path,
                fill_rule,
                paint,
            } => {
                let _ = write!(out, "F {:?} ", fill_rule);
                encode_paint(out, paint);
                encode_path(out, path);
            }
            PaintCommand::StrokePath {
                path,
                paint,
                width,
                line_cap,
                line_join,
                miter_limit,
                dashes,
                dash_offset,
            } => {
                let _ = write!(out, "S {:?} {:?} ", line_cap, line_join);
                for v in [*width, *miter_limit, *dash_offset] {
                    num(out, v);
                }
                out.push_str("dashes ");
                for d in dashes {
                    num(out, *d);
                }
                encode_paint(out, paint);
                encode_path(out, path);
            }
            PaintCommand::PushClip { paths } => {
                out.push_str("C ");
                for (path, rule) in paths {
                    let _ = write!(out, "{:?} ", rule);
                    encode_path(out, path);
                }
            }
            PaintCommand::PopClip => out.push_str("c"),
            PaintCommand::PushMask { commands } => {
                out.push_str("M{");
                encode_commands(out, commands);
                out.push('}');
            }
            PaintCommand::PopMask => out.push_str("m"),
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderOptions, build_render_tree};
    use crate::selector::SimpleSelectorMatcher;
    use crate::xml::parse_document;

    fn emit(svg: &str) -> CommandList {
        let doc = parse_document(svg, None).expect("document");
        let tree = build_render_tree(&doc, &SimpleSelectorMatcher, &RenderOptions::default(), None);
        CommandList::emit(&tree)
    }

    fn tags(list: &CommandList) -> Vec<&'static str> {
        list.iter()
            .map(|c| match c {
                PaintCommand::SetTransform(_) => "transform",
                PaintCommand::FillPath { .. } => "fill",
                PaintCommand::StrokePath { .. } => "stroke",
                PaintCommand::PushClip { .. } => "push_clip",
                PaintCommand::PopClip => "pop_clip",
                PaintCommand::PushMask { .. } => "push_mask",
                PaintCommand::PopMask => "pop_mask",
            })
            .collect()
    }

    #[test]
    fn clip_and_mask_bracket_the_painted_subtree() {
        let list = emit(
            r##"<svg>
                <clipPath id="c"><rect width="5" height="5"/></clipPath>
                <mask id="m"><rect width="5" height="5" fill="white"/></mask>
                <g clip-path="url(#c)" mask="url(#m)">
                  <rect width="10" height="10" stroke="red"/>
                </g>
            </svg>"##,
        );
        assert_eq!(
            tags(&list),
            vec!["push_clip", "push_mask", "fill", "stroke", "pop_mask", "pop_clip"]
        );
        match &list.commands[1] {
            PaintCommand::PushMask { commands } => assert_eq!(commands.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transform_is_only_set_when_it_changes() {
        let list = emit(
            r##"<svg>
                <rect width="1" height="1"/>
                <g transform="scale(2)">
                  <rect width="1" height="1"/>
                  <rect width="2" height="2"/>
                </g>
            </svg>"##,
        );
        assert_eq!(tags(&list), vec!["fill", "transform", "fill", "fill"]);
    }

    #[test]
    fn stroke_width_and_dashes_follow_scale() {
        let list = emit(
            r##"<svg>
                <line transform="scale(3)" x2="1" stroke="black" stroke-width="2"
                      stroke-dasharray="1 2" stroke-dashoffset="1"/>
            </svg>"##,
        );
        let stroke = list
            .iter()
            .find_map(|c| match c {
                PaintCommand::StrokePath {
                    width,
                    dashes,
                    dash_offset,
                    ..
                } => Some((*width, dashes.clone(), *dash_offset)),
                _ => None,
            })
            .expect("stroke");
        assert_eq!(stroke, (6.0, vec![3.0, 6.0], 3.0));
    }

    #[test]
    fn nested_clips_pop_once_per_push() {
        let list = emit(
            r##"<svg>
                <clipPath id="b"><circle r="2"/></clipPath>
                <clipPath id="a" clip-path="url(#b)"><rect width="5" height="5"/></clipPath>
                <rect clip-path="url(#a)" width="10" height="10"/>
            </svg>"##,
        );
        assert_eq!(
            tags(&list),
            vec!["push_clip", "push_clip", "fill", "pop_clip", "pop_clip"]
        );
    }

    #[test]
    fn cyclic_uses_emit_nothing() {
        let list = emit(
            r##"<svg><use id="a" href="#b"/><use id="b" href="#a"/></svg>"##,
        );
        assert!(list.is_empty());
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = emit(r##"<svg><rect width="1" height="1" fill="red"/></svg>"##);
        let b = emit(r##"<svg><rect width="1" height="1" fill="#f00"/></svg>"##);
        let c = emit(r##"<svg><rect width="1" height="1" fill="blue"/></svg>"##);
        assert_eq!(a.fingerprint().len(), 64);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
