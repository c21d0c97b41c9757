mod commands;
mod debug;
mod document;
mod error;
mod flatten;
mod paint_server;
mod path;
mod perf;
mod render;
mod selector;
mod style;
mod stylesheet;
mod transform;
mod types;
mod xml;

pub use commands::{CommandList, PaintCommand};
pub use debug::DebugLogger;
pub use document::{Document, DocumentBuilder, Element, ElementKind, NodeId, TokenEvent};
pub use error::SceneError;
pub use flatten::{
    DEFAULT_MAX_DEPTH, DEFAULT_TOLERANCE, FlattenedPath, Flattener, LineSegment, Subpath,
};
pub use paint_server::{
    GradientGeometry, GradientStop, GradientUnits, PaintServer, ResolvedPaint, SpreadMethod,
};
pub use path::{Path, PathCommand, arc_to_cubics, parse_path_data, shape_path};
pub use perf::PerfLogger;
pub use render::{
    BuildStats, DEFAULT_MAX_REFERENCE_DEPTH, DEFAULT_MAX_REFERENCE_EXPANSIONS, RenderNode,
    RenderOptions, RenderTree, build_render_tree, intrinsic_size,
};
pub use selector::{
    ElementKey, Selector, SelectorMatcher, SimpleSelector, SimpleSelectorMatcher, Specificity,
    parse_selector,
};
pub use style::{
    ComputedStyle, Display, FillRule, LineCap, LineJoin, Paint, PropertyId, PropertyValue,
    StyleResolver, Visibility,
};
pub use stylesheet::{Declaration, StyleRule};
pub use transform::{Transform, parse_transform_list};
pub use types::{Color, Point, Rect, Size};
pub use xml::{events_from_str, parse_document};

use perf::timed;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Render tree plus the command stream emitted from it.
#[derive(Debug, Clone)]
pub struct RenderedScene {
    pub tree: RenderTree,
    pub commands: CommandList,
}

/// Parses documents and renders them with one fixed configuration.
///
/// Documents are immutable once built, so one engine can render any number
/// of them concurrently.
pub struct SceneEngine {
    options: RenderOptions,
    matcher: Arc<dyn SelectorMatcher>,
    debug: Option<DebugLogger>,
    perf: Option<Arc<PerfLogger>>,
    next_build_id: AtomicUsize,
}

pub struct SceneEngineBuilder {
    viewport: Option<Size>,
    base_transform: Transform,
    tolerance: f64,
    max_subdivision_depth: u32,
    max_reference_depth: usize,
    max_reference_expansions: usize,
    matcher: Option<Arc<dyn SelectorMatcher>>,
    debug_path: Option<std::path::PathBuf>,
    perf_path: Option<std::path::PathBuf>,
}

impl SceneEngine {
    pub fn builder() -> SceneEngineBuilder {
        SceneEngineBuilder::new()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Parses XML text into a document, logging construction diagnostics.
    pub fn parse_document(&self, xml: &str) -> Result<Document, SceneError> {
        let build_id = self.next_build_id();
        timed(self.perf.as_deref(), "document.parse", Some(build_id), || {
            parse_document(xml, self.debug.clone())
        })
    }

    /// Builds a document from already-tokenized events.
    pub fn build_document(&self, events: impl IntoIterator<Item = TokenEvent>) -> Document {
        let mut builder = DocumentBuilder::new().with_debug(self.debug.clone());
        builder.extend(events);
        builder.finish()
    }

    pub fn render(&self, document: &Document) -> RenderedScene {
        self.render_with(document, self.options)
    }

    /// Renders `document` once per base transform, in parallel. Results are
    /// returned in input order.
    pub fn render_many(&self, document: &Document, transforms: &[Transform]) -> Vec<RenderedScene> {
        use rayon::prelude::*;

        let scenes: Vec<RenderedScene> = transforms
            .par_iter()
            .map(|transform| {
                let options = RenderOptions {
                    base_transform: *transform,
                    ..self.options
                };
                self.render_with(document, options)
            })
            .collect();
        self.emit_debug_summary("render_many");
        scenes
    }

    fn render_with(&self, document: &Document, options: RenderOptions) -> RenderedScene {
        let build_id = Some(self.next_build_id());
        let perf = self.perf.as_deref();
        let tree = timed(perf, "render.build", build_id, || {
            build_render_tree(document, self.matcher.as_ref(), &options, self.debug.as_ref())
        });
        let commands = timed(perf, "render.commands", build_id, || CommandList::emit(&tree));
        if let Some(perf) = perf {
            let stats = &tree.stats;
            perf.log_counts(
                "render.counts",
                build_id,
                &[
                    ("nodes", stats.nodes),
                    ("shapes", stats.shapes),
                    ("references", stats.references),
                    ("commands", commands.len() as u64),
                ],
            );
        }
        if let Some(debug) = &self.debug {
            debug.increment("render.builds", 1);
        }
        RenderedScene { tree, commands }
    }

    /// Writes the debug counters accumulated so far and flushes both logs.
    pub fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = &self.debug {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }

    fn next_build_id(&self) -> usize {
        self.next_build_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SceneEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneEngineBuilder {
    pub fn new() -> Self {
        Self {
            viewport: None,
            base_transform: Transform::identity(),
            tolerance: DEFAULT_TOLERANCE,
            max_subdivision_depth: DEFAULT_MAX_DEPTH,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
            max_reference_expansions: DEFAULT_MAX_REFERENCE_EXPANSIONS,
            matcher: None,
            debug_path: None,
            perf_path: None,
        }
    }

    /// Device viewport; the document's intrinsic size is used when unset.
    pub fn viewport(mut self, size: Size) -> Self {
        self.viewport = Some(size);
        self
    }

    pub fn base_transform(mut self, transform: Transform) -> Self {
        self.base_transform = transform;
        self
    }

    /// Maximum distance in device units between a curve and its polyline.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_subdivision_depth(mut self, depth: u32) -> Self {
        self.max_subdivision_depth = depth;
        self
    }

    pub fn max_reference_depth(mut self, depth: usize) -> Self {
        self.max_reference_depth = depth;
        self
    }

    /// Total `use`, clip, mask and paint-server expansions allowed per build.
    pub fn max_reference_expansions(mut self, count: usize) -> Self {
        self.max_reference_expansions = count;
        self
    }

    pub fn selector_matcher(mut self, matcher: Arc<dyn SelectorMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn debug_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SceneEngine, SceneError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SceneError::InvalidConfiguration(
                "tolerance must be finite and > 0".to_string(),
            ));
        }
        if self.max_subdivision_depth == 0 {
            return Err(SceneError::InvalidConfiguration(
                "max_subdivision_depth must be >= 1".to_string(),
            ));
        }
        if self.max_reference_depth == 0 {
            return Err(SceneError::InvalidConfiguration(
                "max_reference_depth must be >= 1".to_string(),
            ));
        }
        if self.max_reference_expansions == 0 {
            return Err(SceneError::InvalidConfiguration(
                "max_reference_expansions must be >= 1".to_string(),
            ));
        }
        if let Some(size) = self.viewport {
            let valid = |v: f64| v.is_finite() && v > 0.0;
            if !valid(size.width) || !valid(size.height) {
                return Err(SceneError::InvalidConfiguration(
                    "viewport width and height must be finite and > 0".to_string(),
                ));
            }
        }
        if !self.base_transform.is_finite() {
            return Err(SceneError::InvalidConfiguration(
                "base_transform must be finite".to_string(),
            ));
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let perf = match self.perf_path {
            Some(path) => Some(Arc::new(PerfLogger::new(path)?)),
            None => None,
        };
        Ok(SceneEngine {
            options: RenderOptions {
                viewport: self.viewport,
                base_transform: self.base_transform,
                flattener: Flattener::new(self.tolerance, self.max_subdivision_depth),
                max_reference_depth: self.max_reference_depth,
                max_reference_expansions: self.max_reference_expansions,
            },
            matcher: self
                .matcher
                .unwrap_or_else(|| Arc::new(SimpleSelectorMatcher)),
            debug,
            perf,
            next_build_id: AtomicUsize::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
        <style>.accent { fill: #0a0 }</style>
        <defs>
          <linearGradient id="g" x2="1"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient>
          <circle id="dot" r="10"/>
        </defs>
        <rect width="100" height="100" fill="url(#g)"/>
        <use href="#dot" x="50" y="50" class="accent"/>
        <path d="M10 90 Q50 60 90 90" fill="none" stroke="black" stroke-width="2"/>
    </svg>"##;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "vecscene_lib_{}_{}_{}",
            std::process::id(),
            tag,
            line!()
        ))
    }

    #[test]
    fn builder_rejects_invalid_options() {
        let err = SceneEngine::builder().tolerance(0.0).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder().tolerance(f64::NAN).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder().max_subdivision_depth(0).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder().max_reference_depth(0).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder().max_reference_expansions(0).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder().viewport(Size::new(0.0, 10.0)).build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
        let err = SceneEngine::builder()
            .base_transform(Transform::from_scale(f64::INFINITY, 1.0))
            .build();
        assert!(matches!(err, Err(SceneError::InvalidConfiguration(_))));
    }

    #[test]
    fn renders_paints_in_document_order() {
        let engine = SceneEngine::builder()
            .viewport(Size::new(200.0, 200.0))
            .build()
            .expect("engine");
        let doc = engine.parse_document(SCENE).expect("document");
        let scene = engine.render(&doc);
        let paints: Vec<&PaintCommand> = scene
            .commands
            .iter()
            .filter(|c| !matches!(c, PaintCommand::SetTransform(_)))
            .collect();
        assert_eq!(paints.len(), 3);
        assert!(matches!(
            paints[0],
            PaintCommand::FillPath {
                paint: ResolvedPaint::Server(_),
                ..
            }
        ));
        assert!(matches!(
            paints[1],
            PaintCommand::FillPath {
                paint: ResolvedPaint::Solid(Color { g, .. }),
                ..
            } if (*g - 170.0 / 255.0).abs() < 1e-9
        ));
        match paints[2] {
            PaintCommand::StrokePath { width, .. } => assert_eq!(*width, 4.0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(scene.tree.viewport, Size::new(200.0, 200.0));
    }

    #[test]
    fn render_many_matches_sequential_renders() {
        let engine = SceneEngine::builder().build().expect("engine");
        let doc = engine.parse_document(SCENE).expect("document");
        let transforms = [
            Transform::identity(),
            Transform::from_scale(2.0, 2.0),
            Transform::from_rotate(0.5),
        ];
        let many = engine.render_many(&doc, &transforms);
        assert_eq!(many.len(), 3);
        for (scene, transform) in many.iter().zip(transforms) {
            let single = SceneEngine::builder()
                .base_transform(transform)
                .build()
                .expect("engine")
                .render(&doc);
            assert_eq!(scene.commands.fingerprint(), single.commands.fingerprint());
        }
        assert_ne!(
            many[0].commands.fingerprint(),
            many[1].commands.fingerprint()
        );
    }

    #[test]
    fn debug_and_perf_logs_are_written() {
        let debug_path = temp_path("debug.jsonl");
        let perf_path = temp_path("perf.log");
        let engine = SceneEngine::builder()
            .debug_path(&debug_path)
            .perf_path(&perf_path)
            .build()
            .expect("engine");
        let doc = engine
            .parse_document(r##"<svg><use href="#missing"/><rect id="a"/><rect id="a"/></svg>"##)
            .expect("document");
        engine.render(&doc);
        engine.emit_debug_summary("test");

        let debug_text = std::fs::read_to_string(&debug_path).expect("debug log");
        let perf_text = std::fs::read_to_string(&perf_path).expect("perf log");
        let _ = std::fs::remove_file(&debug_path);
        let _ = std::fs::remove_file(&perf_path);
        assert!(debug_text.contains("document.duplicate_id"));
        assert!(debug_text.contains("render.unresolved_reference"));
        assert!(debug_text.contains("render.summary"));
        assert!(debug_text.contains("debug.summary"));
        assert!(perf_text.contains("document.parse"));
        assert!(perf_text.contains("render.build"));
        assert!(perf_text.contains("render.commands"));
    }

    #[test]
    fn tokenized_events_build_the_same_document() {
        let engine = SceneEngine::builder().build().expect("engine");
        let events = events_from_str(SCENE).expect("events");
        let from_events = engine.build_document(events);
        let parsed = engine.parse_document(SCENE).expect("document");
        assert_eq!(
            engine.render(&from_events).commands.fingerprint(),
            engine.render(&parsed).commands.fingerprint()
        );
    }
}
