//! Document model: pages, the layer tree, and typed access to layer props.
//!
//! A [`Document`] is an ordered list of [`Page`]s sharing one page size. Each
//! page stores its layers in a flat map keyed by [`LayerId`]; the tree is an
//! adjacency list where `children` order is z-order (index 0 is back-most)
//! and every non-root layer points back at its parent. Exactly one layer per
//! page has the id `ROOT`: the page background, which is never deleted.
//!
//! Reads are public. Writes go through the command layer, which records a
//! reversible delta for every change, so the mutators here are crate-private.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::consts::DEFAULT_PAGE_COLOR;
use crate::error::ErrorCode;
use crate::geometry::{BoxData, BoxSize, Point};

/// Id of the background layer present on every page.
pub const ROOT_ID: &str = "ROOT";

// =============================================================================
// TYPES
// =============================================================================

/// Opaque layer identifier, unique within a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The page background id.
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_ID.to_owned())
    }

    /// A fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Closed set of layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Page background.
    Root,
    Image,
    Text,
    Shape,
    /// Container that applies a uniform scale and rotation to its children.
    Group,
    /// Shape-like mask hosting cropped image content.
    Frame,
    Svg,
    Video,
}

impl LayerKind {
    /// Type tag used in the serialized format.
    #[must_use]
    pub fn resolved_name(self) -> &'static str {
        match self {
            Self::Root => "RootLayer",
            Self::Image => "ImageLayer",
            Self::Text => "TextLayer",
            Self::Shape => "ShapeLayer",
            Self::Group => "GroupLayer",
            Self::Frame => "FrameLayer",
            Self::Svg => "SvgLayer",
            Self::Video => "VideoLayer",
        }
    }

    #[must_use]
    pub fn from_resolved_name(name: &str) -> Option<Self> {
        let kind = match name {
            "RootLayer" => Self::Root,
            "ImageLayer" => Self::Image,
            "TextLayer" => Self::Text,
            "ShapeLayer" => Self::Shape,
            "GroupLayer" => Self::Group,
            "FrameLayer" => Self::Frame,
            "SvgLayer" => Self::Svg,
            "VideoLayer" => Self::Video,
            _ => return None,
        };
        Some(kind)
    }

    /// Props key of the cropped media sub-box, for kinds that carry one.
    #[must_use]
    pub fn media_key(self) -> Option<&'static str> {
        match self {
            Self::Image | Self::Frame => Some("image"),
            Self::Video => Some("video"),
            _ => None,
        }
    }
}

/// A node of a page's layer tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    /// Open-ended props; always carries `boxSize`, `position`, `rotate`.
    pub props: Value,
    pub locked: bool,
    /// `None` only for ROOT.
    pub parent: Option<LayerId>,
    /// Z-ordered, back-most first.
    pub children: Vec<LayerId>,
}

impl Layer {
    #[must_use]
    pub fn new(id: LayerId, kind: LayerKind, props: Value, parent: Option<LayerId>) -> Self {
        Self { id, kind, props, locked: false, parent, children: Vec::new() }
    }

    #[must_use]
    pub fn props(&self) -> Props<'_> {
        Props::new(&self.props)
    }

    /// Geometric pose read from props.
    #[must_use]
    pub fn box_data(&self) -> BoxData {
        self.props().box_data()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("page not found: {0}")]
    PageNotFound(usize),
    #[error("layer not found: {0}")]
    LayerNotFound(LayerId),
    #[error("page has no ROOT layer")]
    MissingRoot,
    #[error("unknown layer type: {0}")]
    UnknownLayerType(String),
    #[error("inconsistent link between {parent} and {child}")]
    BrokenLink { parent: LayerId, child: LayerId },
    #[error("layer not reachable from ROOT: {0}")]
    Orphan(LayerId),
    #[error("cycle through layer {0}")]
    Cycle(LayerId),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for DocError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PageNotFound(_) => "E_PAGE_NOT_FOUND",
            Self::LayerNotFound(_) => "E_LAYER_NOT_FOUND",
            Self::MissingRoot => "E_MISSING_ROOT",
            Self::UnknownLayerType(_) => "E_UNKNOWN_LAYER_TYPE",
            Self::BrokenLink { .. } => "E_BROKEN_LINK",
            Self::Orphan(_) => "E_ORPHAN_LAYER",
            Self::Cycle(_) => "E_LAYER_CYCLE",
            Self::Json(_) => "E_MALFORMED_DOCUMENT",
        }
    }
}

// =============================================================================
// PROPS
// =============================================================================

/// Typed access to the common fields of a layer's `props` JSON value.
pub struct Props<'a> {
    value: &'a Value,
}

impl<'a> Props<'a> {
    /// Wrap a reference to a `props` JSON value for typed access.
    #[must_use]
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Unrotated box size. Zero when absent.
    #[must_use]
    pub fn box_size(&self) -> BoxSize {
        read_box_size(self.value.get("boxSize"))
    }

    /// Top-left position in the parent's coordinate space. Origin when absent.
    #[must_use]
    pub fn position(&self) -> Point {
        read_point(self.value.get("position"))
    }

    /// Clockwise rotation in degrees. Zero when absent.
    #[must_use]
    pub fn rotate(&self) -> f64 {
        read_f64(self.value.get("rotate")).unwrap_or(0.0)
    }

    /// Content scale, if the layer carries one.
    #[must_use]
    pub fn scale(&self) -> Option<f64> {
        read_f64(self.value.get("scale"))
    }

    #[must_use]
    pub fn transparency(&self) -> Option<f64> {
        read_f64(self.value.get("transparency"))
    }

    /// Serialized rich-text content. Empty string when absent.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.value.get("text").and_then(Value::as_str).unwrap_or("")
    }

    /// Font family names referenced by a text layer.
    #[must_use]
    pub fn font_names(&self) -> Vec<&'a str> {
        self.value
            .get("fonts")
            .and_then(Value::as_array)
            .map(|fonts| fonts.iter().filter_map(|f| f.get("name").and_then(Value::as_str)).collect())
            .unwrap_or_default()
    }

    /// Raw sub-object under `key`, when it is an object.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<&'a Value> {
        self.value.get(key).filter(|v| v.is_object())
    }

    /// Pose of the cropped media sub-box stored under `key`.
    #[must_use]
    pub fn media(&self, key: &str) -> Option<BoxData> {
        self.object(key).map(|m| Props::new(m).box_data())
    }

    #[must_use]
    pub fn box_data(&self) -> BoxData {
        BoxData {
            box_size: self.box_size(),
            position: self.position(),
            rotate: self.rotate(),
            scale: self.scale(),
        }
    }
}

fn read_f64(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn read_point(v: Option<&Value>) -> Point {
    let Some(v) = v else {
        return Point::default();
    };
    Point::new(read_f64(v.get("x")).unwrap_or(0.0), read_f64(v.get("y")).unwrap_or(0.0))
}

fn read_box_size(v: Option<&Value>) -> BoxSize {
    let Some(v) = v else {
        return BoxSize::default();
    };
    BoxSize::new(read_f64(v.get("width")).unwrap_or(0.0), read_f64(v.get("height")).unwrap_or(0.0))
}

/// JSON for a point.
#[must_use]
pub fn point_json(p: Point) -> Value {
    json!({ "x": p.x, "y": p.y })
}

/// JSON for a box size.
#[must_use]
pub fn box_size_json(s: BoxSize) -> Value {
    json!({ "width": s.width, "height": s.height })
}

/// Props patch carrying a full pose; `scale` is included only when set.
#[must_use]
pub fn box_props(b: &BoxData) -> Value {
    let mut props = json!({
        "boxSize": box_size_json(b.box_size),
        "position": point_json(b.position),
        "rotate": b.rotate,
    });
    if let (Some(scale), Some(map)) = (b.scale, props.as_object_mut()) {
        map.insert("scale".into(), json!(scale));
    }
    props
}

/// Deep-merge `patch` into `target`.
///
/// Objects merge key by key; every other value, arrays included, replaces
/// the existing one wholesale. `null` is stored as-is.
pub fn merge_props(target: &mut Value, patch: &Value) {
    if !(target.is_object() && patch.is_object()) {
        *target = patch.clone();
        return;
    }
    let (Some(existing), Some(incoming)) = (target.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in incoming {
        let nested = value.is_object() && existing.get(key).is_some_and(Value::is_object);
        if nested {
            if let Some(slot) = existing.get_mut(key) {
                merge_props(slot, value);
            }
        } else {
            existing.insert(key.clone(), value.clone());
        }
    }
}

// =============================================================================
// PAGE
// =============================================================================

/// One page: a layer tree rooted at `ROOT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    layers: HashMap<LayerId, Layer>,
}

impl Page {
    /// A page holding only a blank background of `size`.
    #[must_use]
    pub fn new(size: BoxSize) -> Self {
        let props = json!({
            "boxSize": box_size_json(size),
            "position": { "x": 0.0, "y": 0.0 },
            "rotate": 0.0,
            "color": DEFAULT_PAGE_COLOR,
            "image": null,
        });
        let root = Layer::new(LayerId::root(), LayerKind::Root, props, None);
        let mut layers = HashMap::new();
        layers.insert(root.id.clone(), root);
        Self { layers }
    }

    /// Build a page from a layer map, checking the tree invariant.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation found by [`Page::validate`].
    pub fn from_layers(layers: HashMap<LayerId, Layer>) -> Result<Self, DocError> {
        let page = Self { layers };
        page.validate()?;
        Ok(page)
    }

    #[must_use]
    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    #[must_use]
    pub fn root(&self) -> Option<&Layer> {
        self.layers.get(&LayerId::root())
    }

    #[must_use]
    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id)
    }

    /// Whether `id` is a direct child of ROOT, so its props are in page space.
    #[must_use]
    pub fn is_top_level(&self, id: &LayerId) -> bool {
        self.layers.get(id).and_then(|l| l.parent.as_ref()).is_some_and(LayerId::is_root)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Children of `id` in z-order; empty when the layer is missing.
    #[must_use]
    pub fn children(&self, id: &LayerId) -> &[LayerId] {
        self.layers.get(id).map_or(&[][..], |l| l.children.as_slice())
    }

    /// Top-level layers in z-order.
    #[must_use]
    pub fn top_level(&self) -> &[LayerId] {
        self.children(&LayerId::root())
    }

    /// Index of `id` within its parent's children.
    #[must_use]
    pub fn index_in_parent(&self, id: &LayerId) -> Option<usize> {
        let parent = self.layers.get(id)?.parent.as_ref()?;
        self.children(parent).iter().position(|c| c == id)
    }

    /// Whether the page background is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.root().is_some_and(|r| r.locked)
    }

    /// `id` and everything beneath it, parents before children.
    #[must_use]
    pub fn subtree(&self, id: &LayerId) -> Vec<LayerId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let Some(layer) = self.layers.get(&next) else {
                continue;
            };
            stack.extend(layer.children.iter().rev().cloned());
            out.push(next);
        }
        out
    }

    /// Check that the tree is rooted, acyclic, bidirectionally linked, and
    /// free of orphans.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), DocError> {
        let root = self.root().ok_or(DocError::MissingRoot)?;
        if root.parent.is_some() || root.kind != LayerKind::Root {
            return Err(DocError::MissingRoot);
        }
        for layer in self.layers.values() {
            for child in &layer.children {
                let linked = self.layers.get(child).is_some_and(|c| c.parent.as_ref() == Some(&layer.id));
                if !linked {
                    return Err(DocError::BrokenLink { parent: layer.id.clone(), child: child.clone() });
                }
            }
            if let Some(parent) = &layer.parent {
                let listed = self.children(parent).iter().filter(|c| *c == &layer.id).count();
                if listed != 1 {
                    return Err(DocError::BrokenLink { parent: parent.clone(), child: layer.id.clone() });
                }
            } else if !layer.id.is_root() {
                return Err(DocError::Orphan(layer.id.clone()));
            }
        }
        let mut seen = HashSet::new();
        let mut stack = vec![LayerId::root()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(DocError::Cycle(id));
            }
            stack.extend(self.children(&id).iter().cloned());
        }
        if let Some(orphan) = self.layers.keys().find(|id| !seen.contains(*id)) {
            return Err(DocError::Orphan(orphan.clone()));
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, layer: Layer) -> Option<Layer> {
        self.layers.insert(layer.id.clone(), layer)
    }

    pub(crate) fn remove(&mut self, id: &LayerId) -> Option<Layer> {
        self.layers.remove(id)
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Ordered pages sharing one page size.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pages: Vec<Page>,
    page_size: BoxSize,
}

impl Document {
    /// A document with one blank page.
    #[must_use]
    pub fn new(page_size: BoxSize) -> Self {
        Self { pages: vec![Page::new(page_size)], page_size }
    }

    #[must_use]
    pub fn from_pages(pages: Vec<Page>, page_size: BoxSize) -> Self {
        Self { pages, page_size }
    }

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn page_size(&self) -> BoxSize {
        self.page_size
    }

    #[must_use]
    pub fn get_layer(&self, page: usize, id: &LayerId) -> Option<&Layer> {
        self.pages.get(page)?.get(id)
    }

    #[must_use]
    pub fn get_children(&self, page: usize, id: &LayerId) -> Option<&[LayerId]> {
        Some(self.pages.get(page)?.get(id)?.children.as_slice())
    }

    /// # Errors
    ///
    /// Returns `PageNotFound` for an out-of-range index.
    pub fn try_page(&self, index: usize) -> Result<&Page, DocError> {
        self.pages.get(index).ok_or(DocError::PageNotFound(index))
    }

    pub(crate) fn page_mut(&mut self, index: usize) -> Result<&mut Page, DocError> {
        self.pages.get_mut(index).ok_or(DocError::PageNotFound(index))
    }

    /// Insert at `index`, clamped to the end. Returns the index used.
    pub(crate) fn insert_page(&mut self, index: usize, page: Page) -> usize {
        let at = index.min(self.pages.len());
        self.pages.insert(at, page);
        at
    }

    pub(crate) fn remove_page(&mut self, index: usize) -> Result<Page, DocError> {
        if index >= self.pages.len() {
            return Err(DocError::PageNotFound(index));
        }
        Ok(self.pages.remove(index))
    }

    pub(crate) fn set_page_size(&mut self, size: BoxSize) -> BoxSize {
        std::mem::replace(&mut self.page_size, size)
    }
}
