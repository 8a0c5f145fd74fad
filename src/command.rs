//! Command layer: the closed set of named document mutations.
//!
//! Every mutation is a [`Command`] applied against a [`Document`]. Commands
//! never write to the document directly; they run primitive [`Op`]s through a
//! transaction that records each op next to its inverse. The resulting
//! [`Delta`] is the unit the history manager stores: replaying `forward`
//! reproduces the change, replaying `inverse` (in reverse) undoes it exactly.
//!
//! DESIGN
//! ======
//!
//! Ops are whole-value puts (a layer, a page, the page size), so inverses are
//! just the previous values and the round-trip law holds by construction.
//! A command that fails part-way rolls back what it already applied, so the
//! document is never left half-mutated.

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::consts::{IMAGE_FILL_RATIO, SHAPE_FILL_RATIO};
use crate::doc::{
    DocError, Document, Layer, LayerId, LayerKind, Page, box_size_json, merge_props, point_json,
};
use crate::error::ErrorCode;
use crate::geometry::{
    BoxData, BoxSize, Point, Rect, centered_position, control_box_from_layers, cover_fit,
    position_of_object_inside_another, safe_div,
};
use crate::serial::{SerializedLayerTree, deserialize_page, deserialize_tree, serialize_page};

// =============================================================================
// OPS AND DELTAS
// =============================================================================

/// Primitive reversible write.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Store `layer` under `id`, or remove the entry when `None`.
    PutLayer { page: usize, id: LayerId, layer: Option<Layer> },
    InsertPage { index: usize, page: Page },
    RemovePage { index: usize },
    SetPageSize { size: BoxSize },
}

impl Op {
    /// Apply to `doc` and return the op that reverses it.
    fn apply(self, doc: &mut Document) -> Result<Op, DocError> {
        match self {
            Op::PutLayer { page, id, layer } => {
                let target = doc.page_mut(page)?;
                let previous = match layer {
                    Some(layer) => target.insert(layer),
                    None => target.remove(&id),
                };
                Ok(Op::PutLayer { page, id, layer: previous })
            }
            Op::InsertPage { index, page } => {
                let at = doc.insert_page(index, page);
                Ok(Op::RemovePage { index: at })
            }
            Op::RemovePage { index } => {
                let page = doc.remove_page(index)?;
                Ok(Op::InsertPage { index, page })
            }
            Op::SetPageSize { size } => Ok(Op::SetPageSize { size: doc.set_page_size(size) }),
        }
    }
}

/// Forward ops and their inverses, in recording order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    forward: Vec<Op>,
    inverse: Vec<Op>,
}

impl Delta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    fn record(&mut self, forward: Op, inverse: Op) {
        self.forward.push(forward);
        self.inverse.push(inverse);
    }

    /// Re-apply the change.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the document no longer matches the state
    /// the delta was recorded against.
    pub fn apply_forward(&self, doc: &mut Document) -> Result<(), DocError> {
        for op in &self.forward {
            op.clone().apply(doc)?;
        }
        Ok(())
    }

    /// Undo the change.
    ///
    /// # Errors
    ///
    /// Same as [`Delta::apply_forward`].
    pub fn apply_inverse(&self, doc: &mut Document) -> Result<(), DocError> {
        for op in self.inverse.iter().rev() {
            op.clone().apply(doc)?;
        }
        Ok(())
    }

    /// Append `later`, which was applied after `self`.
    pub fn merge(&mut self, later: Delta) {
        self.forward.extend(later.forward);
        self.inverse.extend(later.inverse);
    }

    /// Collapse repeated writes to the same layer.
    ///
    /// Only layer puts commute by key, so deltas touching pages are left
    /// alone. Per layer the last forward value and the first inverse value
    /// are kept.
    pub fn compact(&mut self) {
        let layer_only = self.forward.iter().all(|op| matches!(op, Op::PutLayer { .. }));
        if !layer_only || self.forward.len() < 2 {
            return;
        }
        let key = |op: &Op| match op {
            Op::PutLayer { page, id, .. } => Some((*page, id.clone())),
            _ => None,
        };
        let mut seen = std::collections::HashSet::new();
        let mut forward: Vec<Op> = Vec::new();
        for op in self.forward.drain(..).rev() {
            if seen.insert(key(&op)) {
                forward.push(op);
            }
        }
        forward.reverse();
        seen.clear();
        let mut inverse = Vec::new();
        for op in self.inverse.drain(..) {
            if seen.insert(key(&op)) {
                inverse.push(op);
            }
        }
        self.forward = forward;
        self.inverse = inverse;
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Doc(#[from] DocError),
    #[error("layer is not a group: {0}")]
    NotAGroup(LayerId),
    #[error("frame has no content: {0}")]
    EmptyFrame(LayerId),
    #[error("layers do not share a parent")]
    MixedParents,
    #[error("no layers given")]
    EmptySelection,
    #[error("the ROOT layer cannot be created, grouped, or moved")]
    RootLayer,
    #[error("cannot delete the last page")]
    LastPage,
    #[error("page {0} cannot move further")]
    PageBoundary(usize),
    #[error("size must be positive and finite")]
    DegenerateSize,
    #[error("props patch must be a JSON object")]
    InvalidPatch,
}

impl ErrorCode for CommandError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Doc(e) => e.error_code(),
            Self::NotAGroup(_) => "E_NOT_A_GROUP",
            Self::EmptyFrame(_) => "E_EMPTY_FRAME",
            Self::MixedParents => "E_MIXED_PARENTS",
            Self::EmptySelection => "E_EMPTY_SELECTION",
            Self::RootLayer => "E_ROOT_LAYER",
            Self::LastPage => "E_LAST_PAGE",
            Self::PageBoundary(_) => "E_PAGE_BOUNDARY",
            Self::DegenerateSize => "E_DEGENERATE_SIZE",
            Self::InvalidPatch => "E_INVALID_PATCH",
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Source locations of an image or video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    pub url: String,
    pub thumb: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

/// Nudge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Deep-merge `props` into each layer; arrays are replaced wholesale.
    SetProp { page: usize, ids: Vec<LayerId>, props: Value },
    /// Append a layer; centered when `position` is `None`.
    AddLayer { page: usize, parent: LayerId, kind: LayerKind, props: Value, position: Option<Point> },
    AddImageLayer { page: usize, parent: LayerId, media: MediaSource, natural_size: BoxSize },
    AddVideoLayer { page: usize, parent: LayerId, media: MediaSource, natural_size: BoxSize },
    /// Append a shape fitted to a fraction of the page.
    AddShapeLayer { page: usize, parent: LayerId, props: Value },
    /// Append copied subtrees with fresh ids.
    AddLayerTrees { page: usize, parent: LayerId, trees: Vec<SerializedLayerTree> },
    DeleteLayers { page: usize, ids: Vec<LayerId> },
    Group { page: usize, ids: Vec<LayerId> },
    Ungroup { page: usize, id: LayerId },
    BringForward { page: usize, ids: Vec<LayerId> },
    BringToFront { page: usize, ids: Vec<LayerId> },
    SendBackward { page: usize, ids: Vec<LayerId> },
    SendToBack { page: usize, ids: Vec<LayerId> },
    Align { page: usize, ids: Vec<LayerId>, alignment: Alignment },
    MoveLayers { page: usize, ids: Vec<LayerId>, direction: Direction, distance: f64 },
    Lock { page: usize, ids: Vec<LayerId> },
    Unlock { page: usize, ids: Vec<LayerId> },
    LockPage { page: usize },
    UnlockPage { page: usize },
    AddPage { index: usize },
    DeletePage { page: usize },
    DuplicatePage { page: usize },
    MovePageUp { page: usize },
    MovePageDown { page: usize },
    SetPageSize { size: BoxSize },
    /// Turn a frame's content into a free image layer above the frame.
    DetachFrameImage { page: usize, id: LayerId },
}

/// Result of applying a command.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub delta: Delta,
    /// Selection the command proposes, as `(page, ids)`.
    pub selection: Option<(usize, Vec<LayerId>)>,
    /// Page the command proposes to activate.
    pub active_page: Option<usize>,
}

impl Outcome {
    fn select(page: usize, ids: Vec<LayerId>) -> Self {
        Self { selection: Some((page, ids)), ..Self::default() }
    }

    fn activate(page: usize) -> Self {
        Self { active_page: Some(page), ..Self::default() }
    }
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetProp { .. } => "set_prop",
            Self::AddLayer { .. } => "add_layer",
            Self::AddImageLayer { .. } => "add_image_layer",
            Self::AddVideoLayer { .. } => "add_video_layer",
            Self::AddShapeLayer { .. } => "add_shape_layer",
            Self::AddLayerTrees { .. } => "add_layer_trees",
            Self::DeleteLayers { .. } => "delete_layers",
            Self::Group { .. } => "group",
            Self::Ungroup { .. } => "ungroup",
            Self::BringForward { .. } => "bring_forward",
            Self::BringToFront { .. } => "bring_to_front",
            Self::SendBackward { .. } => "send_backward",
            Self::SendToBack { .. } => "send_to_back",
            Self::Align { .. } => "align",
            Self::MoveLayers { .. } => "move_layers",
            Self::Lock { .. } => "lock",
            Self::Unlock { .. } => "unlock",
            Self::LockPage { .. } => "lock_page",
            Self::UnlockPage { .. } => "unlock_page",
            Self::AddPage { .. } => "add_page",
            Self::DeletePage { .. } => "delete_page",
            Self::DuplicatePage { .. } => "duplicate_page",
            Self::MovePageUp { .. } => "move_page_up",
            Self::MovePageDown { .. } => "move_page_down",
            Self::SetPageSize { .. } => "set_page_size",
            Self::DetachFrameImage { .. } => "detach_frame_image",
        }
    }

    /// Apply to `doc`, returning the recorded delta.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the document is rolled back to its state
    /// before the call.
    pub fn apply(&self, doc: &mut Document) -> Result<Outcome, CommandError> {
        let mut tx = Tx { doc, delta: Delta::default() };
        match self.run(&mut tx) {
            Ok(mut outcome) => {
                debug!(command = self.name(), ops = tx.delta.len(), "command applied");
                outcome.delta = tx.delta;
                Ok(outcome)
            }
            Err(err) => {
                debug!(command = self.name(), error = %err, "command failed");
                tx.rollback();
                Err(err)
            }
        }
    }

    fn run(&self, tx: &mut Tx<'_>) -> Result<Outcome, CommandError> {
        match self {
            Self::SetProp { page, ids, props } => {
                set_prop(tx, *page, ids, props)?;
                Ok(Outcome::default())
            }
            Self::AddLayer { page, parent, kind, props, position } => {
                let id = add_layer(tx, *page, parent, *kind, props.clone(), *position)?;
                Ok(Outcome::select(*page, vec![id]))
            }
            Self::AddImageLayer { page, parent, media, natural_size } => {
                let id = add_media(tx, *page, parent, LayerKind::Image, media, *natural_size)?;
                Ok(Outcome::select(*page, vec![id]))
            }
            Self::AddVideoLayer { page, parent, media, natural_size } => {
                let id = add_media(tx, *page, parent, LayerKind::Video, media, *natural_size)?;
                Ok(Outcome::select(*page, vec![id]))
            }
            Self::AddShapeLayer { page, parent, props } => {
                let id = add_shape(tx, *page, parent, props)?;
                Ok(Outcome::select(*page, vec![id]))
            }
            Self::AddLayerTrees { page, parent, trees } => {
                let ids = add_layer_trees(tx, *page, parent, trees)?;
                Ok(Outcome::select(*page, ids))
            }
            Self::DeleteLayers { page, ids } => {
                delete_layers(tx, *page, ids)?;
                Ok(Outcome::default())
            }
            Self::Group { page, ids } => {
                let id = group(tx, *page, ids)?;
                Ok(Outcome::select(*page, vec![id]))
            }
            Self::Ungroup { page, id } => {
                let ids = ungroup(tx, *page, id)?;
                Ok(Outcome::select(*page, ids))
            }
            Self::BringForward { page, ids } => reorder(tx, *page, ids, bring_forward),
            Self::BringToFront { page, ids } => reorder(tx, *page, ids, bring_to_front),
            Self::SendBackward { page, ids } => reorder(tx, *page, ids, send_backward),
            Self::SendToBack { page, ids } => reorder(tx, *page, ids, send_to_back),
            Self::Align { page, ids, alignment } => {
                align(tx, *page, ids, *alignment)?;
                Ok(Outcome::default())
            }
            Self::MoveLayers { page, ids, direction, distance } => {
                move_layers(tx, *page, ids, *direction, *distance)?;
                Ok(Outcome::default())
            }
            Self::Lock { page, ids } => set_locked(tx, *page, ids, true),
            Self::Unlock { page, ids } => set_locked(tx, *page, ids, false),
            Self::LockPage { page } => set_locked(tx, *page, &[LayerId::root()], true),
            Self::UnlockPage { page } => set_locked(tx, *page, &[LayerId::root()], false),
            Self::AddPage { index } => {
                let page = Page::new(tx.doc.page_size());
                let at = (*index).min(tx.doc.page_count());
                tx.run(Op::InsertPage { index: at, page })?;
                Ok(Outcome::activate(at))
            }
            Self::DeletePage { page } => {
                let count = tx.doc.page_count();
                if *page >= count {
                    return Err(DocError::PageNotFound(*page).into());
                }
                if count <= 1 {
                    return Err(CommandError::LastPage);
                }
                tx.run(Op::RemovePage { index: *page })?;
                Ok(Outcome::activate((*page).min(count - 2)))
            }
            Self::DuplicatePage { page } => {
                let copy = deserialize_page(&serialize_page(tx.doc.try_page(*page)?))?;
                tx.run(Op::InsertPage { index: page + 1, page: copy })?;
                Ok(Outcome::activate(page + 1))
            }
            Self::MovePageUp { page } => {
                if *page == 0 {
                    return Err(CommandError::PageBoundary(*page));
                }
                move_page(tx, *page, page - 1)
            }
            Self::MovePageDown { page } => {
                if page + 1 >= tx.doc.page_count() {
                    return Err(CommandError::PageBoundary(*page));
                }
                move_page(tx, *page, page + 1)
            }
            Self::SetPageSize { size } => {
                set_page_size(tx, *size)?;
                Ok(Outcome::default())
            }
            Self::DetachFrameImage { page, id } => {
                let image = detach_frame_image(tx, *page, id)?;
                Ok(Outcome::select(*page, vec![image]))
            }
        }
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

struct Tx<'a> {
    doc: &'a mut Document,
    delta: Delta,
}

impl Tx<'_> {
    fn run(&mut self, op: Op) -> Result<(), CommandError> {
        let forward = op.clone();
        let inverse = op.apply(self.doc)?;
        self.delta.record(forward, inverse);
        Ok(())
    }

    fn page(&self, page: usize) -> Result<&Page, CommandError> {
        Ok(self.doc.try_page(page)?)
    }

    fn layer(&self, page: usize, id: &LayerId) -> Result<Layer, CommandError> {
        self.page(page)?
            .get(id)
            .cloned()
            .ok_or_else(|| DocError::LayerNotFound(id.clone()).into())
    }

    fn put(&mut self, page: usize, layer: Layer) -> Result<(), CommandError> {
        self.run(Op::PutLayer { page, id: layer.id.clone(), layer: Some(layer) })
    }

    fn remove(&mut self, page: usize, id: &LayerId) -> Result<(), CommandError> {
        self.run(Op::PutLayer { page, id: id.clone(), layer: None })
    }

    fn patch(&mut self, page: usize, id: &LayerId, props: &Value) -> Result<(), CommandError> {
        let mut layer = self.layer(page, id)?;
        merge_props(&mut layer.props, props);
        self.put(page, layer)
    }

    fn rollback(self) {
        let Tx { doc, delta } = self;
        if let Err(err) = delta.apply_inverse(doc) {
            warn!(error = %err, "command rollback failed");
        }
    }
}

// =============================================================================
// LAYER COMMANDS
// =============================================================================

fn set_prop(tx: &mut Tx<'_>, page: usize, ids: &[LayerId], props: &Value) -> Result<(), CommandError> {
    if !props.is_object() {
        return Err(CommandError::InvalidPatch);
    }
    for id in ids {
        tx.patch(page, id, props)?;
    }
    Ok(())
}

/// Size of a layer's content space: its box divided by its scale.
fn local_size(layer: &Layer) -> BoxSize {
    let data = layer.box_data();
    let scale = data.scale_or_one();
    BoxSize::new(safe_div(data.box_size.width, scale), safe_div(data.box_size.height, scale))
}

fn add_layer(
    tx: &mut Tx<'_>,
    page: usize,
    parent: &LayerId,
    kind: LayerKind,
    mut props: Value,
    position: Option<Point>,
) -> Result<LayerId, CommandError> {
    if kind == LayerKind::Root {
        return Err(CommandError::RootLayer);
    }
    let mut parent_layer = tx.layer(page, parent)?;
    if !props.is_object() {
        props = json!({});
    }
    let size = crate::doc::Props::new(&props).box_size();
    let container = if parent.is_root() { tx.doc.page_size() } else { local_size(&parent_layer) };
    let position = position.unwrap_or_else(|| centered_position(container, size));
    let rotate = crate::doc::Props::new(&props).rotate();
    merge_props(
        &mut props,
        &json!({ "boxSize": box_size_json(size), "position": point_json(position), "rotate": rotate }),
    );
    let id = LayerId::random();
    tx.put(page, Layer::new(id.clone(), kind, props, Some(parent.clone())))?;
    parent_layer.children.push(id.clone());
    tx.put(page, parent_layer)?;
    Ok(id)
}

/// Fit media to the page: 80% of the page along the constraining axis.
fn fit_media(page: BoxSize, natural: BoxSize) -> BoxSize {
    let ratio = page.ratio();
    let media_ratio = natural.ratio();
    let width = if ratio < media_ratio {
        page.width * IMAGE_FILL_RATIO
    } else {
        page.height * media_ratio * IMAGE_FILL_RATIO
    };
    BoxSize::new(width, safe_div(width, media_ratio))
}

fn add_media(
    tx: &mut Tx<'_>,
    page: usize,
    parent: &LayerId,
    kind: LayerKind,
    media: &MediaSource,
    natural: BoxSize,
) -> Result<LayerId, CommandError> {
    if natural.is_degenerate() {
        return Err(CommandError::DegenerateSize);
    }
    let key = kind.media_key().unwrap_or("image");
    let size = fit_media(tx.doc.page_size(), natural);
    let mut props = json!({
        "boxSize": box_size_json(size),
        "rotate": 0.0,
    });
    if let Some(map) = props.as_object_mut() {
        map.insert(
            key.to_owned(),
            json!({
                "url": media.url,
                "thumb": media.thumb,
                "boxSize": box_size_json(size),
                "position": { "x": 0.0, "y": 0.0 },
                "rotate": 0.0,
            }),
        );
    }
    add_layer(tx, page, parent, kind, props, None)
}

fn add_shape(tx: &mut Tx<'_>, page: usize, parent: &LayerId, props: &Value) -> Result<LayerId, CommandError> {
    let original = crate::doc::Props::new(props).box_size();
    if original.is_degenerate() {
        return Err(CommandError::DegenerateSize);
    }
    let page_size = tx.doc.page_size();
    let shape_ratio = original.ratio();
    let size = if shape_ratio > page_size.ratio() {
        let width = page_size.width * SHAPE_FILL_RATIO;
        BoxSize::new(width, width / shape_ratio)
    } else {
        let height = page_size.height * SHAPE_FILL_RATIO;
        BoxSize::new(height * shape_ratio, height)
    };
    let mut props = props.clone();
    merge_props(
        &mut props,
        &json!({ "boxSize": box_size_json(size), "scale": size.width / original.width }),
    );
    add_layer(tx, page, parent, LayerKind::Shape, props, None)
}

fn add_layer_trees(
    tx: &mut Tx<'_>,
    page: usize,
    parent: &LayerId,
    trees: &[SerializedLayerTree],
) -> Result<Vec<LayerId>, CommandError> {
    let mut parent_layer = tx.layer(page, parent)?;
    let mut roots = Vec::with_capacity(trees.len());
    for tree in trees {
        let layers = deserialize_tree(tree, parent)?;
        let Some(root) = layers.first().map(|l| l.id.clone()) else {
            continue;
        };
        if layers.iter().any(|l| l.kind == LayerKind::Root) {
            return Err(CommandError::RootLayer);
        }
        for layer in layers {
            tx.put(page, layer)?;
        }
        parent_layer.children.push(root.clone());
        roots.push(root);
    }
    tx.put(page, parent_layer)?;
    Ok(roots)
}

fn delete_layers(tx: &mut Tx<'_>, page: usize, ids: &[LayerId]) -> Result<(), CommandError> {
    if ids.iter().any(LayerId::is_root) {
        debug!(page, "refusing to delete ROOT");
        return Ok(());
    }
    for id in ids {
        let Some(layer) = tx.page(page)?.get(id).cloned() else {
            continue;
        };
        if let Some(parent) = &layer.parent {
            let mut parent_layer = tx.layer(page, parent)?;
            parent_layer.children.retain(|c| c != id);
            tx.put(page, parent_layer)?;
        }
        for doomed in tx.page(page)?.subtree(id) {
            tx.remove(page, &doomed)?;
        }
    }
    Ok(())
}

fn group(tx: &mut Tx<'_>, page: usize, ids: &[LayerId]) -> Result<LayerId, CommandError> {
    if ids.is_empty() {
        return Err(CommandError::EmptySelection);
    }
    if ids.iter().any(LayerId::is_root) {
        return Err(CommandError::RootLayer);
    }
    let mut members: Vec<LayerId> = Vec::new();
    let mut pending: Vec<LayerId> = ids.iter().rev().cloned().collect();
    while let Some(id) = pending.pop() {
        if tx.layer(page, &id)?.kind == LayerKind::Group {
            let children = ungroup(tx, page, &id)?;
            pending.extend(children.into_iter().rev());
        } else if !members.contains(&id) {
            members.push(id);
        }
    }

    let first_id = members.first().ok_or(CommandError::EmptySelection)?;
    let parent_id = tx.layer(page, first_id)?.parent.ok_or(CommandError::RootLayer)?;
    let mut rect: Option<Rect> = None;
    for id in &members {
        let layer = tx.layer(page, id)?;
        if layer.parent.as_ref() != Some(&parent_id) {
            return Err(CommandError::MixedParents);
        }
        let r = layer.box_data().bounding_rect();
        rect = Some(rect.map_or(r, |acc| acc.union(&r)));
    }
    let rect = rect.ok_or(CommandError::EmptySelection)?;

    let mut parent = tx.layer(page, &parent_id)?;
    members.sort_by_key(|id| parent.children.iter().position(|c| c == id));
    let last_index = members
        .iter()
        .filter_map(|id| parent.children.iter().position(|c| c == id))
        .max()
        .unwrap_or(0);
    let insert_at = (last_index + 1).saturating_sub(members.len());

    let group_id = LayerId::random();
    for id in &members {
        let mut layer = tx.layer(page, id)?;
        let pos = layer.props().position();
        merge_props(&mut layer.props, &json!({ "position": point_json(pos.offset(-rect.x, -rect.y)) }));
        layer.parent = Some(group_id.clone());
        tx.put(page, layer)?;
    }
    let props = json!({
        "boxSize": { "width": rect.width, "height": rect.height },
        "position": { "x": rect.x, "y": rect.y },
        "rotate": 0.0,
        "scale": 1.0,
    });
    let mut group = Layer::new(group_id.clone(), LayerKind::Group, props, Some(parent_id));
    group.children.clone_from(&members);
    tx.put(page, group)?;

    parent.children.retain(|c| !members.contains(c));
    let at = insert_at.min(parent.children.len());
    parent.children.insert(at, group_id.clone());
    tx.put(page, parent)?;
    Ok(group_id)
}

fn ungroup(tx: &mut Tx<'_>, page: usize, id: &LayerId) -> Result<Vec<LayerId>, CommandError> {
    let group = tx.layer(page, id)?;
    if group.kind != LayerKind::Group {
        return Err(CommandError::NotAGroup(id.clone()));
    }
    let parent_id = group.parent.clone().ok_or(CommandError::RootLayer)?;
    let outer = group.box_data();
    let scale = outer.scale_or_one();

    for child_id in &group.children {
        let mut child = tx.layer(page, child_id)?;
        let inner = child.box_data();
        let placed = position_of_object_inside_another(&outer, &inner);
        let mut patch = json!({
            "boxSize": box_size_json(inner.box_size.scaled(scale)),
            "position": point_json(placed.position),
            "rotate": placed.rotate,
        });
        if let Some(map) = patch.as_object_mut() {
            if let Some(child_scale) = inner.scale {
                map.insert("scale".into(), json!(child_scale * scale));
            } else if let Some(key) = child.kind.media_key() {
                if let Some(media) = child.props().media(key) {
                    map.insert(
                        key.into(),
                        json!({
                            "boxSize": box_size_json(media.box_size.scaled(scale)),
                            "position": point_json(Point::new(media.position.x * scale, media.position.y * scale)),
                        }),
                    );
                }
            }
        }
        merge_props(&mut child.props, &patch);
        child.parent = Some(parent_id.clone());
        tx.put(page, child)?;
    }

    let mut parent = tx.layer(page, &parent_id)?;
    let at = parent.children.iter().position(|c| c == id).unwrap_or(parent.children.len());
    parent.children.retain(|c| c != id);
    let at = at.min(parent.children.len());
    for (offset, child) in group.children.iter().enumerate() {
        parent.children.insert(at + offset, child.clone());
    }
    tx.put(page, parent)?;
    tx.remove(page, id)?;
    Ok(group.children)
}

// =============================================================================
// Z-ORDER
// =============================================================================

fn reorder(
    tx: &mut Tx<'_>,
    page: usize,
    ids: &[LayerId],
    apply: fn(&mut Vec<LayerId>, Vec<LayerId>),
) -> Result<Outcome, CommandError> {
    let mut root = tx.layer(page, &LayerId::root())?;
    let moving: Vec<LayerId> = ids.iter().filter(|id| root.children.contains(id)).cloned().collect();
    if moving.is_empty() {
        return Ok(Outcome::default());
    }
    let before = root.children.clone();
    apply(&mut root.children, moving);
    if root.children != before {
        tx.put(page, root)?;
    }
    Ok(Outcome::default())
}

fn index_of(children: &[LayerId], id: &LayerId) -> usize {
    children.iter().position(|c| c == id).unwrap_or(children.len())
}

fn bring_to_front(children: &mut Vec<LayerId>, mut ids: Vec<LayerId>) {
    ids.sort_by_key(|id| index_of(children, id));
    for id in ids {
        children.retain(|c| c != &id);
        children.push(id);
    }
}

fn send_to_back(children: &mut Vec<LayerId>, mut ids: Vec<LayerId>) {
    ids.sort_by_key(|id| std::cmp::Reverse(index_of(children, id)));
    for id in ids {
        children.retain(|c| c != &id);
        children.insert(0, id);
    }
}

fn bring_forward(children: &mut Vec<LayerId>, mut ids: Vec<LayerId>) {
    let last = ids.iter().map(|id| index_of(children, id)).max().unwrap_or(0);
    ids.sort_by_key(|id| index_of(children, id));
    for id in ids {
        children.retain(|c| c != &id);
        let at = (last + 1).min(children.len());
        children.insert(at, id);
    }
}

fn send_backward(children: &mut Vec<LayerId>, mut ids: Vec<LayerId>) {
    let first = ids.iter().map(|id| index_of(children, id)).min().unwrap_or(0);
    ids.sort_by_key(|id| std::cmp::Reverse(index_of(children, id)));
    for id in ids {
        children.retain(|c| c != &id);
        let at = first.saturating_sub(1).min(children.len());
        children.insert(at, id);
    }
}

// =============================================================================
// GEOMETRY COMMANDS
// =============================================================================

/// Position that aligns a layer's rotated footprint to `container`.
#[must_use]
pub fn aligned_position(layer: &BoxData, container: &BoxData, alignment: Alignment) -> Point {
    let rect = layer.bounding_rect();
    let (w, h) = (layer.box_size.width, layer.box_size.height);
    let (cx, cy) = (container.position.x, container.position.y);
    let (cw, ch) = (container.box_size.width, container.box_size.height);
    let mut pos = layer.position;
    match alignment {
        Alignment::Left => pos.x = cx - (w - rect.width) / 2.0,
        Alignment::Right => pos.x = cx + cw - rect.width - (w - rect.width) / 2.0,
        Alignment::Center => pos.x = cx + (cw - w) / 2.0,
        Alignment::Top => pos.y = cy - (h - rect.height) / 2.0,
        Alignment::Bottom => pos.y = cy + ch - rect.height - (h - rect.height) / 2.0,
        Alignment::Middle => pos.y = cy + (ch - h) / 2.0,
    }
    pos
}

fn align(tx: &mut Tx<'_>, page: usize, ids: &[LayerId], alignment: Alignment) -> Result<(), CommandError> {
    let layers = ids.iter().map(|id| tx.layer(page, id)).collect::<Result<Vec<_>, _>>()?;
    let container = match layers.as_slice() {
        [] => return Ok(()),
        [single] => {
            let parent_id = single.parent.clone().ok_or(CommandError::RootLayer)?;
            let parent = tx.layer(page, &parent_id)?;
            let size = if parent_id.is_root() { tx.doc.page_size() } else { local_size(&parent) };
            BoxData::new(size, Point::default(), 0.0)
        }
        many => {
            let union = control_box_from_layers(many.iter().map(Layer::box_data));
            union.ok_or(CommandError::EmptySelection)?
        }
    };
    for layer in layers {
        let pos = aligned_position(&layer.box_data(), &container, alignment);
        tx.patch(page, &layer.id, &json!({ "position": point_json(pos) }))?;
    }
    Ok(())
}

fn move_layers(
    tx: &mut Tx<'_>,
    page: usize,
    ids: &[LayerId],
    direction: Direction,
    distance: f64,
) -> Result<(), CommandError> {
    let (dx, dy) = match direction {
        Direction::Left => (-distance, 0.0),
        Direction::Right => (distance, 0.0),
        Direction::Top => (0.0, -distance),
        Direction::Bottom => (0.0, distance),
    };
    for id in ids {
        let pos = tx.layer(page, id)?.props().position().offset(dx, dy);
        tx.patch(page, id, &json!({ "position": point_json(pos) }))?;
    }
    Ok(())
}

fn set_locked(tx: &mut Tx<'_>, page: usize, ids: &[LayerId], locked: bool) -> Result<Outcome, CommandError> {
    for id in ids {
        let mut layer = tx.layer(page, id)?;
        if layer.locked != locked {
            layer.locked = locked;
            tx.put(page, layer)?;
        }
    }
    Ok(Outcome::default())
}

// =============================================================================
// PAGE COMMANDS
// =============================================================================

fn move_page(tx: &mut Tx<'_>, from: usize, to: usize) -> Result<Outcome, CommandError> {
    let page = tx.page(from)?.clone();
    tx.run(Op::RemovePage { index: from })?;
    tx.run(Op::InsertPage { index: to, page })?;
    Ok(Outcome::activate(to))
}

fn set_page_size(tx: &mut Tx<'_>, size: BoxSize) -> Result<(), CommandError> {
    if size.is_degenerate() {
        return Err(CommandError::DegenerateSize);
    }
    let old = tx.doc.page_size();
    let dx = (size.width - old.width) / 2.0;
    let dy = (size.height - old.height) / 2.0;
    for page in 0..tx.doc.page_count() {
        let top = tx.page(page)?.top_level().to_vec();
        for id in &top {
            let pos = tx.layer(page, id)?.props().position().offset(dx, dy);
            tx.patch(page, id, &json!({ "position": point_json(pos) }))?;
        }
        let root = tx.layer(page, &LayerId::root())?;
        let mut patch = json!({ "boxSize": box_size_json(size) });
        if let Some(image) = root.props().media("image") {
            let (fitted, offset) = cover_fit(size, image.box_size.ratio());
            if let Some(map) = patch.as_object_mut() {
                map.insert(
                    "image".into(),
                    json!({ "boxSize": box_size_json(fitted), "position": point_json(offset) }),
                );
            }
        }
        tx.patch(page, &LayerId::root(), &patch)?;
    }
    tx.run(Op::SetPageSize { size })
}

fn detach_frame_image(tx: &mut Tx<'_>, page: usize, id: &LayerId) -> Result<LayerId, CommandError> {
    let frame = tx.layer(page, id)?;
    if frame.kind != LayerKind::Frame {
        return Err(CommandError::EmptyFrame(id.clone()));
    }
    let (Some(content), Some(media)) = (frame.props().object("image").cloned(), frame.props().media("image")) else {
        return Err(CommandError::EmptyFrame(id.clone()));
    };
    let outer = frame.box_data();
    let placed = position_of_object_inside_another(&outer, &media);
    let size = media.box_size.scaled(outer.scale_or_one());

    let mut image = content;
    merge_props(
        &mut image,
        &json!({ "boxSize": box_size_json(size), "position": { "x": 0.0, "y": 0.0 }, "rotate": 0.0 }),
    );
    let props = json!({
        "image": image,
        "boxSize": box_size_json(size),
        "position": point_json(placed.position),
        "rotate": placed.rotate,
    });
    let parent_id = frame.parent.clone().ok_or(CommandError::RootLayer)?;
    let image_id = LayerId::random();
    tx.put(page, Layer::new(image_id.clone(), LayerKind::Image, props, Some(parent_id.clone())))?;
    let mut parent = tx.layer(page, &parent_id)?;
    let at = parent.children.iter().position(|c| c == id).map_or(parent.children.len(), |i| i + 1);
    parent.children.insert(at, image_id.clone());
    tx.put(page, parent)?;
    tx.patch(page, id, &json!({ "image": null }))?;
    Ok(image_id)
}
