//! Serialized document format and clipboard payloads.
//!
//! The wire shape is a map of layers per page, each tagged with
//! `type.resolvedName` and linked by `parent`/`child`. Loading never trusts
//! source ids: the tree is walked depth-first from its root and every layer
//! gets a fresh id, except a layer with no parent, which always becomes
//! `ROOT`. Pasted and duplicated subtrees therefore never collide with
//! what is already on the page.

#[cfg(test)]
#[path = "serial_test.rs"]
mod serial_test;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::doc::{DocError, Layer, LayerId, LayerKind, Page};
use crate::geometry::BoxSize;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedType {
    #[serde(rename = "resolvedName")]
    pub resolved_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    #[serde(rename = "type")]
    pub kind: SerializedType,
    pub props: Value,
    #[serde(default)]
    pub locked: bool,
    pub parent: Option<LayerId>,
    #[serde(default)]
    pub child: Vec<LayerId>,
}

pub type SerializedLayers = BTreeMap<LayerId, SerializedLayer>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPage {
    pub layers: SerializedLayers,
}

/// One copied subtree, as carried on the clipboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayerTree {
    #[serde(rename = "rootId")]
    pub root_id: LayerId,
    pub layers: SerializedLayers,
}

impl From<&Layer> for SerializedLayer {
    fn from(layer: &Layer) -> Self {
        Self {
            kind: SerializedType { resolved_name: layer.kind.resolved_name().to_owned() },
            props: layer.props.clone(),
            locked: layer.locked,
            parent: layer.parent.clone(),
            child: layer.children.clone(),
        }
    }
}

// =============================================================================
// SERIALIZE
// =============================================================================

/// `root` and its descendants.
#[must_use]
pub fn serialize_layers(page: &Page, root: &LayerId) -> SerializedLayers {
    page.subtree(root)
        .into_iter()
        .filter_map(|id| page.get(&id).map(|layer| (id, SerializedLayer::from(layer))))
        .collect()
}

#[must_use]
pub fn serialize_page(page: &Page) -> SerializedPage {
    SerializedPage { layers: page.layers().map(|l| (l.id.clone(), SerializedLayer::from(l))).collect() }
}

#[must_use]
pub fn serialize(pages: &[Page]) -> Vec<SerializedPage> {
    pages.iter().map(serialize_page).collect()
}

/// Subtrees for each of `ids` that exists on the page, in the given order.
#[must_use]
pub fn serialize_trees(page: &Page, ids: &[LayerId]) -> Vec<SerializedLayerTree> {
    ids.iter()
        .filter(|id| page.contains(id) && !id.is_root())
        .map(|id| SerializedLayerTree { root_id: id.clone(), layers: serialize_layers(page, id) })
        .collect()
}

// =============================================================================
// DESERIALIZE
// =============================================================================

/// Rebuild a page with fresh ids; the parentless layer becomes `ROOT`.
///
/// # Errors
///
/// Fails when no parentless layer exists, a child reference dangles, a type
/// tag is unknown, or the source tree has a cycle.
pub fn deserialize_page(source: &SerializedPage) -> Result<Page, DocError> {
    let root = source
        .layers
        .iter()
        .filter(|(_, l)| l.parent.is_none())
        .map(|(id, _)| id)
        .min_by_key(|id| !id.is_root())
        .ok_or(DocError::MissingRoot)?;
    let layers = rebuild(&source.layers, root, LayerId::root(), None)?;
    let map: HashMap<LayerId, Layer> = layers.into_iter().map(|l| (l.id.clone(), l)).collect();
    Page::from_layers(map)
}

/// Every page, in order.
///
/// # Errors
///
/// Propagates the first page that fails to load.
pub fn deserialize(pages: &[SerializedPage]) -> Result<Vec<Page>, DocError> {
    pages.iter().map(deserialize_page).collect()
}

/// Rebuild a copied subtree under `parent` with fresh ids.
///
/// The tree root comes first in the returned list.
///
/// # Errors
///
/// Fails on a dangling reference, an unknown type tag, or a cycle.
pub fn deserialize_tree(tree: &SerializedLayerTree, parent: &LayerId) -> Result<Vec<Layer>, DocError> {
    rebuild(&tree.layers, &tree.root_id, LayerId::random(), Some(parent.clone()))
}

/// Page size recorded on the first page's background.
#[must_use]
pub fn page_size_of(pages: &[SerializedPage]) -> Option<BoxSize> {
    let first = pages.first()?;
    let root = first.layers.values().find(|l| l.parent.is_none())?;
    let size = crate::doc::Props::new(&root.props).box_size();
    (!size.is_degenerate()).then_some(size)
}

fn rebuild(
    source: &SerializedLayers,
    root: &LayerId,
    root_id: LayerId,
    root_parent: Option<LayerId>,
) -> Result<Vec<Layer>, DocError> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root.clone(), root_id, root_parent)];
    while let Some((old_id, new_id, parent)) = stack.pop() {
        if !visited.insert(old_id.clone()) {
            return Err(DocError::Cycle(old_id));
        }
        let src = source.get(&old_id).ok_or_else(|| DocError::LayerNotFound(old_id.clone()))?;
        let kind = LayerKind::from_resolved_name(&src.kind.resolved_name)
            .ok_or_else(|| DocError::UnknownLayerType(src.kind.resolved_name.clone()))?;
        let children: Vec<LayerId> = src.child.iter().map(|_| LayerId::random()).collect();
        for (old_child, new_child) in src.child.iter().zip(&children).rev() {
            stack.push((old_child.clone(), new_child.clone(), Some(new_id.clone())));
        }
        out.push(Layer { id: new_id, kind, props: src.props.clone(), locked: src.locked, parent, children });
    }
    Ok(out)
}

// =============================================================================
// CLIPBOARD
// =============================================================================

/// JSON array of copied subtrees.
///
/// # Errors
///
/// Returns `Json` if a props value cannot be encoded.
pub fn encode_clipboard(trees: &[SerializedLayerTree]) -> Result<String, DocError> {
    Ok(serde_json::to_string(trees)?)
}

/// # Errors
///
/// Returns `Json` for anything that is not an array of `{rootId, layers}`.
pub fn decode_clipboard(text: &str) -> Result<Vec<SerializedLayerTree>, DocError> {
    Ok(serde_json::from_str(text)?)
}
