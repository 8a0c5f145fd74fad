//! Editor facade: document, history, UI state, and viewport behind one
//! dispatch path.
//!
//! DESIGN
//! ======
//! `EditorCore` is the single owner of mutable editor state. Every document
//! change runs through [`EditorCore::execute`], which applies the command,
//! hands the delta to the history manager under the caller's
//! [`HistoryMode`], and then re-derives the ephemeral state (selection,
//! control box, hover, text editing) from the document. Nothing derived is
//! trusted across a mutation.
//!
//! UI-only actions (selection, hover, zoom, menus) touch `ui` and `viewport`
//! directly and never reach the undo stack.
//!
//! Undo and redo clear all ephemeral state and push the stored text back into
//! any attached [`TextSession`].

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use crate::collab::{TextSession, used_fonts};
use crate::command::{Alignment, Command, CommandError};
use crate::config::EditorConfig;
use crate::doc::{DocError, Document, Layer, LayerId, LayerKind, Props, merge_props, point_json};
use crate::error::ErrorCode;
use crate::geometry::{BoxData, BoxSize, Point, control_box_from_layers};
use crate::history::{History, HistoryMode};
use crate::hit::{ResizeAnchor, resize_anchors};
use crate::serial::{
    SerializedLayerTree, SerializedPage, decode_clipboard, deserialize, encode_clipboard, page_size_of, serialize,
    serialize_trees,
};
use crate::snap::Guidelines;
use crate::viewport::Viewport;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Doc(#[from] DocError),
    #[error("clipboard payload rejected: {0}")]
    Clipboard(#[source] DocError),
    #[error("page size {width}x{height} is below the minimum of {min}")]
    PageTooSmall { width: f64, height: f64, min: f64 },
    #[error("page {0} is locked")]
    PageLocked(usize),
    #[error("layer is locked: {0}")]
    LayerLocked(LayerId),
    #[error("nothing is selected")]
    NothingSelected,
    #[error("resize handle {0:?} is not offered for this selection")]
    HandleDisabled(ResizeAnchor),
}

impl ErrorCode for EditorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Command(e) => e.error_code(),
            Self::Doc(e) => e.error_code(),
            Self::Clipboard(_) => "E_CLIPBOARD",
            Self::PageTooSmall { .. } => "E_PAGE_TOO_SMALL",
            Self::PageLocked(_) => "E_PAGE_LOCKED",
            Self::LayerLocked(_) => "E_LAYER_LOCKED",
            Self::NothingSelected => "E_NOTHING_SELECTED",
            Self::HandleDisabled(_) => "E_HANDLE_DISABLED",
        }
    }
}

// =============================================================================
// UI STATE
// =============================================================================

/// Which pointer gesture currently owns the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
    Rotate,
}

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    #[default]
    Replace,
    /// Add unselected ids, remove already selected ones.
    Toggle,
}

/// Ephemeral editor state. Never serialized, never part of history.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub active_page: usize,
    /// Selected layers on the active page, in selection order.
    pub selected: Vec<LayerId>,
    pub hovered: Option<LayerId>,
    pub control_box: Option<BoxData>,
    pub guidelines: Guidelines,
    /// Text layer whose rich-text editor is open.
    pub text_editing: Option<LayerId>,
    /// Context menu anchor in page coordinates.
    pub context_menu: Option<Point>,
    pub gesture: Option<GestureKind>,
}

impl UiState {
    fn clear_ephemeral(&mut self) {
        self.selected.clear();
        self.hovered = None;
        self.control_box = None;
        self.guidelines = Guidelines::default();
        self.text_editing = None;
        self.context_menu = None;
        self.gesture = None;
    }
}

// =============================================================================
// EDITOR CORE
// =============================================================================

/// The editor state machine. Hosts drive it with commands and pointer input;
/// renderers read `doc`, `ui`, and `viewport` back out.
pub struct EditorCore {
    pub doc: Document,
    pub history: History,
    pub ui: UiState,
    pub viewport: Viewport,
    pub config: EditorConfig,
    text_sessions: HashMap<LayerId, Box<dyn TextSession>>,
}

impl EditorCore {
    #[must_use]
    pub fn new(page_size: BoxSize) -> Self {
        Self::with_config(page_size, EditorConfig::default())
    }

    #[must_use]
    pub fn with_config(page_size: BoxSize, config: EditorConfig) -> Self {
        Self {
            doc: Document::new(page_size),
            history: History::with_capacity(config.history_capacity),
            ui: UiState::default(),
            viewport: Viewport::default(),
            config,
            text_sessions: HashMap::new(),
        }
    }

    // --- Dispatch ---

    /// Apply `command` and record it under `mode`.
    ///
    /// # Errors
    ///
    /// Returns the command's failure; the document is left unchanged.
    pub fn execute(&mut self, command: Command, mode: HistoryMode) -> Result<(), EditorError> {
        self.execute_at(command, mode, Instant::now())
    }

    /// [`execute`](Self::execute) with an explicit clock for throttle windows.
    ///
    /// # Errors
    ///
    /// Returns the command's failure; the document is left unchanged.
    pub fn execute_at(&mut self, command: Command, mode: HistoryMode, now: Instant) -> Result<(), EditorError> {
        let outcome = command.apply(&mut self.doc)?;
        debug!(command = command.name(), mode = ?mode, ops = outcome.delta.len(), "command dispatched");
        self.history.record_at(outcome.delta, mode, now);
        if let Some(page) = outcome.active_page {
            self.ui.active_page = page;
            self.ui.selected.clear();
        }
        if let Some((page, ids)) = outcome.selection {
            self.ui.active_page = page;
            self.ui.selected = ids;
        }
        self.sync_derived();
        Ok(())
    }

    /// Atomic dispatch: one undo step.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn dispatch(&mut self, command: Command) -> Result<(), EditorError> {
        self.execute(command, HistoryMode::Atomic)
    }

    /// Merge into the open transaction.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn merge(&mut self, command: Command) -> Result<(), EditorError> {
        self.execute(command, HistoryMode::Merge)
    }

    /// Coalesce with recent throttled dispatches.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn throttle(&mut self, command: Command) -> Result<(), EditorError> {
        self.execute(command, HistoryMode::Throttle(self.config.throttle))
    }

    // --- History ---

    /// Open a transaction ("new").
    pub fn history_begin(&mut self) {
        self.history.begin();
    }

    pub fn history_begin_at(&mut self, now: Instant) {
        self.history.begin_at(now);
    }

    pub fn history_commit(&mut self) {
        self.history.commit();
    }

    /// Revert the open transaction ("back").
    ///
    /// # Errors
    ///
    /// Propagates a failure to restore the document.
    pub fn history_back(&mut self) -> Result<bool, EditorError> {
        let reverted = self.history.back(&mut self.doc)?;
        if reverted {
            self.sync_derived();
        }
        Ok(reverted)
    }

    /// # Errors
    ///
    /// Propagates a failure to restore the document.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let changed = self.history.undo(&mut self.doc)?;
        if changed {
            self.after_time_travel();
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// Propagates a failure to restore the document.
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let changed = self.history.redo(&mut self.doc)?;
        if changed {
            self.after_time_travel();
        }
        Ok(changed)
    }

    // --- UI actions (never recorded) ---

    /// Select top-level layers on the active page. ROOT, unknown ids, and
    /// layers nested inside a group are skipped.
    pub fn select_layers(&mut self, ids: &[LayerId], mode: SelectMode) {
        let Some(page) = self.doc.page(self.ui.active_page) else {
            return;
        };
        let valid = ids.iter().filter(|id| page.is_top_level(id));
        match mode {
            SelectMode::Replace => self.ui.selected = valid.cloned().collect(),
            SelectMode::Toggle => {
                for id in valid {
                    if let Some(i) = self.ui.selected.iter().position(|s| s == id) {
                        self.ui.selected.remove(i);
                    } else {
                        self.ui.selected.push(id.clone());
                    }
                }
            }
        }
        self.refresh_control_box();
    }

    /// Select every top-level layer on the active page.
    pub fn select_all(&mut self) {
        let ids = self.doc.page(self.ui.active_page).map(|p| p.top_level().to_vec()).unwrap_or_default();
        self.select_layers(&ids, SelectMode::Replace);
    }

    pub fn reset_selection(&mut self) {
        self.ui.selected.clear();
        self.ui.control_box = None;
        self.ui.text_editing = None;
    }

    pub fn hover(&mut self, id: Option<LayerId>) {
        self.ui.hovered = id;
    }

    /// Override the derived control box (used by rotate to keep it turned).
    pub fn set_control_box(&mut self, control_box: Option<BoxData>) {
        self.ui.control_box = control_box;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.set_zoom(zoom);
    }

    pub fn set_guidelines(&mut self, guidelines: Guidelines) {
        self.ui.guidelines = guidelines;
    }

    /// Open the rich-text editor on a text layer of the active page.
    ///
    /// Returns `false` when `id` is not a top-level text layer there.
    pub fn open_text_editor(&mut self, id: &LayerId) -> bool {
        let is_text = self
            .doc
            .page(self.ui.active_page)
            .filter(|page| page.is_top_level(id))
            .and_then(|page| page.get(id))
            .is_some_and(|l| l.kind == LayerKind::Text);
        if is_text {
            self.ui.text_editing = Some(id.clone());
            self.select_layers(std::slice::from_ref(id), SelectMode::Replace);
        }
        is_text
    }

    pub fn close_text_editor(&mut self) {
        self.ui.text_editing = None;
    }

    pub fn open_context_menu(&mut self, at: Point) {
        self.ui.context_menu = Some(at);
    }

    pub fn close_context_menu(&mut self) {
        self.ui.context_menu = None;
    }

    /// # Errors
    ///
    /// Returns `PageNotFound` for an index past the last page.
    pub fn set_active_page(&mut self, index: usize) -> Result<(), EditorError> {
        self.doc.try_page(index)?;
        if index != self.ui.active_page {
            self.ui.active_page = index;
            self.reset_selection();
            self.ui.hovered = None;
        }
        Ok(())
    }

    // --- Selection-scoped commands ---

    /// Serialize the selected subtrees as a clipboard payload.
    ///
    /// # Errors
    ///
    /// `NothingSelected` for an empty selection.
    pub fn copy(&self) -> Result<String, EditorError> {
        if self.ui.selected.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let page = self.doc.try_page(self.ui.active_page)?;
        Ok(encode_clipboard(&serialize_trees(page, &self.ui.selected))?)
    }

    /// Insert clipboard subtrees as new top-level layers, offset from their
    /// source position.
    ///
    /// # Errors
    ///
    /// `Clipboard` when the payload does not parse; the document is untouched.
    pub fn paste(&mut self, text: &str) -> Result<(), EditorError> {
        let trees = decode_clipboard(text).map_err(|err| {
            warn!(error = %err, len = text.len(), "clipboard payload rejected");
            EditorError::Clipboard(err)
        })?;
        self.insert_trees(trees)
    }

    /// Copy the selection in place, offset by the paste offset.
    ///
    /// # Errors
    ///
    /// `NothingSelected` for an empty selection.
    pub fn duplicate(&mut self) -> Result<(), EditorError> {
        if self.ui.selected.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let trees = serialize_trees(self.doc.try_page(self.ui.active_page)?, &self.ui.selected);
        self.insert_trees(trees)
    }

    /// Resize every page, refusing sizes below the configured minimum.
    ///
    /// # Errors
    ///
    /// `PageTooSmall` before any command is dispatched.
    pub fn change_page_size(&mut self, size: BoxSize) -> Result<(), EditorError> {
        let min = self.config.min_page_size;
        let fits = |v: f64| v.is_finite() && v >= min;
        if !fits(size.width) || !fits(size.height) {
            debug!(width = size.width, height = size.height, min, "page size refused");
            return Err(EditorError::PageTooSmall { width: size.width, height: size.height, min });
        }
        self.dispatch(Command::SetPageSize { size })
    }

    /// # Errors
    ///
    /// `NothingSelected` for an empty selection.
    pub fn align(&mut self, alignment: Alignment) -> Result<(), EditorError> {
        let ids = self.selection_or_err()?;
        self.dispatch(Command::Align { page: self.ui.active_page, ids, alignment })
    }

    /// # Errors
    ///
    /// `NothingSelected` for an empty selection.
    pub fn delete_selection(&mut self) -> Result<(), EditorError> {
        let ids = self.selection_or_err()?;
        self.dispatch(Command::DeleteLayers { page: self.ui.active_page, ids })
    }

    /// # Errors
    ///
    /// `NothingSelected` for an empty selection.
    pub fn group_selection(&mut self) -> Result<(), EditorError> {
        let ids = self.selection_or_err()?;
        self.dispatch(Command::Group { page: self.ui.active_page, ids })
    }

    // --- Document I/O ---

    /// Replace the document; history and UI state start fresh.
    ///
    /// # Errors
    ///
    /// Propagates the first page that fails to load; the current document is
    /// kept in that case.
    pub fn load(&mut self, pages: &[SerializedPage]) -> Result<(), EditorError> {
        let size = page_size_of(pages).unwrap_or_else(|| self.doc.page_size());
        let loaded = deserialize(pages)?;
        self.doc = if loaded.is_empty() { Document::new(size) } else { Document::from_pages(loaded, size) };
        self.history.clear();
        self.ui = UiState::default();
        debug!(pages = self.doc.page_count(), "document loaded");
        Ok(())
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<SerializedPage> {
        serialize(self.doc.pages())
    }

    /// Fonts referenced by text layers, for the host to preload.
    #[must_use]
    pub fn used_fonts(&self) -> Vec<String> {
        used_fonts(&self.doc)
    }

    // --- Collaborators ---

    pub fn attach_text_session(&mut self, id: LayerId, session: Box<dyn TextSession>) {
        self.text_sessions.insert(id, session);
    }

    pub fn detach_text_session(&mut self, id: &LayerId) -> Option<Box<dyn TextSession>> {
        self.text_sessions.remove(id)
    }

    // --- Guards used by gestures ---

    /// Fail when the page or any of `ids` is locked or missing.
    ///
    /// # Errors
    ///
    /// `PageLocked`, `LayerLocked`, or `LayerNotFound`.
    pub fn ensure_editable(&self, page: usize, ids: &[LayerId]) -> Result<(), EditorError> {
        let p = self.doc.try_page(page)?;
        if p.is_locked() {
            return Err(EditorError::PageLocked(page));
        }
        for id in ids {
            let layer = p.get(id).ok_or_else(|| DocError::LayerNotFound(id.clone()))?;
            if layer.locked {
                return Err(EditorError::LayerLocked(id.clone()));
            }
        }
        Ok(())
    }

    /// Selected layers on the active page.
    #[must_use]
    pub fn selected_layers(&self) -> Vec<&Layer> {
        let Some(page) = self.doc.page(self.ui.active_page) else {
            return Vec::new();
        };
        self.ui.selected.iter().filter_map(|id| page.get(id)).collect()
    }

    /// Resize handles the current selection offers.
    #[must_use]
    pub fn resize_anchors(&self) -> Vec<ResizeAnchor> {
        resize_anchors(&self.selected_layers())
    }

    // --- Internals ---

    fn selection_or_err(&self) -> Result<Vec<LayerId>, EditorError> {
        if self.ui.selected.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        Ok(self.ui.selected.clone())
    }

    fn insert_trees(&mut self, mut trees: Vec<SerializedLayerTree>) -> Result<(), EditorError> {
        if trees.is_empty() {
            return Ok(());
        }
        let offset = self.config.paste_offset;
        for tree in &mut trees {
            if let Some(root) = tree.layers.get_mut(&tree.root_id) {
                let at = Props::new(&root.props).position().offset(offset, offset);
                merge_props(&mut root.props, &json!({ "position": point_json(at) }));
            }
        }
        let page = self.ui.active_page;
        self.dispatch(Command::AddLayerTrees { page, parent: LayerId::root(), trees })
    }

    /// Re-derive ephemeral state from the document after a mutation.
    fn sync_derived(&mut self) {
        let last = self.doc.page_count().saturating_sub(1);
        self.ui.active_page = self.ui.active_page.min(last);
        let Some(page) = self.doc.page(self.ui.active_page) else {
            self.ui.clear_ephemeral();
            return;
        };
        self.ui.selected.retain(|id| page.is_top_level(id));
        if self.ui.hovered.as_ref().is_some_and(|id| !page.contains(id)) {
            self.ui.hovered = None;
        }
        if self.ui.text_editing.as_ref().is_some_and(|id| !page.contains(id)) {
            self.ui.text_editing = None;
        }
        self.refresh_control_box();
    }

    fn refresh_control_box(&mut self) {
        let boxes: Vec<BoxData> = self.selected_layers().iter().map(|l| l.box_data()).collect();
        self.ui.control_box = control_box_from_layers(boxes);
    }

    fn after_time_travel(&mut self) {
        self.ui.clear_ephemeral();
        let last = self.doc.page_count().saturating_sub(1);
        self.ui.active_page = self.ui.active_page.min(last);
        for (id, session) in &mut self.text_sessions {
            let stored = self
                .doc
                .pages()
                .iter()
                .find_map(|p| p.get(id))
                .filter(|l| l.kind == LayerKind::Text);
            match stored {
                Some(layer) => session.set_content(layer.props().text()),
                None => debug!(layer = %id, "text session has no stored layer"),
            }
        }
    }
}
