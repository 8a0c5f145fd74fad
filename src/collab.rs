//! External collaborators the editor core talks to but never inspects.
//!
//! DESIGN
//! ======
//! Rich-text editing and font loading live outside the core. The core only
//! stores a text layer's serialized HTML and geometry; an attached
//! [`TextSession`] is told to reload that content whenever undo or redo
//! changes it underneath the editor. Fonts are resolved by name through a
//! [`FontLookup`].

#[cfg(test)]
#[path = "collab_test.rs"]
mod collab_test;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::doc::{Document, LayerKind};

// =============================================================================
// TEXT SESSIONS
// =============================================================================

/// An open rich-text editor bound to one text layer. Enables mocking in tests.
pub trait TextSession {
    /// Replace the session's content with the stored HTML.
    fn set_content(&mut self, html: &str);
}

// =============================================================================
// FONTS
// =============================================================================

/// Font metadata returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontData {
    pub name: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Font metadata service. Enables mocking in tests.
pub trait FontLookup {
    /// Fonts matching `query`, best match first.
    fn find(&self, query: &str) -> Vec<FontData>;
}

/// Distinct font names used by text layers across every page, sorted.
#[must_use]
pub fn used_fonts(doc: &Document) -> Vec<String> {
    let names: BTreeSet<&str> = doc
        .pages()
        .iter()
        .flat_map(|page| page.layers())
        .filter(|layer| layer.kind == LayerKind::Text)
        .flat_map(|layer| layer.props().font_names())
        .collect();
    names.into_iter().map(str::to_owned).collect()
}

/// Resolve each used font to its best match; unknown names are skipped.
#[must_use]
pub fn resolve_fonts(lookup: &dyn FontLookup, names: &[String]) -> Vec<FontData> {
    names.iter().filter_map(|name| lookup.find(name).into_iter().next()).collect()
}
