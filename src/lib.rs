//! Document, history, and interaction core for a graphic-design canvas editor.
//!
//! The crate owns everything between raw pointer input and the stored
//! document: a page/layer tree mutated only through reversible commands, an
//! undo stack that coalesces gesture frames into single steps, and the
//! geometry behind dragging, resizing, rotating, and snapping rotated boxes.
//! Rendering, rich-text editing, and font or asset loading stay with the
//! host, which reads [`engine::EditorCore`] back after each call.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::EditorCore`] facade, UI state, clipboard |
//! | [`doc`] | Pages, layers, and typed props access |
//! | [`serial`] | Serialized document and clipboard format |
//! | [`command`] | Named mutations producing reversible deltas |
//! | [`history`] | Undo/redo stack with merge and throttle modes |
//! | [`geometry`] | Boxes, rotated bounds, affine math |
//! | [`snap`] | Edge/center snapping and guidelines |
//! | [`hit`] | Layer and control-box hit-testing |
//! | [`drag`], [`resize`], [`rotate`] | Pointer gesture state machines |
//! | [`input`] | Modifiers, gesture phases, frame throttling |
//! | [`viewport`] | Client/page coordinate conversion and zoom |
//! | [`collab`] | Text-session and font-lookup collaborators |
//! | [`config`] | Tuning knobs read from the environment |
//! | [`consts`] | Shared numeric constants |
//! | [`error`] | Error-code contract shared by every error type |

pub mod collab;
pub mod command;
pub mod config;
pub mod consts;
pub mod doc;
pub mod drag;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod history;
pub mod hit;
pub mod input;
pub mod resize;
pub mod rotate;
pub mod serial;
pub mod snap;
pub mod viewport;
