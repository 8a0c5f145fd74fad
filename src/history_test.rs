#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::command::Command;
use crate::doc::{LayerId, LayerKind};
use crate::geometry::{BoxSize, Point};

fn doc_with_layer() -> (Document, LayerId) {
    let mut doc = Document::new(BoxSize::new(800.0, 600.0));
    let outcome = Command::AddLayer {
        page: 0,
        parent: LayerId::root(),
        kind: LayerKind::Shape,
        props: json!({ "boxSize": { "width": 10.0, "height": 10.0 } }),
        position: Some(Point::new(0.0, 0.0)),
    }
    .apply(&mut doc)
    .unwrap();
    (doc, outcome.selection.unwrap().1.remove(0))
}

fn move_to(doc: &mut Document, id: &LayerId, x: f64) -> Delta {
    Command::SetProp { page: 0, ids: vec![id.clone()], props: json!({ "position": { "x": x } }) }
        .apply(doc)
        .unwrap()
        .delta
}

fn x_of(doc: &Document, id: &LayerId) -> f64 {
    doc.get_layer(0, id).unwrap().props().position().x
}

// =============================================================
// Atomic
// =============================================================

#[test]
fn atomic_entries_undo_and_redo() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    for x in [1.0, 2.0] {
        let delta = move_to(&mut doc, &id, x);
        history.record(delta, HistoryMode::Atomic);
    }
    assert_eq!(history.len(), 2);
    assert!(history.undo(&mut doc).unwrap());
    assert_eq!(x_of(&doc, &id), 1.0);
    assert!(history.undo(&mut doc).unwrap());
    assert_eq!(x_of(&doc, &id), 0.0);
    assert!(!history.undo(&mut doc).unwrap());
    assert!(history.redo(&mut doc).unwrap());
    assert!(history.redo(&mut doc).unwrap());
    assert_eq!(x_of(&doc, &id), 2.0);
    assert!(!history.redo(&mut doc).unwrap());
}

#[test]
fn atomic_after_undo_truncates_redo_tail() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Atomic);
    history.record(move_to(&mut doc, &id, 2.0), HistoryMode::Atomic);
    history.undo(&mut doc).unwrap();
    assert!(history.can_redo());
    history.record(move_to(&mut doc, &id, 5.0), HistoryMode::Atomic);
    assert!(!history.can_redo());
    assert_eq!(history.len(), 2);
    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 1.0);
}

#[test]
fn ignored_and_empty_deltas_leave_stack_alone() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Ignore);
    history.record(Delta::default(), HistoryMode::Atomic);
    assert!(history.is_empty());
    assert!(!history.can_undo());
}

#[test]
fn capacity_drops_oldest() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::with_capacity(2);
    for x in [1.0, 2.0, 3.0] {
        let delta = move_to(&mut doc, &id, x);
        history.record(delta, HistoryMode::Atomic);
    }
    assert_eq!(history.len(), 2);
    history.undo(&mut doc).unwrap();
    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 1.0);
    assert!(!history.can_undo());
}

#[test]
fn clear_forgets_everything() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Atomic);
    history.clear();
    assert!(!history.can_undo());
    assert_eq!(history.cursor(), 0);
}

// =============================================================
// Transactions
// =============================================================

#[test]
fn merged_frames_collapse_into_one_step() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.begin();
    for x in [1.0, 2.0, 3.0, 4.0] {
        let delta = move_to(&mut doc, &id, x);
        history.record(delta, HistoryMode::Merge);
    }
    history.commit();
    assert_eq!(history.len(), 1);
    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 0.0);
    history.redo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 4.0);
}

#[test]
fn merge_without_begin_opens_a_transaction() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Merge);
    assert!(history.is_open());
    history.record(move_to(&mut doc, &id, 2.0), HistoryMode::Merge);
    assert_eq!(history.len(), 1);
}

#[test]
fn back_reverts_open_transaction() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Atomic);
    history.begin();
    history.record(move_to(&mut doc, &id, 9.0), HistoryMode::Merge);
    assert!(history.back(&mut doc).unwrap());
    assert_eq!(x_of(&doc, &id), 1.0);
    assert_eq!(history.len(), 1);
    assert!(!history.is_open());
    assert!(!history.back(&mut doc).unwrap());
}

#[test]
fn empty_transaction_is_discarded() {
    let mut history = History::default();
    history.begin();
    assert!(!history.can_undo());
    history.commit();
    assert!(history.is_empty());
}

#[test]
fn atomic_closes_open_transaction() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.begin();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Merge);
    history.record(move_to(&mut doc, &id, 2.0), HistoryMode::Atomic);
    assert!(!history.is_open());
    assert_eq!(history.len(), 2);
}

#[test]
fn begin_after_undo_truncates_redo_tail() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.record(move_to(&mut doc, &id, 1.0), HistoryMode::Atomic);
    history.undo(&mut doc).unwrap();
    history.begin();
    assert!(!history.can_redo());
    history.commit();
    assert!(history.is_empty());
}

#[test]
fn undo_commits_open_transaction_first() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    history.begin();
    history.record(move_to(&mut doc, &id, 3.0), HistoryMode::Merge);
    assert!(history.undo(&mut doc).unwrap());
    assert_eq!(x_of(&doc, &id), 0.0);
    assert!(history.can_redo());
}

// =============================================================
// Throttle
// =============================================================

#[test]
fn throttle_coalesces_within_window() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    let window = Duration::from_millis(500);
    let t0 = Instant::now();
    history.record_at(move_to(&mut doc, &id, 1.0), HistoryMode::Throttle(window), t0);
    history.record_at(move_to(&mut doc, &id, 2.0), HistoryMode::Throttle(window), t0 + Duration::from_millis(200));
    history.record_at(move_to(&mut doc, &id, 3.0), HistoryMode::Throttle(window), t0 + Duration::from_millis(450));
    assert_eq!(history.len(), 1);
    history.record_at(move_to(&mut doc, &id, 4.0), HistoryMode::Throttle(window), t0 + Duration::from_millis(600));
    assert_eq!(history.len(), 2);

    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 3.0);
    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 0.0);
}

#[test]
fn throttle_does_not_merge_into_atomic_entry() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    let t0 = Instant::now();
    history.record_at(move_to(&mut doc, &id, 1.0), HistoryMode::Atomic, t0);
    history.record_at(move_to(&mut doc, &id, 2.0), HistoryMode::Throttle(Duration::from_secs(1)), t0);
    assert_eq!(history.len(), 2);
}

#[test]
fn throttle_merges_into_open_transaction() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    let t0 = Instant::now();
    history.begin_at(t0);
    history.record_at(move_to(&mut doc, &id, 1.0), HistoryMode::Throttle(Duration::ZERO), t0);
    history.record_at(move_to(&mut doc, &id, 2.0), HistoryMode::Throttle(Duration::ZERO), t0);
    assert_eq!(history.len(), 1);
    assert!(history.is_open());
}

#[test]
fn throttle_after_undo_starts_fresh_entry() {
    let (mut doc, id) = doc_with_layer();
    let mut history = History::default();
    let window = Duration::from_secs(10);
    let t0 = Instant::now();
    history.record_at(move_to(&mut doc, &id, 1.0), HistoryMode::Throttle(window), t0);
    history.undo(&mut doc).unwrap();
    history.record_at(move_to(&mut doc, &id, 2.0), HistoryMode::Throttle(window), t0);
    assert_eq!(history.len(), 1);
    history.undo(&mut doc).unwrap();
    assert_eq!(x_of(&doc, &id), 0.0);
}
