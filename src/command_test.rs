#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::serial::serialize_trees;

fn doc() -> Document {
    Document::new(BoxSize::new(800.0, 600.0))
}

fn add_at(doc: &mut Document, x: f64, y: f64, w: f64, h: f64) -> LayerId {
    let outcome = Command::AddLayer {
        page: 0,
        parent: LayerId::root(),
        kind: LayerKind::Shape,
        props: json!({ "boxSize": { "width": w, "height": h }, "rotate": 0.0 }),
        position: Some(Point::new(x, y)),
    }
    .apply(doc)
    .unwrap();
    outcome.selection.unwrap().1.remove(0)
}

fn top(doc: &Document) -> Vec<LayerId> {
    doc.page(0).unwrap().top_level().to_vec()
}

fn layer<'a>(doc: &'a Document, id: &LayerId) -> &'a Layer {
    doc.get_layer(0, id).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Apply, undo, redo, and check both directions land on exact snapshots.
fn assert_round_trip(doc: &mut Document, command: Command) -> Outcome {
    let before = doc.clone();
    let outcome = command.apply(doc).unwrap();
    let after = doc.clone();
    outcome.delta.apply_inverse(doc).unwrap();
    assert_eq!(*doc, before, "inverse did not restore state");
    outcome.delta.apply_forward(doc).unwrap();
    assert_eq!(*doc, after, "forward did not reproduce state");
    outcome
}

// =============================================================
// setProp
// =============================================================

#[test]
fn set_prop_merges_into_each_layer() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    assert_round_trip(
        &mut d,
        Command::SetProp { page: 0, ids: vec![a.clone(), b.clone()], props: json!({ "position": { "x": 7.0 } }) },
    );
    assert_eq!(layer(&d, &a).props().position(), Point::new(7.0, 0.0));
    assert_eq!(layer(&d, &b).props().position(), Point::new(7.0, 0.0));
}

#[test]
fn set_prop_replaces_arrays() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    Command::SetProp { page: 0, ids: vec![a.clone()], props: json!({ "colors": ["#000", "#111"] }) }
        .apply(&mut d)
        .unwrap();
    Command::SetProp { page: 0, ids: vec![a.clone()], props: json!({ "colors": ["#fff"] }) }
        .apply(&mut d)
        .unwrap();
    assert_eq!(layer(&d, &a).props["colors"], json!(["#fff"]));
}

#[test]
fn set_prop_rejects_non_object_patch() {
    let mut d = doc();
    let a = add_at(&mut d, 5.0, 6.0, 10.0, 10.0);
    let before = d.clone();
    for patch in [json!(5), json!(null), json!(["x"]), json!("props")] {
        let err = Command::SetProp { page: 0, ids: vec![a.clone()], props: patch }.apply(&mut d).unwrap_err();
        assert!(matches!(err, CommandError::InvalidPatch));
        assert_eq!(err.error_code(), "E_INVALID_PATCH");
    }
    assert_eq!(d, before);
    assert_eq!(layer(&d, &a).props().position(), Point::new(5.0, 6.0));
}

#[test]
fn failed_command_rolls_back() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let before = d.clone();
    let err = Command::SetProp { page: 0, ids: vec![a, LayerId::from("missing")], props: json!({ "rotate": 45.0 }) }
        .apply(&mut d)
        .unwrap_err();
    assert_eq!(err.error_code(), "E_LAYER_NOT_FOUND");
    assert_eq!(d, before);
}

// =============================================================
// add*
// =============================================================

#[test]
fn add_layer_appends_and_centers() {
    let mut d = doc();
    let outcome = assert_round_trip(
        &mut d,
        Command::AddLayer {
            page: 0,
            parent: LayerId::root(),
            kind: LayerKind::Text,
            props: json!({ "boxSize": { "width": 200.0, "height": 100.0 }, "text": "<p>hi</p>" }),
            position: None,
        },
    );
    let (page, ids) = outcome.selection.unwrap();
    assert_eq!(page, 0);
    assert_eq!(top(&d), ids);
    let l = layer(&d, &ids[0]);
    assert_eq!(l.props().position(), Point::new(300.0, 250.0));
    assert_eq!(l.props().rotate(), 0.0);
    assert_eq!(l.parent, Some(LayerId::root()));
}

#[test]
fn add_root_kind_is_rejected() {
    let mut d = doc();
    let err = Command::AddLayer {
        page: 0,
        parent: LayerId::root(),
        kind: LayerKind::Root,
        props: json!({}),
        position: None,
    }
    .apply(&mut d)
    .unwrap_err();
    assert!(matches!(err, CommandError::RootLayer));
}

#[test]
fn add_image_fills_80_percent_and_centers() {
    let mut d = doc();
    let outcome = assert_round_trip(
        &mut d,
        Command::AddImageLayer {
            page: 0,
            parent: LayerId::root(),
            media: MediaSource { url: "https://img/1.png".into(), thumb: "https://img/1-t.png".into() },
            natural_size: BoxSize::new(1600.0, 800.0),
        },
    );
    let id = &outcome.selection.unwrap().1[0];
    let l = layer(&d, id);
    assert_eq!(l.kind, LayerKind::Image);
    assert_eq!(l.props().box_size(), BoxSize::new(640.0, 320.0));
    assert_eq!(l.props().position(), Point::new(80.0, 140.0));
    let media = l.props().media("image").unwrap();
    assert_eq!(media.box_size, BoxSize::new(640.0, 320.0));
    assert_eq!(media.position, Point::default());
    assert_eq!(l.props["image"]["url"], "https://img/1.png");
}

#[test]
fn add_tall_image_fits_height() {
    let mut d = doc();
    let outcome = Command::AddImageLayer {
        page: 0,
        parent: LayerId::root(),
        media: MediaSource { url: "u".into(), thumb: "t".into() },
        natural_size: BoxSize::new(500.0, 1000.0),
    }
    .apply(&mut d)
    .unwrap();
    let l = layer(&d, &outcome.selection.unwrap().1[0]);
    assert_eq!(l.props().box_size(), BoxSize::new(240.0, 480.0));
}

#[test]
fn add_video_uses_video_key() {
    let mut d = doc();
    let outcome = Command::AddVideoLayer {
        page: 0,
        parent: LayerId::root(),
        media: MediaSource { url: "v".into(), thumb: "t".into() },
        natural_size: BoxSize::new(1600.0, 800.0),
    }
    .apply(&mut d)
    .unwrap();
    let l = layer(&d, &outcome.selection.unwrap().1[0]);
    assert_eq!(l.kind, LayerKind::Video);
    assert!(l.props().media("video").is_some());
}

#[test]
fn add_media_rejects_zero_size() {
    let mut d = doc();
    let err = Command::AddImageLayer {
        page: 0,
        parent: LayerId::root(),
        media: MediaSource { url: "u".into(), thumb: "t".into() },
        natural_size: BoxSize::new(0.0, 100.0),
    }
    .apply(&mut d)
    .unwrap_err();
    assert!(matches!(err, CommandError::DegenerateSize));
    assert_eq!(d.page(0).unwrap().len(), 1);
}

#[test]
fn add_wide_shape_fits_30_percent_of_width() {
    let mut d = doc();
    let outcome = Command::AddShapeLayer {
        page: 0,
        parent: LayerId::root(),
        props: json!({ "boxSize": { "width": 100.0, "height": 50.0 }, "clipPath": "M 0 0 L 1 1" }),
    }
    .apply(&mut d)
    .unwrap();
    let l = layer(&d, &outcome.selection.unwrap().1[0]);
    assert_eq!(l.props().box_size(), BoxSize::new(240.0, 120.0));
    assert!(approx(l.props().scale().unwrap(), 2.4));
    assert_eq!(l.props().position(), Point::new(280.0, 240.0));
    assert_eq!(l.props["clipPath"], "M 0 0 L 1 1");
}

#[test]
fn add_tall_shape_fits_30_percent_of_height() {
    let mut d = doc();
    let outcome = Command::AddShapeLayer {
        page: 0,
        parent: LayerId::root(),
        props: json!({ "boxSize": { "width": 50.0, "height": 100.0 } }),
    }
    .apply(&mut d)
    .unwrap();
    let l = layer(&d, &outcome.selection.unwrap().1[0]);
    assert_eq!(l.props().box_size(), BoxSize::new(90.0, 180.0));
    assert!(approx(l.props().scale().unwrap(), 1.8));
}

#[test]
fn add_layer_trees_appends_fresh_subtrees() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 20.0, 0.0, 10.0, 10.0);
    let g = Command::Group { page: 0, ids: vec![a, b] }.apply(&mut d).unwrap().selection.unwrap().1.remove(0);
    let trees = serialize_trees(d.page(0).unwrap(), &[g.clone()]);
    let outcome = assert_round_trip(&mut d, Command::AddLayerTrees { page: 0, parent: LayerId::root(), trees });
    let roots = outcome.selection.unwrap().1;
    assert_eq!(roots.len(), 1);
    assert_ne!(roots[0], g);
    assert_eq!(top(&d), vec![g, roots[0].clone()]);
    assert_eq!(d.page(0).unwrap().len(), 7);
    assert!(d.page(0).unwrap().validate().is_ok());
}

// =============================================================
// delete
// =============================================================

#[test]
fn delete_root_is_a_no_op() {
    let mut d = doc();
    add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let before = d.clone();
    let outcome = Command::DeleteLayers { page: 0, ids: vec![LayerId::root()] }.apply(&mut d).unwrap();
    assert!(outcome.delta.is_empty());
    assert_eq!(d, before);
}

#[test]
fn delete_with_root_among_ids_deletes_nothing() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    Command::DeleteLayers { page: 0, ids: vec![a.clone(), LayerId::root()] }.apply(&mut d).unwrap();
    assert!(d.get_layer(0, &a).is_some());
}

#[test]
fn delete_removes_layer_and_link() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    assert_round_trip(&mut d, Command::DeleteLayers { page: 0, ids: vec![a.clone()] });
    assert!(d.get_layer(0, &a).is_none());
    assert_eq!(top(&d), vec![b]);
    assert!(d.page(0).unwrap().validate().is_ok());
}

#[test]
fn delete_group_removes_descendants() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 20.0, 0.0, 10.0, 10.0);
    let g = Command::Group { page: 0, ids: vec![a, b] }.apply(&mut d).unwrap().selection.unwrap().1.remove(0);
    assert_round_trip(&mut d, Command::DeleteLayers { page: 0, ids: vec![g] });
    assert_eq!(d.page(0).unwrap().len(), 1);
}

#[test]
fn delete_missing_id_is_skipped() {
    let mut d = doc();
    let outcome = Command::DeleteLayers { page: 0, ids: vec![LayerId::from("gone")] }.apply(&mut d).unwrap();
    assert!(outcome.delta.is_empty());
}

// =============================================================
// group / ungroup
// =============================================================

#[test]
fn group_uses_union_box_and_rebases_members() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 100.0, 100.0);
    let b = add_at(&mut d, 200.0, 50.0, 100.0, 100.0);
    let c = add_at(&mut d, 400.0, 0.0, 50.0, 50.0);
    let outcome = assert_round_trip(&mut d, Command::Group { page: 0, ids: vec![b.clone(), c.clone()] });
    let g = outcome.selection.unwrap().1.remove(0);

    let group = layer(&d, &g);
    assert_eq!(group.kind, LayerKind::Group);
    assert_eq!(group.props().position(), Point::new(200.0, 0.0));
    assert_eq!(group.props().box_size(), BoxSize::new(250.0, 150.0));
    assert_eq!(group.props().scale(), Some(1.0));
    assert_eq!(group.children, vec![b.clone(), c.clone()]);

    assert_eq!(layer(&d, &b).props().position(), Point::new(0.0, 50.0));
    assert_eq!(layer(&d, &c).props().position(), Point::new(200.0, 0.0));
    assert_eq!(layer(&d, &b).parent, Some(g.clone()));
    assert_eq!(top(&d), vec![a, g]);
    assert!(d.page(0).unwrap().validate().is_ok());
}

#[test]
fn group_inserts_at_topmost_member_slot() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let c = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let e = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let g = Command::Group { page: 0, ids: vec![a, c] }.apply(&mut d).unwrap().selection.unwrap().1.remove(0);
    assert_eq!(top(&d), vec![b, g, e]);
}

#[test]
fn group_of_groups_is_flat() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 20.0, 0.0, 10.0, 10.0);
    let c = add_at(&mut d, 40.0, 0.0, 10.0, 10.0);
    let inner = Command::Group { page: 0, ids: vec![a.clone(), b.clone()] }
        .apply(&mut d)
        .unwrap()
        .selection
        .unwrap()
        .1
        .remove(0);
    let outer = Command::Group { page: 0, ids: vec![inner.clone(), c.clone()] }
        .apply(&mut d)
        .unwrap()
        .selection
        .unwrap()
        .1
        .remove(0);
    let group = layer(&d, &outer);
    assert_eq!(group.children, vec![a, b, c]);
    assert!(d.get_layer(0, &inner).is_none());
    assert!(group.children.iter().all(|id| layer(&d, id).kind != LayerKind::Group));
}

#[test]
fn group_rejects_mixed_parents_and_root() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 20.0, 0.0, 10.0, 10.0);
    let c = add_at(&mut d, 40.0, 0.0, 10.0, 10.0);
    Command::Group { page: 0, ids: vec![a, b.clone()] }.apply(&mut d).unwrap();
    let err = Command::Group { page: 0, ids: vec![b, c] }.apply(&mut d).unwrap_err();
    assert!(matches!(err, CommandError::MixedParents));
    let err = Command::Group { page: 0, ids: vec![LayerId::root()] }.apply(&mut d).unwrap_err();
    assert!(matches!(err, CommandError::RootLayer));
    let err = Command::Group { page: 0, ids: vec![] }.apply(&mut d).unwrap_err();
    assert!(matches!(err, CommandError::EmptySelection));
}

#[test]
fn ungroup_inverts_group() {
    let mut d = doc();
    let a = add_at(&mut d, 30.0, 40.0, 100.0, 60.0);
    let b = add_at(&mut d, 300.0, 200.0, 80.0, 120.0);
    Command::SetProp { page: 0, ids: vec![b.clone()], props: json!({ "rotate": 30.0 }) }.apply(&mut d).unwrap();
    let before: Vec<BoxData> = [&a, &b].iter().map(|id| layer(&d, id).box_data()).collect();
    let original_order = top(&d);

    let g = Command::Group { page: 0, ids: vec![a.clone(), b.clone()] }
        .apply(&mut d)
        .unwrap()
        .selection
        .unwrap()
        .1
        .remove(0);
    let outcome = assert_round_trip(&mut d, Command::Ungroup { page: 0, id: g.clone() });
    assert_eq!(outcome.selection.unwrap().1, vec![a.clone(), b.clone()]);
    assert!(d.get_layer(0, &g).is_none());
    assert_eq!(top(&d), original_order);

    for (id, expected) in [&a, &b].iter().zip(&before) {
        let got = layer(&d, id).box_data();
        assert!(approx(got.position.x, expected.position.x), "{id}: {got:?}");
        assert!(approx(got.position.y, expected.position.y), "{id}: {got:?}");
        assert!(approx(got.rotate, expected.rotate));
        assert!(approx(got.box_size.width, expected.box_size.width));
        assert!(approx(got.box_size.height, expected.box_size.height));
        assert_eq!(layer(&d, id).parent, Some(LayerId::root()));
    }
}

#[test]
fn ungroup_applies_group_scale_and_rotation() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 100.0, 100.0);
    Command::SetProp { page: 0, ids: vec![a.clone()], props: json!({ "scale": 1.0 }) }.apply(&mut d).unwrap();
    let g = Command::Group { page: 0, ids: vec![a.clone()] }.apply(&mut d).unwrap().selection.unwrap().1.remove(0);
    Command::SetProp {
        page: 0,
        ids: vec![g.clone()],
        props: json!({ "scale": 2.0, "boxSize": { "width": 200.0, "height": 200.0 }, "rotate": 90.0 }),
    }
    .apply(&mut d)
    .unwrap();
    Command::Ungroup { page: 0, id: g }.apply(&mut d).unwrap();
    let l = layer(&d, &a);
    assert_eq!(l.props().box_size(), BoxSize::new(200.0, 200.0));
    assert_eq!(l.props().scale(), Some(2.0));
    assert!(approx(l.props().rotate(), 90.0));
    assert!(approx(l.props().position().x, 0.0));
    assert!(approx(l.props().position().y, 0.0));
}

#[test]
fn ungroup_non_group_fails() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let err = Command::Ungroup { page: 0, id: a.clone() }.apply(&mut d).unwrap_err();
    assert!(matches!(err, CommandError::NotAGroup(id) if id == a));
}

// =============================================================
// Z-order
// =============================================================

fn four(d: &mut Document) -> [LayerId; 4] {
    [
        add_at(d, 0.0, 0.0, 10.0, 10.0),
        add_at(d, 0.0, 0.0, 10.0, 10.0),
        add_at(d, 0.0, 0.0, 10.0, 10.0),
        add_at(d, 0.0, 0.0, 10.0, 10.0),
    ]
}

#[test]
fn bring_forward_single_and_multi() {
    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    assert_round_trip(&mut d, Command::BringForward { page: 0, ids: vec![b.clone()] });
    assert_eq!(top(&d), vec![a.clone(), c.clone(), b.clone(), e.clone()]);

    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    Command::BringForward { page: 0, ids: vec![c.clone(), b.clone()] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), vec![a, e, b, c]);
}

#[test]
fn bring_forward_at_top_is_unchanged() {
    let mut d = doc();
    let [_, _, _, e] = four(&mut d);
    let before = top(&d);
    let outcome = Command::BringForward { page: 0, ids: vec![e] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), before);
    assert!(outcome.delta.is_empty());
}

#[test]
fn send_backward_single_multi_and_bottom() {
    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    Command::SendBackward { page: 0, ids: vec![c.clone()] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), vec![a.clone(), c.clone(), b.clone(), e.clone()]);

    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    Command::SendBackward { page: 0, ids: vec![b.clone(), c.clone()] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), vec![b.clone(), c.clone(), a.clone(), e.clone()]);

    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    Command::SendBackward { page: 0, ids: vec![a.clone()] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), vec![a, b, c, e]);
}

#[test]
fn bring_to_front_and_send_to_back_keep_relative_order() {
    let mut d = doc();
    let [a, b, c, e] = four(&mut d);
    assert_round_trip(&mut d, Command::BringToFront { page: 0, ids: vec![c.clone(), a.clone()] });
    assert_eq!(top(&d), vec![b.clone(), e.clone(), a.clone(), c.clone()]);
    assert_round_trip(&mut d, Command::SendToBack { page: 0, ids: vec![e.clone(), b.clone()] });
    assert_eq!(top(&d), vec![b, e, a, c]);
}

#[test]
fn front_then_back_restores_order() {
    let mut d = doc();
    let [a, b, _, _] = four(&mut d);
    let original = top(&d);
    Command::BringToFront { page: 0, ids: vec![a.clone(), b.clone()] }.apply(&mut d).unwrap();
    assert_ne!(top(&d), original);
    Command::SendToBack { page: 0, ids: vec![a, b] }.apply(&mut d).unwrap();
    assert_eq!(top(&d), original);
}

#[test]
fn reorder_ignores_nested_ids() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    let b = add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    add_at(&mut d, 0.0, 0.0, 10.0, 10.0);
    Command::Group { page: 0, ids: vec![a.clone(), b] }.apply(&mut d).unwrap();
    let outcome = Command::BringToFront { page: 0, ids: vec![a] }.apply(&mut d).unwrap();
    assert!(outcome.delta.is_empty());
}

// =============================================================
// Align / move / lock
// =============================================================

#[test]
fn align_single_rotated_layer_to_page_edges() {
    let mut d = doc();
    let a = add_at(&mut d, 300.0, 300.0, 100.0, 50.0);
    Command::SetProp { page: 0, ids: vec![a.clone()], props: json!({ "rotate": 90.0 }) }.apply(&mut d).unwrap();

    assert_round_trip(&mut d, Command::Align { page: 0, ids: vec![a.clone()], alignment: Alignment::Left });
    let rect = layer(&d, &a).box_data().bounding_rect();
    assert!(approx(rect.x, 0.0));
    assert!(approx(layer(&d, &a).props().position().x, -25.0));

    Command::Align { page: 0, ids: vec![a.clone()], alignment: Alignment::Right }.apply(&mut d).unwrap();
    assert!(approx(layer(&d, &a).box_data().bounding_rect().right(), 800.0));

    Command::Align { page: 0, ids: vec![a.clone()], alignment: Alignment::Bottom }.apply(&mut d).unwrap();
    assert!(approx(layer(&d, &a).box_data().bounding_rect().bottom(), 600.0));
}

#[test]
fn align_center_and_middle() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 100.0, 50.0);
    Command::Align { page: 0, ids: vec![a.clone()], alignment: Alignment::Center }.apply(&mut d).unwrap();
    Command::Align { page: 0, ids: vec![a.clone()], alignment: Alignment::Middle }.apply(&mut d).unwrap();
    assert_eq!(layer(&d, &a).props().position(), Point::new(350.0, 275.0));
}

#[test]
fn align_many_uses_selection_bounds() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 100.0, 50.0, 50.0);
    let b = add_at(&mut d, 100.0, 200.0, 50.0, 80.0);
    Command::Align { page: 0, ids: vec![a.clone(), b.clone()], alignment: Alignment::Top }.apply(&mut d).unwrap();
    assert_eq!(layer(&d, &a).props().position().y, 100.0);
    assert_eq!(layer(&d, &b).props().position().y, 100.0);
    Command::Align { page: 0, ids: vec![a.clone(), b.clone()], alignment: Alignment::Right }.apply(&mut d).unwrap();
    assert_eq!(layer(&d, &a).props().position().x, 100.0);
    assert_eq!(layer(&d, &b).props().position().x, 100.0);
}

#[test]
fn move_layers_nudges() {
    let mut d = doc();
    let a = add_at(&mut d, 10.0, 10.0, 5.0, 5.0);
    assert_round_trip(
        &mut d,
        Command::MoveLayers { page: 0, ids: vec![a.clone()], direction: Direction::Right, distance: 5.0 },
    );
    Command::MoveLayers { page: 0, ids: vec![a.clone()], direction: Direction::Top, distance: 3.0 }
        .apply(&mut d)
        .unwrap();
    assert_eq!(layer(&d, &a).props().position(), Point::new(15.0, 7.0));
}

#[test]
fn lock_and_unlock() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 5.0, 5.0);
    assert_round_trip(&mut d, Command::Lock { page: 0, ids: vec![a.clone()] });
    assert!(layer(&d, &a).locked);
    Command::Unlock { page: 0, ids: vec![a.clone()] }.apply(&mut d).unwrap();
    assert!(!layer(&d, &a).locked);
    assert_round_trip(&mut d, Command::LockPage { page: 0 });
    assert!(d.page(0).unwrap().is_locked());
    Command::UnlockPage { page: 0 }.apply(&mut d).unwrap();
    assert!(!d.page(0).unwrap().is_locked());
}

// =============================================================
// Pages
// =============================================================

#[test]
fn add_page_clamps_index_and_activates() {
    let mut d = doc();
    let outcome = assert_round_trip(&mut d, Command::AddPage { index: 9 });
    assert_eq!(d.page_count(), 2);
    assert_eq!(outcome.active_page, Some(1));
    assert_eq!(d.page(1).unwrap().root().unwrap().props().box_size(), BoxSize::new(800.0, 600.0));
}

#[test]
fn delete_last_page_is_refused() {
    let mut d = doc();
    let err = Command::DeletePage { page: 0 }.apply(&mut d).unwrap_err();
    assert_eq!(err.error_code(), "E_LAST_PAGE");
}

#[test]
fn delete_page_activates_neighbor() {
    let mut d = doc();
    Command::AddPage { index: 1 }.apply(&mut d).unwrap();
    let outcome = assert_round_trip(&mut d, Command::DeletePage { page: 1 });
    assert_eq!(d.page_count(), 1);
    assert_eq!(outcome.active_page, Some(0));
}

#[test]
fn duplicate_page_copies_with_fresh_ids() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 5.0, 5.0);
    let outcome = assert_round_trip(&mut d, Command::DuplicatePage { page: 0 });
    assert_eq!(outcome.active_page, Some(1));
    let copy = d.page(1).unwrap();
    assert_eq!(copy.len(), 2);
    assert!(!copy.contains(&a));
    assert!(copy.validate().is_ok());
}

#[test]
fn move_pages() {
    let mut d = doc();
    add_at(&mut d, 0.0, 0.0, 5.0, 5.0);
    Command::AddPage { index: 1 }.apply(&mut d).unwrap();
    assert!(matches!(Command::MovePageUp { page: 0 }.apply(&mut d), Err(CommandError::PageBoundary(0))));
    assert!(matches!(Command::MovePageDown { page: 1 }.apply(&mut d), Err(CommandError::PageBoundary(1))));
    let outcome = assert_round_trip(&mut d, Command::MovePageDown { page: 0 });
    assert_eq!(outcome.active_page, Some(1));
    assert_eq!(d.page(0).unwrap().len(), 1);
    assert_eq!(d.page(1).unwrap().len(), 2);
    Command::MovePageUp { page: 1 }.apply(&mut d).unwrap();
    assert_eq!(d.page(0).unwrap().len(), 2);
}

#[test]
fn set_page_size_recenters_content() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 5.0, 5.0);
    Command::SetProp {
        page: 0,
        ids: vec![LayerId::root()],
        props: json!({ "image": { "url": "bg", "boxSize": { "width": 800.0, "height": 800.0 }, "position": { "x": 0.0, "y": -100.0 } } }),
    }
    .apply(&mut d)
    .unwrap();
    assert_round_trip(&mut d, Command::SetPageSize { size: BoxSize::new(1000.0, 800.0) });
    assert_eq!(d.page_size(), BoxSize::new(1000.0, 800.0));
    assert_eq!(layer(&d, &a).props().position(), Point::new(100.0, 100.0));
    let root = d.page(0).unwrap().root().unwrap();
    assert_eq!(root.props().box_size(), BoxSize::new(1000.0, 800.0));
    let bg = root.props().media("image").unwrap();
    assert_eq!(bg.box_size, BoxSize::new(1000.0, 1000.0));
    assert_eq!(bg.position, Point::new(0.0, -100.0));
    assert_eq!(root.props["image"]["url"], "bg");
}

// =============================================================
// Frames
// =============================================================

#[test]
fn detach_frame_image_places_content_on_canvas() {
    let mut d = doc();
    let outcome = Command::AddLayer {
        page: 0,
        parent: LayerId::root(),
        kind: LayerKind::Frame,
        props: json!({
            "boxSize": { "width": 200.0, "height": 100.0 },
            "scale": 1.0,
            "image": {
                "url": "u",
                "thumb": "t",
                "boxSize": { "width": 200.0, "height": 200.0 },
                "position": { "x": 0.0, "y": -50.0 },
                "rotate": 0.0,
            },
        }),
        position: Some(Point::new(100.0, 100.0)),
    }
    .apply(&mut d)
    .unwrap();
    let frame = outcome.selection.unwrap().1.remove(0);
    let outcome = assert_round_trip(&mut d, Command::DetachFrameImage { page: 0, id: frame.clone() });
    let image = outcome.selection.unwrap().1.remove(0);
    let l = layer(&d, &image);
    assert_eq!(l.kind, LayerKind::Image);
    assert_eq!(l.props().position(), Point::new(100.0, 50.0));
    assert_eq!(l.props().box_size(), BoxSize::new(200.0, 200.0));
    assert_eq!(l.props["image"]["url"], "u");
    assert!(layer(&d, &frame).props["image"].is_null());
    assert_eq!(top(&d), vec![frame.clone(), image]);

    let err = Command::DetachFrameImage { page: 0, id: frame }.apply(&mut d).unwrap_err();
    assert!(matches!(err, CommandError::EmptyFrame(_)));
}

// =============================================================
// Delta
// =============================================================

#[test]
fn compact_keeps_first_inverse_and_last_forward() {
    let mut d = doc();
    let a = add_at(&mut d, 0.0, 0.0, 5.0, 5.0);
    let before = d.clone();
    let mut delta = Delta::default();
    for x in [1.0, 2.0, 3.0] {
        let outcome = Command::SetProp { page: 0, ids: vec![a.clone()], props: json!({ "position": { "x": x } }) }
            .apply(&mut d)
            .unwrap();
        delta.merge(outcome.delta);
    }
    assert_eq!(delta.len(), 3);
    delta.compact();
    assert_eq!(delta.len(), 1);
    let after = d.clone();
    delta.apply_inverse(&mut d).unwrap();
    assert_eq!(d, before);
    delta.apply_forward(&mut d).unwrap();
    assert_eq!(d, after);
}

#[test]
fn compact_leaves_page_ops_alone() {
    let mut d = doc();
    let mut delta = Command::AddPage { index: 1 }.apply(&mut d).unwrap().delta;
    delta.merge(Command::AddPage { index: 1 }.apply(&mut d).unwrap().delta);
    delta.compact();
    assert_eq!(delta.len(), 2);
}
