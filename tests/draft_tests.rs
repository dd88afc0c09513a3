//! # Draft Tests
//!
//! Edits driven through the public draft API: the quantity group must keep
//! equal lengths after any sequence of accepted or rejected updates, and
//! the move flow must keep each step's draft separate.

use pantry::draft::{
    apply_update, Draft, DraftError, DraftField, DraftUpdate, FieldUpdate, FieldValue, StepDraft, StepOutcome,
    StepSession,
};
use pantry::list_model::{ListItem, ListType};
use pantry::mismatch::validate_draft;

fn assert_group_aligned(draft: &Draft) {
    assert_eq!(draft.quantity_text.len(), draft.quantity.len(), "text/quantity diverged: {draft:?}");
    assert_eq!(draft.quantity.len(), draft.unit.len(), "quantity/unit diverged: {draft:?}");
}

/// Mix of helper edits and raw single-field edits that would break the group
fn edit_for(step: usize, len: usize) -> DraftUpdate {
    let index = if len == 0 { 0 } else { step % (len + 1) };
    match step % 7 {
        0 => Draft::add_quantity_row_after(index),
        1 => Draft::set_quantity_text(index, "1 1/2"),
        2 => Draft::set_unit(index, "g"),
        3 => Draft::remove_quantity_row(index),
        4 => DraftUpdate::Single(FieldUpdate::remove(DraftField::Unit, index)),
        5 => DraftUpdate::Single(FieldUpdate::insert_after(
            DraftField::Quantity,
            index,
            FieldValue::Amount(3.0),
        )),
        _ => Draft::add_expiry_after(index, "2025-01-01"),
    }
}

#[test]
fn test_group_lengths_survive_any_edit_sequence() {
    let mut draft = Draft::new_item_rows();
    let mut accepted = 0;
    let mut rejected = 0;

    for step in 0..200 {
        let before = draft.clone();
        let edit = edit_for(step, draft.group_len());
        match apply_update(&mut draft, edit) {
            Ok(()) => accepted += 1,
            Err(_) => {
                rejected += 1;
                assert_eq!(draft, before, "rejected update changed the draft at step {step}");
            }
        }
        assert_group_aligned(&draft);
    }

    assert!(accepted > 0);
    assert!(rejected > 0);
}

#[test]
fn test_raw_single_field_edits_are_rejected() {
    let mut draft = Draft::new_item_rows();
    let before = draft.clone();

    let result = apply_update(&mut draft, DraftUpdate::Single(FieldUpdate::remove(DraftField::Unit, 0)));
    assert!(result.is_err());
    assert_eq!(draft, before);

    // Expiries are outside the group and can change on their own
    apply_update(&mut draft, Draft::add_expiry_after(0, "2025-02-01")).unwrap();
    assert_eq!(draft.expiries.len(), 2);
    assert_group_aligned(&draft);
}

#[test]
fn test_quantity_text_keeps_parsed_amount() {
    let mut draft = Draft::new_item_rows();
    apply_update(&mut draft, Draft::set_quantity_text(0, "2 1/4")).unwrap();
    assert_eq!(draft.quantity, vec![2.25]);

    apply_update(&mut draft, Draft::set_quantity_text(0, "lots")).unwrap();
    assert_eq!(draft.quantity_text, vec!["lots".to_string()]);
    assert_eq!(draft.quantity, vec![0.0]);
}

fn shopping_item(id: &str, name: &str, checked: u32) -> ListItem {
    ListItem::new("user-1", ListType::Shopping, name)
        .with_id(id)
        .with_quantity(vec![checked as f64])
        .with_checked_count(checked)
}

#[test]
fn test_step_session_keeps_drafts_per_item() {
    let mut session = StepSession::open(vec![
        StepDraft { item: shopping_item("a", "Carrot", 2), draft: Draft::empty() },
        StepDraft { item: shopping_item("b", "Leek", 1), draft: Draft::seeded(Some("2025-08-01".into())) },
    ]);
    assert_eq!(session.target_count(), Some(2));

    session.apply_update(Draft::add_quantity_row_after(0)).unwrap();
    session.apply_update(Draft::set_quantity_text(0, "1")).unwrap();
    assert_eq!(session.step_for_item("a").unwrap().draft.quantity, vec![1.0]);
    assert_eq!(session.step_for_item("b").unwrap().draft.quantity, Vec::<f64>::new());
    assert!(!session.can_submit());

    assert_eq!(session.advance(), StepOutcome::Next(1));
    assert_eq!(session.step_for_item("a").unwrap().draft, Draft::empty());
    assert_eq!(session.current().unwrap().item.name, "Leek");
    assert_eq!(session.current().unwrap().draft.expiries, vec!["2025-08-01".to_string()]);
    assert!(session.can_submit());

    assert_eq!(session.advance(), StepOutcome::Finished);
    assert!(session.is_finished());
    assert!(session.current().is_none());
    assert_eq!(
        session.apply_update(Draft::add_quantity_row_after(0)),
        Err(DraftError::NoActiveStep)
    );
    assert_eq!(session.step_for_item("b").unwrap().draft, Draft::empty());
}

#[test]
fn test_closing_session_discards_drafts() {
    let mut session = StepSession::open(vec![StepDraft {
        item: shopping_item("a", "Carrot", 1),
        draft: Draft::empty(),
    }]);
    session.apply_update(Draft::add_expiry_after(0, "2025-08-01")).unwrap();
    session.picker.open(0);

    session.close();
    assert!(session.is_finished());
    assert_eq!(session.picker.current(), None);
    assert_eq!(session.step_for_item("a").unwrap().draft, Draft::empty());
}

#[test]
fn test_empty_session_is_finished() {
    let mut session = StepSession::open(Vec::new());
    assert!(session.is_empty());
    assert!(session.is_finished());
    assert!(!session.can_submit());

    assert_eq!(session.apply_update(Draft::set_expiry(0, "2025-08-01")), Err(DraftError::NoActiveStep));
}

#[test]
fn test_per_unit_expiries_validate_against_target() {
    let mut draft = Draft::empty();
    apply_update(&mut draft, Draft::add_expiry_after(0, "2025-08-01")).unwrap();
    assert!(validate_draft(&draft, 3).can_submit());

    apply_update(&mut draft, Draft::add_expiry_after(0, "")).unwrap();
    assert!(validate_draft(&draft, 3).expiry_mismatch);

    apply_update(&mut draft, Draft::set_expiry(1, "2025-08-15")).unwrap();
    apply_update(&mut draft, Draft::add_expiry_after(1, "2025-09-01")).unwrap();
    assert!(validate_draft(&draft, 3).can_submit());
    assert!(validate_draft(&draft, 2).expiry_mismatch);
}
