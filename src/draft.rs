//! # Draft Manager
//!
//! Drafts are session-only editing buffers describing the sub-entries of one
//! logical item while it is being moved into the inventory. Every edit goes
//! through [`apply_update`], which applies a whole batch to one snapshot and
//! commits it only if the quantity group (`quantity_text`, `quantity`,
//! `unit`) still has equal lengths.
//!
//! ## Usage
//!
//! ```rust
//! use pantry::draft::{Draft, apply_update};
//!
//! let mut draft = Draft::new_item_rows();
//! apply_update(&mut draft, Draft::set_quantity_text(0, "1/2")).unwrap();
//! apply_update(&mut draft, Draft::set_unit(0, "kg")).unwrap();
//! apply_update(&mut draft, Draft::add_quantity_row_after(0)).unwrap();
//!
//! assert_eq!(draft.quantity, vec![0.5, 0.0]);
//! assert_eq!(draft.unit, vec!["kg".to_string(), String::new()]);
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::list_model::ListItem;
use crate::mismatch::{validate_draft, DraftValidation};

/// Default text of the item count field in a fresh new-item draft
pub const DEFAULT_ITEM_COUNT: &str = "1";

/// One of the four parallel arrays of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    QuantityText,
    Quantity,
    Unit,
    Expiries,
}

impl DraftField {
    fn is_quantity_group(&self) -> bool {
        !matches!(self, DraftField::Expiries)
    }
}

/// Value written into a draft slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Amount(f64),
    Text(String),
}

/// Edit of a single slot. `value: None` removes the slot at `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    pub field: DraftField,
    pub index: usize,
    #[serde(default)]
    pub value: Option<FieldValue>,
    #[serde(default)]
    pub insert_after: bool,
}

impl FieldUpdate {
    pub fn set(field: DraftField, index: usize, value: FieldValue) -> Self {
        Self { field, index, value: Some(value), insert_after: false }
    }

    pub fn insert_after(field: DraftField, index: usize, value: FieldValue) -> Self {
        Self { field, index, value: Some(value), insert_after: true }
    }

    pub fn remove(field: DraftField, index: usize) -> Self {
        Self { field, index, value: None, insert_after: false }
    }
}

/// A single edit or a batch committed together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DraftUpdate {
    Single(FieldUpdate),
    Batch { updates: Vec<FieldUpdate> },
}

impl DraftUpdate {
    fn into_updates(self) -> Vec<FieldUpdate> {
        match self {
            DraftUpdate::Single(update) => vec![update],
            DraftUpdate::Batch { updates } => updates,
        }
    }
}

/// Reasons an update is rejected. A rejected update leaves the draft untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftError {
    IndexOutOfRange { field: DraftField, index: usize, len: usize },
    ValueType { field: DraftField },
    GroupLengthMismatch { quantity_text: usize, quantity: usize, unit: usize },
    /// The step flow is finished or has no steps
    NoActiveStep,
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftError::IndexOutOfRange { field, index, len } => {
                write!(f, "index {index} out of range for {field:?} (len {len})")
            }
            DraftError::ValueType { field } => write!(f, "wrong value type for {field:?}"),
            DraftError::GroupLengthMismatch { quantity_text, quantity, unit } => write!(
                f,
                "quantity group lengths differ (text {quantity_text}, quantity {quantity}, unit {unit})"
            ),
            DraftError::NoActiveStep => write!(f, "no active step to edit"),
        }
    }
}

impl std::error::Error for DraftError {}

/// Parallel arrays describing the sub-entries of one logical item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub quantity: Vec<f64>,
    pub quantity_text: Vec<String>,
    pub unit: Vec<String>,
    pub expiries: Vec<String>,
}

impl Draft {
    /// A draft with no rows at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// A draft with one blank quantity row and one blank expiry row
    pub fn new_item_rows() -> Self {
        Self {
            quantity: vec![0.0],
            quantity_text: vec![String::new()],
            unit: vec![String::new()],
            expiries: vec![String::new()],
        }
    }

    /// A draft opened for a checked shopping item, optionally with a suggested expiry
    pub fn seeded(suggested_expiry: Option<String>) -> Self {
        Self {
            expiries: suggested_expiry.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn group_len(&self) -> usize {
        self.quantity.len()
    }

    fn check_group(&self) -> Result<(), DraftError> {
        let (t, q, u) = (self.quantity_text.len(), self.quantity.len(), self.unit.len());
        if t == q && q == u {
            Ok(())
        } else {
            Err(DraftError::GroupLengthMismatch { quantity_text: t, quantity: q, unit: u })
        }
    }

    fn apply_one(&mut self, update: FieldUpdate) -> Result<(), DraftError> {
        let FieldUpdate { field, index, value, insert_after } = update;
        match field {
            DraftField::Quantity => {
                let value = match value {
                    None => None,
                    Some(FieldValue::Amount(amount)) => Some(amount),
                    Some(FieldValue::Text(_)) => return Err(DraftError::ValueType { field }),
                };
                edit_slot(&mut self.quantity, field, index, value, insert_after)
            }
            DraftField::QuantityText | DraftField::Unit | DraftField::Expiries => {
                let value = match value {
                    None => None,
                    Some(FieldValue::Text(text)) => Some(text),
                    Some(FieldValue::Amount(_)) => return Err(DraftError::ValueType { field }),
                };
                let slots = match field {
                    DraftField::QuantityText => &mut self.quantity_text,
                    DraftField::Unit => &mut self.unit,
                    _ => &mut self.expiries,
                };
                edit_slot(slots, field, index, value, insert_after)
            }
        }
    }

    /// Batch inserting a blank quantity row after `index`
    pub fn add_quantity_row_after(index: usize) -> DraftUpdate {
        DraftUpdate::Batch {
            updates: vec![
                FieldUpdate::insert_after(DraftField::QuantityText, index, FieldValue::Text(String::new())),
                FieldUpdate::insert_after(DraftField::Quantity, index, FieldValue::Amount(0.0)),
                FieldUpdate::insert_after(DraftField::Unit, index, FieldValue::Text(String::new())),
            ],
        }
    }

    /// Batch removing quantity row `index`
    pub fn remove_quantity_row(index: usize) -> DraftUpdate {
        DraftUpdate::Batch {
            updates: vec![
                FieldUpdate::remove(DraftField::QuantityText, index),
                FieldUpdate::remove(DraftField::Quantity, index),
                FieldUpdate::remove(DraftField::Unit, index),
            ],
        }
    }

    /// Batch writing the typed text and its parsed amount in one step
    pub fn set_quantity_text(index: usize, text: &str) -> DraftUpdate {
        let amount = parse_quantity_text(text).unwrap_or(0.0);
        DraftUpdate::Batch {
            updates: vec![
                FieldUpdate::set(DraftField::QuantityText, index, FieldValue::Text(text.to_string())),
                FieldUpdate::set(DraftField::Quantity, index, FieldValue::Amount(amount)),
            ],
        }
    }

    pub fn set_unit(index: usize, unit: &str) -> DraftUpdate {
        DraftUpdate::Single(FieldUpdate::set(DraftField::Unit, index, FieldValue::Text(unit.to_string())))
    }

    /// Insert a new expiry row after `index`, initialised to `value`
    pub fn add_expiry_after(index: usize, value: &str) -> DraftUpdate {
        DraftUpdate::Single(FieldUpdate::insert_after(
            DraftField::Expiries,
            index,
            FieldValue::Text(value.to_string()),
        ))
    }

    pub fn set_expiry(index: usize, date: &str) -> DraftUpdate {
        DraftUpdate::Single(FieldUpdate::set(DraftField::Expiries, index, FieldValue::Text(date.to_string())))
    }

    pub fn remove_expiry(index: usize) -> DraftUpdate {
        DraftUpdate::Single(FieldUpdate::remove(DraftField::Expiries, index))
    }
}

fn edit_slot<T>(
    slots: &mut Vec<T>,
    field: DraftField,
    index: usize,
    value: Option<T>,
    insert_after: bool,
) -> Result<(), DraftError> {
    let len = slots.len();
    match value {
        None => {
            if index >= len {
                return Err(DraftError::IndexOutOfRange { field, index, len });
            }
            slots.remove(index);
        }
        Some(value) if insert_after => {
            slots.insert((index + 1).min(len), value);
        }
        Some(value) => {
            if index < len {
                slots[index] = value;
            } else if index == len {
                slots.push(value);
            } else {
                return Err(DraftError::IndexOutOfRange { field, index, len });
            }
        }
    }
    Ok(())
}

/// Apply a single or batched update atomically.
///
/// All edits are applied to a copy of the draft; the copy replaces the
/// original only if every edit succeeded and the quantity group lengths
/// still agree.
pub fn apply_update(draft: &mut Draft, update: DraftUpdate) -> Result<(), DraftError> {
    let updates = update.into_updates();
    let touches_group = updates.iter().any(|u| u.field.is_quantity_group());
    let mut snapshot = draft.clone();

    for update in updates {
        trace!("Applying draft update {:?}", update);
        snapshot.apply_one(update)?;
    }

    if touches_group {
        snapshot.check_group()?;
    }

    *draft = snapshot;
    Ok(())
}

lazy_static! {
    static ref DECIMAL: Regex = Regex::new(r"^\d+(?:[.,]\d+)?$").expect("decimal pattern should be valid");
    static ref FRACTION: Regex =
        Regex::new(r"^(?:(\d+)\s+)?(\d+)\s*[⁄/]\s*(\d+)$").expect("fraction pattern should be valid");
}

/// Parse the text typed into a quantity field ("2", "1.5", "1,5", "1/2", "2 1/4")
pub fn parse_quantity_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if DECIMAL.is_match(text) {
        return text.replace(',', ".").parse().ok();
    }
    let captures = FRACTION.captures(text)?;
    let whole: f64 = match captures.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    let numerator: f64 = captures[2].parse().ok()?;
    let denominator: f64 = captures[3].parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some(whole + numerator / denominator)
}

/// Which expiry row is open in the date picker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryCursor {
    open: Option<usize>,
}

impl ExpiryCursor {
    pub fn open(&mut self, index: usize) {
        self.open = Some(index);
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn current(&self) -> Option<usize> {
        self.open
    }

    /// Keep the cursor on the same row after an expiry row is removed
    fn on_removed(&mut self, removed: usize) {
        self.open = match self.open {
            Some(open) if open == removed => None,
            Some(open) if open > removed => Some(open - 1),
            other => other,
        };
    }

    fn on_inserted_after(&mut self, index: usize) {
        if let Some(open) = self.open {
            if open > index {
                self.open = Some(open + 1);
            }
        }
    }

    fn follow(&mut self, update: &DraftUpdate) {
        let updates = match update {
            DraftUpdate::Single(u) => std::slice::from_ref(u),
            DraftUpdate::Batch { updates } => updates.as_slice(),
        };
        for u in updates.iter().filter(|u| u.field == DraftField::Expiries) {
            match (&u.value, u.insert_after) {
                (None, _) => self.on_removed(u.index),
                (Some(_), true) => self.on_inserted_after(u.index),
                _ => {}
            }
        }
    }
}

/// Draft converting one checked shopping item into inventory
#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    pub item: ListItem,
    pub draft: Draft,
}

impl StepDraft {
    /// The checked count of the shopping item, clamped to at least 1
    pub fn target_count(&self) -> usize {
        (self.item.checked_count as usize).max(1)
    }
}

/// State of the shopping → inventory move flow
#[derive(Debug, Clone, PartialEq)]
pub struct StepSession {
    steps: Vec<StepDraft>,
    current_step: usize,
    finished: bool,
    pub picker: ExpiryCursor,
}

/// Where the move flow goes after a submitted step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Next(usize),
    Finished,
}

impl StepSession {
    /// Open the flow with one draft per checked item
    pub fn open(steps: Vec<StepDraft>) -> Self {
        debug!("Opening inventory move session with {} steps", steps.len());
        let finished = steps.is_empty();
        Self { steps, current_step: 0, finished, picker: ExpiryCursor::default() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current(&self) -> Option<&StepDraft> {
        if self.finished {
            return None;
        }
        self.steps.get(self.current_step)
    }

    /// Look up a step by the id of its shopping item
    pub fn step_for_item(&self, item_id: &str) -> Option<&StepDraft> {
        self.steps.iter().find(|s| s.item.id == item_id)
    }

    pub fn target_count(&self) -> Option<usize> {
        self.current().map(StepDraft::target_count)
    }

    pub fn validation(&self) -> Option<DraftValidation> {
        self.current().map(|s| validate_draft(&s.draft, s.target_count()))
    }

    pub fn can_submit(&self) -> bool {
        self.validation().is_some_and(|v| v.can_submit())
    }

    /// Apply an edit to the current step's draft
    pub fn apply_update(&mut self, update: DraftUpdate) -> Result<(), DraftError> {
        if self.finished {
            return Err(DraftError::NoActiveStep);
        }
        let Some(step) = self.steps.get_mut(self.current_step) else {
            return Err(DraftError::NoActiveStep);
        };
        let applied = update.clone();
        apply_update(&mut step.draft, update)?;
        self.picker.follow(&applied);
        Ok(())
    }

    /// Discard the current draft and move to the next step
    pub fn advance(&mut self) -> StepOutcome {
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.draft = Draft::empty();
        }
        self.picker.close();

        if self.current_step + 1 < self.steps.len() {
            self.current_step += 1;
            debug!("Inventory move advanced to step {}", self.current_step);
            StepOutcome::Next(self.current_step)
        } else {
            self.finished = true;
            debug!("Inventory move finished");
            StepOutcome::Finished
        }
    }

    /// Abandon the flow without submitting anything
    pub fn close(&mut self) {
        for step in &mut self.steps {
            step.draft = Draft::empty();
        }
        self.picker.close();
        self.finished = true;
    }
}

/// Draft for adding an inventory item that did not come from the shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemDraft {
    pub item_name: String,
    pub item_count: String,
    #[serde(flatten)]
    pub draft: Draft,
}

impl Default for NewItemDraft {
    fn default() -> Self {
        Self {
            item_name: String::new(),
            item_count: DEFAULT_ITEM_COUNT.to_string(),
            draft: Draft::new_item_rows(),
        }
    }
}

impl NewItemDraft {
    /// Parsed item count, defaulting to 1 and never below 1
    pub fn target_count(&self) -> usize {
        parse_item_count(&self.item_count)
    }
}

/// Parse an item count field the way the count input does: leading digits
/// only, defaulting to 1, clamped to at least 1
pub fn parse_item_count(text: &str) -> usize {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<usize>().unwrap_or(1).max(1)
}

/// State of the "add inventory item" modal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItemSession {
    pub draft: NewItemDraft,
    pub picker: ExpiryCursor,
}

impl NewItemSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item_name(&mut self, name: &str) {
        self.draft.item_name = name.to_string();
    }

    pub fn set_item_count(&mut self, count: &str) {
        self.draft.item_count = count.to_string();
    }

    pub fn target_count(&self) -> usize {
        self.draft.target_count()
    }

    pub fn apply_update(&mut self, update: DraftUpdate) -> Result<(), DraftError> {
        let applied = update.clone();
        apply_update(&mut self.draft.draft, update)?;
        self.picker.follow(&applied);
        Ok(())
    }

    pub fn validation(&self) -> DraftValidation {
        validate_draft(&self.draft.draft, self.target_count())
    }

    pub fn can_submit(&self) -> bool {
        !self.draft.item_name.trim().is_empty() && self.validation().can_submit()
    }

    /// Back to a fresh draft so another item can be entered
    pub fn reset(&mut self) {
        self.draft = NewItemDraft::default();
        self.picker.close();
    }
}
