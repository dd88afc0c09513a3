//! Mismatch checks run on every draft change.
//!
//! A draft may skip quantity/expiry entirely, give one value for the whole
//! batch, or give exactly one value per unit being moved. Anything in
//! between is ambiguous and disables submit.

use crate::draft::Draft;

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Number of entries that are not blank after trimming
pub fn filled_count(values: &[String]) -> usize {
    values.iter().filter(|v| !is_blank(v)).count()
}

/// Whether the quantity group disagrees with the target count.
///
/// Valid when nothing is filled in, or when the filled quantity texts, the
/// filled units and the target count all agree and no unit slot is blank.
pub fn has_quantity_mismatch(quantity_text: &[String], units: &[String], target_count: usize) -> bool {
    let filled_qty = filled_count(quantity_text);
    let filled_unit = filled_count(units);

    if filled_qty == 0 && filled_unit == 0 {
        return false;
    }

    let counts_agree = filled_qty == target_count && filled_unit == target_count;
    let units_complete = filled_unit == units.len();

    !(counts_agree && units_complete)
}

/// Whether the expiry list disagrees with the target count.
///
/// No date at all, or a single date row, applies to every unit. Once extra
/// rows are added there must be exactly one date per unit with no blank gaps.
pub fn has_expiry_mismatch(expiries: &[String], target_count: usize) -> bool {
    let filled = filled_count(expiries);

    if filled == 0 {
        return false;
    }
    if filled == 1 && expiries.len() == 1 {
        return false;
    }

    !(filled == target_count && filled == expiries.len())
}

/// Outcome of validating one draft against its target count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftValidation {
    pub quantity_mismatch: bool,
    pub expiry_mismatch: bool,
}

impl DraftValidation {
    pub fn can_submit(&self) -> bool {
        !self.quantity_mismatch && !self.expiry_mismatch
    }

    /// Message keys for the inline warnings to show
    pub fn message_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.quantity_mismatch {
            keys.push("quantity-mismatch");
        }
        if self.expiry_mismatch {
            keys.push("expiry-mismatch");
        }
        keys
    }
}

/// Run both predicates against a draft
pub fn validate_draft(draft: &Draft, target_count: usize) -> DraftValidation {
    DraftValidation {
        quantity_mismatch: has_quantity_mismatch(&draft.quantity_text, &draft.unit, target_count),
        expiry_mismatch: has_expiry_mismatch(&draft.expiries, target_count),
    }
}
