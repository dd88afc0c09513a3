//! # Amount Modal
//!
//! Moves an amount of an inventory item between "available" and "used".
//! Amounts count sub-entries (units), not the measured quantity, so a
//! 1000 g bag of rice is one unit. The entered amount only has to be a
//! positive number; it is not checked against the available stock.

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

use crate::list_errors::{ListError, ListResult};
use crate::list_model::ListItem;

/// Use/revert collaborator receiving confirmed amounts
#[async_trait]
pub trait InventoryCheckHandler: Send + Sync {
    async fn handle_inventory_check(&self, item_id: &str, amount: f64, is_revert: bool) -> ListResult<ListItem>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmountError {
    Empty,
    NotANumber(String),
    NotPositive,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => write!(f, "no amount entered"),
            AmountError::NotANumber(text) => write!(f, "'{text}' is not a number"),
            AmountError::NotPositive => write!(f, "amount must be greater than zero"),
        }
    }
}

impl std::error::Error for AmountError {}

impl From<AmountError> for ListError {
    fn from(err: AmountError) -> Self {
        ListError::Validation(err.to_string())
    }
}

/// Parse a decimal amount ("2", "0.5", "0,5") that must be finite and > 0
pub fn parse_amount(text: &str) -> Result<f64, AmountError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }
    let amount: f64 = text
        .replace(',', ".")
        .parse()
        .map_err(|_| AmountError::NotANumber(text.to_string()))?;
    validate_amount(amount)
}

/// Accept only finite amounts greater than zero
pub fn validate_amount(amount: f64) -> Result<f64, AmountError> {
    if !amount.is_finite() {
        return Err(AmountError::NotANumber(amount.to_string()));
    }
    if amount <= 0.0 {
        return Err(AmountError::NotPositive);
    }
    Ok(amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountMode {
    /// Mark part of the available stock as used
    Use,
    /// Give part of the used amount back
    Revert,
}

/// Local state of the use/revert amount modal
#[derive(Debug, Clone, PartialEq)]
pub struct AmountModal {
    item_id: String,
    item_name: String,
    mode: AmountMode,
    /// What the user sees as the reference amount (available or used)
    reference: String,
    amount_text: String,
    open: bool,
}

impl Default for AmountModal {
    fn default() -> Self {
        Self {
            item_id: String::new(),
            item_name: String::new(),
            mode: AmountMode::Use,
            reference: String::new(),
            amount_text: String::new(),
            open: false,
        }
    }
}

impl AmountModal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open for consuming stock; the reference is the number of available units
    pub fn open_use(&mut self, item: &ListItem) {
        self.open_for(item, AmountMode::Use, item.available_units().to_string());
    }

    /// Open for reverting; the reference is the used count
    pub fn open_revert(&mut self, item: &ListItem) {
        self.open_for(item, AmountMode::Revert, item.checked_count.to_string());
    }

    fn open_for(&mut self, item: &ListItem, mode: AmountMode, reference: String) {
        debug!("Opening amount modal for '{}' ({:?})", item.name, mode);
        *self = Self {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            mode,
            reference,
            amount_text: String::new(),
            open: true,
        };
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn mode(&self) -> AmountMode {
        self.mode
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn amount_text(&self) -> &str {
        &self.amount_text
    }

    pub fn set_amount_text(&mut self, text: &str) {
        self.amount_text = text.to_string();
    }

    pub fn amount(&self) -> Result<f64, AmountError> {
        parse_amount(&self.amount_text)
    }

    pub fn can_confirm(&self) -> bool {
        self.open && self.amount().is_ok()
    }

    /// Hand the amount to the handler, then reset and close.
    ///
    /// If the handler fails the modal stays open with the entered amount.
    pub async fn confirm<H>(&mut self, handler: &H) -> ListResult<ListItem>
    where
        H: InventoryCheckHandler + ?Sized,
    {
        if !self.open {
            return Err(ListError::NotFound("amount modal is not open".to_string()));
        }
        let amount = self.amount()?;
        let is_revert = self.mode == AmountMode::Revert;

        match handler.handle_inventory_check(&self.item_id, amount, is_revert).await {
            Ok(item) => {
                self.close();
                Ok(item)
            }
            Err(e) => {
                warn!("Inventory check for '{}' failed: {}", self.item_name, e);
                Err(e)
            }
        }
    }

    /// Clear the local amount fields and close
    pub fn close(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("2"), Ok(2.0));
        assert_eq!(parse_amount(" 0,5 "), Ok(0.5));
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert_eq!(parse_amount("0"), Err(AmountError::NotPositive));
        assert_eq!(parse_amount("-1"), Err(AmountError::NotPositive));
        assert!(matches!(parse_amount("abc"), Err(AmountError::NotANumber(_))));
        assert!(matches!(parse_amount("inf"), Err(AmountError::NotANumber(_))));
        assert!(matches!(parse_amount("NaN"), Err(AmountError::NotANumber(_))));
    }

    #[test]
    fn test_amount_above_stock_is_allowed() {
        let item = crate::list_model::ListItem::new("u", crate::list_model::ListType::Inventory, "Rice")
            .with_id("r1")
            .with_unit("g")
            .with_quantity(vec![500.0]);
        let mut modal = AmountModal::new();
        modal.open_use(&item);
        modal.set_amount_text("9000");
        assert_eq!(modal.reference(), "1");
        assert!(modal.can_confirm());
    }

    #[test]
    fn test_reference_counts_units_not_grams() {
        let mut rice = crate::list_model::ListItem::new("u", crate::list_model::ListType::Inventory, "Rice")
            .with_id("r1")
            .with_unit("g")
            .with_quantity(vec![1000.0, 250.0, 250.0]);
        rice.set_checked_count(1);

        let mut modal = AmountModal::new();
        modal.open_use(&rice);
        assert_eq!(modal.reference(), "2");

        modal.open_revert(&rice);
        assert_eq!(modal.reference(), "1");
    }
}
