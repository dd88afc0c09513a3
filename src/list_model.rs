//! # Shopping and Inventory List Data Model
//!
//! A [`ListItem`] is one persisted line of either the shopping list or the
//! inventory. Its `quantity` holds one amount per sub-entry and `expiries`
//! runs parallel to it whenever expiry dates are tracked.
//!
//! ## Usage
//!
//! ```rust
//! use pantry::list_model::{ListItem, ListType};
//!
//! let rice = ListItem::new("user-1", ListType::Inventory, "Rice")
//!     .with_unit("g")
//!     .with_quantity(vec![500.0])
//!     .with_expiries(vec!["2025-09-01".to_string()]);
//!
//! assert_eq!(rice.total_amount(), 500.0);
//! assert_eq!(rice.quantity_display(), "500 g");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::unit_conversion::format_amount;

/// Which list an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Shopping,
    Inventory,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Shopping => "shopping",
            ListType::Inventory => "inventory",
        }
    }
}

/// A persisted shopping or inventory line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// Document id; empty until the store assigns one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Id of the user owning the document
    pub owner_id: String,

    #[serde(rename = "type")]
    pub list_type: ListType,

    pub name: String,

    /// Single display unit for every quantity sub-entry (blank = counted pieces)
    #[serde(default)]
    pub unit: String,

    /// Ordered sub-amounts, expressed in `unit`
    #[serde(default)]
    pub quantity: Vec<f64>,

    #[serde(default)]
    pub checked: bool,

    /// How many sub-units are checked (shopping) or used (inventory)
    #[serde(default)]
    pub checked_count: u32,

    /// ISO-8601 dates parallel to `quantity`; blank entries carry no date
    #[serde(default)]
    pub expiries: Vec<String>,
}

impl ListItem {
    /// Create an item with no quantity, unit, or expiry
    pub fn new(owner_id: &str, list_type: ListType, name: &str) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.to_string(),
            list_type,
            name: name.trim().to_string(),
            unit: String::new(),
            quantity: Vec::new(),
            checked: false,
            checked_count: 0,
            expiries: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.trim().to_string();
        self
    }

    pub fn with_quantity(mut self, quantity: Vec<f64>) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_expiries(mut self, expiries: Vec<String>) -> Self {
        self.expiries = expiries;
        self
    }

    /// Mark `count` units as checked, clamped to the units the item represents
    pub fn with_checked_count(mut self, count: u32) -> Self {
        self.set_checked_count(count);
        self
    }

    /// Lower-cased, trimmed name used for duplicate detection
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether the item tracks pieces rather than a measured unit
    pub fn is_count_only(&self) -> bool {
        self.unit.trim().is_empty()
    }

    /// Whether any expiry slot is in use
    pub fn tracks_expiries(&self) -> bool {
        !self.expiries.is_empty()
    }

    /// Sum of all quantity sub-entries in `unit`
    pub fn total_amount(&self) -> f64 {
        self.quantity.iter().sum()
    }

    /// Number of discrete units this item stands for (never below 1)
    pub fn total_units_represented(&self) -> u32 {
        let units = if self.is_count_only() {
            self.total_amount().round().max(0.0) as u32
        } else {
            self.quantity.len() as u32
        };
        units.max(1)
    }

    /// Units not yet checked or used
    pub fn available_units(&self) -> u32 {
        self.total_units_represented().saturating_sub(self.checked_count)
    }

    /// Set the checked count, clamping and keeping `checked` consistent
    pub fn set_checked_count(&mut self, count: u32) {
        self.checked_count = count.min(self.total_units_represented());
        self.checked = self.checked_count > 0;
    }

    /// Available amount, formatted with the unit ("2.5 kg", "3")
    pub fn quantity_display(&self) -> String {
        let amount = format_amount(self.total_amount());
        if self.is_count_only() {
            amount
        } else {
            format!("{} {}", amount, self.unit)
        }
    }

    /// Drop the checked units from the item and clear the check.
    ///
    /// Count-only items lose `checked_count` pieces from their total; measured
    /// items lose their first `checked_count` sub-entries.
    pub fn remove_checked_units(&mut self) {
        let checked = self.checked_count as usize;
        if self.is_count_only() {
            let remaining = (self.total_amount() - checked as f64).max(0.0);
            self.quantity = vec![remaining];
            self.expiries.truncate(1);
        } else {
            let drain = checked.min(self.quantity.len());
            self.quantity.drain(..drain);
            let expiry_drain = drain.min(self.expiries.len());
            self.expiries.drain(..expiry_drain);
        }
        self.checked_count = 0;
        self.checked = false;
    }

    /// Whether every represented unit is checked
    pub fn is_fully_checked(&self) -> bool {
        self.checked_count >= self.total_units_represented()
    }
}

/// Normalize an item name for case-insensitive matching
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
}

impl fmt::Display for ListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.quantity_display())?;

        if self.checked_count > 0 {
            write!(f, " [{}/{} checked]", self.checked_count, self.total_units_represented())?;
        }

        let dates: Vec<&str> = self
            .expiries
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();
        if !dates.is_empty() {
            write!(f, " exp: {}", dates.join(", "))?;
        }

        Ok(())
    }
}
