//! # Unit Conversion Table
//!
//! Static mapping from unit symbols to a conversion category and a factor
//! relative to the category's base unit. Quantities are only ever summed
//! inside one category; anything else stays a separate line item.
//!
//! ```rust
//! use pantry::unit_conversion::{convert, same_category, to_base};
//!
//! assert!(same_category("kg", "g"));
//! assert_eq!(to_base(2.0, "kg").unwrap(), 2000.0);
//! assert_eq!(convert(2500.0, "g", "kg").unwrap(), 2.5);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Class of compatible units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    /// Base unit: gram
    Mass,
    /// Base unit: millilitre
    Volume,
    /// Base unit: one piece (the blank unit counts pieces too)
    Count,
}

impl UnitCategory {
    /// Symbol of the base unit for this category
    pub fn base_unit(&self) -> &'static str {
        match self {
            UnitCategory::Mass => "g",
            UnitCategory::Volume => "ml",
            UnitCategory::Count => "pcs",
        }
    }
}

/// Conversion entry for one unit symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitInfo {
    pub category: UnitCategory,
    /// Multiply by this to get the base unit amount
    pub factor: f64,
}

/// Errors raised by unit conversion
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The unit symbol is not in the table
    UnknownUnit(String),
    /// The two units belong to different categories
    CategoryMismatch { from: String, to: String },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnknownUnit(unit) => write!(f, "unknown unit '{unit}'"),
            ConversionError::CategoryMismatch { from, to } => {
                write!(f, "cannot convert '{from}' to '{to}'")
            }
        }
    }
}

impl std::error::Error for ConversionError {}

static UNIT_TABLE: LazyLock<HashMap<&'static str, UnitInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    let mut add = |symbols: &[&'static str], category: UnitCategory, factor: f64| {
        for symbol in symbols {
            map.insert(*symbol, UnitInfo { category, factor });
        }
    };

    // Mass
    add(&["mg", "milligram", "milligrams"], UnitCategory::Mass, 0.001);
    add(&["g", "gram", "grams", "gramme", "grammes"], UnitCategory::Mass, 1.0);
    add(&["kg", "kilogram", "kilograms", "kilogramme", "kilogrammes"], UnitCategory::Mass, 1000.0);
    add(&["oz", "ounce", "ounces"], UnitCategory::Mass, 28.349_523_125);
    add(&["lb", "lbs", "pound", "pounds"], UnitCategory::Mass, 453.592_37);

    // Volume
    add(&["ml", "milliliter", "milliliters", "millilitre", "millilitres"], UnitCategory::Volume, 1.0);
    add(&["cl", "centiliter", "centilitre"], UnitCategory::Volume, 10.0);
    add(&["dl", "deciliter", "decilitre"], UnitCategory::Volume, 100.0);
    add(&["l", "liter", "liters", "litre", "litres"], UnitCategory::Volume, 1000.0);
    add(&["tsp", "teaspoon", "teaspoons"], UnitCategory::Volume, 4.928_921_59);
    add(&["tbsp", "tablespoon", "tablespoons"], UnitCategory::Volume, 14.786_764_78);
    add(&["fl oz", "fluid ounce", "fluid ounces"], UnitCategory::Volume, 29.573_529_56);
    add(&["cup", "cups"], UnitCategory::Volume, 236.588_236_5);
    add(&["pint", "pints", "pt"], UnitCategory::Volume, 473.176_473);
    add(&["quart", "quarts", "qt"], UnitCategory::Volume, 946.352_946);
    add(&["gallon", "gallons", "gal"], UnitCategory::Volume, 3785.411_784);

    // Count
    add(&["", "pc", "pcs", "piece", "pieces", "item", "items", "x"], UnitCategory::Count, 1.0);
    add(&["dozen", "doz"], UnitCategory::Count, 12.0);

    map
});

/// Normalize a unit label for table lookups and label comparison
pub fn normalize_unit(unit: &str) -> String {
    unit.trim().trim_end_matches('.').to_lowercase()
}

/// Look up a unit in the conversion table
pub fn lookup(unit: &str) -> Option<UnitInfo> {
    UNIT_TABLE.get(normalize_unit(unit).as_str()).copied()
}

/// Whether both units are known and belong to the same category
pub fn same_category(u1: &str, u2: &str) -> bool {
    match (lookup(u1), lookup(u2)) {
        (Some(a), Some(b)) => a.category == b.category,
        _ => false,
    }
}

/// Whether quantities in these two units may be summed.
///
/// Identical labels always merge, even for units missing from the table.
pub fn can_merge(u1: &str, u2: &str) -> bool {
    normalize_unit(u1) == normalize_unit(u2) || same_category(u1, u2)
}

/// Express `amount` in the base unit of its category
pub fn to_base(amount: f64, unit: &str) -> Result<f64, ConversionError> {
    let info = lookup(unit).ok_or_else(|| ConversionError::UnknownUnit(unit.to_string()))?;
    Ok(amount * info.factor)
}

/// Express a base-unit amount in `unit`
pub fn from_base(amount: f64, unit: &str) -> Result<f64, ConversionError> {
    let info = lookup(unit).ok_or_else(|| ConversionError::UnknownUnit(unit.to_string()))?;
    Ok(amount / info.factor)
}

/// Convert `amount` from one unit to another of the same category
pub fn convert(amount: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
    if normalize_unit(from) == normalize_unit(to) {
        return Ok(amount);
    }
    if !same_category(from, to) {
        return match (lookup(from), lookup(to)) {
            (None, _) => Err(ConversionError::UnknownUnit(from.to_string())),
            (_, None) => Err(ConversionError::UnknownUnit(to.to_string())),
            _ => Err(ConversionError::CategoryMismatch {
                from: from.to_string(),
                to: to.to_string(),
            }),
        };
    }
    let base = to_base(amount, from)?;
    Ok(round_amount(from_base(base, to)?))
}

/// Trim floating point noise left by factor arithmetic
pub fn round_amount(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}

/// Format an amount the way it is shown next to a unit ("2", "2.5")
pub fn format_amount(amount: f64) -> String {
    let amount = round_amount(amount);
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount}")
    }
}
