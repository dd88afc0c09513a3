//! # Pantry
//!
//! Shopping list and inventory bookkeeping: per-unit quantity drafts with
//! expiry tracking, unit-aware merging into the inventory, and a use/revert
//! flow for consuming stock.

pub mod amount;
pub mod db;
pub mod draft;
pub mod expiry;
pub mod list_config;
pub mod list_errors;
pub mod list_model;
pub mod localization;
pub mod mismatch;
pub mod notifier;
pub mod reconcile;
pub mod store;
pub mod unit_conversion;
