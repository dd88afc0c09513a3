//! # Reconciliation Module
//!
//! Turns validated drafts into inventory documents. A draft is expanded into
//! sub-entries (one amount, unit and expiry per physical unit), the
//! sub-entries are grouped by mergeable unit, and each group is either
//! appended to an existing inventory item of the same name or stored as a
//! new item.
//!
//! Units that cannot be converted into each other are never summed: such a
//! group becomes its own line item and the user is told about it.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::amount::{validate_amount, InventoryCheckHandler};
use crate::draft::{parse_quantity_text, Draft, NewItemSession, StepDraft, StepOutcome, StepSession};
use crate::expiry::{normalize_expiry, ExpiryPredictor};
use crate::list_config::ListConfig;
use crate::list_errors::{ListError, ListResult};
use crate::list_model::{normalize_name, ListItem, ListType};
use crate::localization::t_args_lang;
use crate::mismatch::{filled_count, is_blank, validate_draft, DraftValidation};
use crate::notifier::{LogNotifier, Notice, Notifier};
use crate::store::{DocumentStore, IdentityProvider, ListItemRepository};
use crate::unit_conversion::{can_merge, convert, round_amount, UnitCategory};

/// One physical unit being added to the inventory
#[derive(Debug, Clone, PartialEq)]
pub struct SubEntry {
    pub amount: f64,
    /// Blank for pure count tracking
    pub unit: String,
    /// Blank when no expiry applies
    pub expiry: String,
}

/// Expand a draft into one sub-entry per unit.
///
/// An empty quantity group yields `target_count` entries of amount 1 with no
/// unit. A single expiry date is copied onto every entry; several dates are
/// assigned by position.
pub fn build_sub_entries(draft: &Draft, target_count: usize) -> Vec<SubEntry> {
    let target_count = target_count.max(1);

    let mut entries: Vec<SubEntry> = if filled_count(&draft.quantity_text) == 0 {
        (0..target_count)
            .map(|_| SubEntry { amount: 1.0, unit: String::new(), expiry: String::new() })
            .collect()
    } else {
        draft
            .quantity_text
            .iter()
            .enumerate()
            .filter(|(_, text)| !is_blank(text))
            .map(|(i, text)| {
                let stored = draft.quantity.get(i).copied().unwrap_or(0.0);
                let amount = if stored.is_finite() && stored > 0.0 {
                    stored
                } else {
                    parse_quantity_text(text).unwrap_or(0.0)
                };
                SubEntry {
                    amount,
                    unit: draft.unit.get(i).map(|u| u.trim().to_string()).unwrap_or_default(),
                    expiry: String::new(),
                }
            })
            .collect()
    };

    let dates: Vec<String> = draft
        .expiries
        .iter()
        .map(|e| if is_blank(e) { String::new() } else { normalize_expiry(e).unwrap_or_else(|| e.trim().to_string()) })
        .collect();

    match filled_count(&dates) {
        0 => {}
        1 => {
            let date = dates.iter().find(|d| !d.is_empty()).cloned().unwrap_or_default();
            for entry in &mut entries {
                entry.expiry = date.clone();
            }
        }
        _ => {
            for (entry, date) in entries.iter_mut().zip(dates) {
                entry.expiry = date;
            }
        }
    }

    entries
}

/// Sub-entries sharing one mergeable unit, amounts expressed in `unit`
#[derive(Debug, Clone, PartialEq)]
pub struct EntryGroup {
    pub unit: String,
    pub entries: Vec<SubEntry>,
}

/// Split sub-entries into groups whose units can be summed
pub fn group_by_unit(entries: Vec<SubEntry>) -> Vec<EntryGroup> {
    let mut groups: Vec<EntryGroup> = Vec::new();

    for mut entry in entries {
        match groups.iter_mut().find(|g| can_merge(&g.unit, &entry.unit)) {
            Some(group) => {
                if let Ok(amount) = convert(entry.amount, &entry.unit, &group.unit) {
                    entry.amount = amount;
                    entry.unit = group.unit.clone();
                    group.entries.push(entry);
                } else {
                    groups.push(EntryGroup { unit: entry.unit.clone(), entries: vec![entry] });
                }
            }
            None => groups.push(EntryGroup { unit: entry.unit.clone(), entries: vec![entry] }),
        }
    }

    groups
}

/// Inventory item with the same name whose unit can absorb `unit`
pub fn find_merge_target<'a>(items: &'a [ListItem], name: &str, unit: &str) -> Option<&'a ListItem> {
    let name = normalize_name(name);
    items
        .iter()
        .filter(|item| item.list_type == ListType::Inventory)
        .find(|item| item.normalized_name() == name && can_merge(&item.unit, unit))
}

/// Append a group to an existing item, converting into the item's unit.
///
/// Expiries are concatenated; an item that did not track expiries gets blank
/// slots for its existing entries so the arrays stay parallel.
pub fn merge_group(existing: &ListItem, group: &EntryGroup) -> ListResult<ListItem> {
    let mut merged = existing.clone();

    let converted = group
        .entries
        .iter()
        .map(|e| convert(e.amount, &group.unit, &existing.unit))
        .collect::<Result<Vec<f64>, _>>()?;

    let tracks = existing.tracks_expiries() || group.entries.iter().any(|e| !e.expiry.is_empty());
    if tracks {
        merged.expiries.resize(existing.quantity.len(), String::new());
        merged.expiries.extend(group.entries.iter().map(|e| e.expiry.clone()));
    }
    merged.quantity.extend(converted);

    debug!(
        "Merged {} entries into '{}': {} -> {}",
        group.entries.len(),
        existing.name,
        existing.quantity_display(),
        merged.quantity_display()
    );
    Ok(merged)
}

/// Build a new inventory item from one group
pub fn item_from_group(owner_id: &str, name: &str, group: &EntryGroup) -> ListItem {
    let expiries = if group.entries.iter().any(|e| !e.expiry.is_empty()) {
        group.entries.iter().map(|e| e.expiry.clone()).collect()
    } else {
        Vec::new()
    };

    ListItem::new(owner_id, ListType::Inventory, name)
        .with_unit(&group.unit)
        .with_quantity(group.entries.iter().map(|e| e.amount).collect())
        .with_expiries(expiries)
}

/// Deduplicate shopping items by name and mergeable unit, summing amounts
pub fn aggregate_shopping_items(items: &[ListItem]) -> Vec<ListItem> {
    let mut aggregated: Vec<ListItem> = Vec::new();

    for item in items {
        let target = aggregated
            .iter_mut()
            .find(|a| a.normalized_name() == item.normalized_name() && can_merge(&a.unit, &item.unit));

        match target.map(|a| (convert(item.total_amount(), &item.unit, &a.unit), a)) {
            Some((Ok(amount), a)) => {
                let checked = a.checked_count + item.checked_count;
                a.quantity = vec![round_amount(a.total_amount() + amount)];
                a.expiries.clear();
                a.set_checked_count(checked);
            }
            _ => aggregated.push(item.clone()),
        }
    }

    aggregated
}

/// Unit as shown to the user; blank units are counted pieces
fn unit_label(unit: &str) -> &str {
    if unit.trim().is_empty() {
        UnitCategory::Count.base_unit()
    } else {
        unit
    }
}

/// What happened to one group of sub-entries
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Created(ListItem),
    Merged(ListItem),
    /// A same-named item exists but its unit cannot absorb these entries
    StoredSeparately { item: ListItem, existing_unit: String },
}

impl MergeOutcome {
    pub fn item(&self) -> &ListItem {
        match self {
            MergeOutcome::Created(item) | MergeOutcome::Merged(item) => item,
            MergeOutcome::StoredSeparately { item, .. } => item,
        }
    }
}

/// Result of submitting one step of the move flow
#[derive(Debug, Clone, PartialEq)]
pub struct StepSubmission {
    pub outcomes: Vec<MergeOutcome>,
    pub next: StepOutcome,
}

/// Shopping/inventory operations against the document store
pub struct ListService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    predictor: Option<Arc<dyn ExpiryPredictor>>,
    notifier: Arc<dyn Notifier>,
    config: ListConfig,
}

impl ListService {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>, config: ListConfig) -> Self {
        Self {
            store,
            identity,
            predictor: None,
            notifier: Arc::new(LogNotifier),
            config,
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn ExpiryPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    fn repo(&self) -> ListItemRepository<'_, dyn DocumentStore> {
        ListItemRepository::new(self.store.as_ref(), &self.config.collection)
    }

    fn message(&self, key: &str, args: &[(&str, &str)]) -> String {
        t_args_lang(key, args, Some(&self.config.locale))
    }

    fn report_failure(&self, key: &str, name: &str, err: &ListError) {
        error!("Failed to save '{}': {}", name, err);
        self.notifier.notify(Notice::error(self.message(key, &[("name", name)])));
    }

    async fn owner_id(&self) -> ListResult<String> {
        Ok(self.identity.current_user().await?.id)
    }

    pub async fn shopping_items(&self) -> ListResult<Vec<ListItem>> {
        let owner = self.owner_id().await?;
        self.repo().list(&owner, ListType::Shopping, &[]).await
    }

    pub async fn inventory_items(&self) -> ListResult<Vec<ListItem>> {
        let owner = self.owner_id().await?;
        self.repo().list(&owner, ListType::Inventory, &[]).await
    }

    /// Add to the shopping list, folding into an existing line with the same
    /// name and a compatible unit
    pub async fn add_shopping_item(&self, name: &str, amount: f64, unit: &str) -> ListResult<ListItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ListError::Validation(self.message("item-name-required", &[])));
        }
        let amount = validate_amount(amount)?;
        let owner = self.owner_id().await?;
        let existing = self.repo().list(&owner, ListType::Shopping, &[]).await?;

        let duplicate = existing
            .iter()
            .find(|i| i.normalized_name() == normalize_name(name) && can_merge(&i.unit, unit));

        if let Some(duplicate) = duplicate {
            if let Ok(converted) = convert(amount, unit, &duplicate.unit) {
                let mut updated = duplicate.clone();
                updated.quantity = vec![round_amount(duplicate.total_amount() + converted)];
                self.repo().update(&updated).await?;
                info!("Folded {} {} into shopping item '{}'", amount, unit, updated.name);
                return Ok(updated);
            }
        }

        let item = ListItem::new(&owner, ListType::Shopping, name)
            .with_unit(unit)
            .with_quantity(vec![amount]);
        self.repo().create(&item).await
    }

    /// Set how many units of a shopping item are checked
    pub async fn set_checked_count(&self, item_id: &str, count: u32) -> ListResult<ListItem> {
        let mut item = self
            .repo()
            .get(item_id)
            .await?
            .ok_or_else(|| ListError::NotFound(item_id.to_string()))?;
        item.set_checked_count(count);
        self.repo().update(&item).await?;
        Ok(item)
    }

    /// Open the move flow with one draft per checked shopping item
    pub async fn start_inventory_move(&self) -> ListResult<StepSession> {
        let checked: Vec<ListItem> = self
            .shopping_items()
            .await?
            .into_iter()
            .filter(|i| i.checked || i.checked_count > 0)
            .collect();

        let mut steps = Vec::with_capacity(checked.len());
        for item in checked {
            let suggested = self.suggest_expiry(&item.name).await;
            steps.push(StepDraft { item, draft: Draft::seeded(suggested) });
        }

        Ok(StepSession::open(steps))
    }

    async fn suggest_expiry(&self, name: &str) -> Option<String> {
        if !self.config.suggest_expiries {
            return None;
        }
        let predictor = self.predictor.as_ref()?;
        match predictor.predict_expiry(name).await {
            Ok(prediction) => prediction.into_date(),
            Err(e) => {
                warn!("No expiry suggestion for '{}': {}", name, e);
                None
            }
        }
    }

    fn check_validation(&self, validation: DraftValidation, target: usize) -> ListResult<()> {
        if validation.can_submit() {
            return Ok(());
        }
        let count = target.to_string();
        let messages: Vec<String> = validation
            .message_keys()
            .into_iter()
            .map(|key| self.message(key, &[("count", &count)]))
            .collect();
        Err(ListError::Validation(messages.join(" ")))
    }

    /// Submit the current step and move the flow forward.
    ///
    /// On failure the draft is left as it was so the user can retry.
    pub async fn submit_step(&self, session: &mut StepSession) -> ListResult<StepSubmission> {
        let step = session
            .current()
            .cloned()
            .ok_or_else(|| ListError::NotFound("no active step".to_string()))?;
        let target = step.target_count();
        self.check_validation(validate_draft(&step.draft, target), target)?;

        let entries = build_sub_entries(&step.draft, target);
        let outcomes = match self.commit_entries(&step.item.owner_id, &step.item.name, entries).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.report_failure("submit-failed", &step.item.name, &e);
                return Err(e);
            }
        };

        if self.config.remove_moved_shopping_items {
            if let Err(e) = self.clear_moved_units(&step.item, target).await {
                warn!("Moved '{}' but could not update the shopping list: {}", step.item.name, e);
                self.notifier
                    .notify(Notice::warning(self.message("check-failed", &[("name", &step.item.name)])));
            }
        }

        let next = session.advance();
        info!("Moved '{}' ({} units) to inventory", step.item.name, target);
        Ok(StepSubmission { outcomes, next })
    }

    /// Take the `moved` units off the shopping item, deleting it once
    /// nothing is left
    async fn clear_moved_units(&self, item: &ListItem, moved: usize) -> ListResult<()> {
        let mut remaining = item.clone();
        remaining.checked_count = u32::try_from(moved)
            .unwrap_or(u32::MAX)
            .min(item.total_units_represented());

        if remaining.is_fully_checked() {
            self.repo().delete(&item.id).await
        } else {
            remaining.remove_checked_units();
            self.repo().update(&remaining).await
        }
    }

    /// Submit the new-item modal and reset it for the next entry
    pub async fn submit_new_item(&self, session: &mut NewItemSession) -> ListResult<Vec<MergeOutcome>> {
        let name = session.draft.item_name.trim().to_string();
        if name.is_empty() {
            return Err(ListError::Validation(self.message("item-name-required", &[])));
        }
        let target = session.target_count();
        self.check_validation(session.validation(), target)?;

        let owner = self.owner_id().await?;
        let entries = build_sub_entries(&session.draft.draft, target);
        match self.commit_entries(&owner, &name, entries).await {
            Ok(outcomes) => {
                session.reset();
                Ok(outcomes)
            }
            Err(e) => {
                self.report_failure("submit-failed", &name, &e);
                Err(e)
            }
        }
    }

    /// Merge or create one inventory item per unit group.
    ///
    /// Either every group is written or none is: when a write fails, the
    /// items created so far are deleted and merged items get their previous
    /// contents back before the error is returned.
    pub async fn commit_entries(&self, owner_id: &str, name: &str, entries: Vec<SubEntry>) -> ListResult<Vec<MergeOutcome>> {
        let mut inventory = self.repo().list(owner_id, ListType::Inventory, &[]).await?;
        let mut journal = CommitJournal::default();

        match self.write_groups(&mut inventory, &mut journal, owner_id, name, entries).await {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    if let MergeOutcome::StoredSeparately { item, existing_unit } = outcome {
                        self.notify_stored_separately(item, existing_unit);
                    }
                }
                Ok(outcomes)
            }
            Err(e) => {
                self.roll_back(journal).await;
                Err(e)
            }
        }
    }

    async fn write_groups(
        &self,
        inventory: &mut Vec<ListItem>,
        journal: &mut CommitJournal,
        owner_id: &str,
        name: &str,
        entries: Vec<SubEntry>,
    ) -> ListResult<Vec<MergeOutcome>> {
        let mut outcomes = Vec::new();

        for group in group_by_unit(entries) {
            let merged = find_merge_target(inventory, name, &group.unit)
                .map(|existing| merge_group(existing, &group).map(|merged| (existing.clone(), merged)));

            let outcome = match merged {
                Some(Ok((previous, merged))) => {
                    self.repo().update(&merged).await?;
                    journal.merged.push(previous);
                    if let Some(slot) = inventory.iter_mut().find(|i| i.id == merged.id) {
                        *slot = merged.clone();
                    }
                    MergeOutcome::Merged(merged)
                }
                other => {
                    if let Some(Err(e)) = other {
                        warn!("Merge into '{}' rejected: {}", name, e);
                    }
                    let created = self.repo().create(&item_from_group(owner_id, name, &group)).await?;
                    journal.created.push(created.id.clone());
                    inventory.push(created.clone());
                    same_name_conflict(inventory, created)
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Undo the writes of a failed commit, newest first
    async fn roll_back(&self, journal: CommitJournal) {
        for id in journal.created.iter().rev() {
            if let Err(e) = self.repo().delete(id).await {
                error!("Could not remove partially committed item {}: {}", id, e);
            }
        }
        for previous in journal.merged.iter().rev() {
            if let Err(e) = self.repo().update(previous).await {
                error!("Could not restore '{}' ({}): {}", previous.name, previous.id, e);
            }
        }
        debug!(
            "Rolled back {} created and {} merged items",
            journal.created.len(),
            journal.merged.len()
        );
    }

    fn notify_stored_separately(&self, item: &ListItem, existing_unit: &str) {
        self.notifier.notify(Notice::info(self.message(
            "stored-separately",
            &[
                ("name", &item.name),
                ("unit", unit_label(&item.unit)),
                ("existing", unit_label(existing_unit)),
            ],
        )));
    }
}

/// Writes made by one commit, kept so a failure can be undone
#[derive(Debug, Default)]
struct CommitJournal {
    created: Vec<String>,
    /// Contents of merged items before the merge
    merged: Vec<ListItem>,
}

fn same_name_conflict(inventory: &[ListItem], created: ListItem) -> MergeOutcome {
    let existing_unit = inventory
        .iter()
        .find(|i| i.id != created.id && i.normalized_name() == created.normalized_name())
        .map(|existing| existing.unit.clone());

    match existing_unit {
        Some(existing_unit) => MergeOutcome::StoredSeparately { item: created, existing_unit },
        None => MergeOutcome::Created(created),
    }
}

#[async_trait::async_trait]
impl InventoryCheckHandler for ListService {
    /// Move `ceil(amount)` units between available and used
    async fn handle_inventory_check(&self, item_id: &str, amount: f64, is_revert: bool) -> ListResult<ListItem> {
        let mut item = self
            .repo()
            .get(item_id)
            .await?
            .ok_or_else(|| ListError::NotFound(item_id.to_string()))?;

        let delta = amount.ceil().max(0.0) as u32;
        let count = if is_revert {
            item.checked_count.saturating_sub(delta)
        } else {
            item.checked_count.saturating_add(delta)
        };
        item.set_checked_count(count);

        if let Err(e) = self.repo().update(&item).await {
            self.report_failure("check-failed", &item.name, &e);
            return Err(e);
        }

        info!(
            "{} {} of '{}', {} of {} units used",
            if is_revert { "Reverted" } else { "Used" },
            amount,
            item.name,
            item.checked_count,
            item.total_units_represented()
        );
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_empty_group_yields_counted_entries() {
        let entries = build_sub_entries(&Draft::new_item_rows(), 3);
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.amount == 1.0 && e.unit.is_empty() && e.expiry.is_empty()));
    }

    #[test]
    fn test_single_expiry_applies_to_all() {
        let draft = Draft {
            quantity: vec![1.0, 1.0],
            quantity_text: strings(&["1", "1"]),
            unit: strings(&["kg", "kg"]),
            expiries: strings(&["2025-08-01T00:00:00.000Z"]),
        };
        let entries = build_sub_entries(&draft, 2);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.expiry == "2025-08-01T00:00:00.000Z"));
    }

    #[test]
    fn test_per_unit_expiries() {
        let draft = Draft {
            expiries: strings(&["2025-08-01", "2025-09-01"]),
            ..Draft::empty()
        };
        let entries = build_sub_entries(&draft, 2);
        assert_eq!(entries[0].expiry, "2025-08-01T00:00:00.000Z");
        assert_eq!(entries[1].expiry, "2025-09-01T00:00:00.000Z");
    }

    #[test]
    fn test_amount_falls_back_to_text() {
        let draft = Draft {
            quantity: vec![0.0],
            quantity_text: strings(&["1/2"]),
            unit: strings(&["kg"]),
            expiries: vec![],
        };
        assert_eq!(build_sub_entries(&draft, 1)[0].amount, 0.5);
    }

    #[test]
    fn test_group_by_unit_separates_categories() {
        let entries = vec![
            SubEntry { amount: 1.0, unit: "kg".into(), expiry: String::new() },
            SubEntry { amount: 2.0, unit: "pcs".into(), expiry: String::new() },
            SubEntry { amount: 500.0, unit: "g".into(), expiry: String::new() },
        ];
        let groups = group_by_unit(entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].unit, "kg");
        assert_eq!(groups[0].entries.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![1.0, 0.5]);
        assert_eq!(groups[1].unit, "pcs");
    }

    #[test]
    fn test_merge_pads_untracked_expiries() {
        let existing = ListItem::new("u", ListType::Inventory, "Rice")
            .with_id("r1")
            .with_unit("g")
            .with_quantity(vec![500.0]);
        let group = EntryGroup {
            unit: "kg".into(),
            entries: vec![SubEntry { amount: 2.0, unit: "kg".into(), expiry: "2026-01-01T00:00:00.000Z".into() }],
        };
        let merged = merge_group(&existing, &group).unwrap();
        assert_eq!(merged.quantity, vec![500.0, 2000.0]);
        assert_eq!(merged.expiries, strings(&["", "2026-01-01T00:00:00.000Z"]));
        assert_eq!(merged.total_amount(), 2500.0);
    }

    #[test]
    fn test_find_merge_target_requires_compatible_unit() {
        let items = vec![
            ListItem::new("u", ListType::Inventory, "Rice").with_unit("pcs"),
            ListItem::new("u", ListType::Inventory, "rice").with_unit("g"),
        ];
        let target = find_merge_target(&items, "RICE", "kg").unwrap();
        assert_eq!(target.unit, "g");
        assert!(find_merge_target(&items, "Rice", "ml").is_none());
    }

    #[test]
    fn test_aggregate_shopping_items() {
        let items = vec![
            ListItem::new("u", ListType::Shopping, "Milk").with_unit("l").with_quantity(vec![1.0]),
            ListItem::new("u", ListType::Shopping, "milk").with_unit("ml").with_quantity(vec![500.0]),
            ListItem::new("u", ListType::Shopping, "Milk").with_unit("pcs").with_quantity(vec![2.0]),
            ListItem::new("u", ListType::Shopping, "Eggs").with_quantity(vec![6.0]),
        ];
        let aggregated = aggregate_shopping_items(&items);
        assert_eq!(aggregated.len(), 3);
        assert_eq!(aggregated[0].quantity, vec![1.5]);
        assert_eq!(aggregated[0].unit, "l");
        assert_eq!(aggregated[1].unit, "pcs");
    }
}
