//! # Document Store Module
//!
//! Abstract access to the hosted document database plus an in-memory
//! implementation. Documents are JSON objects grouped in collections and
//! addressed by a store-assigned id.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::list_errors::{ListError, ListResult};
use crate::list_model::{ListItem, ListType, UserRef};

/// Query filter over top-level document fields
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value
    Eq(String, Value),
    /// Array field holds the value, or string field contains it (case-insensitive)
    Contains(String, Value),
    /// Any of the nested filters matches
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::Contains(field.to_string(), value.into())
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Contains(field, value) => match (doc.get(field), value) {
                (Some(Value::Array(items)), _) => items.contains(value),
                (Some(Value::String(text)), Value::String(needle)) => {
                    text.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Whether a document passes every filter
pub fn matches_all(filters: &[Filter], doc: &Value) -> bool {
    filters.iter().all(|f| f.matches(doc))
}

/// Persistence collaborator: create/read/update/delete documents by id
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document and return its id
    async fn create_document(&self, collection: &str, data: Value) -> ListResult<String>;

    /// Fetch one document by id
    async fn get_document(&self, collection: &str, id: &str) -> ListResult<Option<Value>>;

    /// Replace the fields of an existing document
    async fn update_document(&self, collection: &str, id: &str, data: Value) -> ListResult<()>;

    async fn delete_document(&self, collection: &str, id: &str) -> ListResult<()>;

    /// All documents matching every filter, each with its `id` field set
    async fn fetch_all_documents(&self, collection: &str, filters: &[Filter]) -> ListResult<Vec<Value>>;
}

/// Authentication collaborator
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> ListResult<UserRef>;
}

/// Identity provider returning a fixed user
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub UserRef);

impl StaticIdentity {
    pub fn new(id: &str) -> Self {
        Self(UserRef { id: id.to_string() })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> ListResult<UserRef> {
        Ok(self.0.clone())
    }
}

/// Strip the id from a serialized document body
pub(crate) fn document_body(mut data: Value) -> Value {
    if let Value::Object(map) = &mut data {
        map.remove("id");
    }
    data
}

pub(crate) fn with_id(mut data: Value, id: &str) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    data
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
}

/// Document store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.collections.get(collection).map_or(0, BTreeMap::len)
    }
}

fn as_object(data: Value) -> ListResult<Map<String, Value>> {
    match document_body(data) {
        Value::Object(map) => Ok(map),
        other => Err(ListError::Persistence(format!("document must be an object, got {other}"))),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, collection: &str, data: Value) -> ListResult<String> {
        let body = as_object(data)?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("doc-{:06}", state.next_id);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), body);
        debug!("Created document {} in {}", id, collection);
        Ok(id)
    }

    async fn get_document(&self, collection: &str, id: &str) -> ListResult<Option<Value>> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|body| with_id(Value::Object(body.clone()), id)))
    }

    async fn update_document(&self, collection: &str, id: &str, data: Value) -> ListResult<()> {
        let body = as_object(data)?;
        let mut state = self.state.lock().await;
        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| ListError::NotFound(format!("{collection}/{id}")))?;
        doc.extend(body);
        debug!("Updated document {} in {}", id, collection);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> ListResult<()> {
        let mut state = self.state.lock().await;
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        match removed {
            Some(_) => {
                debug!("Deleted document {} from {}", id, collection);
                Ok(())
            }
            None => Err(ListError::NotFound(format!("{collection}/{id}"))),
        }
    }

    async fn fetch_all_documents(&self, collection: &str, filters: &[Filter]) -> ListResult<Vec<Value>> {
        let state = self.state.lock().await;
        let docs: Vec<Value> = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| with_id(Value::Object(body.clone()), id))
                    .filter(|doc| matches_all(filters, doc))
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }
}

/// Typed access to list item documents on top of a [`DocumentStore`]
pub struct ListItemRepository<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> ListItemRepository<'a, S> {
    pub fn new(store: &'a S, collection: &'a str) -> Self {
        Self { store, collection }
    }

    /// Persist a new item and return it with its assigned id
    pub async fn create(&self, item: &ListItem) -> ListResult<ListItem> {
        let id = self
            .store
            .create_document(self.collection, encode_item(item)?)
            .await?;
        info!("Created {} item '{}' with id {}", item.list_type.as_str(), item.name, id);
        Ok(ListItem { id, ..item.clone() })
    }

    pub async fn get(&self, id: &str) -> ListResult<Option<ListItem>> {
        match self.store.get_document(self.collection, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn update(&self, item: &ListItem) -> ListResult<()> {
        self.store
            .update_document(self.collection, &item.id, encode_item(item)?)
            .await?;
        info!("Updated item '{}' ({})", item.name, item.id);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ListResult<()> {
        self.store.delete_document(self.collection, id).await?;
        info!("Deleted item {}", id);
        Ok(())
    }

    /// Items of one list owned by one user, optionally narrowed further
    pub async fn list(&self, owner_id: &str, list_type: ListType, extra: &[Filter]) -> ListResult<Vec<ListItem>> {
        let mut filters = vec![
            Filter::eq("ownerId", owner_id),
            Filter::eq("type", list_type.as_str()),
        ];
        filters.extend_from_slice(extra);

        let docs = self.store.fetch_all_documents(self.collection, &filters).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                serde_json::from_value(doc)
                    .map_err(|e| warn!("Skipping undecodable document {} in {}: {}", id, self.collection, e))
                    .ok()
            })
            .collect())
    }
}

/// Serialize an item, refusing amounts that cannot be stored as JSON numbers
fn encode_item(item: &ListItem) -> ListResult<Value> {
    if let Some(bad) = item.quantity.iter().find(|q| !q.is_finite()) {
        return Err(ListError::Validation(format!("'{}' has an invalid amount: {bad}", item.name)));
    }
    Ok(serde_json::to_value(item)?)
}
