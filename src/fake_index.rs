//! In-memory [`SearchIndex`] used by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::index_client::{IndexApiError, SearchIndex};
use crate::models::Fragment;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AddWithId(String, String),
    Copy(String, String),
    SetSettings(String),
    AddObjects(String, usize),
    Search(String, String),
    Delete(String, Vec<String>),
    List,
    DeleteIndex(String),
}

#[derive(Default)]
struct State {
    /// index name → object id → record
    indexes: BTreeMap<String, BTreeMap<String, Value>>,
    settings: BTreeMap<String, Value>,
    calls: Vec<Call>,
    next_id: usize,
    search_failures: u32,
    fail_copy: bool,
    /// Number of `add_objects` calls that succeed before the rest fail.
    fail_upload_after: Option<usize>,
    uploads: usize,
    fail_delete: bool,
    fail_delete_index: Vec<String>,
}

#[derive(Default)]
pub struct FakeIndex {
    state: Mutex<State>,
}

fn status(code: u16, body: &str) -> IndexApiError {
    IndexApiError::Status {
        status: code,
        body: body.to_string(),
    }
}

/// Extract the docID values from a `(docID:"a" OR docID:"b")` filter.
fn filter_doc_ids(filters: &str) -> Vec<String> {
    filters
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(" OR ")
        .filter_map(|clause| clause.strip_prefix("docID:"))
        .map(|value| {
            value
                .trim_matches('"')
                .replace("\\\"", "\"")
                .replace("\\\\", "\\")
        })
        .collect()
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `index` with records, keyed by object id.
    pub fn with_index(self, index: &str, records: Vec<(&str, Value)>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let entry = state.indexes.entry(index.to_string()).or_default();
            for (id, record) in records {
                entry.insert(id.to_string(), record);
            }
        }
        self
    }

    pub fn fail_search_times(self, n: u32) -> Self {
        self.state.lock().unwrap().search_failures = n;
        self
    }

    pub fn fail_copy(self) -> Self {
        self.state.lock().unwrap().fail_copy = true;
        self
    }

    pub fn fail_upload(self) -> Self {
        self.fail_upload_after(0)
    }

    pub fn fail_upload_after(self, batches: usize) -> Self {
        self.state.lock().unwrap().fail_upload_after = Some(batches);
        self
    }

    pub fn fail_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    pub fn fail_delete_index(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_delete_index
            .push(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().unwrap().indexes.keys().cloned().collect()
    }

    /// Records in `index` as `(object_id, record)` pairs.
    pub fn records(&self, index: &str) -> Vec<(String, Value)> {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(index)
            .map(|records| records.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn settings(&self, index: &str) -> Option<Value> {
        self.state.lock().unwrap().settings.get(index).cloned()
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn add_object_with_id(
        &self,
        index: &str,
        object_id: &str,
        object: Value,
    ) -> Result<(), IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::AddWithId(index.to_string(), object_id.to_string()));
        state
            .indexes
            .entry(index.to_string())
            .or_default()
            .insert(object_id.to_string(), object);
        Ok(())
    }

    async fn copy_index(&self, from: &str, to: &str) -> Result<(), IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Copy(from.to_string(), to.to_string()));
        if state.fail_copy {
            return Err(status(500, "copy failed"));
        }
        let source = state
            .indexes
            .get(from)
            .cloned()
            .ok_or_else(|| status(404, "Index does not exist"))?;
        state.indexes.insert(to.to_string(), source);
        if let Some(settings) = state.settings.get(from).cloned() {
            state.settings.insert(to.to_string(), settings);
        }
        Ok(())
    }

    async fn set_settings(&self, index: &str, settings: &Value) -> Result<(), IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SetSettings(index.to_string()));
        state.settings.insert(index.to_string(), settings.clone());
        Ok(())
    }

    async fn add_objects(
        &self,
        index: &str,
        records: &[Fragment],
    ) -> Result<Vec<String>, IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::AddObjects(index.to_string(), records.len()));
        if state.fail_upload_after.is_some_and(|n| state.uploads >= n) {
            return Err(status(400, "Record is too big"));
        }
        state.uploads += 1;
        let mut ids = Vec::new();
        for record in records {
            state.next_id += 1;
            let id = format!("obj-{}", state.next_id);
            let value = serde_json::to_value(record).unwrap();
            state
                .indexes
                .entry(index.to_string())
                .or_default()
                .insert(id.clone(), value);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn search_object_ids(
        &self,
        index: &str,
        filters: &str,
    ) -> Result<Vec<String>, IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Search(index.to_string(), filters.to_string()));
        if state.search_failures > 0 {
            state.search_failures -= 1;
            return Err(status(404, "Index does not exist"));
        }
        let wanted = filter_doc_ids(filters);
        let records = state
            .indexes
            .get(index)
            .ok_or_else(|| status(404, "Index does not exist"))?;
        Ok(records
            .iter()
            .filter(|(_, record)| {
                record
                    .get("docID")
                    .and_then(Value::as_str)
                    .is_some_and(|id| wanted.iter().any(|w| w == id))
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_objects(
        &self,
        index: &str,
        object_ids: &[String],
    ) -> Result<(), IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Delete(index.to_string(), object_ids.to_vec()));
        if state.fail_delete {
            return Err(status(403, "Method not allowed with this API key"));
        }
        if let Some(records) = state.indexes.get_mut(index) {
            for id in object_ids {
                records.remove(id);
            }
        }
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        Ok(state.indexes.keys().cloned().collect())
    }

    async fn delete_index(&self, index: &str) -> Result<(), IndexApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteIndex(index.to_string()));
        if state.fail_delete_index.iter().any(|n| n == index) {
            return Err(status(403, "Method not allowed with this API key"));
        }
        state.indexes.remove(index);
        state.settings.remove(index);
        Ok(())
    }
}

#[test]
fn test_filter_doc_ids_parses_quoted_values() {
    let ids = filter_doc_ids(r#"(docID:"a.md" OR docID:"say \"hi\".md")"#);
    assert_eq!(ids, vec!["a.md", "say \"hi\".md"]);
}
