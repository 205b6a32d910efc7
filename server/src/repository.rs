//! Row storage behind a fixed interface.
//!
//! Handlers only see the `Repository` trait. `InMemoryRepository` keeps rows in
//! id order (ids are assigned increasingly, so id order is insertion order)
//! and checks unique fields under the same write lock that applies the change.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::validation::Fields;

pub type RecordId = u64;

/// A stored row: its id plus its fields, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

/// One page of rows plus the unfiltered row count.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice {
    pub results: Vec<Record>,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{field} {value} is already taken")]
    Conflict { field: String, value: String },
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn create(&self, fields: Fields) -> Result<Record, RepositoryError>;

    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, RepositoryError>;

    /// `total` counts every row regardless of `limit` and `offset`.
    async fn get_some(&self, limit: u64, offset: u64) -> Result<PageSlice, RepositoryError>;

    /// Merge `fields` into the row. `Ok(None)` when the row does not exist.
    async fn update_by_id(
        &self,
        id: RecordId,
        fields: Fields,
    ) -> Result<Option<Record>, RepositoryError>;

    /// `Ok(false)` when the row does not exist.
    async fn delete_by_id(&self, id: RecordId) -> Result<bool, RepositoryError>;
}

#[derive(Default)]
struct Rows {
    last_id: RecordId,
    by_id: BTreeMap<RecordId, Record>,
}

impl Rows {
    /// Reject `fields` if a unique field value is already held by another row.
    fn check_unique(
        &self,
        unique_fields: &[&'static str],
        fields: &Fields,
        exclude: Option<RecordId>,
    ) -> Result<(), RepositoryError> {
        for field in unique_fields {
            let Some(value) = fields.get(*field).filter(|value| !value.is_null()) else {
                continue;
            };
            let taken = self
                .by_id
                .values()
                .filter(|row| Some(row.id) != exclude)
                .any(|row| row.fields.get(*field) == Some(value));
            if taken {
                return Err(RepositoryError::Conflict {
                    field: (*field).to_string(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("\"{text}\""),
        other => other.to_string(),
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    unique_fields: Vec<&'static str>,
    rows: RwLock<Rows>,
}

impl InMemoryRepository {
    pub fn new(unique_fields: Vec<&'static str>) -> Self {
        Self {
            unique_fields,
            rows: RwLock::new(Rows::default()),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, fields: Fields) -> Result<Record, RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.check_unique(&self.unique_fields, &fields, None)?;

        rows.last_id += 1;
        let record = Record {
            id: rows.last_id,
            fields,
        };
        rows.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, RepositoryError> {
        Ok(self.rows.read().await.by_id.get(&id).cloned())
    }

    async fn get_some(&self, limit: u64, offset: u64) -> Result<PageSlice, RepositoryError> {
        let rows = self.rows.read().await;
        let total = u64::try_from(rows.by_id.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let results = rows.by_id.values().skip(offset).take(limit).cloned().collect();
        Ok(PageSlice { results, total })
    }

    async fn update_by_id(
        &self,
        id: RecordId,
        fields: Fields,
    ) -> Result<Option<Record>, RepositoryError> {
        let mut rows = self.rows.write().await;
        if !rows.by_id.contains_key(&id) {
            return Ok(None);
        }
        rows.check_unique(&self.unique_fields, &fields, Some(id))?;

        let Some(record) = rows.by_id.get_mut(&id) else {
            return Ok(None);
        };
        record.fields.extend(fields);
        Ok(Some(record.clone()))
    }

    async fn delete_by_id(&self, id: RecordId) -> Result<bool, RepositoryError> {
        Ok(self.rows.write().await.by_id.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn repository() -> InMemoryRepository {
        InMemoryRepository::new(vec!["name"])
    }

    #[tokio::test]
    async fn ids_are_assigned_in_increasing_order() {
        let repo = repository();
        let first = repo.create(fields(json!({"name": "one"}))).await.unwrap();
        let second = repo.create(fields(json!({"name": "two"}))).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let repo = repository();
        let first = repo.create(fields(json!({"name": "one"}))).await.unwrap();
        assert!(repo.delete_by_id(first.id).await.unwrap());
        let second = repo.create(fields(json!({"name": "two"}))).await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn duplicate_unique_value_conflicts() {
        let repo = repository();
        repo.create(fields(json!({"name": "same"}))).await.unwrap();
        let err = repo.create(fields(json!({"name": "same"}))).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { ref field, .. } if field == "name"));
        assert_eq!(err.to_string(), "name \"same\" is already taken");
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_value() {
        let repo = repository();
        let row = repo.create(fields(json!({"name": "same", "done": false}))).await.unwrap();
        let updated = repo
            .update_by_id(row.id, fields(json!({"name": "same", "done": true})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["done"], true);
    }

    #[tokio::test]
    async fn update_to_another_rows_value_conflicts() {
        let repo = repository();
        repo.create(fields(json!({"name": "a"}))).await.unwrap();
        let b = repo.create(fields(json!({"name": "b"}))).await.unwrap();
        let err = repo
            .update_by_id(b.id, fields(json!({"name": "a"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));
        let unchanged = repo.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(unchanged.fields["name"], "b");
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let repo = repository();
        let row = repo.create(fields(json!({"name": "x", "done": true}))).await.unwrap();
        let updated = repo
            .update_by_id(row.id, fields(json!({"done": false})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["name"], "x");
        assert_eq!(updated.fields["done"], false);
    }

    #[tokio::test]
    async fn missing_rows_report_absence() {
        let repo = repository();
        assert!(repo.find_by_id(9).await.unwrap().is_none());
        assert!(repo.update_by_id(9, Fields::new()).await.unwrap().is_none());
        assert!(!repo.delete_by_id(9).await.unwrap());
    }

    #[tokio::test]
    async fn get_some_slices_and_counts_everything() {
        let repo = repository();
        for name in ["one", "two", "three", "four", "five"] {
            repo.create(fields(json!({ "name": name }))).await.unwrap();
        }

        let page = repo.get_some(2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        let names: Vec<_> = page.results.iter().map(|r| r.fields["name"].clone()).collect();
        assert_eq!(names, vec![json!("three"), json!("four")]);

        let past_end = repo.get_some(30, 30).await.unwrap();
        assert_eq!(past_end.total, 5);
        assert!(past_end.results.is_empty());
    }

    #[test]
    fn record_serializes_flat() {
        let record = Record {
            id: 3,
            fields: fields(json!({"name": "flat", "done": false})),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"id": 3, "name": "flat", "done": false}));
    }
}
