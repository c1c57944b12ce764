//! Model-level operations over a `Store`: paranoid reads, soft delete and restore.

use crate::config::{ResolvedEntity, SoftDelete};
use crate::error::StoreError;
use crate::query::Predicate;
use crate::store::{Row, Selection, Store};
use serde_json::Value;

#[derive(Clone, Copy)]
pub struct Repository<'a> {
    store: &'a dyn Store,
}

impl<'a> Repository<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Repository { store }
    }

    /// Restrict a predicate to live rows when the entity is soft-deletable.
    pub fn live(entity: &ResolvedEntity, predicate: Predicate) -> Predicate {
        match &entity.soft_delete {
            Some(sd) => predicate.and(Predicate::eq(sd.column.clone(), sd.sentinel.clone())),
            None => predicate,
        }
    }

    pub fn by_pk(entity: &ResolvedEntity, pk: &Value) -> Predicate {
        Predicate::eq(entity.pk.clone(), pk.clone())
    }

    pub async fn find_many(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<Vec<Row>, StoreError> {
        let mut selection = selection.clone();
        selection.predicate = Self::live(entity, selection.predicate);
        self.store.select(entity, &selection).await
    }

    /// Page of rows plus the total matching count (ignoring limit and offset).
    pub async fn find_and_count(
        &self,
        entity: &ResolvedEntity,
        selection: &Selection,
    ) -> Result<(Vec<Row>, u64), StoreError> {
        let mut selection = selection.clone();
        selection.predicate = Self::live(entity, selection.predicate);
        let rows = self.store.select(entity, &selection).await?;
        let total = self.store.count(entity, &selection).await?;
        Ok((rows, total))
    }

    pub async fn find_one(&self, entity: &ResolvedEntity, predicate: Predicate) -> Result<Option<Row>, StoreError> {
        let selection = Selection {
            predicate: Self::live(entity, predicate),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.store.select(entity, &selection).await?.into_iter().next())
    }

    /// Like `find_one` but also sees soft-deleted rows.
    pub async fn find_one_with_deleted(
        &self,
        entity: &ResolvedEntity,
        predicate: Predicate,
    ) -> Result<Option<Row>, StoreError> {
        let selection = Selection {
            predicate,
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.store.select(entity, &selection).await?.into_iter().next())
    }

    pub async fn find_by_pk(&self, entity: &ResolvedEntity, pk: &Value) -> Result<Option<Row>, StoreError> {
        self.find_one(entity, Self::by_pk(entity, pk)).await
    }

    pub async fn create(&self, entity: &ResolvedEntity, values: &Row) -> Result<Row, StoreError> {
        self.store.insert(entity, values).await
    }

    /// Update a live row by primary key. `None` when no live row has that key.
    pub async fn update(&self, entity: &ResolvedEntity, pk: &Value, values: &Row) -> Result<Option<Row>, StoreError> {
        if values.is_empty() {
            return self.find_by_pk(entity, pk).await;
        }
        let predicate = Self::live(entity, Self::by_pk(entity, pk));
        Ok(self.store.update(entity, &predicate, values).await?.into_iter().next())
    }

    /// Delete live rows matching `predicate`. Soft-deletable entities get their marker set instead.
    pub async fn destroy(&self, entity: &ResolvedEntity, predicate: Predicate) -> Result<u64, StoreError> {
        let predicate = Self::live(entity, predicate);
        match &entity.soft_delete {
            Some(sd) => {
                let mut values = Row::new();
                values.insert(sd.column.clone(), deleted_marker(sd));
                Ok(self.store.update(entity, &predicate, &values).await?.len() as u64)
            }
            None => self.store.delete(entity, &predicate).await,
        }
    }

    /// Reset the soft-delete marker of a row. No-op for entities without soft delete.
    pub async fn restore(&self, entity: &ResolvedEntity, pk: &Value) -> Result<Option<Row>, StoreError> {
        let Some(sd) = &entity.soft_delete else {
            return self.find_by_pk(entity, pk).await;
        };
        let mut values = Row::new();
        values.insert(sd.column.clone(), sd.sentinel.clone());
        Ok(self
            .store
            .update(entity, &Self::by_pk(entity, pk), &values)
            .await?
            .into_iter()
            .next())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

/// Marker value for a deleted row: flipped flag for boolean markers, a timestamp otherwise.
fn deleted_marker(sd: &SoftDelete) -> Value {
    match &sd.sentinel {
        Value::Bool(b) => Value::Bool(!b),
        Value::Number(n) if n.as_i64() == Some(0) => Value::from(1),
        _ => Value::String(chrono::Utc::now().to_rfc3339()),
    }
}
