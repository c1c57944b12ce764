//! Storage collaborator: primitive row operations every backend provides.
//!
//! Soft-delete, association accessors and conflict recovery live above this trait
//! (see `service::Repository`), so a backend only has to filter, insert, update and delete.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::ResolvedEntity;
use crate::error::StoreError;
use crate::query::{OrderBy, Predicate};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Name of the aggregate column produced by grouped selections.
pub const COUNT_FIELD: &str = "count";

#[derive(Clone, Debug, Default)]
pub struct Selection {
    pub predicate: Predicate,
    pub attributes: Option<Vec<String>>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub group: Option<Vec<String>>,
    pub having: Option<Predicate>,
}

impl Selection {
    pub fn filter(predicate: Predicate) -> Self {
        Selection {
            predicate,
            ..Default::default()
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group.as_ref().map(|g| !g.is_empty()).unwrap_or(false)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching the selection; grouped selections yield one row per group with a `count` column.
    async fn select(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<Vec<Row>, StoreError>;

    /// Number of rows (or groups) matching, ignoring order, limit and offset.
    async fn count(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<u64, StoreError>;

    /// Insert one row. Missing primary key is generated. Reports `UniqueViolation` with the violated fields.
    async fn insert(&self, entity: &ResolvedEntity, values: &Row) -> Result<Row, StoreError>;

    /// Set `values` on every row matching `predicate`; returns the updated rows.
    async fn update(&self, entity: &ResolvedEntity, predicate: &Predicate, values: &Row)
        -> Result<Vec<Row>, StoreError>;

    /// Physically delete matching rows; returns how many were removed.
    async fn delete(&self, entity: &ResolvedEntity, predicate: &Predicate) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

fn require_column(entity: &ResolvedEntity, field: &str) -> Result<(), StoreError> {
    if entity.has_column(field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField(format!("{}.{}", entity.name, field)))
    }
}

/// Reject selections naming fields the entity does not have. Grouped selections may also use `count`.
pub(crate) fn check_selection(entity: &ResolvedEntity, selection: &Selection) -> Result<(), StoreError> {
    for f in selection.predicate.fields() {
        require_column(entity, f)?;
    }
    let grouped = selection.is_grouped();
    let group_or_count = |f: &str| -> Result<(), StoreError> {
        if grouped && f == COUNT_FIELD {
            return Ok(());
        }
        require_column(entity, f)?;
        if grouped && !selection.group.iter().flatten().any(|g| g == f) {
            return Err(StoreError::UnknownField(format!("{} is not grouped", f)));
        }
        Ok(())
    };
    for f in selection.group.iter().flatten() {
        require_column(entity, f)?;
    }
    for f in selection.attributes.iter().flatten() {
        group_or_count(f)?;
    }
    for o in &selection.order {
        group_or_count(&o.field)?;
    }
    if let Some(having) = &selection.having {
        for f in having.fields() {
            group_or_count(f)?;
        }
    }
    Ok(())
}

pub(crate) fn check_values(entity: &ResolvedEntity, values: &Row) -> Result<(), StoreError> {
    values.keys().try_for_each(|k| require_column(entity, k))
}
