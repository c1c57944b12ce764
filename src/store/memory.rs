//! In-memory store for tests, demos and running without a database.

use super::{check_selection, check_values, Row, Selection, Store, COUNT_FIELD};
use crate::config::{PkType, ResolvedEntity};
use crate::error::StoreError;
use crate::query::{CompareOp, Direction, OrderBy, Predicate};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// Tables keyed by entity name. Uses RwLock for thread-safe access; no lock is held across an await.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, Table>) -> T) -> Result<T, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| StoreError::Backend(format!("failed to acquire read lock: {}", e)))?;
        Ok(f(&tables))
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Table>) -> T) -> Result<T, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Backend(format!("failed to acquire write lock: {}", e)))?;
        Ok(f(&mut tables))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<Vec<Row>, StoreError> {
        check_selection(entity, selection)?;
        let matched = self.read(|tables| {
            tables
                .get(&entity.name)
                .map(|t| {
                    t.rows
                        .iter()
                        .filter(|r| matches(r, &selection.predicate))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })?;

        let mut rows = if selection.is_grouped() {
            group_rows(matched, selection)
        } else {
            matched
        };
        sort_rows(&mut rows, &selection.order);
        let limit = selection.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        let mut page: Vec<Row> = rows
            .into_iter()
            .skip(selection.offset as usize)
            .take(limit)
            .collect();
        if let Some(attrs) = &selection.attributes {
            for row in &mut page {
                row.retain(|k, _| attrs.iter().any(|a| a == k));
            }
        }
        Ok(page)
    }

    async fn count(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<u64, StoreError> {
        check_selection(entity, selection)?;
        let matched = self.read(|tables| {
            tables
                .get(&entity.name)
                .map(|t| {
                    t.rows
                        .iter()
                        .filter(|r| matches(r, &selection.predicate))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })?;
        if selection.is_grouped() {
            Ok(group_rows(matched, selection).len() as u64)
        } else {
            Ok(matched.len() as u64)
        }
    }

    async fn insert(&self, entity: &ResolvedEntity, values: &Row) -> Result<Row, StoreError> {
        check_values(entity, values)?;
        self.write(|tables| {
            let table = tables.entry(entity.name.clone()).or_default();
            let mut row = Row::new();
            for col in &entity.columns {
                let value = match values.get(&col.name) {
                    Some(v) if !(v.is_null() && col.name == entity.pk) => v.clone(),
                    _ if col.name == entity.pk => generate_pk(entity, table),
                    _ => col.default.clone().unwrap_or(Value::Null),
                };
                row.insert(col.name.clone(), value);
            }
            if let Some(n) = row.get(&entity.pk).and_then(Value::as_i64) {
                table.next_id = table.next_id.max(n);
            }
            if let Some(fields) = unique_violation(entity, &table.rows, &row, None) {
                return Err(StoreError::UniqueViolation { fields });
            }
            table.rows.push(row.clone());
            Ok(row)
        })?
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        predicate: &Predicate,
        values: &Row,
    ) -> Result<Vec<Row>, StoreError> {
        check_values(entity, values)?;
        check_selection(entity, &Selection::filter(predicate.clone()))?;
        self.write(|tables| {
            let Some(table) = tables.get_mut(&entity.name) else {
                return Ok(Vec::new());
            };
            let targets: Vec<usize> = (0..table.rows.len())
                .filter(|&i| matches(&table.rows[i], predicate))
                .collect();
            // Check the table as it would be after the update; a violation leaves it untouched.
            let mut after = table.rows.clone();
            for &i in &targets {
                for (k, v) in values {
                    after[i].insert(k.clone(), v.clone());
                }
            }
            for &i in &targets {
                if let Some(fields) = unique_violation(entity, &after, &after[i], Some(i)) {
                    return Err(StoreError::UniqueViolation { fields });
                }
            }
            let updated: Vec<Row> = targets.iter().map(|&i| after[i].clone()).collect();
            table.rows = after;
            Ok(updated)
        })?
    }

    async fn delete(&self, entity: &ResolvedEntity, predicate: &Predicate) -> Result<u64, StoreError> {
        check_selection(entity, &Selection::filter(predicate.clone()))?;
        self.write(|tables| {
            let Some(table) = tables.get_mut(&entity.name) else {
                return 0;
            };
            let before = table.rows.len();
            table.rows.retain(|r| !matches(r, predicate));
            (before - table.rows.len()) as u64
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read(|_| ())
    }
}

fn generate_pk(entity: &ResolvedEntity, table: &mut Table) -> Value {
    match entity.pk_type {
        PkType::Int | PkType::BigInt => {
            table.next_id += 1;
            Value::from(table.next_id)
        }
        PkType::Uuid | PkType::Text => Value::String(uuid::Uuid::new_v4().to_string()),
    }
}

/// First uniqueness constraint (primary key included) that `row` would break, skipping `skip`.
/// Sets containing a null never conflict, as in SQL.
fn unique_violation(entity: &ResolvedEntity, rows: &[Row], row: &Row, skip: Option<usize>) -> Option<Vec<String>> {
    let pk_set = vec![entity.pk.clone()];
    std::iter::once(&pk_set)
        .chain(entity.unique.iter())
        .find(|set| {
            let key: Vec<&Value> = set.iter().map(|f| row.get(f).unwrap_or(&Value::Null)).collect();
            if key.iter().any(|v| v.is_null()) {
                return false;
            }
            rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && set
                        .iter()
                        .zip(&key)
                        .all(|(f, v)| loose_eq(other.get(f).unwrap_or(&Value::Null), v))
            })
        })
        .cloned()
}

fn group_rows(rows: Vec<Row>, selection: &Selection) -> Vec<Row> {
    let fields = selection.group.clone().unwrap_or_default();
    let mut groups: Vec<(Row, u64)> = Vec::new();
    for row in rows {
        let key: Row = fields
            .iter()
            .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
            .collect();
        match groups.iter_mut().find(|(k, _)| k == &key) {
            Some((_, n)) => *n += 1,
            None => groups.push((key, 1)),
        }
    }
    groups
        .into_iter()
        .map(|(mut key, n)| {
            key.insert(COUNT_FIELD.to_string(), Value::from(n));
            key
        })
        .filter(|row| selection.having.as_ref().map(|h| matches(row, h)).unwrap_or(true))
        .collect()
}

fn sort_rows(rows: &mut [Row], order: &[OrderBy]) {
    rows.sort_by(|a, b| {
        for o in order {
            let x = a.get(&o.field).unwrap_or(&Value::Null);
            let y = b.get(&o.field).unwrap_or(&Value::Null);
            // Nulls sort last ascending and first descending, as in PostgreSQL.
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ord = match o.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

pub(crate) fn matches(row: &Row, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::And(parts) => parts.iter().all(|p| matches(row, p)),
        Predicate::Or(parts) => parts.iter().any(|p| matches(row, p)),
        Predicate::In { field, values, negated } => {
            let v = row.get(field).unwrap_or(&Value::Null);
            if v.is_null() {
                return false;
            }
            values.iter().any(|x| loose_eq(v, x)) != *negated
        }
        Predicate::Compare { field, op, value } => {
            let v = row.get(field).unwrap_or(&Value::Null);
            match (op, value.is_null()) {
                (CompareOp::Eq, true) => v.is_null(),
                (CompareOp::Ne, true) => !v.is_null(),
                _ if v.is_null() || value.is_null() => false,
                (CompareOp::Eq, _) => loose_eq(v, value),
                (CompareOp::Ne, _) => !loose_eq(v, value),
                (CompareOp::Like, _) => like(&as_text(v), &as_text(value)),
                (op, _) => match compare(v, value) {
                    Some(ord) => match op {
                        CompareOp::Gt => ord == Ordering::Greater,
                        CompareOp::Gte => ord != Ordering::Less,
                        CompareOp::Lt => ord == Ordering::Less,
                        _ => ord != Ordering::Greater,
                    },
                    None => false,
                },
            }
        }
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Querystring values arrive untyped, so `"1"` equals `1`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            matches!((as_number(a), as_number(b)), (Some(x), Some(y)) if x == y)
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => s == &x.to_string(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

/// SQL LIKE: `%` matches any run, `_` one character.
fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((bp, bt)) = backtrack {
            pi = bp + 1;
            ti = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnInfo;
    use serde_json::json;

    fn entity() -> ResolvedEntity {
        let col = |name: &str, pk: bool| ColumnInfo {
            name: name.into(),
            pk_type: pk.then_some(PkType::Int),
            nullable: true,
            default: None,
            has_default: false,
            unique: false,
            pg_type: "text".into(),
        };
        ResolvedEntity {
            name: "character".into(),
            schema_name: "public".into(),
            table_name: "character".into(),
            path_segment: None,
            namespace: None,
            pk: "id".into(),
            pk_type: PkType::Int,
            columns: vec![col("id", true), col("name", false), col("house_id", false)],
            unique: vec![vec!["name".into()]],
            soft_delete: None,
            relationships: Vec::new(),
        }
    }

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_generates_sequential_ids_and_enforces_unique() {
        let store = MemoryStore::new();
        let e = entity();
        let a = store.insert(&e, &row(json!({"name": "Jon"}))).await.unwrap();
        let b = store.insert(&e, &row(json!({"name": "Arya", "house_id": 1}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(a["house_id"], Value::Null);

        let err = store.insert(&e, &row(json!({"name": "Jon"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref fields } if fields == &["name"]));
        let err = store.insert(&e, &row(json!({"id": 1, "name": "Sansa"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref fields } if fields == &["id"]));
    }

    #[tokio::test]
    async fn explicit_ids_advance_the_sequence() {
        let store = MemoryStore::new();
        let e = entity();
        store.insert(&e, &row(json!({"id": 10, "name": "Ned"}))).await.unwrap();
        let next = store.insert(&e, &row(json!({"name": "Cat"}))).await.unwrap();
        assert_eq!(next["id"], json!(11));
    }

    #[tokio::test]
    async fn select_filters_orders_and_pages() {
        let store = MemoryStore::new();
        let e = entity();
        for (name, house) in [("Jon", 1), ("Arya", 1), ("Cersei", 2), ("Bran", 1)] {
            store.insert(&e, &row(json!({"name": name, "house_id": house}))).await.unwrap();
        }
        let sel = Selection {
            predicate: Predicate::eq("house_id", json!("1")),
            order: vec![OrderBy {
                field: "name".into(),
                direction: Direction::Asc,
            }],
            limit: Some(2),
            offset: 1,
            attributes: Some(vec!["name".into()]),
            ..Default::default()
        };
        let rows = store.select(&e, &sel).await.unwrap();
        assert_eq!(rows, vec![row(json!({"name": "Bran"})), row(json!({"name": "Jon"}))]);
        assert_eq!(store.count(&e, &sel).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn grouping_counts_and_having_filters_groups() {
        let store = MemoryStore::new();
        let e = entity();
        for (name, house) in [("Jon", 1), ("Arya", 1), ("Cersei", 2)] {
            store.insert(&e, &row(json!({"name": name, "house_id": house}))).await.unwrap();
        }
        let sel = Selection {
            group: Some(vec!["house_id".into()]),
            having: Some(Predicate::Compare {
                field: "count".into(),
                op: CompareOp::Gt,
                value: json!(1),
            }),
            ..Default::default()
        };
        let rows = store.select(&e, &sel).await.unwrap();
        assert_eq!(rows, vec![row(json!({"house_id": 1, "count": 2}))]);
        assert_eq!(store.count(&e, &sel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let store = MemoryStore::new();
        let e = entity();
        let err = store
            .select(&e, &Selection::filter(Predicate::eq("colour", json!("red"))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField(_)));
        let err = store.insert(&e, &row(json!({"colour": "red"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownField(_)));
    }

    #[tokio::test]
    async fn update_rejects_unique_collisions_without_partial_writes() {
        let store = MemoryStore::new();
        let e = entity();
        store.insert(&e, &row(json!({"name": "Jon"}))).await.unwrap();
        store.insert(&e, &row(json!({"name": "Arya"}))).await.unwrap();
        let err = store
            .update(&e, &Predicate::eq("id", json!(2)), &row(json!({"name": "Jon"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        let arya = store.select(&e, &Selection::filter(Predicate::eq("id", json!(2)))).await.unwrap();
        assert_eq!(arya[0]["name"], json!("Arya"));
        assert_eq!(store.delete(&e, &Predicate::eq("name", json!("Arya"))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn multi_row_update_cannot_collide_with_itself() {
        let store = MemoryStore::new();
        let e = entity();
        store.insert(&e, &row(json!({"name": "Jon", "house_id": 1}))).await.unwrap();
        store.insert(&e, &row(json!({"name": "Arya", "house_id": 1}))).await.unwrap();
        let err = store
            .update(&e, &Predicate::eq("house_id", json!(1)), &row(json!({"name": "Bran"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref fields } if fields == &["name"]));
        let names: Vec<Value> = store
            .select(&e, &Selection::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("Jon"), json!("Arya")]);

        let moved = store
            .update(&e, &Predicate::eq("house_id", json!(1)), &row(json!({"house_id": 2})))
            .await
            .unwrap();
        assert_eq!(moved.len(), 2);
    }

    #[test]
    fn like_patterns() {
        assert!(like("Jon Snow", "Jon%"));
        assert!(like("Jon Snow", "%Snow"));
        assert!(like("Jon", "J_n"));
        assert!(!like("Jon", "A%"));
        assert!(like("", "%"));
    }
}
