//! PostgreSQL store: executes statements from `sql::builder` on a `PgPool`.

use super::{check_selection, check_values, Row, Selection, Store};
use crate::config::ResolvedEntity;
use crate::error::StoreError;
use crate::query::Predicate;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgDatabaseError, PgRow};
use sqlx::PgPool;
use std::sync::OnceLock;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn query(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn fetch_all(&self, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
        let rows = Self::query(q)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(entity, e))?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<Vec<Row>, StoreError> {
        check_selection(entity, selection)?;
        self.fetch_all(entity, &sql::select(entity, selection)).await
    }

    async fn count(&self, entity: &ResolvedEntity, selection: &Selection) -> Result<u64, StoreError> {
        check_selection(entity, selection)?;
        let q = sql::count(entity, selection);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let n = query.fetch_one(&self.pool).await.map_err(|e| map_db_error(entity, e))?;
        Ok(n.max(0) as u64)
    }

    async fn insert(&self, entity: &ResolvedEntity, values: &Row) -> Result<Row, StoreError> {
        check_values(entity, values)?;
        let q = sql::insert(entity, values);
        let row = Self::query(&q)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(entity, e))?;
        Ok(row_to_json(&row))
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        predicate: &Predicate,
        values: &Row,
    ) -> Result<Vec<Row>, StoreError> {
        check_values(entity, values)?;
        check_selection(entity, &Selection::filter(predicate.clone()))?;
        self.fetch_all(entity, &sql::update(entity, predicate, values)).await
    }

    async fn delete(&self, entity: &ResolvedEntity, predicate: &Predicate) -> Result<u64, StoreError> {
        check_selection(entity, &Selection::filter(predicate.clone()))?;
        let q = sql::delete(entity, predicate);
        let done = Self::query(&q)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(entity, e))?;
        Ok(done.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn detail_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Key \(([^)]*)\)=").expect("static regex"))
}

/// Unique violations carry their field list so conflict recovery can find the existing row.
fn map_db_error(entity: &ResolvedEntity, e: sqlx::Error) -> StoreError {
    let sqlx::Error::Database(db) = &e else {
        return StoreError::Db(e);
    };
    if !db.is_unique_violation() {
        return StoreError::Db(e);
    }
    let from_detail = db
        .try_downcast_ref::<PgDatabaseError>()
        .and_then(|pg| pg.detail())
        .and_then(|detail| detail_key_re().captures(detail))
        .map(|caps| {
            caps[1]
                .split(',')
                .map(|f| f.trim().trim_matches('"').to_string())
                .collect::<Vec<_>>()
        });
    let fields = from_detail
        .or_else(|| db.constraint().and_then(|c| fields_for_constraint(entity, c)))
        .unwrap_or_else(|| vec![entity.pk.clone()]);
    StoreError::UniqueViolation { fields }
}

/// Match PostgreSQL's default constraint names (`{table}_pkey`, `{table}_{cols}_key`).
fn fields_for_constraint(entity: &ResolvedEntity, constraint: &str) -> Option<Vec<String>> {
    if constraint == format!("{}_pkey", entity.table_name) {
        return Some(vec![entity.pk.clone()]);
    }
    entity
        .unique
        .iter()
        .find(|set| constraint == format!("{}_{}_key", entity.table_name, set.join("_")))
        .cloned()
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
