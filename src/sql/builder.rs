//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity and a selection.

use crate::config::ResolvedEntity;
use crate::query::{CompareOp, Direction, Predicate};
use crate::store::{Row, Selection, COUNT_FIELD};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder cast to the column's declared type; values are bound as text.
    fn placeholder(&mut self, entity: &ResolvedEntity, field: &str, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, cast_type(entity, field))
    }
}

fn cast_type(entity: &ResolvedEntity, field: &str) -> String {
    if field == COUNT_FIELD && !entity.has_column(field) {
        return "bigint".into();
    }
    match entity.column(field).map(|c| c.pg_type.as_str()) {
        Some("serial") => "integer".into(),
        Some("bigserial") => "bigint".into(),
        Some("smallserial") => "smallint".into(),
        Some(t) if !t.is_empty() => t.to_string(),
        _ => "text".into(),
    }
}

/// Column expression; `count` in grouped queries is the aggregate.
fn field_expr(entity: &ResolvedEntity, field: &str, grouped: bool) -> String {
    if grouped && field == COUNT_FIELD && !entity.has_column(field) {
        "COUNT(*)".into()
    } else {
        quoted(field)
    }
}

/// SELECT list: custom enum (schema.typename) and numeric as col::text so decoding yields a String.
fn select_column_list<'a>(entity: &ResolvedEntity, names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|name| {
            let q = quoted(name);
            let pg_type = entity.column(name).map(|c| c.pg_type.as_str()).unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" || pg_type == "decimal" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn all_columns(entity: &ResolvedEntity) -> String {
    select_column_list(entity, entity.columns.iter().map(|c| c.name.as_str()))
}

fn predicate_sql(q: &mut QueryBuf, entity: &ResolvedEntity, p: &Predicate, grouped: bool) -> String {
    match p {
        Predicate::And(parts) | Predicate::Or(parts) if parts.is_empty() => {
            let literal = if matches!(p, Predicate::And(_)) { "TRUE" } else { "FALSE" };
            literal.into()
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            let joiner = if matches!(p, Predicate::And(_)) { " AND " } else { " OR " };
            let inner: Vec<String> = parts
                .iter()
                .map(|part| predicate_sql(q, entity, part, grouped))
                .collect();
            format!("({})", inner.join(joiner))
        }
        Predicate::Compare { field, op, value } => {
            let lhs = field_expr(entity, field, grouped);
            match (op, value) {
                (CompareOp::Eq, Value::Null) => format!("{} IS NULL", lhs),
                (CompareOp::Ne, Value::Null) => format!("{} IS NOT NULL", lhs),
                (CompareOp::Like, v) => {
                    let n = q.push_param(v.clone());
                    format!("{}::text LIKE ${}::text", lhs, n)
                }
                (op, v) => {
                    let rhs = q.placeholder(entity, field, v.clone());
                    format!("{} {} {}", lhs, op.sql(), rhs)
                }
            }
        }
        Predicate::In { field, values, negated } => {
            if values.is_empty() {
                let literal = if *negated { "TRUE" } else { "FALSE" };
                return literal.into();
            }
            let lhs = field_expr(entity, field, grouped);
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| q.placeholder(entity, field, v.clone()))
                .collect();
            format!(
                "{} {}IN ({})",
                lhs,
                if *negated { "NOT " } else { "" },
                placeholders.join(", ")
            )
        }
    }
}

fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, p: &Predicate) -> String {
    if p.is_all() {
        String::new()
    } else {
        format!(" WHERE {}", predicate_sql(q, entity, p, false))
    }
}

fn group_clause(q: &mut QueryBuf, entity: &ResolvedEntity, sel: &Selection) -> String {
    let Some(group) = sel.group.as_ref().filter(|g| !g.is_empty()) else {
        return String::new();
    };
    let cols: Vec<String> = group.iter().map(|g| quoted(g)).collect();
    let mut out = format!(" GROUP BY {}", cols.join(", "));
    if let Some(having) = sel.having.as_ref().filter(|h| !h.is_all()) {
        out.push_str(" HAVING ");
        out.push_str(&predicate_sql(q, entity, having, true));
    }
    out
}

/// SELECT with filter, projection, grouping, ORDER BY and LIMIT/OFFSET.
pub fn select(entity: &ResolvedEntity, sel: &Selection) -> QueryBuf {
    let mut q = QueryBuf::new();
    let grouped = sel.is_grouped();
    let cols = if grouped {
        let group = sel.group.iter().flatten().map(String::as_str);
        format!("{}, COUNT(*) AS {}", select_column_list(entity, group), quoted(COUNT_FIELD))
    } else {
        match &sel.attributes {
            Some(attrs) if !attrs.is_empty() => select_column_list(entity, attrs.iter().map(String::as_str)),
            _ => all_columns(entity),
        }
    };
    let where_sql = where_clause(&mut q, entity, &sel.predicate);
    let group_sql = group_clause(&mut q, entity, sel);
    let order_sql = if sel.order.is_empty() {
        String::new()
    } else {
        let parts: Vec<String> = sel
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {}", field_expr(entity, &o.field, grouped), dir)
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    };
    let limit_sql = sel.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_sql = if sel.offset > 0 {
        format!(" OFFSET {}", sel.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}{}",
        cols,
        qualified_table(entity),
        where_sql,
        group_sql,
        order_sql,
        limit_sql,
        offset_sql
    );
    q
}

/// COUNT of matching rows, or of groups for grouped selections.
pub fn count(entity: &ResolvedEntity, sel: &Selection) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(entity);
    let where_sql = where_clause(&mut q, entity, &sel.predicate);
    if sel.is_grouped() {
        let group_sql = group_clause(&mut q, entity, sel);
        q.sql = format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM {}{}{}) grouped",
            table, where_sql, group_sql
        );
    } else {
        q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
    }
    q
}

/// INSERT: columns present in `values`, plus columns with neither a value nor a default (bound as NULL).
/// Omits columns with a DB default when no value is given so the database applies it.
pub fn insert(entity: &ResolvedEntity, values: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let val = values.get(&c.name).cloned();
        if val.is_none() && (c.has_default || c.pk_type.is_some()) {
            continue;
        }
        let ph = q.placeholder(entity, &c.name, val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    let returning = all_columns(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE matching rows: SET only columns present in `values`.
pub fn update(entity: &ResolvedEntity, predicate: &Predicate, values: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(entity);
    let mut sets = Vec::new();
    for (k, v) in values {
        if !entity.has_column(k) {
            continue;
        }
        let rhs = q.placeholder(entity, k, v.clone());
        sets.push(format!("{} = {}", quoted(k), rhs));
    }
    let returning = all_columns(entity);
    let where_sql = where_clause(&mut q, entity, predicate);
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {}{}", returning, table, where_sql)
    } else {
        format!(
            "UPDATE {} SET {}{} RETURNING {}",
            table,
            sets.join(", "),
            where_sql,
            returning
        )
    };
    q
}

/// DELETE matching rows.
pub fn delete(entity: &ResolvedEntity, predicate: &Predicate) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, predicate);
    q.sql = format!("DELETE FROM {}{}", qualified_table(entity), where_sql);
    q
}
