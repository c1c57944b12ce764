//! Eager loading for `_include`: one batched query per relationship and level, results attached
//! to each owner row under the relationship alias.

use super::Repository;
use crate::config::{Association, ResolvedEntity, ResolvedModel, ResolvedRelationship};
use crate::error::AppError;
use crate::query::{Direction, IncludeSpec, OrderBy, Predicate};
use crate::store::{Row, Selection};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

fn lookup<'m>(
    model: &'m ResolvedModel,
    entity: &'m ResolvedEntity,
    inc: &IncludeSpec,
) -> Result<(&'m ResolvedRelationship, &'m ResolvedEntity), AppError> {
    let rel = entity
        .relationship(&inc.alias)
        .ok_or_else(|| AppError::UnknownField(format!("{} has no association '{}'", entity.name, inc.alias)))?;
    let target = model
        .target_of(rel)
        .ok_or_else(|| AppError::UnknownField(format!("association target {}", rel.target)))?;
    Ok((rel, target))
}

fn join_entity<'m>(model: &'m ResolvedModel, through: &str) -> Result<&'m ResolvedEntity, AppError> {
    model
        .entity(through)
        .ok_or_else(|| AppError::UnknownField(format!("join resource {}", through)))
}

/// Stable string form of a key value so `1` and `"1"` land in the same bucket.
pub(crate) fn key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn distinct(rows: &[Row], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|r| r.get(field))
        .filter(|v| key(v).map(|k| seen.insert(k)).unwrap_or(false))
        .cloned()
        .collect()
}

/// Columns an entity's rows must carry so `includes` can be matched back to them.
pub fn key_columns(entity: &ResolvedEntity, includes: &[IncludeSpec]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for inc in includes {
        let Some(rel) = entity.relationship(&inc.alias) else {
            continue;
        };
        let col = match &rel.association {
            Association::BelongsTo { foreign_key } => foreign_key.clone(),
            _ => entity.pk.clone(),
        };
        if !cols.contains(&col) {
            cols.push(col);
        }
    }
    cols
}

/// Widen a requested projection with `needed` columns. Returns the projection to fetch and the
/// columns to strip afterwards.
pub fn widen(requested: Option<&Vec<String>>, needed: &[String]) -> (Option<Vec<String>>, Vec<String>) {
    let Some(attrs) = requested else {
        return (None, Vec::new());
    };
    let mut fetch = attrs.clone();
    let mut extra = Vec::new();
    for n in needed {
        if !fetch.contains(n) {
            fetch.push(n.clone());
            extra.push(n.clone());
        }
    }
    (Some(fetch), extra)
}

pub fn strip(rows: &mut [Row], extra: &[String]) {
    for row in rows {
        for e in extra {
            row.remove(e);
        }
    }
}

/// Owner predicate for the required (inner-join) includes: keeps only owners with at least one
/// matching related row. Applied before pagination so totals and pages agree.
pub fn restrict<'a>(
    repo: Repository<'a>,
    model: &'a ResolvedModel,
    entity: &'a ResolvedEntity,
    includes: &'a [IncludeSpec],
) -> BoxFuture<'a, Result<Predicate, AppError>> {
    Box::pin(async move {
        let mut predicate = Predicate::all();
        for inc in includes.iter().filter(|i| i.is_required()) {
            let (rel, target) = lookup(model, entity, inc)?;
            let target_filter = inc
                .where_
                .clone()
                .unwrap_or_default()
                .and(restrict(repo, model, target, &inc.include).await?);
            let project = |field: &str, predicate: Predicate| Selection {
                predicate,
                attributes: Some(vec![field.to_string()]),
                ..Default::default()
            };
            let restriction = match &rel.association {
                Association::HasOne { foreign_key } | Association::HasMany { foreign_key } => {
                    let related = repo.find_many(target, &project(foreign_key, target_filter)).await?;
                    Predicate::in_list(entity.pk.clone(), distinct(&related, foreign_key))
                }
                Association::BelongsTo { foreign_key } => {
                    let related = repo.find_many(target, &project(&target.pk, target_filter)).await?;
                    Predicate::in_list(foreign_key.clone(), distinct(&related, &target.pk))
                }
                Association::ManyToMany {
                    through,
                    owner_key,
                    target_key,
                } => {
                    let join = join_entity(model, through)?;
                    let related = repo.find_many(target, &project(&target.pk, target_filter)).await?;
                    let join_filter = Predicate::in_list(target_key.clone(), distinct(&related, &target.pk))
                        .and(inc.through.clone().unwrap_or_default());
                    let links = repo.find_many(join, &project(owner_key, join_filter)).await?;
                    Predicate::in_list(entity.pk.clone(), distinct(&links, owner_key))
                }
            };
            predicate = predicate.and(restriction);
        }
        Ok(predicate)
    })
}

/// Load related rows for `includes` and attach them to `rows`: an object or null for one-to-one,
/// an array for the plural kinds. Many-to-many members carry their join row under the join
/// entity's name.
pub fn load<'a>(
    repo: Repository<'a>,
    model: &'a ResolvedModel,
    entity: &'a ResolvedEntity,
    rows: &'a mut [Row],
    includes: &'a [IncludeSpec],
) -> BoxFuture<'a, Result<(), AppError>> {
    Box::pin(async move {
        if rows.is_empty() {
            return Ok(());
        }
        for inc in includes {
            let (rel, target) = lookup(model, entity, inc)?;
            let filter = inc
                .where_
                .clone()
                .unwrap_or_default()
                .and(restrict(repo, model, target, &inc.include).await?);
            match &rel.association {
                Association::HasOne { foreign_key } | Association::HasMany { foreign_key } => {
                    let owners = distinct(rows, &entity.pk);
                    let predicate = Predicate::in_list(foreign_key.clone(), owners).and(filter);
                    let related = fetch_related(repo, model, target, inc, predicate, foreign_key).await?;
                    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
                    for (k, r) in related {
                        groups.entry(k).or_default().push(Value::Object(r));
                    }
                    let single = matches!(rel.association, Association::HasOne { .. });
                    for row in rows.iter_mut() {
                        let matched = row
                            .get(&entity.pk)
                            .and_then(key)
                            .and_then(|k| groups.get(&k))
                            .cloned()
                            .unwrap_or_default();
                        let value = if single {
                            matched.into_iter().next().unwrap_or(Value::Null)
                        } else {
                            Value::Array(matched)
                        };
                        row.insert(inc.alias.clone(), value);
                    }
                }
                Association::BelongsTo { foreign_key } => {
                    let keys = distinct(rows, foreign_key);
                    let predicate = Predicate::in_list(target.pk.clone(), keys).and(filter);
                    let related: HashMap<String, Row> = fetch_related(repo, model, target, inc, predicate, &target.pk)
                        .await?
                        .into_iter()
                        .collect();
                    for row in rows.iter_mut() {
                        let value = row
                            .get(foreign_key)
                            .and_then(key)
                            .and_then(|k| related.get(&k))
                            .cloned()
                            .map(Value::Object)
                            .unwrap_or(Value::Null);
                        row.insert(inc.alias.clone(), value);
                    }
                }
                Association::ManyToMany {
                    through,
                    owner_key,
                    target_key,
                } => {
                    let join = join_entity(model, through)?;
                    let owners = distinct(rows, &entity.pk);
                    let join_filter =
                        Predicate::in_list(owner_key.clone(), owners).and(inc.through.clone().unwrap_or_default());
                    let links = repo
                        .find_many(
                            join,
                            &Selection {
                                predicate: join_filter,
                                order: vec![OrderBy {
                                    field: join.pk.clone(),
                                    direction: Direction::Asc,
                                }],
                                ..Default::default()
                            },
                        )
                        .await?;
                    let ids = distinct(&links, target_key);
                    let predicate = Predicate::in_list(target.pk.clone(), ids).and(filter);
                    let related: HashMap<String, Row> = fetch_related(repo, model, target, inc, predicate, &target.pk)
                        .await?
                        .into_iter()
                        .collect();
                    for row in rows.iter_mut() {
                        let owner = row.get(&entity.pk).and_then(key);
                        let members: Vec<Value> = links
                            .iter()
                            .filter(|l| owner.is_some() && l.get(owner_key).and_then(key) == owner)
                            .filter_map(|l| {
                                let mut member = related.get(&key(l.get(target_key)?)?)?.clone();
                                member.insert(join.name.clone(), Value::Object(l.clone()));
                                Some(Value::Object(member))
                            })
                            .collect();
                        row.insert(inc.alias.clone(), Value::Array(members));
                    }
                }
            }
        }
        Ok(())
    })
}

/// Fetch related rows (with their own nested includes) keyed by the `link` column.
async fn fetch_related(
    repo: Repository<'_>,
    model: &ResolvedModel,
    target: &ResolvedEntity,
    inc: &IncludeSpec,
    predicate: Predicate,
    link: &str,
) -> Result<Vec<(String, Row)>, AppError> {
    let mut needed = key_columns(target, &inc.include);
    needed.push(link.to_string());
    let (attributes, extra) = widen(inc.attributes.as_ref(), &needed);
    let selection = Selection {
        predicate,
        attributes,
        order: vec![OrderBy {
            field: target.pk.clone(),
            direction: Direction::Asc,
        }],
        ..Default::default()
    };
    let mut related = repo.find_many(target, &selection).await?;
    load(repo, model, target, &mut related, &inc.include).await?;
    Ok(related
        .into_iter()
        .filter_map(|mut r| {
            let k = key(r.get(link)?)?;
            for e in &extra {
                r.remove(e);
            }
            Some((k, r))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_reports_added_columns() {
        let requested = vec!["name".to_string()];
        let (fetch, extra) = widen(Some(&requested), &["id".to_string(), "name".to_string()]);
        assert_eq!(fetch, Some(vec!["name".to_string(), "id".to_string()]));
        assert_eq!(extra, vec!["id".to_string()]);
        assert_eq!(widen(None, &["id".to_string()]), (None, Vec::new()));
    }

    #[test]
    fn distinct_skips_nulls_and_repeats() {
        let rows: Vec<Row> = [
            serde_json::json!({"k": 1}),
            serde_json::json!({"k": "1"}),
            serde_json::json!({"k": null}),
            serde_json::json!({"k": 2}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        assert_eq!(distinct(&rows, "k"), vec![serde_json::json!(1), serde_json::json!(2)]);
    }
}
