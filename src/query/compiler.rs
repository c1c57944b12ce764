//! Querystring compiler: `(key, value)` pairs plus target resource into a `QueryDescriptor`.
//!
//! Keys starting with `_` are directives; any other key naming a column of the target is an
//! equality (or in-list) filter. Unknown keys are ignored. The compiler is structural only:
//! directive field names are not checked against the schema here.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::query::descriptor::*;
use serde_json::{Map, Value};

/// Decode a querystring value: JSON when it parses, otherwise the raw string.
pub fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn invalid(key: &str, msg: impl std::fmt::Display) -> AppError {
    AppError::InvalidQuery(format!("{}: {}", key, msg))
}

pub fn compile(pairs: &[(String, String)], target: &ResolvedEntity) -> Result<QueryDescriptor, AppError> {
    let mut q = QueryDescriptor::default();
    // Filters keep first-appearance order so generated SQL is stable.
    let mut filters: Vec<(String, Vec<Value>)> = Vec::new();

    for (raw_key, raw) in pairs {
        let key = raw_key.strip_suffix("[]").unwrap_or(raw_key);
        match key {
            "_attributes" => q.attributes = Some(parse_field_list(key, raw)?),
            "_order" => q.order = parse_order(key, &decode_value(raw))?,
            "_limit" => q.limit = parse_count(key, raw)?.min(MAX_LIMIT),
            "_offset" => q.offset = parse_count(key, raw)?,
            "_group" => q.group = Some(parse_field_list(key, raw)?),
            "_having" => q.having = Some(parse_predicate_value(key, &decode_value(raw))?),
            "_through" => q.through = Some(parse_predicate_value(key, &decode_value(raw))?),
            "_include" => q.include = parse_includes(key, &decode_value(raw))?,
            k if k.starts_with('_') => {
                tracing::debug!(key = %k, "ignoring unknown directive");
            }
            k if target.has_column(k) => {
                let value = decode_value(raw);
                match filters.iter_mut().find(|(f, _)| f == k) {
                    Some((_, values)) => values.push(value),
                    None => filters.push((k.to_string(), vec![value])),
                }
            }
            _ => {}
        }
    }

    for (field, mut values) in filters {
        let predicate = if values.len() == 1 {
            match values.pop().unwrap_or(Value::Null) {
                Value::Array(list) => Predicate::in_list(field, list),
                single => Predicate::eq(field, single),
            }
        } else {
            let flat = values
                .into_iter()
                .flat_map(|v| match v {
                    Value::Array(list) => list,
                    single => vec![single],
                })
                .collect();
            Predicate::in_list(field, flat)
        };
        q.where_ = std::mem::take(&mut q.where_).and(predicate);
    }

    Ok(q)
}

fn parse_count(key: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(key, format!("expected a non-negative integer, got '{}'", raw)))
}

/// A JSON array of strings, or a comma-separated list.
fn parse_field_list(key: &str, raw: &str) -> Result<Vec<String>, AppError> {
    match decode_value(raw) {
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(invalid(key, format!("expected field name, got {}", other))),
            })
            .collect(),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        other => Err(invalid(key, format!("expected a list of field names, got {}", other))),
    }
}

fn parse_order(key: &str, value: &Value) -> Result<Vec<OrderBy>, AppError> {
    let Value::Array(items) = value else {
        return Err(invalid(key, "expected a list of [field, direction] pairs"));
    };
    items
        .iter()
        .map(|item| {
            let pair = item
                .as_array()
                .filter(|p| !p.is_empty() && p.len() <= 2)
                .ok_or_else(|| invalid(key, format!("expected [field, direction], got {}", item)))?;
            let field = pair[0]
                .as_str()
                .ok_or_else(|| invalid(key, format!("field must be a string, got {}", pair[0])))?;
            let direction = match pair.get(1) {
                None => Direction::Asc,
                Some(Value::String(d)) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
                Some(Value::String(d)) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
                Some(other) => return Err(invalid(key, format!("direction must be ASC or DESC, got {}", other))),
            };
            Ok(OrderBy {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

fn parse_predicate_value(key: &str, value: &Value) -> Result<Predicate, AppError> {
    match value {
        Value::Object(map) => parse_predicate(map).map_err(|e| invalid(key, e)),
        other => Err(invalid(key, format!("expected an object, got {}", other))),
    }
}

/// Object grammar: implicit AND of `field: scalar | [list] | {"$op": value}` and `"$and"/"$or": [objects]`.
pub fn parse_predicate(map: &Map<String, Value>) -> Result<Predicate, String> {
    let mut out = Predicate::all();
    for (k, v) in map {
        let part = match k.as_str() {
            "$and" | "$or" => {
                let items = v.as_array().ok_or_else(|| format!("{} expects a list of objects", k))?;
                let parts = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(inner) => parse_predicate(inner),
                        other => Err(format!("{} expects objects, got {}", k, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if k == "$and" {
                    Predicate::And(parts)
                } else {
                    Predicate::Or(parts)
                }
            }
            op if op.starts_with('$') => return Err(format!("unknown operator {}", op)),
            field => parse_field_condition(field, v)?,
        };
        out = out.and(part);
    }
    Ok(out)
}

fn parse_field_condition(field: &str, v: &Value) -> Result<Predicate, String> {
    match v {
        Value::Array(list) => Ok(Predicate::in_list(field, list.clone())),
        Value::Object(ops) => {
            if ops.is_empty() {
                return Err(format!("empty condition for {}", field));
            }
            let mut out = Predicate::all();
            for (op, operand) in ops {
                let part = match op.as_str() {
                    "$in" | "$notIn" => Predicate::In {
                        field: field.to_string(),
                        values: operand
                            .as_array()
                            .cloned()
                            .ok_or_else(|| format!("{} on {} expects a list", op, field))?,
                        negated: op == "$notIn",
                    },
                    other => Predicate::Compare {
                        field: field.to_string(),
                        op: CompareOp::from_operator(other)
                            .ok_or_else(|| format!("unknown operator {} on {}", other, field))?,
                        value: operand.clone(),
                    },
                };
                out = out.and(part);
            }
            Ok(out)
        }
        scalar => Ok(Predicate::eq(field, scalar.clone())),
    }
}

fn parse_includes(key: &str, value: &Value) -> Result<Vec<IncludeSpec>, AppError> {
    match value {
        Value::Array(items) => items.iter().map(|i| parse_include(key, i)).collect(),
        single => Ok(vec![parse_include(key, single)?]),
    }
}

fn parse_include(key: &str, value: &Value) -> Result<IncludeSpec, AppError> {
    let map = match value {
        Value::String(alias) => return Ok(IncludeSpec::alias(alias.as_str())),
        Value::Object(map) => map,
        other => return Err(invalid(key, format!("expected alias or object, got {}", other))),
    };
    let alias = ["association", "as", "alias"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .ok_or_else(|| invalid(key, "include entry must name an association"))?;
    let attributes = match map.get("attributes") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|i| {
                    i.as_str()
                        .map(String::from)
                        .ok_or_else(|| invalid(key, "attributes must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(other) => return Err(invalid(key, format!("attributes must be a list, got {}", other))),
    };
    let required = match map.get("required") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => return Err(invalid(key, format!("required must be a boolean, got {}", other))),
    };
    Ok(IncludeSpec {
        alias: alias.to_string(),
        attributes,
        where_: map.get("where").map(|w| parse_predicate_value(key, w)).transpose()?,
        required,
        through: map.get("through").map(|t| parse_predicate_value(key, t)).transpose()?,
        include: map
            .get("include")
            .map(|i| parse_includes(key, i))
            .transpose()?
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnInfo, PkType};
    use serde_json::json;

    fn character() -> ResolvedEntity {
        let col = |name: &str| ColumnInfo {
            name: name.into(),
            pk_type: (name == "id").then_some(PkType::Int),
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
            path_segment: Some("characters".into()),
            namespace: None,
            pk: "id".into(),
            pk_type: PkType::Int,
            columns: vec![col("id"), col("name"), col("house_id")],
            unique: Vec::new(),
            soft_delete: None,
            relationships: Vec::new(),
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_without_directives() {
        let q = compile(&[], &character()).unwrap();
        assert_eq!(q.limit, 20);
        assert_eq!(q.offset, 0);
        assert!(q.where_.is_all());
        assert!(q.include.is_empty());
    }

    #[test]
    fn attribute_keys_become_filters_and_unknown_keys_are_ignored() {
        let q = compile(&pairs(&[("name", "Jon"), ("colour", "red"), ("_bogus", "1")]), &character()).unwrap();
        assert_eq!(q.where_, Predicate::eq("name", json!("Jon")));
    }

    #[test]
    fn repeated_keys_and_arrays_become_in_lists() {
        let q = compile(&pairs(&[("house_id", "1"), ("house_id[]", "2")]), &character()).unwrap();
        assert_eq!(q.where_, Predicate::in_list("house_id", vec![json!(1), json!(2)]));

        let q = compile(&pairs(&[("name", r#"["Jon","Arya"]"#)]), &character()).unwrap();
        assert_eq!(q.where_, Predicate::in_list("name", vec![json!("Jon"), json!("Arya")]));
    }

    #[test]
    fn order_requires_pairs() {
        let q = compile(&pairs(&[("_order", r#"[["name","DESC"],["id"]]"#)]), &character()).unwrap();
        assert_eq!(q.order.len(), 2);
        assert_eq!(q.order[0].direction, Direction::Desc);
        assert_eq!(q.order[1].direction, Direction::Asc);

        let err = compile(&pairs(&[("_order", "name")]), &character()).unwrap_err();
        assert!(matches!(err, AppError::InvalidQuery(_)));
        let err = compile(&pairs(&[("_order", r#"[["name","SIDEWAYS"]]"#)]), &character()).unwrap_err();
        assert!(matches!(err, AppError::InvalidQuery(_)));
    }

    #[test]
    fn limit_must_be_a_non_negative_integer() {
        assert!(matches!(
            compile(&pairs(&[("_limit", "ten")]), &character()),
            Err(AppError::InvalidQuery(_))
        ));
        assert!(matches!(
            compile(&pairs(&[("_offset", "-1")]), &character()),
            Err(AppError::InvalidQuery(_))
        ));
        let q = compile(&pairs(&[("_limit", "5000"), ("_offset", "40")]), &character()).unwrap();
        assert_eq!(q.limit, MAX_LIMIT);
        assert_eq!(q.offset, 40);
    }

    #[test]
    fn attributes_and_group_accept_csv_or_json() {
        let q = compile(&pairs(&[("_attributes", "id, name"), ("_group", r#"["house_id"]"#)]), &character())
            .unwrap();
        assert_eq!(q.attributes, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(q.group, Some(vec!["house_id".to_string()]));
    }

    #[test]
    fn having_and_through_parse_predicate_objects() {
        let q = compile(
            &pairs(&[("_having", r#"{"count":{"$gt":1}}"#), ("_through", r#"{"role":["lead","extra"]}"#)]),
            &character(),
        )
        .unwrap();
        assert_eq!(
            q.having,
            Some(Predicate::Compare {
                field: "count".into(),
                op: CompareOp::Gt,
                value: json!(1)
            })
        );
        assert_eq!(
            q.through,
            Some(Predicate::in_list("role", vec![json!("lead"), json!("extra")]))
        );
        assert!(compile(&pairs(&[("_having", "[1]")]), &character()).is_err());
    }

    #[test]
    fn predicate_supports_or_groups() {
        let p = parse_predicate(
            json!({"$or": [{"name": "Jon"}, {"house_id": {"$in": [1, 2]}}]})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        match p {
            Predicate::Or(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected Or, got {:?}", other),
        }
        assert!(parse_predicate(json!({"$xor": []}).as_object().unwrap()).is_err());
    }

    #[test]
    fn include_accepts_string_object_and_list() {
        let q = compile(&pairs(&[("_include", "house")]), &character()).unwrap();
        assert_eq!(q.include, vec![IncludeSpec::alias("house")]);

        let q = compile(
            &pairs(&[(
                "_include",
                r#"[{"association":"books","required":true,"where":{"title":"AGOT"},
                    "through":{"role":"pov"},"include":["author"]}]"#,
            )]),
            &character(),
        )
        .unwrap();
        let inc = &q.include[0];
        assert_eq!(inc.alias, "books");
        assert!(inc.is_required());
        assert_eq!(inc.where_, Some(Predicate::eq("title", json!("AGOT"))));
        assert_eq!(inc.through, Some(Predicate::eq("role", json!("pov"))));
        assert_eq!(inc.include, vec![IncludeSpec::alias("author")]);

        assert!(compile(&pairs(&[("_include", r#"{"required":true}"#)]), &character()).is_err());
    }
}
