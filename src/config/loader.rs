//! Load config from JSON documents on disk and resolve it into the runtime model.

use crate::config::resolved::{
    Association, ColumnInfo, PkType, ResolvedEntity, ResolvedModel, ResolvedRelationship, SoftDelete,
};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> =
        config.columns.iter().fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let api_by_table: HashMap<_, _> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api))
        .collect();

    // Exposed tables keep api declaration order so the route plan is deterministic.
    let mut ordered: Vec<&TableConfig> = config
        .api_entities
        .iter()
        .filter_map(|api| config.tables.iter().find(|t| t.id == api.entity_id))
        .collect();
    ordered.extend(config.tables.iter().filter(|t| !api_by_table.contains_key(t.id.as_str())));

    let mut entities = Vec::with_capacity(ordered.len());
    let mut entity_by_name = HashMap::new();

    for table in ordered {
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let pk_col = table_columns
            .iter()
            .find(|c| c.name == table.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: table.id.clone(),
                column: table.primary_key.clone(),
            })?;
        let pk_type = infer_pk_type(pk_col);

        let columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pk_type: (c.name == table.primary_key).then(|| pk_type.clone()),
                nullable: c.nullable,
                default: match &c.default {
                    Some(ColumnDefaultConfig::Literal(v)) => Some(v.clone()),
                    _ => None,
                },
                has_default: c.default.is_some(),
                unique: c.unique,
                pg_type: c.type_.name().to_lowercase(),
            })
            .collect();

        let mut unique = table.unique.clone();
        for c in table_columns.iter().filter(|c| c.unique) {
            let single = vec![c.name.clone()];
            if !unique.contains(&single) {
                unique.push(single);
            }
        }

        let soft_delete = table
            .soft_delete
            .as_ref()
            .map(|sd| resolve_soft_delete(table, table_columns, &sd.column))
            .transpose()?;

        let relationships = config
            .relationships
            .iter()
            .filter(|r| r.from_table_id == table.id)
            .map(resolve_relationship)
            .collect::<Result<Vec<_>, _>>()?;

        let api = api_by_table.get(table.id.as_str());
        entity_by_name.insert(table.id.clone(), entities.len());
        entities.push(ResolvedEntity {
            name: table.id.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            path_segment: api.map(|a| a.path_segment.clone()),
            namespace: api.and_then(|a| a.namespace.clone()),
            pk: table.primary_key.clone(),
            pk_type,
            columns,
            unique,
            soft_delete,
            relationships,
        });
    }

    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

/// The marker column's literal default is the live sentinel. A deleted row gets a flipped flag,
/// `1` for a `0` sentinel, or a timestamp, so the column type has to hold that value.
fn resolve_soft_delete(
    table: &TableConfig,
    table_columns: &[&ColumnConfig],
    column: &str,
) -> Result<SoftDelete, ConfigError> {
    let col = table_columns
        .iter()
        .find(|c| c.name == column)
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "soft delete column",
            id: format!("{}.{}", table.id, column),
        })?;
    let sentinel = match &col.default {
        None => Value::Null,
        Some(ColumnDefaultConfig::Literal(v)) => v.clone(),
        Some(ColumnDefaultConfig::Expression { expression }) => {
            return Err(ConfigError::Validation(format!(
                "soft delete column {}.{} needs a literal default, got expression '{}'",
                table.id, column, expression
            )))
        }
    };
    let pg_type = col.type_.name().to_lowercase();
    let fits = match &sentinel {
        Value::Bool(_) => matches!(pg_type.as_str(), "boolean" | "bool"),
        Value::Number(n) if n.as_i64() == Some(0) => is_integer_type(&pg_type),
        Value::Null | Value::String(_) => is_timestamp_or_text_type(&pg_type),
        _ => false,
    };
    if !fits {
        return Err(ConfigError::Validation(format!(
            "soft delete column {}.{} of type {} cannot take a deleted marker for sentinel {}",
            table.id, column, pg_type, sentinel
        )));
    }
    Ok(SoftDelete {
        column: column.to_string(),
        sentinel,
    })
}

fn is_integer_type(pg_type: &str) -> bool {
    matches!(
        pg_type,
        "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial" | "bigserial"
    )
}

fn is_timestamp_or_text_type(pg_type: &str) -> bool {
    pg_type.starts_with("timestamp")
        || matches!(pg_type, "text" | "varchar" | "character varying" | "char" | "character")
}

fn resolve_relationship(rel: &RelationshipConfig) -> Result<ResolvedRelationship, ConfigError> {
    let fk = || {
        rel.foreign_key.clone().ok_or_else(|| ConfigError::MissingReference {
            kind: "foreign key",
            id: rel.id.clone(),
        })
    };
    let association = match rel.kind.as_str() {
        "has_one" => Association::HasOne { foreign_key: fk()? },
        "belongs_to" => Association::BelongsTo { foreign_key: fk()? },
        "has_many" => Association::HasMany { foreign_key: fk()? },
        "many_to_many" => {
            let through = rel.through.as_ref().ok_or_else(|| ConfigError::MissingReference {
                kind: "through table",
                id: rel.id.clone(),
            })?;
            Association::ManyToMany {
                through: through.table_id.clone(),
                owner_key: through.owner_key.clone(),
                target_key: through.target_key.clone(),
            }
        }
        other => return Err(ConfigError::UnknownRelationshipKind(other.to_string())),
    };
    Ok(ResolvedRelationship {
        alias: rel.alias.clone(),
        owner: rel.from_table_id.clone(),
        target: rel.to_table_id.clone(),
        association,
    })
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col.type_.name().to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

/// Load full config from a directory of JSON documents. `api_entities.json` and `relationships.json` are optional.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    Ok(FullConfig {
        schemas: read_config_file(dir, "schemas.json", true).await?,
        tables: read_config_file(dir, "tables.json", true).await?,
        columns: read_config_file(dir, "columns.json", true).await?,
        relationships: read_config_file(dir, "relationships.json", false).await?,
        api_entities: read_config_file(dir, "api_entities.json", false).await?,
    })
}

async fn read_config_file<T>(dir: &Path, file: &str, required: bool) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let path = dir.join(file);
    tracing::debug!(path = %path.display(), "loading config");
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
