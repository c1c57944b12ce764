//! Config validation: referential integrity and identifier hygiene. Alias collisions are checked by the route planner.

use crate::config::FullConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub const RELATIONSHIP_KINDS: &[&str] = &["has_one", "belongs_to", "has_many", "many_to_many"];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Identifiers end up in SQL and in URL paths, so only plain names are accepted.
pub fn check_identifier(kind: &str, s: &str) -> Result<(), ConfigError> {
    if identifier_re().is_match(s) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("invalid {} identifier: '{}'", kind, s)))
    }
}

/// Default schema id when tables omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let columns_by_table: HashMap<&str, HashSet<&str>> =
        config.columns.iter().fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().insert(c.name.as_str());
            m
        });
    let has_column = |table: &str, col: &str| {
        columns_by_table
            .get(table)
            .map(|cols| cols.contains(col))
            .unwrap_or(false)
    };

    for s in &config.schemas {
        check_identifier("schema", &s.name)?;
    }

    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        check_identifier("column", &c.name)?;
    }

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        check_identifier("table", &t.name)?;
        if !has_column(&t.id, &t.primary_key) {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            });
        }
        for set in &t.unique {
            if set.is_empty() {
                return Err(ConfigError::Validation(format!("empty unique set on {}", t.id)));
            }
            if let Some(col) = set.iter().find(|c| !has_column(&t.id, c)) {
                return Err(ConfigError::MissingReference {
                    kind: "unique column",
                    id: format!("{}.{}", t.id, col),
                });
            }
        }
        if let Some(sd) = &t.soft_delete {
            if !has_column(&t.id, &sd.column) {
                return Err(ConfigError::MissingReference {
                    kind: "soft delete column",
                    id: format!("{}.{}", t.id, sd.column),
                });
            }
        }
    }

    for r in &config.relationships {
        if !table_ids.contains(r.from_table_id.as_str()) || !table_ids.contains(r.to_table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
        if !RELATIONSHIP_KINDS.contains(&r.kind.as_str()) {
            return Err(ConfigError::UnknownRelationshipKind(r.kind.clone()));
        }
        check_identifier("alias", &r.alias)?;
        let missing_fk = |table: &str| ConfigError::MissingReference {
            kind: "foreign key",
            id: format!("{}: {}.{}", r.id, table, r.foreign_key.as_deref().unwrap_or("?")),
        };
        match r.kind.as_str() {
            "has_one" | "has_many" => {
                let fk = r.foreign_key.as_deref().ok_or_else(|| missing_fk(&r.to_table_id))?;
                if !has_column(&r.to_table_id, fk) {
                    return Err(missing_fk(&r.to_table_id));
                }
            }
            "belongs_to" => {
                let fk = r.foreign_key.as_deref().ok_or_else(|| missing_fk(&r.from_table_id))?;
                if !has_column(&r.from_table_id, fk) {
                    return Err(missing_fk(&r.from_table_id));
                }
            }
            _ => {
                let through = r.through.as_ref().ok_or_else(|| {
                    ConfigError::Validation(format!("relationship {} requires a through table", r.id))
                })?;
                if !table_ids.contains(through.table_id.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "through table",
                        id: through.table_id.clone(),
                    });
                }
                for key in [&through.owner_key, &through.target_key] {
                    if !has_column(&through.table_id, key) {
                        return Err(ConfigError::MissingReference {
                            kind: "through key",
                            id: format!("{}.{}", through.table_id, key),
                        });
                    }
                }
            }
        }
    }

    let mut mounts = HashSet::new();
    let mut exposed = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !exposed.insert(api.entity_id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "table {} exposed more than once",
                api.entity_id
            )));
        }
        check_identifier("path segment", &api.path_segment)?;
        if let Some(ns) = &api.namespace {
            check_identifier("namespace", ns)?;
        }
        if !mounts.insert((api.namespace.as_deref(), api.path_segment.as_str())) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
    }

    Ok(())
}
