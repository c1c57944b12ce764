//! Route mounting planner: derives the ordered, immutable rule list from the resolved model.
//!
//! Order is resource declaration order, then relationship declaration order, then verb order
//! (get, post, put, del). `RouteTable::find` serves requests: the first rule whose verb and
//! pattern match wins.

use crate::config::{AddressMode, ResolvedEntity, ResolvedModel};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Segments used by the common routes; no resource, namespace or alias may take them.
pub const RESERVED_SEGMENTS: &[&str] = &["health", "ready", "version", "info"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Del,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Del];

    pub fn from_method(method: &str) -> Option<Verb> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Verb::Get),
            "POST" => Some(Verb::Post),
            "PUT" => Some(Verb::Put),
            "DELETE" => Some(Verb::Del),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Del => "DELETE",
        }
    }
}

/// Which part of `/{resource}[/:id][/{alias}[/:child_id]]` a rule covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathShape {
    Collection,
    Item,
    Related,
    RelatedItem,
}

impl PathShape {
    pub fn has_child_id(self) -> bool {
        self == PathShape::RelatedItem
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
    pub verb: Verb,
    /// axum path pattern, e.g. `/got/houses/:id/members/:child_id`.
    pub pattern: String,
    /// Entity name of the resource the path starts at.
    pub entity: String,
    pub relationship: Option<String>,
    pub shape: PathShape,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Linear first-match lookup over the ordered rules.
    pub fn find(&self, verb: Verb, path: &str) -> Option<&RouteRule> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        self.rules
            .iter()
            .filter(|r| r.verb == verb)
            .find(|rule| matches_pattern(&rule.pattern, &segments))
    }
}

fn matches_pattern(pattern: &str, segments: &[&str]) -> bool {
    let pattern: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    pattern.len() == segments.len()
        && pattern.iter().zip(segments).all(|(p, s)| match *p {
            ":id" | ":child_id" => !s.is_empty(),
            literal => literal == *s,
        })
}

fn base_path(entity: &ResolvedEntity, segment: &str) -> String {
    match &entity.namespace {
        Some(ns) => format!("/{}/{}", ns, segment),
        None => format!("/{}", segment),
    }
}

/// Mount policy for one verb: which shapes exist for the resource itself and for a relationship.
fn shapes_for(verb: Verb, mode: Option<AddressMode>) -> &'static [PathShape] {
    use PathShape::*;
    match (verb, mode) {
        (Verb::Get, None) => &[Collection, Item],
        (Verb::Post, None) => &[Collection],
        (Verb::Put, None) | (Verb::Del, None) => &[Item],
        (Verb::Post, Some(AddressMode::Singular)) => &[],
        (_, Some(AddressMode::Singular)) => &[Related],
        (Verb::Post, Some(AddressMode::Plural)) => &[Related],
        (_, Some(AddressMode::Plural)) => &[Related, RelatedItem],
    }
}

pub fn plan(model: &ResolvedModel) -> Result<RouteTable, ConfigError> {
    let root_segments: HashSet<&str> = model
        .exposed()
        .filter(|e| e.namespace.is_none())
        .filter_map(|e| e.path_segment.as_deref())
        .collect();

    let mut rules = Vec::new();
    for entity in model.exposed() {
        let Some(segment) = entity.path_segment.as_deref() else {
            continue;
        };
        let reserved = |s: &str| ConfigError::ReservedSegment {
            entity: entity.name.clone(),
            segment: s.to_string(),
        };
        if entity.namespace.is_none() && RESERVED_SEGMENTS.contains(&segment) {
            return Err(reserved(segment));
        }
        if let Some(ns) = entity.namespace.as_deref() {
            if RESERVED_SEGMENTS.contains(&ns) || root_segments.contains(ns) {
                return Err(reserved(ns));
            }
        }

        let base = base_path(entity, segment);
        for verb in Verb::ALL {
            for &shape in shapes_for(verb, None) {
                let pattern = match shape {
                    PathShape::Collection => base.clone(),
                    _ => format!("{}/:id", base),
                };
                rules.push(RouteRule {
                    verb,
                    pattern,
                    entity: entity.name.clone(),
                    relationship: None,
                    shape,
                });
            }
        }

        let mut aliases = HashSet::new();
        for rel in &entity.relationships {
            if !aliases.insert(rel.alias.as_str()) {
                return Err(ConfigError::DuplicateAlias {
                    entity: entity.name.clone(),
                    alias: rel.alias.clone(),
                });
            }
            if RESERVED_SEGMENTS.contains(&rel.alias.as_str()) {
                return Err(reserved(&rel.alias));
            }
            if model.target_of(rel).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "relationship target",
                    id: rel.target.clone(),
                });
            }
            if let Some(through) = rel.through() {
                if model.entity(through).is_none() {
                    return Err(ConfigError::MissingReference {
                        kind: "through table",
                        id: through.to_string(),
                    });
                }
            }
            let related = format!("{}/:id/{}", base, rel.alias);
            for verb in Verb::ALL {
                for &shape in shapes_for(verb, Some(rel.address_mode())) {
                    let pattern = match shape {
                        PathShape::RelatedItem => format!("{}/:child_id", related),
                        _ => related.clone(),
                    };
                    rules.push(RouteRule {
                        verb,
                        pattern,
                        entity: entity.name.clone(),
                        relationship: Some(rel.alias.clone()),
                        shape,
                    });
                }
            }
        }
    }

    tracing::info!(rules = rules.len(), "route plan built");
    Ok(RouteTable { rules })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use serde_json::json;

    fn config() -> FullConfig {
        FullConfig {
            schemas: serde_json::from_value(json!([{ "id": "main", "name": "public" }])).unwrap(),
            tables: serde_json::from_value(json!([
                { "id": "house", "name": "house", "primary_key": "id" },
                { "id": "character", "name": "character", "primary_key": "id" },
                { "id": "book", "name": "book", "primary_key": "id" },
                { "id": "character_book", "name": "character_book", "primary_key": "id" }
            ]))
            .unwrap(),
            columns: serde_json::from_value(json!([
                { "id": "h1", "table_id": "house", "name": "id", "type": "serial" },
                { "id": "c1", "table_id": "character", "name": "id", "type": "serial" },
                { "id": "c2", "table_id": "character", "name": "house_id", "type": "integer" },
                { "id": "b1", "table_id": "book", "name": "id", "type": "serial" },
                { "id": "j1", "table_id": "character_book", "name": "id", "type": "serial" },
                { "id": "j2", "table_id": "character_book", "name": "character_id", "type": "integer" },
                { "id": "j3", "table_id": "character_book", "name": "book_id", "type": "integer" }
            ]))
            .unwrap(),
            relationships: serde_json::from_value(json!([
                { "id": "r1", "from_table_id": "house", "to_table_id": "character",
                  "kind": "has_many", "alias": "members", "foreign_key": "house_id" },
                { "id": "r2", "from_table_id": "character", "to_table_id": "house",
                  "kind": "belongs_to", "alias": "house", "foreign_key": "house_id" },
                { "id": "r3", "from_table_id": "character", "to_table_id": "book",
                  "kind": "many_to_many", "alias": "books",
                  "through": { "table_id": "character_book", "owner_key": "character_id", "target_key": "book_id" } }
            ]))
            .unwrap(),
            api_entities: serde_json::from_value(json!([
                { "entity_id": "house", "path_segment": "house" },
                { "entity_id": "character", "path_segment": "characters", "namespace": "got" },
                { "entity_id": "book", "path_segment": "books" }
            ]))
            .unwrap(),
        }
    }

    fn summary(table: &RouteTable) -> Vec<String> {
        table
            .rules()
            .iter()
            .map(|r| format!("{} {}", r.verb.as_str(), r.pattern))
            .collect()
    }

    #[test]
    fn plan_follows_mount_policy_and_order() {
        let table = plan(&resolve(&config()).unwrap()).unwrap();
        let rules = summary(&table);
        assert_eq!(
            rules[..12],
            [
                "GET /house",
                "GET /house/:id",
                "POST /house",
                "PUT /house/:id",
                "DELETE /house/:id",
                "GET /house/:id/members",
                "GET /house/:id/members/:child_id",
                "POST /house/:id/members",
                "PUT /house/:id/members",
                "PUT /house/:id/members/:child_id",
                "DELETE /house/:id/members",
                "DELETE /house/:id/members/:child_id",
            ]
        );
        // Singular relationship: no POST, no child id.
        assert!(rules.contains(&"GET /got/characters/:id/house".to_string()));
        assert!(rules.contains(&"PUT /got/characters/:id/house".to_string()));
        assert!(rules.contains(&"DELETE /got/characters/:id/house".to_string()));
        assert!(!rules.iter().any(|r| r.starts_with("POST /got/characters/:id/house")));
        assert!(!rules.iter().any(|r| r.contains("/house/:child_id")));
        // Join table is not exposed.
        assert!(!rules.iter().any(|r| r.contains("character_book")));
        assert_eq!(table.len(), 12 + 5 + 3 + 7 + 5);
    }

    #[test]
    fn plan_is_deterministic() {
        let model = resolve(&config()).unwrap();
        assert_eq!(plan(&model).unwrap().rules(), plan(&model).unwrap().rules());
    }

    #[test]
    fn find_returns_first_matching_rule() {
        let table = plan(&resolve(&config()).unwrap()).unwrap();
        let rule = table.find(Verb::Put, "/house/1/members/7").unwrap();
        assert_eq!(rule.shape, PathShape::RelatedItem);
        assert_eq!(rule.relationship.as_deref(), Some("members"));

        let rule = table.find(Verb::Get, "/got/characters/3/books").unwrap();
        assert_eq!(rule.relationship.as_deref(), Some("books"));
        assert_eq!(table.find(Verb::Get, "/house/").unwrap().shape, PathShape::Collection);
        assert!(table.find(Verb::Post, "/got/characters/3/house").is_none());
        assert!(table.find(Verb::Put, "/house").is_none());
        assert!(table.find(Verb::Get, "/house//members").is_none());
    }

    #[test]
    fn find_prefers_the_earliest_rule() {
        let mut table = plan(&resolve(&config()).unwrap()).unwrap();
        let shadow = RouteRule {
            verb: Verb::Get,
            pattern: "/house/:id".into(),
            entity: "book".into(),
            relationship: None,
            shape: PathShape::Item,
        };
        table.rules.push(shadow);
        assert_eq!(table.find(Verb::Get, "/house/9").unwrap().entity, "house");
    }

    #[test]
    fn verbs_parse_from_methods() {
        assert_eq!(Verb::from_method("delete"), Some(Verb::Del));
        assert_eq!(Verb::from_method("GET"), Some(Verb::Get));
        assert_eq!(Verb::from_method("PATCH"), None);
    }

    #[test]
    fn duplicate_alias_is_a_plan_error() {
        let mut cfg = config();
        let mut dup = cfg.relationships[0].clone();
        dup.id = "r9".into();
        cfg.relationships.push(dup);
        let model = resolve(&cfg).unwrap();
        assert!(matches!(plan(&model), Err(ConfigError::DuplicateAlias { .. })));
    }

    #[test]
    fn reserved_segments_are_rejected() {
        let mut cfg = config();
        cfg.relationships[0].alias = "health".into();
        let model = resolve(&cfg).unwrap();
        assert!(matches!(plan(&model), Err(ConfigError::ReservedSegment { .. })));

        let mut cfg = config();
        cfg.api_entities[1].namespace = Some("house".into());
        let model = resolve(&cfg).unwrap();
        assert!(matches!(plan(&model), Err(ConfigError::ReservedSegment { .. })));
    }
}
