//! Resolved schema model: config validated and flattened for runtime use. Built once, read-only afterwards.

use serde_json::Value;
use std::collections::HashMap;

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pk_type: Option<PkType>,
    pub nullable: bool,
    /// Literal default applied by the in-memory store; expression defaults are left to the database.
    pub default: Option<Value>,
    /// Whether the column has any default (literal or DB expression).
    pub has_default: bool,
    pub unique: bool,
    /// Declared PostgreSQL type name (lowercase), used for parameter casts.
    pub pg_type: String,
}

/// Soft-delete marker: a row is live while `column` equals `sentinel`.
#[derive(Clone, Debug)]
pub struct SoftDelete {
    pub column: String,
    pub sentinel: Value,
}

impl SoftDelete {
    pub fn is_deleted(&self, row: &serde_json::Map<String, Value>) -> bool {
        row.get(&self.column).unwrap_or(&Value::Null) != &self.sentinel
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    /// No child id segment; at most one related row.
    Singular,
    /// Child id segment optional; many related rows.
    Plural,
}

/// How owner and target rows are joined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Association {
    /// target.foreign_key = owner.pk
    HasOne { foreign_key: String },
    /// owner.foreign_key = target.pk
    BelongsTo { foreign_key: String },
    /// target.foreign_key = owner.pk
    HasMany { foreign_key: String },
    /// through.owner_key = owner.pk, through.target_key = target.pk
    ManyToMany {
        through: String,
        owner_key: String,
        target_key: String,
    },
}

#[derive(Clone, Debug)]
pub struct ResolvedRelationship {
    pub alias: String,
    /// Entity name of the owner.
    pub owner: String,
    /// Entity name of the target.
    pub target: String,
    pub association: Association,
}

impl ResolvedRelationship {
    pub fn cardinality(&self) -> Cardinality {
        match self.association {
            Association::HasOne { .. } | Association::BelongsTo { .. } => Cardinality::OneToOne,
            Association::HasMany { .. } => Cardinality::OneToMany,
            Association::ManyToMany { .. } => Cardinality::ManyToMany,
        }
    }

    pub fn address_mode(&self) -> AddressMode {
        match self.cardinality() {
            Cardinality::OneToOne => AddressMode::Singular,
            Cardinality::OneToMany | Cardinality::ManyToMany => AddressMode::Plural,
        }
    }

    /// Join entity name for many-to-many relationships.
    pub fn through(&self) -> Option<&str> {
        match &self.association {
            Association::ManyToMany { through, .. } => Some(through.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    /// Unique resource name (the table config id).
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    /// Mount information; `None` for tables that are not exposed (e.g. join tables).
    pub path_segment: Option<String>,
    pub namespace: Option<String>,
    pub pk: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    /// Uniqueness constraints, each a column set. Includes single unique columns.
    pub unique: Vec<Vec<String>>,
    pub soft_delete: Option<SoftDelete>,
    /// Outgoing relationships in declaration order.
    pub relationships: Vec<ResolvedRelationship>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relationship(&self, alias: &str) -> Option<&ResolvedRelationship> {
        self.relationships.iter().find(|r| r.alias == alias)
    }

    pub fn is_exposed(&self) -> bool {
        self.path_segment.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    /// Exposed entities first in api declaration order, then unexposed tables.
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_name: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_by_name.get(name).map(|&i| &self.entities[i])
    }

    pub fn exposed(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.iter().filter(|e| e.is_exposed())
    }

    /// Target entity of a relationship. Resolution guarantees it exists.
    pub fn target_of(&self, rel: &ResolvedRelationship) -> Option<&ResolvedEntity> {
        self.entity(&rel.target)
    }
}
