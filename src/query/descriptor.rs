//! Neutral query representation handed from the compiler to the engine and the stores.

use serde_json::Value;

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl CompareOp {
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => CompareOp::Eq,
            "$ne" => CompareOp::Ne,
            "$gt" => CompareOp::Gt,
            "$gte" => CompareOp::Gte,
            "$lt" => CompareOp::Lt,
            "$lte" => CompareOp::Lte,
            "$like" => CompareOp::Like,
            _ => return None,
        })
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// Predicate tree. `And(vec![])` matches everything; `Or(vec![])` matches nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::all()
    }
}

impl Predicate {
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Predicate::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            negated: false,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::And(v) if v.is_empty())
    }

    /// Conjunction, flattening nested ANDs and dropping match-all operands.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut parts = Vec::new();
        for p in [self, other] {
            match p {
                Predicate::And(inner) => parts.extend(inner),
                p => parts.push(p),
            }
        }
        if parts.len() == 1 {
            parts.pop().unwrap_or_default()
        } else {
            Predicate::And(parts)
        }
    }

    /// Every field name the predicate references.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_fields(out);
                }
            }
            Predicate::Compare { field, .. } | Predicate::In { field, .. } => out.push(field),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// One `_include` entry: eager-load the relationship named `alias`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncludeSpec {
    pub alias: String,
    pub attributes: Option<Vec<String>>,
    pub where_: Option<Predicate>,
    /// Inner-join semantics when true. `None` means the association default (outer).
    pub required: Option<bool>,
    /// Filter on the join resource (many-to-many only).
    pub through: Option<Predicate>,
    pub include: Vec<IncludeSpec>,
}

impl IncludeSpec {
    pub fn alias(alias: impl Into<String>) -> Self {
        IncludeSpec {
            alias: alias.into(),
            ..Default::default()
        }
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryDescriptor {
    pub attributes: Option<Vec<String>>,
    pub where_: Predicate,
    pub order: Vec<OrderBy>,
    pub limit: u64,
    pub offset: u64,
    pub group: Option<Vec<String>>,
    pub having: Option<Predicate>,
    pub include: Vec<IncludeSpec>,
    pub through: Option<Predicate>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        QueryDescriptor {
            attributes: None,
            where_: Predicate::all(),
            order: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            group: None,
            having: None,
            include: Vec::new(),
            through: None,
        }
    }
}
