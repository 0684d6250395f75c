use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::error::Error;

/// Request variables, keyed by name.
pub type Variables = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Query,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl Operation {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Query)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }
}

/// A validated request, ready to compile.
///
/// `selects` is a flat arena: a selection's id is its position, children and
/// parents refer to each other by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QCode {
    pub operation: Operation,
    pub selects: Vec<Select>,
    pub roots: Vec<usize>,
    /// Variable that carries the JSON payload of a mutation.
    #[serde(default)]
    pub action_var: Option<String>,
}

impl QCode {
    pub fn query(selects: Vec<Select>) -> Self {
        let roots = selects
            .iter()
            .filter(|sel| sel.parent_id.is_none())
            .map(|sel| sel.id)
            .collect();
        QCode {
            operation: Operation::Query,
            selects,
            roots,
            action_var: None,
        }
    }

    pub fn mutation(operation: Operation, action_var: &str, selects: Vec<Select>) -> Self {
        let mut qc = QCode::query(selects);
        qc.operation = operation;
        qc.action_var = Some(action_var.to_string());
        qc
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Select {
    pub id: usize,
    pub parent_id: Option<usize>,
    pub table: String,
    pub field_name: String,
    pub singular: bool,
    pub cols: Vec<Column>,
    pub children: Vec<usize>,
    pub filter: Option<Exp>,
    pub order_by: Vec<OrderBy>,
    pub distinct_on: Vec<String>,
    pub paging: Paging,
    /// Columns this selection may read or write. Empty means unrestricted.
    pub allowed: HashSet<String>,
    /// Column values forced on mutations.
    pub presets: Vec<Preset>,
    pub search: Option<String>,
}

impl Select {
    pub fn new(id: usize, table: &str) -> Self {
        Select {
            id,
            table: table.to_string(),
            field_name: table.to_string(),
            ..Select::default()
        }
    }

    pub fn is_allowed(&self, col: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field_name: String,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Column {
            name: name.to_string(),
            field_name: name.to_string(),
        }
    }

    pub fn aliased(name: &str, field_name: &str) -> Self {
        Column {
            name: name.to_string(),
            field_name: field_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub col: String,
    /// Literal value, or `$name` to read a variable at execution time.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub col: String,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl Order {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
            Order::AscNullsFirst => "ASC NULLS FIRST",
            Order::AscNullsLast => "ASC NULLS LAST",
            Order::DescNullsFirst => "DESC NULLS FIRST",
            Order::DescNullsLast => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingKind {
    #[default]
    Offset,
    Forward,
    Backward,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub no_limit: bool,
    pub kind: PagingKind,
    /// Opaque cursor value, the last primary key seen.
    pub cursor: Option<String>,
}

impl Paging {
    pub fn is_cursor(&self) -> bool {
        self.kind != PagingKind::Offset
    }
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exp {
    And(Vec<Exp>),
    Or(Vec<Exp>),
    Not(Box<Exp>),
    /// Always false. Blocks a statement while still producing valid SQL.
    False,
    Cond(Cond),
}

impl Exp {
    pub fn cond(col: &str, op: Op, val: Val) -> Exp {
        Exp::Cond(Cond {
            path: Vec::new(),
            col: col.to_string(),
            op,
            val,
        })
    }

    /// A condition on a related table, reached through `path`.
    pub fn nested(path: &[&str], col: &str, op: Op, val: Val) -> Exp {
        Exp::Cond(Cond {
            path: path.iter().map(|p| p.to_string()).collect(),
            col: col.to_string(),
            op,
            val,
        })
    }

    pub fn not(exp: Exp) -> Exp {
        Exp::Not(Box::new(exp))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Exp::Cond(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cond {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub col: String,
    pub op: Op,
    pub val: Val,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEquals,
    LesserThan,
    LesserOrEquals,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    Similar,
    NotSimilar,
    Contains,
    ContainedIn,
    HasKey,
    HasKeyAny,
    HasKeyAll,
    IsNull,
    EqualsId,
    TsQuery,
}

impl Op {
    pub fn code(&self) -> &'static str {
        match self {
            Op::Equals => "eq",
            Op::NotEquals => "neq",
            Op::GreaterThan => "gt",
            Op::GreaterOrEquals => "gte",
            Op::LesserThan => "lt",
            Op::LesserOrEquals => "lte",
            Op::In => "in",
            Op::NotIn => "nin",
            Op::Like => "like",
            Op::NotLike => "nlike",
            Op::ILike => "ilike",
            Op::NotILike => "nilike",
            Op::Similar => "similar",
            Op::NotSimilar => "nsimilar",
            Op::Contains => "contains",
            Op::ContainedIn => "contained_in",
            Op::HasKey => "has_key",
            Op::HasKeyAny => "has_key_any",
            Op::HasKeyAll => "has_key_all",
            Op::IsNull => "is_null",
            Op::EqualsId => "eq_id",
            Op::TsQuery => "tsquery",
        }
    }
}

impl FromStr for Op {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "eq" | "equals" => Op::Equals,
            "neq" | "not_equals" => Op::NotEquals,
            "gt" | "greater_than" => Op::GreaterThan,
            "gte" | "greater_or_equals" => Op::GreaterOrEquals,
            "lt" | "lesser_than" => Op::LesserThan,
            "lte" | "lesser_or_equals" => Op::LesserOrEquals,
            "in" => Op::In,
            "nin" | "not_in" => Op::NotIn,
            "like" => Op::Like,
            "nlike" | "not_like" => Op::NotLike,
            "ilike" => Op::ILike,
            "nilike" | "not_ilike" => Op::NotILike,
            "similar" => Op::Similar,
            "nsimilar" | "not_similar" => Op::NotSimilar,
            "contains" => Op::Contains,
            "contained_in" => Op::ContainedIn,
            "has_key" => Op::HasKey,
            "has_key_any" => Op::HasKeyAny,
            "has_key_all" => Op::HasKeyAll,
            "is_null" => Op::IsNull,
            "eq_id" => Op::EqualsId,
            "tsquery" => Op::TsQuery,
            _ => return Err(Error::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl TryFrom<String> for Op {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Op> for String {
    fn from(op: Op) -> String {
        op.code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Val {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Val>),
    /// Bound at compile time if a value is known, else left as a
    /// `{{name}}` placeholder.
    Var(String),
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}
