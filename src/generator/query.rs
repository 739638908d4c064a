use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::catalog::{ColumnRef, ForeignKeyEdge, TypeFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
}

impl CompareOp {
    /// Operators that keep a comparison valid for the given column type.
    pub fn for_family(family: TypeFamily) -> &'static [CompareOp] {
        use CompareOp::*;
        match family {
            TypeFamily::Integer | TypeFamily::Decimal => &[Eq, Lt, Gt, Le, Ge, Ne],
            TypeFamily::Character => &[Eq, Ne, Like],
            TypeFamily::Boolean => &[Eq],
            TypeFamily::Date | TypeFamily::Timestamp | TypeFamily::Time => &[Eq, Lt, Gt],
            TypeFamily::Other => &[],
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// SUM/AVG need a numeric column, MIN/MAX an ordered one. COUNT takes anything.
    pub fn for_family(family: TypeFamily) -> &'static [AggregateFunction] {
        use AggregateFunction::*;
        if family.is_numeric() {
            &[Count, Sum, Avg, Min, Max]
        } else if family.is_ordered() {
            &[Count, Min, Max]
        } else {
            &[Count]
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: ColumnRef,
}

/// Equi-join of `table` on the foreign key pair of `edge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub edge: ForeignKeyEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStrategy {
    Hash,
    NestedLoop,
    Merge,
}

impl JoinStrategy {
    pub const ALL: [JoinStrategy; 3] = [JoinStrategy::Hash, JoinStrategy::NestedLoop, JoinStrategy::Merge];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Hint {
    UseIndex { table: String, index: String },
    NoIndex { table: String },
    JoinMethod {
        left: String,
        right: String,
        strategy: JoinStrategy,
    },
}

impl Hint {
    pub fn is_index_hint(&self) -> bool {
        matches!(self, Hint::UseIndex { .. } | Hint::NoIndex { .. })
    }
}

/// Dialect-independent form of one generated SELECT.
///
/// When `aggregates` is non-empty, `group_by` holds exactly the projected
/// columns. An empty projection with no aggregates selects every column.
/// Every table of the query lives in `namespace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub namespace: String,
    pub from: String,
    pub joins: Vec<Join>,
    pub projection: Vec<ColumnRef>,
    pub aggregates: Vec<Aggregate>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<ColumnRef>,
    pub hints: Vec<Hint>,
}

impl Query {
    /// Anchor first, then joined tables in join order.
    pub fn tables(&self) -> Vec<&str> {
        std::iter::once(self.from.as_str())
            .chain(self.joins.iter().map(|j| j.table.as_str()))
            .collect()
    }

    pub fn selects_all(&self) -> bool {
        self.projection.is_empty() && self.aggregates.is_empty()
    }

    pub fn hints_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Hint> + 'a {
        self.hints.iter().filter(move |h| match h {
            Hint::UseIndex { table: t, .. } | Hint::NoIndex { table: t } => t == table,
            Hint::JoinMethod { .. } => false,
        })
    }
}
