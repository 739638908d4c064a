use serde::{Deserialize, Serialize};

use crate::models::{catalog::ColumnRef, connections::DbType};

use super::query::{Hint, JoinStrategy, Literal, Query};

/// Target SQL flavour. Identifier quoting and hint syntax live here and
/// nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// Standard SQL. Has no hint syntax, so hints are dropped.
    Ansi,
    /// PostgreSQL with `pg_hint_plan` comment hints.
    Postgres,
    /// MySQL index hints and optimizer hint comments.
    MySql,
}

impl From<DbType> for Dialect {
    fn from(db_type: DbType) -> Self {
        match db_type {
            DbType::Postgres => Dialect::Postgres,
            DbType::MySql => Dialect::MySql,
            DbType::Sqlite => Dialect::Ansi,
        }
    }
}

impl Dialect {
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Ansi | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    fn column(self, col: &ColumnRef) -> String {
        format!("{}.{}", self.quote_ident(&col.table), self.quote_ident(&col.column))
    }

    fn literal(self, value: &Literal) -> String {
        match value {
            Literal::Integer(n) => n.to_string(),
            Literal::Decimal(d) => format!("{:.2}", d),
            Literal::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Boolean(true) => "TRUE".to_string(),
            Literal::Boolean(false) => "FALSE".to_string(),
            Literal::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
            Literal::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S")),
            Literal::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S")),
        }
    }

    /// Leading optimizer hint comment, if the dialect and query have one.
    fn hint_comment(self, query: &Query) -> Option<String> {
        let hints: Vec<String> = match self {
            Dialect::Ansi => Vec::new(),
            Dialect::Postgres => query
                .hints
                .iter()
                .map(|hint| match hint {
                    Hint::UseIndex { table, index } => format!(
                        "IndexScan({} {})",
                        self.quote_ident(table),
                        self.quote_ident(index)
                    ),
                    Hint::NoIndex { table } => format!("SeqScan({})", self.quote_ident(table)),
                    Hint::JoinMethod {
                        left,
                        right,
                        strategy,
                    } => {
                        let method = match strategy {
                            JoinStrategy::Hash => "HashJoin",
                            JoinStrategy::NestedLoop => "NestLoop",
                            JoinStrategy::Merge => "MergeJoin",
                        };
                        format!(
                            "{}({} {})",
                            method,
                            self.quote_ident(left),
                            self.quote_ident(right)
                        )
                    }
                })
                .collect(),
            // Index hints are rendered inline after the table reference.
            Dialect::MySql => query
                .hints
                .iter()
                .filter_map(|hint| match hint {
                    Hint::JoinMethod {
                        left,
                        right,
                        strategy,
                    } => {
                        // MySQL has no merge join.
                        let method = match strategy {
                            JoinStrategy::Hash => "HASH_JOIN",
                            JoinStrategy::NestedLoop | JoinStrategy::Merge => "NO_HASH_JOIN",
                        };
                        Some(format!(
                            "{}({}, {})",
                            method,
                            self.quote_ident(left),
                            self.quote_ident(right)
                        ))
                    }
                    _ => None,
                })
                .collect(),
        };
        (!hints.is_empty()).then(|| format!("/*+ {} */", hints.join(" ")))
    }

    /// Table reference for FROM/JOIN. MySQL names stay bare: the namespace is
    /// the connection's current database. Column references keep the bare
    /// table name, which the qualified reference exposes.
    fn table_ref(self, query: &Query, table: &str) -> String {
        let mut out = match self {
            Dialect::Ansi | Dialect::Postgres if !query.namespace.is_empty() => format!(
                "{}.{}",
                self.quote_ident(&query.namespace),
                self.quote_ident(table)
            ),
            _ => self.quote_ident(table),
        };
        if self == Dialect::MySql {
            for hint in query.hints_for(table) {
                match hint {
                    Hint::UseIndex { index, .. } => {
                        out.push_str(&format!(" USE INDEX ({})", self.quote_ident(index)));
                    }
                    // An empty index list tells MySQL to use no index at all.
                    Hint::NoIndex { .. } => out.push_str(" USE INDEX ()"),
                    Hint::JoinMethod { .. } => {}
                }
            }
        }
        out
    }

    pub fn render(self, query: &Query) -> String {
        let select_list = if query.selects_all() {
            "*".to_string()
        } else {
            query
                .projection
                .iter()
                .map(|c| self.column(c))
                .chain(query.aggregates.iter().map(|a| {
                    format!("{}({})", a.function.as_sql(), self.column(&a.column))
                }))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = String::new();
        let comment = self.hint_comment(query);
        match (self, &comment) {
            (Dialect::Postgres, Some(c)) => {
                sql.push_str(c);
                sql.push_str(" SELECT ");
            }
            (Dialect::MySql, Some(c)) => {
                sql.push_str("SELECT ");
                sql.push_str(c);
                sql.push(' ');
            }
            _ => sql.push_str("SELECT "),
        }
        sql.push_str(&select_list);
        sql.push_str(" FROM ");
        sql.push_str(&self.table_ref(query, &query.from));

        for join in &query.joins {
            sql.push_str(&format!(
                " JOIN {} ON {} = {}",
                self.table_ref(query, &join.table),
                self.column(&join.edge.from_ref()),
                self.column(&join.edge.to_ref())
            ));
        }

        if !query.predicates.is_empty() {
            let conditions: Vec<String> = query
                .predicates
                .iter()
                .map(|p| {
                    format!(
                        "{} {} {}",
                        self.column(&p.column),
                        p.op.as_sql(),
                        self.literal(&p.value)
                    )
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !query.group_by.is_empty() {
            let columns: Vec<String> = query.group_by.iter().map(|c| self.column(c)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }

        sql.push(';');
        sql
    }
}
