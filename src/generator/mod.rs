pub mod engine;
mod literal;
pub mod query;
pub mod render;

use serde::Serialize;

pub use engine::{generate, QueryGenerator};
pub use query::Query;
pub use render::Dialect;

/// A generated query together with its rendered text. `index` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedQuery {
    pub index: usize,
    pub sql: String,
    pub query: Query,
}

impl GeneratedQuery {
    pub fn new(index: usize, query: Query, dialect: Dialect) -> Self {
        Self {
            index,
            sql: dialect.render(&query),
            query,
        }
    }
}
