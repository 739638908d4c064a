use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::models::catalog::{ForeignKeyEdge, Schema};

/// Undirected adjacency over the tables of one [`Schema`], derived from its
/// resolvable foreign keys. Rebuilt whenever the schema is replaced.
///
/// Every table of the schema has an entry, and each entry's edges are kept in
/// sorted order so traversal is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinGraph {
    adjacency: BTreeMap<String, BTreeSet<ForeignKeyEdge>>,
}

impl JoinGraph {
    pub fn build(schema: &Schema) -> Self {
        let mut adjacency: BTreeMap<String, BTreeSet<ForeignKeyEdge>> = schema
            .tables
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        for edge in schema.foreign_key_edges() {
            if let Some(edges) = adjacency.get_mut(&edge.to_table) {
                edges.insert(edge.clone());
            }
            if let Some(edges) = adjacency.get_mut(&edge.from_table) {
                edges.insert(edge);
            }
        }

        Self { adjacency }
    }

    /// Edges incident on `table`, in sorted order. Unknown tables have none.
    pub fn neighbors(&self, table: &str) -> Vec<&ForeignKeyEdge> {
        self.adjacency
            .get(table)
            .map(|edges| edges.iter().collect())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of tables connected to `table`, including itself.
    pub fn reachable_count(&self, table: &str) -> usize {
        if !self.adjacency.contains_key(table) {
            return 0;
        }
        let mut seen = BTreeSet::from([table]);
        let mut queue = VecDeque::from([table]);
        while let Some(current) = queue.pop_front() {
            for edge in self.adjacency.get(current).into_iter().flatten() {
                let next = edge.other_end(current);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{Column, Table};
    use chrono::Utc;

    fn table(name: &str, fks: &[(&str, &str, &str)]) -> Table {
        let mut table = Table::new(name, "public");
        table.push_column(Column::new("id", "integer", 0));
        for (column, ref_table, ref_column) in fks {
            let mut col = Column::new(*column, "integer", 0);
            col.set_reference(ref_table, ref_column);
            table.push_column(col);
        }
        table
    }

    fn schema() -> Schema {
        Schema::analyzed(
            "test",
            vec![
                table("users", &[]),
                table("orders", &[("user_id", "users", "id")]),
                table(
                    "order_items",
                    &[("order_id", "orders", "id"), ("product_id", "products", "id")],
                ),
                table("employees", &[("manager_id", "employees", "id")]),
                table("audit_log", &[("actor_id", "ghosts", "id")]),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn test_edges_are_undirected() {
        let graph = JoinGraph::build(&schema());
        let users: Vec<_> = graph.neighbors("users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].from_table, "orders");
        assert_eq!(graph.neighbors("orders").len(), 2);
    }

    #[test]
    fn test_unresolvable_reference_adds_no_edge() {
        let graph = JoinGraph::build(&schema());
        assert!(graph.neighbors("audit_log").is_empty());
        assert_eq!(graph.neighbors("order_items").len(), 1);
        assert!(graph.neighbors("ghosts").is_empty());
    }

    #[test]
    fn test_edge_count_and_reachability() {
        let graph = JoinGraph::build(&schema());
        // orders->users, order_items->orders, employees->employees
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.reachable_count("users"), 3);
        assert_eq!(graph.reachable_count("order_items"), 3);
        assert_eq!(graph.reachable_count("employees"), 1);
        assert_eq!(graph.reachable_count("audit_log"), 1);
        assert_eq!(graph.reachable_count("missing"), 0);
    }

    #[test]
    fn test_empty_schema() {
        let graph = JoinGraph::build(&Schema::new("empty"));
        assert_eq!(graph.edge_count(), 0);
    }
}
