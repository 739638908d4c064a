use std::collections::BTreeSet;

use log::debug;
use rand::{seq::index, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    errors::GenerationError,
    graph::JoinGraph,
    models::{
        catalog::{Column, ColumnRef, ForeignKeyEdge, Schema, Table},
        params::GenerationParameters,
    },
};

use super::{
    literal::literal_for,
    query::{Aggregate, AggregateFunction, CompareOp, Hint, Join, JoinStrategy, Predicate, Query},
};

/// Upper bound on plain projected columns.
const MAX_PROJECTED: usize = 4;
/// Upper bound on grouping columns next to aggregates.
const MAX_GROUPED: usize = 2;

fn pick<'v, T, R: Rng + ?Sized>(items: &'v [T], rng: &mut R) -> &'v T {
    &items[rng.random_range(0..items.len())]
}

/// Lazy, single-pass sequence of generated queries.
///
/// A single ChaCha8 stream seeded with `params.seed` drives every choice, and
/// all candidates are drawn from name-ordered lists, so identical inputs give
/// identical sequences. Yields nothing for a schema without tables.
pub struct QueryGenerator<'a> {
    schema: &'a Schema,
    graph: &'a JoinGraph,
    params: GenerationParameters,
    tables: Vec<&'a Table>,
    rng: ChaCha8Rng,
    emitted: usize,
}

/// Starts a generation run. Parameters are validated before anything is drawn.
pub fn generate<'a>(
    schema: &'a Schema,
    graph: &'a JoinGraph,
    params: GenerationParameters,
) -> Result<QueryGenerator<'a>, GenerationError> {
    QueryGenerator::new(schema, graph, params)
}

impl<'a> QueryGenerator<'a> {
    pub fn new(
        schema: &'a Schema,
        graph: &'a JoinGraph,
        params: GenerationParameters,
    ) -> Result<Self, GenerationError> {
        let params = params.validated()?;
        Ok(Self {
            schema,
            graph,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            params,
            tables: schema.tables.values().collect(),
            emitted: 0,
        })
    }

    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    fn remaining(&self) -> usize {
        if self.tables.is_empty() {
            0
        } else {
            self.params.num_queries - self.emitted
        }
    }

    fn next_query(&mut self) -> Query {
        let anchor = *pick(&self.tables, &mut self.rng);
        let mut in_query = vec![anchor];
        let joins = self.expand_joins(&mut in_query);

        let join_keys: BTreeSet<ColumnRef> = joins
            .iter()
            .flat_map(|j| [j.edge.from_ref(), j.edge.to_ref()])
            .collect();
        let columns: Vec<(&Table, &Column)> = in_query
            .iter()
            .flat_map(|t| t.columns.iter().map(move |c| (*t, c)))
            .collect();

        let predicates = self.predicates(&columns, &join_keys);
        let aggregates = self.aggregates(&columns);
        let projection = self.projection(&columns, !aggregates.is_empty());
        let group_by = if aggregates.is_empty() {
            Vec::new()
        } else {
            projection.clone()
        };

        let mut hints = Vec::new();
        if self.params.use_index_hints {
            self.index_hints(&in_query, &mut hints);
        }
        if self.params.use_physical_operator_hints {
            self.join_method_hint(&joins, &mut hints);
        }

        Query {
            namespace: anchor.namespace.clone(),
            from: anchor.name.clone(),
            joins,
            projection,
            aggregates,
            predicates,
            group_by,
            hints,
        }
    }

    /// Randomized breadth walk from the anchor: each step picks uniformly
    /// among all edges leaving the set of tables already in the query.
    fn expand_joins(&mut self, in_query: &mut Vec<&'a Table>) -> Vec<Join> {
        let (schema, graph) = (self.schema, self.graph);
        let reachable = graph.reachable_count(&in_query[0].name);
        let limit = self.params.max_joins.min(reachable.saturating_sub(1));

        let mut joins = Vec::with_capacity(limit);
        while joins.len() < limit {
            let frontier: Vec<(&ForeignKeyEdge, &str)> = in_query
                .iter()
                .flat_map(|t| {
                    graph
                        .neighbors(&t.name)
                        .into_iter()
                        .map(move |edge| (edge, edge.other_end(&t.name)))
                })
                .filter(|(_, next)| !in_query.iter().any(|t| t.name == *next))
                .collect();
            if frontier.is_empty() {
                break;
            }

            let (edge, next) = *pick(&frontier, &mut self.rng);
            let Some(table) = schema.table(next) else {
                break;
            };
            joins.push(Join {
                table: table.name.clone(),
                edge: edge.clone(),
            });
            in_query.push(table);
        }
        joins
    }

    fn predicates(
        &mut self,
        columns: &[(&Table, &Column)],
        join_keys: &BTreeSet<ColumnRef>,
    ) -> Vec<Predicate> {
        let count = self.rng.random_range(0..=self.params.max_predicates);
        let eligible: Vec<&(&Table, &Column)> = columns
            .iter()
            .filter(|(t, c)| {
                c.type_family().is_comparable()
                    && !join_keys.contains(&ColumnRef::new(&t.name, &c.name))
            })
            .collect();
        if eligible.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| {
                let (table, column) = **pick(&eligible, &mut self.rng);
                let op = *pick(CompareOp::for_family(column.type_family()), &mut self.rng);
                Predicate {
                    column: ColumnRef::new(&table.name, &column.name),
                    op,
                    value: literal_for(&mut self.rng, column, op),
                }
            })
            .collect()
    }

    fn aggregates(&mut self, columns: &[(&Table, &Column)]) -> Vec<Aggregate> {
        let count = self.rng.random_range(0..=self.params.max_aggregates);
        if columns.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| {
                let (table, column) = *pick(columns, &mut self.rng);
                let function =
                    *pick(AggregateFunction::for_family(column.type_family()), &mut self.rng);
                Aggregate {
                    function,
                    column: ColumnRef::new(&table.name, &column.name),
                }
            })
            .collect()
    }

    /// Projected columns keep query order. With aggregates present they are
    /// the grouping columns, so fewer are chosen and zero is allowed.
    fn projection(&mut self, columns: &[(&Table, &Column)], grouped: bool) -> Vec<ColumnRef> {
        let (min, cap) = if grouped { (0, MAX_GROUPED) } else { (1, MAX_PROJECTED) };
        let max = columns.len().min(cap);
        if max < min {
            return Vec::new();
        }

        let amount = self.rng.random_range(min..=max);
        let mut picked = index::sample(&mut self.rng, columns.len(), amount).into_vec();
        picked.sort_unstable();
        picked
            .into_iter()
            .map(|i| {
                let (table, column) = columns[i];
                ColumnRef::new(&table.name, &column.name)
            })
            .collect()
    }

    /// Both draws are taken for every table; forcing no index wins when both hit.
    fn index_hints(&mut self, in_query: &[&Table], hints: &mut Vec<Hint>) {
        for table in in_query {
            let use_index = self.rng.random_bool(self.params.index_hint_probability);
            let no_index = self.rng.random_bool(self.params.no_index_hint_probability);
            if no_index {
                hints.push(Hint::NoIndex {
                    table: table.name.clone(),
                });
            } else if use_index {
                let indexes = table.indexes();
                let unique: Vec<&str> = indexes.iter().filter(|(_, u)| *u).map(|(n, _)| *n).collect();
                let candidates: Vec<&str> = if unique.is_empty() {
                    indexes.iter().map(|(n, _)| *n).collect()
                } else {
                    unique
                };
                if !candidates.is_empty() {
                    let index = *pick(&candidates, &mut self.rng);
                    hints.push(Hint::UseIndex {
                        table: table.name.clone(),
                        index: index.to_string(),
                    });
                }
            }
        }
    }

    fn join_method_hint(&mut self, joins: &[Join], hints: &mut Vec<Hint>) {
        if joins.is_empty()
            || !self
                .rng
                .random_bool(self.params.physical_operator_hint_probability)
        {
            return;
        }
        let join = pick(joins, &mut self.rng);
        let strategy = *pick(&JoinStrategy::ALL, &mut self.rng);
        hints.push(Hint::JoinMethod {
            left: join.edge.from_table.clone(),
            right: join.edge.to_table.clone(),
            strategy,
        });
    }
}

impl Iterator for QueryGenerator<'_> {
    type Item = Query;

    fn next(&mut self) -> Option<Query> {
        if self.remaining() == 0 {
            return None;
        }
        let query = self.next_query();
        self.emitted += 1;
        debug!(
            "Generated query {} over {} table(s)",
            self.emitted,
            query.joins.len() + 1
        );
        Some(query)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for QueryGenerator<'_> {}
