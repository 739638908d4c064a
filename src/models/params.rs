use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Upper bound for `max_predicates` and `max_aggregates`.
pub const MAX_CLAUSES_PER_QUERY: usize = 64;

/// Shape bounds and randomization controls for one generation run.
///
/// Values are validated, per-query clause counts capped at
/// [`MAX_CLAUSES_PER_QUERY`] and probabilities clamped to `[0, 1]` by
/// [`GenerationParameters::validated`]; the engine calls it before any work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterInput")]
pub struct GenerationParameters {
    pub num_queries: usize,
    pub max_predicates: usize,
    pub max_aggregates: usize,
    pub max_joins: usize,
    pub seed: u64,
    pub use_index_hints: bool,
    pub index_hint_probability: f64,
    /// Probability of forcing no index. Sampled independently of
    /// `index_hint_probability`; wins when both draws succeed.
    pub no_index_hint_probability: f64,
    pub use_physical_operator_hints: bool,
    pub physical_operator_hint_probability: f64,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            num_queries: 10_000,
            max_predicates: 5,
            max_aggregates: 3,
            max_joins: 10,
            seed: 1,
            use_index_hints: true,
            index_hint_probability: 0.3,
            no_index_hint_probability: 0.2,
            use_physical_operator_hints: true,
            physical_operator_hint_probability: 0.25,
        }
    }
}

impl GenerationParameters {
    /// Parameters with every hint disabled, for plain workloads.
    pub fn plain(num_queries: usize, seed: u64) -> Self {
        Self {
            num_queries,
            seed,
            use_index_hints: false,
            use_physical_operator_hints: false,
            ..Self::default()
        }
    }

    pub fn validated(mut self) -> Result<Self, GenerationError> {
        if self.num_queries == 0 {
            return Err(GenerationError::InvalidParameters(
                "num_queries must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("max_predicates", self.max_predicates),
            ("max_aggregates", self.max_aggregates),
        ] {
            if value > MAX_CLAUSES_PER_QUERY {
                return Err(GenerationError::InvalidParameters(format!(
                    "{} must be at most {}",
                    name, MAX_CLAUSES_PER_QUERY
                )));
            }
        }
        for (name, p) in [
            ("index_hint_probability", &mut self.index_hint_probability),
            ("no_index_hint_probability", &mut self.no_index_hint_probability),
            (
                "physical_operator_hint_probability",
                &mut self.physical_operator_hint_probability,
            ),
        ] {
            if p.is_nan() {
                return Err(GenerationError::InvalidParameters(format!(
                    "{} is not a number",
                    name
                )));
            }
            *p = p.clamp(0.0, 1.0);
        }
        Ok(self)
    }
}

/// Wire form of [`GenerationParameters`]. Counts and seed are signed so that
/// negative values are reported as invalid parameters instead of parse errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParameterInput {
    pub num_queries: i64,
    pub max_predicates: i64,
    pub max_aggregates: i64,
    pub max_joins: i64,
    pub seed: i64,
    pub use_index_hints: bool,
    pub index_hint_probability: f64,
    pub no_index_hint_probability: f64,
    pub use_physical_operator_hints: bool,
    pub physical_operator_hint_probability: f64,
}

impl Default for ParameterInput {
    fn default() -> Self {
        let d = GenerationParameters::default();
        Self {
            num_queries: d.num_queries as i64,
            max_predicates: d.max_predicates as i64,
            max_aggregates: d.max_aggregates as i64,
            max_joins: d.max_joins as i64,
            seed: d.seed as i64,
            use_index_hints: d.use_index_hints,
            index_hint_probability: d.index_hint_probability,
            no_index_hint_probability: d.no_index_hint_probability,
            use_physical_operator_hints: d.use_physical_operator_hints,
            physical_operator_hint_probability: d.physical_operator_hint_probability,
        }
    }
}

fn non_negative(name: &str, value: i64) -> Result<usize, GenerationError> {
    usize::try_from(value)
        .map_err(|_| GenerationError::InvalidParameters(format!("{} must not be negative", name)))
}

impl TryFrom<ParameterInput> for GenerationParameters {
    type Error = GenerationError;

    fn try_from(input: ParameterInput) -> Result<Self, Self::Error> {
        let seed = u64::try_from(input.seed).map_err(|_| {
            GenerationError::InvalidParameters("seed must not be negative".to_string())
        })?;
        GenerationParameters {
            num_queries: non_negative("num_queries", input.num_queries)?,
            max_predicates: non_negative("max_predicates", input.max_predicates)?,
            max_aggregates: non_negative("max_aggregates", input.max_aggregates)?,
            max_joins: non_negative("max_joins", input.max_joins)?,
            seed,
            use_index_hints: input.use_index_hints,
            index_hint_probability: input.index_hint_probability,
            no_index_hint_probability: input.no_index_hint_probability,
            use_physical_operator_hints: input.use_physical_operator_hints,
            physical_operator_hint_probability: input.physical_operator_hint_probability,
        }
        .validated()
    }
}
