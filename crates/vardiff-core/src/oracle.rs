//! Satisfiability oracle seam.
//!
//! The core asks exactly one kind of question of a boolean engine: is this
//! formula satisfiable? Equivalence (`a xor b` unsatisfiable) and implication
//! (`a and not b` unsatisfiable) are derived from it. Callers plug an external
//! solver in through [`SatOracle`]; [`TruthTableOracle`] is the bundled,
//! bounded reference implementation.

use std::fmt;

use crate::formula::Formula;

/// Default bound on distinct feature literals for [`TruthTableOracle`].
pub const DEFAULT_MAX_VARIABLES: usize = 16;

/// The oracle could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The formula has more literals than the oracle is configured to handle.
    TooManyVariables {
        /// Literals in the query.
        found: usize,
        /// Configured bound.
        limit: usize,
    },
    /// An external engine reported a failure.
    Engine(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyVariables { found, limit } => write!(
                f,
                "formula has {found} feature literals, oracle limit is {limit}"
            ),
            Self::Engine(msg) => write!(f, "satisfiability engine failed: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

/// A boolean satisfiability engine.
///
/// Implementations must be safe to share between mining workers.
pub trait SatOracle: Send + Sync {
    /// Returns whether some assignment makes `formula` true.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the engine gives up.
    fn is_satisfiable(&self, formula: &Formula) -> Result<bool, OracleError>;

    /// Returns whether `a` and `b` are logically equivalent.
    ///
    /// # Errors
    ///
    /// Propagates [`SatOracle::is_satisfiable`] failures.
    fn equivalent(&self, a: &Formula, b: &Formula) -> Result<bool, OracleError> {
        if a == b {
            return Ok(true);
        }
        Ok(!self.is_satisfiable(&Formula::xor(a.clone(), b.clone()))?)
    }

    /// Returns whether every model of `a` is a model of `b`.
    ///
    /// # Errors
    ///
    /// Propagates [`SatOracle::is_satisfiable`] failures.
    fn implies(&self, a: &Formula, b: &Formula) -> Result<bool, OracleError> {
        if a == b {
            return Ok(true);
        }
        Ok(!self.is_satisfiable(&Formula::and([a.clone(), Formula::not(b.clone())]))?)
    }
}

/// Decides satisfiability by enumerating all assignments.
///
/// Exponential in the number of distinct literals, which is bounded by
/// `max_variables`; larger queries fail with
/// [`OracleError::TooManyVariables`] instead of running indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruthTableOracle {
    /// Largest number of distinct literals accepted.
    pub max_variables: usize,
}

impl Default for TruthTableOracle {
    fn default() -> Self {
        Self {
            max_variables: DEFAULT_MAX_VARIABLES,
        }
    }
}

impl SatOracle for TruthTableOracle {
    fn is_satisfiable(&self, formula: &Formula) -> Result<bool, OracleError> {
        let vars: Vec<&str> = formula.variables().into_iter().collect();
        // Shifts below need n < 64 regardless of the configured bound.
        if vars.len() > self.max_variables || vars.len() >= 64 {
            return Err(OracleError::TooManyVariables {
                found: vars.len(),
                limit: self.max_variables,
            });
        }
        let total: u64 = 1 << vars.len();
        for assignment in 0..total {
            let value_of = |name: &str| {
                vars.binary_search(&name)
                    .is_ok_and(|bit| assignment & (1 << bit) != 0)
            };
            if formula.eval(&value_of) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Formula {
        Formula::var(name)
    }

    #[test]
    fn constants() {
        let oracle = TruthTableOracle::default();
        assert_eq!(oracle.is_satisfiable(&Formula::True), Ok(true));
        assert_eq!(oracle.is_satisfiable(&Formula::False), Ok(false));
    }

    #[test]
    fn contradiction_is_unsatisfiable() {
        let oracle = TruthTableOracle::default();
        let f = Formula::and([v("A"), Formula::not(v("A"))]);
        assert_eq!(oracle.is_satisfiable(&f), Ok(false));
    }

    #[test]
    fn de_morgan_is_an_equivalence() {
        let oracle = TruthTableOracle::default();
        let lhs = Formula::not(Formula::and([v("A"), v("B")]));
        let rhs = Formula::or([Formula::not(v("A")), Formula::not(v("B"))]);
        assert_eq!(oracle.equivalent(&lhs, &rhs), Ok(true));
        assert_eq!(oracle.equivalent(&lhs, &v("A")), Ok(false));
    }

    #[test]
    fn implication_is_directional() {
        let oracle = TruthTableOracle::default();
        let ab = Formula::and([v("A"), v("B")]);
        assert_eq!(oracle.implies(&ab, &v("A")), Ok(true));
        assert_eq!(oracle.implies(&v("A"), &ab), Ok(false));
    }

    #[test]
    fn variable_bound_is_enforced() {
        let oracle = TruthTableOracle { max_variables: 2 };
        let f = Formula::and([v("A"), v("B"), v("C")]);
        assert_eq!(
            oracle.is_satisfiable(&f),
            Err(OracleError::TooManyVariables { found: 3, limit: 2 })
        );
    }
}
