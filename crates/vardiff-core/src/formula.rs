//! Propositional formulas over feature literals.
//!
//! Formulas are built through smart constructors ([`Formula::not`],
//! [`Formula::and`], [`Formula::or`]) that fold constants and flatten nested
//! conjunctions and disjunctions. Structural equality is therefore only a cheap
//! approximation of logical equivalence; use a [`crate::oracle::SatOracle`]
//! for the real question.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A propositional formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Formula {
    /// Tautology.
    True,
    /// Contradiction.
    False,
    /// A feature literal.
    Var(String),
    /// Negation.
    Not(Box<Formula>),
    /// Conjunction of at least two operands.
    And(Vec<Formula>),
    /// Disjunction of at least two operands.
    Or(Vec<Formula>),
}

impl Formula {
    /// Creates a feature literal.
    pub fn var(name: impl Into<String>) -> Self {
        Formula::Var(name.into())
    }

    /// Negates `inner`, folding constants and double negation.
    pub fn not(inner: Formula) -> Self {
        match inner {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Not(x) => *x,
            other @ (Formula::Var(_) | Formula::And(_) | Formula::Or(_)) => {
                Formula::Not(Box::new(other))
            }
        }
    }

    /// Conjoins `operands`.
    ///
    /// `True` operands are dropped, any `False` operand makes the result
    /// `False`, nested conjunctions are flattened, and zero or one remaining
    /// operand collapses to `True` or that operand.
    pub fn and(operands: impl IntoIterator<Item = Formula>) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Formula::True => {}
                Formula::False => return Formula::False,
                Formula::And(inner) => flat.extend(inner),
                other @ (Formula::Var(_) | Formula::Not(_) | Formula::Or(_)) => flat.push(other),
            }
        }
        match flat.len() {
            0 => Formula::True,
            1 => flat.pop().unwrap_or(Formula::True),
            _ => Formula::And(flat),
        }
    }

    /// Disjoins `operands`. Dual of [`Formula::and`].
    pub fn or(operands: impl IntoIterator<Item = Formula>) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Formula::False => {}
                Formula::True => return Formula::True,
                Formula::Or(inner) => flat.extend(inner),
                other @ (Formula::Var(_) | Formula::Not(_) | Formula::And(_)) => flat.push(other),
            }
        }
        match flat.len() {
            0 => Formula::False,
            1 => flat.pop().unwrap_or(Formula::False),
            _ => Formula::Or(flat),
        }
    }

    /// Exclusive or of two formulas.
    pub fn xor(a: Formula, b: Formula) -> Self {
        Formula::or([
            Formula::and([a.clone(), Formula::not(b.clone())]),
            Formula::and([Formula::not(a), b]),
        ])
    }

    /// Returns the set of feature literals occurring in this formula.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(f) = stack.pop() {
            match f {
                Formula::True | Formula::False => {}
                Formula::Var(name) => {
                    out.insert(name.as_str());
                }
                Formula::Not(inner) => stack.push(inner),
                Formula::And(ops) | Formula::Or(ops) => stack.extend(ops.iter()),
            }
        }
        out
    }

    /// Evaluates the formula under the assignment `value_of`.
    pub fn eval<F: Fn(&str) -> bool>(&self, value_of: &F) -> bool {
        match self {
            Formula::True => true,
            Formula::False => false,
            Formula::Var(name) => value_of(name),
            Formula::Not(inner) => !inner.eval(value_of),
            Formula::And(ops) => ops.iter().all(|op| op.eval(value_of)),
            Formula::Or(ops) => ops.iter().any(|op| op.eval(value_of)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Formula::Or(_) => 1,
            Formula::And(_) => 2,
            Formula::True | Formula::False | Formula::Var(_) | Formula::Not(_) => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() <= parent {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Renders in C preprocessor syntax: `!`, `&&`, `||`, and parentheses.
/// Literals that are not plain identifiers are parenthesized.
impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::True => f.write_str("1"),
            Formula::False => f.write_str("0"),
            Formula::Var(name) => {
                if is_identifier(name) {
                    f.write_str(name)
                } else {
                    write!(f, "({name})")
                }
            }
            Formula::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f, 2)
            }
            Formula::And(ops) | Formula::Or(ops) => {
                let (sep, prec) = if matches!(self, Formula::And(_)) {
                    (" && ", 2)
                } else {
                    (" || ", 1)
                };
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    op.fmt_operand(f, prec)?;
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some(_) | None => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Formula {
        Formula::var(name)
    }

    #[test]
    fn and_folds_constants_and_flattens() {
        assert_eq!(Formula::and([]), Formula::True);
        assert_eq!(Formula::and([Formula::True, v("A")]), v("A"));
        assert_eq!(Formula::and([v("A"), Formula::False]), Formula::False);
        assert_eq!(
            Formula::and([Formula::and([v("A"), v("B")]), v("C")]),
            Formula::And(vec![v("A"), v("B"), v("C")])
        );
    }

    #[test]
    fn or_folds_constants() {
        assert_eq!(Formula::or([]), Formula::False);
        assert_eq!(Formula::or([Formula::True, v("A")]), Formula::True);
        assert_eq!(Formula::or([Formula::False, v("A")]), v("A"));
    }

    #[test]
    fn double_negation_cancels() {
        assert_eq!(Formula::not(Formula::not(v("A"))), v("A"));
        assert_eq!(Formula::not(Formula::True), Formula::False);
    }

    #[test]
    fn variables_are_collected() {
        let f = Formula::and([v("B"), Formula::not(Formula::or([v("A"), v("B")]))]);
        assert_eq!(f.variables().into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn eval_follows_assignment() {
        let f = Formula::and([v("A"), Formula::not(v("B"))]);
        assert!(f.eval(&|name: &str| name == "A"));
        assert!(!f.eval(&|_: &str| true));
    }

    #[test]
    fn display_uses_c_syntax() {
        let f = Formula::and([
            v("A"),
            Formula::or([v("B"), Formula::not(v("C"))]),
            v("X > 1"),
        ]);
        assert_eq!(f.to_string(), "A && (B || !C) && (X > 1)");
    }
}
