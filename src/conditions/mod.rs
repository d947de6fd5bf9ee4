//! Skill activation conditions: a tiny infix language compiled into region filters,
//! deferred runtime predicates and sample policies.

pub mod operators;
pub mod parser;
pub mod policy;
pub mod resolver;
pub mod table;

use thiserror::Error;

use crate::race::InvariantError;

pub use operators::{ActivateBucket, Comparator, Operator, Predicate, RaceState, RuntimeValue};
pub use parser::{parse, tokenize, Token};
pub use policy::{Distribution, SamplePolicy};
pub use resolver::{resolve_skill, ResolveOptions};
pub use table::{Condition, ConditionContext, ConditionTable, Filtered};

/// Malformed condition text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty condition")]
    Empty,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("integer literal '{text}' at {pos} does not fit in i32")]
    IntegerOverflow { text: String, pos: usize },
    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },
}

/// Failures while compiling or evaluating a condition against a course and horse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown condition '{0}'")]
    UnknownCondition(String),
    #[error("condition '{condition}' does not support '{cmp}'")]
    UnsupportedComparator {
        condition: String,
        cmp: Comparator,
    },
    #[error("sample policies {left:?} and {right:?} cannot be combined")]
    IncompatiblePolicies {
        left: SamplePolicy,
        right: SamplePolicy,
    },
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
