//! Verdict evaluation: predicates and the evaluator that applies them

pub mod evaluator;
pub mod predicate;

pub use evaluator::evaluate;
pub use predicate::{Check, CheckResult, CustomCheck, Marker, Predicate, PredicateFault};
