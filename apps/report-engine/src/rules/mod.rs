// Rule evaluation: one candidate against one user tag set.

pub mod evaluator;

pub use evaluator::{evaluate, EvalContext, Evaluation, RejectReason};
