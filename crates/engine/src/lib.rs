#![warn(clippy::unwrap_used)]

pub mod engine;
pub mod filter;
pub mod selector;

pub use engine::{DecisionEngine, DecisionOutcome};
pub use selector::Selector;
