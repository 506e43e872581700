pub mod evaluator;
pub mod source;
pub mod thresholds;
