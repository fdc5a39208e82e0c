pub mod cooldown;
pub mod evaluator;

pub use cooldown::{CooldownGate, DEFAULT_COOLDOWN_MINUTES};
pub use evaluator::{round_half_even, Comparison, ThresholdEvaluator, ThresholdRule, Thresholds};
