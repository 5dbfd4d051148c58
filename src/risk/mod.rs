// Risk management module
pub mod exit_rules;
pub mod sizing;

pub use exit_rules::{ExitReason, ExitRules};
pub use sizing::{desired_quantity, PositionSizer};
