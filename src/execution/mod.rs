// Trading engine, paper ledger and order execution
pub mod engine;
pub mod executor;
pub mod ledger;
pub mod runner;

pub use engine::{Engine, EngineConfig, EngineEvent, SkipReason, TickError, TickReport};
pub use executor::{ExecutionSink, MexcOrderSink, OrderConfirmation, OrderRequest, PaperSink};
pub use ledger::{ClosedTrade, Fill, LedgerError, LedgerState, Position};
pub use runner::{RunSummary, Runner, RunnerSettings, StepError};
