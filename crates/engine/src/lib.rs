pub mod action_log;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod payments;
pub mod points;
pub mod scheduler;
pub mod seating;

pub use action_log::{ActionLog, ActionType, Actor};
pub use config::{DatabaseConfig, EngineConfig, PaymentRepeatPolicy, SweepIntervals};
pub use error::{LifecycleError, LifecycleResult, Outcome};
pub use lifecycle::LifecycleController;
