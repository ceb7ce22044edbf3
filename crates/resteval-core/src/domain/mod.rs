//! Engine-facing domain types: the error taxonomy and execution outcome.

pub mod error;
pub mod outcome;

pub use error::{EvalError, Result};
pub use outcome::ExecutionOutcome;
