//! Two-phase GSM/LSM operation engine: operation log, undo, reentrancy
//! by operation id (spec.md §4.E). The hardest subsystem — see
//! [`engine::OperationEngine`] for the do/undo state machine and
//! [`steps`] for the redesign of the source's virtual-dispatch operation
//! hierarchy into a plain step table (spec.md §9).

mod context;
mod engine;
mod error;
mod kinds;
mod state;
mod steps;

pub use context::{OperationContext, OperationSteps};
pub use engine::OperationEngine;
pub use error::OperationError;
pub use kinds::OperationCode;
pub use state::OperationState;
