//! Executes compiled fact templates against a chat context.
//!
//! [`InstructionExecutor`] performs real sends, sleeps and composing spans;
//! [`DebugExecutor`] runs the same control flow but records an annotated
//! trace instead, which is what [`validate`] uses as a dry run.

pub mod context;
pub mod debug;
pub mod effects;
pub mod environment;
pub mod error;
pub mod executor;
pub mod runtime_value;
pub mod validate;

pub use context::{ChatContext, ComposingGuard, ContextError, ContextSnapshot, FactStore, Member};
pub use debug::{DebugEffects, DebugExecutor};
pub use effects::{Effects, LiveEffects};
pub use environment::{Scope, ScopeStack};
pub use error::{ExecutionError, RuntimeError, SchemaViolation};
pub use executor::{Carry, Executor, InstructionExecutor};
pub use runtime_value::RuntimeValue;
pub use validate::{ValidationError, validate};
