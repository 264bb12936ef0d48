use factscript::{Instruction, InstructionKind, ValueType};
use thiserror::Error;

use crate::context::ContextError;

/// Why a single instruction failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("PUSH instruction did not receive content to push")]
    EmptyPush,
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("malformed timing value: {0}")]
    InvalidSleep(String),
    #[error("guild has no members to pick from")]
    NoMembers,
    #[error("choice needs at least 2 branches, got {0}")]
    TooFewBranches(usize),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// The root scope did not match the memory schema.
///
/// This is an integration defect between the executor and its context
/// provider, never an authoring error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("initial memory is missing `{key}`")]
    Missing { key: String },
    #[error("initial memory contains `{key}`, which the schema does not declare")]
    Unexpected { key: String },
    #[error("initial memory has `{key}` of type {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        found: ValueType,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to execute instruction of type {kind} (index {index}) given options '{options}'")]
    Failure {
        index: usize,
        kind: InstructionKind,
        options: String,
        #[source]
        cause: RuntimeError,
    },
    #[error("maximum recursion depth of {limit} exceeded at depth {depth}")]
    RecursionLimitExceeded {
        /// The instruction list that would have run past the limit.
        pending: Vec<String>,
        depth: usize,
        limit: usize,
    },
    #[error("initial instruction memory failed validation: {0}")]
    SchemaViolation(#[from] SchemaViolation),
    #[error("initial instruction memory failed to build: {0}")]
    Setup(#[source] ContextError),
}

impl ExecutionError {
    pub fn failure(index: usize, instruction: &Instruction, cause: RuntimeError) -> Self {
        ExecutionError::Failure {
            index,
            kind: instruction.kind(),
            options: instruction.options(),
            cause,
        }
    }

    /// Name of the error class, as reported to the command layer.
    pub fn error_type(&self) -> &'static str {
        match self {
            ExecutionError::Failure { .. } => "ParsedExecutionFailure",
            ExecutionError::RecursionLimitExceeded { .. } => "ParsedExecutionRecursionDepthLimit",
            ExecutionError::SchemaViolation(_) | ExecutionError::Setup(_) => {
                "InstructionMemoryError"
            }
        }
    }

    /// Whether a template author can act on this error.
    pub fn is_user_facing(&self) -> bool {
        match self {
            ExecutionError::Failure { .. } | ExecutionError::RecursionLimitExceeded { .. } => true,
            ExecutionError::Setup(cause) => matches!(cause, ContextError::OutsideGuild),
            ExecutionError::SchemaViolation(_) => false,
        }
    }
}
