pub mod instruction;
pub mod parser;
pub mod schema;

pub use instruction::{Instruction, InstructionKind, MentionPolicy, SleepTime, UserAttribute};
pub use parser::{Limits, ParseError, Parser};
pub use schema::{MemorySchema, ValueType};

/// A compiled fact template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Top-level instructions, in execution order.
    pub instructions: Vec<Instruction>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

/// Compile template text with the default limits.
pub fn compile(source: &str) -> Result<Template, ParseError> {
    Parser::new(source.to_string(), 0).parse()
}
