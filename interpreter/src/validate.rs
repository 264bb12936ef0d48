use factscript::{Limits, ParseError, Parser, Template};
use thiserror::Error;

use crate::debug::DebugExecutor;
use crate::error::ExecutionError;

/// Which phase rejected a template.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("template does not compile: {0}")]
    Compile(#[from] ParseError),
    #[error("template fails a dry run: {0}")]
    Execution(#[from] ExecutionError),
}

impl ValidationError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidationError::Compile(e) => e.error_type(),
            ValidationError::Execution(e) => e.error_type(),
        }
    }
}

/// Compile `text` and dry-run it against the placeholder context.
///
/// A template must pass this before it is stored.
pub async fn validate(text: &str, limits: Limits) -> Result<Template, ValidationError> {
    let template = Parser::new(text.to_string(), 0)
        .with_limits(limits)
        .parse()?;
    DebugExecutor::debug()
        .with_limits(limits)
        .preview(&template.instructions)
        .await?;
    Ok(template)
}
