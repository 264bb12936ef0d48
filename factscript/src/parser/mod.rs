mod blocks;
pub mod error;
mod instruction;

use std::ops::Range;

pub use blocks::{Segment, extract};
pub use error::{ParseError, ParseErrorKind};

use crate::Template;
use crate::instruction::Instruction;
use crate::schema::MemorySchema;

/// Bounds shared by the parser and the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Maximum nesting of `writing`/`choice` bodies.
    pub max_depth: usize,
    /// Smallest accepted `sleep` duration, in seconds.
    pub min_sleep: f64,
    /// Largest accepted `sleep` duration, in seconds.
    pub max_sleep: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: 5,
            min_sleep: 0.25,
            max_sleep: 3600.0,
        }
    }
}

impl Limits {
    pub fn sleep_in_bounds(&self, seconds: f64) -> bool {
        seconds >= self.min_sleep && seconds <= self.max_sleep
    }
}

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    limits: Limits,
    schema: MemorySchema,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            limits: Limits::default(),
            schema: MemorySchema::initial(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Parse the template text into a complete instruction list.
    pub fn parse(&self) -> Result<Template, ParseError> {
        let ctx = ParseContext {
            file_id: self.file_id,
            limits: &self.limits,
            schema: &self.schema,
        };
        let instructions = ctx
            .template(&self.source, 0, &Nesting::default())
            .inspect_err(|e| {
                tracing::debug!(error_type = e.error_type(), error = %e, "template rejected")
            })?;
        tracing::debug!(
            instructions = instructions.len(),
            bytes = self.source.len(),
            "compiled template"
        );
        Ok(Template {
            instructions,
            source_id: self.file_id,
        })
    }
}

/// Where a nested parse sits relative to the template root.
#[derive(Debug, Clone, Default)]
struct Nesting {
    depth: usize,
    inside_writing: bool,
    /// Directive fragments that led here, outermost first.
    trail: Vec<String>,
}

struct ParseContext<'a> {
    file_id: usize,
    limits: &'a Limits,
    schema: &'a MemorySchema,
}

impl ParseContext<'_> {
    /// Compile template text: literal runs become `Build`, directive blocks are parsed.
    fn template(
        &self,
        text: &str,
        base: usize,
        nesting: &Nesting,
    ) -> Result<Vec<Instruction>, ParseError> {
        let mut instructions = Vec::new();
        for segment in blocks::extract(text, base, self.file_id)? {
            match segment {
                Segment::Literal(content) => instructions.push(Instruction::Build { content }),
                Segment::Directive { text, span } => {
                    instructions.extend(instruction::parse_block(self, &text, span.start, nesting)?);
                }
            }
        }
        Ok(instructions)
    }

    /// Step one level deeper, failing once the configured depth is exceeded.
    fn descend(
        &self,
        nesting: &Nesting,
        fragment: &str,
        span: Range<usize>,
        writing: bool,
    ) -> Result<Nesting, ParseError> {
        let mut trail = nesting.trail.clone();
        trail.push(fragment.to_string());
        let depth = nesting.depth + 1;
        if depth > self.limits.max_depth {
            return Err(ParseError::recursion_limit(
                depth,
                self.limits.max_depth,
                trail,
                span,
                self.file_id,
            ));
        }
        Ok(Nesting {
            depth,
            inside_writing: nesting.inside_writing || writing,
            trail,
        })
    }
}
