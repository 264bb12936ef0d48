use std::ops::Range;

use crate::parser::error::ParseError;

/// A piece of template text, as seen by the block extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text emitted as-is, with escapes already resolved.
    Literal(String),
    /// The inner text of a depth-0 `{...}` block, escapes kept verbatim.
    Directive { text: String, span: Range<usize> },
}

/// Split template text into literal runs and directive blocks.
///
/// `base` is the byte offset of `text` within the source file, so spans in
/// segments and errors always point into the full template source.
pub fn extract(text: &str, base: usize, file_id: usize) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut directive = String::new();
    let mut depth = 0usize;
    let mut opened_at = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .peek()
                    .map(|&(_, next)| next)
                    .filter(|next| matches!(next, '{' | '}' | 'n' | '\\'));
                match escaped {
                    Some(next) => {
                        chars.next();
                        if depth == 0 {
                            literal.push(if next == 'n' { '\n' } else { next });
                        } else {
                            // Nested templates resolve their own escapes.
                            directive.push('\\');
                            directive.push(next);
                        }
                    }
                    None if depth == 0 => literal.push('\\'),
                    None => directive.push('\\'),
                }
            }
            '{' => {
                if depth == 0 {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    opened_at = pos;
                } else {
                    directive.push('{');
                }
                depth += 1;
            }
            '}' => match depth {
                0 => {
                    return Err(ParseError::error(
                        "unmatched closing brace",
                        &text[..=pos],
                        base + pos..base + pos + 1,
                        file_id,
                    )
                    .with_note("use `\\}` for a literal closing brace"));
                }
                1 => {
                    depth = 0;
                    segments.push(Segment::Directive {
                        text: std::mem::take(&mut directive),
                        span: base + opened_at + 1..base + pos,
                    });
                }
                _ => {
                    depth -= 1;
                    directive.push('}');
                }
            },
            _ if depth == 0 => literal.push(c),
            _ => directive.push(c),
        }
    }

    if depth > 0 {
        return Err(ParseError::error(
            format!("unclosed directive block, expected {} more `}}`", depth),
            directive,
            base + opened_at..base + text.len(),
            file_id,
        )
        .with_note("use `\\{` for a literal opening brace"));
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}
