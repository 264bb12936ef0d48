use std::ops::Range;

use crate::instruction::{Instruction, MentionPolicy, SleepTime, UserAttribute};
use crate::parser::error::ParseError;
use crate::parser::{Nesting, ParseContext};
use crate::schema::{ValueType, is_identifier};

// ---------------------------------------------------------------------------
// Sub-instruction splitting
// ---------------------------------------------------------------------------

/// One `;`-separated piece of a directive block, trimmed.
#[derive(Debug, Clone)]
struct SubInstruction<'t> {
    text: &'t str,
    span: Range<usize>,
}

impl SubInstruction<'_> {
    fn error(&self, reason: impl Into<String>, file_id: usize) -> ParseError {
        ParseError::error(reason, self.text, self.span.clone(), file_id)
    }
}

fn sub_instruction(text: &str, start: usize, base: usize) -> Option<SubInstruction<'_>> {
    let trimmed_start = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let offset = base + start + trimmed_start;
    Some(SubInstruction {
        text: trimmed,
        span: offset..offset + trimmed.len(),
    })
}

/// Split a block on `;`, ignoring separators nested inside brackets or quotes.
fn split_sub_instructions<'t>(
    text: &'t str,
    base: usize,
    file_id: usize,
) -> Result<Vec<SubInstruction<'t>>, ParseError> {
    let mut parts = Vec::new();
    // Closers still expected, innermost last.
    let mut expected: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let mut chars = text.char_indices();

    while let Some((pos, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' if !expected.is_empty() => quote = Some(c),
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '(' => expected.push(')'),
            '}' | ']' | ')' => match expected.pop() {
                Some(closer) if closer == c => {}
                Some(closer) => {
                    return Err(ParseError::error(
                        format!("unexpected `{}`, expected `{}`", c, closer),
                        text,
                        base + pos..base + pos + 1,
                        file_id,
                    ));
                }
                None => {
                    return Err(ParseError::error(
                        format!("unexpected `{}` without a matching opening bracket", c),
                        text,
                        base + pos..base + pos + 1,
                        file_id,
                    ));
                }
            },
            ';' if expected.is_empty() => {
                parts.extend(sub_instruction(&text[start..pos], start, base));
                start = pos + 1;
            }
            _ => {}
        }
    }

    if let Some(q) = quote {
        return Err(ParseError::error(
            format!("unterminated string, expected closing `{}`", q),
            text,
            base..base + text.len(),
            file_id,
        ));
    }
    if !expected.is_empty() {
        let closers: Vec<String> = expected.iter().rev().map(|c| format!("`{}`", c)).collect();
        return Err(ParseError::error(
            format!("unbalanced brackets, expected {}", closers.join(", ")),
            text,
            base..base + text.len(),
            file_id,
        ));
    }

    parts.extend(sub_instruction(&text[start..], start, base));
    Ok(parts)
}

// ---------------------------------------------------------------------------
// Grammar recognition
// ---------------------------------------------------------------------------

/// Parse the inner text of one directive block into instructions.
pub(super) fn parse_block(
    ctx: &ParseContext<'_>,
    text: &str,
    base: usize,
    nesting: &Nesting,
) -> Result<Vec<Instruction>, ParseError> {
    let parts = split_sub_instructions(text, base, ctx.file_id)?;
    if parts.is_empty() {
        return Err(ParseError::error(
            "empty instruction block",
            format!("{{{}}}", text),
            base.saturating_sub(1)..base + text.len() + 1,
            ctx.file_id,
        ));
    }

    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(index, part)| recognize(ctx, part, index == last, nesting))
        .collect()
}

/// A `name(args)` call, with the byte offset of `args` within the source.
struct Call<'t> {
    name: &'t str,
    args: &'t str,
    args_base: usize,
}

fn call_form<'t>(part: &SubInstruction<'t>) -> Option<Call<'t>> {
    let open = part.text.find('(')?;
    let name = part.text[..open].trim_end();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    let args = part.text[open + 1..].strip_suffix(')')?;
    Some(Call {
        name,
        args,
        args_base: part.span.start + open + 1,
    })
}

fn recognize(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    is_last: bool,
    nesting: &Nesting,
) -> Result<Instruction, ParseError> {
    if let Some(call) = call_form(part) {
        match call.name {
            "sleep" => return parse_sleep(ctx, part, call.args),
            "push" => return parse_push(ctx, part, call.args),
            "writing" => return parse_writing(ctx, part, &call, nesting),
            "random" | "rand" => return parse_random(ctx, part, call.args),
            "tru" => return parse_random_user(ctx, part, call.args),
            "choice" => return parse_choice(ctx, part, &call, nesting),
            _ => {}
        }
    }

    // Argument-less shorthands.
    match part.text {
        "sleep" => return parse_sleep(ctx, part, ""),
        "push" => return parse_push(ctx, part, ""),
        _ => {}
    }

    parse_identifier(ctx, part, is_last)
}

fn parse_identifier(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    is_last: bool,
) -> Result<Instruction, ParseError> {
    let mut words = part.text.split_whitespace();
    let first = words.next().unwrap_or_default();

    if words.next().is_some() {
        if ctx.schema.contains(first) {
            return Err(part
                .error("BUILD instruction before end of block", ctx.file_id)
                .with_note("a block may end with at most one variable reference"));
        }
        return Err(part.error("unrecognized instruction", ctx.file_id));
    }

    if !is_identifier(first) {
        return Err(part.error("unrecognized instruction", ctx.file_id));
    }
    if !ctx.schema.contains(first) {
        return Err(part.error("unknown variable", ctx.file_id));
    }
    if !is_last {
        return Err(part
            .error("BUILD instruction before end of block", ctx.file_id)
            .with_note("move the variable reference to the end of the block"));
    }

    Ok(Instruction::BasicReplace {
        key: first.to_string(),
    })
}

/// `sleep(f?)`: seconds with at most two decimals, or an integer variable.
fn parse_sleep(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    args: &str,
) -> Result<Instruction, ParseError> {
    let args = args.trim();

    if is_identifier(args) {
        return match ctx.schema.get(args) {
            Some(ValueType::Integer) => Ok(Instruction::Sleep {
                time: SleepTime::Variable(args.to_string()),
            }),
            Some(other) => Err(part.error(
                format!("sleep variable `{}` must be an Integer, not {}", args, other),
                ctx.file_id,
            )),
            None => Err(part.error(format!("unknown variable `{}`", args), ctx.file_id)),
        };
    }

    let seconds = if args.is_empty() {
        1.0
    } else {
        if !is_short_decimal(args) {
            return Err(part.error(
                "sleep duration must be a number with at most 2 decimal places",
                ctx.file_id,
            ));
        }
        args.parse::<f64>()
            .map_err(|_| part.error("sleep duration is not a number", ctx.file_id))?
    };

    if seconds < ctx.limits.min_sleep {
        return Err(part.error(
            format!("sleep duration below lower bound of {}", ctx.limits.min_sleep),
            ctx.file_id,
        ));
    }
    if seconds > ctx.limits.max_sleep {
        return Err(part.error(
            format!("sleep duration exceeds upper bound of {}", ctx.limits.max_sleep),
            ctx.file_id,
        ));
    }

    Ok(Instruction::Sleep {
        time: SleepTime::Seconds(seconds),
    })
}

fn is_short_decimal(text: &str) -> bool {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    digits(whole) && fraction.is_none_or(|f| digits(f) && f.len() <= 2)
}

/// `push(n?)`: 0 = no mentions, 1 = author, 2 = everyone.
fn parse_push(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    args: &str,
) -> Result<Instruction, ParseError> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(Instruction::Push {
            mention: MentionPolicy::None,
        });
    }
    MentionPolicy::from_digit(args)
        .map(|mention| Instruction::Push { mention })
        .ok_or_else(|| {
            part.error(
                "push accepts 0 (none), 1 (author) or 2 (everyone)",
                ctx.file_id,
            )
        })
}

/// `writing(i*)`: a nested block run while the composing indicator is shown.
fn parse_writing(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    call: &Call<'_>,
    nesting: &Nesting,
) -> Result<Instruction, ParseError> {
    if nesting.inside_writing {
        return Err(part.error(
            "WRITING instruction cannot be used inside of a WRITING instruction",
            ctx.file_id,
        ));
    }
    if call.args.trim().is_empty() {
        return Err(part.error(
            "WRITING instruction requires at least one instruction",
            ctx.file_id,
        ));
    }

    let inner = ctx.descend(nesting, part.text, part.span.clone(), true)?;
    let instructions = parse_block(ctx, call.args, call.args_base, &inner)?;
    Ok(Instruction::Writing { instructions })
}

/// `random(a, b)` / `rand(a, b)`: two integers with `a < b`.
fn parse_random(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    args: &str,
) -> Result<Instruction, ParseError> {
    let bounds: Vec<&str> = args.split(',').map(str::trim).collect();
    let [left, right] = bounds.as_slice() else {
        return Err(part.error("random expects exactly 2 integer arguments", ctx.file_id));
    };
    let parse = |s: &str| {
        s.parse::<i64>()
            .map_err(|_| part.error(format!("`{}` is not an integer", s), ctx.file_id))
    };
    let lower = parse(left)?;
    let upper = parse(right)?;

    if lower > upper {
        return Err(part.error("left should not be greater than right", ctx.file_id));
    }
    if lower == upper {
        return Err(part.error("left should not be equal to right", ctx.file_id));
    }

    Ok(Instruction::RandomRange { lower, upper })
}

/// `tru(num[, attr])`: an attribute of a pseudo-random guild member.
fn parse_random_user(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    args: &str,
) -> Result<Instruction, ParseError> {
    let args: Vec<&str> = args.split(',').map(str::trim).collect();
    let (index, attribute) = match args.as_slice() {
        [index] => (*index, None),
        [index, attribute] => (*index, Some(*attribute)),
        _ => {
            return Err(part.error(
                "tru expects an index and an optional attribute",
                ctx.file_id,
            ));
        }
    };

    let index = index.parse::<usize>().map_err(|_| {
        part.error(
            format!("tru index `{}` must be a non-negative integer", index),
            ctx.file_id,
        )
    })?;

    let attribute = match attribute {
        None => UserAttribute::default(),
        Some(name) => UserAttribute::from_name(name).ok_or_else(|| {
            let allowed: Vec<&str> = UserAttribute::ALL.iter().map(|a| a.as_str()).collect();
            part.error(
                format!(
                    "unknown member attribute `{}`, expected one of: {}",
                    name,
                    allowed.join(", ")
                ),
                ctx.file_id,
            )
        })?,
    };

    Ok(Instruction::RandomUser { index, attribute })
}

/// `choice('a', 'b', ...)`: each option is itself a template.
fn parse_choice(
    ctx: &ParseContext<'_>,
    part: &SubInstruction<'_>,
    call: &Call<'_>,
    nesting: &Nesting,
) -> Result<Instruction, ParseError> {
    let options = split_options(call.args).map_err(|reason| part.error(reason, ctx.file_id))?;
    if options.len() < 2 {
        return Err(part.error(
            format!("too few options: choice requires at least 2, got {}", options.len()),
            ctx.file_id,
        ));
    }

    let inner = ctx.descend(nesting, part.text, part.span.clone(), false)?;
    let branches = options
        .iter()
        .map(|option| {
            ctx.template(&option.text, 0, &inner).map_err(|mut e| {
                let raw = option.raw_span(e.span.clone());
                e.span = call.args_base + raw.start..call.args_base + raw.end;
                e
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instruction::Choice { branches })
}

/// An unquoted choice option.
#[derive(Debug, Default)]
struct ChoiceOption {
    text: String,
    /// Offset in the raw arguments of every byte of `text`, then of the
    /// closing quote.
    raw_offsets: Vec<usize>,
}

impl ChoiceOption {
    fn push(&mut self, c: char, raw: usize) {
        self.text.push(c);
        self.raw_offsets.extend((0..c.len_utf8()).map(|byte| raw + byte));
    }

    /// Map a span in `text` back onto the raw arguments.
    fn raw_span(&self, span: Range<usize>) -> Range<usize> {
        let raw = |at: usize| {
            self.raw_offsets
                .get(at)
                .or(self.raw_offsets.last())
                .copied()
                .unwrap_or(at)
        };
        raw(span.start)..raw(span.end)
    }
}

/// Split quoted choice options.
///
/// `\q` (the option's own quote) and `\\` are unescaped; every other escape is
/// left for the option's template to resolve.
fn split_options(args: &str) -> Result<Vec<ChoiceOption>, String> {
    let mut options = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = args.char_indices().peekable();
    let mut expect_option = false;

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((_, c)) = chars.next() else {
            if expect_option {
                return Err("expected an option after `,`".into());
            }
            break;
        };

        if c != '\'' && c != '"' {
            return Err(format!("expected a quoted option, found `{}`", c));
        }
        let q = *quote.get_or_insert(c);
        if c != q {
            return Err(format!(
                "all options must use the same quote character ({})",
                q
            ));
        }

        let mut option = ChoiceOption::default();
        let mut closed = false;
        while let Some((at, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((next_at, next)) if next == q || next == '\\' => option.push(next, next_at),
                    Some((next_at, next)) => {
                        option.push('\\', at);
                        option.push(next, next_at);
                    }
                    None => option.push('\\', at),
                },
                _ if c == q => {
                    option.raw_offsets.push(at);
                    closed = true;
                    break;
                }
                _ => option.push(c, at),
            }
        }
        if !closed {
            return Err(format!("unterminated option, expected closing {}", q));
        }
        options.push(option);

        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some((_, ',')) => expect_option = true,
            Some((_, other)) => {
                return Err(format!("expected `,` between options, found `{}`", other));
            }
        }
    }

    Ok(options)
}
