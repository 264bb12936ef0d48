use factscript::parser::{Segment, extract};
use factscript::{
    Instruction, Limits, MentionPolicy, ParseError, Parser, SleepTime, UserAttribute, compile,
};

fn parse(source: &str) -> Vec<Instruction> {
    compile(source).expect("parse failed").instructions
}

fn parse_err(source: &str) -> ParseError {
    compile(source).expect_err("expected a parse error")
}

fn build(content: &str) -> Instruction {
    Instruction::Build {
        content: content.to_string(),
    }
}

fn replace(key: &str) -> Instruction {
    Instruction::BasicReplace {
        key: key.to_string(),
    }
}

fn sleep(seconds: f64) -> Instruction {
    Instruction::Sleep {
        time: SleepTime::Seconds(seconds),
    }
}

fn reason_contains(source: &str, needle: &str) {
    let err = parse_err(source);
    assert!(
        err.reason().contains(needle),
        "{:?}: expected reason containing {:?}, got {:?}",
        source,
        needle,
        err.reason()
    );
}

/// `level` nested choices around a literal.
fn nest(level: usize) -> String {
    if level == 0 {
        "x".to_string()
    } else {
        let inner = nest(level - 1).replace('\\', "\\\\").replace('\'', "\\'");
        format!("{{choice('{}', 'y')}}", inner)
    }
}

// ---------------------------------------------------------------------------
// Block extraction
// ---------------------------------------------------------------------------

#[test]
fn literal_text_is_a_single_build() {
    assert_eq!(parse("Hello, world"), vec![build("Hello, world")]);
    assert_eq!(parse(""), vec![]);
}

#[test]
fn directives_split_literal_runs() {
    assert_eq!(
        parse("Hi {user.name}!"),
        vec![build("Hi "), replace("user.name"), build("!")]
    );
}

#[test]
fn escapes_resolve_outside_directives() {
    assert_eq!(
        parse("\\{literal\\}\\nnext \\\\ \\q"),
        vec![build("{literal}\nnext \\ \\q")]
    );
}

#[test]
fn extract_reports_directive_spans() {
    let segments = extract("ab{user}c", 10, 0).unwrap();
    assert_eq!(
        segments,
        vec![
            Segment::Literal("ab".to_string()),
            Segment::Directive {
                text: "user".to_string(),
                span: 13..17,
            },
            Segment::Literal("c".to_string()),
        ]
    );
}

#[test]
fn extract_keeps_escapes_inside_directives() {
    let segments = extract("{choice('\\{', 'b')}", 0, 0).unwrap();
    assert_eq!(
        segments,
        vec![Segment::Directive {
            text: "choice('\\{', 'b')".to_string(),
            span: 1..18,
        }]
    );
}

#[test]
fn unbalanced_braces_are_rejected() {
    reason_contains("oops}", "unmatched closing brace");
    reason_contains("{user", "unclosed directive block, expected 1 more `}`");
    reason_contains("{choice('{a', 'b')", "unclosed directive block");
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[test]
fn sleep_bounds_and_precision() {
    assert_eq!(parse("{sleep(5)}"), vec![sleep(5.0)]);
    assert_eq!(parse("{sleep(0.25)}"), vec![sleep(0.25)]);
    assert_eq!(parse("{sleep}"), vec![sleep(1.0)]);
    assert_eq!(parse("{sleep()}"), vec![sleep(1.0)]);
    assert_eq!(parse("{sleep(3600)}"), vec![sleep(3600.0)]);

    reason_contains("{sleep(0.1)}", "below lower bound of 0.25");
    reason_contains("{sleep(9999)}", "exceeds upper bound of 3600");
    reason_contains("{sleep(1.234)}", "at most 2 decimal places");
    reason_contains("{sleep(-1)}", "at most 2 decimal places");
    reason_contains("{sleep(soon)}", "unknown variable `soon`");
}

#[test]
fn sleep_accepts_integer_variables() {
    assert_eq!(
        parse("{sleep(guild.members)}"),
        vec![Instruction::Sleep {
            time: SleepTime::Variable("guild.members".to_string()),
        }]
    );
    reason_contains("{sleep(user.name)}", "must be an Integer");
}

#[test]
fn sleep_bounds_follow_limits() {
    let limits = Limits {
        min_sleep: 0.0,
        max_sleep: 10.0,
        ..Limits::default()
    };
    let parser = Parser::new("{sleep(0.1)}".to_string(), 0).with_limits(limits);
    assert_eq!(parser.parse().unwrap().instructions, vec![sleep(0.1)]);

    let parser = Parser::new("{sleep(11)}".to_string(), 0).with_limits(limits);
    assert!(parser.parse().is_err());
}

#[test]
fn push_mention_policies() {
    let push = |mention| Instruction::Push { mention };
    assert_eq!(
        parse("a{push}b{push(0)}c{push(1)}d{push(2)}"),
        vec![
            build("a"),
            push(MentionPolicy::None),
            build("b"),
            push(MentionPolicy::None),
            build("c"),
            push(MentionPolicy::Author),
            build("d"),
            push(MentionPolicy::Everyone),
        ]
    );
    reason_contains("{push(3)}", "push accepts 0 (none), 1 (author) or 2 (everyone)");
}

#[test]
fn semicolons_sequence_instructions() {
    assert_eq!(
        parse("{push; sleep(2) ;user}"),
        vec![
            Instruction::Push {
                mention: MentionPolicy::None
            },
            sleep(2.0),
            replace("user"),
        ]
    );
}

#[test]
fn writing_wraps_a_nested_block() {
    assert_eq!(
        parse("{writing(sleep(2);push(1);user)}"),
        vec![Instruction::Writing {
            instructions: vec![
                sleep(2.0),
                Instruction::Push {
                    mention: MentionPolicy::Author
                },
                replace("user"),
            ],
        }]
    );
    reason_contains(
        "{writing(writing(sleep))}",
        "WRITING instruction cannot be used inside of a WRITING instruction",
    );
    reason_contains(
        "{writing(choice('{writing(sleep)}', 'b'))}",
        "cannot be used inside of a WRITING instruction",
    );
    reason_contains("{writing()}", "requires at least one instruction");
}

#[test]
fn choice_compiles_each_option_as_a_template() {
    assert_eq!(
        parse("{choice('a', 'b {user}')}"),
        vec![Instruction::Choice {
            branches: vec![vec![build("a")], vec![build("b "), replace("user")]],
        }]
    );
    assert_eq!(
        parse("{choice(\"it's\", \"x\")}"),
        vec![Instruction::Choice {
            branches: vec![vec![build("it's")], vec![build("x")]],
        }]
    );
    assert_eq!(
        parse("{choice('don\\'t', 'a;b')}"),
        vec![Instruction::Choice {
            branches: vec![vec![build("don't")], vec![build("a;b")]],
        }]
    );
}

#[test]
fn choice_option_errors() {
    reason_contains("{choice('a')}", "too few options: choice requires at least 2, got 1");
    reason_contains("{choice()}", "got 0");
    reason_contains("{choice('a', \"b\")}", "same quote character");
    reason_contains("{choice(a, 'b')}", "expected a quoted option");
    reason_contains("{choice('a' 'b')}", "expected `,` between options");
    reason_contains("{choice('a',)}", "expected an option after `,`");
    reason_contains("{choice('a', '{nope}')}", "unknown variable");
}

#[test]
fn choice_nesting_is_bounded() {
    let ok = compile(&nest(5));
    assert!(ok.is_ok(), "depth 5 should compile: {:?}", ok.err());

    let err = parse_err(&nest(6));
    assert!(err.is_recursion_limit());
    assert_eq!(err.error_type(), "ParsedRecursionDepthLimit");
    assert!(err.reason().contains("maximum recursion depth of 5"));
}

#[test]
fn nesting_limit_is_configurable() {
    let limits = Limits {
        max_depth: 1,
        ..Limits::default()
    };
    let parser = Parser::new(nest(1), 0).with_limits(limits);
    assert!(parser.parse().is_ok());
    let parser = Parser::new(nest(2), 0).with_limits(limits);
    assert!(parser.parse().unwrap_err().is_recursion_limit());
}

#[test]
fn random_range_requires_ordered_integers() {
    assert_eq!(
        parse("{random(1, 5)}{rand(-3,3)}"),
        vec![
            Instruction::RandomRange { lower: 1, upper: 5 },
            Instruction::RandomRange {
                lower: -3,
                upper: 3
            },
        ]
    );
    reason_contains("{random(5, 1)}", "left should not be greater than right");
    reason_contains("{random(2, 2)}", "left should not be equal to right");
    reason_contains("{random(1)}", "exactly 2 integer arguments");
    reason_contains("{random(1, 2, 3)}", "exactly 2 integer arguments");
    reason_contains("{random(one, 2)}", "`one` is not an integer");
}

#[test]
fn random_user_attributes() {
    assert_eq!(
        parse("{tru(0)}{tru(3, account)}{tru(1,created_at)}"),
        vec![
            Instruction::RandomUser {
                index: 0,
                attribute: UserAttribute::Name
            },
            Instruction::RandomUser {
                index: 3,
                attribute: UserAttribute::Account
            },
            Instruction::RandomUser {
                index: 1,
                attribute: UserAttribute::CreatedAt
            },
        ]
    );
    reason_contains("{tru(-1)}", "must be a non-negative integer");
    reason_contains("{tru(0, nickname)}", "unknown member attribute `nickname`");
    reason_contains("{tru()}", "must be a non-negative integer");
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[test]
fn only_known_variables_are_replaced() {
    reason_contains("{user.nickname}", "unknown variable");
    reason_contains("{user..name}", "unrecognized instruction");
    reason_contains("{hello there}", "unrecognized instruction");
    reason_contains("{42}", "unrecognized instruction");
}

#[test]
fn variable_reference_must_end_the_block() {
    reason_contains("{user user}", "BUILD instruction before end of block");
    reason_contains("{user;push}", "BUILD instruction before end of block");
    assert_eq!(parse("{push;user}").len(), 2);
}

#[test]
fn bracket_errors_name_expected_closers() {
    reason_contains("{sleep(1}", "unbalanced brackets, expected `)`");
    reason_contains("{writing(sleep(1)}", "unbalanced brackets, expected `)`");
    reason_contains("{writing([sleep)}", "unexpected `)`, expected `]`");
    reason_contains("{push)}", "without a matching opening bracket");
    reason_contains("{choice('a, 'b')}", "unterminated string");
    reason_contains("{ ; }", "empty instruction block");
}

// ---------------------------------------------------------------------------
// Errors and determinism
// ---------------------------------------------------------------------------

#[test]
fn error_spans_point_into_the_source() {
    let source = "Hello {user.nickname}";
    let err = parse_err(source);
    assert_eq!(err.fragment, "user.nickname");
    assert_eq!(&source[err.span.clone()], "user.nickname");
    assert_eq!(err.error_type(), "InstructionParseError");

    let source = "{choice('ok', 'bad {random(3, 1)}')}";
    let err = parse_err(source);
    assert_eq!(&source[err.span.clone()], "random(3, 1)");
}

#[test]
fn error_spans_survive_escaped_quotes_in_options() {
    let source = r"{choice('\'ab{x}', 'b')}";
    let err = parse_err(source);
    assert_eq!(&source[err.span.clone()], "x");

    let source = r"{choice('é\\ \'{nope}', 'b')}";
    let err = parse_err(source);
    assert_eq!(&source[err.span.clone()], "nope");

    let source = r#"{choice("a", "\"{choice('x', 'y {random(9, 1)}')}")}"#;
    let err = parse_err(source);
    assert_eq!(&source[err.span.clone()], "random(9, 1)");
}

#[test]
fn diagnostics_carry_notes() {
    let err = parse_err("a}");
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.message, err.to_string());
    assert_eq!(diagnostic.notes, vec!["use `\\}` for a literal closing brace".to_string()]);

    let diagnostic = parse_err(&nest(6)).to_diagnostic();
    assert!(diagnostic.notes.iter().any(|note| note.starts_with("depth 0: choice(")));
}

#[test]
fn compilation_is_deterministic() {
    let source = "Hey {user}! {writing(sleep(1.5);push(1))}{choice('a {tru(2, id)}', 'b {random(1, 9)}')}\\n{push(2)}";
    assert_eq!(compile(source), compile(source));
}

#[test]
fn instructions_render_kind_and_options() {
    assert_eq!(build("hi").to_string(), "BUILD: content=\"hi\"");
    assert_eq!(sleep(2.5).to_string(), "SLEEP: time=2.5");
    assert_eq!(
        Instruction::RandomUser {
            index: 1,
            attribute: UserAttribute::MutualGuilds
        }
        .to_string(),
        "RANDOM_USER: index=1, attribute=mutual_guilds"
    );
}
