mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use factscript::{Limits, ParseError, Template};
use interpreter::{DebugExecutor, ExecutionError, ValidationError};

use crate::config::LimitsConfig;
use crate::test_runner::RunOptions;

#[derive(Parser)]
#[command(name = "facts", version, about = "Fact template compiler and previewer")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// TOML file overriding the default limits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for random choices, so previews are reproducible
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and dry-run a template (exit 0 if it may be stored)
    Check(TemplateArgs),

    /// Print the annotated debug trace of a template
    Preview(TemplateArgs),

    /// Dump the compiled instruction list
    Ast(TemplateArgs),

    /// Run .test.md test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Template file; `-` reads standard input
    file: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let limits = match LimitsConfig::load(cli.config.as_deref()) {
        Ok(config) => config.into_limits(),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Command::Check(args) => {
            let (files, source) = read_template(&args.file);
            match interpreter::validate(&source, limits).await {
                Ok(template) => {
                    eprintln!(
                        "ok: {} compiled to {} instruction(s)",
                        args.file,
                        template.instructions.len()
                    );
                }
                Err(ValidationError::Compile(e)) => {
                    emit_parse_error(color_choice, &files, &e);
                    process::exit(1);
                }
                Err(ValidationError::Execution(e)) => {
                    emit_execution_error(&e);
                    process::exit(1);
                }
            }
        }
        Command::Preview(args) => {
            let (files, source) = read_template(&args.file);
            let template = compile_or_exit(color_choice, &files, source, limits);
            let mut executor = DebugExecutor::debug().with_limits(limits);
            if let Some(seed) = cli.seed {
                executor = executor.with_seed(seed);
            }
            match executor.preview(&template.instructions).await {
                Ok(trace) => println!("{}", trace),
                Err(e) => {
                    emit_execution_error(&e);
                    process::exit(1);
                }
            }
        }
        Command::Ast(args) => {
            let (files, source) = read_template(&args.file);
            let template = compile_or_exit(color_choice, &files, source, limits);
            println!("{:#?}", template);
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let options = RunOptions {
                limits,
                seed: cli.seed,
                no_color: cli.no_color,
            };
            let exit_code = test_runner::run_tests(path, options, &test_args.category).await;
            process::exit(exit_code);
        }
    }
}

fn read_template(file: &str) -> (SimpleFiles<String, String>, String) {
    let source = if file == "-" {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(file)
    };
    let source = match source {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    files.add(file.to_string(), source.clone());
    (files, source)
}

fn compile_or_exit(
    color_choice: ColorChoice,
    files: &SimpleFiles<String, String>,
    source: String,
    limits: Limits,
) -> Template {
    match factscript::Parser::new(source, 0).with_limits(limits).parse() {
        Ok(template) => template,
        Err(e) => {
            emit_parse_error(color_choice, files, &e);
            process::exit(1);
        }
    }
}

fn emit_parse_error(color_choice: ColorChoice, files: &SimpleFiles<String, String>, error: &ParseError) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let diagnostic = error.to_diagnostic();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
}

fn emit_execution_error(error: &ExecutionError) {
    if error.is_user_facing() {
        eprintln!("runtime error: {}", error);
    } else {
        eprintln!("internal error ({}): {}", error.error_type(), error);
    }
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    if let ExecutionError::RecursionLimitExceeded { pending, .. } = error {
        for instruction in pending {
            eprintln!("  pending: {}", instruction);
        }
    }
}
