use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use factscript::{Limits, Parser};
use interpreter::DebugExecutor;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// RNG seed for the debug run. Falls back to `--seed`, then to entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Expected exact debug trace.
    #[serde(default)]
    pub expect_trace: Option<String>,

    /// Substrings that must all appear in the debug trace.
    #[serde(default)]
    pub expect_trace_contains: Vec<String>,

    /// If true, the test expects compilation to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// The error's Display string (parse or execution) must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,
}

/// Options shared by every test in a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub limits: Limits,
    pub seed: Option<u64>,
    pub no_color: bool,
}

/// Split a `.test.md` file into its TOML config and template text.
///
/// The template is everything after the closing delimiter, minus one
/// trailing newline.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..]; // skip \n---
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    let source = source
        .strip_suffix("\r\n")
        .or_else(|| source.strip_suffix('\n'))
        .unwrap_or(source);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(".test.md"))
                .unwrap_or("?")
        })
    }
}

fn expect_error_message(expected: &Option<String>, actual: &str) -> Option<String> {
    match expected {
        Some(expected) if !actual.contains(expected.as_str()) => Some(format!(
            "expected error containing \"{}\", got: {}",
            expected, actual
        )),
        _ => None,
    }
}

async fn run_single_test(path: &Path, options: RunOptions) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    // 2. Parse frontmatter
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();
    tracing::debug!(path = %path.display(), "running template test");

    // 3. Compile
    let parse_result = Parser::new(source.to_string(), 0)
        .with_limits(options.limits)
        .parse();

    if config.expect_parse_error {
        let reason = match parse_result {
            Err(e) => expect_error_message(&config.expect_error, &e.to_string()),
            Ok(_) => Some("expected parse error, but parsing succeeded".to_string()),
        };
        return match reason {
            Some(reason) => fail(description, reason),
            None => TestResult {
                path: path.to_path_buf(),
                description,
                outcome: TestOutcome::Pass,
            },
        };
    }

    let template = match parse_result {
        Ok(t) => t,
        Err(e) => return fail(description, format!("unexpected parse error: {}", e)),
    };

    // 4. Dry run
    let mut executor = DebugExecutor::debug().with_limits(options.limits);
    if let Some(seed) = config.seed.or(options.seed) {
        executor = executor.with_seed(seed);
    }
    let exec_result = executor.preview(&template.instructions).await;

    // 5. Check expectations
    let reason = match (&config.expect_error, exec_result) {
        (Some(_), Err(e)) => expect_error_message(&config.expect_error, &e.to_string()),
        (Some(expected), Ok(_)) => Some(format!(
            "expected error containing \"{}\", but execution succeeded",
            expected
        )),
        (None, Err(e)) => Some(format!("unexpected runtime error: {}", e)),
        (None, Ok(trace)) => check_trace(&config, &trace),
    };

    match reason {
        Some(reason) => fail(description, reason),
        None => TestResult {
            path: path.to_path_buf(),
            description,
            outcome: TestOutcome::Pass,
        },
    }
}

/// Compare a trace against the config. Returns `Some(reason)` on mismatch.
fn check_trace(config: &TestConfig, trace: &str) -> Option<String> {
    if let Some(expected) = &config.expect_trace {
        if trace != expected {
            return Some(format!(
                "trace mismatch\n  expected: {}\n  actual:   {}",
                expected, trace
            ));
        }
    }

    config
        .expect_trace_contains
        .iter()
        .find(|needle| !trace.contains(needle.as_str()))
        .map(|needle| format!("trace does not contain \"{}\"\n  actual: {}", needle, trace))
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
/// Returns a BTreeMap so categories are sorted alphabetically.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.md") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn paint(s: &str, code: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    }
}

/// Select the files to run, honoring category filters.
fn select_tests(path: &Path, categories: &[String]) -> BTreeMap<String, Vec<PathBuf>> {
    if path.is_file() {
        return BTreeMap::from([(String::new(), vec![path.to_path_buf()])]);
    }

    let all_categories = discover_categorized(path);
    if categories.is_empty() {
        return all_categories;
    }

    let mut filtered = BTreeMap::new();
    for requested in categories {
        let req = requested.trim_matches('/');
        let matching: Vec<_> = all_categories
            .iter()
            .filter(|(cat, _)| *cat == req || cat.starts_with(&format!("{}/", req)))
            .collect();
        if matching.is_empty() {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        for (cat, files) in matching {
            filtered.insert(cat.clone(), files.clone());
        }
    }
    filtered
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub async fn run_tests(path: &Path, options: RunOptions, categories: &[String]) -> i32 {
    let no_color = options.no_color;
    let selected = select_tests(path, categories);
    if selected.is_empty() {
        eprintln!("no matching .test.md files found in {}", path.display());
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", paint(header, "1", no_color));
        }

        for file in files {
            let result = run_single_test(file, options).await;
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            paint("ok", "32", no_color),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_case(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn options() -> RunOptions {
        RunOptions {
            no_color: true,
            ..RunOptions::default()
        }
    }

    #[test]
    fn frontmatter_and_template_are_split() {
        let (config, source) = parse_test_file(
            "---\ndescription = \"greeting\"\nseed = 3\nexpect_trace_contains = [\"Hi\"]\n---\nHi {user}\n",
        )
        .unwrap();
        assert_eq!(config.description.as_deref(), Some("greeting"));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.expect_trace_contains, vec!["Hi".to_string()]);
        assert_eq!(source, "Hi {user}");
    }

    #[test]
    fn missing_frontmatter_is_rejected() {
        assert!(parse_test_file("Hi {user}").is_err());
        assert!(parse_test_file("---\nseed = 1\nHi").is_err());
    }

    #[tokio::test]
    async fn passing_and_failing_cases() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write_case(
            dir.path(),
            "ok.test.md",
            "---\nexpect_trace = \"Hi user{PUSH;fresh=true,mention=none}\"\n---\nHi {user}\n",
        );
        let wrong = write_case(
            dir.path(),
            "wrong.test.md",
            "---\nexpect_trace = \"Hello\"\n---\nHi {user}\n",
        );

        assert!(matches!(
            run_single_test(&ok, options()).await.outcome,
            TestOutcome::Pass
        ));
        let TestOutcome::Fail(reason) = run_single_test(&wrong, options()).await.outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("trace mismatch"));
    }

    #[tokio::test]
    async fn expected_errors_are_matched() {
        let dir = tempfile::tempdir().unwrap();
        let parse = write_case(
            dir.path(),
            "parse.test.md",
            "---\nexpect_parse_error = true\nexpect_error = \"lower bound\"\n---\n{sleep(0.1)}\n",
        );
        let runtime = write_case(
            dir.path(),
            "runtime.test.md",
            "---\nexpect_error = \"PUSH\"\n---\n{push}\n",
        );

        assert!(matches!(
            run_single_test(&parse, options()).await.outcome,
            TestOutcome::Pass
        ));
        assert!(matches!(
            run_single_test(&runtime, options()).await.outcome,
            TestOutcome::Pass
        ));
    }

    #[tokio::test]
    async fn categories_follow_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("choice")).unwrap();
        write_case(
            dir.path(),
            "root.test.md",
            "---\ndescription = \"plain\"\n---\nplain\n",
        );
        write_case(
            &dir.path().join("choice"),
            "pick.test.md",
            "---\nseed = 1\n---\n{choice('a', 'b')}\n",
        );
        write_case(dir.path(), "notes.md", "ignored");

        let all = discover_categorized(dir.path());
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["", "choice"]);

        let only = select_tests(dir.path(), &["choice".to_string()]);
        assert_eq!(only.len(), 1);

        assert_eq!(run_tests(dir.path(), options(), &[]).await, 0);
    }
}
