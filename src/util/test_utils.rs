use crate::{
    location::{Located, Location},
    util::{fmt::Show, intern::Interner},
};

pub fn loc(line: u32, col: u32) -> Location {
    Location::new(line, col)
}

pub fn format_errors<E>(i: &Interner, e: &[Located<E>]) -> Vec<String>
where
    Located<E>: Show,
{
    let ctx = crate::util::fmt::Context { names: i };
    e.iter().map(|e| format!("{:#}", e.display(&ctx))).collect()
}

#[track_caller]
pub fn assert_errors<E>(i: &Interner, actual: &[Located<E>], expected: &[&str])
where
    Located<E>: Show,
{
    let errors = format_errors(i, actual);
    ::pretty_assertions::assert_eq!(errors, expected);
}

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to tune it.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Asserts that `expected` appear, in order, among the trimmed lines of
/// `text`. Other lines may be interleaved.
#[track_caller]
pub fn assert_lines_in_order(text: &str, expected: &[&str]) {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut pos = 0;
    for want in expected {
        match lines[pos..].iter().position(|line| line == want) {
            Some(i) => pos += i + 1,
            None => panic!("missing `{want}` after line {pos} in:\n{text}"),
        }
    }
}
