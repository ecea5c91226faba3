use std::sync::LazyLock;

use regex::Regex;

use super::log_tail::clean_log;

/// Upper bound on failing test names kept in a summary
const MAX_FAILURE_NAMES: usize = 10;

/// Outcome counts parsed from a test runner's console output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
    /// Names of failing tests, in output order
    pub failures: Vec<String>,
}

impl TestSummary {
    // Counts come from untrusted output; sums clamp at u32::MAX
    fn counted(&self) -> u32 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.skipped)
    }
}

static CARGO_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"test result: (?:ok|FAILED)\. (\d+) passed; (\d+) failed; (\d+) ignored")
        .expect("cargo regex is valid")
});
static CARGO_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^---- (\S+) stdout ----").expect("cargo regex is valid"));

static JEST_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Tests:\s+(.*\d+ total)").expect("jest regex is valid"));
static JEST_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*● (.+›.+)$").expect("jest regex is valid"));

static PYTEST_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^=+ (.*\d+ (?:passed|failed|skipped|errors?).*) in [\d.]+s.*=+\s*$")
        .expect("pytest regex is valid")
});
static PYTEST_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^FAILED (\S+)").expect("pytest regex is valid"));

static JUNIT_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tests run: (\d+), Failures: (\d+), Errors: (\d+), Skipped: (\d+)")
        .expect("junit regex is valid")
});
static JUNIT_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\[ERROR\]\s+(\S+)\s+Time elapsed:.*<<< (?:FAILURE|ERROR)!")
        .expect("junit regex is valid")
});

static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) (passed|failed|skipped|todo|errors?|xfailed|xpassed|total)")
        .expect("count regex is valid")
});

/// Parses the summary printed by cargo, Jest, pytest or JUnit runners.
///
/// Returns `None` when the output holds no recognizable summary.
pub fn parse_test_summary(raw: &str) -> Option<TestSummary> {
    let text = clean_log(raw);

    parse_cargo(&text)
        .or_else(|| parse_jest(&text))
        .or_else(|| parse_pytest(&text))
        .or_else(|| parse_junit(&text))
}

fn number(capture: Option<regex::Match<'_>>) -> u32 {
    capture.and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

fn failure_names(text: &str, pattern: &Regex) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for capture in pattern.captures_iter(text) {
        let name = capture.get(1).map_or("", |m| m.as_str()).trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
        if names.len() == MAX_FAILURE_NAMES {
            break;
        }
    }
    names
}

// cargo prints one result line per test binary; they add up
fn parse_cargo(text: &str) -> Option<TestSummary> {
    let mut summary: Option<TestSummary> = None;

    for capture in CARGO_RESULT.captures_iter(text) {
        let entry = summary.get_or_insert_with(TestSummary::default);
        entry.passed = entry.passed.saturating_add(number(capture.get(1)));
        entry.failed = entry.failed.saturating_add(number(capture.get(2)));
        entry.skipped = entry.skipped.saturating_add(number(capture.get(3)));
    }

    summary.map(|mut summary| {
        summary.total = summary.counted();
        summary.failures = failure_names(text, &CARGO_FAILURE);
        summary
    })
}

/// Sums `<n> <outcome>` pairs such as `2 failed, 10 passed, 12 total`.
fn tally(counts: &str) -> TestSummary {
    let mut summary = TestSummary::default();
    let mut total = None;

    for capture in COUNT.captures_iter(counts) {
        let n = number(capture.get(1));
        match capture.get(2).map_or("", |m| m.as_str()) {
            "passed" | "xpassed" => summary.passed = summary.passed.saturating_add(n),
            "failed" | "error" | "errors" => summary.failed = summary.failed.saturating_add(n),
            "skipped" | "todo" | "xfailed" => summary.skipped = summary.skipped.saturating_add(n),
            "total" => total = Some(n),
            _ => {}
        }
    }

    summary.total = total.unwrap_or_else(|| summary.counted());
    summary
}

fn parse_jest(text: &str) -> Option<TestSummary> {
    let capture = JEST_RESULT.captures_iter(text).last()?;
    let mut summary = tally(capture.get(1)?.as_str());
    summary.failures = failure_names(text, &JEST_FAILURE);
    Some(summary)
}

fn parse_pytest(text: &str) -> Option<TestSummary> {
    let capture = PYTEST_RESULT.captures_iter(text).last()?;
    let mut summary = tally(capture.get(1)?.as_str());
    summary.failures = failure_names(text, &PYTEST_FAILURE);
    Some(summary)
}

// Maven prints per-class lines and then the aggregate; the last one wins
fn parse_junit(text: &str) -> Option<TestSummary> {
    let capture = JUNIT_RESULT.captures_iter(text).last()?;
    let total = number(capture.get(1));
    let failed = number(capture.get(2)).saturating_add(number(capture.get(3)));
    let skipped = number(capture.get(4));

    Some(TestSummary {
        passed: total.saturating_sub(failed.saturating_add(skipped)),
        failed,
        skipped,
        total,
        failures: failure_names(text, &JUNIT_FAILURE),
    })
}
