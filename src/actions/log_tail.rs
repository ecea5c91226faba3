use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI regex is valid"));

// GitLab collapsible-section markers, e.g. `section_start:1700000000:step_script[collapsed=true]`
static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"section_(?:start|end):\d+:[A-Za-z0-9_.\-]+(?:\[[^\]]*\])?\r?")
        .expect("section marker regex is valid")
});

/// Strips terminal escapes and CI section markers from raw job output.
///
/// Carriage-return progress output keeps only what the terminal would have
/// shown last on each line.
pub fn clean_log(raw: &str) -> String {
    let without_ansi = ANSI_ESCAPE.replace_all(raw, "");
    let without_sections = SECTION_MARKER.replace_all(&without_ansi, "");

    without_sections
        .lines()
        .map(|line| line.rsplit('\r').find(|part| !part.is_empty()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last `max_lines` lines of cleaned job output, capped at `max_chars`.
///
/// Returns the text and whether anything was cut.
pub fn log_tail(raw: &str, max_lines: usize, max_chars: usize) -> (String, bool) {
    let cleaned = clean_log(raw);
    let trimmed = cleaned.trim_end();
    let lines: Vec<&str> = trimmed.lines().collect();

    let mut truncated = lines.len() > max_lines;
    let mut text = lines[lines.len().saturating_sub(max_lines)..].join("\n");

    if text.chars().count() > max_chars {
        truncated = true;
        let skip = text.chars().count() - max_chars;
        text = text.chars().skip(skip).collect();
        // Drop the partial first line when a cleaner cut exists
        if let Some(newline) = text.find('\n') {
            text = text[newline + 1..].to_string();
        }
    }

    (text, truncated)
}
