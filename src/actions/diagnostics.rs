use crate::pipeline::JobId;
use crate::render::blocks::{escape_mrkdwn, truncate_chars, Block, MAX_SECTION_TEXT};

use super::log_tail::log_tail;
use super::test_summary::TestSummary;

// Room left in a section for the heading and code fence
const LOG_HEADING_ALLOWANCE: usize = 120;

/// Section showing the tail of a job's output.
pub fn log_block(job_id: JobId, raw_log: &str, max_lines: usize) -> Block {
    let budget = MAX_SECTION_TEXT - LOG_HEADING_ALLOWANCE;
    let (tail, truncated) = log_tail(raw_log, max_lines, budget);

    let (body, cut) = fit_escaped(&tail, budget);

    let heading = if truncated || cut {
        format!("*:page_facing_up: Job #{job_id} log* (last lines)")
    } else {
        format!("*:page_facing_up: Job #{job_id} log*")
    };

    if tail.trim().is_empty() {
        return Block::section(&format!("{heading}\n_No output._"));
    }

    Block::section(&format!("{heading}\n```{body}```"))
}

// A stray fence in the log would end the code block early
fn escape_line(line: &str) -> String {
    escape_mrkdwn(line).replace("```", "'''")
}

/// Escapes `tail` and keeps as many trailing lines as fit in `budget`
/// characters. Cuts happen before escaping so no entity is split.
fn fit_escaped(tail: &str, budget: usize) -> (String, bool) {
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0;
    let mut cut = false;

    for line in tail.lines().rev() {
        let escaped = escape_line(line);
        let cost = escaped.chars().count() + usize::from(!kept.is_empty());
        if used + cost <= budget {
            used += cost;
            kept.push(escaped);
            continue;
        }

        cut = true;
        if kept.is_empty() {
            kept.push(line_end(line, budget));
        }
        break;
    }

    kept.reverse();
    (kept.join("\n"), cut)
}

/// Escaped end of a single line too long for `budget`.
fn line_end(line: &str, budget: usize) -> String {
    let mut used = 0;
    let mut start = line.len();
    for (index, c) in line.char_indices().rev() {
        let width = match c {
            '&' => "&amp;".len(),
            '<' | '>' => "&lt;".len(),
            _ => 1,
        };
        if used + width > budget {
            break;
        }
        used += width;
        start = index;
    }
    escape_line(&line[start..])
}

/// Section summarizing a test job's results, or saying none were found.
pub fn test_summary_block(job_name: &str, summary: Option<&TestSummary>) -> Block {
    let name = escape_mrkdwn(job_name);

    let Some(summary) = summary else {
        return Block::section(&format!(
            "*:test_tube: {name}*\n_No test results found in the job output._"
        ));
    };

    let emoji = if summary.failed > 0 { ":x:" } else { ":white_check_mark:" };
    let mut text = format!(
        "*:test_tube: {name}* {emoji}\n{} passed, {} failed, {} skipped ({} total)",
        summary.passed, summary.failed, summary.skipped, summary.total
    );

    if !summary.failures.is_empty() {
        text.push_str("\n*Failing tests:*");
        for failure in &summary.failures {
            text.push_str(&format!("\n• `{}`", escape_mrkdwn(failure)));
        }
    }

    Block::section(&truncate_chars(&text, MAX_SECTION_TEXT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::blocks::Text;

    fn section_text(block: &Block) -> &str {
        match block {
            Block::Section {
                text: Some(Text::Mrkdwn { text }),
                ..
            } => text,
            other => panic!("expected a mrkdwn section, got {other:?}"),
        }
    }

    #[test]
    fn log_block_wraps_tail_in_code_fence() {
        let block = log_block(7, "one\ntwo\nthree", 2);
        let text = section_text(&block);

        assert!(text.starts_with("*:page_facing_up: Job #7 log* (last lines)"));
        assert!(text.ends_with("```two\nthree```"));
    }

    #[test]
    fn log_block_neutralizes_fences_and_markup() {
        let block = log_block(7, "```<oops>```", 10);
        let text = section_text(&block);

        assert!(text.contains("'''&lt;oops&gt;'''"), "got {text}");
    }

    #[test]
    fn empty_log_says_so() {
        let block = log_block(7, "\n\n", 10);
        assert!(section_text(&block).contains("_No output._"));
    }

    #[test]
    fn long_logs_fit_in_a_section() {
        let raw = "<tag>\n".repeat(2000);
        let block = log_block(1, &raw, 10_000);

        assert!(section_text(&block).chars().count() <= MAX_SECTION_TEXT);
    }

    #[test]
    fn escaped_log_is_never_cut_inside_an_entity() {
        let raw = "&&&&&\n".repeat(1000);
        let text = section_text(&log_block(3, &raw, 1000)).to_string();

        assert!(text.chars().count() <= MAX_SECTION_TEXT);
        let body = text
            .split_once("```")
            .map(|(_, rest)| rest.trim_end_matches("```"))
            .unwrap();
        assert!(
            body.lines().all(|line| line == "&amp;&amp;&amp;&amp;&amp;"),
            "Every kept line must be whole, got {body}"
        );
    }

    #[test]
    fn single_long_line_keeps_whole_entities() {
        let raw = "<".repeat(MAX_SECTION_TEXT);
        let text = section_text(&log_block(3, &raw, 30)).to_string();

        assert!(text.chars().count() <= MAX_SECTION_TEXT);
        let body = text
            .split_once("```")
            .map(|(_, rest)| rest.trim_end_matches("```"))
            .unwrap();
        assert!(body.starts_with("&lt;"));
        assert_eq!(body.len() % "&lt;".len(), 0, "No partial entity at the cut");
    }

    #[test]
    fn summary_block_lists_failures() {
        let summary = TestSummary {
            passed: 8,
            failed: 2,
            skipped: 0,
            total: 10,
            failures: vec!["a::b".to_string(), "c::d".to_string()],
        };

        let block = test_summary_block("unit-tests", Some(&summary));
        let text = section_text(&block);

        assert!(text.contains("8 passed, 2 failed, 0 skipped (10 total)"));
        assert!(text.contains("• `a::b`"));
        assert!(text.contains("• `c::d`"));
    }

    #[test]
    fn missing_summary_renders_sentinel() {
        let block = test_summary_block("unit-tests", None);
        assert!(section_text(&block).contains("No test results found"));
    }
}
