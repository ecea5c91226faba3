use std::collections::BTreeSet;

use super::blocks::{Block, Element, Text};
use super::*;
use crate::pipeline::fixtures::{job, snapshot};
use crate::pipeline::JobStatus;

fn expanded(stages: &[&str]) -> BTreeSet<String> {
    stages.iter().map(ToString::to_string).collect()
}

fn section_texts(rendered: &Rendered) -> Vec<String> {
    rendered
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Section {
                text: Some(Text::Mrkdwn { text }),
                ..
            } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn action_blocks(rendered: &Rendered) -> Vec<Vec<(String, Option<String>)>> {
    rendered
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Actions { elements } => Some(
                elements
                    .iter()
                    .map(|Element::Button(button)| (button.action_id.clone(), button.value.clone()))
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

fn context_texts(rendered: &Rendered) -> Vec<String> {
    rendered
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Context { elements } => Some(
                elements
                    .iter()
                    .map(|text| match text {
                        Text::Mrkdwn { text } | Text::PlainText { text, .. } => text.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        })
        .collect()
}

fn field_counts(rendered: &Rendered) -> Vec<usize> {
    rendered
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Section { fields, .. } if !fields.is_empty() => Some(fields.len()),
            _ => None,
        })
        .collect()
}

mod structure {
    use super::*;

    #[test]
    fn starts_with_header_and_context() {
        let rendered = render(&snapshot(1, &["build"], vec![]), &BTreeSet::new());

        assert!(matches!(&rendered.blocks[0], Block::Header { text: Text::PlainText { text, .. } } if text == "web-app"));
        let Block::Context { elements } = &rendered.blocks[1] else {
            panic!("second block should be the context line");
        };
        let context: Vec<String> = elements
            .iter()
            .map(|element| match element {
                Text::Mrkdwn { text } | Text::PlainText { text, .. } => text.clone(),
            })
            .collect();
        assert!(context.iter().any(|text| text.contains("`main`")));
        assert!(context.iter().any(|text| text.contains("|01234567>")));
        assert!(context.iter().any(|text| text.contains("Jane Doe")));
    }

    #[test]
    fn stages_follow_declared_order_not_job_order() {
        let snap = snapshot(
            1,
            &["build", "test", "deploy"],
            vec![
                job(3, "ship", "deploy", JobStatus::Created),
                job(2, "unit", "test", JobStatus::Running),
                job(1, "compile", "build", JobStatus::Success),
            ],
        );

        let lines = section_texts(&render(&snap, &BTreeSet::new()));
        let positions: Vec<usize> = ["*build*", "*test*", "*deploy*"]
            .iter()
            .map(|stage| lines.iter().position(|line| line.contains(stage)).unwrap())
            .collect();

        assert!(
            positions.windows(2).all(|pair| pair[0] < pair[1]),
            "Stage lines should follow the declared order, got {positions:?}"
        );
    }

    #[test]
    fn empty_stage_is_not_started_without_toggle() {
        let snap = snapshot(1, &["build", "deploy"], vec![job(1, "compile", "build", JobStatus::Success)]);
        let rendered = render(&snap, &BTreeSet::new());

        let deploy = rendered
            .blocks
            .iter()
            .find(|block| matches!(block, Block::Section { text: Some(Text::Mrkdwn { text }), .. } if text.contains("*deploy*")))
            .unwrap();

        assert!(matches!(deploy, Block::Section { accessory: None, .. }));
        assert!(section_texts(&rendered).iter().any(|line| line.contains(":white_circle: *deploy*  _not started_")));
    }

    #[test]
    fn toggle_reflects_expansion_state() {
        let snap = snapshot(
            5,
            &["build", "test"],
            vec![
                job(1, "compile", "build", JobStatus::Success),
                job(2, "lint", "test", JobStatus::Running),
            ],
        );

        let rendered = render(&snap, &expanded(&["test"]));
        let toggles: Vec<(String, String)> = rendered
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Section {
                    accessory: Some(Element::Button(button)),
                    ..
                } => Some((button.action_id.clone(), button.value.clone().unwrap())),
                _ => None,
            })
            .collect();

        assert_eq!(
            toggles,
            vec![
                ("show".to_string(), r#"{"pipeline_id":5,"stage":"build"}"#.to_string()),
                ("hide".to_string(), r#"{"pipeline_id":5,"stage":"test"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn ends_with_pipeline_link() {
        let rendered = render(&snapshot(77, &[], vec![]), &BTreeSet::new());

        let Some(Block::Actions { elements }) = rendered.blocks.last() else {
            panic!("last block should be the link actions block");
        };
        let Element::Button(button) = &elements[0];
        assert_eq!(button.action_id, "view_pipeline");
        assert_eq!(
            button.url.as_deref(),
            Some("https://gitlab.com/acme/web-app/-/pipelines/77")
        );
    }
}

mod expansion {
    use super::*;

    #[test]
    fn collapsed_stages_render_no_fields() {
        let builds = (0..23).map(|i| job(i, &format!("job-{i}"), "test", JobStatus::Success)).collect();
        let rendered = render(&snapshot(1, &["test"], builds), &BTreeSet::new());

        assert!(field_counts(&rendered).is_empty());
    }

    #[test]
    fn twenty_three_jobs_chunk_into_ten_ten_three() {
        let builds = (0..23).map(|i| job(i, &format!("job-{i}"), "test", JobStatus::Success)).collect();
        let rendered = render(&snapshot(1, &["test"], builds), &expanded(&["test"]));

        assert_eq!(field_counts(&rendered), vec![10, 10, 3]);
    }

    #[test]
    fn fields_link_each_job() {
        let snap = snapshot(1, &["build"], vec![job(42, "compile", "build", JobStatus::Failed)]);
        let rendered = render(&snap, &expanded(&["build"]));

        let field = rendered
            .blocks
            .iter()
            .find_map(|block| match block {
                Block::Section { fields, .. } if !fields.is_empty() => Some(fields[0].clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            field,
            Text::mrkdwn(":x: <https://gitlab.com/acme/web-app/-/jobs/42|compile>")
        );
    }

    #[test]
    fn expanding_unknown_stage_changes_nothing() {
        let snap = snapshot(1, &["build"], vec![job(1, "compile", "build", JobStatus::Success)]);

        assert_eq!(render(&snap, &BTreeSet::new()), render(&snap, &expanded(&["ghost"])));
    }
}

mod diagnostics {
    use super::*;

    #[test]
    fn failed_jobs_get_log_controls_in_batches_of_five() {
        let builds = (1..=7).map(|i| job(i, &format!("build-{i}"), "build", JobStatus::Failed)).collect();
        let rendered = render(&snapshot(1, &["build"], builds), &BTreeSet::new());

        let actions = action_blocks(&rendered);
        // two diagnostic blocks plus the pipeline link
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].len(), 5);
        assert_eq!(actions[1].len(), 2);
        assert_eq!(actions[0][0], ("show_log".to_string(), Some("1".to_string())));
        assert_eq!(actions[1][1], ("show_log".to_string(), Some("7".to_string())));
    }

    #[test]
    fn test_jobs_get_summary_controls() {
        let snap = snapshot(
            1,
            &["test"],
            vec![
                job(1, "unit-tests", "test", JobStatus::Failed),
                job(2, "e2e-suite", "test", JobStatus::Success),
                job(3, "integration", "test", JobStatus::Running),
                job(4, "lint", "test", JobStatus::Success),
            ],
        );

        let actions = action_blocks(&render(&snap, &BTreeSet::new()));

        assert_eq!(
            actions[0],
            vec![
                ("show_log".to_string(), Some("1".to_string())),
                (
                    "show_test_summary".to_string(),
                    Some(r#"{"job_id":1,"job_name":"unit-tests"}"#.to_string())
                ),
                (
                    "show_test_summary".to_string(),
                    Some(r#"{"job_id":2,"job_name":"e2e-suite"}"#.to_string())
                ),
            ],
            "Running test jobs and non-test jobs get no diagnostic controls"
        );
    }

    #[test]
    fn no_diagnostics_section_when_nothing_to_diagnose() {
        let snap = snapshot(1, &["build"], vec![job(1, "compile", "build", JobStatus::Success)]);
        let rendered = render(&snap, &BTreeSet::new());

        assert_eq!(action_blocks(&rendered).len(), 1);
        assert!(!section_texts(&rendered).iter().any(|line| line.contains("Diagnostics")));
    }

    #[test]
    fn failed_jobs_follow_stage_order() {
        let snap = snapshot(
            1,
            &["build", "test"],
            vec![
                job(20, "unit", "test", JobStatus::Failed),
                job(10, "compile", "build", JobStatus::Failed),
            ],
        );

        let actions = action_blocks(&render(&snap, &BTreeSet::new()));
        assert_eq!(actions[0][0].1.as_deref(), Some("10"));
    }
}

mod block_limit {
    use super::*;

    #[test]
    fn excess_diagnostic_controls_are_counted_not_rendered() {
        let builds = (1..=120)
            .map(|i| job(i, &format!("unit-tests-{i}"), "test", JobStatus::Failed))
            .collect();
        let rendered = render(&snapshot(1, &["test"], builds), &BTreeSet::new());

        assert_eq!(rendered.blocks.len(), MAX_BLOCKS);
        assert!(
            context_texts(&rendered).contains(&"_+30 more diagnostics not shown_".to_string()),
            "Got {:?}",
            context_texts(&rendered)
        );

        let actions = action_blocks(&rendered);
        assert_eq!(actions.last().unwrap()[0].0, "view_pipeline", "Pipeline link stays last");
        let shown: usize = actions[..actions.len() - 1].iter().map(Vec::len).sum();
        assert_eq!(shown, 210);
    }

    #[test]
    fn excess_stages_and_fields_are_counted_not_rendered() {
        let names: Vec<String> = (1..=60).map(|i| format!("stage-{i}")).collect();
        let stages: Vec<&str> = names.iter().map(String::as_str).collect();
        let builds = stages
            .iter()
            .zip(1..)
            .map(|(stage, id)| job(id, &format!("compile-{id}"), stage, JobStatus::Success))
            .collect();

        let rendered = render(&snapshot(1, &stages, builds), &expanded(&stages));

        assert_eq!(rendered.blocks.len(), MAX_BLOCKS);
        assert_eq!(
            context_texts(&rendered).last().map(String::as_str),
            Some("_+37 more stages, +1 more job not shown_")
        );
        assert!(matches!(rendered.blocks.last(), Some(Block::Actions { .. })));
    }

    #[test]
    fn small_pipelines_have_no_overflow_line() {
        let builds = (1..=7).map(|i| job(i, &format!("build-{i}"), "build", JobStatus::Failed)).collect();
        let rendered = render(&snapshot(1, &["build"], builds), &expanded(&["build"]));

        assert_eq!(context_texts(&rendered).len(), 1, "Only the pipeline context line");
    }
}

mod determinism {
    use super::*;

    #[test]
    fn identical_inputs_give_identical_json() {
        let snap = snapshot(
            9,
            &["build", "test"],
            vec![
                job(1, "compile", "build", JobStatus::Success),
                job(2, "unit-tests", "test", JobStatus::Failed),
            ],
        );
        let stages = expanded(&["test"]);

        let first = serde_json::to_string(&render(&snap, &stages).json_blocks().unwrap()).unwrap();
        let second = serde_json::to_string(&render(&snap, &stages).json_blocks().unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn fallback_text_summarizes_pipeline() {
        let snap = snapshot(
            9,
            &["build", "test"],
            vec![
                job(1, "compile", "build", JobStatus::Success),
                job(2, "unit-tests", "test", JobStatus::Failed),
            ],
        );

        assert_eq!(
            render(&snap, &BTreeSet::new()).text,
            "web-app pipeline #9 on main: failed (1 failed)"
        );
    }
}
