use std::collections::BTreeSet;
use std::fmt::Write;

use comfy_table::Cell;

use crate::pipeline::{is_test_job, stage_status, JobStatus, PipelineSnapshot, StageStatus};

use super::styling::{bright, bright_red, cyan, dim};
use super::tables::{create_table, header_cells, job_status_cell, stage_status_cell};

/// Prints a terminal preview of how a pipeline message will look.
///
/// One row per declared stage in order, then a job table for every
/// expanded stage, then the diagnostics the message would offer.
pub fn print_preview(snapshot: &PipelineSnapshot, expanded: &BTreeSet<String>) {
    println!("{}", render_preview(snapshot, expanded));
}

fn render_preview(snapshot: &PipelineSnapshot, expanded: &BTreeSet<String>) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} {} {}",
        bright(&snapshot.project.name),
        cyan(format!("#{}", snapshot.pipeline_id)),
        dim(format!(
            "on {} @ {} by {}",
            snapshot.git_ref,
            snapshot.commit.short_id(),
            snapshot.commit.author_name
        ))
    );

    let mut stages = create_table();
    stages.set_header(header_cells(&["Stage", "Status", "Jobs", "Failed", "Expanded"]));
    for stage in &snapshot.stages {
        let jobs: Vec<_> = snapshot.jobs_in_stage(stage).collect();
        let failed = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .count();
        stages.add_row(vec![
            Cell::new(stage),
            stage_status_cell(stage_status(jobs.iter().copied())),
            Cell::new(jobs.len()),
            Cell::new(failed),
            Cell::new(if expanded.contains(stage) { "yes" } else { "" }),
        ]);
    }
    let _ = writeln!(output, "{stages}");

    for stage in snapshot.stages.iter().filter(|stage| expanded.contains(*stage)) {
        if stage_status(snapshot.jobs_in_stage(stage)) == StageStatus::NotStarted {
            continue;
        }
        let mut jobs = create_table();
        jobs.set_header(header_cells(&["Job", "Status", "Test job"]));
        for job in snapshot.jobs_in_stage(stage) {
            jobs.add_row(vec![
                Cell::new(&job.name),
                job_status_cell(job.status),
                Cell::new(if is_test_job(&job.name) { "yes" } else { "" }),
            ]);
        }
        let _ = writeln!(output, "\n{}\n{jobs}", bright(stage).underlined());
    }

    let failed: Vec<&str> = snapshot
        .builds
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .map(|job| job.name.as_str())
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(output, "\n{} {}", bright_red("Failed jobs:"), failed.join(", "));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::{job, snapshot};

    fn plain(text: &str) -> String {
        console::strip_ansi_codes(text).to_string()
    }

    mod render_preview {
        use super::*;

        #[test]
        fn lists_stages_in_declared_order() {
            let snap = snapshot(
                5,
                &["test", "build"],
                vec![
                    job(1, "compile", "build", JobStatus::Success),
                    job(2, "unit", "test", JobStatus::Running),
                ],
            );

            let output = plain(&render_preview(&snap, &BTreeSet::new()));

            let test = output.find("test").expect("test stage listed");
            let build = output.find("build").expect("build stage listed");
            assert!(test < build, "Stages must keep their declared order:\n{output}");
        }

        #[test]
        fn shows_jobs_only_for_expanded_stages() {
            let snap = snapshot(
                5,
                &["build", "test"],
                vec![
                    job(1, "compile", "build", JobStatus::Success),
                    job(2, "jest-suite", "test", JobStatus::Failed),
                ],
            );
            let expanded = ["test".to_string()].into_iter().collect();

            let output = plain(&render_preview(&snap, &expanded));

            assert!(output.contains("jest-suite"));
            assert!(!output.contains("compile"), "Collapsed stage jobs are hidden:\n{output}");
            assert!(output.contains("Failed jobs: jest-suite"));
        }
    }
}
