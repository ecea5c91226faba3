use crate::pipeline::{JobId, PipelineId};

/// Web URL of a pipeline, given its project's web URL.
///
/// # Arguments
///
/// * `project_url` - Project web page (e.g., <https://gitlab.com/group/project>)
/// * `pipeline_id` - Numeric pipeline id
///
/// # Returns
///
/// Clickable URL to the pipeline (e.g., <https://gitlab.com/group/project/-/pipelines/123>)
pub fn pipeline_url(project_url: &str, pipeline_id: PipelineId) -> String {
    format!("{}/-/pipelines/{pipeline_id}", project_url.trim_end_matches('/'))
}

/// Web URL of a job, given its project's web URL.
pub fn job_url(project_url: &str, job_id: JobId) -> String {
    format!("{}/-/jobs/{job_id}", project_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_url() {
        let url = pipeline_url("https://gitlab.com/group/project", 123_456);
        assert_eq!(url, "https://gitlab.com/group/project/-/pipelines/123456");
    }

    #[test]
    fn test_pipeline_url_trailing_slash() {
        let url = pipeline_url("https://gitlab.com/group/project/", 1);
        assert_eq!(url, "https://gitlab.com/group/project/-/pipelines/1");
    }

    #[test]
    fn test_job_url() {
        let url = job_url("https://gitlab.com/group/project", 789_012);
        assert_eq!(url, "https://gitlab.com/group/project/-/jobs/789012");
    }
}
