const TEST_JOB_PATTERNS: [&str; 7] = ["test", "jest", "spec", "unit", "integration", "e2e", "coverage"];

/// Whether a job name looks like it runs a test suite.
pub fn is_test_job(name: &str) -> bool {
    let lower = name.to_lowercase();
    TEST_JOB_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
