//! Metrics definitions for ingestion monitoring.

/// Label for the worker id in metrics.
pub const WORKER_ID_LABEL: &str = "worker_id";

/// Label for the source container in metrics.
pub const CONTAINER_LABEL: &str = "container";

// Worker pool metrics

/// Counter for jobs executed by pool workers.
pub const INLET_JOBS_EXECUTED_TOTAL: &str = "inlet_jobs_executed_total";

/// Counter for jobs that returned an error.
pub const INLET_JOB_FAILURES_TOTAL: &str = "inlet_job_failures_total";

// Content metrics

/// Counter for decoded records handed to the publisher.
pub const INLET_RECORDS_DECODED_TOTAL: &str = "inlet_records_decoded_total";

/// Counter for error events published due to unsupported or malformed content.
pub const INLET_CONTENT_ERRORS_TOTAL: &str = "inlet_content_errors_total";
