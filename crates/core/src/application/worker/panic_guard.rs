// Panic isolation for job units
use tokio::task::JoinError;
use tracing::error;

/// Failure text for a unit task that did not return
///
/// Panics keep their payload message; aborted tasks report as such.
pub(crate) fn describe_join_error(job_id: &str, join_err: JoinError) -> String {
    if !join_err.is_panic() {
        error!(job_id = %job_id, "Job task aborted before completion");
        return "job task aborted".to_string();
    }

    let payload = join_err.into_panic();
    let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };

    error!(job_id = %job_id, panic_msg = %panic_msg, "Job unit panicked");
    panic_msg
}
