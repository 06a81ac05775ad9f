use crate::job::JobStatus;

/// Display estimate of how far along a job is, in percent.
///
/// The backend does not report progress while polling, so this is a
/// heuristic keyed on the phase name only.
pub fn progress_for(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 5,
        JobStatus::Downloading => 30,
        JobStatus::Processing => 70,
        JobStatus::Completed => 100,
        JobStatus::Failed | JobStatus::Unknown => 0,
    }
}
