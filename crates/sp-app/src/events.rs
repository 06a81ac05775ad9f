use sp_core::{Job, JobStatus};

/// Messages from tracking tasks to the session that owns the job.
///
/// Every event carries the generation of the tracking run that produced it so
/// the session can drop results belonging to an abandoned job.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Status {
        generation: u64,
        job_id: String,
        status: JobStatus,
        message: String,
        progress: u8,
        song_title: Option<String>,
    },
    Completed {
        generation: u64,
        job: Job,
    },
    Failed {
        generation: u64,
        job_id: String,
        error: String,
    },
}

impl TrackerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Status { generation, .. }
            | Self::Completed { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Status { job_id, .. } | Self::Failed { job_id, .. } => job_id,
            Self::Completed { job, .. } => &job.job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }
}
