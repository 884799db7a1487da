//! Execution contexts handed in by the host framework.
//!
//! A [`JobContext`] is available at planning time on the driver; a
//! [`TaskContext`] identifies one task attempt on a worker. Both carry the
//! job's [`Conf`].

use crate::conf::Conf;
use std::fmt;

/// Driver-side view of a job.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: String,
    conf: Conf,
}

impl JobContext {
    /// Create a job context.
    pub fn new(job_id: impl Into<String>, conf: Conf) -> Self {
        Self {
            job_id: job_id.into(),
            conf,
        }
    }

    /// The job identifier.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The job configuration.
    pub fn conf(&self) -> &Conf {
        &self.conf
    }
}

/// Identifies one attempt of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskAttemptId {
    /// Task ordinal within the job.
    pub task: u32,
    /// Attempt ordinal of that task (retries, speculative copies).
    pub attempt: u32,
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{:05}_{}", self.task, self.attempt)
    }
}

/// Worker-side view of one task attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    job: JobContext,
    attempt: TaskAttemptId,
}

impl TaskContext {
    /// Create a task context.
    pub fn new(job: JobContext, attempt: TaskAttemptId) -> Self {
        Self { job, attempt }
    }

    /// The job this attempt belongs to.
    pub fn job(&self) -> &JobContext {
        &self.job
    }

    /// The attempt identifier.
    pub fn attempt(&self) -> TaskAttemptId {
        self.attempt
    }

    /// The job configuration.
    pub fn conf(&self) -> &Conf {
        self.job.conf()
    }
}

/// Final state reported to [`JobCommitter::abort_job`].
///
/// [`JobCommitter::abort_job`]: crate::JobCommitter::abort_job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// The job failed.
    Failed,
    /// The job was killed.
    Killed,
}
