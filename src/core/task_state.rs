use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an analysis task.
///
/// Tasks only move forward: `Pending -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Accepted by the provider but not yet picked up
    Pending,
    /// The provider is running the analysis
    Processing,
    /// Terminal: a decision has been recorded
    Completed,
    /// Terminal: the task ended with an error message
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Returns true once no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// Applies a status reported by the provider without ever moving backwards.
    ///
    /// A terminal status is sticky, and a stale `pending` report does not
    /// undo `processing`.
    pub fn advance(self, reported: TaskStatus) -> TaskStatus {
        if self.is_terminal() || reported.rank() < self.rank() {
            self
        } else {
            reported
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unrecognised task status '{}'", other)),
        }
    }
}
