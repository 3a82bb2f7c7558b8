use crate::core::TaskStatus;
use crate::errors::Error;
use crate::schema::{analysis_tasks, decisions, users};
use chrono::NaiveDateTime;
use diesel::{AsChangeset, Identifiable, Insertable, Queryable, Selectable};

/// Represents an analysis task in the database
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = analysis_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct AnalysisTask {
    /// Internal row identifier
    pub id: i32,
    /// Owning user
    pub user_id: i32,
    /// Identifier assigned by the analysis provider
    pub task_id: String,
    /// Ticker symbol, upper-cased
    pub ticker: String,
    /// Calendar date the analysis targets
    pub analysis_date: String,
    /// Lifecycle status, see [`TaskStatus`]
    pub status: String,
    /// Optional JSON serialized request configuration
    pub config: Option<String>,
    /// When the provider finished the analysis
    pub completed_at: Option<NaiveDateTime>,
    /// Processing duration reported by the provider
    pub processing_time_seconds: Option<f64>,
    /// Failure reason for failed tasks
    pub error: Option<String>,
    /// Consecutive reconcile attempts that could not reach the provider
    pub poll_failures: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AnalysisTask {
    /// Parses the stored status column.
    pub fn status(&self) -> Result<TaskStatus, Error> {
        self.status
            .parse::<TaskStatus>()
            .map_err(|e| Error::CorruptRow(format!("task {}: {}", self.task_id, e)))
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status.to_string();
    }

    /// Marks the task terminally failed with the given reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.set_status(TaskStatus::Failed);
        self.error = Some(reason.into());
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = analysis_tasks)]
pub struct NewAnalysisTask<'a> {
    pub user_id: i32,
    pub task_id: &'a str,
    pub ticker: &'a str,
    pub analysis_date: &'a str,
    pub status: &'a str,
    pub config: Option<&'a str>,
    pub poll_failures: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Represents the recorded outcome of a completed task
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = decisions)]
pub struct Decision {
    pub id: i32,
    /// Shared key with [`AnalysisTask::task_id`]
    pub task_id: String,
    /// BUY, SELL or HOLD
    pub action: String,
    pub confidence: f64,
    pub position_size: Option<i32>,
    /// JSON serialized report produced by the provider's agents
    pub analysis_report: Option<String>,
    /// JSON serialized raw decision, or the raw decision text
    pub raw_decision: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = decisions)]
pub struct NewDecision<'a> {
    pub task_id: &'a str,
    pub action: &'a str,
    pub confidence: f64,
    pub position_size: Option<i32>,
    pub analysis_report: Option<&'a str>,
    pub raw_decision: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

/// An API user, identified by the SHA-256 hash of its bearer token
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub token_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub token_hash: &'a str,
    pub created_at: NaiveDateTime,
}
