use crate::core::DecodedDecision;
use crate::db::models::{AnalysisTask, Decision, NewAnalysisTask, NewDecision};
use crate::errors::Error;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Repository for analysis tasks and their decisions in the SQLite database
pub struct TaskRepository<'a> {
    /// Database connection
    pub conn: &'a mut SqliteConnection,
}

impl<'a> TaskRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        TaskRepository { conn }
    }

    /// Inserts a new task row and returns it as stored.
    ///
    /// # Errors
    ///
    /// Fails if `task_id` already exists or the database is unavailable.
    pub fn insert_task(&mut self, new_task: &NewAnalysisTask<'_>) -> Result<AnalysisTask, Error> {
        use crate::schema::analysis_tasks;

        diesel::insert_into(analysis_tasks::table)
            .values(new_task)
            .execute(self.conn)?;

        let stored = analysis_tasks::table
            .filter(analysis_tasks::task_id.eq(new_task.task_id))
            .select(AnalysisTask::as_select())
            .first(self.conn)?;
        Ok(stored)
    }

    /// Retrieves a task by provider `task_id`, only if `owner` owns it.
    pub fn find_owned_task(
        &mut self,
        the_task_id: &str,
        owner: i32,
    ) -> Result<Option<AnalysisTask>, Error> {
        use crate::schema::analysis_tasks::dsl::*;

        let found = analysis_tasks
            .filter(task_id.eq(the_task_id))
            .filter(user_id.eq(owner))
            .select(AnalysisTask::as_select())
            .first(self.conn)
            .optional()?;
        Ok(found)
    }

    /// Persists every column of `task`, refreshing `updated_at`.
    pub fn save_task(&mut self, task: &mut AnalysisTask) -> Result<(), Error> {
        task.updated_at = Utc::now().naive_utc();
        diesel::update(&*task).set(&*task).execute(self.conn)?;
        Ok(())
    }

    /// Lists the most recently created tasks of `owner`, newest first.
    pub fn list_recent_tasks(
        &mut self,
        owner: i32,
        limit: i64,
    ) -> Result<Vec<AnalysisTask>, Error> {
        use crate::schema::analysis_tasks::dsl::*;

        let found = analysis_tasks
            .filter(user_id.eq(owner))
            .order_by((created_at.desc(), id.desc()))
            .limit(limit)
            .select(AnalysisTask::as_select())
            .load(self.conn)?;
        Ok(found)
    }

    /// Counts the tasks of `owner` grouped by status column.
    pub fn count_tasks_by_status(&mut self, owner: i32) -> Result<Vec<(String, i64)>, Error> {
        use crate::schema::analysis_tasks::dsl::*;

        let counts = analysis_tasks
            .filter(user_id.eq(owner))
            .group_by(status)
            .select((status, count_star()))
            .load::<(String, i64)>(self.conn)?;
        Ok(counts)
    }

    /// Records the decision for a task unless one already exists.
    ///
    /// The unique index on `decisions.task_id` turns a second completion
    /// into a no-op; the stored row is returned either way.
    pub fn record_decision(
        &mut self,
        the_task_id: &str,
        decoded: &DecodedDecision,
    ) -> Result<Decision, Error> {
        use crate::schema::decisions;

        let new_decision = NewDecision {
            task_id: the_task_id,
            action: decoded.action.as_str(),
            confidence: decoded.confidence,
            position_size: decoded.position_size,
            analysis_report: decoded.analysis_report.as_deref(),
            raw_decision: decoded.raw_decision.as_deref(),
            created_at: Utc::now().naive_utc(),
        };

        diesel::insert_or_ignore_into(decisions::table)
            .values(&new_decision)
            .execute(self.conn)?;

        let stored = decisions::table
            .filter(decisions::task_id.eq(the_task_id))
            .select(Decision::as_select())
            .first(self.conn)?;
        Ok(stored)
    }

    /// Retrieves the decision linked to a task, if any.
    pub fn get_decision(&mut self, the_task_id: &str) -> Result<Option<Decision>, Error> {
        use crate::schema::decisions::dsl::*;

        let found = decisions
            .filter(task_id.eq(the_task_id))
            .select(Decision::as_select())
            .first(self.conn)
            .optional()?;
        Ok(found)
    }

    /// Retrieves the decisions linked to any of the given tasks.
    pub fn get_decisions(&mut self, task_ids: &[String]) -> Result<Vec<Decision>, Error> {
        use crate::schema::decisions::dsl::*;

        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = decisions
            .filter(task_id.eq_any(task_ids))
            .select(Decision::as_select())
            .load(self.conn)?;
        Ok(found)
    }

    /// Counts the decisions on `owner`'s tasks grouped by action.
    pub fn count_decisions_by_action(&mut self, owner: i32) -> Result<Vec<(String, i64)>, Error> {
        use crate::schema::{analysis_tasks, decisions};

        let counts = decisions::table
            .inner_join(
                analysis_tasks::table.on(analysis_tasks::task_id.eq(decisions::task_id)),
            )
            .filter(analysis_tasks::user_id.eq(owner))
            .group_by(decisions::action)
            .select((decisions::action, count_star()))
            .load::<(String, i64)>(self.conn)?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DecisionAction;
    use crate::db::test_support::test_db;
    use crate::db::UserRepository;
    use chrono::Duration;

    fn new_task<'a>(owner: i32, id: &'a str, offset_secs: i64) -> NewAnalysisTask<'a> {
        let at = Utc::now().naive_utc() + Duration::seconds(offset_secs);
        NewAnalysisTask {
            user_id: owner,
            task_id: id,
            ticker: "NVDA",
            analysis_date: "2024-05-10",
            status: "pending",
            config: None,
            poll_failures: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn decoded(action: DecisionAction) -> DecodedDecision {
        DecodedDecision {
            action,
            confidence: 0.85,
            position_size: None,
            analysis_report: Some("{\"summary\":\"ok\"}".to_string()),
            raw_decision: None,
        }
    }

    #[test]
    fn insert_and_find_respects_owner() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let bob = UserRepository::new(&mut conn).create_user("bob", "h2").unwrap();
        let mut repo = TaskRepository::new(&mut conn);

        let stored = repo.insert_task(&new_task(alice.id, "abc-123", 0)).unwrap();
        assert_eq!(stored.task_id, "abc-123");
        assert_eq!(stored.status, "pending");

        assert!(repo.find_owned_task("abc-123", alice.id).unwrap().is_some());
        assert!(repo.find_owned_task("abc-123", bob.id).unwrap().is_none());
        assert!(repo.find_owned_task("missing", alice.id).unwrap().is_none());
    }

    #[test]
    fn duplicate_task_id_is_rejected() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let mut repo = TaskRepository::new(&mut conn);

        repo.insert_task(&new_task(alice.id, "dup", 0)).unwrap();
        assert!(repo.insert_task(&new_task(alice.id, "dup", 1)).is_err());
    }

    #[test]
    fn save_task_persists_cleared_fields() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let mut repo = TaskRepository::new(&mut conn);

        let mut task = repo.insert_task(&new_task(alice.id, "t1", 0)).unwrap();
        task.error = Some("blip".to_string());
        task.poll_failures = 2;
        repo.save_task(&mut task).unwrap();

        task.error = None;
        task.poll_failures = 0;
        task.status = "processing".to_string();
        repo.save_task(&mut task).unwrap();

        let reloaded = repo.find_owned_task("t1", alice.id).unwrap().unwrap();
        assert_eq!(reloaded.error, None);
        assert_eq!(reloaded.poll_failures, 0);
        assert_eq!(reloaded.status, "processing");
    }

    #[test]
    fn listing_returns_twenty_newest_first() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let mut repo = TaskRepository::new(&mut conn);

        let ids: Vec<String> = (0..25).map(|i| format!("task-{:02}", i)).collect();
        for (i, id) in ids.iter().enumerate() {
            repo.insert_task(&new_task(alice.id, id, i as i64)).unwrap();
        }

        let listed = repo.list_recent_tasks(alice.id, 20).unwrap();
        assert_eq!(listed.len(), 20);
        assert_eq!(listed[0].task_id, "task-24");
        assert_eq!(listed[19].task_id, "task-05");
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[test]
    fn record_decision_is_idempotent_per_task() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let mut repo = TaskRepository::new(&mut conn);
        repo.insert_task(&new_task(alice.id, "t1", 0)).unwrap();

        let first = repo.record_decision("t1", &decoded(DecisionAction::Buy)).unwrap();
        let second = repo.record_decision("t1", &decoded(DecisionAction::Sell)).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.action, "BUY");
        assert_eq!(repo.get_decisions(&["t1".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn counts_are_scoped_to_owner() {
        let db = test_db();
        let mut conn = db.database.get_conn().unwrap();
        let alice = UserRepository::new(&mut conn).create_user("alice", "h1").unwrap();
        let bob = UserRepository::new(&mut conn).create_user("bob", "h2").unwrap();
        let mut repo = TaskRepository::new(&mut conn);

        for (id, action) in [("a1", DecisionAction::Buy), ("a2", DecisionAction::Buy)] {
            let mut task = repo.insert_task(&new_task(alice.id, id, 0)).unwrap();
            task.status = "completed".to_string();
            repo.save_task(&mut task).unwrap();
            repo.record_decision(id, &decoded(action)).unwrap();
        }
        repo.insert_task(&new_task(alice.id, "a3", 0)).unwrap();
        let mut foreign = repo.insert_task(&new_task(bob.id, "b1", 0)).unwrap();
        foreign.status = "completed".to_string();
        repo.save_task(&mut foreign).unwrap();
        repo.record_decision("b1", &decoded(DecisionAction::Sell)).unwrap();

        let mut statuses = repo.count_tasks_by_status(alice.id).unwrap();
        statuses.sort();
        assert_eq!(
            statuses,
            vec![("completed".to_string(), 2), ("pending".to_string(), 1)]
        );
        assert_eq!(
            repo.count_decisions_by_action(alice.id).unwrap(),
            vec![("BUY".to_string(), 2)]
        );
    }
}
