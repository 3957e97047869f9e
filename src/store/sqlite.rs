//! SQLite-backed task store.
//!
//! One repository owns every table (users, sessions, tasks, categories),
//! backed by a single database file at `{data_dir}/taskflow.db`. There is no
//! global connection cache: the store is constructed explicitly and handed to
//! whoever needs it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::{
    Category, CategoryCount, DashboardStats, MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN,
    MAX_TITLE_LEN, NewTask, PriorityCounts, RecurringPattern, ScheduleCandidate, SortOrder,
    StatusCounts, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus, UPCOMING_LIMIT,
    UPCOMING_WINDOW_DAYS, User, new_id,
};

/// Database filename within the data directory.
const DB_FILENAME: &str = "taskflow.db";

/// SQLite-backed task store.
///
/// Thread-safe via an internal `Mutex<Connection>`. All writes are
/// serialized; reads can proceed concurrently with WAL mode on the SQLite
/// side, though we still acquire the mutex for simplicity.
pub struct TaskStore {
    data_dir: PathBuf,
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// Open (or create) the SQLite database at `{data_dir}/taskflow.db`.
    ///
    /// Applies the schema if the database is new.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let db_path = data_dir.join(DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        apply_schema(&conn)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Create a user. Email is stored lowercased and must be unique.
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        image: Option<&str>,
    ) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();
        let id = new_id("user");
        let email = email.trim().to_lowercase();

        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, image, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, name.trim(), email, password_hash, image, now],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(
                    "user with this email already exists".to_owned(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(User {
            id,
            name: name.trim().to_owned(),
            email,
            image: image.map(str::to_owned),
            created_at: now,
        })
    }

    /// Look up a user and their password hash by email.
    pub fn find_user_credentials(&self, email: &str) -> Result<Option<(User, String)>, StoreError> {
        let conn = self.lock()?;
        let email = email.trim().to_lowercase();
        let row = conn
            .query_row(
                "SELECT id, name, email, image, created_at, password_hash \
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            image: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Persist a session for `user_id` keyed by the hashed bearer token.
    pub fn insert_session(
        &self,
        user_id: &str,
        token_hash: &str,
        ttl_days: u32,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();
        let expires = now + Duration::days(i64::from(ttl_days));
        conn.execute(
            "INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new_id("session"), user_id, token_hash, now, expires],
        )?;
        Ok(())
    }

    /// Resolve a hashed bearer token to its user. Expired sessions are
    /// treated as absent.
    pub fn find_session_user(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();
        let user = conn
            .query_row(
                "SELECT u.id, u.name, u.email, u.image, u.created_at \
                 FROM sessions s JOIN users u ON u.id = s.user_id \
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![token_hash, now],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Revoke the session with the given hashed token. Returns the number of
    /// sessions removed (0 or 1).
    pub fn delete_session(&self, token_hash: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Create a task owned by `owner_id`.
    pub fn create_task(&self, owner_id: &str, new: &NewTask) -> Result<Task, StoreError> {
        let title = new
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StoreError::Invalid("please provide a task title".to_owned()))?;
        validate_task_fields(title, new.description.as_deref())?;

        let now = Utc::now();
        let task = Task {
            id: new_id("task"),
            title: title.to_owned(),
            description: new.description.clone(),
            status: new.status.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            category: new.category.as_deref().map(str::trim).map(str::to_owned),
            due_date: new.due_date,
            scheduled_time: new.scheduled_time,
            is_recurring: new.is_recurring.unwrap_or(false),
            recurring_pattern: new.recurring_pattern,
            assigned_to: new.assigned_to.clone().unwrap_or_default(),
            owner_id: owner_id.to_owned(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        let assigned_json =
            serde_json::to_string(&task.assigned_to).unwrap_or_else(|_| "[]".to_owned());
        conn.execute(
            "INSERT INTO tasks \
             (id, title, description, status, priority, category, due_date, scheduled_time, \
              is_recurring, recurring_pattern, assigned_to, owner_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                task.id,
                task.title,
                task.description,
                status_to_str(task.status),
                priority_to_str(task.priority),
                task.category,
                task.due_date,
                task.scheduled_time,
                task.is_recurring,
                task.recurring_pattern.map(pattern_to_str),
                assigned_json,
                task.owner_id,
                task.created_at,
                task.updated_at
            ],
        )?;
        Ok(task)
    }

    /// List the owner's tasks with optional equality filters and whitelisted
    /// ordering.
    pub fn list_tasks(&self, owner_id: &str, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let order_col = filter.sort_by.column();
        let order_dir = filter.sort_order.keyword();
        // Sort column and direction come from closed enums, never user text.
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1 \
             AND (?2 IS NULL OR status = ?2) \
             AND (?3 IS NULL OR priority = ?3) \
             AND (?4 IS NULL OR category = ?4) \
             ORDER BY {order_col} {order_dir}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                owner_id,
                filter.status.map(status_to_str),
                filter.priority.map(priority_to_str),
                filter.category.as_deref(),
            ],
            row_to_task,
        )?;

        let mut tasks = Vec::new();
        for r in rows {
            tasks.push(r?);
        }
        Ok(tasks)
    }

    /// Fetch a single task scoped to its owner.
    pub fn get_task(&self, owner_id: &str, task_id: &str) -> Result<Task, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND owner_id = ?2");
        conn.query_row(&sql, params![task_id, owner_id], row_to_task)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(task_id.to_owned()))
    }

    /// Apply a partial update to an owned task, refreshing `updated_at`.
    /// Returns the updated task.
    pub fn update_task(
        &self,
        owner_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, StoreError> {
        let mut task = self.get_task(owner_id, task_id)?;

        if let Some(title) = &patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(StoreError::Invalid(
                    "please provide a task title".to_owned(),
                ));
            }
            task.title = title.to_owned();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(category) = &patch.category {
            task.category = Some(category.trim().to_owned());
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(scheduled_time) = patch.scheduled_time {
            task.scheduled_time = Some(scheduled_time);
        }
        if let Some(is_recurring) = patch.is_recurring {
            task.is_recurring = is_recurring;
        }
        if let Some(pattern) = patch.recurring_pattern {
            task.recurring_pattern = Some(pattern);
        }
        if let Some(assigned_to) = &patch.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        validate_task_fields(&task.title, task.description.as_deref())?;
        task.updated_at = Utc::now();

        let conn = self.lock()?;
        let assigned_json =
            serde_json::to_string(&task.assigned_to).unwrap_or_else(|_| "[]".to_owned());
        let rows = conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, priority = ?4, \
             category = ?5, due_date = ?6, scheduled_time = ?7, is_recurring = ?8, \
             recurring_pattern = ?9, assigned_to = ?10, updated_at = ?11 \
             WHERE id = ?12 AND owner_id = ?13",
            params![
                task.title,
                task.description,
                status_to_str(task.status),
                priority_to_str(task.priority),
                task.category,
                task.due_date,
                task.scheduled_time,
                task.is_recurring,
                task.recurring_pattern.map(pattern_to_str),
                assigned_json,
                task.updated_at,
                task_id,
                owner_id
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(task_id.to_owned()));
        }
        Ok(task)
    }

    /// Delete an owned task.
    pub fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
            params![task_id, owner_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(task_id.to_owned()));
        }
        Ok(())
    }

    /// Scheduling context for the advisor: the owner's non-completed tasks
    /// that already have a scheduled time, projected to title/time/priority.
    pub fn schedule_candidates(&self, owner_id: &str) -> Result<Vec<ScheduleCandidate>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, scheduled_time, priority FROM tasks \
             WHERE owner_id = ?1 AND status != 'completed' AND scheduled_time IS NOT NULL \
             ORDER BY scheduled_time ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            let priority: String = row.get(2)?;
            Ok(ScheduleCandidate {
                title: row.get(0)?,
                scheduled_time: row.get(1)?,
                priority: str_to_priority(&priority),
            })
        })?;

        let mut candidates = Vec::new();
        for r in rows {
            candidates.push(r?);
        }
        Ok(candidates)
    }

    /// Persist an advisor-recommended time onto an owned task, leaving other
    /// content fields untouched. Returns the number of rows affected — zero
    /// when the task is missing or not owned by the caller.
    pub fn set_scheduled_time(
        &self,
        owner_id: &str,
        task_id: &str,
        when: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE tasks SET scheduled_time = ?1, updated_at = ?2 \
             WHERE id = ?3 AND owner_id = ?4",
            params![when, Utc::now(), task_id, owner_id],
        )?;
        Ok(rows)
    }

    /// Aggregate dashboard statistics for one owner.
    pub fn dashboard_stats(&self, owner_id: &str) -> Result<DashboardStats, StoreError> {
        let conn = self.lock()?;

        let mut by_status = StatusCounts::default();
        let mut total = 0u64;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM tasks WHERE owner_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for r in rows {
            let (status, count) = r?;
            total += count;
            match str_to_status(&status) {
                TaskStatus::Todo => by_status.todo += count,
                TaskStatus::InProgress => by_status.in_progress += count,
                TaskStatus::Completed => by_status.completed += count,
            }
        }

        let mut by_priority = PriorityCounts::default();
        let mut stmt = conn.prepare(
            "SELECT priority, COUNT(*) FROM tasks WHERE owner_id = ?1 GROUP BY priority",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for r in rows {
            let (priority, count) = r?;
            match str_to_priority(&priority) {
                TaskPriority::Low => by_priority.low += count,
                TaskPriority::Medium => by_priority.medium += count,
                TaskPriority::High => by_priority.high += count,
            }
        }

        let mut by_category = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) AS n FROM tasks \
             WHERE owner_id = ?1 AND category IS NOT NULL \
             GROUP BY category ORDER BY n DESC, category ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        for r in rows {
            by_category.push(r?);
        }

        let now = Utc::now();
        let cutoff = now + Duration::days(UPCOMING_WINDOW_DAYS);
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE owner_id = ?1 AND status != 'completed' \
             AND due_date IS NOT NULL AND due_date >= ?2 AND due_date <= ?3 \
             ORDER BY due_date ASC LIMIT {UPCOMING_LIMIT}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id, now, cutoff], row_to_task)?;
        let mut upcoming = Vec::new();
        for r in rows {
            upcoming.push(r?);
        }

        Ok(DashboardStats {
            total,
            by_status,
            by_priority,
            by_category,
            upcoming,
        })
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    /// Create a category. Names are unique per owner.
    pub fn create_category(
        &self,
        owner_id: &str,
        name: &str,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Category, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid(
                "please provide a category name".to_owned(),
            ));
        }
        if name.chars().count() > MAX_CATEGORY_NAME_LEN {
            return Err(StoreError::Invalid(format!(
                "category name cannot be more than {MAX_CATEGORY_NAME_LEN} characters"
            )));
        }

        let conn = self.lock()?;
        let now = Utc::now();
        let category = Category {
            id: new_id("category"),
            name: name.to_owned(),
            color: color.unwrap_or("#0ea5e9").to_owned(),
            icon: icon.unwrap_or("folder").to_owned(),
            owner_id: owner_id.to_owned(),
            created_at: now,
        };

        let result = conn.execute(
            "INSERT INTO categories (id, name, color, icon, owner_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                category.id,
                category.name,
                category.color,
                category.icon,
                category.owner_id,
                category.created_at
            ],
        );
        match result {
            Ok(_) => Ok(category),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(
                "category with this name already exists".to_owned(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// List the owner's categories sorted by name.
    pub fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, color, icon, owner_id, created_at \
             FROM categories WHERE owner_id = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                icon: row.get(3)?,
                owner_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut categories = Vec::new();
        for r in rows {
            categories.push(r?);
        }
        Ok(categories)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Acquire the connection mutex.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

/// Column list shared by every task SELECT so `row_to_task` indexes stay
/// consistent.
const TASK_COLUMNS: &str = "id, title, description, status, priority, category, due_date, \
                            scheduled_time, is_recurring, recurring_pattern, assigned_to, \
                            owner_id, created_at, updated_at";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let pattern: Option<String> = row.get(9)?;
    let assigned_json: String = row.get(10)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: str_to_status(&status),
        priority: str_to_priority(&priority),
        category: row.get(5)?,
        due_date: row.get(6)?,
        scheduled_time: row.get(7)?,
        is_recurring: row.get(8)?,
        recurring_pattern: pattern.as_deref().and_then(str_to_pattern),
        assigned_to: serde_json::from_str(&assigned_json).unwrap_or_default(),
        owner_id: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        image: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// True when the error is a UNIQUE constraint violation.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn validate_task_fields(title: &str, description: Option<&str>) -> Result<(), StoreError> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(StoreError::Invalid(format!(
            "title cannot be more than {MAX_TITLE_LEN} characters"
        )));
    }
    if let Some(description) = description
        && description.chars().count() > MAX_DESCRIPTION_LEN
    {
        return Err(StoreError::Invalid(format!(
            "description cannot be more than {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Enum ↔ string conversions
// ---------------------------------------------------------------------------

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in-progress",
        TaskStatus::Completed => "completed",
    }
}

fn str_to_status(s: &str) -> TaskStatus {
    match s {
        "in-progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        _ => TaskStatus::Todo, // safe fallback
    }
}

fn priority_to_str(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
    }
}

fn str_to_priority(s: &str) -> TaskPriority {
    match s {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        _ => TaskPriority::Medium, // safe fallback
    }
}

fn pattern_to_str(pattern: RecurringPattern) -> &'static str {
    match pattern {
        RecurringPattern::Daily => "daily",
        RecurringPattern::Weekly => "weekly",
        RecurringPattern::Monthly => "monthly",
    }
}

fn str_to_pattern(s: &str) -> Option<RecurringPattern> {
    match s {
        "daily" => Some(RecurringPattern::Daily),
        "weekly" => Some(RecurringPattern::Weekly),
        "monthly" => Some(RecurringPattern::Monthly),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
