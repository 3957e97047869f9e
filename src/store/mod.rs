//! Persistence layer for users, sessions, tasks, and categories.

mod schema;
mod sqlite;
mod types;

pub use sqlite::{StoreError, TaskStore};
pub use types::{
    Category, CategoryCount, DashboardStats, MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN,
    MAX_TITLE_LEN, NewTask, PriorityCounts, RecurringPattern, ScheduleCandidate, SortField,
    SortOrder, StatusCounts, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus,
    UPCOMING_LIMIT, UPCOMING_WINDOW_DAYS, User,
};
