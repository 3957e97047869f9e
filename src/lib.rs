//! Taskflow: a task-management service with an AI scheduling advisor.
//!
//! Users register, create and organize tasks and categories, view dashboard
//! analytics, and ask the scheduling advisor for a recommended time slot.
//! The advisor prompts an OpenAI-compatible completion endpoint with the
//! user's existing schedule and validates the returned JSON before
//! optionally persisting the recommended time.

pub mod advisor;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;

pub use advisor::{CompletionClient, Recommendation, ScheduleRequest, SchedulingAdvisor};
pub use config::AppConfig;
pub use error::{Result, TaskflowError};
pub use server::{ApiServer, AppState};
pub use store::TaskStore;
