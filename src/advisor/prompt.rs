//! Prompt construction for the scheduling advisor.

use chrono::{DateTime, Utc};

use crate::store::ScheduleCandidate;

/// Build the scheduling prompt from the request fields and the user's
/// existing scheduled tasks.
pub fn build_prompt(
    title: Option<&str>,
    description: Option<&str>,
    priority: Option<&str>,
    preferred_time_ranges: Option<&serde_json::Value>,
    existing: &[ScheduleCandidate],
    now: DateTime<Utc>,
) -> String {
    let title = title.unwrap_or("(Need task info from database)");
    let description = description.unwrap_or("N/A");
    let priority = priority.unwrap_or("medium");
    let preferences = preferred_time_ranges
        .map(|v| v.to_string())
        .unwrap_or_else(|| "No specific preferences".to_owned());
    let existing_json =
        serde_json::to_string_pretty(existing).unwrap_or_else(|_| "[]".to_owned());

    format!(
        "As a task scheduling assistant, recommend the best time to schedule this task:\n\
         Task: {title}\n\
         Description: {description}\n\
         Priority: {priority}\n\
         Current date and time: {now}\n\
         User's preferred time ranges: {preferences}\n\
         \n\
         User's existing scheduled tasks:\n\
         {existing_json}\n\
         \n\
         Analyze the user's existing schedule and task priorities. Consider task priority, \
         appropriate spacing between tasks, and user's preferred time ranges if provided.\n\
         \n\
         Provide output in JSON format only with this structure:\n\
         {{\n\
         \x20 \"recommendedTime\": \"ISO date string\",\n\
         \x20 \"reasoning\": \"Brief explanation of why this time was chosen\",\n\
         \x20 \"conflictingTasks\": [\"List of task titles that might conflict\"]\n\
         }}",
        now = now.to_rfc3339(),
    )
}
