use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use chrono::{Duration, Utc};
use taskdeck_shared::{ApiResponse, DateRange, Schema, SuggestRequest, Suggestion, WeeklySummary};

use super::envelope;
use crate::ai::Assistant;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const SUMMARY_WINDOW_DAYS: i64 = 7;
pub const EMPTY_WEEK_MESSAGE: &str =
    "No tasks completed in the past 7 days. Start marking tasks as done to see your weekly summary!";

fn assistant(state: &AppState) -> AppResult<Arc<Assistant>> {
    state.assistant.clone().ok_or_else(AppError::ai_unavailable)
}

/// Availability is checked before the body, so a disabled assistant answers
/// 503 whatever was sent.
pub async fn suggest(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> AppResult<Json<ApiResponse<Suggestion>>> {
    let assistant = assistant(&state)?;
    let request = SuggestRequest::parse_slice(&body)?;
    tracing::debug!(user_id = %caller.id, kind = ?request.kind, "AI suggestion requested");
    let suggestion = assistant.suggest(&request).await?;
    Ok(envelope(suggestion))
}

pub async fn summarize_week(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<ApiResponse<WeeklySummary>>> {
    let assistant = assistant(&state)?;

    let end = Utc::now();
    let start = end - Duration::days(SUMMARY_WINDOW_DAYS);
    let completed = state
        .tasks
        .completed_between(&caller, start, end)
        .await
        .map_err(|e| AppError::from_store("Task", e))?;

    let summary = if completed.is_empty() {
        EMPTY_WEEK_MESSAGE.to_string()
    } else {
        assistant.summarize_week(&completed).await?
    };
    tracing::info!(user_id = %caller.id, task_count = completed.len(), "Weekly summary");

    Ok(envelope(WeeklySummary {
        summary,
        task_count: completed.len(),
        date_range: DateRange { start, end },
    }))
}
