use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use taskdeck_shared::{ApiResponse, CreateTask, Task, TaskStatus, UpdateTask};

use super::envelope;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::extract::{resource_id, ListQuery, ValidJson};
use crate::state::AppState;
use crate::store::{NewTask, TaskChanges};

const ENTITY: &str = "Task";

/// `completed_at` tracks the status in a change: any change setting `done`
/// stamps it, any other status clears it, and no status leaves it alone.
pub fn completion_stamp(
    status: Option<TaskStatus>,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    status.map(|status| (status == TaskStatus::Done).then_some(now))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    caller: Caller,
    ListQuery(query): ListQuery,
) -> AppResult<Json<ApiResponse<Vec<Task>>>> {
    let tasks = state
        .tasks
        .list(&caller, &query)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::debug!(user_id = %caller.id, count = tasks.len(), "Listed tasks");
    Ok(envelope(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(fields): ValidJson<CreateTask>,
) -> AppResult<(StatusCode, Json<ApiResponse<Task>>)> {
    let completed_at = (fields.status == TaskStatus::Done).then(Utc::now);
    let task = state
        .tasks
        .insert(
            &caller,
            NewTask {
                fields,
                completed_at,
            },
        )
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, envelope(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Task>>> {
    let id = resource_id(&id, ENTITY)?;
    let task = state
        .tasks
        .get(&caller, id)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    Ok(envelope(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ValidJson(fields): ValidJson<UpdateTask>,
) -> AppResult<Json<ApiResponse<Task>>> {
    let id = resource_id(&id, ENTITY)?;
    let changes = TaskChanges {
        completed_at: completion_stamp(fields.status, Utc::now()),
        fields,
    };
    let task = state
        .tasks
        .update(&caller, id, changes)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, task_id = %task.id, status = %task.status, "Task updated");
    Ok(envelope(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = resource_id(&id, ENTITY)?;
    state
        .tasks
        .delete(&caller, id)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}
