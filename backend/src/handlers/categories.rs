use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use taskdeck_shared::{ApiResponse, Category, CreateCategory, UpdateCategory};

use super::envelope;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::extract::{resource_id, ValidJson};
use crate::state::AppState;

const ENTITY: &str = "Category";

/// Category routes behave as absent while the feature is switched off.
fn ensure_enabled(state: &AppState) -> AppResult<()> {
    if state.config.features.categories {
        Ok(())
    } else {
        Err(AppError::NotFound("Categories"))
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    ensure_enabled(&state)?;
    let categories = state
        .categories
        .list(&caller)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    Ok(envelope(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(category): ValidJson<CreateCategory>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    ensure_enabled(&state)?;
    let category = state
        .categories
        .insert(&caller, category)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, envelope(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_enabled(&state)?;
    let id = resource_id(&id, ENTITY)?;
    let category = state
        .categories
        .get(&caller, id)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    Ok(envelope(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ValidJson(changes): ValidJson<UpdateCategory>,
) -> AppResult<Json<ApiResponse<Category>>> {
    ensure_enabled(&state)?;
    let id = resource_id(&id, ENTITY)?;
    let category = state
        .categories
        .update(&caller, id, changes)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, category_id = %category.id, "Category updated");
    Ok(envelope(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    ensure_enabled(&state)?;
    let id = resource_id(&id, ENTITY)?;
    state
        .categories
        .delete(&caller, id)
        .await
        .map_err(|e| AppError::from_store(ENTITY, e))?;
    tracing::info!(user_id = %caller.id, category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
