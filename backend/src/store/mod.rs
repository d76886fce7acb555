//! Typed, ownership-scoped repositories for tasks and categories.
//!
//! Every method takes the [`Caller`] and only ever touches rows owned by
//! `caller.id`. A row owned by someone else is reported exactly like a
//! missing one.
//!
//! # Backends
//!
//! - [`SupabaseStore`](crate::supabase::SupabaseStore): PostgREST tables of the
//!   managed service (default)
//! - [`RedisStore`]: `task:{id}` / `category:{id}` JSON values plus per-user
//!   index sets
//! - [`MemoryStore`]: process-local, for development and tests

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdeck_shared::{
    Category, CreateCategory, CreateTask, SortOrder, Task, TaskPriority, TaskQuery, TaskSort,
    UpdateCategory, UpdateTask,
};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Caller;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// A uniqueness rule rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// The write points at a row the caller does not own.
    #[error("{0} does not exist")]
    InvalidReference(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("could not decode stored row: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Decode(error.to_string())
    }
}

/// A validated task plus the completion stamp decided by the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    #[serde(flatten)]
    pub fields: CreateTask,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A partial update. `completed_at: Some(None)` clears the stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskChanges {
    #[serde(flatten)]
    pub fields: UpdateTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

/// A done task joined with its category name, as fed to the weekly summary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletedTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub completed_at: DateTime<Utc>,
    pub category: Option<String>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list(&self, caller: &Caller, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Task, StoreError>;

    async fn insert(&self, caller: &Caller, task: NewTask) -> Result<Task, StoreError>;

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, StoreError>;

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError>;

    /// Done tasks whose `completed_at` falls in `[start, end]`, newest first.
    async fn completed_between(
        &self,
        caller: &Caller,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CompletedTask>, StoreError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// The caller's categories ordered by name.
    async fn list(&self, caller: &Caller) -> Result<Vec<Category>, StoreError>;

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Category, StoreError>;

    async fn insert(&self, caller: &Caller, category: CreateCategory)
        -> Result<Category, StoreError>;

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: UpdateCategory,
    ) -> Result<Category, StoreError>;

    /// Removes the category and detaches it from the caller's tasks.
    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError>;
}

// ============================================================================
// Row logic shared by the self-hosted backends
// ============================================================================

pub(crate) fn new_task_row(task: NewTask, now: DateTime<Utc>) -> Task {
    let NewTask {
        fields,
        completed_at,
    } = task;
    Task {
        id: Uuid::new_v4(),
        title: fields.title,
        description: fields.description,
        status: fields.status,
        priority: fields.priority,
        due_date: fields.due_date,
        category_id: fields.category_id,
        completed_at,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn apply_task_changes(task: &mut Task, changes: TaskChanges, now: DateTime<Utc>) {
    let TaskChanges {
        fields,
        completed_at,
    } = changes;
    if let Some(title) = fields.title {
        task.title = title;
    }
    if let Some(description) = fields.description {
        task.description = description;
    }
    if let Some(status) = fields.status {
        task.status = status;
    }
    if let Some(priority) = fields.priority {
        task.priority = priority;
    }
    if let Some(due_date) = fields.due_date {
        task.due_date = due_date;
    }
    if let Some(category_id) = fields.category_id {
        task.category_id = category_id;
    }
    if let Some(completed_at) = completed_at {
        task.completed_at = completed_at;
    }
    task.updated_at = now;
}

pub(crate) fn new_category_row(category: CreateCategory, now: DateTime<Utc>) -> Category {
    Category {
        id: Uuid::new_v4(),
        name: category.name,
        color: category.color,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn apply_category_changes(
    category: &mut Category,
    changes: UpdateCategory,
    now: DateTime<Utc>,
) {
    if let Some(name) = changes.name {
        category.name = name;
    }
    if let Some(color) = changes.color {
        category.color = color;
    }
    category.updated_at = now;
}

pub(crate) fn matches_query(task: &Task, query: &TaskQuery) -> bool {
    query.status.map_or(true, |status| task.status == status)
        && query.priority.map_or(true, |priority| task.priority == priority)
        && query
            .category_id
            .map_or(true, |category_id| task.category_id == Some(category_id))
}

/// Sorts the way Postgres orders the same columns: nulls sort as the
/// largest value, so they come last ascending and first descending.
pub(crate) fn sort_tasks(tasks: &mut [Task], sort: TaskSort, order: SortOrder) {
    tasks.sort_by(|a, b| {
        let ordering = match sort {
            TaskSort::CreatedAt => a.created_at.cmp(&b.created_at),
            TaskSort::Priority => a.priority.rank().cmp(&b.priority.rank()),
            TaskSort::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
            },
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

pub(crate) fn completed_in_range(
    tasks: impl IntoIterator<Item = Task>,
    categories: &[Category],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<CompletedTask> {
    let mut completed: Vec<CompletedTask> = tasks
        .into_iter()
        .filter(Task::is_done)
        .filter_map(|task| {
            let completed_at = task.completed_at?;
            if completed_at < start || completed_at > end {
                return None;
            }
            let category = task.category_id.and_then(|id| {
                categories
                    .iter()
                    .find(|category| category.id == id)
                    .map(|category| category.name.clone())
            });
            Some(CompletedTask {
                title: task.title,
                description: task.description,
                priority: task.priority,
                completed_at,
                category,
            })
        })
        .collect();
    completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    completed
}
