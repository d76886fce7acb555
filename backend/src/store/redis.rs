//! Self-hosted row storage in Redis.
//!
//! # Key Design
//!
//! - `task:{id}` -> JSON task with its owner
//! - `category:{id}` -> JSON category with its owner
//! - `user:{user_id}:tasks` / `user:{user_id}:categories` -> SET of ids
//! - `user:{user_id}:category_name:{name}` -> category id, claimed with
//!   `SET NX` so names stay unique per user

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use taskdeck_shared::{Category, CreateCategory, Task, TaskQuery, UpdateCategory};
use uuid::Uuid;

use super::{
    apply_category_changes, apply_task_changes, completed_in_range, matches_query,
    new_category_row, new_task_row, sort_tasks, CategoryRepository, CompletedTask, NewTask,
    StoreError, TaskChanges, TaskRepository,
};
use crate::auth::Caller;

const TASK_KEY_PREFIX: &str = "task:";
const CATEGORY_KEY_PREFIX: &str = "category:";

fn task_key(id: Uuid) -> String {
    format!("{TASK_KEY_PREFIX}{id}")
}

fn category_key(id: Uuid) -> String {
    format!("{CATEGORY_KEY_PREFIX}{id}")
}

fn user_tasks_key(user_id: Uuid) -> String {
    format!("user:{user_id}:tasks")
}

fn user_categories_key(user_id: Uuid) -> String {
    format!("user:{user_id}:categories")
}

fn category_name_key(user_id: Uuid, name: &str) -> String {
    format!("user:{user_id}:category_name:{name}")
}

/// Runs `undo` when `result` failed, then hands the result back.
async fn undo_on_error<T, U>(result: Result<T, StoreError>, undo: U) -> Result<T, StoreError>
where
    U: Future<Output = ()>,
{
    if result.is_err() {
        undo.await;
    }
    result
}

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// A stored value together with its owner.
#[derive(Debug, Serialize, Deserialize)]
struct Stored<T> {
    user_id: Uuid,
    #[serde(flatten)]
    row: T,
}

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    async fn load<T: DeserializeOwned>(
        &self,
        key: String,
        user_id: Uuid,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        let stored: Stored<T> =
            serde_json::from_str(&raw.ok_or(StoreError::NotFound)?)?;
        if stored.user_id != user_id {
            return Err(StoreError::NotFound);
        }
        Ok(stored.row)
    }

    /// Loads every row listed in a user's index set.
    async fn load_all<T: DeserializeOwned>(
        &self,
        index_key: String,
        key_for: fn(Uuid) -> String,
    ) -> Result<Vec<T>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(&index_key).await?;
        let keys: Vec<String> = ids
            .iter()
            .filter_map(|id| Uuid::parse_str(id).ok())
            .map(key_for)
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = ::redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;
        values
            .into_iter()
            .flatten()
            .map(|raw| {
                serde_json::from_str::<Stored<T>>(&raw)
                    .map(|stored| stored.row)
                    .map_err(StoreError::from)
            })
            .collect()
    }

    async fn save<T: Serialize>(&self, key: String, user_id: Uuid, row: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(&Stored { user_id, row })?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    async fn check_category(&self, user_id: Uuid, id: Option<Uuid>) -> Result<(), StoreError> {
        let Some(id) = id else {
            return Ok(());
        };
        match self.load::<Category>(category_key(id), user_id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(StoreError::InvalidReference("Category")),
            Err(other) => Err(other),
        }
    }

    /// Claims a category name for `id`. Fails with `Conflict` if another
    /// category of the same user holds it.
    async fn claim_name(&self, user_id: Uuid, name: &str, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let claimed: bool = conn
            .set_nx(category_name_key(user_id, name), id.to_string())
            .await?;
        if claimed {
            Ok(())
        } else {
            Err(StoreError::Conflict)
        }
    }

    async fn release_name(&self, user_id: Uuid, name: &str) {
        let mut conn = self.conn.clone();
        if let Err(error) = conn.del::<_, ()>(category_name_key(user_id, name)).await {
            tracing::warn!(%user_id, %error, "Could not release category name");
        }
    }

    async fn create_category(&self, user_id: Uuid, row: &Category) -> Result<(), StoreError> {
        let json = serde_json::to_string(&Stored { user_id, row })?;
        let mut conn = self.conn.clone();
        ::redis::pipe()
            .atomic()
            .set(category_key(row.id), json)
            .ignore()
            .sadd(user_categories_key(user_id), row.id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn tasks_of(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        self.load_all(user_tasks_key(user_id), task_key).await
    }

    async fn categories_of(&self, user_id: Uuid) -> Result<Vec<Category>, StoreError> {
        self.load_all(user_categories_key(user_id), category_key).await
    }
}

#[async_trait]
impl TaskRepository for RedisStore {
    async fn list(&self, caller: &Caller, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks_of(caller.id)
            .await?
            .into_iter()
            .filter(|task| matches_query(task, query))
            .collect();
        sort_tasks(&mut tasks, query.sort_or_default(), query.order);
        Ok(tasks)
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Task, StoreError> {
        self.load(task_key(id), caller.id).await
    }

    async fn insert(&self, caller: &Caller, task: NewTask) -> Result<Task, StoreError> {
        self.check_category(caller.id, task.fields.category_id).await?;
        let row = new_task_row(task, Utc::now());
        let json = serde_json::to_string(&Stored {
            user_id: caller.id,
            row: &row,
        })?;

        let mut conn = self.conn.clone();
        ::redis::pipe()
            .atomic()
            .set(task_key(row.id), json)
            .ignore()
            .sadd(user_tasks_key(caller.id), row.id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, StoreError> {
        let mut task: Task = self.load(task_key(id), caller.id).await?;
        if let Some(category_id) = changes.fields.category_id {
            self.check_category(caller.id, category_id).await?;
        }
        apply_task_changes(&mut task, changes, Utc::now());
        self.save(task_key(id), caller.id, &task).await?;
        Ok(task)
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        self.load::<Task>(task_key(id), caller.id).await?;
        let mut conn = self.conn.clone();
        ::redis::pipe()
            .atomic()
            .del(task_key(id))
            .ignore()
            .srem(user_tasks_key(caller.id), id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn completed_between(
        &self,
        caller: &Caller,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CompletedTask>, StoreError> {
        let tasks = self.tasks_of(caller.id).await?;
        let categories = self.categories_of(caller.id).await?;
        Ok(completed_in_range(tasks, &categories, start, end))
    }
}

#[async_trait]
impl CategoryRepository for RedisStore {
    async fn list(&self, caller: &Caller) -> Result<Vec<Category>, StoreError> {
        let mut categories = self.categories_of(caller.id).await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Category, StoreError> {
        self.load(category_key(id), caller.id).await
    }

    async fn insert(
        &self,
        caller: &Caller,
        category: CreateCategory,
    ) -> Result<Category, StoreError> {
        let row = new_category_row(category, Utc::now());
        self.claim_name(caller.id, &row.name, row.id).await?;
        undo_on_error(
            self.create_category(caller.id, &row).await,
            self.release_name(caller.id, &row.name),
        )
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: UpdateCategory,
    ) -> Result<Category, StoreError> {
        let mut category: Category = self.load(category_key(id), caller.id).await?;
        let previous_name = category.name.clone();
        let renamed = changes
            .name
            .as_deref()
            .is_some_and(|name| name != previous_name);
        if let (true, Some(name)) = (renamed, &changes.name) {
            self.claim_name(caller.id, name, id).await?;
        }

        apply_category_changes(&mut category, changes, Utc::now());
        let saved = self.save(category_key(id), caller.id, &category).await;
        if renamed {
            undo_on_error(saved, self.release_name(caller.id, &category.name)).await?;
        } else {
            saved?;
        }
        if renamed {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(category_name_key(caller.id, &previous_name))
                .await?;
        }
        Ok(category)
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        let category: Category = self.load(category_key(id), caller.id).await?;
        let mut conn = self.conn.clone();
        ::redis::pipe()
            .atomic()
            .del(category_key(id))
            .ignore()
            .del(category_name_key(caller.id, &category.name))
            .ignore()
            .srem(user_categories_key(caller.id), id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        for mut task in self.tasks_of(caller.id).await? {
            if task.category_id == Some(id) {
                task.category_id = None;
                self.save(task_key(task.id), caller.id, &task).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_user() {
        let user = Uuid::nil();
        assert_eq!(
            user_tasks_key(user),
            "user:00000000-0000-0000-0000-000000000000:tasks"
        );
        assert_eq!(
            category_name_key(user, "Work"),
            "user:00000000-0000-0000-0000-000000000000:category_name:Work"
        );
        assert!(task_key(user).starts_with("task:"));
        assert!(category_key(user).starts_with("category:"));
    }

    #[tokio::test]
    async fn failed_write_runs_the_undo() {
        let released = std::sync::atomic::AtomicBool::new(false);
        let result: Result<(), StoreError> = undo_on_error(
            Err(StoreError::Backend("connection reset".into())),
            async { released.store(true, std::sync::atomic::Ordering::SeqCst) },
        )
        .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn successful_write_keeps_the_claim() {
        let released = std::sync::atomic::AtomicBool::new(false);
        let result = undo_on_error(Ok(7), async {
            released.store(true, std::sync::atomic::Ordering::SeqCst)
        })
        .await;
        assert_eq!(result.ok(), Some(7));
        assert!(!released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn stored_rows_carry_their_owner() {
        let now = Utc::now();
        let category = new_category_row(
            CreateCategory {
                name: "Work".into(),
                color: None,
            },
            now,
        );
        let owner = Uuid::new_v4();
        let json = serde_json::to_value(Stored {
            user_id: owner,
            row: &category,
        })
        .unwrap();
        assert_eq!(json["user_id"], owner.to_string());
        assert_eq!(json["name"], "Work");

        let decoded: Stored<Category> = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.row, category);
    }
}
