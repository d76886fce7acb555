//! Process-local store for development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskdeck_shared::{Category, CreateCategory, Task, TaskQuery, UpdateCategory};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    apply_category_changes, apply_task_changes, completed_in_range, matches_query,
    new_category_row, new_task_row, sort_tasks, CategoryRepository, CompletedTask, NewTask,
    StoreError, TaskChanges, TaskRepository,
};
use crate::auth::Caller;

#[derive(Debug, Clone)]
struct Owned<T> {
    user_id: Uuid,
    row: T,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Owned<Task>>,
    categories: Vec<Owned<Category>>,
}

impl MemoryState {
    fn task_mut(&mut self, user_id: Uuid, id: Uuid) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|owned| owned.user_id == user_id && owned.row.id == id)
            .map(|owned| &mut owned.row)
            .ok_or(StoreError::NotFound)
    }

    fn category_mut(&mut self, user_id: Uuid, id: Uuid) -> Result<&mut Category, StoreError> {
        self.categories
            .iter_mut()
            .find(|owned| owned.user_id == user_id && owned.row.id == id)
            .map(|owned| &mut owned.row)
            .ok_or(StoreError::NotFound)
    }

    fn check_category(&self, user_id: Uuid, id: Option<Uuid>) -> Result<(), StoreError> {
        match id {
            Some(id)
                if !self
                    .categories
                    .iter()
                    .any(|owned| owned.user_id == user_id && owned.row.id == id) =>
            {
                Err(StoreError::InvalidReference("Category"))
            }
            _ => Ok(()),
        }
    }

    fn name_taken(&self, user_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.categories.iter().any(|owned| {
            owned.user_id == user_id && owned.row.name == name && Some(owned.row.id) != except
        })
    }

    fn owned_categories(&self, user_id: Uuid) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|owned| owned.user_id == user_id)
            .map(|owned| owned.row.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn list(&self, caller: &Caller, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|owned| owned.user_id == caller.id && matches_query(&owned.row, query))
            .map(|owned| owned.row.clone())
            .collect();
        sort_tasks(&mut tasks, query.sort_or_default(), query.order);
        Ok(tasks)
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Task, StoreError> {
        let state = self.state.read().await;
        state
            .tasks
            .iter()
            .find(|owned| owned.user_id == caller.id && owned.row.id == id)
            .map(|owned| owned.row.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, caller: &Caller, task: NewTask) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;
        state.check_category(caller.id, task.fields.category_id)?;
        let row = new_task_row(task, Utc::now());
        state.tasks.push(Owned {
            user_id: caller.id,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;
        state.task_mut(caller.id, id)?;
        if let Some(category_id) = changes.fields.category_id {
            state.check_category(caller.id, category_id)?;
        }
        let task = state.task_mut(caller.id, id)?;
        apply_task_changes(task, changes, Utc::now());
        Ok(task.clone())
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let before = state.tasks.len();
        state
            .tasks
            .retain(|owned| !(owned.user_id == caller.id && owned.row.id == id));
        if state.tasks.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn completed_between(
        &self,
        caller: &Caller,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CompletedTask>, StoreError> {
        let state = self.state.read().await;
        let tasks = state
            .tasks
            .iter()
            .filter(|owned| owned.user_id == caller.id)
            .map(|owned| owned.row.clone());
        Ok(completed_in_range(
            tasks,
            &state.owned_categories(caller.id),
            start,
            end,
        ))
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list(&self, caller: &Caller) -> Result<Vec<Category>, StoreError> {
        let state = self.state.read().await;
        let mut categories = state.owned_categories(caller.id);
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Category, StoreError> {
        let state = self.state.read().await;
        state
            .categories
            .iter()
            .find(|owned| owned.user_id == caller.id && owned.row.id == id)
            .map(|owned| owned.row.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn insert(
        &self,
        caller: &Caller,
        category: CreateCategory,
    ) -> Result<Category, StoreError> {
        let mut state = self.state.write().await;
        if state.name_taken(caller.id, &category.name, None) {
            return Err(StoreError::Conflict);
        }
        let row = new_category_row(category, Utc::now());
        state.categories.push(Owned {
            user_id: caller.id,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: UpdateCategory,
    ) -> Result<Category, StoreError> {
        let mut state = self.state.write().await;
        state.category_mut(caller.id, id)?;
        if let Some(name) = &changes.name {
            if state.name_taken(caller.id, name, Some(id)) {
                return Err(StoreError::Conflict);
            }
        }
        let category = state.category_mut(caller.id, id)?;
        apply_category_changes(category, changes, Utc::now());
        Ok(category.clone())
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let before = state.categories.len();
        state
            .categories
            .retain(|owned| !(owned.user_id == caller.id && owned.row.id == id));
        if state.categories.len() == before {
            return Err(StoreError::NotFound);
        }
        for owned in state.tasks.iter_mut() {
            if owned.user_id == caller.id && owned.row.category_id == Some(id) {
                owned.row.category_id = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_shared::{CreateTask, TaskPriority, TaskStatus, UpdateTask};

    fn caller() -> Caller {
        Caller {
            id: Uuid::new_v4(),
            email: Some("owner@example.com".into()),
            access_token: "token".into(),
        }
    }

    fn new_task(title: &str) -> NewTask {
        NewTask {
            fields: CreateTask {
                title: title.into(),
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::Medium,
                due_date: None,
                category_id: None,
            },
            completed_at: None,
        }
    }

    fn new_category(name: &str) -> CreateCategory {
        CreateCategory {
            name: name.into(),
            color: Some("#3b82f6".into()),
        }
    }

    #[tokio::test]
    async fn rows_are_invisible_to_other_users() {
        let store = MemoryStore::new();
        let (owner, intruder) = (caller(), caller());
        let task = TaskRepository::insert(&store, &owner, new_task("private"))
            .await
            .unwrap();

        assert_eq!(
            TaskRepository::get(&store, &intruder, task.id).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(
            TaskRepository::update(&store, &intruder, task.id, TaskChanges::default()).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(
            TaskRepository::delete(&store, &intruder, task.id).await,
            Err(StoreError::NotFound)
        );
        assert!(TaskRepository::list(&store, &intruder, &TaskQuery::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            TaskRepository::get(&store, &owner, task.id).await.unwrap().title,
            "private"
        );
    }

    #[tokio::test]
    async fn category_names_are_unique_per_user() {
        let store = MemoryStore::new();
        let (alice, bob) = (caller(), caller());
        CategoryRepository::insert(&store, &alice, new_category("Work"))
            .await
            .unwrap();

        assert_eq!(
            CategoryRepository::insert(&store, &alice, new_category("Work")).await,
            Err(StoreError::Conflict)
        );
        assert!(CategoryRepository::insert(&store, &bob, new_category("Work"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn renaming_onto_an_existing_name_conflicts() {
        let store = MemoryStore::new();
        let owner = caller();
        CategoryRepository::insert(&store, &owner, new_category("Work"))
            .await
            .unwrap();
        let home = CategoryRepository::insert(&store, &owner, new_category("Home"))
            .await
            .unwrap();

        let rename = UpdateCategory {
            name: Some("Work".into()),
            color: None,
        };
        assert_eq!(
            CategoryRepository::update(&store, &owner, home.id, rename).await,
            Err(StoreError::Conflict)
        );

        let keep_name = UpdateCategory {
            name: Some("Home".into()),
            color: Some(None),
        };
        let updated = CategoryRepository::update(&store, &owner, home.id, keep_name)
            .await
            .unwrap();
        assert_eq!(updated.color, None);
    }

    #[tokio::test]
    async fn categories_list_by_name() {
        let store = MemoryStore::new();
        let owner = caller();
        for name in ["Work", "Errands", "Home"] {
            CategoryRepository::insert(&store, &owner, new_category(name))
                .await
                .unwrap();
        }
        let names: Vec<String> = CategoryRepository::list(&store, &owner)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Errands", "Home", "Work"]);
    }

    #[tokio::test]
    async fn foreign_category_reference_is_rejected() {
        let store = MemoryStore::new();
        let (owner, other) = (caller(), caller());
        let theirs = CategoryRepository::insert(&store, &other, new_category("Theirs"))
            .await
            .unwrap();

        let mut task = new_task("sneaky");
        task.fields.category_id = Some(theirs.id);
        assert_eq!(
            TaskRepository::insert(&store, &owner, task).await,
            Err(StoreError::InvalidReference("Category"))
        );

        let mine = TaskRepository::insert(&store, &owner, new_task("mine"))
            .await
            .unwrap();
        let changes = TaskChanges {
            fields: UpdateTask {
                category_id: Some(Some(theirs.id)),
                ..UpdateTask::default()
            },
            completed_at: None,
        };
        assert_eq!(
            TaskRepository::update(&store, &owner, mine.id, changes).await,
            Err(StoreError::InvalidReference("Category"))
        );
    }

    #[tokio::test]
    async fn deleting_a_category_detaches_its_tasks() {
        let store = MemoryStore::new();
        let owner = caller();
        let work = CategoryRepository::insert(&store, &owner, new_category("Work"))
            .await
            .unwrap();
        let mut task = new_task("report");
        task.fields.category_id = Some(work.id);
        let task = TaskRepository::insert(&store, &owner, task).await.unwrap();

        CategoryRepository::delete(&store, &owner, work.id)
            .await
            .unwrap();

        let task = TaskRepository::get(&store, &owner, task.id).await.unwrap();
        assert_eq!(task.category_id, None);
        assert_eq!(
            CategoryRepository::delete(&store, &owner, work.id).await,
            Err(StoreError::NotFound)
        );
    }
}
