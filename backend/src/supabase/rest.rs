//! Task and category tables through PostgREST.
//!
//! Requests carry the caller's own token, so the service's row-level
//! policies apply on top of the explicit `user_id` filter sent here.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use taskdeck_shared::{
    Category, CreateCategory, Task, TaskPriority, TaskQuery, TaskStatus, UpdateCategory,
};
use uuid::Uuid;

use super::{ServiceError, SupabaseClient};
use crate::auth::Caller;
use crate::store::{
    CategoryRepository, CompletedTask, NewTask, StoreError, TaskChanges, TaskRepository,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NO_ROWS: &str = "PGRST116";

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Insert body: the validated fields plus the owner.
#[derive(Serialize)]
struct OwnedRow<'a, T> {
    user_id: Uuid,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct Patch<'a, T> {
    #[serde(flatten)]
    changes: &'a T,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CategoryName {
    name: String,
}

#[derive(Deserialize)]
struct CompletedRow {
    title: String,
    description: Option<String>,
    priority: TaskPriority,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    categories: Option<CategoryName>,
}

async fn store_error(response: reqwest::Response) -> StoreError {
    let (status, body) = ServiceError::read(response).await;
    match body.code() {
        Some(UNIQUE_VIOLATION) => StoreError::Conflict,
        Some(FOREIGN_KEY_VIOLATION) => StoreError::InvalidReference("Category"),
        Some(NO_ROWS) => StoreError::NotFound,
        _ => StoreError::Backend(format!(
            "{status}: {}",
            body.message().unwrap_or("unknown error")
        )),
    }
}

async fn fetch_rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    if !response.status().is_success() {
        return Err(store_error(response).await);
    }
    response
        .json::<Vec<T>>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn first<T>(rows: Vec<T>) -> Result<T, StoreError> {
    rows.into_iter().next().ok_or(StoreError::NotFound)
}

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// A request against `table`, already scoped to the caller's rows.
    fn table(&self, method: Method, table: &str, caller: &Caller) -> RequestBuilder {
        let request = self.client.request(
            method.clone(),
            &format!("/rest/v1/{table}"),
            Some(&caller.access_token),
        );
        let request = if method == Method::POST {
            request
        } else {
            request.query(&[("user_id", eq(caller.id))])
        };
        if method == Method::GET {
            request
        } else {
            request.header("Prefer", "return=representation")
        }
    }

    fn row(&self, method: Method, table: &str, caller: &Caller, id: Uuid) -> RequestBuilder {
        self.table(method, table, caller)
            .query(&[("id", eq(id))])
    }

    /// Rejects category ids that are not among the caller's categories.
    async fn check_category(&self, caller: &Caller, id: Option<Uuid>) -> Result<(), StoreError> {
        let Some(id) = id else {
            return Ok(());
        };
        let rows: Vec<serde_json::Value> = fetch_rows(
            self.row(Method::GET, "categories", caller, id)
                .query(&[("select", "id")]),
        )
        .await?;
        if rows.is_empty() {
            return Err(StoreError::InvalidReference("Category"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for SupabaseStore {
    async fn list(&self, caller: &Caller, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut params = vec![("select", "*".to_string())];
        if let Some(status) = query.status {
            params.push(("status", eq(status)));
        }
        if let Some(priority) = query.priority {
            params.push(("priority", eq(priority)));
        }
        if let Some(category_id) = query.category_id {
            params.push(("category_id", eq(category_id)));
        }
        params.push((
            "order",
            format!("{}.{}", query.sort_or_default().column(), query.order.as_str()),
        ));

        fetch_rows(self.table(Method::GET, "tasks", caller).query(&params)).await
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Task, StoreError> {
        first(
            fetch_rows(
                self.row(Method::GET, "tasks", caller, id)
                    .query(&[("select", "*")]),
            )
            .await?,
        )
    }

    async fn insert(&self, caller: &Caller, task: NewTask) -> Result<Task, StoreError> {
        self.check_category(caller, task.fields.category_id).await?;
        let body = OwnedRow {
            user_id: caller.id,
            body: &task,
        };
        first(fetch_rows(self.table(Method::POST, "tasks", caller).json(&body)).await?)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Task, StoreError> {
        if let Some(category_id) = changes.fields.category_id {
            self.check_category(caller, category_id).await?;
        }
        let body = Patch {
            changes: &changes,
            updated_at: Utc::now(),
        };
        first(fetch_rows(self.row(Method::PATCH, "tasks", caller, id).json(&body)).await?)
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        let deleted: Vec<serde_json::Value> =
            fetch_rows(self.row(Method::DELETE, "tasks", caller, id)).await?;
        first(deleted).map(|_| ())
    }

    async fn completed_between(
        &self,
        caller: &Caller,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CompletedTask>, StoreError> {
        let params = [
            (
                "select",
                "title,description,priority,completed_at,category_id,categories(name)".to_string(),
            ),
            ("status", eq(TaskStatus::Done)),
            ("completed_at", format!("gte.{}", timestamp(start))),
            ("completed_at", format!("lte.{}", timestamp(end))),
            ("order", "completed_at.desc".to_string()),
        ];
        let rows: Vec<CompletedRow> =
            fetch_rows(self.table(Method::GET, "tasks", caller).query(&params)).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(CompletedTask {
                    completed_at: row.completed_at?,
                    title: row.title,
                    description: row.description,
                    priority: row.priority,
                    category: row.categories.map(|c| c.name),
                })
            })
            .collect())
    }
}

#[async_trait]
impl CategoryRepository for SupabaseStore {
    async fn list(&self, caller: &Caller) -> Result<Vec<Category>, StoreError> {
        fetch_rows(
            self.table(Method::GET, "categories", caller)
                .query(&[("select", "*"), ("order", "name.asc")]),
        )
        .await
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Category, StoreError> {
        first(
            fetch_rows(
                self.row(Method::GET, "categories", caller, id)
                    .query(&[("select", "*")]),
            )
            .await?,
        )
    }

    async fn insert(
        &self,
        caller: &Caller,
        category: CreateCategory,
    ) -> Result<Category, StoreError> {
        let body = OwnedRow {
            user_id: caller.id,
            body: &category,
        };
        first(fetch_rows(self.table(Method::POST, "categories", caller).json(&body)).await?)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        changes: UpdateCategory,
    ) -> Result<Category, StoreError> {
        let body = Patch {
            changes: &changes,
            updated_at: Utc::now(),
        };
        first(fetch_rows(self.row(Method::PATCH, "categories", caller, id).json(&body)).await?)
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), StoreError> {
        let deleted: Vec<serde_json::Value> =
            fetch_rows(self.row(Method::DELETE, "categories", caller, id)).await?;
        first(deleted).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use serde_json::json;
    use taskdeck_shared::{CreateTask, UpdateTask};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TASK_ID: &str = "0b8f8a4e-8f0e-4d55-9c7a-3a1c5d1f2e10";

    fn store(server: &MockServer) -> SupabaseStore {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: server.uri(),
            anon_key: "anon-key".into(),
        })
        .unwrap();
        SupabaseStore::new(client)
    }

    fn caller() -> Caller {
        Caller {
            id: Uuid::parse_str("9a1f7d7e-1c1d-4a6b-8c59-0f7b6b2d8c01").unwrap(),
            email: None,
            access_token: "user-jwt".into(),
        }
    }

    fn task_row() -> serde_json::Value {
        json!({
            "id": TASK_ID,
            "user_id": caller().id,
            "title": "Write report",
            "description": null,
            "status": "todo",
            "priority": "high",
            "due_date": "2024-03-10",
            "category_id": null,
            "completed_at": null,
            "created_at": "2024-03-01T12:00:00+00:00",
            "updated_at": "2024-03-01T12:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn list_sends_owner_filter_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("user_id", format!("eq.{}", caller().id)))
            .and(query_param("priority", "eq.high"))
            .and(query_param("order", "due_date.asc"))
            .and(header("authorization", "Bearer user-jwt"))
            .and(header("apikey", "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let query = TaskQuery::from_pairs([("priority", "high"), ("sort", "due_date"), ("order", "asc")])
            .unwrap();
        let tasks = TaskRepository::list(&store(&server), &caller(), &query)
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, TaskPriority::High);
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let id = Uuid::parse_str(TASK_ID).unwrap();
        assert_eq!(
            TaskRepository::get(&store(&server), &caller(), id).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn insert_sends_owner_and_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tasks"))
            .and(header("prefer", "return=representation"))
            .and(body_partial_json(json!({
                "user_id": caller().id,
                "title": "Write report",
                "status": "todo",
                "priority": "high",
                "completed_at": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([task_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let task = NewTask {
            fields: CreateTask {
                title: "Write report".into(),
                description: None,
                status: TaskStatus::Todo,
                priority: TaskPriority::High,
                due_date: None,
                category_id: None,
            },
            completed_at: None,
        };
        let created = TaskRepository::insert(&store(&server), &caller(), task)
            .await
            .unwrap();
        assert_eq!(created.id.to_string(), TASK_ID);
    }

    #[tokio::test]
    async fn update_clears_nullable_columns() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("id", format!("eq.{TASK_ID}")))
            .and(body_partial_json(json!({ "due_date": null, "completed_at": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_row()])))
            .expect(1)
            .mount(&server)
            .await;

        let changes = TaskChanges {
            fields: UpdateTask {
                due_date: Some(None),
                ..UpdateTask::default()
            },
            completed_at: Some(None),
        };
        let id = Uuid::parse_str(TASK_ID).unwrap();
        TaskRepository::update(&store(&server), &caller(), id, changes)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleting_nothing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let id = Uuid::parse_str(TASK_ID).unwrap();
        assert_eq!(
            TaskRepository::delete(&store(&server), &caller(), id).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn unique_violation_is_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "details": "Key (user_id, name)=(...) already exists.",
                "hint": null,
                "message": "duplicate key value violates unique constraint \"categories_user_id_name_key\""
            })))
            .mount(&server)
            .await;

        let category = CreateCategory {
            name: "Work".into(),
            color: None,
        };
        assert_eq!(
            CategoryRepository::insert(&store(&server), &caller(), category).await,
            Err(StoreError::Conflict)
        );
    }

    #[tokio::test]
    async fn foreign_category_is_an_invalid_reference() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let changes = TaskChanges {
            fields: UpdateTask {
                category_id: Some(Some(Uuid::new_v4())),
                ..UpdateTask::default()
            },
            completed_at: None,
        };
        let id = Uuid::parse_str(TASK_ID).unwrap();
        assert_eq!(
            TaskRepository::update(&store(&server), &caller(), id, changes).await,
            Err(StoreError::InvalidReference("Category"))
        );
    }

    #[tokio::test]
    async fn completed_tasks_carry_category_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("status", "eq.done"))
            .and(query_param("order", "completed_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "title": "Ship release",
                    "description": "v1.2",
                    "priority": "high",
                    "completed_at": "2024-03-07T09:30:00+00:00",
                    "category_id": "4a3c8f5e-2b1d-4e6f-9a8b-7c6d5e4f3a2b",
                    "categories": { "name": "Work" }
                },
                {
                    "title": "Water plants",
                    "description": null,
                    "priority": "low",
                    "completed_at": "2024-03-05T18:00:00+00:00",
                    "category_id": null,
                    "categories": null
                }
            ])))
            .mount(&server)
            .await;

        let end = Utc::now();
        let done = TaskRepository::completed_between(
            &store(&server),
            &caller(),
            end - chrono::Duration::days(7),
            end,
        )
        .await
        .unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].category.as_deref(), Some("Work"));
        assert_eq!(done[1].category, None);
    }

    #[tokio::test]
    async fn server_errors_keep_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let error = CategoryRepository::list(&store(&server), &caller())
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Backend(message) if message.starts_with("503")));
    }
}
