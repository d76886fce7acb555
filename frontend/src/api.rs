//! Browser fetch calls against the JSON API. Every call resolves to the
//! envelope's `data` or to the error message the server sent.

use serde::{de::DeserializeOwned, Serialize};
use taskdeck_shared::{
    ApiEnvelope, AuthPayload, Category, CreateCategory, CreateTask, FeatureFlags,
    ForgotPasswordRequest, LoginRequest, MessagePayload, RegisterRequest, ResetPasswordRequest,
    SuggestRequest, Suggestion, Task, UpdateCategory, UpdateTask, WeeklySummary,
};
use uuid::Uuid;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Request, RequestCredentials, RequestInit, Response};

async fn send(method: &str, url: &str, body: Option<String>) -> Result<Response, String> {
    let opts = RequestInit::new();
    opts.set_method(method);
    opts.set_credentials(RequestCredentials::SameOrigin);
    if let Some(body) = &body {
        opts.set_body(&JsValue::from_str(body));
    }

    let request =
        Request::new_with_str_and_init(url, &opts).map_err(|_| "Failed to create request")?;
    if body.is_some() {
        request
            .headers()
            .set("Content-Type", "application/json")
            .map_err(|_| "Failed to set header")?;
    }

    let promise = window()
        .ok_or("No browser window")?
        .fetch_with_request(&request);
    let response: Response = JsFuture::from(promise)
        .await
        .map_err(|_| "Failed to send request")?
        .into();
    Ok(response)
}

async fn read_text(response: &Response) -> Result<String, String> {
    let text_promise = response.text().map_err(|_| "Failed to read response")?;
    JsFuture::from(text_promise)
        .await
        .map_err(|_| "Failed to get text")?
        .as_string()
        .ok_or_else(|| "Failed to convert to string".to_string())
}

fn decode<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, String> {
    match serde_json::from_str::<ApiEnvelope<T>>(text) {
        Ok(envelope) => envelope.into_result().map_err(|error| error.message),
        Err(_) if status >= 400 => Err(format!("Request failed ({status})")),
        Err(e) => Err(format!("Failed to parse JSON: {e}")),
    }
}

async fn call<T, B>(method: &str, url: &str, body: Option<&B>) -> Result<T, String>
where
    T: DeserializeOwned,
    B: Serialize,
{
    let body = body
        .map(serde_json::to_string)
        .transpose()
        .map_err(|_| "Failed to serialize request")?;
    let response = send(method, url, body).await?;
    let text = read_text(&response).await?;
    decode(response.status(), &text)
}

async fn get<T: DeserializeOwned>(url: &str) -> Result<T, String> {
    call::<T, ()>("GET", url, None).await
}

/// For routes answering 204 on success.
async fn delete(url: &str) -> Result<(), String> {
    let response = send("DELETE", url, None).await?;
    if response.ok() {
        return Ok(());
    }
    let text = read_text(&response).await?;
    decode::<()>(response.status(), &text)
}

pub async fn fetch_tasks(url: String) -> Result<Vec<Task>, String> {
    get(&url).await
}

pub async fn create_task(command: CreateTask) -> Result<Task, String> {
    call("POST", "/api/tasks", Some(&command)).await
}

pub async fn update_task(id: Uuid, changes: UpdateTask) -> Result<Task, String> {
    call("PUT", &format!("/api/tasks/{id}"), Some(&changes)).await
}

pub async fn delete_task(id: Uuid) -> Result<(), String> {
    delete(&format!("/api/tasks/{id}")).await
}

pub async fn fetch_categories() -> Result<Vec<Category>, String> {
    get("/api/categories").await
}

pub async fn create_category(command: CreateCategory) -> Result<Category, String> {
    call("POST", "/api/categories", Some(&command)).await
}

pub async fn update_category(id: Uuid, changes: UpdateCategory) -> Result<Category, String> {
    call("PUT", &format!("/api/categories/{id}"), Some(&changes)).await
}

pub async fn delete_category(id: Uuid) -> Result<(), String> {
    delete(&format!("/api/categories/{id}")).await
}

pub async fn fetch_features() -> Result<FeatureFlags, String> {
    get("/api/features").await
}

pub async fn suggest(request: SuggestRequest) -> Result<Suggestion, String> {
    call("POST", "/api/ai/suggest", Some(&request)).await
}

pub async fn summarize_week() -> Result<WeeklySummary, String> {
    get("/api/ai/summarize-week").await
}

pub async fn login(request: LoginRequest) -> Result<AuthPayload, String> {
    call("POST", "/api/auth/login", Some(&request)).await
}

pub async fn register(request: RegisterRequest) -> Result<AuthPayload, String> {
    call("POST", "/api/auth/register", Some(&request)).await
}

pub async fn logout() -> Result<MessagePayload, String> {
    call::<_, ()>("POST", "/api/auth/logout", None).await
}

pub async fn forgot_password(request: ForgotPasswordRequest) -> Result<MessagePayload, String> {
    call("POST", "/api/auth/forgot-password", Some(&request)).await
}

pub async fn reset_password(request: ResetPasswordRequest) -> Result<AuthPayload, String> {
    call("POST", "/api/auth/reset-password", Some(&request)).await
}
