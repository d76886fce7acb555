//! AI suggestions over an OpenRouter-compatible chat-completion API.
//!
//! [`Assistant`] owns the prompt templates and post-processing; the HTTP
//! call itself sits behind [`ChatBackend`] so the templates can be exercised
//! without the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use taskdeck_shared::{SuggestRequest, Suggestion, SuggestionKind, TaskPriority};
use thiserror::Error;

use crate::config::AiConfig;
use crate::store::CompletedTask;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REFERER: &str = "https://task-planner.local";
const TITLE: &str = "Task Planner";

const DESCRIPTION_PROMPT: &str = "You are a helpful assistant that improves task descriptions. \
Given a task title, provide a clear, actionable description in 1-2 sentences. Be concise and practical.";

const PRIORITY_PROMPT: &str = "You are a helpful assistant that suggests task priorities. \
Analyze the task and respond with ONLY one word: \"low\", \"medium\", or \"high\". \
Consider urgency, importance, and due date.";

const IMPROVE_PROMPT: &str = "You are a helpful assistant that improves task descriptions. \
Make the description clearer, more actionable, and well-structured. \
Keep it concise (2-3 sentences max). Do not add unnecessary details.";

const SUMMARY_PROMPT: &str = "You are a helpful assistant that analyzes completed tasks and \
provides insightful weekly summaries. Create a concise summary (3-4 paragraphs) that:
1. Highlights key accomplishments
2. Identifies patterns or themes in the work
3. Notes productivity trends (high priority items, categories focused on)
4. Provides brief encouragement or actionable insights

Be specific, positive, and actionable. Format in markdown.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    /// The provider answered with an error; carries its message.
    #[error("{0}")]
    Upstream(String),

    #[error("No response content from OpenRouter")]
    EmptyReply,

    #[error("AI request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatOptions {
    pub const fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::new(0.7, 500)
    }
}

/// One chat-completion round trip returning the reply text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions)
        -> Result<String, AiError>;
}

// ============================================================================
// OpenRouter
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl OpenRouterClient {
    pub fn new(config: AiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, AiError> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| format!("OpenRouter API error: {}", status.as_u16()));
            return Err(AiError::Upstream(message));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or(AiError::EmptyReply)
    }
}

// ============================================================================
// Prompt templates
// ============================================================================

fn priority_context(title: &str, description: Option<&str>, due_date: Option<NaiveDate>) -> String {
    let mut lines = vec![format!("Task title: {title}")];
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        lines.push(format!("Description: {description}"));
    }
    if let Some(due_date) = due_date {
        lines.push(format!("Due date: {due_date}"));
    }
    lines.join("\n")
}

/// Anything other than exactly one of the three levels becomes `medium`.
pub fn parse_priority(reply: &str) -> TaskPriority {
    match reply.trim().to_lowercase().as_str() {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        _ => TaskPriority::Medium,
    }
}

fn weekly_digest(tasks: &[CompletedTask]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let mut lines = vec![format!("{}. {}", index + 1, task.title)];
            if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("   Description: {description}"));
            }
            lines.push(format!("   Priority: {}", task.priority));
            if let Some(category) = &task.category {
                lines.push(format!("   Category: {category}"));
            }
            lines.push(format!(
                "   Completed: {}",
                task.completed_at.format("%Y-%m-%d")
            ));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct Assistant {
    backend: Arc<dyn ChatBackend>,
}

impl Assistant {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn suggest_description(&self, title: &str) -> Result<String, AiError> {
        let messages = vec![
            ChatMessage::system(DESCRIPTION_PROMPT),
            ChatMessage::user(format!("Suggest a description for this task: \"{title}\"")),
        ];
        self.backend.chat(messages, ChatOptions::new(0.7, 150)).await
    }

    pub async fn suggest_priority(
        &self,
        title: &str,
        description: Option<&str>,
        due_date: Option<NaiveDate>,
    ) -> Result<TaskPriority, AiError> {
        let messages = vec![
            ChatMessage::system(PRIORITY_PROMPT),
            ChatMessage::user(priority_context(title, description, due_date)),
        ];
        let reply = self.backend.chat(messages, ChatOptions::new(0.3, 10)).await?;
        Ok(parse_priority(&reply))
    }

    pub async fn improve_description(
        &self,
        title: &str,
        description: &str,
    ) -> Result<String, AiError> {
        let messages = vec![
            ChatMessage::system(IMPROVE_PROMPT),
            ChatMessage::user(format!(
                "Task: \"{title}\"\nCurrent description: \"{description}\"\n\nImprove this description:"
            )),
        ];
        self.backend.chat(messages, ChatOptions::new(0.5, 200)).await
    }

    pub async fn summarize_week(&self, tasks: &[CompletedTask]) -> Result<String, AiError> {
        let messages = vec![
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(format!(
                "Here are my completed tasks from the past 7 days:\n\n{}\n\nProvide a weekly summary.",
                weekly_digest(tasks)
            )),
        ];
        self.backend.chat(messages, ChatOptions::new(0.7, 500)).await
    }

    /// Runs the template selected by `request.kind`.
    pub async fn suggest(&self, request: &SuggestRequest) -> Result<Suggestion, AiError> {
        let suggestion = match request.kind {
            SuggestionKind::Description => self.suggest_description(&request.title).await?,
            SuggestionKind::Priority => self
                .suggest_priority(
                    &request.title,
                    request.description.as_deref(),
                    request.due_date,
                )
                .await?
                .to_string(),
            SuggestionKind::Improve => {
                self.improve_description(
                    &request.title,
                    request.description.as_deref().unwrap_or_default(),
                )
                .await?
            }
        };
        Ok(Suggestion {
            suggestion,
            kind: request.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replies with a fixed text and records what it was asked.
    struct Echo {
        reply: String,
        seen: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
    }

    impl Echo {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> (Vec<ChatMessage>, ChatOptions) {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for Echo {
        async fn chat(
            &self,
            messages: Vec<ChatMessage>,
            options: ChatOptions,
        ) -> Result<String, AiError> {
            self.seen.lock().unwrap().push((messages, options));
            Ok(self.reply.clone())
        }
    }

    fn client(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new(AiConfig {
            api_key: "sk-test".into(),
            model: "test/model".into(),
            endpoint: format!("{}/api/v1/chat/completions", server.uri()),
        })
        .unwrap()
    }

    #[rstest]
    #[case("low", TaskPriority::Low)]
    #[case("  HIGH\n", TaskPriority::High)]
    #[case("Medium", TaskPriority::Medium)]
    #[case("urgent", TaskPriority::Medium)]
    #[case("high priority", TaskPriority::Medium)]
    #[case("", TaskPriority::Medium)]
    fn priority_replies_normalize(#[case] reply: &str, #[case] expected: TaskPriority) {
        assert_eq!(parse_priority(reply), expected);
    }

    #[test]
    fn priority_context_skips_missing_fields() {
        assert_eq!(priority_context("Pay rent", None, None), "Task title: Pay rent");
        let due = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(
            priority_context("Pay rent", Some("Before the 1st"), due),
            "Task title: Pay rent\nDescription: Before the 1st\nDue date: 2024-03-31"
        );
    }

    #[test]
    fn weekly_digest_numbers_tasks() {
        let tasks = vec![
            CompletedTask {
                title: "Ship release".into(),
                description: Some("v1.2".into()),
                priority: TaskPriority::High,
                completed_at: Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0).unwrap(),
                category: Some("Work".into()),
            },
            CompletedTask {
                title: "Water plants".into(),
                description: None,
                priority: TaskPriority::Low,
                completed_at: Utc.with_ymd_and_hms(2024, 3, 5, 18, 0, 0).unwrap(),
                category: None,
            },
        ];
        assert_eq!(
            weekly_digest(&tasks),
            "1. Ship release\n   Description: v1.2\n   Priority: high\n   Category: Work\n   Completed: 2024-03-07\n\n\
             2. Water plants\n   Priority: low\n   Completed: 2024-03-05"
        );
    }

    #[tokio::test]
    async fn suggest_dispatches_by_kind() {
        let echo = Echo::new("HIGH");
        let assistant = Assistant::new(echo.clone());
        let request = SuggestRequest {
            kind: SuggestionKind::Priority,
            title: "Fix outage".into(),
            description: None,
            due_date: None,
        };

        let suggestion = assistant.suggest(&request).await.unwrap();
        assert_eq!(suggestion.suggestion, "high");
        assert_eq!(suggestion.kind, SuggestionKind::Priority);

        let (messages, options) = echo.last();
        assert_eq!(options, ChatOptions::new(0.3, 10));
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Task title: Fix outage");
    }

    #[tokio::test]
    async fn improve_quotes_title_and_description() {
        let echo = Echo::new("Better text");
        let assistant = Assistant::new(echo.clone());
        let improved = assistant
            .improve_description("Report", "do the report")
            .await
            .unwrap();
        assert_eq!(improved, "Better text");

        let (messages, options) = echo.last();
        assert_eq!(options, ChatOptions::new(0.5, 200));
        assert_eq!(
            messages[1].content,
            "Task: \"Report\"\nCurrent description: \"do the report\"\n\nImprove this description:"
        );
    }

    #[tokio::test]
    async fn openrouter_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("http-referer", REFERER))
            .and(header("x-title", TITLE))
            .and(body_partial_json(json!({
                "model": "test/model",
                "max_tokens": 150,
                "messages": [
                    { "role": "system", "content": DESCRIPTION_PROMPT },
                    { "role": "user", "content": "Suggest a description for this task: \"Plan trip\"" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "gen-1",
                "choices": [
                    { "message": { "role": "assistant", "content": "Book flights." }, "finish_reason": "stop" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let assistant = Assistant::new(Arc::new(client(&server)));
        let reply = assistant.suggest_description("Plan trip").await.unwrap();
        assert_eq!(reply, "Book flights.");
    }

    #[tokio::test]
    async fn upstream_error_message_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit exceeded", "type": "rate_limit", "code": "429" }
            })))
            .mount(&server)
            .await;

        let error = client(&server)
            .chat(vec![ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error, AiError::Upstream("Rate limit exceeded".into()));
    }

    #[tokio::test]
    async fn upstream_error_without_body_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let error = client(&server)
            .chat(vec![ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "OpenRouter API error: 502");
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let error = client(&server)
            .chat(vec![ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "No response content from OpenRouter");
    }
}
