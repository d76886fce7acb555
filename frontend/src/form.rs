//! Form drafts. Everything here is plain data so it can be tested without a
//! browser; the drafts turn into shared schema commands on submit, so the UI
//! rejects exactly what the server would.

use serde_json::{json, Map, Value};
use taskdeck_shared::schema::check_new_password;
use taskdeck_shared::{
    Category, CreateCategory, CreateTask, Schema, SuggestRequest,
    SuggestionKind, Task, TaskPriority, TaskQuery, TaskStatus, UpdateCategory, UpdateTask,
    ValidationError,
};
use uuid::Uuid;

pub const PRESET_COLORS: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#3b82f6", "#8b5cf6", "#ec4899", "#6b7280",
];
pub const FALLBACK_COLOR: &str = "#6b7280";
const PREVIEW_CHARS: usize = 100;

/// Value of the "all" option in the filter selects.
pub const ANY: &str = "all";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Empty for "no category".
    pub category_id: String,
    /// `YYYY-MM-DD` from the date input, or empty.
    pub due_date: String,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
            priority: task.priority,
            category_id: task.category_id.map(|id| id.to_string()).unwrap_or_default(),
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Blank optional inputs are omitted, or sent as `null` when `clear`.
    fn fields(&self, clear: bool) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("title".into(), self.title.trim().into());
        for (name, raw) in [
            ("description", &self.description),
            ("category_id", &self.category_id),
            ("due_date", &self.due_date),
        ] {
            let raw = raw.trim();
            if !raw.is_empty() {
                fields.insert(name.into(), raw.into());
            } else if clear {
                fields.insert(name.into(), Value::Null);
            }
        }
        fields.insert("status".into(), self.status.as_str().into());
        fields.insert("priority".into(), self.priority.as_str().into());
        fields
    }

    pub fn create_command(&self) -> Result<CreateTask, ValidationError> {
        CreateTask::parse(Value::Object(self.fields(false)))
    }

    /// Every field is sent on edit so cleared inputs clear the stored value.
    pub fn update_command(&self) -> Result<UpdateTask, ValidationError> {
        UpdateTask::parse(Value::Object(self.fields(true)))
    }

    pub fn suggest_request(&self, kind: SuggestionKind) -> Result<SuggestRequest, ValidationError> {
        if !self.can_submit() {
            return Err(ValidationError::new("Please enter a title first"));
        }
        let mut fields = self.fields(false);
        fields.remove("status");
        fields.remove("priority");
        fields.remove("category_id");
        fields.insert("type".into(), json!(kind));
        SuggestRequest::parse(Value::Object(fields))
    }

    /// Folds an AI reply into the draft. Priority replies outside the enum
    /// are ignored.
    pub fn apply_suggestion(&mut self, kind: SuggestionKind, suggestion: &str) {
        match kind {
            SuggestionKind::Description | SuggestionKind::Improve => {
                self.description = suggestion.to_string();
            }
            SuggestionKind::Priority => {
                if let Ok(priority) = suggestion.parse() {
                    self.priority = priority;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryForm {
    pub name: String,
    pub color: String,
}

impl Default for CategoryForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: PRESET_COLORS[0].to_string(),
        }
    }
}

impl CategoryForm {
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            color: category
                .color
                .clone()
                .unwrap_or_else(|| PRESET_COLORS[0].to_string()),
        }
    }

    fn payload(&self) -> Value {
        json!({ "name": self.name.trim(), "color": self.color })
    }

    pub fn create_command(&self) -> Result<CreateCategory, ValidationError> {
        CreateCategory::parse(self.payload())
    }

    pub fn update_command(&self) -> Result<UpdateCategory, ValidationError> {
        UpdateCategory::parse(self.payload())
    }
}

/// Filter select values. Changing any of them refetches the list.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub status: String,
    pub priority: String,
    pub category: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            status: ANY.to_string(),
            priority: ANY.to_string(),
            category: ANY.to_string(),
        }
    }
}

impl Filters {
    pub fn query(&self) -> TaskQuery {
        TaskQuery {
            status: self.status.parse().ok(),
            priority: self.priority.parse().ok(),
            category_id: Uuid::parse_str(&self.category).ok(),
            ..TaskQuery::default()
        }
    }

    pub fn tasks_url(&self) -> String {
        let query = self.query().to_query_string();
        if query.is_empty() {
            "/api/tasks".to_string()
        } else {
            format!("/api/tasks?{query}")
        }
    }
}

/// Checks the reset form before it is sent.
pub fn check_reset(password: &str, confirm: &str) -> Result<(), ValidationError> {
    check_new_password(password)?;
    if password != confirm {
        return Err(ValidationError::new("Passwords do not match"));
    }
    Ok(())
}

/// Reads one parameter from a URL fragment such as
/// `#access_token=...&type=recovery`.
pub fn fragment_param(hash: &str, name: &str) -> Option<String> {
    hash.trim_start_matches('#')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn preview(description: &str) -> String {
    if description.chars().count() > PREVIEW_CHARS {
        let head: String = description.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        description.to_string()
    }
}

pub fn toggled_status(status: TaskStatus) -> TaskStatus {
    if status == TaskStatus::Done {
        TaskStatus::Todo
    } else {
        TaskStatus::Done
    }
}
