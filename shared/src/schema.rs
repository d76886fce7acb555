//! Command and query schemas.
//!
//! Every payload the API accepts is decoded from an untyped JSON value (or URL
//! query pairs) into a typed command. Fields are checked in declaration order
//! and the first violated rule is reported, so the same message reaches the
//! client regardless of how many fields are wrong.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::model::{SortOrder, SuggestionKind, TaskPriority, TaskSort, TaskStatus};

pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 5000;
pub const CATEGORY_NAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 6;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("hex color pattern compiles")
});

/// First failing rule of a payload, carried as a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn invalid_json() -> Self {
        Self::new("Invalid JSON body")
    }
}

/// A payload that can be decoded and validated from untyped JSON.
pub trait Schema: Sized {
    fn parse(value: Value) -> Result<Self, ValidationError>;

    /// Parses a raw request body. Bytes that are not JSON are rejected before
    /// any field rule runs.
    fn parse_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::invalid_json())?;
        Self::parse(value)
    }
}

/// Field access over a JSON object. Unknown keys are ignored.
struct Fields(Map<String, Value>);

impl Fields {
    fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ValidationError::new("Expected a JSON object")),
        }
    }

    /// Absent and `null` both decode to `None`.
    fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ValidationError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(name, value).map(Some),
        }
    }

    /// Absent decodes to `None`, `null` to `Some(None)`.
    fn nullable<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<Option<T>>, ValidationError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(value) => decode(name, value).map(|v| Some(Some(v))),
        }
    }

    fn required<T: DeserializeOwned>(
        &self,
        name: &str,
        missing: &str,
    ) -> Result<T, ValidationError> {
        self.optional(name)?
            .ok_or_else(|| ValidationError::new(missing))
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ValidationError> {
    T::deserialize(value).map_err(|e| ValidationError::new(format!("{name}: {e}")))
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

pub fn check_title(title: &str) -> Result<(), ValidationError> {
    match char_len(title) {
        0 => Err(ValidationError::new("Title is required")),
        n if n > TITLE_MAX => Err(ValidationError::new(format!(
            "Title must be at most {TITLE_MAX} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn check_description(description: &str) -> Result<(), ValidationError> {
    if char_len(description) > DESCRIPTION_MAX {
        return Err(ValidationError::new(format!(
            "Description must be at most {DESCRIPTION_MAX} characters"
        )));
    }
    Ok(())
}

pub fn check_category_name(name: &str) -> Result<(), ValidationError> {
    match char_len(name) {
        0 => Err(ValidationError::new("Name is required")),
        n if n > CATEGORY_NAME_MAX => Err(ValidationError::new(format!(
            "Name must be at most {CATEGORY_NAME_MAX} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn check_color(color: &str) -> Result<(), ValidationError> {
    if HEX_COLOR.is_match(color) {
        Ok(())
    } else {
        Err(ValidationError::new("Invalid hex color"))
    }
}

pub fn check_email(email: &str) -> Result<(), ValidationError> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("Invalid email address"))
    }
}

pub fn check_new_password(password: &str) -> Result<(), ValidationError> {
    if char_len(password) < PASSWORD_MIN {
        return Err(ValidationError::new(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

/// Calendar date in strict `YYYY-MM-DD` form.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    if raw.len() != 10 {
        return Err(ValidationError::new("Invalid date"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ValidationError::new("Invalid date"))
}

/// Hyphenated UUID string.
pub fn parse_uuid(raw: &str) -> Result<Uuid, ValidationError> {
    if raw.len() != 36 {
        return Err(ValidationError::new("Invalid uuid"));
    }
    Uuid::parse_str(raw).map_err(|_| ValidationError::new("Invalid uuid"))
}

fn optional_text(
    fields: &Fields,
    name: &str,
    check: fn(&str) -> Result<(), ValidationError>,
) -> Result<Option<String>, ValidationError> {
    let value: Option<String> = fields.optional(name)?;
    if let Some(text) = &value {
        check(text)?;
    }
    Ok(value)
}

fn nullable_text(
    fields: &Fields,
    name: &str,
    check: fn(&str) -> Result<(), ValidationError>,
) -> Result<Option<Option<String>>, ValidationError> {
    let value: Option<Option<String>> = fields.nullable(name)?;
    if let Some(Some(text)) = &value {
        check(text)?;
    }
    Ok(value)
}

fn optional_date(fields: &Fields, name: &str) -> Result<Option<NaiveDate>, ValidationError> {
    fields
        .optional::<String>(name)?
        .map(|raw| parse_date(&raw))
        .transpose()
}

fn nullable_date(
    fields: &Fields,
    name: &str,
) -> Result<Option<Option<NaiveDate>>, ValidationError> {
    Ok(match fields.nullable::<String>(name)? {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) => Some(Some(parse_date(&raw)?)),
    })
}

fn optional_uuid(fields: &Fields, name: &str) -> Result<Option<Uuid>, ValidationError> {
    fields
        .optional::<String>(name)?
        .map(|raw| parse_uuid(&raw))
        .transpose()
}

fn nullable_uuid(fields: &Fields, name: &str) -> Result<Option<Option<Uuid>>, ValidationError> {
    Ok(match fields.nullable::<String>(name)? {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) => Some(Some(parse_uuid(&raw)?)),
    })
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
}

impl Schema for CreateTask {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let title: String = fields.required("title", "Title is required")?;
        check_title(&title)?;

        Ok(Self {
            title,
            description: optional_text(&fields, "description", check_description)?,
            status: fields.optional("status")?.unwrap_or_default(),
            priority: fields.optional("priority")?.unwrap_or_default(),
            due_date: optional_date(&fields, "due_date")?,
            category_id: optional_uuid(&fields, "category_id")?,
        })
    }
}

/// Partial task update. Only supplied fields change; `Some(None)` clears a
/// nullable column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<Uuid>>,
}

impl UpdateTask {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Schema for UpdateTask {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        Ok(Self {
            title: optional_text(&fields, "title", check_title)?,
            description: nullable_text(&fields, "description", check_description)?,
            status: fields.optional("status")?,
            priority: fields.optional("priority")?,
            due_date: nullable_date(&fields, "due_date")?,
            category_id: nullable_uuid(&fields, "category_id")?,
        })
    }
}

/// Filters and ordering for task listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category_id: Option<Uuid>,
    pub sort: Option<TaskSort>,
    pub order: SortOrder,
}

impl TaskQuery {
    /// Builds a query from URL query pairs. Empty values count as absent and
    /// the first occurrence of a repeated key wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut status = None;
        let mut priority = None;
        let mut category_id = None;
        let mut sort = None;
        let mut order = None;

        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "status" => &mut status,
                "priority" => &mut priority,
                "category_id" => &mut category_id,
                "sort" => &mut sort,
                "order" => &mut order,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }

        Ok(Self {
            status: status
                .map(|s| s.parse().map_err(ValidationError::new))
                .transpose()?,
            priority: priority
                .map(|p| p.parse().map_err(ValidationError::new))
                .transpose()?,
            category_id: category_id.map(|c| parse_uuid(&c)).transpose()?,
            sort: sort
                .map(|s| s.parse().map_err(ValidationError::new))
                .transpose()?,
            order: order
                .map(|o| o.parse().map_err(ValidationError::new))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn sort_or_default(&self) -> TaskSort {
        self.sort.unwrap_or(TaskSort::CreatedAt)
    }

    /// Encodes the non-default parts as a URL query string (without `?`).
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(status) = self.status {
            parts.push(format!("status={status}"));
        }
        if let Some(priority) = self.priority {
            parts.push(format!("priority={priority}"));
        }
        if let Some(category_id) = self.category_id {
            parts.push(format!("category_id={category_id}"));
        }
        if let Some(sort) = self.sort {
            parts.push(format!("sort={}", sort.column()));
        }
        if self.order != SortOrder::default() {
            parts.push(format!("order={}", self.order.as_str()));
        }
        parts.join("&")
    }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCategory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Schema for CreateCategory {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let name: String = fields.required("name", "Name is required")?;
        check_category_name(&name)?;

        Ok(Self {
            name,
            color: optional_text(&fields, "color", check_color)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateCategory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
}

impl Schema for UpdateCategory {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        Ok(Self {
            name: optional_text(&fields, "name", check_category_name)?,
            color: nullable_text(&fields, "color", check_color)?,
        })
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Schema for LoginRequest {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let email: String = fields.required("email", "Invalid email address")?;
        check_email(&email)?;
        let password: String = fields.required("password", "Password is required")?;
        if password.is_empty() {
            return Err(ValidationError::new("Password is required"));
        }

        Ok(Self { email, password })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

impl Schema for RegisterRequest {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let email: String = fields.required("email", "Invalid email address")?;
        check_email(&email)?;
        let password: String = fields.required("password", "Password is required")?;
        check_new_password(&password)?;

        Ok(Self { email, password })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl Schema for ForgotPasswordRequest {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let email: String = fields.required("email", "Invalid email address")?;
        check_email(&email)?;

        Ok(Self { email })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    /// Recovery token from the e-mailed link. When absent the session
    /// cookie is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Schema for ResetPasswordRequest {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let password: String = fields.required("password", "Password is required")?;
        check_new_password(&password)?;

        Ok(Self {
            password,
            access_token: fields
                .optional::<String>("access_token")?
                .filter(|token| !token.is_empty()),
        })
    }
}

// ============================================================================
// AI
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestRequest {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl Schema for SuggestRequest {
    fn parse(value: Value) -> Result<Self, ValidationError> {
        let fields = Fields::from_value(value)?;

        let kind: SuggestionKind = fields.required("type", "Suggestion type is required")?;
        let title: String = fields.required("title", "Title is required")?;
        check_title(&title)?;
        let description = optional_text(&fields, "description", check_description)?;
        let due_date = optional_date(&fields, "due_date")?;

        if kind == SuggestionKind::Improve && description.is_none() {
            return Err(ValidationError::new(
                "Description is required for improve type",
            ));
        }

        Ok(Self {
            kind,
            title,
            description,
            due_date,
        })
    }
}
