//! Types shared by the server and the browser UI: the task/category model,
//! the request schemas, and the response envelope.

pub mod envelope;
pub mod model;
pub mod schema;

pub use envelope::{ApiEnvelope, ApiError, ApiResponse, ErrorBody, ErrorCode};
pub use model::{
    AuthPayload, Category, DateRange, FeatureFlags, MessagePayload, SessionUser, SortOrder,
    Suggestion, SuggestionKind, Task, TaskPriority, TaskSort, TaskStatus, WeeklySummary,
};
pub use schema::{
    CreateCategory, CreateTask, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, Schema, SuggestRequest, TaskQuery, UpdateCategory, UpdateTask,
    ValidationError,
};
