use std::collections::HashMap;

use sauron::prelude::*;
use taskdeck_shared::{
    Category, CreateCategory, CreateTask, FeatureFlags, ForgotPasswordRequest, LoginRequest,
    RegisterRequest, ResetPasswordRequest, Schema, Suggestion, SuggestionKind, Task,
    UpdateCategory, UpdateTask, WeeklySummary,
};
use uuid::Uuid;
use web_sys::{console, window};

mod api;
mod form;
mod summary;
mod views;

use form::{CategoryForm, Filters, TaskForm};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Page {
    Home,
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
}

impl Page {
    fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/login" => Page::Login,
            "/register" => Page::Register,
            "/forgot-password" => Page::ForgotPassword,
            "/reset-password" => Page::ResetPassword,
            _ => Page::Home,
        }
    }

    fn is_auth(&self) -> bool {
        *self != Page::Home
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    // Loading
    LoadTasks,
    TasksLoaded(Vec<Task>),
    CategoriesLoaded(Vec<Category>),
    FeaturesLoaded(FeatureFlags),

    // Filters
    SetStatusFilter(String),
    SetPriorityFilter(String),
    SetCategoryFilter(String),

    // Task cards
    ToggleTask(Uuid),
    TaskUpdated(Task),
    RevertTask(Task, String),
    DeleteTask(Uuid),
    TaskDeleted(Uuid),

    // Task dialog
    OpenNewTask,
    EditTask(Uuid),
    CloseDialog,
    SetTitle(String),
    SetDescription(String),
    SetStatus(String),
    SetPriority(String),
    SetCategory(String),
    SetDueDate(String),
    SaveTask,
    TaskSaved(Task),
    DialogFailed(String),
    RequestSuggestion(SuggestionKind),
    SuggestionReceived(Suggestion),
    SuggestionFailed(String),

    // Category manager
    OpenCategories,
    CloseCategories,
    EditCategory(Uuid),
    CancelCategoryEdit,
    SetCategoryName(String),
    SetCategoryColor(String),
    SaveCategory,
    CategorySaved(Category),
    DeleteCategory(Uuid),
    CategoryDeleted(Uuid),
    CategoryFailed(String),

    // Weekly summary
    GenerateSummary,
    SummaryLoaded(WeeklySummary),
    SummaryFailed(String),

    // Auth pages
    SetEmail(String),
    SetPassword(String),
    SetConfirm(String),
    SubmitAuth,
    AuthSucceeded(Option<String>),
    AuthFailed(String),
    Logout,

    DismissError,
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct TaskDialog {
    editing: Option<Uuid>,
    form: TaskForm,
    saving: bool,
    ai_loading: Option<SuggestionKind>,
    error: Option<String>,
}

enum TaskWrite {
    Create(CreateTask),
    Update(Uuid, UpdateTask),
}

enum CategoryWrite {
    Create(CreateCategory),
    Update(Uuid, UpdateCategory),
}

#[derive(Debug, Clone, Default)]
pub struct CategoryManager {
    editing: Option<Uuid>,
    form: CategoryForm,
    saving: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryPanel {
    loading: bool,
    summary: Option<WeeklySummary>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    email: String,
    password: String,
    confirm: String,
    /// Recovery token taken from the reset link's URL fragment.
    token: Option<String>,
    busy: bool,
    notice: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Model {
    page: Page,
    tasks: Vec<Task>,
    categories: Vec<Category>,
    features: FeatureFlags,
    filters: Filters,
    loading: bool,
    error: Option<String>,
    // Tasks with a request in flight
    task_loading_states: HashMap<Uuid, bool>,
    dialog: Option<TaskDialog>,
    category_manager: Option<CategoryManager>,
    summary: SummaryPanel,
    auth: AuthForm,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            page: Page::Home,
            tasks: Vec::new(),
            categories: Vec::new(),
            features: FeatureFlags::default(),
            filters: Filters::default(),
            loading: true,
            error: None,
            task_loading_states: HashMap::new(),
            dialog: None,
            category_manager: None,
            summary: SummaryPanel::default(),
            auth: AuthForm::default(),
        }
    }
}

fn confirm(message: &str) -> bool {
    window()
        .and_then(|w| w.confirm_with_message(message).ok())
        .unwrap_or(false)
}

fn navigate(path: &str) {
    if let Some(window) = window() {
        if window.location().set_href(path).is_err() {
            console::error_1(&format!("Failed to navigate to {path}").into());
        }
    }
}

impl Application for Model {
    type MSG = Msg;

    fn init(&mut self) -> Cmd<Msg> {
        if let Some(window) = window() {
            let location = window.location();
            if let Ok(pathname) = location.pathname() {
                self.page = Page::from_path(&pathname);
            }
            if self.page == Page::ResetPassword {
                self.auth.token = location
                    .hash()
                    .ok()
                    .and_then(|hash| form::fragment_param(&hash, "access_token"));
                if self.auth.token.is_none() {
                    self.auth.error = Some(
                        "Invalid or expired reset link. Please request a new password reset."
                            .to_string(),
                    );
                }
            }
        }

        if self.page.is_auth() {
            return Cmd::none();
        }

        Cmd::batch(vec![
            Cmd::new(async { Msg::LoadTasks }),
            Cmd::new(async {
                match api::fetch_categories().await {
                    Ok(categories) => Msg::CategoriesLoaded(categories),
                    // Not critical: the list still works without names.
                    Err(_) => Msg::CategoriesLoaded(Vec::new()),
                }
            }),
            Cmd::new(async {
                match api::fetch_features().await {
                    Ok(features) => Msg::FeaturesLoaded(features),
                    Err(e) => Msg::Error(e),
                }
            }),
        ])
    }

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        match msg {
            Msg::LoadTasks => {
                self.loading = true;
                let url = self.filters.tasks_url();
                Cmd::new(async move {
                    match api::fetch_tasks(url).await {
                        Ok(tasks) => Msg::TasksLoaded(tasks),
                        Err(e) => Msg::Error(e),
                    }
                })
            }
            Msg::TasksLoaded(tasks) => {
                self.tasks = tasks;
                self.loading = false;
                Cmd::none()
            }
            Msg::CategoriesLoaded(categories) => {
                self.categories = categories;
                Cmd::none()
            }
            Msg::FeaturesLoaded(features) => {
                self.features = features;
                Cmd::none()
            }

            Msg::SetStatusFilter(value) => {
                self.filters.status = value;
                self.update(Msg::LoadTasks)
            }
            Msg::SetPriorityFilter(value) => {
                self.filters.priority = value;
                self.update(Msg::LoadTasks)
            }
            Msg::SetCategoryFilter(value) => {
                self.filters.category = value;
                self.update(Msg::LoadTasks)
            }

            Msg::ToggleTask(id) => {
                let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
                    return Cmd::none();
                };
                let previous = task.clone();
                let status = form::toggled_status(task.status);

                // Optimistic: flip locally, reconcile with the server reply.
                task.status = status;
                self.task_loading_states.insert(id, true);

                Cmd::new(async move {
                    match api::update_task(id, UpdateTask::status(status)).await {
                        Ok(updated) => Msg::TaskUpdated(updated),
                        Err(e) => Msg::RevertTask(previous, e),
                    }
                })
            }
            Msg::TaskUpdated(updated) => {
                self.task_loading_states.remove(&updated.id);
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == updated.id) {
                    *task = updated;
                }
                Cmd::none()
            }
            Msg::RevertTask(previous, error) => {
                self.task_loading_states.remove(&previous.id);
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == previous.id) {
                    *task = previous;
                }
                self.error = Some(error);
                Cmd::none()
            }
            Msg::DeleteTask(id) => {
                if !confirm("Are you sure you want to delete this task?") {
                    return Cmd::none();
                }
                self.task_loading_states.insert(id, true);
                Cmd::new(async move {
                    match api::delete_task(id).await {
                        Ok(()) => Msg::TaskDeleted(id),
                        Err(e) => Msg::Error(e),
                    }
                })
            }
            Msg::TaskDeleted(id) => {
                self.tasks.retain(|t| t.id != id);
                self.task_loading_states.remove(&id);
                Cmd::none()
            }

            Msg::OpenNewTask => {
                self.dialog = Some(TaskDialog::default());
                Cmd::none()
            }
            Msg::EditTask(id) => {
                if let Some(task) = self.tasks.iter().find(|t| t.id == id) {
                    self.dialog = Some(TaskDialog {
                        editing: Some(id),
                        form: TaskForm::from_task(task),
                        ..TaskDialog::default()
                    });
                }
                Cmd::none()
            }
            Msg::CloseDialog => {
                self.dialog = None;
                Cmd::none()
            }
            Msg::SetTitle(value) => self.edit_form(|form| form.title = value),
            Msg::SetDescription(value) => self.edit_form(|form| form.description = value),
            Msg::SetStatus(value) => self.edit_form(|form| {
                if let Ok(status) = value.parse() {
                    form.status = status;
                }
            }),
            Msg::SetPriority(value) => self.edit_form(|form| {
                if let Ok(priority) = value.parse() {
                    form.priority = priority;
                }
            }),
            Msg::SetCategory(value) => self.edit_form(|form| form.category_id = value),
            Msg::SetDueDate(value) => self.edit_form(|form| form.due_date = value),
            Msg::SaveTask => {
                let Some(dialog) = self.dialog.as_mut() else {
                    return Cmd::none();
                };
                if dialog.saving {
                    return Cmd::none();
                }
                let write = match dialog.editing {
                    Some(id) => dialog.form.update_command().map(|changes| TaskWrite::Update(id, changes)),
                    None => dialog.form.create_command().map(TaskWrite::Create),
                };
                let write = match write {
                    Ok(write) => write,
                    Err(e) => {
                        dialog.error = Some(e.message);
                        return Cmd::none();
                    }
                };
                dialog.saving = true;
                dialog.error = None;

                Cmd::new(async move {
                    let saved = match write {
                        TaskWrite::Create(command) => api::create_task(command).await,
                        TaskWrite::Update(id, changes) => api::update_task(id, changes).await,
                    };
                    match saved {
                        Ok(task) => Msg::TaskSaved(task),
                        Err(e) => Msg::DialogFailed(e),
                    }
                })
            }
            Msg::TaskSaved(saved) => {
                self.dialog = None;
                match self.tasks.iter_mut().find(|t| t.id == saved.id) {
                    Some(task) => *task = saved,
                    None => self.tasks.insert(0, saved),
                }
                // Filters or sort may no longer hold for the saved row.
                self.update(Msg::LoadTasks)
            }
            Msg::DialogFailed(error) => {
                if let Some(dialog) = self.dialog.as_mut() {
                    dialog.saving = false;
                    dialog.error = Some(error).filter(|e| !e.is_empty());
                }
                Cmd::none()
            }
            Msg::RequestSuggestion(kind) => {
                let Some(dialog) = self.dialog.as_mut() else {
                    return Cmd::none();
                };
                if dialog.ai_loading.is_some() {
                    return Cmd::none();
                }
                let request = match dialog.form.suggest_request(kind) {
                    Ok(request) => request,
                    Err(e) => {
                        dialog.error = Some(e.message);
                        return Cmd::none();
                    }
                };
                dialog.ai_loading = Some(kind);
                dialog.error = None;
                Cmd::new(async move {
                    match api::suggest(request).await {
                        Ok(suggestion) => Msg::SuggestionReceived(suggestion),
                        Err(e) => Msg::SuggestionFailed(e),
                    }
                })
            }
            Msg::SuggestionReceived(suggestion) => {
                if let Some(dialog) = self.dialog.as_mut() {
                    dialog.ai_loading = None;
                    dialog
                        .form
                        .apply_suggestion(suggestion.kind, &suggestion.suggestion);
                }
                Cmd::none()
            }
            Msg::SuggestionFailed(error) => {
                if let Some(dialog) = self.dialog.as_mut() {
                    dialog.ai_loading = None;
                    dialog.error = Some(error);
                }
                Cmd::none()
            }

            Msg::OpenCategories => {
                self.category_manager = Some(CategoryManager::default());
                Cmd::none()
            }
            Msg::CloseCategories => {
                self.category_manager = None;
                Cmd::none()
            }
            Msg::EditCategory(id) => {
                let category = self.categories.iter().find(|c| c.id == id).cloned();
                if let (Some(manager), Some(category)) = (self.category_manager.as_mut(), category) {
                    manager.editing = Some(id);
                    manager.form = CategoryForm::from_category(&category);
                    manager.error = None;
                }
                Cmd::none()
            }
            Msg::CancelCategoryEdit => {
                if let Some(manager) = self.category_manager.as_mut() {
                    manager.editing = None;
                    manager.form = CategoryForm::default();
                }
                Cmd::none()
            }
            Msg::SetCategoryName(value) => {
                if let Some(manager) = self.category_manager.as_mut() {
                    manager.form.name = value;
                }
                Cmd::none()
            }
            Msg::SetCategoryColor(value) => {
                if let Some(manager) = self.category_manager.as_mut() {
                    manager.form.color = value;
                }
                Cmd::none()
            }
            Msg::SaveCategory => {
                let Some(manager) = self.category_manager.as_mut() else {
                    return Cmd::none();
                };
                if manager.saving {
                    return Cmd::none();
                }
                let write = match manager.editing {
                    Some(id) => manager.form.update_command().map(|changes| CategoryWrite::Update(id, changes)),
                    None => manager.form.create_command().map(CategoryWrite::Create),
                };
                let write = match write {
                    Ok(write) => write,
                    Err(e) => {
                        manager.error = Some(e.message);
                        return Cmd::none();
                    }
                };
                manager.saving = true;
                manager.error = None;

                Cmd::new(async move {
                    let saved = match write {
                        CategoryWrite::Create(command) => api::create_category(command).await,
                        CategoryWrite::Update(id, changes) => api::update_category(id, changes).await,
                    };
                    match saved {
                        Ok(category) => Msg::CategorySaved(category),
                        Err(e) => Msg::CategoryFailed(e),
                    }
                })
            }
            Msg::CategorySaved(saved) => {
                match self.categories.iter_mut().find(|c| c.id == saved.id) {
                    Some(category) => *category = saved,
                    None => self.categories.push(saved),
                }
                self.categories.sort_by(|a, b| a.name.cmp(&b.name));
                if let Some(manager) = self.category_manager.as_mut() {
                    *manager = CategoryManager::default();
                }
                Cmd::none()
            }
            Msg::DeleteCategory(id) => {
                let Some(name) = self.categories.iter().find(|c| c.id == id).map(|c| c.name.clone())
                else {
                    return Cmd::none();
                };
                if !confirm(&format!("Delete category \"{name}\"?")) {
                    return Cmd::none();
                }
                Cmd::new(async move {
                    match api::delete_category(id).await {
                        Ok(()) => Msg::CategoryDeleted(id),
                        Err(e) => Msg::CategoryFailed(e),
                    }
                })
            }
            Msg::CategoryDeleted(id) => {
                self.categories.retain(|c| c.id != id);
                for task in self.tasks.iter_mut().filter(|t| t.category_id == Some(id)) {
                    task.category_id = None;
                }
                if self.filters.category == id.to_string() {
                    self.filters.category = form::ANY.to_string();
                    return self.update(Msg::LoadTasks);
                }
                Cmd::none()
            }
            Msg::CategoryFailed(error) => {
                if let Some(manager) = self.category_manager.as_mut() {
                    manager.saving = false;
                    manager.error = Some(error).filter(|e| !e.is_empty());
                }
                Cmd::none()
            }

            Msg::GenerateSummary => {
                if self.summary.loading {
                    return Cmd::none();
                }
                self.summary.loading = true;
                self.summary.error = None;
                Cmd::new(async {
                    match api::summarize_week().await {
                        Ok(summary) => Msg::SummaryLoaded(summary),
                        Err(e) => Msg::SummaryFailed(e),
                    }
                })
            }
            Msg::SummaryLoaded(summary) => {
                self.summary.loading = false;
                self.summary.summary = Some(summary);
                Cmd::none()
            }
            Msg::SummaryFailed(error) => {
                self.summary.loading = false;
                self.summary.error = Some(error);
                Cmd::none()
            }

            Msg::SetEmail(value) => {
                self.auth.email = value;
                Cmd::none()
            }
            Msg::SetPassword(value) => {
                self.auth.password = value;
                Cmd::none()
            }
            Msg::SetConfirm(value) => {
                self.auth.confirm = value;
                Cmd::none()
            }
            Msg::SubmitAuth => self.submit_auth(),
            Msg::AuthSucceeded(notice) => {
                self.auth.busy = false;
                match self.page {
                    Page::Login => {
                        navigate("/");
                    }
                    Page::ResetPassword => {
                        self.auth.password.clear();
                        self.auth.confirm.clear();
                        self.auth.notice = notice;
                        self.auth.token = None;
                    }
                    Page::Register | Page::ForgotPassword | Page::Home => {
                        self.auth.email.clear();
                        self.auth.password.clear();
                        self.auth.notice = notice;
                    }
                }
                Cmd::none()
            }
            Msg::AuthFailed(error) => {
                self.auth.busy = false;
                self.auth.error = Some(error);
                Cmd::none()
            }
            Msg::Logout => Cmd::new(async {
                match api::logout().await {
                    Ok(_) => {
                        navigate("/login");
                        Msg::DismissError
                    }
                    Err(e) => Msg::Error(e),
                }
            }),

            Msg::DismissError => {
                self.error = None;
                Cmd::none()
            }
            Msg::Error(error) => {
                console::error_1(&error.clone().into());
                self.loading = false;
                self.task_loading_states.clear();
                self.error = Some(error);
                Cmd::none()
            }
        }
    }

    fn view(&self) -> Node<Msg> {
        if self.page.is_auth() {
            self.view_auth_page()
        } else {
            self.view_home()
        }
    }
}

impl Model {
    fn edit_form(&mut self, edit: impl FnOnce(&mut TaskForm)) -> Cmd<Msg> {
        if let Some(dialog) = self.dialog.as_mut() {
            edit(&mut dialog.form);
        }
        Cmd::none()
    }

    fn submit_auth(&mut self) -> Cmd<Msg> {
        if self.auth.busy {
            return Cmd::none();
        }
        self.auth.error = None;
        self.auth.notice = None;

        let email = self.auth.email.trim().to_string();
        let password = self.auth.password.clone();
        let body = serde_json::json!({ "email": &email, "password": &password });

        let cmd = match self.page {
            Page::Login => LoginRequest::parse(body).map(|request| {
                Cmd::new(async move {
                    match api::login(request).await {
                        Ok(_) => Msg::AuthSucceeded(None),
                        Err(e) => Msg::AuthFailed(e),
                    }
                })
            }),
            Page::Register => RegisterRequest::parse(body).map(|request| {
                Cmd::new(async move {
                    match api::register(request).await {
                        Ok(payload) => Msg::AuthSucceeded(payload.message),
                        Err(e) => Msg::AuthFailed(e),
                    }
                })
            }),
            Page::ForgotPassword => {
                ForgotPasswordRequest::parse(serde_json::json!({ "email": &email })).map(|request| {
                    Cmd::new(async move {
                        match api::forgot_password(request).await {
                            Ok(payload) => Msg::AuthSucceeded(Some(payload.message)),
                            Err(e) => Msg::AuthFailed(e),
                        }
                    })
                })
            }
            Page::ResetPassword => form::check_reset(&password, &self.auth.confirm).map(|()| {
                let request = ResetPasswordRequest {
                    password,
                    access_token: self.auth.token.clone(),
                };
                Cmd::new(async move {
                    match api::reset_password(request).await {
                        Ok(_) => Msg::AuthSucceeded(Some(
                            "Password updated successfully! You can now sign in.".to_string(),
                        )),
                        Err(e) => Msg::AuthFailed(e),
                    }
                })
            }),
            Page::Home => return Cmd::none(),
        };

        match cmd {
            Ok(cmd) => {
                self.auth.busy = true;
                cmd
            }
            Err(e) => {
                self.auth.error = Some(e.message);
                Cmd::none()
            }
        }
    }

    fn category(&self, id: Option<Uuid>) -> Option<&Category> {
        id.and_then(|id| self.categories.iter().find(|c| c.id == id))
    }
}

#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    Program::mount_to_body(Model::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/", Page::Home)]
    #[case("/login", Page::Login)]
    #[case("/login/", Page::Login)]
    #[case("/register", Page::Register)]
    #[case("/forgot-password", Page::ForgotPassword)]
    #[case("/reset-password", Page::ResetPassword)]
    #[case("/anything-else", Page::Home)]
    fn pages_follow_the_path(#[case] path: &str, #[case] page: Page) {
        assert_eq!(Page::from_path(path), page);
    }
}
