use sauron::{
    html::{attributes, attributes::*, *},
    prelude::*,
};
use taskdeck_shared::{Category, SuggestionKind, Task, TaskPriority, TaskStatus};

use crate::form::{self, ANY, FALLBACK_COLOR, PRESET_COLORS};
use crate::summary::{self, Block};
use crate::{AuthForm, CategoryManager, Model, Msg, Page, TaskDialog};

const INPUT: &str = "w-full px-3 py-2 bg-ctp-surface0 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue focus:border-transparent";
const PRIMARY: &str = "bg-ctp-blue hover:bg-ctp-sapphire text-ctp-base font-medium px-4 py-2 rounded-md transition-colors duration-200 disabled:opacity-50";
const SECONDARY: &str = "bg-ctp-surface1 hover:bg-ctp-surface2 text-ctp-text font-medium px-4 py-2 rounded-md transition-colors duration-200";
const GHOST: &str = "text-xs text-ctp-blue hover:text-ctp-sapphire disabled:opacity-50";

fn status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "bg-ctp-overlay0/20 text-ctp-subtext1",
        TaskStatus::InProgress => "bg-ctp-blue/20 text-ctp-blue",
        TaskStatus::Done => "bg-ctp-green/20 text-ctp-green",
    }
}

fn priority_badge(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "bg-ctp-overlay0/20 text-ctp-subtext1",
        TaskPriority::Medium => "bg-ctp-yellow/20 text-ctp-yellow",
        TaskPriority::High => "bg-ctp-red/20 text-ctp-red",
    }
}

fn banner(message: &str, dismiss: Msg) -> Node<Msg> {
    div([class("bg-ctp-red/10 text-ctp-red border border-ctp-red/30 p-3 rounded-lg text-sm flex justify-between")], [
        span([], [text(message)]),
        button([
            r#type("button"),
            on_click(move |_| dismiss.clone()),
            class("ml-2 underline"),
        ], [text("Dismiss")]),
    ])
}

fn choice(option_value: &str, label_text: &str, current: &str) -> Node<Msg> {
    option([value(option_value.to_string()), selected(option_value == current)], [text(label_text)])
}

impl Model {
    pub(crate) fn view_home(&self) -> Node<Msg> {
        div([class("min-h-screen bg-ctp-base text-ctp-text")], [
            self.view_header(),
            div([class("max-w-4xl mx-auto px-6 py-8 space-y-6")], [
                match &self.error {
                    Some(error) => banner(error, Msg::DismissError),
                    None => span([], []),
                },
                if self.features.ai_suggestions {
                    self.view_summary()
                } else {
                    span([], [])
                },
                self.view_toolbar(),
                if self.loading {
                    div([class("text-center py-10 text-ctp-subtext0 italic")], [text("Loading tasks...")])
                } else {
                    self.view_task_list()
                },
            ]),
            match &self.dialog {
                Some(dialog) => self.view_task_dialog(dialog),
                None => span([], []),
            },
            match &self.category_manager {
                Some(manager) => self.view_category_manager(manager),
                None => span([], []),
            },
        ])
    }

    fn view_header(&self) -> Node<Msg> {
        header([class("bg-ctp-mantle shadow-lg border-b border-ctp-surface0")], [
            div([class("max-w-4xl mx-auto px-6 py-4 flex items-center justify-between")], [
                h1([class("text-2xl font-bold text-ctp-text")], [text("Task Manager")]),
                button([on_click(|_| Msg::Logout), class(SECONDARY)], [text("Sign out")]),
            ]),
        ])
    }

    fn view_toolbar(&self) -> Node<Msg> {
        let filters = &self.filters;
        div([class("flex flex-wrap items-center gap-3")], [
            div([class("flex-1 flex flex-wrap gap-2")], [
                select(
                    [class(INPUT), on_change(|event| Msg::SetStatusFilter(event.value()))],
                    std::iter::once(choice(ANY, "All Status", &filters.status))
                        .chain(TaskStatus::ALL.iter().map(|s| choice(s.as_str(), s.label(), &filters.status)))
                        .collect::<Vec<_>>(),
                ),
                select(
                    [class(INPUT), on_change(|event| Msg::SetPriorityFilter(event.value()))],
                    std::iter::once(choice(ANY, "All Priority", &filters.priority))
                        .chain(TaskPriority::ALL.iter().map(|p| choice(p.as_str(), p.label(), &filters.priority)))
                        .collect::<Vec<_>>(),
                ),
                if self.features.categories {
                    select(
                        [class(INPUT), on_change(|event| Msg::SetCategoryFilter(event.value()))],
                        std::iter::once(choice(ANY, "All Categories", &filters.category))
                            .chain(self.categories.iter().map(|c| {
                                choice(&c.id.to_string(), &c.name, &filters.category)
                            }))
                            .collect::<Vec<_>>(),
                    )
                } else {
                    span([], [])
                },
            ]),
            if self.features.categories {
                button([on_click(|_| Msg::OpenCategories), class(SECONDARY)], [text("Categories")])
            } else {
                span([], [])
            },
            button([on_click(|_| Msg::OpenNewTask), class(PRIMARY)], [text("+ New Task")]),
        ])
    }

    fn view_task_list(&self) -> Node<Msg> {
        if self.tasks.is_empty() {
            return div([class("text-center py-12")], [
                h3([class("text-lg font-medium text-ctp-text mb-2")], [text("No tasks yet")]),
                p([class("text-ctp-subtext0")], [text("Create your first task to get started!")]),
            ]);
        }
        div(
            [class("space-y-3")],
            self.tasks.iter().map(|task| self.view_task(task)).collect::<Vec<_>>(),
        )
    }

    fn view_task(&self, task: &Task) -> Node<Msg> {
        let is_loading = self.task_loading_states.contains_key(&task.id);
        let done = task.is_done();
        let task_id = task.id;

        div(
            [
                key(task.id.to_string()),
                class(&format!(
                    "border rounded-xl p-5 bg-ctp-surface0 shadow-sm transition-all duration-300 {}",
                    if done { "border-ctp-green/40 opacity-60" } else { "border-ctp-surface1 hover:border-ctp-blue" }
                )),
            ],
            [div([class("flex items-start gap-4")], [
                input([
                    r#type("checkbox"),
                    checked(done),
                    id(&format!("checkbox-{}", task.id)),
                    on_click(move |_| Msg::ToggleTask(task_id)),
                    disabled(is_loading),
                    class("mt-1 w-5 h-5 accent-ctp-green"),
                ], []),
                div([class("flex-1 min-w-0")], [
                    h3([class(&format!(
                        "text-base font-semibold mb-1 {}",
                        if done { "line-through text-ctp-overlay1" } else { "text-ctp-text" }
                    ))], [text(&task.title)]),
                    match &task.description {
                        Some(description) if !description.is_empty() => p(
                            [class(&format!(
                                "text-sm text-ctp-subtext1 mb-3 break-words {}",
                                if done { "line-through" } else { "" }
                            ))],
                            [text(form::preview(description))],
                        ),
                        _ => span([], []),
                    },
                    div([class("flex flex-wrap gap-2 text-xs font-medium")], [
                        span([class(&format!("px-2 py-1 rounded-full {}", status_badge(task.status)))], [text(task.status.label())]),
                        span([class(&format!("px-2 py-1 rounded-full {}", priority_badge(task.priority)))], [text(task.priority.label())]),
                        match self.category(task.category_id) {
                            Some(category) => category_badge(category),
                            None => span([], []),
                        },
                        match task.due_date {
                            Some(due) => span([class("px-2 py-1 rounded-full border border-ctp-surface2 text-ctp-subtext0")], [
                                text(format!("Due: {}", due.format("%b %-d, %Y"))),
                            ]),
                            None => span([], []),
                        },
                    ]),
                ]),
                div([class("flex flex-col gap-2")], [
                    button([
                        r#type("button"),
                        on_click(move |_| Msg::EditTask(task_id)),
                        disabled(is_loading),
                        class("text-sm text-ctp-blue hover:underline"),
                    ], [text("Edit")]),
                    button([
                        r#type("button"),
                        on_click(move |_| Msg::DeleteTask(task_id)),
                        disabled(is_loading),
                        class("text-sm text-ctp-red hover:underline"),
                    ], [text(if is_loading { "..." } else { "Delete" })]),
                ]),
            ])],
        )
    }

    fn view_task_dialog(&self, dialog: &TaskDialog) -> Node<Msg> {
        let form = &dialog.form;
        let ai = self.features.ai_suggestions;
        let ai_busy = dialog.ai_loading.is_some() || !form.can_submit();
        let ai_label = |kind: SuggestionKind, idle: &str| -> String {
            if dialog.ai_loading == Some(kind) {
                "Thinking...".to_string()
            } else {
                idle.to_string()
            }
        };

        modal([
            h2([class("text-xl font-semibold mb-1")], [text(if dialog.editing.is_some() { "Edit Task" } else { "Create Task" })]),
            p([class("text-sm text-ctp-subtext0 mb-4")], [text(if dialog.editing.is_some() {
                "Make changes to your task."
            } else {
                "Add a new task to your list."
            })]),
            match &dialog.error {
                Some(error) => banner(error, Msg::DialogFailed(String::new())),
                None => span([], []),
            },
            div([class("grid gap-4 py-4")], [
                div([class("grid gap-2")], [
                    label([r#for("title"), class("text-sm font-medium")], [text("Title")]),
                    input([
                        r#type("text"),
                        id("title"),
                        placeholder("Enter task title"),
                        value(&form.title),
                        on_input(|event| Msg::SetTitle(event.value())),
                        class(INPUT),
                    ], []),
                ]),
                div([class("grid gap-2")], [
                    div([class("flex items-center justify-between")], [
                        label([r#for("description"), class("text-sm font-medium")], [text("Description")]),
                        if !ai {
                            span([], [])
                        } else if form.description.trim().is_empty() {
                            button([
                                r#type("button"),
                                on_click(|_| Msg::RequestSuggestion(SuggestionKind::Description)),
                                disabled(ai_busy),
                                class(GHOST),
                            ], [text(ai_label(SuggestionKind::Description, "✨ Suggest"))])
                        } else {
                            button([
                                r#type("button"),
                                on_click(|_| Msg::RequestSuggestion(SuggestionKind::Improve)),
                                disabled(ai_busy),
                                class(GHOST),
                            ], [text(ai_label(SuggestionKind::Improve, "✨ Improve"))])
                        },
                    ]),
                    textarea([
                        id("description"),
                        placeholder("Enter task description (optional)"),
                        value(&form.description),
                        on_input(|event| Msg::SetDescription(event.value())),
                        class(&format!("{INPUT} h-24 resize-y")),
                    ], []),
                ]),
                div([class("grid grid-cols-2 gap-4")], [
                    div([class("grid gap-2")], [
                        label([r#for("status"), class("text-sm font-medium")], [text("Status")]),
                        select(
                            [id("status"), class(INPUT), on_change(|event| Msg::SetStatus(event.value()))],
                            TaskStatus::ALL
                                .iter()
                                .map(|s| choice(s.as_str(), s.label(), form.status.as_str()))
                                .collect::<Vec<_>>(),
                        ),
                    ]),
                    div([class("grid gap-2")], [
                        div([class("flex items-center justify-between")], [
                            label([r#for("priority"), class("text-sm font-medium")], [text("Priority")]),
                            if ai {
                                button([
                                    r#type("button"),
                                    on_click(|_| Msg::RequestSuggestion(SuggestionKind::Priority)),
                                    disabled(ai_busy),
                                    class(GHOST),
                                ], [text(ai_label(SuggestionKind::Priority, "✨"))])
                            } else {
                                span([], [])
                            },
                        ]),
                        select(
                            [id("priority"), class(INPUT), on_change(|event| Msg::SetPriority(event.value()))],
                            TaskPriority::ALL
                                .iter()
                                .map(|p| choice(p.as_str(), p.label(), form.priority.as_str()))
                                .collect::<Vec<_>>(),
                        ),
                    ]),
                ]),
                div([class("grid grid-cols-2 gap-4")], [
                    if self.features.categories {
                        div([class("grid gap-2")], [
                            label([r#for("category"), class("text-sm font-medium")], [text("Category")]),
                            select(
                                [id("category"), class(INPUT), on_change(|event| Msg::SetCategory(event.value()))],
                                std::iter::once(choice("", "None", &form.category_id))
                                    .chain(self.categories.iter().map(|c| {
                                        choice(&c.id.to_string(), &c.name, &form.category_id)
                                    }))
                                    .collect::<Vec<_>>(),
                            ),
                        ])
                    } else {
                        span([], [])
                    },
                    div([class("grid gap-2")], [
                        label([r#for("due-date"), class("text-sm font-medium")], [text("Due Date")]),
                        input([
                            r#type("date"),
                            id("due-date"),
                            value(&form.due_date),
                            on_input(|event| Msg::SetDueDate(event.value())),
                            class(INPUT),
                        ], []),
                    ]),
                ]),
            ]),
            div([class("flex justify-end gap-2")], [
                button([r#type("button"), on_click(|_| Msg::CloseDialog), class(SECONDARY)], [text("Cancel")]),
                button([
                    r#type("button"),
                    on_click(|_| Msg::SaveTask),
                    disabled(dialog.saving || !form.can_submit()),
                    class(PRIMARY),
                ], [text(if dialog.saving {
                    "Saving..."
                } else if dialog.editing.is_some() {
                    "Save Changes"
                } else {
                    "Create Task"
                })]),
            ]),
        ])
    }

    fn view_category_manager(&self, manager: &CategoryManager) -> Node<Msg> {
        let form = &manager.form;
        modal([
            h2([class("text-xl font-semibold mb-1")], [text("Manage Categories")]),
            p([class("text-sm text-ctp-subtext0 mb-4")], [text("Create and organize your task categories.")]),
            match &manager.error {
                Some(error) => banner(error, Msg::CategoryFailed(String::new())),
                None => span([], []),
            },
            div([class("space-y-2 py-2")], [
                label([r#for("category-name"), class("text-sm font-medium")], [text(
                    if manager.editing.is_some() { "Edit Category" } else { "New Category" },
                )]),
                div([class("flex gap-2")], [
                    input([
                        r#type("text"),
                        id("category-name"),
                        placeholder("Category name"),
                        value(&form.name),
                        on_input(|event| Msg::SetCategoryName(event.value())),
                        class(INPUT),
                    ], []),
                    button([
                        r#type("button"),
                        on_click(|_| Msg::SaveCategory),
                        disabled(manager.saving || form.name.trim().is_empty()),
                        class(PRIMARY),
                    ], [text(if manager.editing.is_some() { "Save" } else { "Add" })]),
                    if manager.editing.is_some() {
                        button([r#type("button"), on_click(|_| Msg::CancelCategoryEdit), class(SECONDARY)], [text("Cancel")])
                    } else {
                        span([], [])
                    },
                ]),
                div(
                    [class("flex gap-1")],
                    PRESET_COLORS
                        .iter()
                        .map(|&color| {
                            button([
                                r#type("button"),
                                on_click(move |_| Msg::SetCategoryColor(color.to_string())),
                                class(&format!(
                                    "w-6 h-6 rounded-full border-2 {}",
                                    if form.color == color { "border-ctp-text" } else { "border-transparent" }
                                )),
                                attributes::styles([("background-color", color)]),
                            ], [])
                        })
                        .collect::<Vec<_>>(),
                ),
            ]),
            if self.categories.is_empty() {
                span([], [])
            } else {
                div([class("border-t border-ctp-surface1 pt-4 mt-2 space-y-2 max-h-48 overflow-y-auto")],
                    self.categories.iter().map(|category| {
                        let category_id = category.id;
                        div([key(category.id.to_string()), class("flex items-center justify-between p-2 rounded-lg bg-ctp-surface1/50")], [
                            div([class("flex items-center gap-2")], [
                                span([
                                    class("w-4 h-4 rounded-full"),
                                    attributes::styles([("background-color", category.color.as_deref().unwrap_or(FALLBACK_COLOR).to_string())]),
                                ], []),
                                span([], [text(&category.name)]),
                            ]),
                            div([class("flex gap-2 text-sm")], [
                                button([r#type("button"), on_click(move |_| Msg::EditCategory(category_id)), class("text-ctp-blue hover:underline")], [text("Edit")]),
                                button([r#type("button"), on_click(move |_| Msg::DeleteCategory(category_id)), class("text-ctp-red hover:underline")], [text("Delete")]),
                            ]),
                        ])
                    }).collect::<Vec<_>>(),
                )
            },
            div([class("flex justify-end mt-4")], [
                button([r#type("button"), on_click(|_| Msg::CloseCategories), class(SECONDARY)], [text("Done")]),
            ]),
        ])
    }

    fn view_summary(&self) -> Node<Msg> {
        let panel = &self.summary;
        div([class("bg-ctp-surface0 rounded-lg shadow-lg p-6 border border-ctp-surface1")], [
            div([class("flex items-center justify-between mb-4")], [
                div([], [
                    h2([class("text-lg font-semibold")], [text("Weekly Summary")]),
                    p([class("text-sm text-ctp-subtext0")], [text("AI-powered insights on your completed tasks")]),
                ]),
                button([
                    on_click(|_| Msg::GenerateSummary),
                    disabled(panel.loading),
                    class(SECONDARY),
                ], [text(if panel.loading { "Generating..." } else { "Generate Summary" })]),
            ]),
            match (&panel.summary, &panel.error) {
                (_, Some(error)) => p([class("text-sm text-ctp-red")], [text(error)]),
                (Some(data), None) => div([class("space-y-2")], [
                    div(
                        [class("text-sm leading-relaxed space-y-2")],
                        summary::blocks(&data.summary).into_iter().map(|block| match block {
                            Block::Heading(line) => h3([class("font-semibold mt-2")], [text(line)]),
                            Block::Item(line) => li([class("ml-4 list-disc")], [text(line)]),
                            Block::Paragraph(line) => p([], [text(line)]),
                        }).collect::<Vec<_>>(),
                    ),
                    div([class("flex justify-between text-xs text-ctp-subtext0 pt-2 border-t border-ctp-surface1")], [
                        span([], [text(summary::date_range(&data.date_range))]),
                        span([], [text(summary::task_count(data.task_count))]),
                    ]),
                ]),
                (None, None) if !panel.loading => p([class("text-sm text-ctp-subtext0 text-center py-4")], [
                    text("Click \"Generate Summary\" to see your weekly insights"),
                ]),
                _ => span([], []),
            },
        ])
    }

    pub(crate) fn view_auth_page(&self) -> Node<Msg> {
        let auth = &self.auth;
        let (title, subtitle) = match self.page {
            Page::Login => ("Sign In", "Enter your credentials to access your tasks"),
            Page::Register => ("Create Account", "Sign up to start managing your tasks"),
            Page::ForgotPassword => ("Forgot Password", "Enter your email and we'll send you a reset link"),
            Page::ResetPassword | Page::Home => ("Reset Password", "Enter your new password below"),
        };

        div([class("min-h-screen bg-ctp-base text-ctp-text flex items-center justify-center px-4")], [
            div([class("w-full max-w-md bg-ctp-surface0 rounded-lg shadow-lg p-8 border border-ctp-surface1 space-y-4")], [
                h1([class("text-2xl font-bold")], [text(title)]),
                p([class("text-sm text-ctp-subtext0")], [text(subtitle)]),
                match &auth.error {
                    Some(error) => p([class("bg-ctp-red/10 text-ctp-red p-3 rounded text-sm")], [text(error)]),
                    None => span([], []),
                },
                match &auth.notice {
                    Some(notice) => p([class("bg-ctp-green/10 text-ctp-green p-3 rounded text-sm")], [text(notice)]),
                    None => span([], []),
                },
                self.view_auth_fields(auth),
                self.view_auth_links(),
            ]),
        ])
    }

    fn view_auth_fields(&self, auth: &AuthForm) -> Node<Msg> {
        let email_field = || div([class("grid gap-2")], [
            label([r#for("email"), class("text-sm font-medium")], [text("Email")]),
            input([
                r#type("email"),
                id("email"),
                placeholder("you@example.com"),
                value(&auth.email),
                on_input(|event| Msg::SetEmail(event.value())),
                disabled(auth.busy),
                class(INPUT),
            ], []),
        ]);
        let password_field = |field_id: &str, label_text: &str, hint: &str, current: &str, msg: fn(String) -> Msg| {
            div([class("grid gap-2")], [
                label([r#for(field_id.to_string()), class("text-sm font-medium")], [text(label_text)]),
                input([
                    r#type("password"),
                    id(field_id.to_string()),
                    placeholder(hint.to_string()),
                    value(current.to_string()),
                    on_input(move |event| msg(event.value())),
                    disabled(auth.busy),
                    class(INPUT),
                ], []),
            ])
        };
        let submit = |idle: &str| {
            button([
                r#type("button"),
                on_click(|_| Msg::SubmitAuth),
                disabled(auth.busy),
                class(&format!("{PRIMARY} w-full")),
            ], [text(if auth.busy { "Please wait..." } else { idle })])
        };

        match self.page {
            Page::Login => div([class("space-y-4")], [
                email_field(),
                password_field("password", "Password", "Enter your password", &auth.password, Msg::SetPassword),
                submit("Sign In"),
            ]),
            Page::Register => div([class("space-y-4")], [
                email_field(),
                password_field("password", "Password", "At least 6 characters", &auth.password, Msg::SetPassword),
                submit("Create Account"),
            ]),
            Page::ForgotPassword => div([class("space-y-4")], [email_field(), submit("Send Reset Link")]),
            Page::ResetPassword | Page::Home => {
                if auth.token.is_none() {
                    span([], [])
                } else {
                    div([class("space-y-4")], [
                        password_field("password", "New Password", "At least 6 characters", &auth.password, Msg::SetPassword),
                        password_field("confirm", "Confirm Password", "Repeat your new password", &auth.confirm, Msg::SetConfirm),
                        submit("Update Password"),
                    ])
                }
            }
        }
    }

    fn view_auth_links(&self) -> Node<Msg> {
        let link = |to: &str, label_text: &str| a([href(to.to_string()), class("text-ctp-blue hover:underline")], [text(label_text)]);
        p([class("text-sm text-ctp-subtext0 text-center space-x-2")], match self.page {
            Page::Login => vec![
                link("/forgot-password", "Forgot password?"),
                span([], [text("Don't have an account?")]),
                link("/register", "Sign up"),
            ],
            Page::Register => vec![span([], [text("Already have an account?")]), link("/login", "Sign in")],
            Page::ForgotPassword => vec![link("/login", "Back to sign in")],
            Page::ResetPassword | Page::Home => vec![
                link("/forgot-password", "Request a new link"),
                link("/login", "Back to sign in"),
            ],
        })
    }
}

fn category_badge(category: &Category) -> Node<Msg> {
    let color = category.color.as_deref().unwrap_or(FALLBACK_COLOR).to_string();
    span([
        class("px-2 py-1 rounded-full border"),
        attributes::styles([("border-color", color.clone()), ("color", color)]),
    ], [text(&category.name)])
}

fn modal(children: impl IntoIterator<Item = Node<Msg>>) -> Node<Msg> {
    div([class("fixed inset-0 bg-black/50 flex items-center justify-center z-50 px-4")], [
        div(
            [class("w-full max-w-lg bg-ctp-surface0 text-ctp-text rounded-lg shadow-xl p-6 border border-ctp-surface1 max-h-[90vh] overflow-y-auto")],
            children,
        ),
    ])
}
