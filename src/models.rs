//! Wire and domain types shared by the gateway, the stores and the workflows.
//!
//! Field names follow the backend's camelCase JSON (`taskId`, `userId`).
//! Read models never carry a password; it only appears in the write models
//! (`UserForm`, `Credentials`, `UserPatch`).

use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Server-assigned task identifier.
pub type TaskId = i64;

/// Server-assigned user identifier.
pub type UserId = i64;

/// Task status as accepted by the backend.
///
/// The backend mixes priorities and progress states in one field; both
/// families are kept verbatim on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Low,
    Medium,
    High,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Pending,
        Self::InProgress,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ApiError::validation(format!("Unknown task status: {}", s)))
    }
}

/// A task as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Absent until the server assigns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub title: String,
    pub category: String,
    pub status: TaskStatus,
}

/// A task the user wants to create. Has no id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub category: String,
    pub status: TaskStatus,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, category: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            status,
        }
    }

    /// Reject drafts the backend would refuse, before any request is sent.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::validation("Title is required"));
        }
        if self.category.trim().is_empty() {
            return Err(ApiError::validation("Category is required"));
        }
        Ok(())
    }
}

/// A user profile as read back from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// Registration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Name is required"));
        }
        if !self.email.contains('@') {
            return Err(ApiError::validation("A valid email address is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::validation("Password is required"));
        }
        Ok(())
    }
}

/// Email and password submitted at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Partial profile update. Only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// Authenticated identity: token and user id travel together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<UserId>,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            token: Some(token.into()),
            user_id: Some(user_id),
        }
    }

    /// Both halves present.
    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_some()
    }

    /// Token and user id, only when both are set.
    pub fn credentials(&self) -> Option<(&str, UserId)> {
        match (self.token.as_deref(), self.user_id) {
            (Some(token), Some(user_id)) if !token.is_empty() => Some((token, user_id)),
            _ => None,
        }
    }
}

/// `POST /api/my/user/sign-in` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
}

/// `{status, result}` envelope used by the task endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Usually a boolean; `false` is rejected before this type is decoded.
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    pub result: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /api/my/task` response. `result` may be missing or `null` when the
/// user has no tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<Vec<Task>>,
}

/// User endpoints answer either with a bare user or a `{result}` wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserPayload {
    Wrapped { result: User },
    Bare(User),
}

impl UserPayload {
    pub fn into_user(self) -> User {
        match self {
            Self::Wrapped { result } => result,
            Self::Bare(user) => user,
        }
    }
}

/// `DELETE /api/my/task/{id}` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// `DELETE /api/my/user/{id}` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteUserResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
