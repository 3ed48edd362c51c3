//! Remote API gateway for the task backend.
//!
//! [`Backend`] is the seam the workflows talk to; [`HttpBackend`] is the
//! reqwest implementation. Implementations never touch the stores.

mod client;
mod error;

pub use client::HttpBackend;
pub use error::{classify_http_status, ApiError, ErrorKind};
pub use error::{
    MSG_INVALID_CREDENTIALS, MSG_MISSING_CREDENTIALS, MSG_NETWORK, MSG_NOT_FOUND,
    MSG_SERVER_ERROR, MSG_UNEXPECTED,
};

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    Credentials, DeleteUserResponse, LoginResponse, Task, TaskDraft, TaskId, User, UserForm,
    UserId, UserPatch,
};

/// Operations exposed by the task backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/my/task/`, returns the server-echoed task.
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;

    /// `GET /api/my/task`
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;

    /// `DELETE /api/my/task/{id}`, returns the server's message if any.
    async fn delete_task(&self, id: TaskId) -> Result<Option<String>, ApiError>;

    /// `POST /api/my/user/` (unauthenticated).
    async fn create_user(&self, form: &UserForm) -> Result<User, ApiError>;

    /// `POST /api/my/user/sign-in` (unauthenticated).
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    /// `POST /api/my/user/sign-out`
    async fn sign_out(&self) -> Result<(), ApiError>;

    /// `PUT /api/my/user/{id}`
    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User, ApiError>;

    /// `GET /api/my/user/{id}`
    async fn get_user(&self, id: UserId) -> Result<User, ApiError>;

    /// `DELETE /api/my/user/{id}`
    async fn delete_user(&self, id: UserId) -> Result<DeleteUserResponse, ApiError>;
}

/// Shared backend handle used by the workflows.
pub type SharedBackend = Arc<dyn Backend>;
