//! reqwest implementation of [`Backend`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use super::Backend;
use crate::models::{
    Credentials, DeleteUserResponse, Envelope, LoginResponse, MessageResponse, Task, TaskDraft,
    TaskId, TaskList, User, UserForm, UserId, UserPatch, UserPayload,
};
use crate::session::SharedSessionStore;

const TASK_PATH: &str = "/api/my/task";
const USER_PATH: &str = "/api/my/user";

/// HTTP client for the task backend.
///
/// The bearer token is read from the session store on every call; there is
/// no process-wide default header.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: SharedSessionStore,
}

impl HttpBackend {
    pub fn new(base_url: &str, session: SharedSessionStore) -> Self {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(client: Client, base_url: &str, session: SharedSessionStore) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request, attaching the bearer token when one is held.
    async fn request(&self, method: Method, path: &str, authorized: bool) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        if !authorized {
            return builder;
        }
        match self.session.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and return the raw body of a 2xx response.
    async fn send_raw(&self, builder: RequestBuilder, op: &str) -> Result<String, ApiError> {
        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                let detail = if e.is_timeout() {
                    format!("Request timeout: {}", e)
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    format!("Request failed: {}", e)
                };
                tracing::warn!(op, "{}", detail);
                return Err(ApiError::network(detail));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let detail = format!("Failed to read response body: {}", e);
                tracing::warn!(op, status = status.as_u16(), "{}", detail);
                return Err(ApiError::network(detail));
            }
        };

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &body);
            tracing::warn!(op, status = status.as_u16(), kind = %err.kind, "Backend call failed");
            return Err(err);
        }

        tracing::debug!(op, status = status.as_u16(), "Backend call succeeded");
        Ok(body)
    }

    /// Send a request and decode the 2xx body as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        op: &str,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(builder, op).await?;
        decode(&body, op)
    }
}

/// Decode a 2xx body. An envelope with `status: false` is a failure even
/// though the transport succeeded.
fn decode<T: DeserializeOwned>(body: &str, op: &str) -> Result<T, ApiError> {
    let text = if body.trim().is_empty() { "{}" } else { body };
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ApiError::decode(format!("{}: invalid JSON: {}", op, e)))?;

    if value.get("status").and_then(Value::as_bool) == Some(false) {
        tracing::warn!(op, "Backend reported status=false");
        return Err(ApiError::rejected(&value));
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::decode(format!("{}: unexpected response shape: {}", op, e)))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let builder = self
            .request(Method::POST, &format!("{}/", TASK_PATH), true)
            .await
            .json(draft);
        let envelope: Envelope<Task> = self.send(builder, "create_task").await?;
        Ok(envelope.result)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let builder = self.request(Method::GET, TASK_PATH, true).await;
        let list: TaskList = self.send(builder, "list_tasks").await?;
        Ok(list.result.unwrap_or_default())
    }

    async fn delete_task(&self, id: TaskId) -> Result<Option<String>, ApiError> {
        let builder = self
            .request(Method::DELETE, &format!("{}/{}", TASK_PATH, id), true)
            .await;
        let response: MessageResponse = self.send(builder, "delete_task").await?;
        Ok(response.message)
    }

    async fn create_user(&self, form: &UserForm) -> Result<User, ApiError> {
        let builder = self
            .request(Method::POST, &format!("{}/", USER_PATH), false)
            .await
            .json(form);
        let payload: UserPayload = self.send(builder, "create_user").await?;
        Ok(payload.into_user())
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let builder = self
            .request(Method::POST, &format!("{}/sign-in", USER_PATH), false)
            .await
            .json(credentials);
        self.send(builder, "login").await
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &format!("{}/sign-out", USER_PATH), true)
            .await;
        self.send_raw(builder, "sign_out").await?;
        Ok(())
    }

    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User, ApiError> {
        let builder = self
            .request(Method::PUT, &format!("{}/{}", USER_PATH, id), true)
            .await
            .json(patch);
        let payload: UserPayload = self.send(builder, "update_user").await?;
        Ok(payload.into_user())
    }

    async fn get_user(&self, id: UserId) -> Result<User, ApiError> {
        let builder = self
            .request(Method::GET, &format!("{}/{}", USER_PATH, id), true)
            .await;
        let payload: UserPayload = self.send(builder, "get_user").await?;
        Ok(payload.into_user())
    }

    async fn delete_user(&self, id: UserId) -> Result<DeleteUserResponse, ApiError> {
        let builder = self
            .request(Method::DELETE, &format!("{}/{}", USER_PATH, id), true)
            .await;
        self.send(builder, "delete_user").await
    }
}
