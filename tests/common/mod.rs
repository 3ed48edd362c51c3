//! Shared helpers for integration tests.
//!
//! [`MockServer`] is an in-process axum imitation of the task backend bound
//! to an ephemeral port, so tests drive the real `HttpBackend` over HTTP.
//!
//! `#![allow(dead_code)]` is needed because each file under `tests/` is its
//! own crate and uses a different subset of these helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use taskpad::models::{Task, TaskStatus, User, UserId};
use taskpad::session::MemorySecureStore;
use taskpad::{Config, Taskpad};

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password: String,
}

/// Backend state the tests can inspect and tweak.
#[derive(Debug, Default)]
pub struct MockState {
    pub users: Vec<StoredUser>,
    pub tasks: Vec<(UserId, Task)>,
    pub tokens: HashMap<String, UserId>,
    pub next_user_id: i64,
    pub next_task_id: i64,
    token_counter: u64,
    /// Operation name -> status code to answer with instead of the real thing.
    pub fail: HashMap<&'static str, u16>,
    /// Answer task creation without a `taskId`.
    pub omit_task_id: bool,
    /// Answer user deletion with `status: false`.
    pub reject_user_delete: bool,
    /// Operation name -> number of requests received.
    pub hits: HashMap<&'static str, usize>,
    /// Operation name -> Authorization header of the last request.
    pub auth_headers: HashMap<&'static str, Option<String>>,
}

impl MockState {
    fn record(&mut self, op: &'static str, headers: &HeaderMap) -> Option<Response> {
        *self.hits.entry(op).or_default() += 1;
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.insert(op, auth);

        self.fail.get(op).map(|&code| {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            reply(status, json!({"message": format!("forced failure: {}", op)}))
        })
    }

    fn caller(&self, headers: &HeaderMap) -> Option<UserId> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.tokens.get(token).copied()
    }

    fn issue_token(&mut self, user_id: UserId) -> String {
        self.token_counter += 1;
        let token = format!("token-{}-{}", user_id, self.token_counter);
        self.tokens.insert(token.clone(), user_id);
        token
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub base_url: String,
    pub state: Shared,
}

impl MockServer {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            next_user_id: 1,
            next_task_id: 1,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/my/task/", post(create_task))
            .route("/api/my/task", get(list_tasks))
            .route("/api/my/task/:id", axum::routing::delete(delete_task))
            .route("/api/my/user/", post(create_user))
            .route("/api/my/user/sign-in", post(sign_in))
            .route("/api/my/user/sign-out", post(sign_out))
            .route(
                "/api/my/user/:id",
                put(update_user).get(get_user).delete(delete_user),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Register a user directly in the backend.
    pub fn add_user(&self, name: &str, email: &str, password: &str) -> UserId {
        let mut state = self.state.lock().unwrap();
        let user_id = state.next_user_id;
        state.next_user_id += 1;
        state.users.push(StoredUser {
            user: User {
                user_id,
                name: name.to_string(),
                email: email.to_string(),
            },
            password: password.to_string(),
        });
        user_id
    }

    /// Insert a task owned by `user_id`, bypassing the API.
    pub fn add_task(&self, user_id: UserId, title: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let task_id = state.next_task_id;
        state.next_task_id += 1;
        state.tasks.push((
            user_id,
            Task {
                task_id: Some(task_id),
                title: title.to_string(),
                category: "general".to_string(),
                status: TaskStatus::Pending,
            },
        ));
        task_id
    }

    /// What a fresh list call would return for `user_id`.
    pub fn tasks_of(&self, user_id: UserId) -> Vec<Task> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, task)| task.clone())
            .collect()
    }

    pub fn fail(&self, op: &'static str, status: u16) {
        self.state.lock().unwrap().fail.insert(op, status);
    }

    pub fn heal(&self, op: &'static str) {
        self.state.lock().unwrap().fail.remove(op);
    }

    pub fn hits(&self, op: &'static str) -> usize {
        self.state.lock().unwrap().hits.get(op).copied().unwrap_or(0)
    }

    pub fn auth_header(&self, op: &'static str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .auth_headers
            .get(op)
            .cloned()
            .flatten()
    }

    pub fn live_tokens(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }
}

/// Client wired to `base_url` with an in-memory secure store.
pub fn client(base_url: &str) -> (Taskpad, MemorySecureStore) {
    let durable = MemorySecureStore::new();
    let config = Config::new(base_url, PathBuf::from("unused")).unwrap();
    (Taskpad::with_store(&config, Arc::new(durable.clone())), durable)
}

/// A base URL nothing listens on.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// A base URL whose server promises a body longer than it sends, then hangs
/// up. Serves a single request.
pub async fn truncated_body_base_url() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"message\":",
            )
            .await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn unauthorized() -> Response {
    reply(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized"}))
}

fn user_json(user: &User) -> Value {
    json!({
        "userId": user.user_id,
        "name": user.name,
        "email": user.email,
        "password": "$2b$10$hashed",
    })
}

// ==================== Task handlers ====================

async fn create_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("create_task", &headers) {
        return forced;
    }
    let Some(user_id) = state.caller(&headers) else {
        return unauthorized();
    };

    let Ok(mut task) = serde_json::from_value::<Task>(body) else {
        return reply(StatusCode::BAD_REQUEST, json!({"message": "Invalid task"}));
    };
    let task_id = state.next_task_id;
    state.next_task_id += 1;
    task.task_id = Some(task_id);
    state.tasks.push((user_id, task.clone()));

    let mut result = serde_json::to_value(&task).unwrap();
    if state.omit_task_id {
        result.as_object_mut().unwrap().remove("taskId");
    }
    reply(StatusCode::CREATED, json!({"status": true, "result": result}))
}

async fn list_tasks(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("list_tasks", &headers) {
        return forced;
    }
    let Some(user_id) = state.caller(&headers) else {
        return unauthorized();
    };

    let tasks: Vec<&Task> = state
        .tasks
        .iter()
        .filter(|(owner, _)| *owner == user_id)
        .map(|(_, task)| task)
        .collect();
    reply(StatusCode::OK, json!({"status": true, "result": tasks}))
}

async fn delete_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("delete_task", &headers) {
        return forced;
    }
    let Some(user_id) = state.caller(&headers) else {
        return unauthorized();
    };

    let before = state.tasks.len();
    state
        .tasks
        .retain(|(owner, task)| !(*owner == user_id && task.task_id == Some(id)));
    if state.tasks.len() == before {
        return reply(StatusCode::NOT_FOUND, json!({"message": "Task not found"}));
    }
    reply(StatusCode::OK, json!({"message": "Task deleted"}))
}

// ==================== User handlers ====================

async fn create_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("create_user", &headers) {
        return forced;
    }

    let field = |key: &str| body.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    let (name, email, password) = (field("name"), field("email"), field("password"));
    if state.users.iter().any(|u| u.user.email == email) {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"message": "Email already in use"}),
        );
    }

    let user_id = state.next_user_id;
    state.next_user_id += 1;
    let user = User {
        user_id,
        name,
        email,
    };
    let body = user_json(&user);
    state.users.push(StoredUser { user, password });
    reply(StatusCode::CREATED, body)
}

async fn sign_in(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("login", &headers) {
        return forced;
    }

    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let Some(stored) = state.users.iter().find(|u| u.user.email == email).cloned() else {
        return reply(StatusCode::NOT_FOUND, json!({"message": "User not found"}));
    };
    if stored.password != password {
        return reply(StatusCode::UNAUTHORIZED, json!({"message": "Wrong password"}));
    }

    let token = state.issue_token(stored.user.user_id);
    reply(
        StatusCode::OK,
        json!({"token": token, "userId": stored.user.user_id}),
    )
}

async fn sign_out(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("sign_out", &headers) {
        return forced;
    }
    if state.caller(&headers).is_none() {
        return reply(StatusCode::UNAUTHORIZED, json!({"error": "Not signed in"}));
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();
    state.tokens.remove(&token);
    StatusCode::OK.into_response()
}

async fn update_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("update_user", &headers) {
        return forced;
    }
    if state.caller(&headers) != Some(id) {
        return unauthorized();
    }

    let Some(stored) = state.users.iter_mut().find(|u| u.user.user_id == id) else {
        return reply(StatusCode::NOT_FOUND, json!({"message": "User not found"}));
    };
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        stored.user.name = name.to_string();
    }
    if let Some(email) = body.get("email").and_then(Value::as_str) {
        stored.user.email = email.to_string();
    }
    if let Some(password) = body.get("password").and_then(Value::as_str) {
        stored.password = password.to_string();
    }
    reply(StatusCode::OK, user_json(&stored.user))
}

async fn get_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("get_user", &headers) {
        return forced;
    }
    if state.caller(&headers) != Some(id) {
        return unauthorized();
    }

    match state.users.iter().find(|u| u.user.user_id == id) {
        Some(stored) => reply(StatusCode::OK, json!({"result": user_json(&stored.user)})),
        None => reply(StatusCode::NOT_FOUND, json!({"message": "User not found"})),
    }
}

async fn delete_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(forced) = state.record("delete_user", &headers) {
        return forced;
    }
    if state.caller(&headers) != Some(id) {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"status": false, "error": "Unauthorized"}),
        );
    }
    if state.reject_user_delete {
        return reply(
            StatusCode::OK,
            json!({"status": false, "error": "Account is locked"}),
        );
    }

    state.users.retain(|u| u.user.user_id != id);
    state.tasks.retain(|(owner, _)| *owner != id);
    state.tokens.retain(|_, owner| *owner != id);
    reply(
        StatusCode::OK,
        json!({"status": true, "message": "User deleted"}),
    )
}
