//! What a workflow hands back to the UI collaborator.

use thiserror::Error;

use crate::api::{ApiError, ErrorKind};

/// Navigation target requested by a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The sign-in screen.
    Login,
    /// The authenticated area (task list, profile).
    Main,
}

/// One-shot, user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Successful workflow result.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub notice: Option<Notice>,
    pub route: Option<Route>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            notice: None,
            route: None,
        }
    }

    pub fn with_notice(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.notice = Some(Notice::new(title, message));
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }
}

/// Failed workflow: the classified error plus the title to show it under.
#[derive(Debug, Clone, Error)]
#[error("{title}: {error}")]
pub struct Failure {
    pub title: String,
    #[source]
    pub error: ApiError,
    /// Navigation the UI should still perform despite the failure.
    pub route: Option<Route>,
}

impl Failure {
    pub fn new(title: impl Into<String>, error: ApiError) -> Self {
        Self {
            title: title.into(),
            error,
            route: None,
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }

    /// The backend rejected the session or none was available.
    pub fn requires_login(&self) -> bool {
        self.error.is_auth()
    }

    pub fn notice(&self) -> Notice {
        Notice::new(self.title.clone(), self.error.message.clone())
    }
}

pub type WorkflowResult<T> = Result<Outcome<T>, Failure>;
