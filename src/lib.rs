//! # taskpad
//!
//! Client-side session and data-synchronization layer for the My Task REST
//! backend.
//!
//! This library provides:
//! - A typed HTTP gateway with centralized error classification
//! - A session store mirrored into encrypted durable storage
//! - An entity cache of tasks and the user profile
//! - Workflows that combine the three and return UI-ready outcomes
//!
//! ## Architecture
//!
//! ```text
//!   UI collaborator (CLI, app shell)
//!          │ Outcome / Failure
//!          ▼
//!   ┌──────────────┐   ┌──────────────┐
//!   │ AuthWorkflow │   │ TaskWorkflow │
//!   └──────┬───────┘   └──────┬───────┘
//!          │   ┌──────────────┤
//!          ▼   ▼              ▼
//!   SessionStore ◀── HttpBackend   EntityCache
//!          │          (bearer per call)
//!          ▼
//!   SecureStore (authToken, authUserId)
//! ```
//!
//! ## Flow
//! 1. UI calls a workflow operation
//! 2. Workflow calls the backend; the token comes from the session store
//! 3. On success the workflow updates the cache and/or session
//! 4. UI renders from the stores and shows the returned notice
//!
//! ## Modules
//! - `api`: backend trait, HTTP implementation, error taxonomy
//! - `session`: session store and secure storage
//! - `cache`: task and profile cache
//! - `workflow`: authentication and task workflows
//! - `config`: environment configuration

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod models;
pub mod session;
pub mod workflow;

pub use app::Taskpad;
pub use config::Config;
