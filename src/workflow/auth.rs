//! Authentication workflow: session restoration, sign-in, sign-up,
//! sign-out, account deletion and profile maintenance.
//!
//! ## State machine
//!
//! ```text
//!  Unauthenticated ──restore──▶ Checking ──token ok──▶ Authenticated
//!        ▲                         │                        │
//!        └──────no/expired token───┘◀──sign-out / delete────┘
//! ```
//!
//! Transitions are published on a `watch` channel so the UI collaborator
//! can follow them without polling. A 401 from any authorized call also moves
//! the state to `Unauthenticated`, through [`AuthSignal::note_unauthorized`];
//! the session store and cache are left for sign-in or sign-out to replace.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

use super::outcome::{Failure, Outcome, Route, WorkflowResult};
use crate::api::{ApiError, ErrorKind, SharedBackend};
use crate::cache::SharedEntityCache;
use crate::models::{Credentials, Session, User, UserForm, UserId, UserPatch};
use crate::session::SharedSessionStore;

/// How long a fetched profile is served from cache.
pub const PROFILE_STALE_AFTER: Duration = Duration::from_secs(60);

const MSG_LOGIN_INVALID: &str = "Invalid email or password. Please try again.";
const MSG_LOGIN_NO_ACCOUNT: &str = "No account found with this email address.";
const MSG_TOKEN_NOT_SAVED: &str = "Failed to save authentication token. Please try again.";

/// Where the client stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// Session restoration in progress.
    Checking,
    Authenticated { user_id: UserId },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Authenticated { user_id } => Some(*user_id),
            _ => None,
        }
    }
}

/// Shared handle on the published [`AuthState`].
#[derive(Clone)]
pub struct AuthSignal {
    sender: Arc<watch::Sender<AuthState>>,
}

impl AuthSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> AuthState {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }

    /// Publish `next`. Receivers are only woken on an actual change.
    pub(crate) fn transition(&self, next: AuthState) {
        self.sender.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::debug!(previous = ?*state, ?next, "Auth state changed");
            *state = next;
            true
        });
    }

    /// React to a failed authorized call: an `Auth` error while
    /// authenticated drops the state to `Unauthenticated`.
    ///
    /// Stores are not touched.
    pub fn note_unauthorized(&self, error: &ApiError) {
        if error.is_auth() && self.current().is_authenticated() {
            tracing::warn!("Backend rejected the session");
            self.transition(AuthState::Unauthenticated);
        }
    }
}

impl Default for AuthSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthWorkflow {
    backend: SharedBackend,
    session: SharedSessionStore,
    cache: SharedEntityCache,
    signal: AuthSignal,
}

impl AuthWorkflow {
    pub fn new(
        backend: SharedBackend,
        session: SharedSessionStore,
        cache: SharedEntityCache,
        signal: AuthSignal,
    ) -> Self {
        Self {
            backend,
            session,
            cache,
            signal,
        }
    }

    pub fn state(&self) -> AuthState {
        self.signal.current()
    }

    /// Follow state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.signal.subscribe()
    }

    fn transition(&self, next: AuthState) {
        self.signal.transition(next);
    }

    /// Rebuild the session from durable storage at startup.
    ///
    /// Never fails: any problem ends in `Unauthenticated` with a route to the
    /// login screen.
    pub async fn restore_session(&self) -> Outcome<AuthState> {
        self.transition(AuthState::Checking);

        let restored = match self.session.restore().await {
            Ok(restored) => restored,
            Err(e) => {
                tracing::error!("Failed to check authentication status: {}", e);
                self.session.forget().await;
                self.transition(AuthState::Unauthenticated);
                return Outcome::new(AuthState::Unauthenticated).with_route(Route::Login);
            }
        };

        match restored {
            Some(session) => match session.credentials() {
                Some((token, user_id)) if !token_expired(token, chrono::Utc::now().timestamp()) => {
                    tracing::info!(user_id, "Session restored");
                    let state = AuthState::Authenticated { user_id };
                    self.transition(state);
                    Outcome::new(state).with_route(Route::Main)
                }
                _ => {
                    tracing::info!("Stored session token has expired");
                    self.expire_session().await
                }
            },
            None => self.expire_session().await,
        }
    }

    async fn expire_session(&self) -> Outcome<AuthState> {
        if let Err(e) = self.session.clear_session().await {
            tracing::warn!("Failed to remove stale session from secure store: {}", e);
        }
        self.cache.clear_profile();
        self.transition(AuthState::Unauthenticated);
        Outcome::new(AuthState::Unauthenticated)
            .with_notice("Session Expired", "You need to log in again.")
            .with_route(Route::Login)
    }

    /// Sign in and persist the session.
    pub async fn login(&self, credentials: &Credentials) -> WorkflowResult<Session> {
        let response = self.backend.login(credentials).await.map_err(|e| {
            let e = match e.kind {
                ErrorKind::Auth => e.with_message(MSG_LOGIN_INVALID),
                ErrorKind::NotFound => e.with_message(MSG_LOGIN_NO_ACCOUNT),
                _ => e,
            };
            tracing::error!(kind = %e.kind, "Login failed: {}", e);
            Failure::new("Login Failed", e)
        })?;

        if response.token.is_empty() {
            return Err(Failure::new(
                "Login Failed",
                ApiError::decode("login: empty token in response"),
            ));
        }

        let previous_user = self.session.user_id().await;
        if let Err(e) = self
            .session
            .set_session(&response.token, response.user_id)
            .await
        {
            tracing::error!("Error storing token: {}", e);
            return Err(Failure::new(
                "Error",
                ApiError::storage(MSG_TOKEN_NOT_SAVED, e.to_string()),
            ));
        }

        if previous_user != Some(response.user_id) {
            self.cache.clear();
        }

        self.transition(AuthState::Authenticated {
            user_id: response.user_id,
        });

        Ok(Outcome::new(Session::new(response.token, response.user_id))
            .with_notice("Success", "You have successfully logged in!")
            .with_route(Route::Main))
    }

    /// Register a new account. Does not sign in.
    pub async fn sign_up(&self, form: &UserForm) -> WorkflowResult<User> {
        form.validate()
            .map_err(|e| Failure::new("User Creation Failed", e))?;

        let user = self.backend.create_user(form).await.map_err(|e| {
            tracing::error!(kind = %e.kind, "User creation failed: {}", e);
            Failure::new("User Creation Failed", e)
        })?;

        tracing::info!(user_id = user.user_id, "User created");
        Ok(Outcome::new(user)
            .with_notice("User Created", "Your account has been created successfully!")
            .with_route(Route::Login))
    }

    /// Sign out remotely, then always clear local state.
    pub async fn sign_out(&self) -> WorkflowResult<()> {
        let remote = if self.session.token().await.is_some() {
            self.backend.sign_out().await
        } else {
            tracing::debug!("No session token, skipping remote sign-out");
            Ok(())
        };

        if let Err(e) = &remote {
            tracing::warn!(kind = %e.kind, "Remote sign-out failed, clearing local session anyway: {}", e);
        }

        let local = self.session.clear_session().await;
        self.cache.clear();
        self.transition(AuthState::Unauthenticated);

        if let Err(e) = local {
            tracing::error!("Error during sign-out cleanup: {}", e);
            return Err(Failure::new(
                "Error",
                ApiError::storage(
                    "Signed out, but there was a problem cleaning up locally.",
                    e.to_string(),
                ),
            )
            .with_route(Route::Login));
        }

        let outcome = Outcome::new(()).with_route(Route::Login);
        Ok(match remote {
            Ok(()) => outcome.with_notice("Success", "You have successfully logged out."),
            Err(_) => outcome.with_notice(
                "Signed Out",
                "You have been signed out on this device, but the server could not be reached.",
            ),
        })
    }

    /// Delete the account on the server, then drop every local trace of it.
    pub async fn delete_account(&self) -> WorkflowResult<()> {
        let user_id = self.require_user("Delete Failed").await?;

        let response = self.backend.delete_user(user_id).await.map_err(|e| {
            tracing::error!(kind = %e.kind, "Account deletion failed: {}", e);
            self.signal.note_unauthorized(&e);
            Failure::new("Delete Failed", e)
        })?;

        if let Err(e) = self.session.clear_session().await {
            tracing::error!("Account deleted but session cleanup failed: {}", e);
        }
        self.cache.clear();
        self.transition(AuthState::Unauthenticated);

        let message = response
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "User account deleted successfully".to_string());
        Ok(Outcome::new(())
            .with_notice("Success", message)
            .with_route(Route::Login))
    }

    /// Send a partial profile update.
    ///
    /// The cached profile is left as is; call [`Self::load_profile`] with
    /// `force` to pick up the change.
    pub async fn update_profile(&self, patch: &UserPatch) -> WorkflowResult<User> {
        let user_id = self.require_user("Update Failed").await?;
        if patch.is_empty() {
            return Err(Failure::new(
                "Update Failed",
                ApiError::validation("Nothing to update"),
            ));
        }

        let user = self
            .backend
            .update_user(user_id, patch)
            .await
            .map_err(|e| {
                tracing::error!(kind = %e.kind, "Update error: {}", e);
                self.signal.note_unauthorized(&e);
                Failure::new("Update Failed", e)
            })?;

        Ok(Outcome::new(user).with_notice("Success", "User information updated successfully"))
    }

    /// Current user's profile, from cache while fresh.
    pub async fn load_profile(&self, force: bool) -> WorkflowResult<User> {
        let user_id = self.require_user("Profile Unavailable").await?;

        if !force {
            if let Some(user) = self.cache.fresh_profile(PROFILE_STALE_AFTER) {
                if user.user_id == user_id {
                    return Ok(Outcome::new(user));
                }
            }
        }

        let user = self.backend.get_user(user_id).await.map_err(|e| {
            tracing::error!(kind = %e.kind, "Profile fetch failed: {}", e);
            self.signal.note_unauthorized(&e);
            Failure::new("Profile Unavailable", e)
        })?;

        // Skip the write if the session changed while the request was out.
        if self.session.user_id().await == Some(user_id) {
            self.cache.set_profile(user.clone());
        }
        Ok(Outcome::new(user))
    }

    async fn require_user(&self, title: &str) -> Result<UserId, Failure> {
        match self.session.session().await.credentials() {
            Some((_, user_id)) => Ok(user_id),
            None => Err(Failure::new(title, ApiError::missing_credentials())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Whether `token` is a JWT whose `exp` is at or before `now`.
///
/// Tokens that are not JWTs are opaque to the client and never expire here;
/// the backend still has the final word with a 401.
fn token_expired(token: &str, now: i64) -> bool {
    let mut validation = jsonwebtoken::Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<ExpiryClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(&[]),
        &validation,
    ) {
        Ok(data) => data.claims.exp.is_some_and(|exp| exp <= now),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn jwt(exp: i64) -> String {
        encode(
            &Header::default(),
            &serde_json::json!({"sub": "1", "exp": exp}),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_unauthorized_drops_authenticated_state() {
        let signal = AuthSignal::new();
        let mut rx = signal.subscribe();
        signal.transition(AuthState::Authenticated { user_id: 3 });
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        signal.note_unauthorized(&ApiError::from_response(500, ""));
        assert!(!rx.has_changed().unwrap());

        signal.note_unauthorized(&ApiError::from_response(401, ""));
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);

        // Already signed out: nothing new is published.
        signal.note_unauthorized(&ApiError::from_response(401, ""));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_token_expiry() {
        let now = 1_700_000_000;
        assert!(token_expired(&jwt(now - 1), now));
        assert!(!token_expired(&jwt(now + 3600), now));
    }

    #[test]
    fn test_opaque_token_never_expires() {
        assert!(!token_expired("opaque-session-token", 0));
        assert!(!token_expired("", 0));
    }

    #[test]
    fn test_jwt_without_exp() {
        let token = encode(
            &Header::default(),
            &serde_json::json!({"sub": "1"}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        assert!(!token_expired(&token, i64::MAX));
    }
}
