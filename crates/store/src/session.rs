use std::sync::{Arc, Mutex};

use api_types::auth::{AuthResponse, Login, Register};
use serde::{Deserialize, Serialize};

use crate::{
    Api, InFlight,
    error::ValidationError,
    lock,
    model::User,
    storage::{self, SESSION_KEY, Storage},
};

/// Shortest password accepted by `register`.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    AuthError,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Persisted {
    user: Option<User>,
    is_authenticated: bool,
}

#[derive(Debug)]
struct SessionState {
    user: Option<User>,
    status: SessionStatus,
    error: Option<String>,
}

impl SessionState {
    fn settle(&mut self) {
        self.status = if self.user.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::AuthError
        };
    }
}

fn persist(storage: &dyn Storage, state: &SessionState) {
    storage::save_snapshot(
        storage,
        SESSION_KEY,
        &Persisted {
            user: state.user.clone(),
            is_authenticated: state.user.is_some(),
        },
    );
}

/// Current user and the lifecycle of its token.
///
/// A user is present exactly when the session is authenticated. The token
/// itself is kept by [`Api`] in storage; both are set together on login or
/// register and cleared together on logout or on any 401.
#[derive(Clone, Debug)]
pub struct SessionStore {
    api: Api,
    state: Arc<Mutex<SessionState>>,
    in_flight: InFlight,
}

impl SessionStore {
    pub fn new(api: Api) -> Self {
        let storage = api.storage().clone();
        let persisted: Persisted =
            storage::load_snapshot(storage.as_ref(), SESSION_KEY).unwrap_or_default();
        let has_token = matches!(api.token(), Ok(Some(_)));

        // A user without a token cannot make any authenticated call.
        let user = persisted
            .user
            .filter(|_| persisted.is_authenticated && has_token);
        let state = SessionState {
            status: if user.is_some() {
                SessionStatus::Authenticated
            } else {
                SessionStatus::Anonymous
            },
            user,
            error: None,
        };
        persist(storage.as_ref(), &state);

        let state = Arc::new(Mutex::new(state));
        let weak = Arc::downgrade(&state);
        api.on_unauthenticated(move || {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let mut state = lock(&state);
            if state.user.take().is_some() {
                tracing::info!("session expired, logging out");
            }
            state.status = SessionStatus::Anonymous;
            persist(storage.as_ref(), &state);
            true
        });

        Self {
            api,
            state,
            in_flight: InFlight::default(),
        }
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.state).user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.state).user.is_some()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.any()
    }

    pub fn clear_error(&self) {
        lock(&self.state).error = None;
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let email = email.trim();
        if email.is_empty() {
            return self.reject(ValidationError::EmptyEmail);
        }
        if password.trim().is_empty() {
            return self.reject(ValidationError::EmptyPassword);
        }

        let _guard = self.in_flight.start();
        self.begin();
        let payload = Login {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&payload).await {
            Ok(response) => self.authenticate(response),
            Err(err) => self.fail(err.user_message("login failed")),
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> bool {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() {
            return self.reject(ValidationError::EmptyName);
        }
        if email.is_empty() {
            return self.reject(ValidationError::EmptyEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return self.reject(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }

        let _guard = self.in_flight.start();
        self.begin();
        let payload = Register {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirmation: password.to_string(),
        };
        match self.api.register(&payload).await {
            Ok(response) => self.authenticate(response),
            Err(err) => self.fail(err.user_message("registration failed")),
        }
    }

    /// Notifies the backend, then drops the session whatever it answered.
    pub async fn logout(&self) {
        let _guard = self.in_flight.start();
        lock(&self.state).error = None;

        if let Err(err) = self.api.logout().await {
            tracing::debug!("logout notification failed: {err}");
        }
        if let Err(err) = self.api.clear_token() {
            tracing::warn!("cannot clear token: {err}");
        }

        let mut state = lock(&self.state);
        state.user = None;
        state.status = SessionStatus::Anonymous;
        persist(self.api.storage().as_ref(), &state);
        tracing::info!("logged out");
    }

    /// Changes the display name of the current user, keeping every other
    /// field.
    pub async fn update_username(&self, name: &str) -> bool {
        lock(&self.state).error = None;
        let name = name.trim();
        if name.is_empty() {
            return self.reject(ValidationError::EmptyName);
        }
        if !self.is_authenticated() {
            return self.reject(ValidationError::NotAuthenticated);
        }

        let _guard = self.in_flight.start();
        match self.api.update_username(name).await {
            Ok(response) => {
                let mut state = lock(&self.state);
                if let Some(user) = state.user.as_mut() {
                    user.name = response.user.name;
                }
                persist(self.api.storage().as_ref(), &state);
                true
            }
            Err(err) => {
                lock(&self.state).error = Some(err.user_message("failed to update name"));
                false
            }
        }
    }

    fn begin(&self) {
        let mut state = lock(&self.state);
        state.error = None;
        state.status = SessionStatus::Authenticating;
    }

    fn authenticate(&self, response: AuthResponse) -> bool {
        if let Err(err) = self.api.set_token(&response.token) {
            tracing::warn!("cannot store token: {err}");
            return self.fail(format!("cannot store session: {err}"));
        }

        let mut state = lock(&self.state);
        tracing::info!(user_id = response.user.id, "authenticated");
        state.user = Some(response.user);
        state.status = SessionStatus::Authenticated;
        state.error = None;
        persist(self.api.storage().as_ref(), &state);
        true
    }

    fn fail(&self, message: String) -> bool {
        let mut state = lock(&self.state);
        state.error = Some(message);
        state.settle();
        false
    }

    /// Records a validation failure; no request was sent.
    fn reject(&self, err: ValidationError) -> bool {
        let mut state = lock(&self.state);
        state.error = Some(err.to_string());
        if state.user.is_none() {
            state.status = SessionStatus::AuthError;
        }
        false
    }
}
