//! Remote access layer: typed calls to the backend.
//!
//! [`Api::request`] is the single place where HTTP responses are classified.
//! A 401 from any endpoint clears the stored token and fires the registered
//! unauthenticated hooks before the error reaches the calling store.
use std::{
    fmt,
    sync::{Arc, Mutex},
};

use api_types::{
    auth::{AuthResponse, ErrorBody, Login, Register},
    category::{Category, CategoryName},
    movement::{Movement, MovementNew, MovementUpdate},
    stats::{Period, StatsResponse},
    user::{UsernameUpdate, UsernameUpdated},
};
use reqwest::{Method, StatusCode, Url, header::ACCEPT};
use serde::{Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::{
    error::{ApiError, StorageError},
    lock,
    storage::{Storage, TOKEN_KEY},
};

pub type Result<T> = std::result::Result<T, ApiError>;

type UnauthenticatedHook = Arc<dyn Fn() -> bool + Send + Sync>;

const NO_BODY: Option<&()> = None;

#[derive(Clone)]
pub struct Api {
    base_url: Url,
    http: reqwest::Client,
    storage: Arc<dyn Storage>,
    hooks: Arc<Mutex<Vec<UnauthenticatedHook>>>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Api {
    pub fn new(base_url: &str, storage: Arc<dyn Storage>) -> Result<Self> {
        Self::with_client(base_url, storage, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: &str,
        storage: Arc<dyn Storage>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ApiError::InvalidEndpoint(format!("{base_url}: {err}")))?;
        Ok(Self {
            base_url,
            http,
            storage,
            hooks: Arc::default(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn token(&self) -> std::result::Result<Option<String>, StorageError> {
        self.storage.get(TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> std::result::Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> std::result::Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)
    }

    /// Registers `hook` to run whenever the backend answers 401.
    ///
    /// The hook returns whether it wants to keep being called; once it
    /// returns `false` it is dropped.
    pub fn on_unauthenticated(&self, hook: impl Fn() -> bool + Send + Sync + 'static) {
        lock(&self.hooks).push(Arc::new(hook));
    }

    fn invalidate(&self) {
        if let Err(err) = self.clear_token() {
            tracing::warn!("cannot clear token: {err}");
        }
        let hooks = lock(&self.hooks).clone();
        let finished: Vec<UnauthenticatedHook> = hooks.into_iter().filter(|hook| !hook()).collect();
        if !finished.is_empty() {
            lock(&self.hooks).retain(|hook| !finished.iter().any(|done| Arc::ptr_eq(hook, done)));
        }
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|err| ApiError::InvalidEndpoint(format!("{endpoint}: {err}")))
    }

    /// Performs one request and classifies the response.
    ///
    /// `Authorization: Bearer <token>` is attached only when `requires_auth`
    /// is set and a token is stored. A 204 (or an empty 2xx body) decodes as
    /// JSON `null`, so `T = ()` or `Option<_>` accept it.
    pub async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        requires_auth: bool,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(method, endpoint, &[], body, requires_auth).await
    }

    async fn send<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        requires_auth: bool,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint)?;
        let mut req = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }

        let mut authenticated = false;
        if requires_auth {
            if let Some(token) = self.token()? {
                req = req.bearer_auth(token);
                authenticated = true;
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(%method, endpoint, authenticated, "sending request");
        let res = req.send().await?;
        let status = res.status();

        match status {
            StatusCode::NO_CONTENT => Ok(serde_json::from_str("null")?),
            StatusCode::UNAUTHORIZED => {
                tracing::warn!(%method, endpoint, "backend rejected credentials");
                self.invalidate();
                Err(ApiError::Unauthenticated)
            }
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let message = res
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(ErrorBody::into_message)
                    .unwrap_or_else(|| "validation error".to_string());
                tracing::warn!(%method, endpoint, "validation failed: {message}");
                Err(ApiError::ValidationFailed(message))
            }
            status if !status.is_success() => {
                tracing::warn!(%method, endpoint, status = status.as_u16(), "request failed");
                Err(ApiError::RequestFailed(status.as_u16()))
            }
            _ => {
                let text = res.text().await?;
                let text = if text.trim().is_empty() { "null" } else { text.as_str() };
                Ok(serde_json::from_str(text)?)
            }
        }
    }

    async fn request_unit<B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.request::<IgnoredAny, B>(method, endpoint, body, true)
            .await
            .map(|_| ())
    }

    pub async fn register(&self, payload: &Register) -> Result<AuthResponse> {
        self.request(Method::POST, "register", Some(payload), false)
            .await
    }

    pub async fn login(&self, payload: &Login) -> Result<AuthResponse> {
        self.request(Method::POST, "login", Some(payload), false).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.request_unit(Method::POST, "logout", NO_BODY).await
    }

    pub async fn update_username(&self, name: &str) -> Result<UsernameUpdated> {
        let payload = UsernameUpdate {
            name: name.to_string(),
        };
        self.request(Method::PUT, "user/username", Some(&payload), true)
            .await
    }

    pub async fn categories(&self, user_id: Option<i64>) -> Result<Vec<Category>> {
        let query: Vec<(&str, String)> = user_id
            .map(|user_id| ("user_id", user_id.to_string()))
            .into_iter()
            .collect();
        self.send(Method::GET, "categories", &query, NO_BODY, true)
            .await
    }

    pub async fn category(&self, id: i64) -> Result<Category> {
        self.request(Method::GET, &format!("categories/{id}"), NO_BODY, true)
            .await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let payload = CategoryName {
            name: name.to_string(),
        };
        self.request(Method::POST, "categories", Some(&payload), true)
            .await
    }

    pub async fn update_category(&self, id: i64, name: &str) -> Result<Category> {
        let payload = CategoryName {
            name: name.to_string(),
        };
        self.request(
            Method::PUT,
            &format!("categories/{id}"),
            Some(&payload),
            true,
        )
        .await
    }

    pub async fn delete_category(&self, id: i64) -> Result<()> {
        self.request_unit(Method::DELETE, &format!("categories/{id}"), NO_BODY)
            .await
    }

    pub async fn movements(&self) -> Result<Vec<Movement>> {
        self.request(Method::GET, "movements", NO_BODY, true).await
    }

    pub async fn movement(&self, id: i64) -> Result<Movement> {
        self.request(Method::GET, &format!("movements/{id}"), NO_BODY, true)
            .await
    }

    pub async fn create_movement(&self, payload: &MovementNew) -> Result<Movement> {
        self.request(Method::POST, "movements", Some(payload), true)
            .await
    }

    pub async fn update_movement(&self, id: i64, payload: &MovementUpdate) -> Result<Movement> {
        self.request(Method::PUT, &format!("movements/{id}"), Some(payload), true)
            .await
    }

    pub async fn delete_movement(&self, id: i64) -> Result<()> {
        self.request_unit(Method::DELETE, &format!("movements/{id}"), NO_BODY)
            .await
    }

    /// `params` become the url-encoded query string, in order.
    pub async fn statistics(
        &self,
        period: Period,
        params: &[(&str, String)],
    ) -> Result<StatsResponse> {
        let endpoint = format!("statistics/{}", period.as_str());
        self.send(Method::GET, &endpoint, params, NO_BODY, true)
            .await
    }
}
