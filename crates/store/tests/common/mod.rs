//! In-process fake of the Dinerito backend, served by axum on an ephemeral
//! port so the real reqwest client is exercised end to end.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use store::{MemoryStorage, Storage, Stores};

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "secret1";
pub const TOKEN: &str = "token-123";

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct Backend {
    pub requests: Vec<Recorded>,
    pub user: Value,
    pub categories: Vec<Value>,
    pub movements: Vec<Value>,
    pub next_id: i64,
    /// When set, every request is answered with this status.
    pub forced_status: Option<u16>,
    /// Delays (ms) applied to successive `GET /movements` responses.
    pub list_delays: VecDeque<u64>,
    /// Statuses for successive `GET /movements` responses; `None` serves the list.
    pub list_statuses: VecDeque<Option<u16>>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            user: json!({"id": 1, "email": EMAIL, "name": "Ana"}),
            categories: Vec::new(),
            movements: Vec::new(),
            next_id: 100,
            forced_status: None,
            list_delays: VecDeque::new(),
            list_statuses: VecDeque::new(),
        }
    }
}

type Shared = Arc<Mutex<Backend>>;

pub struct Harness {
    pub base_url: String,
    backend: Shared,
}

pub async fn spawn_backend() -> Harness {
    let backend: Shared = Arc::default();
    let app = Router::new().fallback(handle).with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Harness {
        base_url: format!("http://{addr}/api"),
        backend,
    }
}

impl Harness {
    pub fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    pub fn stores(&self, storage: Arc<dyn Storage>) -> Stores {
        Stores::new(&self.base_url, storage).unwrap()
    }

    /// Fresh stores on fresh memory storage, already logged in.
    pub async fn logged_in(&self) -> (Stores, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let stores = self.stores(storage.clone());
        assert!(stores.session.login(EMAIL, PASSWORD).await);
        (stores, storage)
    }

    pub fn hits(&self) -> usize {
        self.backend().requests.len()
    }

    pub fn last_request(&self) -> Recorded {
        self.backend().requests.last().cloned().unwrap()
    }

    pub fn force_status(&self, status: Option<u16>) {
        self.backend().forced_status = status;
    }

    pub fn seed_category(&self, id: i64, name: &str) {
        self.backend()
            .categories
            .push(json!({"id": id, "name": name, "user_id": 1}));
    }

    pub fn seed_movement(&self, id: i64, kind: &str, amount: &str, category_id: Option<i64>) {
        let mut backend = self.backend();
        let category = category_id.and_then(|id| find(&backend.categories, id).cloned());
        backend.movements.push(json!({
            "id": id,
            "user_id": 1,
            "category_id": category_id,
            "title": format!("movement {id}"),
            "type": kind,
            "amount": amount,
            "date": "2024-12-01T00:00:00.000000Z",
            "category": category,
        }));
    }
}

fn find(items: &[Value], id: i64) -> Option<&Value> {
    items.iter().find(|item| item["id"].as_i64() == Some(id))
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn message(status: StatusCode, text: &str) -> Response {
    reply(status, json!({"message": text}))
}

fn amount_text(value: &Value) -> String {
    format!("{:.2}", value.as_f64().unwrap_or_default())
}

fn amount_of(movement: &Value) -> f64 {
    match &movement["amount"] {
        Value::String(text) => text.parse().unwrap_or_default(),
        other => other.as_f64().unwrap_or_default(),
    }
}

async fn handle(
    State(backend): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/api").to_string();
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut delay = 0;
    let response = {
        let mut backend = backend.lock().unwrap();
        backend.requests.push(Recorded {
            method: method.to_string(),
            path: path.clone(),
            query: uri.query().map(str::to_string),
            authorization: authorization.clone(),
            body: body.clone(),
        });

        if let Some(status) = backend.forced_status {
            message(StatusCode::from_u16(status).unwrap(), "forced failure")
        } else {
            let authorized = authorization.as_deref() == Some(&format!("Bearer {TOKEN}")[..]);
            let body = body.unwrap_or(Value::Null);
            let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
            let mut status = None;
            if method == Method::GET && segments.as_slice() == ["movements"] {
                delay = backend.list_delays.pop_front().unwrap_or_default();
                status = backend.list_statuses.pop_front().flatten();
            }
            match status {
                Some(status) => message(StatusCode::from_u16(status).unwrap(), "forced failure"),
                None => route(&mut backend, method.as_str(), &segments, body, authorized),
            }
        }
    };

    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    response
}

fn route(
    backend: &mut Backend,
    method: &str,
    segments: &[&str],
    body: Value,
    authorized: bool,
) -> Response {
    match (method, segments) {
        ("POST", ["login"]) => {
            if body["email"] == EMAIL && body["password"] == PASSWORD {
                reply(StatusCode::OK, json!({"user": backend.user, "token": TOKEN}))
            } else {
                message(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
        }
        ("POST", ["register"]) => {
            if body["email"] == EMAIL {
                return message(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "The email has already been taken.",
                );
            }
            backend.user = json!({"id": 2, "email": body["email"], "name": body["name"]});
            reply(StatusCode::CREATED, json!({"user": backend.user, "token": TOKEN}))
        }
        _ if !authorized => message(StatusCode::UNAUTHORIZED, "Unauthenticated."),
        ("POST", ["logout"]) => StatusCode::NO_CONTENT.into_response(),
        ("PUT", ["user", "username"]) => {
            backend.user["name"] = body["name"].clone();
            reply(StatusCode::OK, json!({"user": {"name": body["name"]}}))
        }
        ("GET", ["categories"]) => reply(StatusCode::OK, Value::from(backend.categories.clone())),
        ("POST", ["categories"]) => {
            if backend.categories.iter().any(|c| c["name"] == body["name"]) {
                return message(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "The name has already been taken.",
                );
            }
            backend.next_id += 1;
            let category = json!({"id": backend.next_id, "name": body["name"], "user_id": 1});
            backend.categories.push(category.clone());
            reply(StatusCode::CREATED, category)
        }
        ("GET", ["categories", id]) => match find(&backend.categories, parse_id(id)) {
            Some(category) => reply(StatusCode::OK, category.clone()),
            None => message(StatusCode::NOT_FOUND, "Not found"),
        },
        ("PUT", ["categories", id]) => {
            let id = parse_id(id);
            if backend
                .categories
                .iter()
                .any(|c| c["name"] == body["name"] && c["id"].as_i64() != Some(id))
            {
                return message(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "The name has already been taken.",
                );
            }
            match backend
                .categories
                .iter_mut()
                .find(|c| c["id"].as_i64() == Some(id))
            {
                Some(category) => {
                    category["name"] = body["name"].clone();
                    reply(StatusCode::OK, category.clone())
                }
                None => message(StatusCode::NOT_FOUND, "Not found"),
            }
        }
        ("DELETE", ["categories", id]) => {
            let id = parse_id(id);
            let before = backend.categories.len();
            backend.categories.retain(|c| c["id"].as_i64() != Some(id));
            if backend.categories.len() == before {
                message(StatusCode::NOT_FOUND, "Not found")
            } else {
                StatusCode::NO_CONTENT.into_response()
            }
        }
        ("GET", ["movements"]) => reply(StatusCode::OK, Value::from(backend.movements.clone())),
        ("POST", ["movements"]) => {
            backend.next_id += 1;
            let category = body["category_id"]
                .as_i64()
                .and_then(|id| find(&backend.categories, id).cloned());
            let movement = json!({
                "id": backend.next_id,
                "user_id": 1,
                "category_id": body["category_id"],
                "title": body["title"],
                "type": body["type"],
                "amount": amount_text(&body["amount"]),
                "date": body["date"],
                "category": category,
            });
            backend.movements.push(movement.clone());
            reply(StatusCode::CREATED, movement)
        }
        ("GET", ["movements", id]) => match find(&backend.movements, parse_id(id)) {
            Some(movement) => reply(StatusCode::OK, movement.clone()),
            None => message(StatusCode::NOT_FOUND, "Not found"),
        },
        ("PUT", ["movements", id]) => {
            let id = parse_id(id);
            let categories = backend.categories.clone();
            let Some(movement) = backend
                .movements
                .iter_mut()
                .find(|m| m["id"].as_i64() == Some(id))
            else {
                return message(StatusCode::NOT_FOUND, "Not found");
            };
            if let Value::Object(fields) = &body {
                for (key, value) in fields {
                    movement[key.as_str()] = match key.as_str() {
                        "amount" => Value::from(amount_text(value)),
                        _ => value.clone(),
                    };
                    if key == "category_id" {
                        movement["category"] = value
                            .as_i64()
                            .and_then(|id| find(&categories, id).cloned())
                            .unwrap_or(Value::Null);
                    }
                }
            }
            reply(StatusCode::OK, movement.clone())
        }
        ("DELETE", ["movements", id]) => {
            let id = parse_id(id);
            let before = backend.movements.len();
            backend.movements.retain(|m| m["id"].as_i64() != Some(id));
            if backend.movements.len() == before {
                message(StatusCode::NOT_FOUND, "Not found")
            } else {
                StatusCode::NO_CONTENT.into_response()
            }
        }
        ("GET", ["statistics", "daily" | "monthly" | "yearly"]) => {
            let sum = |kind: &str| -> f64 {
                backend
                    .movements
                    .iter()
                    .filter(|m| m["type"] == kind)
                    .map(amount_of)
                    .sum()
            };
            let (income, expense) = (sum("income"), sum("expense"));
            reply(
                StatusCode::OK,
                json!({
                    "income": income,
                    "expense": expense,
                    "balance": income - expense,
                    "movements": backend.movements,
                }),
            )
        }
        _ => message(StatusCode::NOT_FOUND, "Not found"),
    }
}

fn parse_id(raw: &str) -> i64 {
    raw.parse().unwrap_or(-1)
}
