use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{
    Api, InFlight, Sequencer,
    error::ValidationError,
    lock,
    model::Category,
    storage::{self, CATEGORIES_KEY},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    categories: Vec<Category>,
}

#[derive(Debug, Default)]
struct CategoryState {
    categories: Vec<Category>,
    error: Option<String>,
    editing: Option<i64>,
}

/// Categories of the current user.
///
/// The backend owns uniqueness of names: duplicates are not checked locally
/// and come back as a validation message. Deleting a category leaves the
/// movements that reference it untouched.
#[derive(Clone, Debug)]
pub struct CategoryStore {
    api: Api,
    state: Arc<Mutex<CategoryState>>,
    in_flight: InFlight,
    fetches: Sequencer,
}

impl CategoryStore {
    pub fn new(api: Api) -> Self {
        let persisted: Persisted =
            storage::load_snapshot(api.storage().as_ref(), CATEGORIES_KEY).unwrap_or_default();
        Self {
            api,
            state: Arc::new(Mutex::new(CategoryState {
                categories: persisted.categories,
                ..Default::default()
            })),
            in_flight: InFlight::default(),
            fetches: Sequencer::default(),
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        lock(&self.state).categories.clone()
    }

    pub fn get(&self, id: i64) -> Option<Category> {
        lock(&self.state)
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.any()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn clear_error(&self) {
        lock(&self.state).error = None;
    }

    /// Id of the category being renamed, if any.
    pub fn editing(&self) -> Option<i64> {
        lock(&self.state).editing
    }

    pub fn start_editing(&self, id: i64) {
        lock(&self.state).editing = Some(id);
    }

    pub fn cancel_editing(&self) {
        lock(&self.state).editing = None;
    }

    pub async fn fetch_all(&self) -> bool {
        self.fetch(None).await
    }

    /// Like [`fetch_all`](Self::fetch_all), scoped to one owner.
    pub async fn fetch_for_user(&self, user_id: i64) -> bool {
        self.fetch(Some(user_id)).await
    }

    async fn fetch(&self, user_id: Option<i64>) -> bool {
        let _guard = self.in_flight.start();
        self.clear_error();
        let ticket = self.fetches.issue();

        let result = self.api.categories(user_id).await;
        let mut state = lock(&self.state);
        // A newer fetch owns the collection and the error slot.
        if !self.fetches.is_latest(ticket) {
            tracing::debug!(failed = result.is_err(), "discarding superseded category list");
            return true;
        }
        match result {
            Ok(categories) => {
                state.categories = categories;
                self.persist(&state);
                true
            }
            Err(err) => {
                state.error = Some(err.user_message("failed to load categories"));
                false
            }
        }
    }

    pub async fn add(&self, name: &str) -> bool {
        self.clear_error();
        let name = name.trim();
        if name.is_empty() {
            return self.reject(ValidationError::EmptyName);
        }

        let _guard = self.in_flight.start();
        match self.api.create_category(name).await {
            Ok(category) => {
                let mut state = lock(&self.state);
                state.categories.push(category);
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to create category")),
        }
    }

    /// Renames `id` in place and leaves editing mode on success. On failure
    /// the collection and the editing mode are kept.
    pub async fn rename(&self, id: i64, name: &str) -> bool {
        self.clear_error();
        let name = name.trim();
        if name.is_empty() {
            return self.reject(ValidationError::EmptyName);
        }

        let _guard = self.in_flight.start();
        match self.api.update_category(id, name).await {
            Ok(updated) => {
                let mut state = lock(&self.state);
                for category in state.categories.iter_mut().filter(|c| c.id == id) {
                    *category = updated.clone();
                }
                state.editing = None;
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to update category")),
        }
    }

    pub async fn delete(&self, id: i64) -> bool {
        self.clear_error();
        let _guard = self.in_flight.start();
        match self.api.delete_category(id).await {
            Ok(()) => {
                let mut state = lock(&self.state);
                state.categories.retain(|c| c.id != id);
                if state.editing == Some(id) {
                    state.editing = None;
                }
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to delete category")),
        }
    }

    fn persist(&self, state: &CategoryState) {
        storage::save_snapshot(
            self.api.storage().as_ref(),
            CATEGORIES_KEY,
            &Persisted {
                categories: state.categories.clone(),
            },
        );
    }

    fn fail(&self, message: String) -> bool {
        lock(&self.state).error = Some(message);
        false
    }

    fn reject(&self, err: ValidationError) -> bool {
        self.fail(err.to_string())
    }
}
