use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{
    Api, InFlight, Sequencer,
    error::ValidationError,
    lock,
    model::{self, Category, Movement, MovementPatch, NewMovement, Totals},
    storage::{self, MOVEMENTS_KEY},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    movements: Vec<Movement>,
}

#[derive(Debug, Default)]
struct MovementState {
    movements: Vec<Movement>,
    error: Option<String>,
}

/// Income and expense movements of the current user.
///
/// Totals are never stored: [`MovementStore::totals`] recomputes them from
/// the collection on every call.
#[derive(Clone, Debug)]
pub struct MovementStore {
    api: Api,
    state: Arc<Mutex<MovementState>>,
    in_flight: InFlight,
    fetches: Sequencer,
}

impl MovementStore {
    pub fn new(api: Api) -> Self {
        let persisted: Persisted =
            storage::load_snapshot(api.storage().as_ref(), MOVEMENTS_KEY).unwrap_or_default();
        Self {
            api,
            state: Arc::new(Mutex::new(MovementState {
                movements: persisted.movements,
                error: None,
            })),
            in_flight: InFlight::default(),
            fetches: Sequencer::default(),
        }
    }

    pub fn movements(&self) -> Vec<Movement> {
        lock(&self.state).movements.clone()
    }

    pub fn get(&self, id: i64) -> Option<Movement> {
        lock(&self.state)
            .movements
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn totals(&self) -> Totals {
        model::compute_totals(&lock(&self.state).movements)
    }

    /// Read-side view of the movements filed under `category_id`.
    pub fn by_category(&self, category_id: i64) -> Vec<Movement> {
        model::filter_by_category(&lock(&self.state).movements, category_id)
    }

    /// Movements with their category name resolved against `categories`,
    /// so a rename shows up without refetching movements.
    pub fn with_category_names(&self, categories: &[Category]) -> Vec<Movement> {
        lock(&self.state)
            .movements
            .iter()
            .map(|m| Movement {
                category: m.category_name(categories).map(str::to_string),
                ..m.clone()
            })
            .collect()
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

    /// Empties the local collection. Nothing is deleted on the backend.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.movements.clear();
        self.persist(&state);
    }

    pub async fn fetch_all(&self) -> bool {
        let _guard = self.in_flight.start();
        self.clear_error();
        let ticket = self.fetches.issue();

        let result = self.api.movements().await;
        let mut state = lock(&self.state);
        // A newer fetch owns the collection and the error slot.
        if !self.fetches.is_latest(ticket) {
            tracing::debug!(failed = result.is_err(), "discarding superseded movement list");
            return true;
        }
        match result {
            Ok(movements) => {
                state.movements = movements.into_iter().map(Movement::from).collect();
                self.persist(&state);
                true
            }
            Err(err) => {
                state.error = Some(err.user_message("failed to load movements"));
                false
            }
        }
    }

    pub async fn add(&self, movement: NewMovement) -> bool {
        self.clear_error();
        if movement.label.trim().is_empty() {
            return self.reject(ValidationError::EmptyLabel);
        }
        if !movement.amount.is_positive() {
            return self.reject(ValidationError::NonPositiveAmount);
        }

        let _guard = self.in_flight.start();
        match self.api.create_movement(&movement.to_wire()).await {
            Ok(created) => {
                let mut state = lock(&self.state);
                state.movements.push(created.into());
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to create movement")),
        }
    }

    /// Sends only the fields set in `patch`. An empty patch succeeds without
    /// a request.
    pub async fn update(&self, id: i64, patch: MovementPatch) -> bool {
        self.clear_error();
        if patch.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return self.reject(ValidationError::EmptyLabel);
        }
        if patch.amount.is_some_and(|a| !a.is_positive()) {
            return self.reject(ValidationError::NonPositiveAmount);
        }
        if patch.is_empty() {
            return true;
        }

        let _guard = self.in_flight.start();
        match self.api.update_movement(id, &patch.to_wire()).await {
            Ok(updated) => {
                let updated = Movement::from(updated);
                let mut state = lock(&self.state);
                for movement in state.movements.iter_mut().filter(|m| m.id == id) {
                    *movement = updated.clone();
                }
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to update movement")),
        }
    }

    pub async fn delete(&self, id: i64) -> bool {
        self.clear_error();
        let _guard = self.in_flight.start();
        match self.api.delete_movement(id).await {
            Ok(()) => {
                let mut state = lock(&self.state);
                state.movements.retain(|m| m.id != id);
                self.persist(&state);
                true
            }
            Err(err) => self.fail(err.user_message("failed to delete movement")),
        }
    }

    fn persist(&self, state: &MovementState) {
        storage::save_snapshot(
            self.api.storage().as_ref(),
            MOVEMENTS_KEY,
            &Persisted {
                movements: state.movements.clone(),
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
