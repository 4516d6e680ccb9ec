//! Engine readiness service.
//!
//! Owns the process-wide engine and its lifecycle:
//!
//! ```text
//! Uninitialized ──spawn_load──▶ Loading ──ok──▶ Ready
//!                                  │
//!                                  └──err──▶ Failed ──spawn_load──▶ Loading
//! ```
//!
//! Loading happens on a background task so the gateway can start serving
//! `/health` immediately. Request handling only ever reads the state.

use std::future::Future;
use std::sync::{Arc, RwLock};

use chatline_core::engine::GenerationEngine;
use chatline_core::error::EngineError;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Snapshot of the service state, safe to hand to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

enum EngineState {
    Uninitialized,
    Loading,
    Ready(Arc<dyn GenerationEngine>),
    Failed(String),
}

/// Holds the engine once it is loaded and reports readiness until then.
pub struct EngineService {
    model: String,
    state: RwLock<EngineState>,
}

impl EngineService {
    /// A service whose engine has not been loaded yet.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: RwLock::new(EngineState::Uninitialized),
        }
    }

    /// A service wrapping an engine that is already loaded.
    pub fn ready(model: impl Into<String>, engine: Arc<dyn GenerationEngine>) -> Self {
        Self {
            model: model.into(),
            state: RwLock::new(EngineState::Ready(engine)),
        }
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn readiness(&self) -> Readiness {
        match &*self.read_state() {
            EngineState::Uninitialized => Readiness::Uninitialized,
            EngineState::Loading => Readiness::Loading,
            EngineState::Ready(_) => Readiness::Ready,
            EngineState::Failed(_) => Readiness::Failed,
        }
    }

    /// Why the last load failed, if it did.
    pub fn failure_reason(&self) -> Option<String> {
        match &*self.read_state() {
            EngineState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The ready engine, or the reason there is none.
    pub fn engine(&self) -> Result<Arc<dyn GenerationEngine>, EngineError> {
        match &*self.read_state() {
            EngineState::Ready(engine) => Ok(engine.clone()),
            EngineState::Loading => Err(EngineError::Loading),
            EngineState::Uninitialized => Err(EngineError::Unavailable(
                "engine has not been initialized".into(),
            )),
            EngineState::Failed(reason) => Err(EngineError::Unavailable(reason.clone())),
        }
    }

    /// Run `load` on a background task and publish its outcome.
    ///
    /// Returns `None` if the engine is already loading or ready.
    pub fn spawn_load<F>(self: &Arc<Self>, load: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<Arc<dyn GenerationEngine>, EngineError>> + Send + 'static,
    {
        if !self.begin_loading() {
            warn!(model = %self.model, "Engine load already in progress or complete");
            return None;
        }

        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            info!(model = %service.model, "Loading generation engine");
            let outcome = load.await;
            service.finish_loading(outcome);
        }))
    }

    fn begin_loading(&self) -> bool {
        let mut state = self.write_state();
        match *state {
            EngineState::Uninitialized | EngineState::Failed(_) => {
                *state = EngineState::Loading;
                true
            }
            EngineState::Loading | EngineState::Ready(_) => false,
        }
    }

    fn finish_loading(&self, outcome: Result<Arc<dyn GenerationEngine>, EngineError>) {
        let next = match outcome {
            Ok(engine) => {
                info!(model = %self.model, engine = engine.name(), "Generation engine ready");
                EngineState::Ready(engine)
            }
            Err(e) => {
                error!(model = %self.model, error = %e, "Generation engine failed to load");
                EngineState::Failed(e.to_string())
            }
        };
        *self.write_state() = next;
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for EngineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineService")
            .field("model", &self.model)
            .field("readiness", &self.readiness())
            .finish()
    }
}
