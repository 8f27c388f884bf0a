pub mod settings;
pub mod study;

use crate::config::Settings;
use crate::db::Database;
use crate::llm::Provider;
use crate::workspace::Workspace;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct AppState {
    pub db: Database,
    workspace: Mutex<Workspace>,
}

impl AppState {
    pub fn new(db: Database, max_context_chars: usize) -> Self {
        Self {
            db,
            workspace: Mutex::new(Workspace::new().with_context_budget(max_context_chars)),
        }
    }

    /// Never hold the returned guard across an `.await`
    pub fn workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the configured model on every request so settings changes apply immediately
    pub fn provider(&self) -> Result<(Provider, String), String> {
        let settings = Settings::new(&self.db);
        let model = settings.default_model().map_err(|e| e.to_string())?;
        settings
            .resolve_provider(&model)
            .map_err(|e| e.to_string())
    }
}
