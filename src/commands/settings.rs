use super::AppState;
use crate::config::Settings;
use crate::llm::ModelInfo;
use std::collections::HashMap;
use tauri::State;

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<HashMap<String, String>, String> {
    Settings::new(&state.db).masked().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: String) -> Result<(), String> {
    let settings = Settings::new(&state.db);
    settings.set(&key, &value).map_err(|e| e.to_string())?;
    if key == "max_context_chars" {
        let budget = settings.max_context_chars().map_err(|e| e.to_string())?;
        state.workspace().set_context_budget(budget);
    }
    Ok(())
}

#[tauri::command]
pub fn delete_setting(state: State<'_, AppState>, key: String) -> Result<(), String> {
    let settings = Settings::new(&state.db);
    settings.delete(&key).map_err(|e| e.to_string())?;
    if key == "max_context_chars" {
        let budget = settings.max_context_chars().map_err(|e| e.to_string())?;
        state.workspace().set_context_budget(budget);
    }
    Ok(())
}

#[tauri::command]
pub fn get_available_models(state: State<'_, AppState>) -> Result<Vec<ModelInfo>, String> {
    Settings::new(&state.db)
        .available_models()
        .map_err(|e| e.to_string())
}
