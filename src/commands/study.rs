use super::AppState;
use crate::session::{Mode, SessionSnapshot};
use crate::workspace::WorkspaceError;
use std::path::Path;
use tauri::State;

// Extraction and query failures are already recorded in the session (error
// banner, error turn), so those commands still return the snapshot.

#[tauri::command]
pub fn get_session(state: State<'_, AppState>) -> SessionSnapshot {
    state.workspace().session().snapshot()
}

#[tauri::command]
pub async fn upload_document(
    state: State<'_, AppState>,
    file_path: String,
) -> Result<SessionSnapshot, String> {
    let ticket = state
        .workspace()
        .begin_upload(Path::new(&file_path))
        .map_err(|e| e.to_string())?;

    let result = ticket.run().await;

    let mut ws = state.workspace();
    let outcome = ws.finish_upload(ticket, result);
    match outcome {
        Ok(_) | Err(WorkspaceError::Extraction(_)) => Ok(ws.session().snapshot()),
        Err(e) => Err(e.to_string()),
    }
}

#[tauri::command]
pub async fn ask_question(
    state: State<'_, AppState>,
    question: String,
) -> Result<SessionSnapshot, String> {
    let (provider, model) = state.provider()?;
    let ticket = state
        .workspace()
        .begin_ask(&question)
        .map_err(|e| e.to_string())?;

    let result = ticket.run(&provider, &model).await;

    let mut ws = state.workspace();
    let outcome = ws.finish_ask(ticket, result);
    match outcome {
        Ok(_) | Err(WorkspaceError::Query(_)) => Ok(ws.session().snapshot()),
        Err(e) => Err(e.to_string()),
    }
}

#[tauri::command]
pub fn switch_mode(state: State<'_, AppState>, mode: Mode) -> SessionSnapshot {
    let mut ws = state.workspace();
    ws.switch_mode(mode);
    ws.session().snapshot()
}

#[tauri::command]
pub async fn generate_view(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let (provider, model) = state.provider()?;
    let ticket = state.workspace().begin_view().map_err(|e| e.to_string())?;

    let result = ticket.run(&provider, &model).await;

    let mut ws = state.workspace();
    let outcome = ws.finish_view(ticket, result).map(|_| ());
    match outcome {
        Ok(_) | Err(WorkspaceError::Query(_)) => Ok(ws.session().snapshot()),
        Err(e) => Err(e.to_string()),
    }
}

#[tauri::command]
pub fn reset_session(state: State<'_, AppState>) -> SessionSnapshot {
    let mut ws = state.workspace();
    ws.reset();
    ws.session().snapshot()
}
