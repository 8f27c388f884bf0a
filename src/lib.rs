pub mod config;
pub mod context;
pub mod db;
pub mod doc_processor;
pub mod llm;
pub mod qa;
pub mod session;
pub mod views;
pub mod workspace;

#[cfg(feature = "gui")]
mod commands;

#[cfg(feature = "gui")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::AppState;
    use config::Settings;
    use db::Database;
    use tauri::Manager;

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = Database::new(&app_dir)?;
            let budget = Settings::new(&database).max_context_chars()?;
            log::info!("Settings loaded from {:?}", app_dir);
            app.manage(AppState::new(database, budget));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::study::get_session,
            commands::study::upload_document,
            commands::study::ask_question,
            commands::study::switch_mode,
            commands::study::generate_view,
            commands::study::reset_session,
            commands::settings::get_settings,
            commands::settings::set_setting,
            commands::settings::delete_setting,
            commands::settings::get_available_models,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
