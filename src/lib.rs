#[cfg_attr(not(feature = "app"), allow(dead_code))]
mod commands;
pub mod events;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod shortcuts;
pub mod state;
pub mod storage;
pub mod store;
pub mod tasks;
pub mod tray;
pub mod windows;

#[cfg(all(feature = "app", not(test)))]
use tauri::{webview::PageLoadEvent, Emitter, Manager, RunEvent, WindowEvent};

#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;
#[cfg(all(feature = "app", not(test)))]
use crate::events::{BACKUP_TOAST_MESSAGE, EVENT_BACKUP_TOAST};
#[cfg(all(feature = "app", not(test)))]
use crate::state::{AppState, BackupNotice};
#[cfg(all(feature = "app", not(test)))]
use crate::store::{Store, StoreOptions};
#[cfg(all(feature = "app", not(test)))]
use crate::windows::{MAIN_LABEL, QUICK_ADD_LABEL, WIDGET_LABEL};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    let mut builder = tauri::Builder::default();

    // Must be the first plugin so a second launch exits before touching the store.
    #[cfg(desktop)]
    {
        builder = builder
            .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
                log::info!("app: second instance started, focusing main window");
                windows::show_main_window(app);
            }))
            .plugin(
                tauri_plugin_global_shortcut::Builder::new()
                    .with_handler(|app, shortcut, event| {
                        if event.state() != tauri_plugin_global_shortcut::ShortcutState::Pressed {
                            return;
                        }
                        if let Some(action) = shortcuts::action_for(shortcut) {
                            shortcuts::handle_shortcut(app, action);
                        }
                    })
                    .build(),
            );
    }

    let app = builder
        .setup(|app| {
            let data_dir = app.path().app_data_dir()?;
            if let Err(error) = logging::init_logging(&data_dir) {
                eprintln!("failed to initialize logging: {error}");
            }

            let notice = BackupNotice::default();
            let marker = notice.clone();
            let runtime = tauri::async_runtime::handle().inner().clone();
            let store = Store::open(
                StoreOptions::new(data_dir, runtime).on_backup(move || marker.mark()),
            );
            log::info!("app: store opened path={}", store.path().display());

            let state = AppState::new(store, notice);
            app.manage(state.clone());

            windows::ensure_main_window(app.handle())?;
            windows::ensure_widget_window(app.handle())?;
            windows::ensure_quick_add_window(app.handle())?;

            tray::init_tray(app, &state.store().tasks())?;
            #[cfg(desktop)]
            shortcuts::register_shortcuts(app.handle());

            Ok(())
        })
        .on_page_load(|webview, payload| {
            if !matches!(payload.event(), PageLoadEvent::Finished) || webview.label() != MAIN_LABEL {
                return;
            }
            let state = webview.state::<AppState>();
            if state.take_backup_notice() {
                if let Err(error) = webview.emit_to(MAIN_LABEL, EVENT_BACKUP_TOAST, BACKUP_TOAST_MESSAGE)
                {
                    log::warn!("app: emit backup_toast failed error={error}");
                }
            }
        })
        .on_window_event(|window, event| match (window.label(), event) {
            (MAIN_LABEL, WindowEvent::CloseRequested { api, .. }) => {
                api.prevent_close();
                let _ = window.hide();
            }
            // Minimizing the main window sends it to the tray.
            (MAIN_LABEL, WindowEvent::Resized(_)) => {
                if window.is_minimized().unwrap_or(false) {
                    let _ = window.hide();
                }
            }
            (WIDGET_LABEL | QUICK_ADD_LABEL, WindowEvent::CloseRequested { api, .. }) => {
                api.prevent_close();
                let _ = window.hide();
            }
            (QUICK_ADD_LABEL, WindowEvent::Focused(false)) => {
                windows::hide_quick_add_window(window.app_handle());
            }
            _ => {}
        })
        .invoke_handler(tauri::generate_handler![
            get_data,
            save_data,
            add_task,
            toggle_task,
            delete_task,
            toggle_focus,
            complete_task,
            get_settings,
            save_settings,
            get_stats,
            get_completed_history,
            get_widget_tasks,
            enter_focus_mode,
            restore_main,
            open_quick_add,
            submit_quick_add,
            close_quick_add,
            close_widget,
            resize_widget,
            set_widget_ignore_mouse,
            take_backup_notice,
            quit_app,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            app.state::<AppState>().shutdown();
        }
    });
}
