/// Global shortcuts registered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Bring up the main window and start typing a new task.
    AddTask,
    ToggleWidget,
    ToggleMain,
}

impl ShortcutAction {
    pub const ALL: [ShortcutAction; 3] = [
        ShortcutAction::AddTask,
        ShortcutAction::ToggleWidget,
        ShortcutAction::ToggleMain,
    ];

    pub fn accelerator(self) -> &'static str {
        match self {
            ShortcutAction::AddTask => "CommandOrControl+Alt+N",
            ShortcutAction::ToggleWidget => "CommandOrControl+Alt+W",
            ShortcutAction::ToggleMain => "CommandOrControl+Alt+K",
        }
    }

    #[cfg(test)]
    pub fn from_accelerator(accelerator: &str) -> Option<Self> {
        let wanted = accelerator.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.accelerator().eq_ignore_ascii_case(wanted))
    }
}

/// Maps a pressed shortcut back to the action registered for it.
#[cfg(all(feature = "app", desktop, not(test)))]
pub fn action_for(shortcut: &tauri_plugin_global_shortcut::Shortcut) -> Option<ShortcutAction> {
    ShortcutAction::ALL.into_iter().find(|action| {
        action
            .accelerator()
            .parse::<tauri_plugin_global_shortcut::Shortcut>()
            .is_ok_and(|parsed| parsed == *shortcut)
    })
}

#[cfg(all(feature = "app", desktop, not(test)))]
pub fn register_shortcuts<R: tauri::Runtime>(app: &tauri::AppHandle<R>) {
    use tauri_plugin_global_shortcut::GlobalShortcutExt;

    for action in ShortcutAction::ALL {
        match app.global_shortcut().register(action.accelerator()) {
            Ok(()) => log::debug!("shortcuts: registered accelerator={}", action.accelerator()),
            // Another application may own the combination; the app stays usable without it.
            Err(error) => log::warn!(
                "shortcuts: register failed accelerator={} error={error}",
                action.accelerator()
            ),
        }
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn handle_shortcut<R: tauri::Runtime>(app: &tauri::AppHandle<R>, action: ShortcutAction) {
    use tauri::Emitter;

    use crate::events::EVENT_SHORTCUT_ADD_TASK;
    use crate::windows::{show_main_window, toggle_main_window, toggle_widget_window};

    log::info!("shortcuts: pressed action={action:?}");
    match action {
        ShortcutAction::AddTask => {
            show_main_window(app);
            let _ = app.emit(EVENT_SHORTCUT_ADD_TASK, ());
        }
        ShortcutAction::ToggleWidget => toggle_widget_window(app),
        ShortcutAction::ToggleMain => toggle_main_window(app),
    }
}
