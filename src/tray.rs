use crate::models::Task;

#[cfg(all(feature = "app", not(test)))]
use crate::windows::show_main_window;
#[cfg(all(feature = "app", not(test)))]
use tauri::{
    menu::{Menu, MenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    App, AppHandle, Runtime,
};

#[cfg(all(feature = "app", not(test)))]
const TRAY_ID: &str = "main";

pub const TRAY_TITLE: &str = "Focus Task";
const MENU_SHOW_APP: (&str, &str) = ("show_app", "Show App");
const MENU_QUIT: (&str, &str) = ("quit", "Quit");

#[cfg(all(feature = "app", not(test)))]
fn build_tray_menu<R: Runtime, M: tauri::Manager<R>>(
    app: &M,
) -> Result<Menu<R>, Box<dyn std::error::Error>> {
    let show_app = MenuItem::with_id(app, MENU_SHOW_APP.0, MENU_SHOW_APP.1, true, None::<&str>)?;
    let quit = MenuItem::with_id(app, MENU_QUIT.0, MENU_QUIT.1, true, None::<&str>)?;
    Ok(Menu::with_items(app, &[&show_app, &quit])?)
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_tray(app: &mut App, tasks: &[Task]) -> Result<(), Box<dyn std::error::Error>> {
    let menu = build_tray_menu(app)?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .tooltip(tray_tooltip(tasks))
        .menu(&menu)
        .show_menu_on_left_click(false);
    match app.default_window_icon().cloned() {
        Some(icon) => builder = builder.icon(icon),
        None => log::warn!("tray: default window icon is missing"),
    }

    builder
        .on_menu_event(|app, event| {
            let id = event.id.as_ref();
            log::info!("tray: menu_event id={id}");
            match id {
                id if id == MENU_QUIT.0 => app.exit(0),
                id if id == MENU_SHOW_APP.0 => show_main_window(app),
                _ => {}
            }
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                log::info!("tray: left_click");
                show_main_window(tray.app_handle());
            }
        })
        .build(app)?;

    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
pub fn update_tray_tooltip<R: Runtime>(app: &AppHandle<R>, tasks: &[Task]) {
    if let Some(tray) = app.tray_by_id(TRAY_ID) {
        if let Err(err) = tray.set_tooltip(Some(tray_tooltip(tasks))) {
            log::warn!("tray: failed to update tooltip: {err}");
        }
    }
}

pub fn tray_tooltip(tasks: &[Task]) -> String {
    let pending = tasks.iter().filter(|task| !task.done).count();
    if pending == 0 {
        return TRAY_TITLE.to_string();
    }
    format!("{TRAY_TITLE} ({pending} pending)")
}
