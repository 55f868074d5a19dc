#[cfg(all(feature = "app", not(test)))]
use tauri::{
    AppHandle, LogicalPosition, LogicalSize, Manager, Monitor, Runtime, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder,
};

pub const MAIN_LABEL: &str = "main";
pub const WIDGET_LABEL: &str = "widget";
pub const QUICK_ADD_LABEL: &str = "quick-add";

pub const MAIN_SIZE: (f64, f64) = (1200.0, 800.0);
pub const MAIN_MIN_SIZE: (f64, f64) = (600.0, 500.0);
pub const WIDGET_WIDTH: f64 = 400.0;
pub const WIDGET_MIN_HEIGHT: f64 = 80.0;
pub const QUICK_ADD_SIZE: (f64, f64) = (400.0, 60.0);

// The widget hugs the top-right corner of the display it is shown on.
const WIDGET_RIGHT_OFFSET: f64 = 420.0;
const WIDGET_TOP_OFFSET: f64 = 20.0;
const QUICK_ADD_GAP: f64 = 10.0;

/// Logical-pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub fn widget_position(display: Rect) -> (f64, f64) {
    (
        display.x + display.width - WIDGET_RIGHT_OFFSET,
        display.y + WIDGET_TOP_OFFSET,
    )
}

/// Directly under the widget, left edges aligned.
pub fn quick_add_position(widget: Rect) -> (f64, f64) {
    (widget.x, widget.y + widget.height + QUICK_ADD_GAP)
}

pub fn widget_height(requested: f64) -> f64 {
    requested.max(WIDGET_MIN_HEIGHT)
}

#[cfg(all(feature = "app", not(test)))]
fn monitor_rect(monitor: &Monitor) -> Rect {
    let scale = monitor.scale_factor();
    // Work area excludes taskbars and docks; some platforms report it empty.
    let work_area = monitor.work_area();
    let (position, size) = if work_area.size.width > 0 && work_area.size.height > 0 {
        (work_area.position, work_area.size)
    } else {
        (*monitor.position(), *monitor.size())
    };
    Rect {
        x: f64::from(position.x) / scale,
        y: f64::from(position.y) / scale,
        width: f64::from(size.width) / scale,
        height: f64::from(size.height) / scale,
    }
}

#[cfg(all(feature = "app", not(test)))]
fn window_rect<R: Runtime>(window: &WebviewWindow<R>) -> tauri::Result<Rect> {
    let scale = window.scale_factor()?;
    let position = window.outer_position()?;
    let size = window.outer_size()?;
    Ok(Rect {
        x: f64::from(position.x) / scale,
        y: f64::from(position.y) / scale,
        width: f64::from(size.width) / scale,
        height: f64::from(size.height) / scale,
    })
}

// Display of the main window when it exists, the primary display otherwise.
#[cfg(all(feature = "app", not(test)))]
fn target_display<R: Runtime>(app: &AppHandle<R>) -> Option<Rect> {
    let from_main = app
        .get_webview_window(MAIN_LABEL)
        .and_then(|main| main.current_monitor().ok().flatten());
    let monitor = match from_main {
        Some(monitor) => Some(monitor),
        None => app.primary_monitor().ok().flatten(),
    };
    monitor.as_ref().map(monitor_rect)
}

#[cfg(all(feature = "app", not(test)))]
pub fn ensure_main_window<R: Runtime>(app: &AppHandle<R>) -> tauri::Result<WebviewWindow<R>> {
    if let Some(window) = app.get_webview_window(MAIN_LABEL) {
        return Ok(window);
    }
    WebviewWindowBuilder::new(app, MAIN_LABEL, WebviewUrl::App("index.html".into()))
        .title("Focus Task")
        .inner_size(MAIN_SIZE.0, MAIN_SIZE.1)
        .min_inner_size(MAIN_MIN_SIZE.0, MAIN_MIN_SIZE.1)
        .build()
}

#[cfg(all(feature = "app", not(test)))]
pub fn show_main_window<R: Runtime>(app: &AppHandle<R>) {
    match ensure_main_window(app) {
        Ok(window) => {
            if window.is_minimized().unwrap_or(false) {
                let _ = window.unminimize();
            }
            let _ = window.show();
            let _ = window.set_focus();
        }
        Err(error) => log::error!("windows: cannot open main window error={error}"),
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn toggle_main_window<R: Runtime>(app: &AppHandle<R>) {
    match app.get_webview_window(MAIN_LABEL) {
        Some(window) if window.is_visible().unwrap_or(false) => {
            let _ = window.hide();
        }
        _ => show_main_window(app),
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn ensure_widget_window<R: Runtime>(app: &AppHandle<R>) -> tauri::Result<WebviewWindow<R>> {
    if let Some(window) = app.get_webview_window(WIDGET_LABEL) {
        return Ok(window);
    }
    let mut builder =
        WebviewWindowBuilder::new(app, WIDGET_LABEL, WebviewUrl::App("widget.html".into()))
            .title("Focus")
            .inner_size(WIDGET_WIDTH, WIDGET_MIN_HEIGHT)
            .decorations(false)
            .transparent(true)
            .always_on_top(true)
            .visible_on_all_workspaces(true)
            .skip_taskbar(true)
            .resizable(false)
            .visible(false);
    if let Some(display) = target_display(app) {
        let (x, y) = widget_position(display);
        log::debug!("windows: widget position x={x} y={y}");
        builder = builder.position(x, y);
    }
    builder.build()
}

/// Focus mode: the widget comes up on the main window's display, above everything else.
#[cfg(all(feature = "app", not(test)))]
pub fn show_widget_window<R: Runtime>(app: &AppHandle<R>) {
    let window = match ensure_widget_window(app) {
        Ok(window) => window,
        Err(error) => {
            log::error!("windows: cannot open widget error={error}");
            return;
        }
    };
    if window.is_minimized().unwrap_or(false) {
        let _ = window.unminimize();
    }
    if let Some(display) = target_display(app) {
        let (x, y) = widget_position(display);
        let _ = window.set_position(LogicalPosition::new(x, y));
    }
    let _ = window.show();
    let _ = window.set_always_on_top(true);
    let _ = window.set_focus();
}

#[cfg(all(feature = "app", not(test)))]
pub fn hide_widget_window<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(WIDGET_LABEL) {
        let _ = window.hide();
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn toggle_widget_window<R: Runtime>(app: &AppHandle<R>) {
    match app.get_webview_window(WIDGET_LABEL) {
        Some(window) if window.is_visible().unwrap_or(false) => {
            let _ = window.hide();
        }
        _ => show_widget_window(app),
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn resize_widget_window<R: Runtime>(app: &AppHandle<R>, height: f64) {
    if let Some(window) = app.get_webview_window(WIDGET_LABEL) {
        let _ = window.set_size(LogicalSize::new(WIDGET_WIDTH, widget_height(height)));
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn set_widget_ignore_mouse<R: Runtime>(app: &AppHandle<R>, ignore: bool) {
    if let Some(window) = app.get_webview_window(WIDGET_LABEL) {
        let _ = window.set_ignore_cursor_events(ignore);
    }
}

#[cfg(all(feature = "app", not(test)))]
pub fn ensure_quick_add_window<R: Runtime>(
    app: &AppHandle<R>,
) -> tauri::Result<WebviewWindow<R>> {
    if let Some(window) = app.get_webview_window(QUICK_ADD_LABEL) {
        return Ok(window);
    }
    let mut builder =
        WebviewWindowBuilder::new(app, QUICK_ADD_LABEL, WebviewUrl::App("quick-add.html".into()))
            .title("Quick Add")
            .inner_size(QUICK_ADD_SIZE.0, QUICK_ADD_SIZE.1)
            .decorations(false)
            .transparent(true)
            .always_on_top(true)
            .skip_taskbar(true)
            .resizable(false)
            .visible(false);
    if let Some(display) = target_display(app) {
        let (x, y) = widget_position(display);
        let below = quick_add_position(Rect {
            x,
            y,
            width: WIDGET_WIDTH,
            height: WIDGET_MIN_HEIGHT,
        });
        builder = builder.position(below.0, below.1);
    }
    builder.build()
}

#[cfg(all(feature = "app", not(test)))]
pub fn show_quick_add_window<R: Runtime>(app: &AppHandle<R>) {
    let window = match ensure_quick_add_window(app) {
        Ok(window) => window,
        Err(error) => {
            log::error!("windows: cannot open quick add error={error}");
            return;
        }
    };
    if let Some(widget) = app.get_webview_window(WIDGET_LABEL) {
        if let Ok(rect) = window_rect(&widget) {
            let (x, y) = quick_add_position(rect);
            let _ = window.set_position(LogicalPosition::new(x, y));
        }
    }
    let _ = window.show();
    let _ = window.set_focus();
}

#[cfg(all(feature = "app", not(test)))]
pub fn hide_quick_add_window<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(QUICK_ADD_LABEL) {
        let _ = window.hide();
    }
}
