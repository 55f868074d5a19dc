use chrono::{Local, Utc};

use crate::events::{DataPayload, BACKUP_TOAST_MESSAGE};
use crate::models::{Settings, Task, TaskId};
use crate::state::AppState;
use crate::tasks::{self, TaskError, TaskStats, WidgetView};

#[cfg(all(feature = "app", not(test)))]
use crate::events::{EVENT_DATA_UPDATED, EVENT_SETTINGS_UPDATED};
#[cfg(all(feature = "app", not(test)))]
use crate::tray::update_tray_tooltip;
#[cfg(all(feature = "app", not(test)))]
use crate::windows;
#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Runtime, State};

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Everything a command needs from the window layer. Kept behind a trait so commands can be
/// exercised without a running webview.
trait CommandCtx {
    fn emit_data_updated(&self, payload: DataPayload);
    fn emit_settings_updated(&self, settings: Settings);
    fn update_tray(&self, tasks: &[Task]);
    fn show_main(&self);
    fn show_widget(&self);
    fn hide_widget(&self);
    fn show_quick_add(&self);
    fn hide_quick_add(&self);
    fn resize_widget(&self, height: f64);
    fn set_widget_ignore_mouse(&self, ignore: bool);
    fn quit(&self);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn broadcast_tasks(ctx: &impl CommandCtx, state: &AppState) {
    let tasks = state.store().tasks();
    ctx.update_tray(&tasks);
    ctx.emit_data_updated(DataPayload { tasks });
}

// Runs a task-list edit inside the store's critical section; the change is broadcast only when
// it applied.
fn mutate_tasks<T>(
    ctx: &impl CommandCtx,
    state: &AppState,
    edit: impl FnOnce(&mut Vec<Task>) -> Result<T, TaskError>,
) -> CommandResult<T> {
    match state.store().try_update(|doc| edit(&mut doc.tasks)) {
        Ok(value) => {
            broadcast_tasks(ctx, state);
            ok(value)
        }
        Err(error) => {
            log::warn!("commands: task edit rejected error={error}");
            err(&error.to_string())
        }
    }
}

fn get_data_impl(state: &AppState) -> CommandResult<DataPayload> {
    ok(DataPayload {
        tasks: state.store().tasks(),
    })
}

fn save_data_impl(ctx: &impl CommandCtx, state: &AppState, tasks: Vec<Task>) -> CommandResult<bool> {
    state.store().set_tasks(tasks);
    broadcast_tasks(ctx, state);
    ok(true)
}

fn add_task_impl(ctx: &impl CommandCtx, state: &AppState, text: String) -> CommandResult<Task> {
    mutate_tasks(ctx, state, |list| tasks::add_task(list, &text, false, now_ms()))
}

fn toggle_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: TaskId) -> CommandResult<Task> {
    mutate_tasks(ctx, state, |list| tasks::toggle_task(list, task_id, now_ms()))
}

fn complete_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: TaskId,
) -> CommandResult<Task> {
    mutate_tasks(ctx, state, |list| tasks::complete_task(list, task_id, now_ms()))
}

fn delete_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: TaskId) -> CommandResult<bool> {
    mutate_tasks(ctx, state, |list| tasks::delete_task(list, task_id).map(|()| true))
}

fn toggle_focus_impl(ctx: &impl CommandCtx, state: &AppState, task_id: TaskId) -> CommandResult<bool> {
    let result = mutate_tasks(ctx, state, |list| tasks::toggle_focus(list, task_id));
    // Focusing a task switches to the widget; unfocusing leaves windows alone.
    if result.data == Some(true) {
        enter_focus_mode_impl(ctx, state);
    }
    result
}

fn get_settings_impl(state: &AppState) -> CommandResult<Settings> {
    ok(state.store().settings())
}

fn save_settings_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    settings: Settings,
) -> CommandResult<Settings> {
    state.store().set_settings(settings.clone());
    ctx.emit_settings_updated(settings.clone());
    ok(settings)
}

fn get_stats_impl(state: &AppState) -> CommandResult<TaskStats> {
    ok(tasks::stats(&state.store().tasks(), Local::now()))
}

fn get_completed_history_impl(state: &AppState) -> CommandResult<Vec<Task>> {
    ok(tasks::completed_history(&state.store().tasks()))
}

fn get_widget_tasks_impl(state: &AppState) -> CommandResult<WidgetView> {
    ok(tasks::widget_tasks(&state.store().tasks()))
}

fn enter_focus_mode_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<bool> {
    ctx.show_widget();
    ctx.emit_data_updated(DataPayload {
        tasks: state.store().tasks(),
    });
    ctx.emit_settings_updated(state.store().settings());
    ok(true)
}

fn restore_main_impl(ctx: &impl CommandCtx) -> CommandResult<bool> {
    ctx.show_main();
    ok(true)
}

fn open_quick_add_impl(ctx: &impl CommandCtx) -> CommandResult<bool> {
    ctx.show_quick_add();
    ok(true)
}

/// Quick-add tasks start focused, and the widget is brought forward to show them.
fn submit_quick_add_impl(ctx: &impl CommandCtx, state: &AppState, text: String) -> CommandResult<Task> {
    let result = mutate_tasks(ctx, state, |list| tasks::add_task(list, &text, true, now_ms()));
    if result.ok {
        ctx.hide_quick_add();
        ctx.show_widget();
    }
    result
}

fn close_quick_add_impl(ctx: &impl CommandCtx) -> CommandResult<bool> {
    ctx.hide_quick_add();
    ok(true)
}

fn close_widget_impl(ctx: &impl CommandCtx) -> CommandResult<bool> {
    ctx.hide_widget();
    ok(true)
}

fn resize_widget_impl(ctx: &impl CommandCtx, height: f64) -> CommandResult<bool> {
    ctx.resize_widget(height);
    ok(true)
}

fn set_widget_ignore_mouse_impl(ctx: &impl CommandCtx, ignore: bool) -> CommandResult<bool> {
    ctx.set_widget_ignore_mouse(ignore);
    ok(true)
}

fn take_backup_notice_impl(state: &AppState) -> CommandResult<Option<String>> {
    ok(state
        .take_backup_notice()
        .then(|| BACKUP_TOAST_MESSAGE.to_string()))
}

fn quit_app_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<bool> {
    state.shutdown();
    ctx.quit();
    ok(true)
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn emit_data_updated(&self, payload: DataPayload) {
        if let Err(error) = self.app.emit(EVENT_DATA_UPDATED, payload) {
            log::warn!("commands: emit data_updated failed error={error}");
        }
    }

    fn emit_settings_updated(&self, settings: Settings) {
        if let Err(error) = self.app.emit(EVENT_SETTINGS_UPDATED, settings) {
            log::warn!("commands: emit settings_updated failed error={error}");
        }
    }

    fn update_tray(&self, tasks: &[Task]) {
        update_tray_tooltip(self.app, tasks);
    }

    fn show_main(&self) {
        windows::show_main_window(self.app);
    }

    fn show_widget(&self) {
        windows::show_widget_window(self.app);
    }

    fn hide_widget(&self) {
        windows::hide_widget_window(self.app);
    }

    fn show_quick_add(&self) {
        windows::show_quick_add_window(self.app);
    }

    fn hide_quick_add(&self) {
        windows::hide_quick_add_window(self.app);
    }

    fn resize_widget(&self, height: f64) {
        windows::resize_widget_window(self.app, height);
    }

    fn set_widget_ignore_mouse(&self, ignore: bool) {
        windows::set_widget_ignore_mouse(self.app, ignore);
    }

    fn quit(&self) {
        self.app.exit(0);
    }
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_data(state: State<AppState>) -> CommandResult<DataPayload> {
    get_data_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn save_data(app: AppHandle, state: State<AppState>, tasks: Vec<Task>) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    save_data_impl(&ctx, state.inner(), tasks)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_task(app: AppHandle, state: State<AppState>, text: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_task_impl(&ctx, state.inner(), text)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_task(app: AppHandle, state: State<AppState>, task_id: TaskId) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn complete_task(
    app: AppHandle,
    state: State<AppState>,
    task_id: TaskId,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    complete_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_task(app: AppHandle, state: State<AppState>, task_id: TaskId) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    delete_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_focus(app: AppHandle, state: State<AppState>, task_id: TaskId) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_focus_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_settings(state: State<AppState>) -> CommandResult<Settings> {
    get_settings_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn save_settings(
    app: AppHandle,
    state: State<AppState>,
    settings: Settings,
) -> CommandResult<Settings> {
    let ctx = TauriCommandCtx { app: &app };
    save_settings_impl(&ctx, state.inner(), settings)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_stats(state: State<AppState>) -> CommandResult<TaskStats> {
    get_stats_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_completed_history(state: State<AppState>) -> CommandResult<Vec<Task>> {
    get_completed_history_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_widget_tasks(state: State<AppState>) -> CommandResult<WidgetView> {
    get_widget_tasks_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn enter_focus_mode(app: AppHandle, state: State<AppState>) -> CommandResult<bool> {
    log::info!("commands: enter_focus_mode");
    let ctx = TauriCommandCtx { app: &app };
    enter_focus_mode_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn restore_main(app: AppHandle) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    restore_main_impl(&ctx)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn open_quick_add(app: AppHandle) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    open_quick_add_impl(&ctx)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn submit_quick_add(app: AppHandle, state: State<AppState>, text: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    submit_quick_add_impl(&ctx, state.inner(), text)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn close_quick_add(app: AppHandle) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    close_quick_add_impl(&ctx)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn close_widget(app: AppHandle) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    close_widget_impl(&ctx)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn resize_widget(app: AppHandle, height: f64) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    resize_widget_impl(&ctx, height)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn set_widget_ignore_mouse(app: AppHandle, ignore: bool) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    set_widget_ignore_mouse_impl(&ctx, ignore)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn take_backup_notice(state: State<AppState>) -> CommandResult<Option<String>> {
    take_backup_notice_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn quit_app(app: AppHandle, state: State<AppState>) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    quit_app_impl(&ctx, state.inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BackupNotice;
    use crate::store::{Store, StoreOptions};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum WindowAction {
        ShowMain,
        ShowWidget,
        HideWidget,
        ShowQuickAdd,
        HideQuickAdd,
        ResizeWidget(f64),
        IgnoreMouse(bool),
        Quit,
    }

    #[derive(Default)]
    struct TestCtx {
        data_events: Mutex<Vec<DataPayload>>,
        settings_events: Mutex<Vec<Settings>>,
        tray_updates: Mutex<usize>,
        actions: Mutex<Vec<WindowAction>>,
    }

    impl TestCtx {
        fn actions(&self) -> Vec<WindowAction> {
            self.actions.lock().unwrap().clone()
        }

        fn record(&self, action: WindowAction) {
            self.actions.lock().unwrap().push(action);
        }

        fn last_data(&self) -> Option<DataPayload> {
            self.data_events.lock().unwrap().last().cloned()
        }
    }

    impl CommandCtx for TestCtx {
        fn emit_data_updated(&self, payload: DataPayload) {
            self.data_events.lock().unwrap().push(payload);
        }

        fn emit_settings_updated(&self, settings: Settings) {
            self.settings_events.lock().unwrap().push(settings);
        }

        fn update_tray(&self, _tasks: &[Task]) {
            *self.tray_updates.lock().unwrap() += 1;
        }

        fn show_main(&self) {
            self.record(WindowAction::ShowMain);
        }

        fn show_widget(&self) {
            self.record(WindowAction::ShowWidget);
        }

        fn hide_widget(&self) {
            self.record(WindowAction::HideWidget);
        }

        fn show_quick_add(&self) {
            self.record(WindowAction::ShowQuickAdd);
        }

        fn hide_quick_add(&self) {
            self.record(WindowAction::HideQuickAdd);
        }

        fn resize_widget(&self, height: f64) {
            self.record(WindowAction::ResizeWidget(height));
        }

        fn set_widget_ignore_mouse(&self, ignore: bool) {
            self.record(WindowAction::IgnoreMouse(ignore));
        }

        fn quit(&self) {
            self.record(WindowAction::Quit);
        }
    }

    fn make_state(dir: &tempfile::TempDir, tasks: Vec<Task>) -> AppState {
        let store = Store::open(StoreOptions::new(
            dir.path().to_path_buf(),
            tokio::runtime::Handle::current(),
        ));
        store.set_tasks(tasks);
        AppState::new(store, BackupNotice::default())
    }

    #[test]
    fn ok_and_err_helpers_construct_expected_shape() {
        let r = ok(123);
        assert!(r.ok);
        assert_eq!(r.data, Some(123));
        assert_eq!(r.error, None);

        let r: CommandResult<i32> = err("nope");
        assert!(!r.ok);
        assert_eq!(r.data, None);
        assert_eq!(r.error, Some("nope".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn get_and_save_data_broadcast_to_windows() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        assert_eq!(get_data_impl(&state).data.unwrap().tasks, Vec::<Task>::new());

        let saved = save_data_impl(&ctx, &state, vec![Task::new(1, "A")]);
        assert!(saved.ok);
        assert_eq!(get_data_impl(&state).data.unwrap().tasks, vec![Task::new(1, "A")]);
        assert_eq!(ctx.last_data().unwrap().tasks, vec![Task::new(1, "A")]);
        assert_eq!(*ctx.tray_updates.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn saved_tasks_reach_disk_after_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        save_data_impl(&ctx, &state, vec![Task::new(1, "A")]);
        tokio::time::sleep(Duration::from_millis(600)).await;

        let raw = std::fs::read_to_string(state.store().path()).unwrap();
        let on_disk: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk["tasks"], json!([{ "id": 1, "text": "A", "done": false }]));
    }

    #[tokio::test(start_paused = true)]
    async fn add_toggle_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        let added = add_task_impl(&ctx, &state, "  write tests ".to_string());
        let task = added.data.expect("task added");
        assert_eq!(task.text, "write tests");
        assert!(task.created_at().is_some());

        let toggled = toggle_task_impl(&ctx, &state, task.id).data.unwrap();
        assert!(toggled.done);
        assert!(toggled.completed_at().is_some());
        let reopened = toggle_task_impl(&ctx, &state, task.id).data.unwrap();
        assert!(!reopened.done);
        assert_eq!(reopened.completed_at, Some(None));

        assert!(delete_task_impl(&ctx, &state, task.id).ok);
        assert!(state.store().tasks().is_empty());
        assert_eq!(ctx.data_events.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_edits_report_errors_without_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        let empty = add_task_impl(&ctx, &state, "   ".to_string());
        assert!(!empty.ok);
        assert_eq!(empty.error.as_deref(), Some("task text is empty"));

        let missing = toggle_task_impl(&ctx, &state, 42);
        assert_eq!(missing.error.as_deref(), Some("task not found: 42"));
        assert!(!delete_task_impl(&ctx, &state, 42).ok);
        assert!(ctx.data_events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn complete_task_from_widget() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, vec![Task::new(7, "seven")]);

        let completed = complete_task_impl(&ctx, &state, 7).data.unwrap();
        assert!(completed.done);
        assert!(completed.completed_at().is_some());
        assert!(ctx.last_data().unwrap().tasks[0].done);
        assert!(!complete_task_impl(&ctx, &state, 8).ok);
    }

    #[tokio::test(start_paused = true)]
    async fn focusing_a_task_enters_focus_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, vec![Task::new(1, "a")]);

        assert_eq!(toggle_focus_impl(&ctx, &state, 1).data, Some(true));
        assert_eq!(ctx.actions(), vec![WindowAction::ShowWidget]);
        assert_eq!(ctx.settings_events.lock().unwrap().len(), 1);

        assert_eq!(toggle_focus_impl(&ctx, &state, 1).data, Some(false));
        assert_eq!(ctx.actions(), vec![WindowAction::ShowWidget]);

        let view = get_widget_tasks_impl(&state).data.unwrap();
        assert!(!view.focused_mode);
        assert_eq!(view.tasks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_are_saved_and_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        let mut next = get_settings_impl(&state).data.unwrap();
        next.theme = crate::models::Theme::Light;
        next.accent = "green".to_string();
        let saved = save_settings_impl(&ctx, &state, next.clone());
        assert_eq!(saved.data, Some(next.clone()));
        assert_eq!(get_settings_impl(&state).data, Some(next.clone()));
        assert_eq!(*ctx.settings_events.lock().unwrap(), vec![next]);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_add_creates_focused_task_and_shows_widget() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        assert!(open_quick_add_impl(&ctx).ok);
        let task = submit_quick_add_impl(&ctx, &state, "call back".to_string())
            .data
            .unwrap();
        assert!(task.is_focused());
        assert_eq!(
            ctx.actions(),
            vec![
                WindowAction::ShowQuickAdd,
                WindowAction::HideQuickAdd,
                WindowAction::ShowWidget
            ]
        );

        let view = get_widget_tasks_impl(&state).data.unwrap();
        assert!(view.focused_mode);
        assert_eq!(view.tasks, vec![task]);

        // Empty submissions leave the popup open.
        assert!(!submit_quick_add_impl(&ctx, &state, String::new()).ok);
        assert_eq!(ctx.actions().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_commands_forward_to_ctx() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, Vec::new());

        restore_main_impl(&ctx);
        close_widget_impl(&ctx);
        close_quick_add_impl(&ctx);
        resize_widget_impl(&ctx, 120.0);
        set_widget_ignore_mouse_impl(&ctx, true);
        enter_focus_mode_impl(&ctx, &state);
        quit_app_impl(&ctx, &state);

        assert_eq!(
            ctx.actions(),
            vec![
                WindowAction::ShowMain,
                WindowAction::HideWidget,
                WindowAction::HideQuickAdd,
                WindowAction::ResizeWidget(120.0),
                WindowAction::IgnoreMouse(true),
                WindowAction::ShowWidget,
                WindowAction::Quit,
            ]
        );
        assert!(!state.store().has_pending_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn backup_notice_is_delivered_once() {
        let dir = tempfile::tempdir().unwrap();
        let notice = BackupNotice::default();
        let store = Store::open(StoreOptions::new(
            dir.path().to_path_buf(),
            tokio::runtime::Handle::current(),
        ));
        let state = AppState::new(store, notice.clone());

        assert_eq!(take_backup_notice_impl(&state).data, Some(None));
        notice.mark();
        assert_eq!(
            take_backup_notice_impl(&state).data,
            Some(Some("Backup created successfully".to_string()))
        );
        assert_eq!(take_backup_notice_impl(&state).data, Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_and_history_reflect_completed_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestCtx::default();
        let state = make_state(&dir, vec![Task::new(1, "a"), Task::new(2, "b")]);

        complete_task_impl(&ctx, &state, 2);
        let stats = get_stats_impl(&state).data.unwrap();
        assert_eq!(stats.completed_total, 1);
        assert_eq!(stats.completed_today, 1);
        assert_eq!(stats.progress_percent, 50);

        let history = get_completed_history_impl(&state).data.unwrap();
        assert_eq!(history.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
    }
}
