use chrono::{DateTime, Datelike, Local, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::models::{next_task_id, Task, TaskId, Timestamp};

pub const MAX_TEXT_CHARS: usize = 500;
/// Pending tasks shown by the widget when nothing is focused.
pub const WIDGET_FALLBACK_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    EmptyText,
    TextTooLong(usize),
    NotFound(TaskId),
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::EmptyText => write!(f, "task text is empty"),
            TaskError::TextTooLong(len) => write!(
                f,
                "task is too long ({len} characters, max {MAX_TEXT_CHARS})"
            ),
            TaskError::NotFound(id) => write!(f, "task not found: {id}"),
        }
    }
}

impl std::error::Error for TaskError {}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T09:30:00.000Z`.
pub fn iso_timestamp(at: Timestamp) -> String {
    Utc.timestamp_millis_opt(at)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn add_task(
    tasks: &mut Vec<Task>,
    text: &str,
    focused: bool,
    now: Timestamp,
) -> Result<Task, TaskError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }
    let len = text.chars().count();
    if len > MAX_TEXT_CHARS {
        return Err(TaskError::TextTooLong(len));
    }

    let mut task = Task::new(next_task_id(tasks, now), text);
    if focused {
        task.focused = Some(true);
    }
    task.created_at = Some(Some(iso_timestamp(now)));
    tasks.push(task.clone());
    Ok(task)
}

fn find_mut(tasks: &mut [Task], id: TaskId) -> Result<&mut Task, TaskError> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or(TaskError::NotFound(id))
}

/// Flips `done`; `completedAt` follows (timestamp when done, `null` when reopened).
pub fn toggle_task(tasks: &mut [Task], id: TaskId, now: Timestamp) -> Result<Task, TaskError> {
    let task = find_mut(tasks, id)?;
    task.done = !task.done;
    task.completed_at = Some(task.done.then(|| iso_timestamp(now)));
    Ok(task.clone())
}

pub fn complete_task(tasks: &mut [Task], id: TaskId, now: Timestamp) -> Result<Task, TaskError> {
    let task = find_mut(tasks, id)?;
    task.done = true;
    task.completed_at = Some(Some(iso_timestamp(now)));
    Ok(task.clone())
}

pub fn delete_task(tasks: &mut Vec<Task>, id: TaskId) -> Result<(), TaskError> {
    let before = tasks.len();
    tasks.retain(|task| task.id != id);
    if tasks.len() == before {
        return Err(TaskError::NotFound(id));
    }
    Ok(())
}

/// Returns the new focus state.
pub fn toggle_focus(tasks: &mut [Task], id: TaskId) -> Result<bool, TaskError> {
    let task = find_mut(tasks, id)?;
    let next = !task.is_focused();
    task.focused = Some(next);
    Ok(next)
}

pub fn pending(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|task| !task.done).cloned().collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    /// True when `tasks` are the explicitly focused ones.
    pub focused_mode: bool,
    pub tasks: Vec<Task>,
}

pub fn widget_tasks(tasks: &[Task]) -> WidgetView {
    let open = pending(tasks);
    let focused: Vec<Task> = open.iter().filter(|task| task.is_focused()).cloned().collect();
    if !focused.is_empty() {
        return WidgetView {
            focused_mode: true,
            tasks: focused,
        };
    }
    WidgetView {
        focused_mode: false,
        tasks: open.into_iter().take(WIDGET_FALLBACK_COUNT).collect(),
    }
}

fn completed_time(task: &Task) -> Option<DateTime<Utc>> {
    if !task.done {
        return None;
    }
    let raw = task.completed_at()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Completed tasks, most recently completed first. Tasks without a readable `completedAt`
/// are left out.
pub fn completed_history(tasks: &[Task]) -> Vec<Task> {
    let mut done: Vec<(DateTime<Utc>, &Task)> = tasks
        .iter()
        .filter_map(|task| completed_time(task).map(|at| (at, task)))
        .collect();
    done.sort_by(|a, b| b.0.cmp(&a.0));
    done.into_iter().map(|(_, task)| task.clone()).collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub completed_today: usize,
    pub completed_this_month: usize,
    pub completed_total: usize,
    /// Share of all tasks that are done, rounded to a whole percent.
    pub progress_percent: u32,
}

pub fn stats(tasks: &[Task], now: DateTime<Local>) -> TaskStats {
    let completed: Vec<DateTime<Local>> = tasks
        .iter()
        .filter_map(completed_time)
        .map(|at| at.with_timezone(&Local))
        .collect();
    let today = now.date_naive();
    let completed_today = completed
        .iter()
        .filter(|at| at.date_naive() == today)
        .count();
    let completed_this_month = completed
        .iter()
        .filter(|at| at.year() == now.year() && at.month() == now.month())
        .count();

    let total = tasks.len();
    let done = tasks.iter().filter(|task| task.done).count();
    let progress_percent = if total > 0 {
        ((done as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };

    TaskStats {
        completed_today,
        completed_this_month,
        completed_total: completed.len(),
        progress_percent,
    }
}
