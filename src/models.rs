use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Integer task id. Historically the creation time in milliseconds; new ids come from
/// [`next_task_id`] so they stay integers but never collide within one list.
pub type TaskId = i64;

pub const KEY_TASKS: &str = "tasks";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_LAST_BACKUP: &str = "lastBackup";
pub const KEY_SCHEMA_VERSION: &str = "schemaVersion";
/// Stored task entries that do not fit [`Task`]; kept verbatim instead of dropped.
pub const KEY_UNMIGRATED_TASKS: &str = "unmigratedTasks";
/// A stored `settings` value that does not fit [`Settings`].
pub const KEY_INVALID_SETTINGS: &str = "invalidSettings";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
    /// Missing on tasks that were never focused; an explicit `false` is kept as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
    /// ISO-8601.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Option<String>>,
    /// ISO-8601, `null` once a task is un-done again.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            done: false,
            focused: None,
            created_at: None,
            completed_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused.unwrap_or(false)
    }

    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_ref().and_then(|value| value.as_deref())
    }

    pub fn completed_at(&self) -> Option<&str> {
        self.completed_at.as_ref().and_then(|value| value.as_deref())
    }
}

// Timestamps are tri-state on disk: missing, `null`, or a value. A present `null` must stay
// `Some(None)` so it is written back.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_accent")]
    pub accent: String,
    #[serde(default)]
    pub show_archived: bool,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            accent: default_accent(),
            show_archived: false,
            auto_advance: false,
            extra: Map::new(),
        }
    }
}

fn default_accent() -> String {
    "purple".to_string()
}

/// The whole persisted JSON object. Unknown top-level keys land in `extra` and are written
/// back untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Decodes a stored document, keeping whatever fits the schema.
    ///
    /// Only a value that is not a JSON object is an error. Task entries that do not decode are
    /// appended to `unmigratedTasks`, an undecodable `settings` falls back to defaults and is
    /// kept under `invalidSettings`, and ill-typed `lastBackup`/`schemaVersion` are dropped.
    pub fn from_stored(value: Value) -> Result<(Document, usize), serde_json::Error> {
        let mut map: Map<String, Value> = serde_json::from_value(value)?;
        let mut doc = Document::default();

        let mut rejected = Vec::new();
        match map.remove(KEY_TASKS) {
            Some(Value::Array(entries)) => {
                for entry in entries {
                    match serde_json::from_value::<Task>(entry.clone()) {
                        Ok(task) => doc.tasks.push(task),
                        Err(error) => {
                            log::warn!("models: stored task set aside error={error}");
                            rejected.push(entry);
                        }
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => rejected.push(other),
        }

        if let Some(raw) = map.remove(KEY_SETTINGS) {
            match serde_json::from_value::<Settings>(raw.clone()) {
                Ok(settings) => doc.settings = settings,
                Err(error) => {
                    log::warn!("models: stored settings replaced by defaults error={error}");
                    map.insert(KEY_INVALID_SETTINGS.to_string(), raw);
                }
            }
        }

        doc.last_backup = map
            .remove(KEY_LAST_BACKUP)
            .and_then(|raw| serde_json::from_value(raw).ok());
        doc.schema_version = map
            .remove(KEY_SCHEMA_VERSION)
            .and_then(|raw| serde_json::from_value(raw).ok());

        let rejected_count = rejected.len();
        doc.extra = map;
        doc.park_unmigrated(rejected);
        Ok((doc, rejected_count))
    }

    /// Appends raw task entries to `unmigratedTasks`.
    pub fn park_unmigrated(&mut self, entries: Vec<Value>) {
        if entries.is_empty() {
            return;
        }
        match self.extra.get_mut(KEY_UNMIGRATED_TASKS) {
            Some(Value::Array(existing)) => existing.extend(entries),
            _ => {
                self.extra
                    .insert(KEY_UNMIGRATED_TASKS.to_string(), Value::Array(entries));
            }
        }
    }
}

/// Next free id: the current millisecond unless an existing task already holds it or a later one.
pub fn next_task_id(tasks: &[Task], now: Timestamp) -> TaskId {
    let max_existing = tasks.iter().map(|task| task.id).max();
    match max_existing {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.accent, "purple");
        assert!(!settings.show_archived);
        assert!(!settings.auto_advance);
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn settings_serde_applies_defaults_for_missing_fields() {
        let settings: Settings =
            serde_json::from_value(json!({ "theme": "light" })).expect("settings should parse");
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.accent, "purple");
        assert!(!settings.show_archived);
        assert!(!settings.auto_advance);
    }

    #[test]
    fn settings_use_camel_case_names() {
        let mut settings = Settings::default();
        settings.show_archived = true;
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            value,
            json!({
                "theme": "dark",
                "accent": "purple",
                "showArchived": true,
                "autoAdvance": false
            })
        );
    }

    #[test]
    fn task_keeps_unknown_fields_and_null_completed_at() {
        let raw = json!({
            "id": 7,
            "text": "write report",
            "done": false,
            "completedAt": null,
            "priority": "high"
        });
        let task: Task = serde_json::from_value(raw.clone()).expect("task should parse");
        assert_eq!(task.id, 7);
        assert_eq!(task.completed_at, Some(None));
        assert_eq!(task.completed_at(), None);
        assert_eq!(task.extra.get("priority"), Some(&json!("high")));

        assert_eq!(serde_json::to_value(&task).unwrap(), raw);
    }

    #[test]
    fn minimal_task_serializes_without_optional_fields() {
        let task = Task::new(1, "A");
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({ "id": 1, "text": "A", "done": false })
        );
    }

    #[test]
    fn document_preserves_unknown_top_level_keys() {
        let raw = json!({
            "tasks": [],
            "settings": { "theme": "dark", "accent": "blue", "showArchived": false, "autoAdvance": true },
            "lastBackup": 1_700_000_000_000_i64,
            "windowBounds": { "x": 10 }
        });
        let doc: Document = serde_json::from_value(raw.clone()).expect("document should parse");
        assert_eq!(doc.last_backup, Some(1_700_000_000_000));
        assert!(doc.settings.auto_advance);
        assert_eq!(doc.extra.get("windowBounds"), Some(&json!({ "x": 10 })));
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn document_rejects_invalid_theme() {
        let raw = json!({ "settings": { "theme": "sepia" } });
        assert!(serde_json::from_value::<Document>(raw).is_err());
    }

    #[test]
    fn task_keeps_explicit_false_focus_and_null_created_at() {
        let raw = json!({ "id": 5, "text": "B", "done": false, "focused": false, "createdAt": null });
        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(task.focused, Some(false));
        assert!(!task.is_focused());
        assert_eq!(task.created_at, Some(None));
        assert_eq!(serde_json::to_value(&task).unwrap(), raw);
    }

    #[test]
    fn task_reads_null_text_and_done_as_defaults() {
        let task: Task =
            serde_json::from_value(json!({ "id": 2, "text": null, "done": null })).unwrap();
        assert_eq!(task.text, "");
        assert!(!task.done);
    }

    #[test]
    fn stored_document_keeps_tasks_that_fit() {
        let raw = json!({
            "tasks": [
                { "id": 1, "text": "keep me", "done": false },
                { "id": "not-a-number", "text": "odd" },
                { "id": 3, "text": "also kept", "done": true }
            ],
            "settings": { "theme": "sepia" },
            "lastBackup": "yesterday",
            "schemaVersion": 1,
            "windowBounds": { "x": 10 }
        });
        let (doc, rejected) = Document::from_stored(raw).unwrap();

        assert_eq!(rejected, 1);
        assert_eq!(
            doc.tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(
            doc.extra.get(KEY_UNMIGRATED_TASKS),
            Some(&json!([{ "id": "not-a-number", "text": "odd" }]))
        );
        assert_eq!(doc.settings, Settings::default());
        assert_eq!(doc.extra.get(KEY_INVALID_SETTINGS), Some(&json!({ "theme": "sepia" })));
        assert_eq!(doc.last_backup, None);
        assert_eq!(doc.schema_version, Some(1));
        assert_eq!(doc.extra.get("windowBounds"), Some(&json!({ "x": 10 })));
    }

    #[test]
    fn stored_document_must_be_an_object() {
        assert!(Document::from_stored(json!([1, 2])).is_err());
        let (empty, rejected) = Document::from_stored(json!({})).unwrap();
        assert_eq!(empty, Document::default());
        assert_eq!(rejected, 0);
    }

    #[test]
    fn next_task_id_never_collides() {
        assert_eq!(next_task_id(&[], 1000), 1000);

        let tasks = vec![Task::new(1000, "a")];
        assert_eq!(next_task_id(&tasks, 1000), 1001);
        assert_eq!(next_task_id(&tasks, 999), 1001);
        assert_eq!(next_task_id(&tasks, 5000), 5000);
    }
}
