use crate::models::Task;

pub const EVENT_DATA_UPDATED: &str = "data_updated";
pub const EVENT_SETTINGS_UPDATED: &str = "settings_updated";
pub const EVENT_SHORTCUT_ADD_TASK: &str = "shortcut_add_task";
pub const EVENT_BACKUP_TOAST: &str = "backup_toast";

pub const BACKUP_TOAST_MESSAGE: &str = "Backup created successfully";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DataPayload {
    pub tasks: Vec<Task>,
}
