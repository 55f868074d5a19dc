use serde_json::Value;

use crate::models::{Document, Task};

/// Schema version written once every migration below has run.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const LEGACY_PROJECTS_KEY: &str = "projects";

/// Outcome of [`run_migrations`]; `changed` tells the caller whether the document must be saved.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub changed: bool,
    pub flattened_tasks: usize,
    pub unmigrated_tasks: usize,
}

/// Brings `doc` up to [`CURRENT_SCHEMA_VERSION`]. Safe to call on every start.
pub fn run_migrations(doc: &mut Document) -> MigrationReport {
    let mut report = MigrationReport::default();
    let version = doc.schema_version.unwrap_or(0);

    if version < 1 {
        flatten_legacy_projects(doc, &mut report);
        doc.schema_version = Some(1);
        report.changed = true;
    }

    if report.changed {
        log::info!(
            "migrations: schema_version {} -> {} flattened={} unmigrated={}",
            version,
            CURRENT_SCHEMA_VERSION,
            report.flattened_tasks,
            report.unmigrated_tasks
        );
    }
    report
}

// v1: the old layout nested tasks as `projects[].tabs[].tasks[]`. Tasks are appended to the flat
// list in project/tab order and `projects` is emptied.
fn flatten_legacy_projects(doc: &mut Document, report: &mut MigrationReport) {
    let projects = match doc.extra.get_mut(LEGACY_PROJECTS_KEY) {
        Some(Value::Array(projects)) if !projects.is_empty() => std::mem::take(projects),
        _ => return,
    };

    let mut rejected = Vec::new();
    for raw in projects
        .iter()
        .filter_map(|project| project.get("tabs").and_then(Value::as_array))
        .flatten()
        .filter_map(|tab| tab.get("tasks").and_then(Value::as_array))
        .flatten()
    {
        match serde_json::from_value::<Task>(raw.clone()) {
            Ok(task) => {
                doc.tasks.push(task);
                report.flattened_tasks += 1;
            }
            Err(error) => {
                log::warn!("migrations: legacy task kept aside error={error}");
                rejected.push(raw.clone());
            }
        }
    }

    report.unmigrated_tasks = rejected.len();
    doc.park_unmigrated(rejected);
}
