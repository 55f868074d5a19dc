use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "focus-todo";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 30;
pub const LOG_ENV_VAR: &str = "FOCUS_TODO_LOG";

/// Log files sit in the app data directory, next to the store and its backup.
pub fn log_directory(app_data_dir: &Path) -> &Path {
    app_data_dir
}

/// `FOCUS_TODO_LOG` wins over `RUST_LOG`; blank values count as unset.
pub fn log_spec(app_var: Option<String>, rust_log: Option<String>, debug: bool) -> String {
    let non_blank = |value: &String| !value.trim().is_empty();
    app_var
        .filter(non_blank)
        .or_else(|| rust_log.filter(non_blank))
        .unwrap_or_else(|| {
            if debug {
                "warn,focus_todo_lib=debug".to_string()
            } else {
                "warn,focus_todo_lib=info".to_string()
            }
        })
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(app_data_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    let dir = log_directory(app_data_dir);
    std::fs::create_dir_all(dir)?;

    let spec = log_spec(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
        cfg!(debug_assertions),
    );

    Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(dir)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::None
        })
        .start()?;

    install_panic_hook();

    log::info!(
        "logging: initialized dir={} rotate_size_bytes={} keep_files={}",
        dir.display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| loc.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}
