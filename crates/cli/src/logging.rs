//! Process-wide logging backend for the `cdb` binary.
//!
//! Library crates only use the `log` facade; this installs `flexi_logger`
//! behind it exactly once. Output goes to stderr unless a log directory is
//! configured, in which case files rotate by size.

use std::path::{Path, PathBuf};

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use once_cell::sync::OnceCell;

const LOG_FILE_BASENAME: &str = "cdb";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    spec: String,
    directory: Option<PathBuf>,
    _logger: LoggerHandle,
}

/// Start logging with a flexi_logger spec string (e.g. `"info"` or
/// `"warn, cdb_store=debug"`). `RUST_LOG`, when set, replaces `spec`.
///
/// Repeated calls with the same arguments are no-ops; a different spec or
/// directory after the first call is rejected.
pub fn init_logging(spec: &str, directory: Option<&Path>) -> Result<(), String> {
    let spec = std::env::var("RUST_LOG").unwrap_or_else(|_| spec.trim().to_string());

    let state = LOGGING_STATE.get_or_try_init(|| start(&spec, directory))?;

    if state.spec != spec || state.directory.as_deref() != directory {
        return Err(format!(
            "logging already initialized with `{}`; refusing to switch to `{}`",
            state.spec, spec
        ));
    }
    Ok(())
}

fn start(spec: &str, directory: Option<&Path>) -> Result<LoggingState, String> {
    let logger = Logger::try_with_str(spec)
        .map_err(|err| format!("invalid log level `{spec}`: {err}"))?;

    let logger = match directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                format!("failed to create log directory `{}`: {err}", dir.display())
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
        None => logger.log_to_stderr().format_for_stderr(flexi_logger::default_format),
    };

    let handle = logger
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    log::debug!(
        "logging started: spec={} target={}",
        spec,
        directory.map_or_else(|| "stderr".to_string(), |d| d.display().to_string())
    );

    Ok(LoggingState {
        spec: spec.to_string(),
        directory: directory.map(Path::to_path_buf),
        _logger: handle,
    })
}

