use std::fs::File;
use std::io::{self, stderr};
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Local;
use miette::{Context, IntoDiagnostic};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::reload;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, reload::Handle, util::SubscriberInitExt,
};

pub trait LogHandle: Send + Sync {
    fn set_filter(&self, new_filter: EnvFilter) -> miette::Result<()>;
}

impl<S> LogHandle for Handle<EnvFilter, S>
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    fn set_filter(&self, new_filter: EnvFilter) -> miette::Result<()> {
        self.modify(|current| *current = new_filter)
            .into_diagnostic()
    }
}

pub struct LogHandles {
    console_handle: Mutex<Box<dyn LogHandle>>,
    file_handle: Mutex<Box<dyn LogHandle>>,
    log_file: Option<PathBuf>,
}

/// Directory the file layer writes into.
pub fn log_dir() -> PathBuf {
    std::env::temp_dir().join("arbor_logs")
}

fn file_writer() -> miette::Result<(NonBlocking, PathBuf)> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)
        .into_diagnostic()
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("arbor_{timestamp}.log"));
    let file = File::create(&path)
        .into_diagnostic()
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let (writer, guard) = non_blocking(file);
    std::mem::forget(guard); // Keep the guard alive.
    Ok((writer, path))
}

static LOG_HANDLES: LazyLock<LogHandles> = LazyLock::new(|| {
    #[cfg(feature = "dev-tools")]
    color_backtrace::install();

    // Console Layer with its own reloadable filter
    let console_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let (console_filter, console_handle) = reload::Layer::new(console_filter);
    let console_layer = fmt::layer()
        .without_time()
        .with_writer(stderr)
        .with_filter(console_filter);

    // File Layer with its own reloadable filter (initially off)
    let file_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .from_env_lossy();
    let (file_filter, file_handle) = reload::Layer::new(file_filter);

    let (writer, log_file) = match file_writer() {
        Ok((writer, path)) => (writer, Some(path)),
        Err(e) => {
            eprintln!("{e:?}");
            let (writer, guard) = non_blocking(io::sink());
            std::mem::forget(guard);
            (writer, None)
        }
    };

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false) // No colors in file
        .with_filter(file_filter);

    // A subscriber may already be installed, e.g. by a test harness
    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();

    LogHandles {
        console_handle: Mutex::new(Box::new(console_handle)),
        file_handle: Mutex::new(Box::new(file_handle)),
        log_file,
    }
});

pub fn set_log_level(level: Level) -> miette::Result<()> {
    let new_filter = EnvFilter::new(level.to_string());

    LOG_HANDLES
        .console_handle
        .lock()
        .set_filter(new_filter)
        .with_context(|| format!("Failed to modify log filter to level: {level}"))
}

pub fn toggle_file_logging(enable: bool) -> miette::Result<()> {
    let new_filter = if enable {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    if enable && let Some(path) = &LOG_HANDLES.log_file {
        debug!("Logging to {}", path.display());
    }

    LOG_HANDLES
        .file_handle
        .lock()
        .set_filter(new_filter)
        .context("Failed to modify log filter")
}

/// Initialize tracing and backtrace
pub fn init() {
    LazyLock::force(&LOG_HANDLES);
    #[cfg(feature = "parallel")]
    {
        debug!("Parallel rollouts enabled");
    }
    #[cfg(not(feature = "parallel"))]
    {
        debug!("Parallel rollouts disabled, running playouts sequentially");
    }
}
