use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "route_features=debug,info";

/// Stdout logging, plus a plain-text copy under `log_dir` when given.
/// Returns the log file path, if any.
pub fn init(log_dir: Option<&Path>) -> std::io::Result<Option<PathBuf>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            let path = log_file_path(dir, chrono::Local::now());
            fs::create_dir_all(dir)?;
            let file = File::create(&path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed();
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(log_path)
}

fn log_file_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("route_pipeline_{}.log", now.format("%Y%m%d_%H%M%S")))
}
