use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{event, Level};

/// Writes one file per unexpected error into the crash report directory.
#[derive(Debug, Clone)]
pub struct CrashReporter {
    dir: PathBuf,
}

impl CrashReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Error creating crash report directory {}", dir.display()))?;

        Ok(Self { dir })
    }

    /// Save `error` with a short description of what was going on. Existing reports are never
    /// overwritten, a numbered suffix is added instead.
    pub async fn save_error(&self, error: &anyhow::Error, context: &str) -> Result<PathBuf> {
        let what = report_name(context);
        let report = format!(
            "Timestamp: {}\nError: {}\nContext: {}\n\nError Details:\n{:?}\n",
            Utc::now().to_rfc3339(),
            error,
            context,
            error
        );

        let mut attempt: u64 = 0;
        loop {
            let file_name = match attempt {
                0 => format!("crash_log_{}.log", what),
                n => format!("crash_log_{}_{:02}.log", what, n),
            };
            let path = self.dir.join(file_name);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path).await;

            match file {
                Ok(mut file) => {
                    file.write_all(report.as_bytes()).await
                        .with_context(|| format!("Error writing crash report {}", path.display()))?;
                    file.flush().await?;

                    event!(Level::INFO, "Crash report saved to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e).with_context(|| format!("Error creating crash report {}", path.display())),
            }
        }
    }
}

fn report_name(context: &str) -> String {
    let name: String = context.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    if name.is_empty() {
        "error".to_string()
    } else {
        name
    }
}
