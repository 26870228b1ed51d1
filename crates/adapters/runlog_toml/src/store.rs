//! TOML run-log store.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rexlab_app::ports::RunLogStore;
use rexlab_domain::error::LabError;
use rexlab_domain::experiment::sanitize_filename;
use rexlab_domain::run_log::RunLog;
use rexlab_domain::time::{file_stamp, log_stamp};

use crate::error::RunLogError;

/// File-name stem used when the run has no experiment info.
const FALLBACK_STEM: &str = "experiment";

fn io_error(path: &Path, source: std::io::Error) -> RunLogError {
    RunLogError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes each run log to its own file in `output_dir`.
#[derive(Debug, Clone)]
pub struct TomlRunLogStore {
    output_dir: PathBuf,
}

impl TomlRunLogStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<experiment name>_<DD_MM_YYYY_HH_MM_SS_mmm>.toml` inside the output directory.
    #[must_use]
    pub fn path_for(&self, log: &RunLog) -> PathBuf {
        let stem = log
            .experiment_name()
            .map_or_else(|| FALLBACK_STEM.to_string(), sanitize_filename);
        self.output_dir.join(format!(
            "{stem}_{}.toml",
            file_stamp(log.experiment.start_time)
        ))
    }

    async fn write(&self, log: &RunLog) -> Result<PathBuf, RunLogError> {
        let text = render(log)?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| io_error(&self.output_dir, source))?;
        let path = self.path_for(log);
        tokio::fs::write(&path, text)
            .await
            .map_err(|source| io_error(&path, source))?;
        Ok(path)
    }
}

impl RunLogStore for TomlRunLogStore {
    #[tracing::instrument(skip(self, log), fields(run_id = %log.experiment.run_id))]
    async fn persist(&self, log: &RunLog) -> Result<String, LabError> {
        let path = self.write(log).await?;
        tracing::debug!(path = %path.display(), "run log written");
        Ok(path.display().to_string())
    }
}

/// Render the artifact text for `log`.
///
/// # Errors
///
/// Returns [`RunLogError::Serialize`] if a value cannot be expressed in TOML.
pub fn render(log: &RunLog) -> Result<String, RunLogError> {
    let body = toml::to_string(log)?;
    let mut out = format!(
        "# Experiment started at {}\n\n{body}",
        log_stamp(log.experiment.start_time)
    );
    for (name, device) in &log.devices {
        // comments end at a newline and reject control characters
        let _ = writeln!(out, "\n# {}", name.escape_debug());
        for row in device.data.render_table().lines() {
            let _ = writeln!(out, "#   {row}");
        }
    }
    let _ = writeln!(
        out,
        "\n# Experiment ended at {}",
        log_stamp(log.experiment.end_time)
    );
    Ok(out)
}

/// Read a run log written by [`TomlRunLogStore`].
///
/// # Errors
///
/// Returns [`RunLogError::Io`] if the file cannot be read and
/// [`RunLogError::Parse`] if it is not a run log.
pub async fn load(path: &Path) -> Result<RunLog, RunLogError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| io_error(path, source))?;
    Ok(toml::from_str(&text)?)
}
