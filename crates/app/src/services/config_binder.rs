//! Config binder — load the experiment document and bind a device section.

use std::path::Path;

use rexlab_domain::config::{BoundConfig, ConfigDocument};
use rexlab_domain::error::ConfigError;

/// Read and parse the configuration document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid TOML.
pub async fn load_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
    ConfigDocument::from_toml_str(&text)
}

/// Bind `device_name` to the document at `path`.
///
/// An absent device section is not an error: the result is empty and a
/// warning is logged.
///
/// # Errors
///
/// Same as [`load_document`].
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub async fn bind_config(path: &Path, device_name: &str) -> Result<BoundConfig, ConfigError> {
    let document = load_document(path).await?;
    let bound = document.bind(device_name);
    if bound.is_empty() {
        tracing::warn!("no configuration section for device");
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const DOCUMENT: &str = r#"
[experiment.info]
name = "Ada"
email = "ada@example.org"
experiment_name = "dark counts"
experiment_description = "baseline"

[device.DAQ1]
gate_time = 2
averages = 3
"#;

    fn document_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn should_bind_device_section_from_file() {
        let file = document_file(DOCUMENT);
        let bound = bind_config(file.path(), "DAQ1").await.unwrap();
        assert_eq!(bound.device_name(), "DAQ1");
        assert_eq!(bound.require_as::<i64>("averages").unwrap(), 3);
    }

    #[tokio::test]
    async fn should_bind_empty_config_for_unknown_device() {
        let file = document_file(DOCUMENT);
        let bound = bind_config(file.path(), "missing").await.unwrap();
        assert!(bound.is_empty());
    }

    #[tokio::test]
    async fn should_report_io_error_for_missing_file() {
        let err = load_document(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn should_report_parse_error_for_invalid_toml() {
        let file = document_file("[device\nbroken");
        let err = load_document(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn should_expose_experiment_info() {
        let file = document_file(DOCUMENT);
        let document = load_document(file.path()).await.unwrap();
        let info = document.experiment_info().unwrap().unwrap();
        assert_eq!(info.experiment_name, "dark counts");
    }
}
