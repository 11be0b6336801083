//! Document load/save by file extension

use std::path::Path;

use anyhow::{Context, Result};
use tradecfg_model::ConfigDocument;

/// On-disk document encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json` and anything unrecognised
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a path's extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Read a JSON or YAML document
///
/// # Errors
/// Returns error if the file cannot be read or is not a valid document
pub fn load_document(path: impl AsRef<Path>) -> Result<ConfigDocument> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = match DocumentFormat::from_path(path) {
        DocumentFormat::Yaml => ConfigDocument::from_yaml(&text),
        DocumentFormat::Json => ConfigDocument::from_json(&text),
    }
    .with_context(|| format!("invalid document {}", path.display()))?;
    Ok(document)
}

/// Write a document in the format its extension names
///
/// # Errors
/// Returns error if serialisation or the write fails
pub fn save_document(document: &ConfigDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = match DocumentFormat::from_path(path) {
        DocumentFormat::Yaml => document.to_yaml()?,
        DocumentFormat::Json => document.to_json()?,
    };
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "document saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.YAML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("config")), DocumentFormat::Json);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_document("/nonexistent/tradecfg.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tradecfg.json"));
    }
}
