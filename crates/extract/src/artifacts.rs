use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Stage artifacts are JSON files under `<outputs>/<provider>/`, named
/// `<letter>-<purpose>.json` with a sibling `...-report.txt`.
///
/// The canonical shape is the metadata envelope; legacy artifacts are a
/// bare array and readers accept both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub metadata: ArtifactMetadata,
    pub models: Vec<T>,
}

/// Envelope metadata. Every field is lenient on read: legacy artifacts
/// vary in which of these they carry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// ISO-8601 with the IST (+05:30) offset.
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub total_models: usize,
    #[serde(default)]
    pub pipeline_stage: String,
}

/// Current timestamp rendered with the IST offset.
pub fn ist_timestamp() -> String {
    let ist = FixedOffset::east_opt(5 * 3600 + 1800).expect("IST offset");
    Utc::now().with_timezone(&ist).to_rfc3339()
}

/// Write a stage artifact in the envelope shape.
pub fn write_artifact<T: Serialize>(
    path: &Path,
    stage: &str,
    models: &[T],
) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ArtifactError::Io {
            path: parent.to_path_buf(),
            detail: e.to_string(),
        })?;
    }

    let envelope = serde_json::json!({
        "metadata": {
            "generated_at": ist_timestamp(),
            "total_models": models.len(),
            "pipeline_stage": stage,
        },
        "models": models,
    });

    let body = serde_json::to_string_pretty(&envelope)
        .map_err(|e| ArtifactError::Encode(e.to_string()))?;
    std::fs::write(path, body).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    tracing::info!(path = %path.display(), stage = stage, models = models.len(), "Artifact written");
    Ok(())
}

/// Read a stage artifact, accepting both the envelope and the legacy
/// bare-array shape.
pub fn read_models<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ArtifactError> {
    let body = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| ArtifactError::Decode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let decode_error = |detail: String| ArtifactError::Decode {
        path: path.to_path_buf(),
        detail,
    };

    match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| decode_error(e.to_string()))
        }
        serde_json::Value::Object(ref map) => {
            if !map.contains_key("models") {
                return Err(decode_error(
                    "object artifact without a \"models\" field".to_string(),
                ));
            }
            let envelope: Envelope<T> =
                serde_json::from_value(value).map_err(|e| decode_error(e.to_string()))?;
            Ok(envelope.models)
        }
        _ => Err(decode_error(
            "artifact is neither an array nor an envelope object".to_string(),
        )),
    }
}

/// Number of models recorded in an existing artifact, if readable.
pub fn existing_model_count(path: &Path) -> Option<usize> {
    let models: Vec<serde_json::Value> = read_models(path).ok()?;
    Some(models.len())
}

/// Write a stage's human-readable report. Reports exist for every stage
/// that ran, even failed ones.
pub fn write_report(path: &Path, contents: &str) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ArtifactError::Io {
            path: parent.to_path_buf(),
            detail: e.to_string(),
        })?;
    }
    std::fs::write(path, contents).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact IO error at {path}: {detail}")]
    Io { path: PathBuf, detail: String },

    #[error("Artifact encode error: {0}")]
    Encode(String),

    #[error("Artifact decode error at {path}: {detail}")]
    Decode { path: PathBuf, detail: String },
}
