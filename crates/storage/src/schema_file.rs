use std::path::Path;

use progress_core::model::{Course, CourseDraft, SchemaError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaLoadError {
    #[error("cannot read course schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed course schema: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] SchemaError),
}

/// Parse and validate a course schema document.
///
/// # Errors
///
/// Returns `SchemaLoadError::Decode` for malformed JSON and
/// `SchemaLoadError::Invalid` if the outline fails validation.
pub fn parse_course(json: &str) -> Result<Course, SchemaLoadError> {
    let draft: CourseDraft = serde_json::from_str(json)?;
    Ok(draft.validate()?)
}

/// Load the bundled course schema from disk.
///
/// # Errors
///
/// Returns `SchemaLoadError::Io` if the file cannot be read, otherwise the
/// errors of [`parse_course`].
pub async fn load_course(path: impl AsRef<Path>) -> Result<Course, SchemaLoadError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SchemaLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let course = parse_course(&json)?;
    info!(
        title = course.title(),
        version = course.version(),
        units = course.units().len(),
        "loaded course outline"
    );
    Ok(course)
}
