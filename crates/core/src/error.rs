use thiserror::Error;

use crate::model::{ParsePathError, SchemaError};
use crate::progress::TreeError;

/// Umbrella error for callers that do not care which core check failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Path(#[from] ParsePathError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}
