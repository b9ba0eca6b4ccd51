use thiserror::Error;

use crate::editor::UploadError;
use crate::history::SerializationError;
use crate::loader::ImageLoadError;
use crate::render::RenderError;
use crate::storage::StorageError;
use crate::template::TemplateError;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Every recoverable failure the engine reports to its host.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    ImageLoad(#[from] ImageLoadError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl EngineError {
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::QuotaExceeded { .. })
        )
    }
}
