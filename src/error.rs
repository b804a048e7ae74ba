use crate::assistant::AssistantError;
use thiserror::Error;

/// Recoverable failures reported by workspace operations. A failing operation
/// leaves every piece of workspace state as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkspaceError {
    #[error("a saved state named {0:?} already exists or the name is blank")]
    NameConflict(String),
    #[error("no saved state named {0:?}")]
    NotFound(String),
    #[error("index {index} is out of range for {len} saved states")]
    OutOfRange { index: usize, len: usize },
    #[error("no saved state is selected")]
    NoSelection,
    #[error("a response is still being generated")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error("failed to persist saved states: {0}")]
    Persistence(String),
}

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
