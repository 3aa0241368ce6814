use async_trait::async_trait;
use thiserror::Error;

use crate::pos_types::TagIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagReadError {
    #[error("No tag was presented")]
    NoTag,
    #[error("The tag could not be authenticated. {0}")]
    Authentication(String),
    #[error("The tag reader failed. {0}")]
    Reader(String),
}

/// The NFC reader. Scanning and authenticating the tag is the reader's business; the workflow only needs the identity.
#[async_trait]
pub trait TagReader: Send + Sync {
    async fn scan(&self) -> Result<TagIdentity, TagReadError>;
}
