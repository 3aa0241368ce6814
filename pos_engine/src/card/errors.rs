use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardSdkError {
    #[error("The card activity could not be started. {0}")]
    LaunchFailed(String),
    #[error("The card reader is busy with another activity")]
    Busy,
    #[error("The card reader is not available. {0}")]
    Unavailable(String),
}
