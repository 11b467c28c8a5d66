use thiserror::Error;

/// Errors returned by the peer directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("no known peers")]
    EmptyDirectory,
}
