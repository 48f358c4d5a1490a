#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed segment header: {0} bytes, need at least 12")]
    MalformedHeader(usize),

    #[error("malformed JSON payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("filesystem error at {path}: {source}")]
    FilesystemError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}
