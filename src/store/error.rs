use thiserror::Error;

/// Failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("s3: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("ftp: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{op} {path}: unexpected status {status}")]
    Status {
        op: &'static str,
        path: String,
        status: u16,
    },

    #[error("{0}: not found")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}
