use thiserror::Error;

#[derive(Error, Debug)]
pub enum MfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file system image not found: {0}")]
    ImageNotFound(String),

    #[error("file system image is already open")]
    AlreadyOpen,

    #[error("file system not open")]
    NotOpen,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("entry is not a directory: {0}")]
    NotADirectory(String),
}
