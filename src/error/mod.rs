use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open transactions file {}: {source}", .path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read CSV rows: {0}")]
    CsvError(#[from] csv::Error),
    #[error("transactions file has no {0:?} column")]
    MissingColumn(&'static str),
    #[error("could not render {}: {reason}", .target.display())]
    Render { target: PathBuf, reason: String },
    #[error(transparent)]
    BusinessError(#[from] crate::domain::error::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
