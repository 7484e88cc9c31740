use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while opening or reading an alignment stream.
///
/// End of stream is not an error; it is reported through the return value of
/// [`BamParser::parse`](crate::BamParser::parse).
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to open file {}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to read header from {}", path.display())]
    HeaderParseFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to allocate alignment buffers ({capacity} bytes)")]
    AllocationFailed {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("unable to read alignment record from {}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::OpenFailed { path, .. }
            | Error::HeaderParseFailed { path, .. }
            | Error::ReadFailed { path, .. } => Some(path),
            Error::AllocationFailed { .. } => None,
        }
    }
}
