use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while locating support files or launching the IOC process.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("dbd path could not be discovered: EPICS_BASE is unset and no softIoc binary was found on PATH")]
    DbdPathNotFound,
    #[error("dbd file does not exist: {0}")]
    MissingDbdFile(PathBuf),
    #[error("failed to spawn soft IOC: {0}")]
    IocStart(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    pub(crate) fn ioc_start(err: impl Into<String>) -> Self {
        HarnessError::IocStart(err.into())
    }
}
