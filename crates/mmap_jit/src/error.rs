use errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MappingError>;

/// Any error thrown while mapping memory.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    #[error("could not map {len} bytes: {errno}")]
    Map { len: usize, errno: Errno },
    #[error("could not change protection of {len} bytes: {errno}")]
    Protect { len: usize, errno: Errno },
}

impl MappingError {
    /// The `errno` reported by the failing system call.
    pub fn errno(&self) -> Errno {
        match self {
            MappingError::Map { errno, .. } | MappingError::Protect { errno, .. } => *errno,
        }
    }
}
