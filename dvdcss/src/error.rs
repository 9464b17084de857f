//! Error types for sessions, sector I/O and key acquisition.

use thiserror::Error;

/// Errors that can occur while opening, seeking, reading or cracking a disc.
#[derive(Debug, Error)]
pub enum Error {
    /// The target path does not exist.
    #[error("target not found: {0}")]
    NotFound(String),

    /// The target exists but cannot be opened by this process.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The target is neither a device, a disc image nor a VIDEO_TS tree.
    #[error("not a dvd target: {0}")]
    NotADisc(String),

    /// A session is already open in this handle.
    #[error("a dvd is already opened, close it before opening another")]
    AlreadyOpen,

    /// The operation requires an open session.
    #[error("no dvd device or directory is open yet, use open() first")]
    NoSession,

    /// Device level seek or read failure.
    #[error("device failure: {0}")]
    DeviceFailure(String),

    /// The device returned fewer blocks than requested.
    #[error("short read: expected {expected} blocks, got {actual} blocks")]
    ShortRead { expected: u32, actual: u32 },

    /// Not enough scrambled data was found to guess a title key.
    #[error("insufficient data to recover the title key at block {0}")]
    InsufficientData(u32),

    /// The drive could not report whether authentication succeeded.
    #[error("drive authentication is unavailable: {0}")]
    AuthenticationUnavailable(String),

    /// Invalid argument such as a zero block count.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A long running key search was cancelled or timed out.
    #[error("key search cancelled: {0}")]
    Cancelled(String),

    /// I/O error outside of sector reads (cache, layout discovery).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps an [`std::io::Error`] raised while opening `target` onto the
    /// open-time taxonomy.
    pub(crate) fn from_open(target: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(target.to_owned()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(target.to_owned()),
            _ => Self::DeviceFailure(format!("{}: {}", target, error)),
        }
    }

    /// Returns true for errors caused by the device itself.
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            Self::DeviceFailure(_) | Self::ShortRead { .. } | Self::Io(_)
        )
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(e) => e,
            Error::NotFound(_) => Self::new(std::io::ErrorKind::NotFound, error),
            Error::PermissionDenied(_) => Self::new(std::io::ErrorKind::PermissionDenied, error),
            Error::InvalidArgument(_) => Self::new(std::io::ErrorKind::InvalidInput, error),
            Error::ShortRead { .. } => Self::new(std::io::ErrorKind::UnexpectedEof, error),
            e => Self::other(e),
        }
    }
}
