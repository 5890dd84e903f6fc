/// The closed sum of failures the channel core can report. Mirrors the kind
/// taxonomy of the original `-E*` mapping without raising an actual `errno`
/// itself — that translation is the adapter's job, not this crate's.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorKind {
    #[error("another daemon is already attached to the channel")]
    Busy,

    #[error("channel disconnected")]
    IoError,

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("call was interrupted")]
    Interrupted,

    #[error("buffer pool exhausted")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("protocol error: {0}")]
    ProtocolError(&'static str),

    #[error("invalid user-space address")]
    Fault,

    #[error("stale handle")]
    Stale,
}

impl ErrorKind {
    /// The `-E*` mnemonic an adapter layer would surface this as. The core
    /// never raises the errno itself; this exists so callers above it don't
    /// have to duplicate the mapping table.
    pub fn errno_name(&self) -> &'static str {
        match self {
            ErrorKind::Busy => "EIO",
            ErrorKind::IoError => "EIO",
            ErrorKind::Timeout => "ESTALE",
            ErrorKind::Interrupted => "EINTR",
            ErrorKind::OutOfMemory => "ENOMEM",
            ErrorKind::InvalidArgument(_) => "EINVAL",
            ErrorKind::ProtocolError(_) => "EPROTO",
            ErrorKind::Fault => "EFAULT",
            ErrorKind::Stale => "ESTALE",
        }
    }

    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ErrorKind::IoError)
    }
}

pub type Result<T> = std::result::Result<T, ErrorKind>;
