// SPDX-License-Identifier: Apache-2.0
//! Error types for verbs device discovery and queries.

use std::fmt;
use std::io;

/// What a failed attribute query was asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    /// `ibv_query_device`.
    Device,
    /// `ibv_query_port` on the given 1-based port number.
    Port(u8),
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTarget::Device => f.write_str("device attribute"),
            QueryTarget::Port(port) => write!(f, "port {port} attribute"),
        }
    }
}

/// Errors arising from verbs device operations.
///
/// Lookups that find nothing return `None` rather than an error; the only
/// "not found" error is [`VerbsError::NotFound`], raised when a held
/// [`Device`](crate::Device) can no longer be re-resolved.
#[derive(Debug, thiserror::Error)]
pub enum VerbsError {
    #[error("failed to load verbs library '{path}': {cause}")]
    LoadFailed { path: String, cause: String },

    #[error("symbol '{symbol}' not found in verbs library: {cause}")]
    SymbolNotFound { symbol: String, cause: String },

    #[error("device enumeration unavailable: {source}")]
    ResourceUnavailable { source: io::Error },

    #[error("no device with kernel index {kernel_index}")]
    NotFound { kernel_index: i32 },

    #[error("failed to open device '{device}': {source}")]
    OpenFailed { device: String, source: io::Error },

    #[error("{target} query failed on '{device}': {source}")]
    QueryFailed {
        device: String,
        target: QueryTarget,
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VerbsError {
    /// Whether this error means verbs are not usable on this host at all
    /// (no library, or the kernel refused enumeration).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            VerbsError::LoadFailed { .. }
                | VerbsError::SymbolNotFound { .. }
                | VerbsError::ResourceUnavailable { .. }
        )
    }

    /// The OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            VerbsError::ResourceUnavailable { source }
            | VerbsError::OpenFailed { source, .. }
            | VerbsError::QueryFailed { source, .. }
            | VerbsError::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerbsError>;

/// Convert a verbs return code into an `io::Result`.
///
/// Query entry points return `0` on success and a positive errno on failure;
/// some providers return `-1` and set `errno` instead.
pub(crate) fn check_ret(ret: i32) -> io::Result<()> {
    match ret {
        0 => Ok(()),
        r if r > 0 => Err(io::Error::from_raw_os_error(r)),
        _ => Err(io::Error::last_os_error()),
    }
}
