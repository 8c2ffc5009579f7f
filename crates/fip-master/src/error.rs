use std::fmt;

use fip_transport::TransportError;

/// Failures surfaced by the master dialogue engine (`spec.md` §7, taxonomy:
/// Master).
#[derive(Debug)]
pub enum MasterError {
    /// `tokio::process::Command::spawn` failed for a configured module.
    SpawnFailed { module: String, source: std::io::Error },
    /// A child's stdin/stdout/stderr handle was missing after spawn —
    /// unreachable in practice since every handle is requested as piped,
    /// but the `Option`s from `tokio::process::Child` must be handled.
    MissingPipe { module: String },
    /// A round-trip with a child exceeded its deadline.
    Timeout { module: String },
    /// A child's transport broke (short read, I/O error) mid-round.
    Transport { module: String, source: TransportError },
    /// A child responded with `Message::Unknown` or a message kind not
    /// valid for the round in progress.
    Faulty { module: String, detail: String },
    /// `ConnectRequest.version` did not match the master's own version.
    VersionMismatch { module: String },
}

impl fmt::Display for MasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { module, source } => {
                write!(f, "failed to spawn module '{module}': {source}")
            }
            Self::MissingPipe { module } => {
                write!(f, "module '{module}' is missing an expected stdio pipe")
            }
            Self::Timeout { module } => write!(f, "module '{module}' timed out"),
            Self::Transport { module, source } => {
                write!(f, "transport error with module '{module}': {source}")
            }
            Self::Faulty { module, detail } => {
                write!(f, "module '{module}' behaved unexpectedly: {detail}")
            }
            Self::VersionMismatch { module } => {
                write!(f, "module '{module}' reported an incompatible protocol version")
            }
        }
    }
}

impl std::error::Error for MasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SpawnFailed { source, .. } => Some(source),
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
