use std::fmt;

use fip_transport::TransportError;

/// Failures that can end a [`crate::run`] loop before a clean `Kill`.
#[derive(Debug)]
pub enum SlaveError {
    Transport(TransportError),
    /// The master closed its end of the pipe without sending `Kill`.
    MasterHungUp,
}

impl fmt::Display for SlaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::MasterHungUp => write!(f, "master closed the connection without sending Kill"),
        }
    }
}

impl std::error::Error for SlaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::MasterHungUp => None,
        }
    }
}

impl From<TransportError> for SlaveError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
