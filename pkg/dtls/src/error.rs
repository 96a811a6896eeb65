use crate::alert::AlertDescription;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the handshake core.
///
/// A `Fatal` error carries the alert which the driver must deliver to the
/// peer before tearing the association down. Everything else is for the
/// driver's own bookkeeping and produces no outbound alert.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handshake cannot continue and the peer must be told why.
    #[error("fatal alert {description:?}: {reason}")]
    Fatal {
        description: AlertDescription,
        reason: &'static str,
    },

    /// The peer sent us a fatal alert of its own.
    #[error("peer sent fatal alert {0:?}")]
    PeerAlert(AlertDescription),

    /// The peer closed the association with close_notify.
    #[error("peer sent close_notify")]
    PeerClosed,

    /// A message could not be decoded. Only used below the record
    /// dispatcher; the state machine maps it to either a silent drop or a
    /// fatal alert depending on where it happened.
    #[error("malformed message: {0}")]
    Decode(&'static str),

    /// Local fault (missing algorithm, state corruption). Not attributable
    /// to the peer and not distinguished to it.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    pub fn fatal(description: AlertDescription, reason: &'static str) -> Self {
        Error::Fatal {
            description,
            reason,
        }
    }

    /// The alert to put on the wire for this error, if any.
    pub fn to_alert(&self) -> Option<AlertDescription> {
        match self {
            Error::Fatal { description, .. } => Some(*description),
            _ => None,
        }
    }
}
