use message::{
    AddressSide,
    FrameKind,
};

use crate::state_machine::{
    Event,
    State,
};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serial(#[from] tokio_serial::Error),

    #[error("transport is held by another operation")]
    Unavailable,
}

/// Caller-visible link errors. None of these are retried inside the link layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid {0} address")]
    InvalidAddress(AddressSide),

    #[error("frame check sequence mismatch (received {received}, computed {computed})")]
    ChecksumMismatch { received: String, computed: String },

    #[error("no flag-delimited frame in {read} bytes read")]
    NoFrameReceived { read: usize },

    #[error("reed-solomon block uncorrectable")]
    FecUncorrectable,

    #[error("unsupported command id {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid state transition: {event} in state {state}")]
    InvalidStateTransition { state: State, event: Event },

    #[error("link not ready for this operation (state {0})")]
    NotReady(State),

    #[error("expected {expected} frame, received {received}")]
    UnexpectedFrame { expected: FrameKind, received: FrameKind },

    #[error("log poller task failed: {0}")]
    Poller(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Message(message::Error),

    #[error(transparent)]
    Codec(codec::Error),
}

impl Error {
    /// Errors a caller may reasonably answer by trying the exchange again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NoFrameReceived { .. }
                | Error::ChecksumMismatch { .. }
                | Error::FecUncorrectable
                | Error::UnexpectedFrame { .. }
                | Error::Transport(TransportError::Io(_))
        )
    }
}

impl From<message::Error> for Error {
    fn from(e: message::Error) -> Self {
        match e {
            message::Error::InvalidAddress(side) => Error::InvalidAddress(side),
            message::Error::ChecksumMismatch {
                received,
                computed,
            } => Error::ChecksumMismatch {
                received,
                computed,
            },
            message::Error::UnsupportedCommand(id) => Error::UnsupportedCommand(id),
            e => Error::Message(e),
        }
    }
}

impl From<codec::Error> for Error {
    fn from(e: codec::Error) -> Self {
        match e {
            codec::Error::FecUncorrectable => Error::FecUncorrectable,
            codec::Error::Message(e) => e.into(),
            e => Error::Codec(e),
        }
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.into())
    }
}
