use crate::{
    AddressSide,
    CommandId,
    FrameKind,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid station callsign {0:?}")]
    InvalidCallsign(String),

    #[error("invalid {0} address")]
    InvalidAddress(AddressSide),

    #[error("unknown control byte {0:#04x}")]
    InvalidControl(u8),

    #[error("frame too short ({0} bytes)")]
    FrameTooShort(usize),

    #[error("frame check sequence mismatch (received {received}, computed {computed})")]
    ChecksumMismatch { received: String, computed: String },

    #[error("information field too large ({0} bytes)")]
    PayloadTooLarge(usize),

    #[error("{0} frames carry no information field")]
    UnexpectedPayload(FrameKind),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("unsupported command id {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("invalid response code {0:#04x}")]
    InvalidResponseCode(u8),

    #[error("command {id} encodes to {len} bytes")]
    OversizedCommand { id: CommandId, len: usize },

    #[error("payload does not match command {0}")]
    PayloadMismatch(CommandId),

    #[error("truncated record: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("packing command {index}: {source}")]
    Batch {
        index:  usize,
        #[source]
        source: Box<Error>,
    },
}
