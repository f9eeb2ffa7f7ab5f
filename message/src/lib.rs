pub mod address;
pub mod batch;
pub mod checksum;
pub mod command;
pub mod control;
pub mod crc;
mod error;
pub mod frame;
pub mod response;

pub use address::{
    Address,
    AddressSide,
};
pub use batch::{
    pack_commands,
    Block,
};
pub use checksum::Checksum;
pub use command::{
    CommandId,
    CommandMessage,
    CommandPayload,
    ProgrammingSession,
};
pub use control::{
    ControlField,
    FrameKind,
};
pub use error::Error;
pub use frame::{
    Frame,
    FrameCodec,
};
pub use response::{
    CommandResponse,
    ResponseCode,
    ResponseData,
};

/// Reed-Solomon RS(255, 223): payload bytes per codeword.
pub const RS_DECODED_SIZE: usize = 223;
/// Reed-Solomon RS(255, 223): codeword length.
pub const RS_ENCODED_SIZE: usize = 255;

pub const GROUND_STATION_CALLSIGN: &str = "ATLAS";
pub const CUBESAT_CALLSIGN: &str = "AKITO";

impl_checksum!(pub Fcs, u16, ::crc::CRC_16_XMODEM, reflected);
