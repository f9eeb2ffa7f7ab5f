use std::fmt::{
    Display,
    Formatter,
};

use bytes::{
    Buf,
    BufMut,
};
use packed_struct::prelude::*;

use crate::{
    CommandId,
    Error,
};

pub const HEADER_LEN: usize = 3;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PrimitiveEnum_u8, derive_more::Display, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum ResponseCode {
    Success = 0x01,
    Error   = 0x7f,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PackedStruct, serde::Serialize, serde::Deserialize)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "3")]
pub struct ResponseHeader {
    #[packed_field(size_bytes = "1", ty = "enum")]
    pub command:  CommandId,
    #[packed_field(size_bytes = "1", ty = "enum")]
    pub code:     ResponseCode,
    pub data_len: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResponseData {
    None,
    RtcSync { board_unix_time: u32 },
    VerifyCrc { crc: u32 },
    I2cProbe { addresses: Vec<u8> },
    Arm { data: u32, id: u32 },
    Execute { data: u32, id: u32 },
}

/// Reply to one command, carried at the front of a downlinked information field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CommandResponse {
    pub header: ResponseHeader,
    pub data:   ResponseData,
}

fn need(data: &[u8], needed: usize) -> Result<(), Error> {
    if data.len() < needed {
        return Err(Error::Truncated {
            needed,
            have: data.len(),
        });
    }

    Ok(())
}

impl CommandResponse {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.header.code == ResponseCode::Success
    }

    pub fn unpack(src: &[u8]) -> Result<Self, Error> {
        need(src, HEADER_LEN)?;

        if CommandId::from_primitive(src[0]).is_none() {
            return Err(Error::UnsupportedCommand(src[0]));
        }

        let header = ResponseHeader::unpack(&[src[0], src[1], src[2]])
            .map_err(|_| Error::InvalidResponseCode(src[1]))?;

        let mut data = &src[HEADER_LEN..];
        need(data, header.data_len as usize)?;
        data = &data[..header.data_len as usize];

        let data = match header.command {
            CommandId::RtcSync => {
                need(data, 4)?;
                ResponseData::RtcSync {
                    board_unix_time: data.get_u32_le(),
                }
            },
            CommandId::VerifyCrc => {
                need(data, 4)?;
                ResponseData::VerifyCrc {
                    crc: data.get_u32_le(),
                }
            },
            CommandId::I2cProbe => ResponseData::I2cProbe {
                addresses: data.to_vec(),
            },
            CommandId::Arm => {
                need(data, 8)?;
                ResponseData::Arm {
                    data: data.get_u32_le(),
                    id:   data.get_u32_le(),
                }
            },
            CommandId::Execute => {
                need(data, 8)?;
                ResponseData::Execute {
                    data: data.get_u32_le(),
                    id:   data.get_u32_le(),
                }
            },
            _ => ResponseData::None,
        };

        Ok(Self {
            header,
            data,
        })
    }

    /// Encode as the spacecraft would. `data_len` is derived from `data`.
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut body = vec![];

        match &self.data {
            ResponseData::None => {},
            ResponseData::RtcSync {
                board_unix_time: v,
            }
            | ResponseData::VerifyCrc {
                crc: v,
            } => body.put_u32_le(*v),
            ResponseData::I2cProbe {
                addresses,
            } => body.put_slice(addresses),
            ResponseData::Arm {
                data,
                id,
            }
            | ResponseData::Execute {
                data,
                id,
            } => {
                body.put_u32_le(*data);
                body.put_u32_le(*id);
            },
        }

        let header = ResponseHeader {
            data_len: u8::try_from(body.len()).map_err(|_| Error::PayloadTooLarge(body.len()))?,
            ..self.header
        };

        let mut out = header.pack().map_err(|_| Error::InvalidResponseCode(0))?.to_vec();
        out.extend_from_slice(&body);

        Ok(out)
    }
}

impl Display for CommandResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.is_success() { "success" } else { "error" };
        write!(f, "{}: {}", self.header.command.name(), outcome)?;

        match &self.data {
            ResponseData::None => Ok(()),
            ResponseData::RtcSync {
                board_unix_time,
            } => write!(f, " (board time {})", board_unix_time),
            ResponseData::VerifyCrc {
                crc,
            } => write!(f, " (app crc {:#010x})", crc),
            ResponseData::I2cProbe {
                addresses,
            } => write!(f, " (devices {})", hex::encode(addresses)),
            ResponseData::Arm {
                data,
                id,
            }
            | ResponseData::Execute {
                data,
                id,
            } => write!(f, " (data {}, id {})", data, id),
        }
    }
}
