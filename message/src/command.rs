use std::{
    fmt::{
        Display,
        Formatter,
    },
    str::FromStr,
};

use bytes::{
    Buf,
    BufMut,
};
use packed_struct::prelude::*;

use crate::Error;

/// Upper bound on one encoded command record.
pub const MAX_COMMAND_SIZE: usize = 16;

const TIME_TAGGED: u8 = 0x80;
const ID_MASK: u8 = 0x7f;

/// id byte and timestamp
const RECORD_HEADER_LEN: usize = 5;

pub type Packed = Vec<u8>;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    PrimitiveEnum_u8,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum CommandId {
    EndOfFrame            = 0,
    ExecObcReset          = 1,
    RtcSync               = 2,
    DownlinkLogsNextPass  = 3,
    MicroSdFormat         = 4,
    Ping                  = 5,
    DownlinkTelem         = 6,
    UplinkDisc            = 7,
    SetProgrammingSession = 8,
    EraseApp              = 9,
    DownloadData          = 10,
    VerifyCrc             = 11,
    I2cProbe              = 12,
    Arm                   = 13,
    Execute               = 14,
}

impl CommandId {
    pub const ALL: [CommandId; 15] = [
        CommandId::EndOfFrame,
        CommandId::ExecObcReset,
        CommandId::RtcSync,
        CommandId::DownlinkLogsNextPass,
        CommandId::MicroSdFormat,
        CommandId::Ping,
        CommandId::DownlinkTelem,
        CommandId::UplinkDisc,
        CommandId::SetProgrammingSession,
        CommandId::EraseApp,
        CommandId::DownloadData,
        CommandId::VerifyCrc,
        CommandId::I2cProbe,
        CommandId::Arm,
        CommandId::Execute,
    ];

    /// Kebab-case name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::EndOfFrame => "end-of-frame",
            CommandId::ExecObcReset => "exec-obc-reset",
            CommandId::RtcSync => "rtc-sync",
            CommandId::DownlinkLogsNextPass => "downlink-logs-next-pass",
            CommandId::MicroSdFormat => "micro-sd-format",
            CommandId::Ping => "ping",
            CommandId::DownlinkTelem => "downlink-telem",
            CommandId::UplinkDisc => "uplink-disc",
            CommandId::SetProgrammingSession => "set-programming-session",
            CommandId::EraseApp => "erase-app",
            CommandId::DownloadData => "download-data",
            CommandId::VerifyCrc => "verify-crc",
            CommandId::I2cProbe => "i2c-probe",
            CommandId::Arm => "arm",
            CommandId::Execute => "execute",
        }
    }

    /// The end-of-frame id is the block terminator and never goes out as a record.
    #[inline]
    pub const fn is_sendable(self) -> bool {
        !matches!(self, CommandId::EndOfFrame)
    }

    /// Encoded payload length carried after the record header.
    pub const fn payload_len(self) -> usize {
        match self {
            CommandId::RtcSync => 4,
            CommandId::DownlinkLogsNextPass | CommandId::SetProgrammingSession => 1,
            CommandId::DownloadData => 7,
            CommandId::Arm | CommandId::Execute => 8,
            _ => 0,
        }
    }
}

impl FromStr for CommandId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = normalized.strip_prefix("cmd-").unwrap_or(&normalized);

        let id = match CommandId::ALL.iter().copied().find(|id| id.name() == normalized) {
            Some(id) => id,
            None => {
                let raw = normalized.parse::<u8>().map_err(|_| Error::UnknownCommand(s.to_owned()))?;
                CommandId::from_primitive(raw).ok_or(Error::UnsupportedCommand(raw))?
            },
        };

        if !id.is_sendable() {
            return Err(Error::UnsupportedCommand(id.to_primitive()));
        }

        Ok(id)
    }
}

/// Programming session an app image is written into.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PrimitiveEnum_u8, derive_more::Display, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum ProgrammingSession {
    Application = 0,
    Bootloader  = 1,
}

/// Command arguments, one variant per payload shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CommandPayload {
    None,
    RtcSync { unix_time: u32 },
    DownlinkLogsNextPass { log_level: u8 },
    SetProgrammingSession { session: ProgrammingSession },
    DownloadData { kind: u8, length: u16, address: u32 },
    Arm { arm_id: u32, timeout: u32 },
    Execute { arm_id: u32, timeout: u32 },
}

impl CommandPayload {
    fn matches(&self, id: CommandId) -> bool {
        matches!(
            (id, self),
            (CommandId::RtcSync, CommandPayload::RtcSync { .. })
                | (CommandId::DownlinkLogsNextPass, CommandPayload::DownlinkLogsNextPass { .. })
                | (CommandId::SetProgrammingSession, CommandPayload::SetProgrammingSession { .. })
                | (CommandId::DownloadData, CommandPayload::DownloadData { .. })
                | (CommandId::Arm, CommandPayload::Arm { .. })
                | (CommandId::Execute, CommandPayload::Execute { .. })
        ) || (id.payload_len() == 0 && *self == CommandPayload::None)
    }

    fn put(&self, buf: &mut impl BufMut) {
        match *self {
            CommandPayload::None => {},
            CommandPayload::RtcSync {
                unix_time,
            } => buf.put_u32_le(unix_time),
            CommandPayload::DownlinkLogsNextPass {
                log_level,
            } => buf.put_u8(log_level),
            CommandPayload::SetProgrammingSession {
                session,
            } => buf.put_u8(session.to_primitive()),
            CommandPayload::DownloadData {
                kind,
                length,
                address,
            } => {
                buf.put_u8(kind);
                buf.put_u16_le(length);
                buf.put_u32_le(address);
            },
            CommandPayload::Arm {
                arm_id,
                timeout,
            }
            | CommandPayload::Execute {
                arm_id,
                timeout,
            } => {
                buf.put_u32_le(arm_id);
                buf.put_u32_le(timeout);
            },
        }
    }

    fn get(id: CommandId, buf: &mut impl Buf) -> Result<Self, Error> {
        let payload = match id {
            CommandId::RtcSync => CommandPayload::RtcSync {
                unix_time: buf.get_u32_le(),
            },
            CommandId::DownlinkLogsNextPass => CommandPayload::DownlinkLogsNextPass {
                log_level: buf.get_u8(),
            },
            CommandId::SetProgrammingSession => {
                let raw = buf.get_u8();

                CommandPayload::SetProgrammingSession {
                    session: ProgrammingSession::from_primitive(raw)
                        .ok_or(Error::PayloadMismatch(id))?,
                }
            },
            CommandId::DownloadData => CommandPayload::DownloadData {
                kind:    buf.get_u8(),
                length:  buf.get_u16_le(),
                address: buf.get_u32_le(),
            },
            CommandId::Arm => CommandPayload::Arm {
                arm_id:  buf.get_u32_le(),
                timeout: buf.get_u32_le(),
            },
            CommandId::Execute => CommandPayload::Execute {
                arm_id:  buf.get_u32_le(),
                timeout: buf.get_u32_le(),
            },
            _ => CommandPayload::None,
        };

        Ok(payload)
    }
}

/// A single command. Immutable once built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CommandMessage {
    id:          CommandId,
    timestamp:   u32,
    time_tagged: bool,
    payload:     CommandPayload,
}

macro_rules! no_payload_commands {
    ($($fn_name:ident => $id:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $fn_name() -> Self {
                Self::immediate(CommandId::$id, CommandPayload::None)
            }
        )*
    };
}

impl CommandMessage {
    pub fn new(id: CommandId, payload: CommandPayload) -> Result<Self, Error> {
        if !id.is_sendable() {
            return Err(Error::UnsupportedCommand(id.to_primitive()));
        }

        if !payload.matches(id) {
            return Err(Error::PayloadMismatch(id));
        }

        Ok(Self::immediate(id, payload))
    }

    #[inline]
    const fn immediate(id: CommandId, payload: CommandPayload) -> Self {
        Self {
            id,
            timestamp: 0,
            time_tagged: false,
            payload,
        }
    }

    no_payload_commands! {
        exec_obc_reset => ExecObcReset,
        micro_sd_format => MicroSdFormat,
        ping => Ping,
        downlink_telem => DownlinkTelem,
        uplink_disc => UplinkDisc,
        erase_app => EraseApp,
        verify_crc => VerifyCrc,
        i2c_probe => I2cProbe,
    }

    #[inline]
    pub fn rtc_sync(unix_time: u32) -> Self {
        Self::immediate(CommandId::RtcSync, CommandPayload::RtcSync {
            unix_time,
        })
    }

    #[inline]
    pub fn downlink_logs_next_pass(log_level: u8) -> Self {
        Self::immediate(CommandId::DownlinkLogsNextPass, CommandPayload::DownlinkLogsNextPass {
            log_level,
        })
    }

    #[inline]
    pub fn set_programming_session(session: ProgrammingSession) -> Self {
        Self::immediate(CommandId::SetProgrammingSession, CommandPayload::SetProgrammingSession {
            session,
        })
    }

    #[inline]
    pub fn download_data(kind: u8, length: u16, address: u32) -> Self {
        Self::immediate(CommandId::DownloadData, CommandPayload::DownloadData {
            kind,
            length,
            address,
        })
    }

    #[inline]
    pub fn arm(arm_id: u32, timeout: u32) -> Self {
        Self::immediate(CommandId::Arm, CommandPayload::Arm {
            arm_id,
            timeout,
        })
    }

    #[inline]
    pub fn execute(arm_id: u32, timeout: u32) -> Self {
        Self::immediate(CommandId::Execute, CommandPayload::Execute {
            arm_id,
            timeout,
        })
    }

    /// Schedule for execution at `timestamp` (unix seconds). Zero means immediate.
    #[inline]
    pub fn at(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self.time_tagged = timestamp > 0;
        self
    }

    #[inline]
    pub fn id(&self) -> CommandId {
        self.id
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    #[inline]
    pub fn is_time_tagged(&self) -> bool {
        self.time_tagged
    }

    #[inline]
    pub fn payload(&self) -> &CommandPayload {
        &self.payload
    }

    #[inline]
    pub fn packed_len(&self) -> usize {
        RECORD_HEADER_LEN + self.id.payload_len()
    }

    /// `id | tag bit`, little-endian timestamp, little-endian payload fields.
    pub fn pack(&self) -> Result<Packed, Error> {
        if !self.id.is_sendable() {
            return Err(Error::UnsupportedCommand(self.id.to_primitive()));
        }

        let len = self.packed_len();
        if len > MAX_COMMAND_SIZE {
            return Err(Error::OversizedCommand {
                id: self.id,
                len,
            });
        }

        if !self.payload.matches(self.id) {
            return Err(Error::PayloadMismatch(self.id));
        }

        let mut out = Packed::with_capacity(len);
        let tag = if self.time_tagged { TIME_TAGGED } else { 0 };

        out.put_u8(self.id.to_primitive() | tag);
        out.put_u32_le(self.timestamp);
        self.payload.put(&mut out);

        debug_assert_eq!(out.len(), len);
        Ok(out)
    }

    /// Decode one record from the front of `src`, returning it and the bytes consumed.
    pub fn unpack(src: &[u8]) -> Result<(Self, usize), Error> {
        let mut buf = src;

        if buf.is_empty() {
            return Err(Error::Truncated {
                needed: RECORD_HEADER_LEN,
                have:   0,
            });
        }

        let head = buf.get_u8();
        let id = CommandId::from_primitive(head & ID_MASK).ok_or(Error::UnsupportedCommand(head & ID_MASK))?;

        let needed = RECORD_HEADER_LEN + id.payload_len();
        if src.len() < needed {
            return Err(Error::Truncated {
                needed,
                have: src.len(),
            });
        }

        let timestamp = buf.get_u32_le();
        let payload = CommandPayload::get(id, &mut buf)?;

        let msg = Self {
            id,
            timestamp,
            time_tagged: head & TIME_TAGGED != 0,
            payload,
        };

        Ok((msg, needed))
    }
}

/// Decode every record in a block up to the end-of-frame terminator.
pub fn unpack_commands(block: &[u8]) -> Result<Vec<CommandMessage>, Error> {
    let mut out = vec![];
    let mut rest = block;

    while let Some(&head) = rest.first() {
        if head & ID_MASK == CommandId::EndOfFrame.to_primitive() {
            break;
        }

        let (msg, used) = CommandMessage::unpack(rest)?;
        out.push(msg);
        rest = &rest[used..];
    }

    Ok(out)
}

impl Display for CommandMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.name())?;

        match self.payload {
            CommandPayload::None => {},
            CommandPayload::RtcSync {
                unix_time,
            } => write!(f, " unix_time={}", unix_time)?,
            CommandPayload::DownlinkLogsNextPass {
                log_level,
            } => write!(f, " log_level={}", log_level)?,
            CommandPayload::SetProgrammingSession {
                session,
            } => write!(f, " session={}", session)?,
            CommandPayload::DownloadData {
                kind,
                length,
                address,
            } => write!(f, " kind={} length={} address={:#010x}", kind, length, address)?,
            CommandPayload::Arm {
                arm_id,
                timeout,
            }
            | CommandPayload::Execute {
                arm_id,
                timeout,
            } => write!(f, " arm_id={} timeout={}", arm_id, timeout)?,
        }

        if self.time_tagged {
            match chrono::DateTime::<chrono::Utc>::from_timestamp(self.timestamp as i64, 0) {
                Some(at) => write!(f, " @ {}", at.format("%y/%m/%d %TZ"))?,
                None => write!(f, " @ {}", self.timestamp)?,
            }
        }

        Ok(())
    }
}
