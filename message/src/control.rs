use crate::Error;

const POLL_FINAL: u8 = 0x10;
const SEQ_MASK: u8 = 0x07;

/// Frame kinds this link exchanges. No supervisory frames: there is no sliding window.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display, serde::Serialize, serde::Deserialize,
)]
pub enum FrameKind {
    #[display(fmt = "I")]
    Information,
    #[display(fmt = "SABM")]
    ConnectRequest,
    #[display(fmt = "DISC")]
    Disconnect,
    #[display(fmt = "UA")]
    Acknowledge,
}

impl FrameKind {
    #[inline]
    pub fn is_unnumbered(self) -> bool {
        self != FrameKind::Information
    }

    /// Unnumbered control byte with the poll/final bit clear.
    const fn unnumbered_base(self) -> Option<u8> {
        match self {
            FrameKind::Information => None,
            FrameKind::ConnectRequest => Some(0x2f),
            FrameKind::Disconnect => Some(0x43),
            FrameKind::Acknowledge => Some(0x63),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ControlField {
    pub kind:       FrameKind,
    pub send_seq:   u8,
    pub poll_final: bool,
}

impl ControlField {
    #[inline]
    pub fn new(kind: FrameKind, send_seq: u8, poll_final: bool) -> Self {
        Self {
            kind,
            send_seq: send_seq & SEQ_MASK,
            poll_final,
        }
    }

    pub fn encode(&self) -> u8 {
        let pf = if self.poll_final { POLL_FINAL } else { 0 };

        match self.kind.unnumbered_base() {
            Some(base) => base | pf,
            // N(R) is always zero
            None => pf | ((self.send_seq & SEQ_MASK) << 1),
        }
    }

    pub fn decode(b: u8) -> Result<Self, Error> {
        let poll_final = b & POLL_FINAL != 0;

        if b & 0x01 == 0 {
            return Ok(Self {
                kind: FrameKind::Information,
                send_seq: (b >> 1) & SEQ_MASK,
                poll_final,
            });
        }

        let kind = match b & !POLL_FINAL {
            // SABME is accepted as a connect request; the spacecraft opens emergency links with it
            0x2f | 0x6f => FrameKind::ConnectRequest,
            0x43 => FrameKind::Disconnect,
            0x63 => FrameKind::Acknowledge,
            _ => return Err(Error::InvalidControl(b)),
        };

        Ok(Self {
            kind,
            send_seq: 0,
            poll_final,
        })
    }
}
