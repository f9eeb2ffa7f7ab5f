use std::fmt::{
    Display,
    Formatter,
};

use bytes::{
    BufMut,
    Bytes,
    BytesMut,
};

use crate::{
    address::{
        valid_callsign,
        ADDRESS_LEN,
    },
    crc,
    Address,
    AddressSide,
    ControlField,
    Error,
    Fcs,
    FrameKind,
    RS_ENCODED_SIZE,
};

pub const FLAG: u8 = 0x7e;
pub const DEFAULT_PID: u8 = 0xf0;

/// Destination, source, control, pid.
pub const HEADER_LEN: usize = 2 * ADDRESS_LEN + 2;
pub const FCS_LEN: usize = 2;
pub const MAX_INFO_LEN: usize = RS_ENCODED_SIZE;

/// Unstuffed body length (between flags) of an I-frame carrying one FEC codeword.
pub const I_FRAME_BODY_LEN: usize = HEADER_LEN + RS_ENCODED_SIZE + FCS_LEN;
/// Unstuffed body length (between flags) of an unnumbered frame.
pub const U_FRAME_BODY_LEN: usize = HEADER_LEN + FCS_LEN;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    pub destination: Address,
    pub source:      Address,
    pub control:     ControlField,
    pub pid:         u8,
    pub payload:     Option<Bytes>,
}

impl Frame {
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.control.kind
    }

    /// Frame body without flags or FCS.
    fn body(&self) -> BytesMut {
        let payload = self.payload.as_deref().unwrap_or_default();

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + FCS_LEN + 2);
        buf.put_slice(&self.destination.encode(true, false));
        buf.put_slice(&self.source.encode(false, true));
        buf.put_u8(self.control.encode());
        buf.put_u8(self.pid);
        buf.put_slice(payload);

        buf
    }

    /// Parse a frame body with flags stripped, verifying the trailing FCS.
    pub fn decode(body: &[u8]) -> Result<Frame, Error> {
        let body = crc::split_verified::<Fcs>(body)?;

        if body.len() < HEADER_LEN {
            return Err(Error::FrameTooShort(body.len()));
        }

        let (destination, _) = Address::decode(&body[..ADDRESS_LEN])?;
        let (source, _) = Address::decode(&body[ADDRESS_LEN..2 * ADDRESS_LEN])?;
        let control = ControlField::decode(body[2 * ADDRESS_LEN])?;
        let pid = body[2 * ADDRESS_LEN + 1];
        let info = &body[HEADER_LEN..];

        let payload = match control.kind {
            FrameKind::Information => Some(Bytes::copy_from_slice(info)),
            kind if !info.is_empty() => return Err(Error::UnexpectedPayload(kind)),
            _ => None,
        };

        Ok(Frame {
            destination,
            source,
            control,
            pid,
            payload,
        })
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} [{}", self.source, self.destination, self.control.kind)?;

        if self.control.poll_final {
            write!(f, ", P/F")?;
        }

        match &self.payload {
            Some(p) => write!(f, ", {} bytes]", p.len()),
            None => write!(f, "]"),
        }
    }
}

/// Builds and parses frames between a fixed pair of stations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCodec {
    source:      Address,
    destination: Address,
    pid:         u8,
}

impl FrameCodec {
    /// Both arguments take the form `CALLSIGN` or `CALLSIGN-SSID`.
    pub fn new(source: &str, destination: &str) -> Result<Self, Error> {
        let source = source.parse::<Address>();
        let destination = destination.parse::<Address>();

        match (source, destination) {
            (Ok(source), Ok(destination)) => Ok(Self {
                source,
                destination,
                pid: DEFAULT_PID,
            }),
            (Err(_), Err(_)) => Err(Error::InvalidAddress(AddressSide::Both)),
            (Err(_), _) => Err(Error::InvalidAddress(AddressSide::Source)),
            (_, Err(_)) => Err(Error::InvalidAddress(AddressSide::Destination)),
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: u8) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn source(&self) -> &Address {
        &self.source
    }

    #[inline]
    pub fn destination(&self) -> &Address {
        &self.destination
    }

    /// A complete flag-delimited frame, FCS included, not bit-stuffed.
    #[tracing::instrument(level = "trace", skip(self, payload), fields(len = payload.map(|p| p.len())))]
    pub fn encode_frame(
        &self,
        payload: Option<&[u8]>,
        kind: FrameKind,
        send_seq: u8,
        poll_final: bool,
    ) -> Result<Bytes, Error> {
        let payload = match (kind, payload) {
            (FrameKind::Information, Some(p)) if p.len() > MAX_INFO_LEN => {
                return Err(Error::PayloadTooLarge(p.len()))
            },
            (FrameKind::Information, p) => Some(Bytes::copy_from_slice(p.unwrap_or_default())),
            (kind, Some(p)) if !p.is_empty() => return Err(Error::UnexpectedPayload(kind)),
            _ => None,
        };

        let frame = Frame {
            destination: self.destination,
            source: self.source,
            control: ControlField::new(kind, send_seq, poll_final),
            pid: self.pid,
            payload,
        };

        Ok(self.encode(&frame))
    }

    /// Flag-delimit an already-built frame.
    pub fn encode(&self, frame: &Frame) -> Bytes {
        let mut body = frame.body();
        crc::append::<Fcs>(&mut body);

        let mut out = BytesMut::with_capacity(body.len() + 2);
        out.put_u8(FLAG);
        out.put_slice(&body);
        out.put_u8(FLAG);

        out.freeze()
    }

    /// Parse a frame whose flags were stripped upstream.
    pub fn decode_frame(&self, body: &[u8]) -> Result<Frame, Error> {
        let frame = Frame::decode(body)?;

        if frame.destination != self.source {
            tracing::debug!(
                destination = %frame.destination,
                expected = %self.source,
                "frame addressed to another station"
            );
        }

        Ok(frame)
    }
}

/// Strip a leading and trailing flag if both are present.
#[inline]
pub fn strip_flags(frame: &[u8]) -> &[u8] {
    match frame {
        [FLAG, body @ .., FLAG] => body,
        _ => frame,
    }
}

/// True when `callsign` would be accepted by [`FrameCodec::new`].
#[inline]
pub fn valid_station(callsign: &str) -> bool {
    match callsign.split_once('-') {
        Some((call, ssid)) => valid_callsign(call) && ssid.parse::<u8>().map_or(false, |s| s <= 15),
        None => valid_callsign(callsign),
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new("ATLAS", "AKITO").unwrap()
    }

    #[test]
    fn invalid_address_names_side() {
        assert_eq!(
            FrameCodec::new("BAD CALL", "AKITO"),
            Err(Error::InvalidAddress(AddressSide::Source))
        );
        assert_eq!(
            FrameCodec::new("ATLAS", "WAYTOOLONG"),
            Err(Error::InvalidAddress(AddressSide::Destination))
        );
        assert_eq!(FrameCodec::new("", "-"), Err(Error::InvalidAddress(AddressSide::Both)));
        assert!(valid_station("ATLAS-2"));
        assert!(!valid_station("ATLAS-22"));
    }

    #[test]
    fn connect_request_layout() -> eyre::Result<()> {
        let frame = codec().encode_frame(None, FrameKind::ConnectRequest, 0, true)?;

        assert_eq!(frame.len(), U_FRAME_BODY_LEN + 2);
        assert_eq!(frame[0], FLAG);
        assert_eq!(frame[frame.len() - 1], FLAG);
        assert_eq!(frame[1], b'A' << 1);
        assert_eq!(frame[15], 0x3f);
        assert_eq!(frame[16], DEFAULT_PID);

        let decoded = codec().decode_frame(strip_flags(&frame))?;
        assert_eq!(decoded.kind(), FrameKind::ConnectRequest);
        assert!(decoded.control.poll_final);
        assert_eq!(decoded.payload, None);
        assert_eq!(decoded.source.callsign(), "ATLAS");
        assert_eq!(decoded.destination.callsign(), "AKITO");

        Ok(())
    }

    #[test]
    fn unnumbered_frame_rejects_payload() {
        assert_eq!(
            codec().encode_frame(Some(&[1, 2, 3]), FrameKind::Acknowledge, 0, false),
            Err(Error::UnexpectedPayload(FrameKind::Acknowledge))
        );
    }

    #[test]
    fn oversized_payload() {
        let payload = [0u8; MAX_INFO_LEN + 1];

        assert_eq!(
            codec().encode_frame(Some(&payload), FrameKind::Information, 0, false),
            Err(Error::PayloadTooLarge(MAX_INFO_LEN + 1))
        );
    }

    #[test]
    fn full_codeword_frame_len() -> eyre::Result<()> {
        let payload = [0x55u8; RS_ENCODED_SIZE];
        let frame = codec().encode_frame(Some(&payload), FrameKind::Information, 0, false)?;

        assert_eq!(frame.len(), I_FRAME_BODY_LEN + 2);
        Ok(())
    }

    proptest! {
        #[test]
        fn frame_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..=223), seq in 0u8..8) {
            let codec = codec();
            let encoded = codec.encode_frame(Some(&payload), FrameKind::Information, seq, false).unwrap();
            let decoded = codec.decode_frame(strip_flags(&encoded)).unwrap();

            assert_eq!(decoded.payload.as_deref(), Some(&payload[..]));
            assert_eq!(decoded.control.send_seq, seq);
            assert_eq!(decoded.pid, DEFAULT_PID);
        }

        #[test]
        fn single_bit_flip(payload in proptest::collection::vec(any::<u8>(), 0..=64), bit in any::<proptest::sample::Index>()) {
            let codec = codec();
            let encoded = codec.encode_frame(Some(&payload), FrameKind::Information, 0, false).unwrap();

            let mut body = strip_flags(&encoded).to_vec();
            let covered_bits = (body.len() - FCS_LEN) * 8;
            let bit = bit.index(covered_bits);
            body[bit / 8] ^= 0x80 >> (bit % 8);

            assert!(matches!(codec.decode_frame(&body), Err(Error::ChecksumMismatch { .. })));
        }
    }
}
