use bytes::{
    Bytes,
    BytesMut,
};

use codec::{
    aes,
    bit_stuff,
    CodecGateway,
    StandardGateway,
};
use message::{
    frame::{
        self,
        HEADER_LEN,
        I_FRAME_BODY_LEN,
        U_FRAME_BODY_LEN,
    },
    Frame,
    FrameCodec,
    FrameKind,
    RS_DECODED_SIZE,
    RS_ENCODED_SIZE,
};

use crate::{
    Error,
    LinkConfig,
};

/// Byte-level transformations between command blocks and what goes over the air.
///
/// Uplink: encrypt, FEC-encode, frame, bit-stuff. Downlink runs the same steps in reverse, except
/// that the FEC codeword is corrected in place before the FCS is checked over it.
pub struct CommsPipeline<G = StandardGateway> {
    frames:  FrameCodec,
    gateway: G,

    key:                aes::Key,
    iv:                 aes::Iv,
    encrypted_downlink: bool,
}

impl CommsPipeline<StandardGateway> {
    pub fn new(config: &LinkConfig) -> Result<Self, Error> {
        Self::with_gateway(config, StandardGateway)
    }
}

impl<G> CommsPipeline<G>
where
    G: CodecGateway,
{
    pub fn with_gateway(config: &LinkConfig, gateway: G) -> Result<Self, Error> {
        let frames = FrameCodec::new(&config.ground_callsign, &config.cubesat_callsign)?.with_pid(config.pid);

        Ok(Self {
            frames,
            gateway,
            key: config.aes_key,
            iv: config.aes_iv,
            encrypted_downlink: config.encrypted_downlink,
        })
    }

    #[inline]
    pub fn frames(&self) -> &FrameCodec {
        &self.frames
    }

    #[inline]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Stuffed, flag-delimited I-frame carrying one command block.
    #[tracing::instrument(level = "debug", skip_all, fields(len = block.len()), err(Display))]
    pub fn encode_block(&self, block: &[u8]) -> Result<Bytes, Error> {
        let encrypted = self.gateway.aes_encrypt(block, &self.key, &self.iv);
        let codeword = self.gateway.fec_encode(&encrypted)?;
        let frame = self.frames.encode_frame(Some(&codeword), FrameKind::Information, 0, false)?;

        Ok(bit_stuff::stuff_frame(&frame))
    }

    /// Stuffed, flag-delimited unnumbered frame.
    pub fn encode_control(&self, kind: FrameKind, poll_final: bool) -> Result<Bytes, Error> {
        let frame = self.frames.encode_frame(None, kind, 0, poll_final)?;
        Ok(bit_stuff::stuff_frame(&frame))
    }

    /// Decode a flag-delimited, still-stuffed frame isolated from a read.
    ///
    /// I-frames come back with their payload replaced by the recovered (and, if configured,
    /// decrypted) command-response block.
    #[tracing::instrument(level = "debug", skip_all, fields(len = raw.len()), err(Display))]
    pub fn decode(&self, raw: &[u8]) -> Result<Frame, Error> {
        let unstuffed = bit_stuff::unstuff_frame(raw);
        let body = frame::strip_flags(&unstuffed);

        if unstuffed.len() <= RS_ENCODED_SIZE {
            let body = bit_stuff::trim_alignment_byte(body, U_FRAME_BODY_LEN);
            return Ok(self.frames.decode_frame(body)?);
        }

        let body = bit_stuff::trim_alignment_byte(body, I_FRAME_BODY_LEN);
        let codeword_end = HEADER_LEN + RS_ENCODED_SIZE;

        if body.len() < I_FRAME_BODY_LEN {
            return Err(message::Error::FrameTooShort(body.len()).into());
        }

        let corrected = self.gateway.fec_correct(&body[HEADER_LEN..codeword_end])?;

        let mut rebuilt = BytesMut::with_capacity(body.len());
        rebuilt.extend_from_slice(&body[..HEADER_LEN]);
        rebuilt.extend_from_slice(&corrected);
        rebuilt.extend_from_slice(&body[codeword_end..]);

        let mut frame = self.frames.decode_frame(&rebuilt)?;

        let data = &corrected[..RS_DECODED_SIZE];
        let data = if self.encrypted_downlink {
            self.gateway.aes_decrypt(data, &self.key, &self.iv)
        } else {
            data.to_vec()
        };

        frame.payload = Some(data.into());
        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use message::{
        frame::FLAG,
        Address,
        ControlField,
    };

    use super::*;

    fn pipeline() -> CommsPipeline {
        CommsPipeline::new(&LinkConfig::default()).unwrap()
    }

    /// What the spacecraft would send back for `block`.
    fn downlink(block: &[u8], config: &LinkConfig) -> eyre::Result<Bytes> {
        let frames = FrameCodec::new(&config.cubesat_callsign, &config.ground_callsign)?;
        let encrypted = aes::apply(block, &config.aes_key, &config.aes_iv);
        let codeword = codec::fec::encode(&encrypted)?;
        let frame = frames.encode_frame(Some(&codeword), FrameKind::Information, 0, false)?;

        Ok(bit_stuff::stuff_frame(&frame))
    }

    #[test]
    fn connect_request_is_unnumbered() -> eyre::Result<()> {
        let pipeline = pipeline();
        let wire = pipeline.encode_control(FrameKind::ConnectRequest, true)?;

        assert_eq!(wire[0], FLAG);
        assert_eq!(wire[wire.len() - 1], FLAG);

        let frame = pipeline.decode(&wire)?;
        assert_eq!(frame.kind(), FrameKind::ConnectRequest);
        assert!(frame.control.poll_final);
        assert_eq!(frame.payload, None);

        Ok(())
    }

    #[test]
    fn uplink_block_is_fec_protected() -> eyre::Result<()> {
        let pipeline = pipeline();
        let block = [0x55u8; RS_DECODED_SIZE];

        let wire = pipeline.encode_block(&block)?;
        let unstuffed = bit_stuff::unstuff_frame(&wire);
        let body = frame::strip_flags(&unstuffed);

        assert_eq!(body.len(), I_FRAME_BODY_LEN);

        let codeword = &body[HEADER_LEN..HEADER_LEN + RS_ENCODED_SIZE];
        let data = codec::fec::decode(codeword)?;
        let config = LinkConfig::default();

        assert_eq!(aes::apply(&data, &config.aes_key, &config.aes_iv), block.to_vec());

        Ok(())
    }

    #[test]
    fn downlink_block_decrypted() -> eyre::Result<()> {
        let config = LinkConfig::default();
        let mut block = [0u8; RS_DECODED_SIZE];
        block[..4].copy_from_slice(&[0x04, 0x01, 0x00, 0x00]);

        let frame = pipeline().decode(&downlink(&block, &config)?)?;

        assert_eq!(frame.kind(), FrameKind::Information);
        assert_eq!(frame.source, Address::new(message::CUBESAT_CALLSIGN, 0)?);
        assert_eq!(frame.payload.as_deref(), Some(&block[..]));

        Ok(())
    }

    #[test]
    fn plaintext_downlink() -> eyre::Result<()> {
        let config = LinkConfig {
            encrypted_downlink: false,
            ..LinkConfig::default()
        };

        let frames = FrameCodec::new(&config.cubesat_callsign, &config.ground_callsign)?;
        let block = [0xa5u8; RS_DECODED_SIZE];
        let codeword = codec::fec::encode(&block)?;
        let wire = bit_stuff::stuff_frame(&frames.encode_frame(Some(&codeword), FrameKind::Information, 0, false)?);

        let frame = CommsPipeline::new(&config)?.decode(&wire)?;
        assert_eq!(frame.payload.as_deref(), Some(&block[..]));

        Ok(())
    }

    #[test]
    fn bad_fcs_on_unnumbered_frame() -> eyre::Result<()> {
        let frames = FrameCodec::new(message::CUBESAT_CALLSIGN, message::GROUND_STATION_CALLSIGN)?;
        let mut raw = frames.encode_frame(None, FrameKind::Acknowledge, 0, true)?.to_vec();
        let fcs = raw.len() - 2;
        raw[fcs] ^= 0x01;

        let result = pipeline().decode(&bit_stuff::stuff_frame(&raw));
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })), "{:?}", result);

        Ok(())
    }

    #[test]
    fn truncated_information_frame() -> eyre::Result<()> {
        let config = LinkConfig::default();
        let wire = downlink(&[0u8; RS_DECODED_SIZE], &config)?;

        let unstuffed = bit_stuff::unstuff_frame(&wire);
        let short = bit_stuff::stuff_frame(&unstuffed[..unstuffed.len() - 10]);

        assert!(matches!(pipeline().decode(&short), Err(Error::Message(message::Error::FrameTooShort(_)))));

        Ok(())
    }

    #[test]
    fn legacy_alignment_byte() -> eyre::Result<()> {
        let frames = FrameCodec::new(message::CUBESAT_CALLSIGN, message::GROUND_STATION_CALLSIGN)?;
        let raw = frames.encode_frame(None, FrameKind::Acknowledge, 0, true)?;

        let mut body = frame::strip_flags(&raw).to_vec();
        body.push(0);

        let mut padded = vec![FLAG];
        padded.extend_from_slice(&bit_stuff::stuff(&body));
        padded.push(FLAG);

        let frame = pipeline().decode(&padded)?;
        assert_eq!(frame.control, ControlField::new(FrameKind::Acknowledge, 0, true));

        Ok(())
    }

    proptest! {
        #[test]
        fn corrects_codeword_errors(
            errors in proptest::collection::btree_map(HEADER_LEN..HEADER_LEN + RS_ENCODED_SIZE, 1u8..=255, 1..=16),
        ) {
            let config = LinkConfig::default();
            let block = [0x3cu8; RS_DECODED_SIZE];
            let wire = downlink(&block, &config).unwrap();

            let mut body = frame::strip_flags(&bit_stuff::unstuff_frame(&wire)).to_vec();
            for (i, e) in errors {
                body[i] ^= e;
            }

            let mut corrupted = vec![FLAG];
            corrupted.extend_from_slice(&bit_stuff::stuff(&body));
            corrupted.push(FLAG);

            let frame = pipeline().decode(&corrupted).unwrap();
            prop_assert_eq!(frame.payload.as_deref(), Some(&block[..]));
        }
    }
}
