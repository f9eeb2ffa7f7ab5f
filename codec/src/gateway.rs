use message::{
    CommandMessage,
    RS_DECODED_SIZE,
    RS_ENCODED_SIZE,
};

use crate::{
    aes,
    fec,
    Error,
};

/// Byte-buffer transforms the link layer consumes: FEC, AES-CTR, and the command record codec.
pub trait CodecGateway: Send + Sync {
    /// Fails if `data` exceeds [`RS_DECODED_SIZE`].
    fn fec_encode(&self, data: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error>;

    /// Correct a codeword and return its payload.
    fn fec_decode(&self, codeword: &[u8]) -> Result<[u8; RS_DECODED_SIZE], Error> {
        let corrected = self.fec_correct(codeword)?;

        let mut out = [0u8; RS_DECODED_SIZE];
        out.copy_from_slice(&corrected[..RS_DECODED_SIZE]);
        Ok(out)
    }

    /// Correct a codeword, returning all of it, parity included.
    fn fec_correct(&self, codeword: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error>;

    fn aes_encrypt(&self, data: &[u8], key: &aes::Key, iv: &aes::Iv) -> Vec<u8>;

    fn aes_decrypt(&self, data: &[u8], key: &aes::Key, iv: &aes::Iv) -> Vec<u8> {
        self.aes_encrypt(data, key, iv)
    }

    fn pack_command(&self, cmd: &CommandMessage) -> Result<message::command::Packed, Error> {
        Ok(cmd.pack()?)
    }

    fn unpack_command(&self, src: &[u8]) -> Result<CommandMessage, Error> {
        Ok(CommandMessage::unpack(src)?.0)
    }
}

/// In-process Reed-Solomon and AES.
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardGateway;

impl CodecGateway for StandardGateway {
    #[inline]
    fn fec_encode(&self, data: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error> {
        fec::encode(data)
    }

    #[inline]
    fn fec_correct(&self, codeword: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error> {
        fec::correct(codeword)
    }

    #[inline]
    fn aes_encrypt(&self, data: &[u8], key: &aes::Key, iv: &aes::Iv) -> Vec<u8> {
        aes::apply(data, key, iv)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_through_gateway() -> eyre::Result<()> {
        let gw = StandardGateway;
        let block = [0x42u8; RS_DECODED_SIZE];

        let encrypted = gw.aes_encrypt(&block, &aes::DEFAULT_KEY, &aes::DEFAULT_IV);
        let mut codeword = gw.fec_encode(&encrypted)?;
        codeword[7] ^= 0x10;
        codeword[200] = 0;

        let decoded = gw.fec_decode(&codeword)?;
        let plain = gw.aes_decrypt(&decoded, &aes::DEFAULT_KEY, &aes::DEFAULT_IV);

        assert_eq!(plain, block.to_vec());
        Ok(())
    }

    #[test]
    fn unsupported_command() {
        assert_eq!(
            StandardGateway.unpack_command(&[0x40, 0, 0, 0, 0]),
            Err(Error::Message(message::Error::UnsupportedCommand(0x40)))
        );
    }
}
