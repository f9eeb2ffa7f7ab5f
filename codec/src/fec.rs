//! Reed-Solomon RS(255, 223).

use message::{
    RS_DECODED_SIZE,
    RS_ENCODED_SIZE,
};
use reed_solomon::{
    Decoder,
    Encoder,
};

use crate::Error;

pub const ECC_LEN: usize = RS_ENCODED_SIZE - RS_DECODED_SIZE;

/// Encode up to one block, zero-padding it to the full data length first.
pub fn encode(data: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error> {
    if data.len() > RS_DECODED_SIZE {
        return Err(Error::FecInputTooLarge(data.len()));
    }

    let mut block = [0u8; RS_DECODED_SIZE];
    block[..data.len()].copy_from_slice(data);

    let encoded = Encoder::new(ECC_LEN).encode(&block);

    let mut out = [0u8; RS_ENCODED_SIZE];
    out.copy_from_slice(&encoded);

    Ok(out)
}

/// Correct a received codeword in full, parity included.
pub fn correct(codeword: &[u8]) -> Result<[u8; RS_ENCODED_SIZE], Error> {
    if codeword.len() != RS_ENCODED_SIZE {
        return Err(Error::FecBadLength(codeword.len()));
    }

    let mut buf = [0u8; RS_ENCODED_SIZE];
    buf.copy_from_slice(codeword);

    let corrected = Decoder::new(ECC_LEN).correct(&mut buf, None).map_err(|e| {
        tracing::warn!(error = ?e, "reed-solomon decode failed");
        Error::FecUncorrectable
    })?;

    let mut out = [0u8; RS_ENCODED_SIZE];
    out.copy_from_slice(&corrected);

    Ok(out)
}

pub fn decode(codeword: &[u8]) -> Result<[u8; RS_DECODED_SIZE], Error> {
    let corrected = correct(codeword)?;

    let mut out = [0u8; RS_DECODED_SIZE];
    out.copy_from_slice(&corrected[..RS_DECODED_SIZE]);

    Ok(out)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rejects_oversized() {
        assert_eq!(encode(&[0; RS_DECODED_SIZE + 1]), Err(Error::FecInputTooLarge(RS_DECODED_SIZE + 1)));
        assert_eq!(decode(&[0; 10]), Err(Error::FecBadLength(10)));
    }

    #[test]
    fn systematic() -> eyre::Result<()> {
        let encoded = encode(b"ping")?;

        assert_eq!(&encoded[..4], b"ping");
        assert!(encoded[4..RS_DECODED_SIZE].iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn too_many_errors() -> eyre::Result<()> {
        let mut encoded = encode(&[0xa5; RS_DECODED_SIZE])?;
        for b in encoded.iter_mut().take(ECC_LEN) {
            *b ^= 0xff;
        }

        assert_eq!(decode(&encoded), Err(Error::FecUncorrectable));
        Ok(())
    }

    proptest! {
        #[test]
        fn corrects_up_to_capacity(
            data in proptest::collection::vec(any::<u8>(), RS_DECODED_SIZE),
            errors in proptest::collection::btree_set(0..RS_ENCODED_SIZE, 0..=ECC_LEN / 2),
        ) {
            let mut encoded = encode(&data).unwrap();
            for i in &errors {
                encoded[*i] ^= 0x5a;
            }

            assert_eq!(&decode(&encoded).unwrap()[..], &data[..]);
        }
    }
}
