use bytes::BytesMut;

use crate::{
    checksum,
    Checksum,
    Error,
};

/// Append the checksum of everything currently in `buf`.
#[inline]
pub fn append<C>(buf: &mut BytesMut)
where
    C: Checksum,
{
    let checksum = C::checksum_array(&buf[..]);
    buf.extend_from_slice(&checksum);
}

/// Split a trailing checksum off `src` and verify it against the preceding bytes.
pub fn split_verified<C>(src: &[u8]) -> Result<&[u8], Error>
where
    C: Checksum,
{
    let size = checksum::size::<C>();

    if src.len() < size {
        return Err(Error::FrameTooShort(src.len()));
    }

    let (payload, src_checksum) = src.split_at(src.len() - size);
    let computed_checksum = C::checksum_array(payload);

    if src_checksum != &computed_checksum[..] {
        tracing::error!(
            src_checksum = %hex::encode(src_checksum),
            computed_checksum = %hex::encode(&computed_checksum),
            "frame with invalid checksum"
        );

        return Err(Error::ChecksumMismatch {
            received: hex::encode(src_checksum),
            computed: hex::encode(&computed_checksum),
        });
    }

    Ok(payload)
}
