//! HDLC bit stuffing, MSB first: a zero bit follows every run of five ones.

use bytes::{
    BufMut,
    Bytes,
    BytesMut,
};

use message::frame::FLAG;

const MAX_ONES: u8 = 5;

struct BitWriter {
    out:  BytesMut,
    acc:  u8,
    bits: u8,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            out:  BytesMut::with_capacity(bytes),
            acc:  0,
            bits: 0,
        }
    }

    #[inline]
    fn push(&mut self, bit: bool) {
        self.acc = (self.acc << 1) | bit as u8;
        self.bits += 1;

        if self.bits == 8 {
            self.out.put_u8(self.acc);
            self.acc = 0;
            self.bits = 0;
        }
    }

    /// Zero-fill the final partial byte.
    fn finish_padded(mut self) -> BytesMut {
        if self.bits > 0 {
            self.out.put_u8(self.acc << (8 - self.bits));
        }

        self.out
    }

    /// Drop the final partial byte, returning the dropped bits alongside.
    fn finish_truncated(self) -> (BytesMut, u8, u8) {
        (self.out, self.acc, self.bits)
    }
}

#[inline]
fn bits(data: &[u8]) -> impl Iterator<Item = bool> + '_ {
    data.iter().flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
}

pub fn stuff(unstuffed: &[u8]) -> Bytes {
    let mut w = BitWriter::with_capacity(unstuffed.len() + unstuffed.len() / 5 + 1);
    let mut ones = 0;

    for bit in bits(unstuffed) {
        w.push(bit);

        if !bit {
            ones = 0;
            continue;
        }

        ones += 1;
        if ones == MAX_ONES {
            w.push(false);
            ones = 0;
        }
    }

    w.finish_padded().freeze()
}

/// Inverse of [`stuff`]. Alignment bits past the last whole byte are discarded.
///
/// Malformed input is not rejected here; it surfaces as an FCS failure when the frame is decoded.
pub fn unstuff(stuffed: &[u8]) -> Bytes {
    let mut w = BitWriter::with_capacity(stuffed.len());
    let mut ones = 0;
    let mut skip = false;

    for bit in bits(stuffed) {
        if skip {
            if bit {
                tracing::trace!("six consecutive ones inside frame body");
            }

            skip = false;
            ones = 0;
            continue;
        }

        w.push(bit);

        if !bit {
            ones = 0;
            continue;
        }

        ones += 1;
        if ones == MAX_ONES {
            skip = true;
            ones = 0;
        }
    }

    let (out, rest, rest_bits) = w.finish_truncated();
    if rest != 0 {
        tracing::warn!(rest_bits, rest = rest, "nonzero alignment bits after unstuffing");
    }

    out.freeze()
}

/// Stuff the body of a flag-delimited frame, keeping its flags.
pub fn stuff_frame(frame: &[u8]) -> Bytes {
    let body = message::frame::strip_flags(frame);
    let stuffed = stuff(body);

    flagged(&stuffed)
}

/// Unstuff the body of a flag-delimited frame, keeping its flags.
pub fn unstuff_frame(frame: &[u8]) -> Bytes {
    let body = message::frame::strip_flags(frame);
    let unstuffed = unstuff(body);

    flagged(&unstuffed)
}

fn flagged(body: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(body.len() + 2);
    out.put_u8(FLAG);
    out.put_slice(body);
    out.put_u8(FLAG);

    out.freeze()
}

/// Drop a whole zero byte left behind by byte-granular padding on the sending side.
///
/// Bit-level padding never produces one, so this only applies when the body is exactly one byte
/// longer than `expected` and that byte is zero.
pub fn trim_alignment_byte(body: &[u8], expected: usize) -> &[u8] {
    match body.split_last() {
        Some((0, rest)) if body.len() == expected + 1 => {
            tracing::warn!(expected, "dropping trailing alignment byte");
            rest
        },
        _ => body,
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn inserts_after_five_ones() {
        // 1111_1000 -> 1111_1000 0 -> padded to two bytes
        assert_eq!(&stuff(&[0xf8])[..], &[0xf8, 0x00]);
        // 1111_1111 -> 11111 0 111 -> 1111_1011 1000_0000
        assert_eq!(&stuff(&[0xff])[..], &[0xfb, 0x80]);
        assert_eq!(&unstuff(&[0xfb, 0x80])[..], &[0xff]);
    }

    #[test]
    fn flag_never_appears() {
        let stuffed = stuff(&[FLAG, FLAG, 0xff, 0xff, FLAG]);
        assert!(!stuffed.contains(&FLAG));
    }

    #[test]
    fn keeps_flags() {
        let frame = stuff_frame(&[FLAG, 0xff, FLAG]);

        assert_eq!(&frame[..], &[FLAG, 0xfb, 0x80, FLAG]);
        assert_eq!(&unstuff_frame(&frame)[..], &[FLAG, 0xff, FLAG]);
    }

    #[test]
    fn trims_only_exact_overrun() {
        assert_eq!(trim_alignment_byte(&[1, 2, 0], 2), &[1, 2]);
        assert_eq!(trim_alignment_byte(&[1, 2, 0], 3), &[1, 2, 0]);
        assert_eq!(trim_alignment_byte(&[1, 2, 3], 2), &[1, 2, 3]);
        assert_eq!(trim_alignment_byte(&[], 0), &[] as &[u8]);
    }

    proptest! {
        #[test]
        fn stuff_unstuff(data in any::<Vec<u8>>()) {
            let stuffed = stuff(&data);

            assert!(stuffed.len() >= data.len());
            assert_eq!(&unstuff(&stuffed)[..], &data[..]);
        }

        #[test]
        fn no_six_ones(data in any::<Vec<u8>>()) {
            let stuffed = stuff(&data);
            let run = bits(&stuffed).fold((0, 0), |(cur, max), b| {
                let cur = if b { cur + 1 } else { 0 };
                (cur, std::cmp::max(cur, max))
            });

            assert!(run.1 <= 5);
        }
    }
}
