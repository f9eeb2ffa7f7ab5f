use bytes::{
    Buf,
    Bytes,
    BytesMut,
};
use tokio_util::codec::Decoder;

use message::frame::{
    FLAG,
    I_FRAME_BODY_LEN,
};

/// Longest span a flag may open before it is treated as console text: a fully stuffed I-frame
/// with its alignment byte and both flags.
pub const MAX_STUFFED_FRAME: usize = (I_FRAME_BODY_LEN + 1) * 6 / 5 + 3;

/// A frame isolated from a read window, with the console output around it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    /// From the first flag through the last, inclusive.
    pub frame:   Bytes,
    pub chatter: Bytes,
}

/// Isolate the span between the first and last flag bytes in `buf`.
///
/// Returns `None` unless two distinct flags are present.
pub fn locate(buf: &[u8]) -> Option<Located> {
    let start = buf.iter().position(|&b| b == FLAG)?;
    let end = buf.iter().rposition(|&b| b == FLAG)?;

    if end == start {
        return None;
    }

    let mut chatter = BytesMut::with_capacity(start + buf.len() - end - 1);
    chatter.extend_from_slice(&buf[..start]);
    chatter.extend_from_slice(&buf[end + 1..]);

    Some(Located {
        frame:   Bytes::copy_from_slice(&buf[start..=end]),
        chatter: chatter.freeze(),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Bytes outside any frame: console and log output from the spacecraft.
    Chatter(Bytes),
    /// A flag-delimited frame, flags included.
    Frame(Bytes),
}

/// Splits a continuous byte stream into frames and the chatter between them.
///
/// Stuffed frame bodies never contain a flag byte, so each opening flag pairs with the next flag.
/// Back-to-back flags are collapsed. A `~` in console output reads as a flag, so a span longer
/// than `max_frame` is handed back as chatter and the closing flag reopens.
#[derive(Clone, Debug)]
pub struct FlagSplitCodec {
    in_frame:    bool,
    search_from: usize,
    max_frame:   usize,
}

impl FlagSplitCodec {
    pub fn new() -> Self {
        Self::with_max_frame(MAX_STUFFED_FRAME)
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            in_frame: false,
            search_from: 0,
            max_frame,
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.in_frame = false;
        self.search_from = 0;
    }
}

impl Default for FlagSplitCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FlagSplitCodec {
    type Error = std::io::Error;
    type Item = Segment;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if !self.in_frame {
                return match src.iter().position(|&b| b == FLAG) {
                    Some(0) => {
                        self.in_frame = true;
                        self.search_from = 1;
                        continue;
                    },
                    Some(i) => Ok(Some(Segment::Chatter(src.split_to(i).freeze()))),
                    None if src.is_empty() => Ok(None),
                    None => Ok(Some(Segment::Chatter(src.split().freeze()))),
                };
            }

            let close = src[self.search_from..].iter().position(|&b| b == FLAG);

            return match close {
                None if src.len() > self.max_frame => {
                    tracing::trace!(len = src.len(), "unclosed flag, flushing as chatter");

                    self.reset();
                    Ok(Some(Segment::Chatter(src.split().freeze())))
                },
                None => {
                    self.search_from = src.len();
                    Ok(None)
                },
                // empty body: the second flag opens the next frame
                Some(0) if self.search_from == 1 => {
                    src.advance(1);
                    continue;
                },
                Some(i) => {
                    let end = self.search_from + i;
                    self.reset();

                    if end + 1 > self.max_frame {
                        tracing::trace!(len = end + 1, "flag span too long for a frame");
                        return Ok(Some(Segment::Chatter(src.split_to(end).freeze())));
                    }

                    Ok(Some(Segment::Frame(src.split_to(end + 1).freeze())))
                },
            };
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let result @ Some(_) = self.decode(buf)? {
            return Ok(result);
        }

        if buf.is_empty() {
            return Ok(None);
        }

        // unterminated frame at end of stream
        self.reset();

        Ok(Some(Segment::Chatter(buf.split().freeze())))
    }
}

#[cfg(test)]
mod test {
    use futures::prelude::*;
    use proptest::prelude::*;
    use tokio_util::codec::FramedRead;

    use super::*;

    async fn segments(src: &[u8]) -> eyre::Result<Vec<Segment>> {
        let results = FramedRead::new(src, FlagSplitCodec::new()).collect::<Vec<_>>().await;

        Ok(results.into_iter().collect::<Result<Vec<_>, _>>()?)
    }

    fn chatter(b: &[u8]) -> Segment {
        Segment::Chatter(Bytes::copy_from_slice(b))
    }

    fn frame(b: &[u8]) -> Segment {
        Segment::Frame(Bytes::copy_from_slice(b))
    }

    #[test]
    fn locate_first_and_last() {
        let located = locate(b"boot ok\n\x7e\x01\x02\x7e\x03\x7etail").unwrap();

        assert_eq!(&located.frame[..], b"\x7e\x01\x02\x7e\x03\x7e");
        assert_eq!(&located.chatter[..], b"boot ok\ntail");
    }

    #[test]
    fn locate_requires_pair() {
        assert_eq!(locate(b"no frame here"), None);
        assert_eq!(locate(b"half \x7e frame"), None);
        assert_eq!(locate(b""), None);
    }

    #[tokio::test]
    async fn split_stream() -> eyre::Result<()> {
        let got = segments(b"log line\n\x7e\x01\x02\x7e\x7e\x03\x7emore").await?;

        assert_eq!(got, vec![
            chatter(b"log line\n"),
            frame(b"\x7e\x01\x02\x7e"),
            frame(b"\x7e\x03\x7e"),
            chatter(b"more"),
        ]);

        Ok(())
    }

    #[tokio::test]
    async fn collapses_repeated_flags() -> eyre::Result<()> {
        let got = segments(b"\x7e\x7e\x7e\x05\x7e").await?;

        assert_eq!(got, vec![frame(b"\x7e\x05\x7e")]);
        Ok(())
    }

    #[tokio::test]
    async fn unterminated_frame_is_chatter() -> eyre::Result<()> {
        let got = segments(b"\x7e\x01\x02").await?;

        assert_eq!(got, vec![chatter(b"\x7e\x01\x02")]);
        Ok(())
    }

    #[test]
    fn frame_split_across_reads() -> eyre::Result<()> {
        let mut codec = FlagSplitCodec::new();
        let mut buf = BytesMut::from(&b"\x7e\x01"[..]);

        assert_eq!(codec.decode(&mut buf)?, None);

        buf.extend_from_slice(b"\x02\x7e");
        assert_eq!(codec.decode(&mut buf)?, Some(frame(b"\x7e\x01\x02\x7e")));

        Ok(())
    }

    #[tokio::test]
    async fn long_tilde_span_is_chatter() -> eyre::Result<()> {
        let mut src = b"temp ~".to_vec();
        src.extend(std::iter::repeat(b'x').take(MAX_STUFFED_FRAME));
        src.extend_from_slice(b"~\x01\x7e");

        let got = segments(&src).await?;

        assert_eq!(got, vec![chatter(b"temp "), chatter(&src[5..src.len() - 3]), frame(b"\x7e\x01\x7e")]);
        Ok(())
    }

    #[test]
    fn unclosed_flag_is_bounded() -> eyre::Result<()> {
        let mut codec = FlagSplitCodec::with_max_frame(8);
        let mut buf = BytesMut::from(&b"~abc"[..]);

        assert_eq!(codec.decode(&mut buf)?, None);

        buf.extend_from_slice(b"defghij\n");
        assert_eq!(codec.decode(&mut buf)?, Some(chatter(b"~abcdefghij\n")));
        assert!(buf.is_empty());

        buf.extend_from_slice(b"\x7e\x05\x7e");
        assert_eq!(codec.decode(&mut buf)?, Some(frame(b"\x7e\x05\x7e")));

        Ok(())
    }

    proptest! {
        #[test]
        fn frames_survive(bodies in proptest::collection::vec(proptest::collection::vec(0u8..0x7e, 1..16), 0..8)) {
            let mut stream = vec![];
            for body in &bodies {
                stream.extend_from_slice(b"log\n");
                stream.push(FLAG);
                stream.extend_from_slice(body);
                stream.push(FLAG);
            }

            let got = tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(segments(&stream)).unwrap();
            let frames = got.into_iter().filter_map(|s| match s {
                Segment::Frame(f) => Some(f[1..f.len() - 1].to_vec()),
                Segment::Chatter(_) => None,
            }).collect::<Vec<_>>();

            assert_eq!(frames, bodies);
        }
    }
}
