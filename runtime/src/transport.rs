use std::{
    io,
    time::Duration,
};

use bytes::{
    Bytes,
    BytesMut,
};
use tokio::{
    io::{
        AsyncRead,
        AsyncReadExt,
        AsyncWrite,
        AsyncWriteExt,
    },
    time::Instant,
};
use tokio_serial::{
    ClearBuffer,
    DataBits,
    Parity,
    SerialPort,
    SerialStream,
    StopBits,
};

use crate::TransportError;

/// Half-duplex byte link to the radio.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Collect up to `max` bytes, returning early only once `timeout` has elapsed.
    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Discard anything queued in either direction.
    async fn reset_buffers(&mut self) -> Result<(), TransportError>;
}

/// Read from `stream` until `max` bytes arrive, the stream ends, or `timeout` elapses.
pub async fn read_window<S>(stream: &mut S, max: usize, timeout: Duration) -> Result<Bytes, TransportError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut buf = BytesMut::with_capacity(max.min(4096));

    while buf.len() < max {
        let remaining = (max - buf.len()) as u64;
        let mut limited = (&mut *stream).take(remaining);

        match tokio::time::timeout_at(deadline, limited.read_buf(&mut buf)).await {
            Err(_elapsed) => break,
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {},
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => break,
            Ok(Err(e)) => return Err(e.into()),
        }
    }

    Ok(buf.freeze())
}

pub struct SerialTransport {
    port:   String,
    stream: SerialStream,
}

impl SerialTransport {
    /// 8 data bits, no parity, two stop bits.
    #[tracing::instrument(err(Display))]
    pub fn open(port: &str, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let builder = tokio_serial::new(port, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .timeout(timeout);

        let stream = SerialStream::open(&builder)?;
        tracing::info!("opened serial port");

        Ok(Self {
            port: port.to_owned(),
            stream,
        })
    }

    #[inline]
    pub fn port(&self) -> &str {
        &self.port
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    #[tracing::instrument(level = "debug", skip_all, fields(port = %self.port, len = data.len()), err(Display))]
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        tracing::trace!(data = %hex::encode(data), "serial write");

        self.stream.write_all(data).await?;
        self.stream.flush().await?;

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(port = %self.port), err(Display))]
    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        read_window(&mut self.stream, max, timeout).await
    }

    async fn reset_buffers(&mut self) -> Result<(), TransportError> {
        self.stream.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// Any async byte stream as a transport. Buffer resets are a no-op.
pub struct StreamTransport<S> {
    stream: S,
}

impl<S> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait::async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;

        Ok(())
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        read_window(&mut self.stream, max, timeout).await
    }

    async fn reset_buffers(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data).await
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).read(max, timeout).await
    }

    async fn reset_buffers(&mut self) -> Result<(), TransportError> {
        (**self).reset_buffers().await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn read_stops_at_timeout() -> eyre::Result<()> {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(ours);

        theirs.write_all(b"abc").await?;

        let read = transport.read(100, Duration::from_secs(1)).await?;
        assert_eq!(&read[..], b"abc");

        Ok(())
    }

    #[tokio::test]
    async fn read_stops_at_max() -> eyre::Result<()> {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new(ours);

        theirs.write_all(b"abcdef").await?;

        let read = transport.read(4, Duration::from_secs(5)).await?;
        assert_eq!(&read[..], b"abcd");

        let read = transport.read(4, Duration::from_millis(10)).await?;
        assert_eq!(&read[..], b"ef");

        Ok(())
    }
}
