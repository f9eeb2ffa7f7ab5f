use std::sync::Arc;

use bytes::{
    Bytes,
    BytesMut,
};

use codec::{
    CodecGateway,
    StandardGateway,
};
use message::{
    Frame,
    FrameKind,
};

use crate::{
    CommsPipeline,
    Error,
    LinkConfig,
    LogSink,
    Transport,
};

/// Synchronous request/response exchanges over a transport.
pub struct LinkSession<G = StandardGateway> {
    pipeline: Arc<CommsPipeline<G>>,
    config:   LinkConfig,
    sink:     Option<LogSink>,
}

fn padded(wire: Bytes, len: usize) -> Bytes {
    if wire.len() >= len {
        return wire;
    }

    let mut out = BytesMut::with_capacity(len);
    out.extend_from_slice(&wire);
    out.resize(len, 0);

    out.freeze()
}

impl<G> LinkSession<G>
where
    G: CodecGateway,
{
    pub fn new(pipeline: Arc<CommsPipeline<G>>, config: LinkConfig) -> Self {
        Self {
            pipeline,
            config,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[inline]
    pub fn pipeline(&self) -> &Arc<CommsPipeline<G>> {
        &self.pipeline
    }

    #[inline]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    #[inline]
    pub fn sink(&self) -> Option<&LogSink> {
        self.sink.as_ref()
    }

    /// Uplink one command block and return the first frame heard in the following read window.
    #[tracing::instrument(skip_all, err(Display))]
    pub async fn send_and_await<T>(&self, block: &[u8], transport: &mut T) -> Result<Frame, Error>
    where
        T: Transport + ?Sized,
    {
        let wire = self.pipeline.encode_block(block)?;
        self.exchange(padded(wire, self.config.uplink_padding), transport).await
    }

    /// Send SABM and return the reply.
    #[tracing::instrument(skip_all, err(Display))]
    pub async fn send_connection_request<T>(&self, transport: &mut T) -> Result<Frame, Error>
    where
        T: Transport + ?Sized,
    {
        self.send_control(FrameKind::ConnectRequest, transport).await
    }

    #[tracing::instrument(skip(self, transport), err(Display))]
    pub async fn send_control<T>(&self, kind: FrameKind, transport: &mut T) -> Result<Frame, Error>
    where
        T: Transport + ?Sized,
    {
        let wire = self.pipeline.encode_control(kind, true)?;
        self.exchange(padded(wire, self.config.connect_padding), transport).await
    }

    /// Send an unnumbered frame without waiting for anything back.
    #[tracing::instrument(skip(self, transport), err(Display))]
    pub async fn send_only<T>(&self, kind: FrameKind, transport: &mut T) -> Result<(), Error>
    where
        T: Transport + ?Sized,
    {
        let wire = self.pipeline.encode_control(kind, true)?;
        transport.write(&padded(wire, self.config.connect_padding)).await?;

        Ok(())
    }

    /// Read one window and decode the frame in it. Surrounding bytes go to the log sink.
    pub async fn await_frame<T>(&self, transport: &mut T) -> Result<Frame, Error>
    where
        T: Transport + ?Sized,
    {
        let read = transport.read(self.config.read_window, self.config.read_timeout).await?;

        let located = match codec::locate(&read) {
            Some(located) => located,
            None => {
                self.record_chatter(&read).await;
                return Err(Error::NoFrameReceived {
                    read: read.len(),
                });
            },
        };

        self.record_chatter(&located.chatter).await;

        let frame = self.pipeline.decode(&located.frame)?;
        tracing::debug!(%frame, "received frame");

        Ok(frame)
    }

    async fn exchange<T>(&self, wire: Bytes, transport: &mut T) -> Result<Frame, Error>
    where
        T: Transport + ?Sized,
    {
        transport.reset_buffers().await?;
        transport.write(&wire).await?;

        self.await_frame(transport).await
    }

    async fn record_chatter(&self, chatter: &[u8]) {
        if chatter.is_empty() {
            return;
        }

        tracing::debug!(len = chatter.len(), text = %String::from_utf8_lossy(chatter), "spacecraft chatter");

        if let Some(sink) = &self.sink {
            util::trace_catch!(sink.append(chatter).await, "writing chatter to log sink");
        }
    }
}
