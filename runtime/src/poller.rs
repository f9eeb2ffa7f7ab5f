use std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use bytes::BytesMut;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;

use codec::{
    CodecGateway,
    FlagSplitCodec,
    Segment,
};
use message::CommandResponse;

use crate::{
    CommsPipeline,
    Error,
    LogSink,
    Transport,
};

/// Background reader that drains spacecraft output into a log sink between uplinks.
///
/// Stopping is cooperative: the flag is checked between reads, so [`LogPoller::stop`] returns
/// within one read timeout.
pub struct LogPoller<T> {
    stop:   Arc<AtomicBool>,
    handle: JoinHandle<T>,
}

struct PollTask<T, G> {
    transport: T,
    pipeline:  Arc<CommsPipeline<G>>,
    sink:      LogSink,
    stop:      Arc<AtomicBool>,
    window:    usize,
    timeout:   Duration,
}

impl<T> LogPoller<T>
where
    T: Transport + 'static,
{
    pub fn spawn<G>(
        transport: T,
        pipeline: Arc<CommsPipeline<G>>,
        sink: LogSink,
        window: usize,
        timeout: Duration,
    ) -> Self
    where
        G: CodecGateway + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));

        let task = PollTask {
            transport,
            pipeline,
            sink,
            stop: stop.clone(),
            window,
            timeout,
        };

        Self {
            stop,
            handle: tokio::spawn(task.run()),
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the task to stop and wait for it, recovering the transport.
    #[tracing::instrument(skip_all, err(Display))]
    pub async fn stop(self) -> Result<T, Error> {
        self.stop.store(true, Ordering::SeqCst);
        let transport = self.handle.await?;

        tracing::info!("log poller stopped");
        Ok(transport)
    }
}

impl<T, G> PollTask<T, G>
where
    T: Transport,
    G: CodecGateway,
{
    #[tracing::instrument(name = "log_poller", skip_all)]
    async fn run(mut self) -> T {
        let mut codec = FlagSplitCodec::new();
        let mut buf = BytesMut::new();

        tracing::info!("log poller started");

        while !self.stop.load(Ordering::SeqCst) {
            let read = match self.transport.read(self.window, self.timeout).await {
                Ok(read) => read,
                Err(e) => {
                    tracing::error!(error = %e, "log poller read failed");
                    tokio::time::sleep(self.timeout).await;
                    continue;
                },
            };

            buf.extend_from_slice(&read);

            loop {
                match codec.decode(&mut buf) {
                    Ok(Some(segment)) => self.handle(segment).await,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "splitting poller input");
                        buf.clear();
                        break;
                    },
                }
            }
        }

        while let Ok(Some(segment)) = codec.decode_eof(&mut buf) {
            self.handle(segment).await;
        }

        self.transport
    }

    async fn handle(&mut self, segment: Segment) {
        let rendered = match segment {
            Segment::Chatter(chatter) => chatter.to_vec(),
            Segment::Frame(raw) => match self.render(&raw) {
                Ok(Some(line)) => line.into_bytes(),
                Ok(None) => return,
                // a flag byte in console text
                Err(e) => {
                    tracing::debug!(error = %e, len = raw.len(), "undecodable span kept as chatter");
                    raw.to_vec()
                },
            },
        };

        util::trace_catch!(self.sink.append(&rendered).await, "writing to log sink");
    }

    fn render(&mut self, raw: &[u8]) -> Result<Option<String>, Error> {
        let frame = self.pipeline.decode(raw)?;

        let payload = match &frame.payload {
            Some(payload) => payload,
            None => {
                tracing::info!(%frame, "unnumbered frame while polling");
                return Ok(None);
            },
        };

        match CommandResponse::unpack(payload) {
            Ok(response) => {
                tracing::info!(%response, "time-tagged command response");
                Ok(Some(format!("\n{}\n", response)))
            },
            Err(e) => {
                tracing::warn!(error = %e, "unparseable response while polling");
                Ok(None)
            },
        }
    }
}
